//! Browser adapter: mounts a program onto a live document, batches renders
//! to the frame clock, and surfaces timers, synthetic events, and
//! URL/history changes to the runtime.

pub mod animator;
pub mod clock;
pub mod history;

pub use animator::Animator;
pub use clock::{FRAME_MS, HostClock};
pub use history::History;

use bus::HostEvent;
use core_types::{DomId, Value};
use dom::Document;
use dom::events::EventOutcome;
use effects::Registry;
use runtime::{Instance, Program};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::mpsc::Receiver;
use url::Url;
use vdom::events::EventNodeRef;
use vdom::node::VNode;

/// Optional navigation wiring: where the app starts and how a URL change
/// becomes a message.
pub struct Navigation {
    pub initial: Url,
    pub on_change: Rc<dyn Fn(&Url) -> Value>,
}

struct ViewState {
    root: Cell<DomId>,
    prev: RefCell<Rc<VNode>>,
    event_root: RefCell<Option<EventNodeRef>>,
}

/// A mounted application: the opaque handle returned by [`mount`].
pub struct App {
    instance: Instance,
    doc: Rc<RefCell<Document>>,
    view_state: Rc<ViewState>,
    animator: Rc<Animator>,
    clock: Rc<HostClock>,
    history: Option<RefCell<History>>,
    on_url_change: Option<Rc<dyn Fn(&Url) -> Value>>,
}

/// Mounts `program` onto a fresh document: the placeholder root node is
/// replaced by a synchronous first render, and later updates patch in place
/// at most once per animation frame.
pub fn mount(
    program: Program,
    flags: Value,
    registry: Registry,
    clock: Rc<HostClock>,
    navigation: Option<Navigation>,
) -> App {
    let view = program.view.clone();
    let doc: Rc<RefCell<Document>> = Rc::new(RefCell::new(Document::new()));
    let placeholder = {
        let mut d = doc.borrow_mut();
        let id = d.create_element("body".into(), None);
        d.set_root(id);
        id
    };
    let view_state = Rc::new(ViewState {
        root: Cell::new(placeholder),
        prev: RefCell::new(vdom::node::text("")),
        event_root: RefCell::new(None),
    });
    let animator_slot: Rc<RefCell<Option<Rc<Animator>>>> = Rc::new(RefCell::new(None));

    let instance = runtime::initialize(program, flags, registry, {
        let doc = doc.clone();
        let view_state = view_state.clone();
        let view = view.clone();
        let clock = clock.clone();
        let animator_slot = animator_slot.clone();
        move |send_to_app, initial_model| {
            let event_root = vdom::events::root(send_to_app);
            *view_state.event_root.borrow_mut() = Some(event_root.clone());

            // Forced synchronous first draw: replace the placeholder root.
            let tree = view(initial_model);
            {
                let mut d = doc.borrow_mut();
                let rendered =
                    dom::render(&mut d, &tree, &event_root).expect("initial render failed");
                d.replace(placeholder, rendered).expect("mount failed");
                d.set_root(rendered);
                view_state.root.set(rendered);
            }
            *view_state.prev.borrow_mut() = tree;

            let draw: Box<dyn Fn(&Value)> = {
                let doc = doc.clone();
                let view_state = view_state.clone();
                let view = view.clone();
                Box::new(move |model| redraw(&doc, &view_state, &view, model))
            };
            let request: Box<dyn Fn()> = {
                let clock = clock.clone();
                Box::new(move || clock.request_frame())
            };
            let animator = Rc::new(Animator::new(initial_model.clone(), draw, request));
            *animator_slot.borrow_mut() = Some(animator.clone());
            Box::new(move |model: &Value| animator.step(model.clone()))
        }
    });

    let animator = animator_slot
        .borrow()
        .clone()
        .expect("stepper was never built");
    let (history, on_url_change) = match navigation {
        None => (None, None),
        Some(navigation) => (
            Some(RefCell::new(History::new(navigation.initial))),
            Some(navigation.on_change),
        ),
    };
    App {
        instance,
        doc,
        view_state,
        animator,
        clock,
        history,
        on_url_change,
    }
}

fn redraw(
    doc: &Rc<RefCell<Document>>,
    view_state: &ViewState,
    view: &Rc<dyn Fn(&Value) -> Rc<VNode>>,
    model: &Value,
) {
    let next_tree = view(model);
    let prev = view_state.prev.borrow().clone();
    let patches = vdom::diff(&prev, &next_tree);
    let event_root = view_state
        .event_root
        .borrow()
        .clone()
        .expect("drawing before mount completed");
    let patch_count = patches.len();
    {
        let mut d = doc.borrow_mut();
        let root = view_state.root.get();
        let new_root = dom::apply_patches(&mut d, root, &prev, &patches, &event_root)
            .expect("patch application failed");
        d.set_root(new_root);
        view_state.root.set(new_root);
    }
    *view_state.prev.borrow_mut() = next_tree;
    log::trace!(target: "shell.frame", "applied {patch_count} patches");
}

impl App {
    pub fn send(&self, msg: Value) {
        self.instance.send(msg);
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn document(&self) -> &Rc<RefCell<Document>> {
        &self.doc
    }

    pub fn root(&self) -> DomId {
        self.view_state.root.get()
    }

    pub fn clock(&self) -> &Rc<HostClock> {
        &self.clock
    }

    /// Synthesizes a DOM event at `target` and delivers the decoded
    /// messages through their event chains.
    pub fn dispatch(&self, target: DomId, event: &str, payload: Value) -> EventOutcome {
        let (deliveries, outcome) = {
            let d = self.doc.borrow();
            dom::events::route(&d, target, event, &payload)
        };
        for (event_node, msg) in deliveries {
            vdom::events::remap(&event_node, msg);
        }
        outcome
    }

    /// First element with a matching attribute, for tests and host glue.
    pub fn find(&self, attr: &str, value: &str) -> Option<DomId> {
        let d = self.doc.borrow();
        dom::events::find_by_attr(&d, self.view_state.root.get(), attr, value)
    }

    /// One animation frame arrived.
    pub fn run_frame(&self) {
        self.animator.on_frame();
    }

    /// Blocking event loop for the threaded clock.
    pub fn run(&self, events: Receiver<HostEvent>) {
        while let Ok(event) = events.recv() {
            match event {
                HostEvent::Frame => self.run_frame(),
                HostEvent::Timer(id) => self.clock.fire_timer(id),
                HostEvent::Quit => break,
            }
        }
    }

    pub fn current_url(&self) -> Option<Url> {
        self.history
            .as_ref()
            .map(|history| history.borrow().current().clone())
    }

    /// Pushes a new history entry and runs the URL-change cycle with a
    /// forced synchronous draw.
    pub fn navigate(&self, url: Url) {
        if let Some(history) = &self.history {
            history.borrow_mut().push(url.clone());
        }
        self.url_changed(&url);
    }

    pub fn go_back(&self) {
        let url = match &self.history {
            Some(history) => history.borrow_mut().back().cloned(),
            None => None,
        };
        if let Some(url) = url {
            self.url_changed(&url);
        }
    }

    pub fn go_forward(&self) {
        let url = match &self.history {
            Some(history) => history.borrow_mut().forward().cloned(),
            None => None,
        };
        if let Some(url) = url {
            self.url_changed(&url);
        }
    }

    fn url_changed(&self, url: &Url) {
        let Some(on_change) = &self.on_url_change else {
            return;
        };
        self.instance.send(on_change(url));
        // Navigation redraws immediately rather than waiting for a frame.
        self.animator.force(self.instance.model());
    }
}
