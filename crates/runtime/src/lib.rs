//! Application driver: owns the model, runs `update`, re-renders through
//! the installed stepper, and redispatches effects every cycle.
//!
//! Contract:
//! - `send` runs one full cycle: `update` -> stepper -> `dispatch_effects`
//!   with the new command bag and the refreshed subscription bag.
//! - Re-entrant sends during effect dispatch are queued and drained on the
//!   outer call, mirroring the scheduler's no-recursion guard.
//! - The stepper only marks state for the render scheduler; it must not
//!   apply patches synchronously (the shell decides when to draw).

pub mod tasks;

use core_types::Value;
use effects::{Cmd, Managers, Registry, SendToApp, Sub, dispatch_effects};
use scheduler::Scheduler;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use vdom::node::VNode;

/// The `(init, update, view, subscriptions)` quadruple, type-erased. Use
/// [`application`] to build one from typed functions.
pub struct Program {
    pub init: Box<dyn FnOnce(Value) -> (Value, Cmd)>,
    pub update: Rc<dyn Fn(Value, Value) -> (Value, Cmd)>,
    pub view: Rc<dyn Fn(&Value) -> Rc<VNode>>,
    pub subscriptions: Rc<dyn Fn(&Value) -> Sub>,
}

/// Wraps typed application functions into a [`Program`]. Messages and models
/// travel the runtime type-erased; the erasure boundary is the only place
/// that downcasts.
pub fn application<Model, Msg, I, U, V, S>(init: I, update: U, view: V, subscriptions: S) -> Program
where
    Model: 'static,
    Msg: 'static,
    I: FnOnce(Value) -> (Model, Cmd) + 'static,
    U: Fn(&Msg, &Model) -> (Model, Cmd) + 'static,
    V: Fn(&Model) -> Rc<VNode> + 'static,
    S: Fn(&Model) -> Sub + 'static,
{
    Program {
        init: Box::new(move |flags| {
            let (model, cmd) = init(flags);
            (Rc::new(model) as Value, cmd)
        }),
        update: Rc::new(move |msg: Value, model: Value| {
            let msg = msg.downcast_ref::<Msg>().expect("message type mismatch");
            let model = model.downcast_ref::<Model>().expect("model type mismatch");
            let (next, cmd) = update(msg, model);
            (Rc::new(next) as Value, cmd)
        }),
        view: Rc::new(move |model: &Value| {
            view(model.downcast_ref::<Model>().expect("model type mismatch"))
        }),
        subscriptions: Rc::new(move |model: &Value| {
            subscriptions(model.downcast_ref::<Model>().expect("model type mismatch"))
        }),
    }
}

/// Re-render callback installed by the shell; called with the new model
/// after every update.
pub type Stepper = Box<dyn Fn(&Value)>;

pub struct Instance {
    inner: Rc<Inner>,
}

struct Inner {
    sched: Scheduler,
    managers: RefCell<Option<Managers>>,
    model: RefCell<Value>,
    update: Rc<dyn Fn(Value, Value) -> (Value, Cmd)>,
    subscriptions: Rc<dyn Fn(&Value) -> Sub>,
    stepper: RefCell<Option<Stepper>>,
    fx_queue: RefCell<VecDeque<(Cmd, Sub)>>,
    fx_active: Cell<bool>,
}

/// Boots a program: instantiates managers (the core `Task` manager plus
/// everything in `registry`), installs the stepper built by `make_stepper`
/// (which also performs the initial draw), and dispatches the init effects.
pub fn initialize(
    program: Program,
    flags: Value,
    registry: Registry,
    make_stepper: impl FnOnce(SendToApp, &Value) -> Stepper,
) -> Instance {
    tasks::register(&registry);

    let sched = Scheduler::new();
    let (model, init_cmd) = (program.init)(flags);
    let inner = Rc::new(Inner {
        sched: sched.clone(),
        managers: RefCell::new(None),
        model: RefCell::new(model),
        update: program.update,
        subscriptions: program.subscriptions,
        stepper: RefCell::new(None),
        fx_queue: RefCell::new(VecDeque::new()),
        fx_active: Cell::new(false),
    });

    let send_to_app: SendToApp = {
        let weak = Rc::downgrade(&inner);
        Rc::new(move |msg| {
            if let Some(inner) = weak.upgrade() {
                Inner::handle(&inner, msg);
            }
        })
    };

    let managers = effects::instantiate(registry, &sched, send_to_app.clone());
    *inner.managers.borrow_mut() = Some(managers);

    let stepper = {
        let model = inner.model.borrow();
        make_stepper(send_to_app, &model)
    };
    *inner.stepper.borrow_mut() = Some(stepper);

    let init_subs = {
        let model = inner.model.borrow();
        (inner.subscriptions)(&model)
    };
    Inner::enqueue_effects(&inner, init_cmd, init_subs);

    Instance { inner }
}

impl Instance {
    /// Delivers a message to `update`, re-renders, and dispatches effects.
    pub fn send(&self, msg: Value) {
        Inner::handle(&self.inner, msg);
    }

    pub fn sender(&self) -> SendToApp {
        let weak = Rc::downgrade(&self.inner);
        Rc::new(move |msg| {
            if let Some(inner) = weak.upgrade() {
                Inner::handle(&inner, msg);
            }
        })
    }

    pub fn scheduler(&self) -> Scheduler {
        self.inner.sched.clone()
    }

    pub fn model(&self) -> Value {
        self.inner.model.borrow().clone()
    }
}

impl Inner {
    fn handle(inner: &Rc<Inner>, msg: Value) {
        let (next_model, cmds) = {
            let model = inner.model.borrow().clone();
            (inner.update)(msg, model)
        };
        *inner.model.borrow_mut() = next_model;
        {
            let model = inner.model.borrow();
            if let Some(stepper) = &*inner.stepper.borrow() {
                stepper(&model);
            }
        }
        let subs = {
            let model = inner.model.borrow();
            (inner.subscriptions)(&model)
        };
        Inner::enqueue_effects(inner, cmds, subs);
    }

    /// Queued rather than recursive: a manager calling back into the app
    /// mid-dispatch appends the next cycle instead of nesting it.
    fn enqueue_effects(inner: &Rc<Inner>, cmds: Cmd, subs: Sub) {
        inner.fx_queue.borrow_mut().push_back((cmds, subs));
        if inner.fx_active.get() {
            return;
        }
        inner.fx_active.set(true);
        loop {
            let next = inner.fx_queue.borrow_mut().pop_front();
            let Some((cmds, subs)) = next else { break };
            let managers = inner.managers.borrow();
            let managers = managers
                .as_ref()
                .expect("effects dispatched before managers were instantiated");
            dispatch_effects(managers, &inner.sched, cmds, subs);
        }
        inner.fx_active.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{cast, val};
    use scheduler::Task;
    use std::cell::RefCell;
    use vdom::node::text;

    #[derive(Clone)]
    struct Model {
        count: i64,
    }

    enum Msg {
        Add(i64),
        Done(i64),
    }

    fn counter_program(log: Rc<RefCell<Vec<String>>>) -> Program {
        application(
            move |_flags| (Model { count: 0 }, Cmd::none()),
            |msg: &Msg, model: &Model| match msg {
                Msg::Add(n) => (
                    Model {
                        count: model.count + n,
                    },
                    tasks::perform(Task::succeed(*n), |v| {
                        val(Msg::Done(*cast::<i64>(&v).unwrap()))
                    }),
                ),
                Msg::Done(_) => (model.clone(), Cmd::none()),
            },
            {
                let log = log.clone();
                move |model: &Model| {
                    log.borrow_mut().push(format!("view {}", model.count));
                    text(format!("{}", model.count))
                }
            },
            |_model| Sub::none(),
        )
    }

    #[test]
    fn update_then_stepper_then_effects() {
        let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let steps: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));
        let s2 = steps.clone();
        let instance = initialize(
            counter_program(log.clone()),
            val(()),
            Registry::new(),
            move |_send, _model| {
                Box::new(move |model| {
                    s2.borrow_mut()
                        .push(model.downcast_ref::<Model>().unwrap().count);
                })
            },
        );
        instance.send(val(Msg::Add(2)));
        // Add(2) renders 2, then the perform command's Done message runs a
        // second full cycle at the same model.
        assert_eq!(*steps.borrow(), vec![2, 2]);
        let model = instance.model();
        assert_eq!(model.downcast_ref::<Model>().unwrap().count, 2);
    }

    #[test]
    fn init_effects_are_dispatched_once() {
        let fired: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));
        let f2 = fired.clone();
        let program = application(
            move |_flags| {
                (
                    Model { count: 0 },
                    tasks::perform(Task::succeed(7_i64), |v| {
                        val(Msg::Done(*cast::<i64>(&v).unwrap()))
                    }),
                )
            },
            move |msg: &Msg, model: &Model| match msg {
                Msg::Done(n) => {
                    f2.borrow_mut().push(*n);
                    (model.clone(), Cmd::none())
                }
                Msg::Add(_) => (model.clone(), Cmd::none()),
            },
            |_model: &Model| text("x"),
            |_model| Sub::none(),
        );
        let _instance = initialize(program, val(()), Registry::new(), |_send, _model| {
            Box::new(|_| {})
        });
        assert_eq!(*fired.borrow(), vec![7]);
    }

    #[test]
    fn subscriptions_are_refreshed_every_cycle() {
        let seen: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));
        let registry = Registry::new();
        {
            let seen = seen.clone();
            registry.register(
                "Probe",
                effects::ManagerSpec {
                    init: Task::succeed(()),
                    on_effects: Rc::new(move |_router, _cmds, subs, state| {
                        for sub in subs {
                            seen.borrow_mut().push(*cast::<i64>(&sub).unwrap());
                        }
                        Task::succeed_value(state)
                    }),
                    on_self_msg: Rc::new(|_, _, state| Task::succeed_value(state)),
                    cmd_map: None,
                    sub_map: Some(Rc::new(|_, v| v)),
                },
            );
        }
        let program = application(
            |_flags| (Model { count: 0 }, Cmd::none()),
            |msg: &Msg, model: &Model| match msg {
                Msg::Add(n) => (
                    Model {
                        count: model.count + n,
                    },
                    Cmd::none(),
                ),
                Msg::Done(_) => (model.clone(), Cmd::none()),
            },
            |_model: &Model| text("x"),
            |model: &Model| Sub::leaf("Probe", val(model.count)),
        );
        let instance = initialize(program, val(()), registry, |_send, _model| Box::new(|_| {}));
        instance.send(val(Msg::Add(1)));
        instance.send(val(Msg::Add(1)));
        // Init cycle plus one refresh per send, tracking the model.
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    }
}
