use core_types::Value;
use std::cell::{Cell, RefCell};

/// Render debounce state. Any number of synchronous updates inside one
/// frame collapse into a single draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameState {
    /// Nothing dirty, no frame outstanding.
    Idle,
    /// A frame is outstanding but the model was drawn already; the frame
    /// will be consumed without drawing.
    Extra,
    /// The model is dirty; the outstanding frame must draw it.
    Pending,
}

pub struct Animator {
    state: Cell<FrameState>,
    model: RefCell<Value>,
    draw: Box<dyn Fn(&Value)>,
    request: Box<dyn Fn()>,
}

impl Animator {
    /// The caller is expected to have drawn `initial` already (the mount
    /// replaces the root node synchronously).
    pub fn new(initial: Value, draw: Box<dyn Fn(&Value)>, request: Box<dyn Fn()>) -> Animator {
        Animator {
            state: Cell::new(FrameState::Idle),
            model: RefCell::new(initial),
            draw,
            request,
        }
    }

    /// Marks the model dirty and schedules a frame if none is outstanding.
    pub fn step(&self, model: Value) {
        *self.model.borrow_mut() = model;
        if self.state.get() == FrameState::Idle {
            (self.request)();
        }
        self.state.set(FrameState::Pending);
    }

    /// Forced synchronous draw, bypassing the debounce (init, navigation).
    pub fn force(&self, model: Value) {
        *self.model.borrow_mut() = model;
        let snapshot = self.model.borrow().clone();
        (self.draw)(&snapshot);
        if self.state.get() == FrameState::Pending {
            self.state.set(FrameState::Extra);
        }
    }

    /// Frame arrival. Draws at most once, and keeps one extra frame in
    /// flight after a draw so back-to-back updates stay on the frame clock.
    pub fn on_frame(&self) {
        match self.state.get() {
            FrameState::Idle => {}
            FrameState::Extra => self.state.set(FrameState::Idle),
            FrameState::Pending => {
                (self.request)();
                let snapshot = self.model.borrow().clone();
                (self.draw)(&snapshot);
                self.state.set(FrameState::Extra);
            }
        }
    }
}
