use crate::MgrMsg;
use core_types::{ProcessId, Value, val};
use scheduler::{Scheduler, Task};
use std::cell::Cell;
use std::rc::Rc;

/// Callback that delivers a message to the application driver.
pub type SendToApp = Rc<dyn Fn(Value)>;

/// Capability token handed to manager callbacks. Carries the application
/// sender and the manager's own process id for self-messaging. Never owned;
/// cloning shares the same capability.
#[derive(Clone)]
pub struct Router {
    inner: Rc<RouterInner>,
}

struct RouterInner {
    sched: Scheduler,
    pid: Cell<ProcessId>,
    send_to_app: SendToApp,
}

impl Router {
    pub(crate) fn new(sched: Scheduler, send_to_app: SendToApp) -> Self {
        Router {
            inner: Rc::new(RouterInner {
                sched,
                pid: Cell::new(0),
                send_to_app,
            }),
        }
    }

    pub(crate) fn set_pid(&self, pid: ProcessId) {
        self.inner.pid.set(pid);
    }

    /// A task that delivers `msg` to the application's `update`.
    pub fn send_to_app(&self, msg: Value) -> Task {
        let send = self.inner.send_to_app.clone();
        Task::binding(move |resume| {
            send(msg);
            resume.invoke(Task::succeed(()));
            None
        })
    }

    /// A task that delivers `msg` back to this manager's own mailbox, to be
    /// handled by `on_self_msg`.
    pub fn send_to_self(&self, msg: Value) -> Task {
        self.inner
            .sched
            .send_task(self.inner.pid.get(), val(MgrMsg::SelfMsg(msg)))
    }

    /// The scheduler this manager runs on, for spawning worker processes.
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.sched
    }

    /// Direct (non-task) application sender, for host-facing entry points
    /// such as incoming ports.
    pub fn app_sender(&self) -> SendToApp {
        self.inner.send_to_app.clone()
    }
}
