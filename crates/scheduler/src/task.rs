use crate::Resume;
use core_types::{Value, val};

pub type Cont = Box<dyn FnOnce(Value) -> Task>;
pub type Cancel = Box<dyn FnOnce()>;
pub type BindFn = Box<dyn FnOnce(Resume) -> Option<Cancel>>;

/// A deferred computation. Execution flattens `AndThen`/`OnError` nodes into
/// an explicit continuation stack (see `Scheduler::step`), so arbitrarily deep
/// chains run without native recursion.
pub enum Task {
    Succeed(Value),
    Fail(Value),
    /// Suspends until an external callback resolves it. The bind function
    /// receives a [`Resume`] handle and may return a cancellation thunk.
    Binding(BindFn),
    AndThen(Cont, Box<Task>),
    OnError(Cont, Box<Task>),
    /// Suspends until a mailbox message arrives.
    Receive(Cont),
}

impl Task {
    pub fn succeed<T: 'static>(v: T) -> Task {
        Task::Succeed(val(v))
    }

    pub fn succeed_value(v: Value) -> Task {
        Task::Succeed(v)
    }

    pub fn fail<T: 'static>(e: T) -> Task {
        Task::Fail(val(e))
    }

    pub fn fail_value(e: Value) -> Task {
        Task::Fail(e)
    }

    pub fn binding(f: impl FnOnce(Resume) -> Option<Cancel> + 'static) -> Task {
        Task::Binding(Box::new(f))
    }

    pub fn receive(f: impl FnOnce(Value) -> Task + 'static) -> Task {
        Task::Receive(Box::new(f))
    }

    pub fn and_then(self, f: impl FnOnce(Value) -> Task + 'static) -> Task {
        Task::AndThen(Box::new(f), Box::new(self))
    }

    pub fn on_error(self, f: impl FnOnce(Value) -> Task + 'static) -> Task {
        Task::OnError(Box::new(f), Box::new(self))
    }

    pub fn map(self, f: impl FnOnce(Value) -> Value + 'static) -> Task {
        self.and_then(|v| Task::Succeed(f(v)))
    }

    pub fn map_error(self, f: impl FnOnce(Value) -> Value + 'static) -> Task {
        self.on_error(|e| Task::Fail(f(e)))
    }

    /// Runs tasks left to right, collecting results into a `Vec<Value>`.
    pub fn sequence(tasks: Vec<Task>) -> Task {
        fn go(mut rest: std::vec::IntoIter<Task>, mut acc: Vec<Value>) -> Task {
            match rest.next() {
                None => Task::Succeed(val(acc)),
                Some(t) => t.and_then(move |v| {
                    acc.push(v);
                    go(rest, acc)
                }),
            }
        }
        go(tasks.into_iter(), Vec::new())
    }
}
