//! Cooperative single-threaded process scheduler.
//!
//! Contract:
//! - A process wraps one root [`Task`] plus an explicit continuation stack
//!   and a FIFO mailbox.
//! - `enqueue` drains the runnable queue on the calling stack; nested
//!   enqueues during a drain append to the queue instead of recursing, so at
//!   most one `step` is ever active (the `working` guard).
//! - Message delivery to a given mailbox is FIFO. There is no ordering
//!   guarantee across mailboxes.
//! - A process suspends only at a `Binding` (awaiting an external resume) or
//!   at `Receive` on an empty mailbox.
//! - Resuming a binding twice is a no-op the second time: every suspension
//!   gets a fresh wake sequence number and stale resumes are dropped.
//! - Killing a process invokes the live cancellation thunk of its suspended
//!   `Binding` (if any) and removes the process; killing an unknown process
//!   is a silent no-op.
//!
//! Schedulers are plain context objects; tests construct as many independent
//! instances as they need.

mod task;

pub use task::{BindFn, Cancel, Cont, Task};

use core_types::{ProcessId, Value};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

#[derive(Clone, Copy, PartialEq, Eq)]
enum FrameTag {
    Success,
    Error,
}

struct Frame {
    tag: FrameTag,
    cont: Cont,
}

struct Process {
    root: Option<Task>,
    stack: Vec<Frame>,
    mailbox: VecDeque<Value>,
    cancel: Option<Cancel>,
    /// Suspended in a `Binding`, waiting for a resume.
    waiting: bool,
    wake_seq: u64,
}

impl Process {
    fn new(task: Task) -> Self {
        Process {
            root: Some(task),
            stack: Vec::new(),
            mailbox: VecDeque::new(),
            cancel: None,
            waiting: false,
            wake_seq: 0,
        }
    }
}

struct Inner {
    procs: RefCell<HashMap<ProcessId, Process>>,
    queue: RefCell<VecDeque<ProcessId>>,
    working: Cell<bool>,
    next_pid: Cell<ProcessId>,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            inner: Rc::new(Inner {
                procs: RefCell::new(HashMap::new()),
                queue: RefCell::new(VecDeque::new()),
                working: Cell::new(false),
                next_pid: Cell::new(1),
            }),
        }
    }

    /// Registers a new process for `task` and runs it as far as it will go.
    pub fn raw_spawn(&self, task: Task) -> ProcessId {
        let pid = self.inner.next_pid.get();
        self.inner.next_pid.set(pid + 1);
        self.inner.procs.borrow_mut().insert(pid, Process::new(task));
        log::trace!(target: "sched.spawn", "spawned process {pid}");
        self.enqueue(pid);
        pid
    }

    /// A task that spawns `task` as a new process and succeeds with its id.
    pub fn spawn(&self, task: Task) -> Task {
        let sched = self.clone();
        Task::binding(move |resume| {
            let pid = sched.raw_spawn(task);
            resume.invoke(Task::succeed(pid));
            None
        })
    }

    /// Delivers `msg` to the process mailbox and wakes it.
    pub fn send(&self, pid: ProcessId, msg: Value) {
        {
            let mut procs = self.inner.procs.borrow_mut();
            match procs.get_mut(&pid) {
                None => return,
                Some(p) => p.mailbox.push_back(msg),
            }
        }
        self.enqueue(pid);
    }

    /// A task form of [`send`](Self::send).
    pub fn send_task(&self, pid: ProcessId, msg: Value) -> Task {
        let sched = self.clone();
        Task::binding(move |resume| {
            sched.send(pid, msg);
            resume.invoke(Task::succeed(()));
            None
        })
    }

    /// Cancels the process's in-flight `Binding` (if any) and destroys it.
    pub fn kill(&self, pid: ProcessId) {
        let cancel = {
            let mut procs = self.inner.procs.borrow_mut();
            match procs.remove(&pid) {
                None => return,
                Some(mut p) => p.cancel.take(),
            }
        };
        log::trace!(target: "sched.kill", "killed process {pid}");
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// A task form of [`kill`](Self::kill).
    pub fn kill_task(&self, pid: ProcessId) -> Task {
        let sched = self.clone();
        Task::binding(move |resume| {
            sched.kill(pid);
            resume.invoke(Task::succeed(()));
            None
        })
    }

    pub fn is_alive(&self, pid: ProcessId) -> bool {
        self.inner.procs.borrow().contains_key(&pid)
    }

    fn enqueue(&self, pid: ProcessId) {
        self.inner.queue.borrow_mut().push_back(pid);
        if self.inner.working.get() {
            return;
        }
        self.inner.working.set(true);
        loop {
            let next = self.inner.queue.borrow_mut().pop_front();
            match next {
                None => break,
                Some(p) => self.step(p),
            }
        }
        self.inner.working.set(false);
    }

    /// Pops continuation frames until one matches `want`. Frames of the other
    /// tag are discarded without being fed the value; this is the
    /// and_then/on_error selectivity. With no matching frame left the process
    /// is terminal and its record is destroyed.
    fn unwind(&self, pid: ProcessId, stack: &mut Vec<Frame>, want: FrameTag) -> Option<Frame> {
        while let Some(frame) = stack.pop() {
            if frame.tag == want {
                return Some(frame);
            }
        }
        if want == FrameTag::Error {
            log::debug!(target: "sched.step", "process {pid} failed with no handler");
        }
        self.inner.procs.borrow_mut().remove(&pid);
        None
    }

    fn step(&self, pid: ProcessId) {
        let (mut root, mut stack) = {
            let mut procs = self.inner.procs.borrow_mut();
            let Some(p) = procs.get_mut(&pid) else { return };
            match p.root.take() {
                None => return,
                Some(r) => (r, std::mem::take(&mut p.stack)),
            }
        };
        loop {
            // The running continuation may have killed this process.
            if !self.inner.procs.borrow().contains_key(&pid) {
                return;
            }
            match root {
                Task::Succeed(v) => match self.unwind(pid, &mut stack, FrameTag::Success) {
                    Some(frame) => root = (frame.cont)(v),
                    None => return,
                },
                Task::Fail(v) => match self.unwind(pid, &mut stack, FrameTag::Error) {
                    Some(frame) => root = (frame.cont)(v),
                    None => return,
                },
                Task::Binding(bind) => {
                    let seq = {
                        let mut procs = self.inner.procs.borrow_mut();
                        let Some(p) = procs.get_mut(&pid) else { return };
                        p.wake_seq += 1;
                        p.waiting = true;
                        p.stack = stack;
                        p.root = None;
                        p.wake_seq
                    };
                    let resume = Resume {
                        inner: Rc::downgrade(&self.inner),
                        pid,
                        seq,
                    };
                    let cancel = bind(resume);
                    // The bind function may have resumed synchronously; only
                    // keep the cancel thunk while the suspension is live.
                    let mut procs = self.inner.procs.borrow_mut();
                    if let Some(p) = procs.get_mut(&pid) {
                        if p.waiting && p.wake_seq == seq {
                            p.cancel = cancel;
                        }
                    }
                    return;
                }
                Task::Receive(cont) => {
                    let msg = {
                        let mut procs = self.inner.procs.borrow_mut();
                        let Some(p) = procs.get_mut(&pid) else { return };
                        p.mailbox.pop_front()
                    };
                    match msg {
                        None => {
                            let mut procs = self.inner.procs.borrow_mut();
                            if let Some(p) = procs.get_mut(&pid) {
                                p.root = Some(Task::Receive(cont));
                                p.stack = stack;
                            }
                            return;
                        }
                        Some(m) => root = cont(m),
                    }
                }
                Task::AndThen(cont, inner) => {
                    stack.push(Frame {
                        tag: FrameTag::Success,
                        cont,
                    });
                    root = *inner;
                }
                Task::OnError(cont, inner) => {
                    stack.push(Frame {
                        tag: FrameTag::Error,
                        cont,
                    });
                    root = *inner;
                }
            }
        }
    }
}

/// Wake handle handed to a `Binding`'s bind function. Cloneable so it can be
/// stored by host-side completion sources; only the first invocation for a
/// given suspension has any effect.
#[derive(Clone)]
pub struct Resume {
    inner: Weak<Inner>,
    pid: ProcessId,
    seq: u64,
}

impl Resume {
    pub fn invoke(&self, task: Task) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let sched = Scheduler { inner };
        let resumed = {
            let mut procs = sched.inner.procs.borrow_mut();
            match procs.get_mut(&self.pid) {
                Some(p) if p.waiting && p.wake_seq == self.seq => {
                    p.waiting = false;
                    p.cancel = None;
                    p.root = Some(task);
                    true
                }
                _ => false,
            }
        };
        if resumed {
            sched.enqueue(self.pid);
        }
    }
}
