use bus::HostEvent;
use core_types::TimerId;
use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

/// Target frame cadence for the threaded clock, ~60Hz.
pub const FRAME_MS: u64 = 16;

enum Mode {
    /// Sleeper threads post due timers and frames onto the bus; the runtime
    /// loop resolves them back into wake callbacks.
    Threaded { tx: Sender<HostEvent>, start: Instant },
    /// Tests drive time explicitly with `advance` and `take_frame_request`.
    Manual {
        now: Cell<u64>,
        queue: RefCell<BinaryHeap<Reverse<(u64, TimerId)>>>,
        frame_requested: Cell<bool>,
    },
}

/// The shell's timer and frame source. Wake callbacks always run on the
/// runtime loop thread; worker threads only carry ids across the bus.
pub struct HostClock {
    mode: Mode,
    next_id: Cell<TimerId>,
    wakes: RefCell<HashMap<TimerId, Box<dyn FnOnce()>>>,
}

impl HostClock {
    pub fn threaded(tx: Sender<HostEvent>) -> std::rc::Rc<HostClock> {
        std::rc::Rc::new(HostClock {
            mode: Mode::Threaded {
                tx,
                start: Instant::now(),
            },
            next_id: Cell::new(1),
            wakes: RefCell::new(HashMap::new()),
        })
    }

    pub fn manual() -> std::rc::Rc<HostClock> {
        std::rc::Rc::new(HostClock {
            mode: Mode::Manual {
                now: Cell::new(0),
                queue: RefCell::new(BinaryHeap::new()),
                frame_requested: Cell::new(false),
            },
            next_id: Cell::new(1),
            wakes: RefCell::new(HashMap::new()),
        })
    }

    /// Asks for one animation frame. Collapses with the animator's debounce:
    /// at most one request is outstanding at a time by construction.
    pub fn request_frame(&self) {
        match &self.mode {
            Mode::Threaded { tx, .. } => {
                let tx = tx.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(FRAME_MS));
                    let _ = tx.send(HostEvent::Frame);
                });
            }
            Mode::Manual {
                frame_requested, ..
            } => frame_requested.set(true),
        }
    }

    /// Manual mode: reports and clears the pending frame request.
    pub fn take_frame_request(&self) -> bool {
        match &self.mode {
            Mode::Threaded { .. } => false,
            Mode::Manual {
                frame_requested, ..
            } => frame_requested.replace(false),
        }
    }

    /// Resolves a bus timer event into its wake callback. Cancelled timers
    /// fire into nothing.
    pub fn fire_timer(&self, id: TimerId) {
        let wake = self.wakes.borrow_mut().remove(&id);
        if let Some(wake) = wake {
            wake();
        }
    }

    /// Manual mode: moves time forward, firing due timers in deadline order.
    pub fn advance(&self, ms: u64) {
        let Mode::Manual { now, queue, .. } = &self.mode else {
            debug_assert!(false, "advance on a threaded clock");
            return;
        };
        let target = now.get() + ms;
        loop {
            let due = {
                let mut queue = queue.borrow_mut();
                match queue.peek() {
                    Some(Reverse((deadline, _))) if *deadline <= target => {
                        let Reverse((deadline, id)) = queue.pop().unwrap();
                        Some((deadline, id))
                    }
                    _ => None,
                }
            };
            match due {
                None => break,
                Some((deadline, id)) => {
                    now.set(deadline);
                    self.fire_timer(id);
                }
            }
        }
        now.set(target);
    }
}

impl runtime_time::Clock for HostClock {
    fn now_ms(&self) -> u64 {
        match &self.mode {
            Mode::Threaded { start, .. } => start.elapsed().as_millis() as u64,
            Mode::Manual { now, .. } => now.get(),
        }
    }

    fn after(&self, delay_ms: u64, wake: Box<dyn FnOnce()>) -> TimerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.wakes.borrow_mut().insert(id, wake);
        match &self.mode {
            Mode::Threaded { tx, .. } => {
                let tx = tx.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(delay_ms));
                    let _ = tx.send(HostEvent::Timer(id));
                });
            }
            Mode::Manual { now, queue, .. } => {
                queue.borrow_mut().push(Reverse((now.get() + delay_ms, id)));
            }
        }
        id
    }

    fn cancel(&self, id: TimerId) {
        self.wakes.borrow_mut().remove(&id);
    }
}
