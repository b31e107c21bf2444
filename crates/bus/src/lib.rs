use core_types::TimerId;
use std::sync::mpsc::{Receiver, Sender, channel};

/// Events posted to the runtime loop from host-side threads (frame and
/// timer clocks). Everything crossing the channel is plain data; all
/// runtime state stays on the loop thread.
#[derive(Debug)]
pub enum HostEvent {
    /// An animation frame became due.
    Frame,
    /// The timer registered under this id expired.
    Timer(TimerId),
    /// Ask the event loop to exit.
    Quit,
}

pub struct Bus {
    pub evt_tx: Sender<HostEvent>,
    pub evt_rx: Receiver<HostEvent>,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    pub fn new() -> Bus {
        let (evt_tx, evt_rx) = channel();
        Bus { evt_tx, evt_rx }
    }
}
