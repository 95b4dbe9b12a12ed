//! FIFO of input events waiting to be applied.
//!
//! Unbounded: events are never dropped or coalesced, only delayed while an
//! export is running.

use quoteme_scene_model::event::InputEvent;
use tokio::sync::mpsc;

/// Producer handle given to whatever delivers platform input.
#[derive(Debug, Clone)]
pub struct InputSender {
    tx: mpsc::UnboundedSender<InputEvent>,
}

impl InputSender {
    /// Queue an event. Returns `false` once the session is gone.
    pub fn send(&self, event: InputEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Receiving end, owned by the session.
#[derive(Debug)]
pub struct InputQueue {
    tx: mpsc::UnboundedSender<InputEvent>,
    rx: mpsc::UnboundedReceiver<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> InputSender {
        InputSender {
            tx: self.tx.clone(),
        }
    }

    /// Take every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}
