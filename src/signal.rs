use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;

/// Single-slot notifier from the tray to the UI controller.
///
/// `notify` never blocks: while a signal is pending, further posts are
/// dropped rather than queued. The sampler has no business with this
/// channel; it only carries "show the window".
pub struct ShowSignal {
    tx: SyncSender<()>,
    rx: Mutex<Receiver<()>>,
}

impl ShowSignal {
    pub fn new() -> Self {
        let (tx, rx) = sync_channel(1);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn notify(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                log::warn!("Show signal receiver is gone");
            }
        }
    }

    /// Block until a signal arrives, consuming it. Returns false only if
    /// no signal can ever arrive again.
    pub fn wait(&self) -> bool {
        let rx = match self.rx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rx.recv().is_ok()
    }
}

impl Default for ShowSignal {
    fn default() -> Self {
        Self::new()
    }
}
