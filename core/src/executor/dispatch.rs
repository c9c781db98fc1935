//! Worker-to-presentation dispatch.
//!
//! The worker never touches presentation state directly. Busy transitions
//! and task results are sent as [`PresentationEvent`]s over a channel that
//! the interactive context drains on its own schedule.

use std::sync::mpsc;
use std::time::Duration;

/// One item delivered to the interactive context.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent<M> {
    /// A task started (`true`) or finished (`false`).
    Busy(bool),
    /// A result or notification produced by a task.
    Message(M),
}

/// Receives busy transitions from the executor's worker thread.
///
/// A panicking sink is logged by the worker and does not stop it.
pub trait BusySink: Send + 'static {
    fn publish_busy(&self, busy: bool);
}

impl<F> BusySink for F
where
    F: Fn(bool) + Send + 'static,
{
    fn publish_busy(&self, busy: bool) {
        self(busy)
    }
}

/// Sending half of the presentation queue. Cheap to clone; one clone per task
/// that needs to report back.
pub struct Dispatcher<M> {
    tx: mpsc::Sender<PresentationEvent<M>>,
}

impl<M> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<M> Dispatcher<M> {
    /// Posts a message to the interactive context.
    ///
    /// Returns `false` if the queue has been dropped.
    pub fn send(&self, message: M) -> bool {
        self.tx.send(PresentationEvent::Message(message)).is_ok()
    }
}

impl<M: Send + 'static> BusySink for Dispatcher<M> {
    fn publish_busy(&self, busy: bool) {
        if self.tx.send(PresentationEvent::Busy(busy)).is_err() {
            log::trace!("Presentation queue closed; dropping busy={busy}");
        }
    }
}

/// Receiving half, owned by the interactive context.
///
/// Tracks the busy flag as events are consumed, so [`is_busy`](Self::is_busy)
/// always reflects what the interactive context has observed so far.
pub struct PresentationQueue<M> {
    rx: mpsc::Receiver<PresentationEvent<M>>,
    busy: bool,
}

impl<M> PresentationQueue<M> {
    /// Takes the next pending event without blocking.
    pub fn try_next(&mut self) -> Option<PresentationEvent<M>> {
        let event = self.rx.try_recv().ok()?;
        self.observe(&event);
        Some(event)
    }

    /// Drains all events available right now.
    pub fn drain(&mut self) -> Vec<PresentationEvent<M>> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }

    /// Waits up to `timeout` for the next event.
    ///
    /// Blocks the calling thread; only headless drivers should use this.
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<PresentationEvent<M>> {
        let event = self.rx.recv_timeout(timeout).ok()?;
        self.observe(&event);
        Some(event)
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    fn observe(&mut self, event: &PresentationEvent<M>) {
        if let PresentationEvent::Busy(busy) = event {
            self.busy = *busy;
        }
    }
}

/// Creates a connected dispatcher/queue pair.
pub fn presentation_queue<M>() -> (Dispatcher<M>, PresentationQueue<M>) {
    let (tx, rx) = mpsc::channel();
    (Dispatcher { tx }, PresentationQueue { rx, busy: false })
}
