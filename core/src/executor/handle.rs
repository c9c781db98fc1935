use std::sync::mpsc;
use std::time::Duration;

/// Handle to the result of a task running on the worker.
///
/// The interactive context polls it with [`try_recv`](Self::try_recv);
/// headless drivers may block with [`recv`](Self::recv) or
/// [`recv_timeout`](Self::recv_timeout).
pub struct TaskHandle<T> {
    receiver: mpsc::Receiver<T>,
}

/// Sending side of a [`TaskHandle`], moved into the task.
///
/// Clones share the handle; the first value sent is the one the handle sees
/// first, which lets a task and its error handler each hold a sender.
pub struct TaskResultSender<T> {
    sender: mpsc::Sender<T>,
}

impl<T> Clone for TaskResultSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> TaskResultSender<T> {
    /// Delivers the result. Returns `false` if the handle was dropped.
    pub fn send(self, value: T) -> bool {
        self.sender.send(value).is_ok()
    }
}

impl<T> TaskHandle<T> {
    /// Creates a connected sender/handle pair.
    pub fn channel() -> (TaskResultSender<T>, Self) {
        let (sender, receiver) = mpsc::channel();
        (TaskResultSender { sender }, Self { receiver })
    }

    /// Attempts to retrieve the result without blocking.
    ///
    /// Consumes the value; subsequent calls return `None`.
    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Blocks until the task delivers its result.
    ///
    /// Returns `None` if the task finished without sending.
    pub fn recv(self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Blocks for at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.receiver.recv_timeout(timeout).ok()
    }
}
