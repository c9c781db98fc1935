//! Single-worker task executor.
//!
//! Every submitted [`Job`] runs on one dedicated, named worker thread in
//! submission order. Around each job the executor publishes a busy flag
//! through a [`BusySink`]: `true` before the task body runs, `false` after
//! its error and finally handlers have returned. Failures, including panics
//! in the task body, are routed to the job's error handler on the worker.
//!
//! ```ignore
//! let (dispatcher, mut queue) = presentation_queue::<Loaded>();
//! let executor = TaskExecutor::new(dispatcher.clone())?;
//!
//! executor.execute_with_finally(
//!     move || { dispatcher.send(decode(&bytes)?); Ok(()) },
//!     |err| log::error!("load failed: {err}"),
//!     || log::debug!("load finished"),
//! )?;
//!
//! // Each frame:
//! for event in queue.drain() { /* ... */ }
//! ```

mod dispatch;
mod handle;

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::error::{ExecutorError, TaskError};

pub use dispatch::{presentation_queue, BusySink, Dispatcher, PresentationEvent, PresentationQueue};
pub use handle::{TaskHandle, TaskResultSender};

/// Identifier assigned to a job at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type TaskFn = Box<dyn FnOnce() -> Result<(), TaskError> + Send>;
type ErrorFn = Box<dyn FnOnce(TaskError) + Send>;
type FinallyFn = Box<dyn FnOnce() + Send>;

/// A unit of work plus its optional error and finally handlers.
pub struct Job {
    task: TaskFn,
    on_error: Option<ErrorFn>,
    on_finally: Option<FinallyFn>,
}

impl Job {
    pub fn new<T>(task: T) -> Self
    where
        T: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        Self {
            task: Box::new(task),
            on_error: None,
            on_finally: None,
        }
    }

    /// Called on the worker if the task fails or panics.
    ///
    /// Without one, failures are logged at warn level and dropped.
    pub fn on_error<E>(mut self, handler: E) -> Self
    where
        E: FnOnce(TaskError) + Send + 'static,
    {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Called on the worker exactly once after the task and any error
    /// handler, before the busy flag clears.
    pub fn on_finally<F>(mut self, handler: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_finally = Some(Box::new(handler));
        self
    }
}

struct Queued {
    id: JobId,
    job: Job,
}

/// Serializes jobs onto a single background worker.
///
/// Jobs never overlap, are never dropped and run FIFO. Dropping the executor
/// waits for every queued job to finish.
pub struct TaskExecutor {
    sender: Mutex<Option<mpsc::Sender<Queued>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
    thread_name: String,
}

impl TaskExecutor {
    pub const DEFAULT_THREAD_NAME: &'static str = "xdat-worker";

    /// Spawns the worker thread with the default name.
    pub fn new(busy: impl BusySink) -> io::Result<Self> {
        Self::with_thread_name(Self::DEFAULT_THREAD_NAME, busy)
    }

    pub fn with_thread_name(name: impl Into<String>, busy: impl BusySink) -> io::Result<Self> {
        let thread_name = name.into();
        let (tx, rx) = mpsc::channel::<Queued>();

        let worker = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || worker_loop(rx, busy))?;
        log::debug!("Task executor worker '{thread_name}' started");

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            next_id: AtomicU64::new(0),
            thread_name,
        })
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Whether the executor still accepts jobs.
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Enqueues a job.
    pub fn submit(&self, job: Job) -> Result<JobId, ExecutorError> {
        let sender = self.sender.lock();
        let tx = sender.as_ref().ok_or(ExecutorError::ShutDown)?;

        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tx.send(Queued { id, job })
            .map_err(|_| ExecutorError::ShutDown)?;
        log::trace!("Queued job {id}");
        Ok(id)
    }

    /// Enqueues `task`, routing its failure to `on_error`.
    pub fn execute<T, E>(&self, task: T, on_error: E) -> Result<JobId, ExecutorError>
    where
        T: FnOnce() -> Result<(), TaskError> + Send + 'static,
        E: FnOnce(TaskError) + Send + 'static,
    {
        self.submit(Job::new(task).on_error(on_error))
    }

    /// Like [`execute`](Self::execute), also running `on_finally` after the
    /// task whether or not it failed.
    pub fn execute_with_finally<T, E, F>(
        &self,
        task: T,
        on_error: E,
        on_finally: F,
    ) -> Result<JobId, ExecutorError>
    where
        T: FnOnce() -> Result<(), TaskError> + Send + 'static,
        E: FnOnce(TaskError) + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        self.submit(Job::new(task).on_error(on_error).on_finally(on_finally))
    }

    /// Closes the queue, lets already-queued jobs finish and joins the worker.
    ///
    /// Idempotent. Calling it from a job running on the worker only closes
    /// the queue.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());

        let mut slot = self.worker.lock();
        let Some(worker) = slot.take_if(|w| w.thread().id() != thread::current().id()) else {
            return;
        };
        drop(slot);
        if worker.join().is_err() {
            log::error!("Task executor worker '{}' panicked", self.thread_name);
        } else {
            log::debug!("Task executor worker '{}' stopped", self.thread_name);
        }
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("thread_name", &self.thread_name)
            .field("running", &self.is_running())
            .finish()
    }
}

fn worker_loop(rx: mpsc::Receiver<Queued>, busy: impl BusySink) {
    while let Ok(Queued { id, job }) = rx.recv() {
        run_job(id, job, &busy);
    }
}

/// Publishes `busy = false` when dropped.
struct ClearBusy<'a> {
    id: JobId,
    busy: &'a dyn BusySink,
}

impl Drop for ClearBusy<'_> {
    fn drop(&mut self) {
        guarded(self.id, "busy sink", || self.busy.publish_busy(false));
    }
}

fn run_job(id: JobId, job: Job, busy: &dyn BusySink) {
    let Job {
        task,
        on_error,
        on_finally,
    } = job;

    guarded(id, "busy sink", || busy.publish_busy(true));
    let _clear = ClearBusy { id, busy };
    log::trace!("Running job {id}");

    let outcome = match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(result) => result,
        Err(payload) => Err(TaskError::from_panic(payload)),
    };

    if let Err(err) = outcome {
        match on_error {
            Some(handler) => guarded(id, "error handler", move || handler(err)),
            None => log::warn!("Job {id} failed: {err}"),
        }
    }

    if let Some(handler) = on_finally {
        guarded(id, "finally handler", handler);
    }
}

/// Runs a handler, logging instead of propagating a panic.
fn guarded(id: JobId, what: &str, handler: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(handler)) {
        log::error!("Job {id} {what}: {}", TaskError::from_panic(payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn recording_executor() -> (TaskExecutor, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink_log = log.clone();
        let executor = TaskExecutor::new(move |busy: bool| {
            sink_log.lock().push(format!("busy:{busy}"));
        })
        .unwrap();
        (executor, log)
    }

    #[test]
    fn jobs_run_in_fifo_order() {
        let (executor, _) = recording_executor();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = order.clone();
            executor
                .execute(
                    move || {
                        order.lock().push(i);
                        Ok(())
                    },
                    |_| {},
                )
                .unwrap();
        }
        executor.shutdown();

        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn jobs_never_overlap() {
        let (executor, _) = recording_executor();
        let running = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));

        for _ in 0..8 {
            let running = running.clone();
            let overlapped = overlapped.clone();
            executor
                .execute(
                    move || {
                        if running.swap(true, Ordering::SeqCst) {
                            overlapped.store(true, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_millis(2));
                        running.store(false, Ordering::SeqCst);
                        Ok(())
                    },
                    |_| {},
                )
                .unwrap();
        }
        executor.shutdown();

        assert!(!overlapped.load(Ordering::SeqCst));
    }

    #[test]
    fn busy_alternates_through_presentation_queue() {
        let (dispatcher, mut queue) = presentation_queue::<()>();
        let executor = TaskExecutor::new(dispatcher).unwrap();

        executor.execute(|| Ok(()), |_| {}).unwrap();
        executor
            .execute(|| Err(TaskError::new("nope")), |_| {})
            .unwrap();
        executor.execute(|| panic!("boom"), |_| {}).unwrap();
        executor.shutdown();

        let busy: Vec<bool> = queue
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                PresentationEvent::Busy(b) => Some(b),
                PresentationEvent::Message(()) => None,
            })
            .collect();
        assert_eq!(busy, vec![true, false, true, false, true, false]);
        assert!(!queue.is_busy());
    }

    #[test]
    fn finally_runs_before_busy_clears() {
        let (executor, log) = recording_executor();
        let task_log = log.clone();
        let error_log = log.clone();
        let finally_log = log.clone();

        executor
            .execute_with_finally(
                move || {
                    task_log.lock().push("task".into());
                    Err(TaskError::new("bad input"))
                },
                move |err| error_log.lock().push(format!("error:{err}")),
                move || finally_log.lock().push("finally".into()),
            )
            .unwrap();
        executor.shutdown();

        assert_eq!(
            *log.lock(),
            vec![
                "busy:true",
                "task",
                "error:bad input",
                "finally",
                "busy:false"
            ]
        );
    }

    #[test]
    fn panic_in_task_is_routed_to_error_handler() {
        let (executor, _) = recording_executor();
        let (tx, handle) = TaskHandle::channel();

        executor
            .execute(|| panic!("decoder exploded"), move |err| {
                tx.send(err);
            })
            .unwrap();

        let err = handle.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(&err, TaskError::Panicked(msg) if msg == "decoder exploded"));
    }

    #[test]
    fn panicking_busy_sink_does_not_stop_the_worker() {
        let publishes = Arc::new(AtomicU64::new(0));
        let sink_publishes = publishes.clone();
        let executor = TaskExecutor::new(move |busy: bool| {
            let n = sink_publishes.fetch_add(1, Ordering::SeqCst);
            if busy && n == 0 {
                panic!("sink exploded");
            }
        })
        .unwrap();
        let ran = Arc::new(Mutex::new(Vec::new()));

        for i in 0..2 {
            let ran = ran.clone();
            executor
                .execute(
                    move || {
                        ran.lock().push(i);
                        Ok(())
                    },
                    |_| {},
                )
                .unwrap();
        }
        executor.shutdown();

        assert_eq!(*ran.lock(), vec![0, 1]);
        assert_eq!(publishes.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn panicking_handlers_do_not_stop_the_worker() {
        let (executor, log) = recording_executor();
        let finally_log = log.clone();
        let next_log = log.clone();

        executor
            .execute_with_finally(
                || Err(TaskError::new("first")),
                |_| panic!("error handler exploded"),
                move || finally_log.lock().push("finally".into()),
            )
            .unwrap();
        executor
            .submit(Job::new(|| Ok(())).on_finally(|| panic!("finally exploded")))
            .unwrap();
        executor
            .execute(
                move || {
                    next_log.lock().push("next".into());
                    Ok(())
                },
                |_| {},
            )
            .unwrap();
        executor.shutdown();

        assert_eq!(
            *log.lock(),
            vec![
                "busy:true",
                "finally",
                "busy:false",
                "busy:true",
                "busy:false",
                "busy:true",
                "next",
                "busy:false",
            ]
        );
    }

    #[test]
    fn failure_without_error_handler_is_swallowed() {
        let (executor, log) = recording_executor();
        let next_log = log.clone();

        executor
            .submit(Job::new(|| Err(TaskError::new("ignored"))))
            .unwrap();
        executor
            .submit(Job::new(move || {
                next_log.lock().push("next".into());
                Ok(())
            }))
            .unwrap();
        executor.shutdown();

        assert!(log.lock().contains(&"next".to_string()));
    }

    #[test]
    fn shutdown_drains_queued_jobs() {
        let (executor, _) = recording_executor();
        let count = Arc::new(AtomicU64::new(0));

        for _ in 0..6 {
            let count = count.clone();
            executor
                .execute(
                    move || {
                        thread::sleep(Duration::from_millis(1));
                        count.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    },
                    |_| {},
                )
                .unwrap();
        }
        executor.shutdown();

        assert_eq!(count.load(Ordering::SeqCst), 6);
        assert!(!executor.is_running());
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let (executor, _) = recording_executor();
        executor.shutdown();
        executor.shutdown();
        assert_eq!(
            executor.execute(|| Ok(()), |_| {}),
            Err(ExecutorError::ShutDown)
        );
    }

    #[test]
    fn job_ids_increase() {
        let (executor, _) = recording_executor();
        let a = executor.execute(|| Ok(()), |_| {}).unwrap();
        let b = executor.execute(|| Ok(()), |_| {}).unwrap();
        assert!(a < b);
        assert_eq!(a.to_string(), "#0");
    }

    #[test]
    fn worker_thread_is_named() {
        let executor = TaskExecutor::with_thread_name("test-worker", |_: bool| {}).unwrap();
        let (tx, handle) = TaskHandle::channel();
        executor
            .execute(
                move || {
                    tx.send(thread::current().name().map(str::to_owned));
                    Ok(())
                },
                |_| {},
            )
            .unwrap();

        assert_eq!(
            handle.recv_timeout(Duration::from_secs(5)).unwrap().as_deref(),
            Some("test-worker")
        );
        assert_eq!(executor.thread_name(), "test-worker");
    }
}
