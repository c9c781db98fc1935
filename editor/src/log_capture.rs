use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use log::Log;
use parking_lot::Mutex;

/// A single captured log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Position in the capture stream; increases by one per entry.
    pub seq: u64,
    pub level: log::Level,
    pub target: String,
    pub message: String,
    pub timestamp: Instant,
}

/// Ring buffer of captured log entries.
#[derive(Debug)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    max_capacity: usize,
    next_seq: u64,
}

impl LogBuffer {
    fn new(max_capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_capacity.min(1024)),
            max_capacity,
            next_seq: 0,
        }
    }

    pub fn entries(&self) -> &VecDeque<LogEntry> {
        &self.entries
    }

    /// Sequence number the next captured entry will get.
    pub fn mark(&self) -> u64 {
        self.next_seq
    }

    /// Warnings and errors captured at or after `mark`, oldest first.
    pub fn problems_since(&self, mark: u64) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.seq >= mark && e.level <= log::Level::Warn)
            .cloned()
            .collect()
    }

    fn push(&mut self, level: log::Level, target: &str, message: String) {
        if self.entries.len() >= self.max_capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            seq: self.next_seq,
            level,
            target: target.to_owned(),
            message,
            timestamp: Instant::now(),
        });
        self.next_seq += 1;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Shared handle to the capture buffer.
pub type LogHandle = Arc<Mutex<LogBuffer>>;

/// Logger that forwards to `env_logger` and keeps a copy in the ring buffer.
struct LogCapture {
    inner: env_logger::Logger,
    buffer: LogHandle,
}

impl Log for LogCapture {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.inner.enabled(record.metadata()) {
            // Forward to env_logger (prints to stderr)
            self.inner.log(record);

            self.buffer
                .lock()
                .push(record.level(), record.target(), record.args().to_string());
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Default number of entries kept in the buffer.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Installs the capturing logger as the global logger.
///
/// `RUST_LOG` takes precedence over `default_filter`. Fails if a logger is
/// already installed.
pub fn install(default_filter: &str) -> Result<LogHandle, log::SetLoggerError> {
    let inner =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
            .build();
    let (logger, buffer) = capture(inner, DEFAULT_CAPACITY);
    let max_level = logger.inner.filter();

    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(max_level);
    Ok(buffer)
}

fn capture(inner: env_logger::Logger, capacity: usize) -> (LogCapture, LogHandle) {
    let buffer = Arc::new(Mutex::new(LogBuffer::new(capacity)));
    let logger = LogCapture {
        inner,
        buffer: buffer.clone(),
    };
    (logger, buffer)
}
