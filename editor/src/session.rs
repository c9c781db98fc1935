//! Editor session: the composition root between presentation and core.
//!
//! The session owns the selected version, the loaded root entity, its edit
//! history and the background executor. Decoding, encoding and file I/O run
//! on the executor's worker; everything else runs synchronously on the
//! caller's thread. Worker results come back through a presentation queue
//! that the caller drains with [`Session::process_events`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use xdat_core::abstract_editor::{EditActionError, EditActionHistory};
use xdat_core::entity::{FieldPath, SetFieldAction, Value, XdatEntity};
use xdat_core::executor::{
    presentation_queue, Dispatcher, JobId, PresentationEvent, PresentationQueue, TaskExecutor,
    TaskHandle,
};
use xdat_core::registry::{VersionEntry, VersionRegistry};
use xdat_core::{DecodeError, EncodeError, ExecutorError, FieldError, RegistryError, TaskError};

/// Errors surfaced by session operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    History(#[from] EditActionError),

    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    #[error(transparent)]
    Task(Arc<TaskError>),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("no file loaded")]
    NoFileLoaded,

    #[error("no version selected")]
    NoVersionSelected,

    #[error("a load is in progress")]
    LoadInProgress,
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<TaskError> for SessionError {
    fn from(err: TaskError) -> Self {
        let err = match err.downcast::<DecodeError>() {
            Ok(e) => return e.into(),
            Err(err) => err,
        };
        let err = match err.downcast::<EncodeError>() {
            Ok(e) => return e.into(),
            Err(err) => err,
        };
        match err.downcast::<io::Error>() {
            Ok(e) => e.into(),
            Err(err) => Self::Task(Arc::new(err)),
        }
    }
}

/// Lifecycle of the loaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoFileLoaded,
    Loading,
    Loaded,
    /// At least one save is running; edits are still accepted.
    Saving,
}

/// Notification delivered to subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    VersionSelected { label: String },
    StateChanged(SessionState),
    /// A new root entity was loaded.
    EntityReplaced { class_name: String },
    /// The previous root entity was dropped after a failed load.
    EntityCleared,
    FieldChanged { path: FieldPath },
    Undone { description: String },
    Redone { description: String },
    HistoryChanged { can_undo: bool, can_redo: bool },
    BusyChanged(bool),
    LoadFailed(SessionError),
    Saved { has_unsaved_changes: bool },
    SaveFailed(SessionError),
}

enum LoadSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// Results posted from the worker.
///
/// `generation` identifies the load the message belongs to; messages from a
/// superseded load are dropped.
enum WorkerMessage {
    Loaded {
        generation: u64,
        entity: Box<dyn XdatEntity>,
    },
    LoadFailed {
        generation: u64,
        error: SessionError,
    },
    Saved {
        generation: u64,
        revision: u64,
        cursor: usize,
    },
    SaveFailed {
        generation: u64,
        error: SessionError,
    },
}

type Subscriber = Box<dyn FnMut(&SessionEvent)>;

pub struct Session {
    registry: VersionRegistry,
    selected: Option<VersionEntry>,
    entity: Option<Box<dyn XdatEntity>>,
    history: EditActionHistory<Box<dyn XdatEntity>>,
    state: SessionState,
    /// Bumped by every load.
    generation: u64,
    /// Bumped by every recorded edit.
    revision: u64,
    /// Jobs submitted but not yet reported finished.
    outstanding: usize,
    pending_saves: usize,
    last_error: Option<SessionError>,
    subscribers: Vec<Subscriber>,
    // Dropped first so queued jobs finish while the queue is still alive.
    executor: TaskExecutor,
    dispatcher: Dispatcher<WorkerMessage>,
    queue: PresentationQueue<WorkerMessage>,
}

impl Session {
    /// Creates a session and spawns its worker thread.
    pub fn new(registry: VersionRegistry, worker_name: &str) -> io::Result<Self> {
        let (dispatcher, queue) = presentation_queue();
        let executor = TaskExecutor::with_thread_name(worker_name, dispatcher.clone())?;

        Ok(Self {
            registry,
            selected: None,
            entity: None,
            history: EditActionHistory::new(),
            state: SessionState::NoFileLoaded,
            generation: 0,
            revision: 0,
            outstanding: 0,
            pending_saves: 0,
            last_error: None,
            subscribers: Vec::new(),
            executor,
            dispatcher,
            queue,
        })
    }

    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn selected_version(&self) -> Option<&str> {
        self.selected.as_ref().map(VersionEntry::label)
    }

    pub fn entity(&self) -> Option<&dyn XdatEntity> {
        self.entity.as_deref()
    }

    pub fn history(&self) -> &EditActionHistory<Box<dyn XdatEntity>> {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.entity.is_some() && self.history.has_unsaved_changes()
    }

    /// Busy flag as last observed through the presentation queue.
    pub fn is_busy(&self) -> bool {
        self.queue.is_busy()
    }

    /// Takes the most recent background failure, if any.
    pub fn take_error(&mut self) -> Option<SessionError> {
        self.last_error.take()
    }

    /// Registers a callback for every [`SessionEvent`].
    pub fn subscribe(&mut self, subscriber: impl FnMut(&SessionEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Selects the schema version used by subsequent loads.
    ///
    /// An unknown label leaves the selection and the loaded entity untouched.
    pub fn select_version(&mut self, label: &str) -> Result<(), SessionError> {
        let entry = self.registry.resolve(label)?.clone();
        log::info!(
            "Selected version '{}' ({})",
            entry.label(),
            entry.class_name()
        );
        self.selected = Some(entry);
        self.emit(SessionEvent::VersionSelected {
            label: label.to_owned(),
        });
        Ok(())
    }

    /// Decodes `bytes` with the selected version on the worker.
    pub fn load(&mut self, bytes: Vec<u8>) -> Result<JobId, SessionError> {
        self.submit_load(LoadSource::Bytes(bytes))
    }

    /// Reads and decodes a file on the worker.
    pub fn load_file(&mut self, path: impl Into<PathBuf>) -> Result<JobId, SessionError> {
        self.submit_load(LoadSource::File(path.into()))
    }

    fn submit_load(&mut self, source: LoadSource) -> Result<JobId, SessionError> {
        if self.state == SessionState::Loading {
            return Err(SessionError::LoadInProgress);
        }
        let factory = self
            .selected
            .as_ref()
            .ok_or(SessionError::NoVersionSelected)?
            .factory();

        let generation = self.generation + 1;
        let done = self.dispatcher.clone();
        let failed = self.dispatcher.clone();

        let id = self.executor.execute(
            move || {
                let bytes = match source {
                    LoadSource::Bytes(bytes) => bytes,
                    LoadSource::File(path) => {
                        log::info!("Reading {}", path.display());
                        std::fs::read(&path)?
                    }
                };
                let mut entity = factory();
                entity.decode(&bytes)?;
                log::debug!("Decoded {} bytes as {}", bytes.len(), entity.class_name());
                done.send(WorkerMessage::Loaded { generation, entity });
                Ok(())
            },
            move |err| {
                failed.send(WorkerMessage::LoadFailed {
                    generation,
                    error: err.into(),
                });
            },
        )?;

        self.generation = generation;
        self.pending_saves = 0;
        self.outstanding += 1;
        self.set_state(SessionState::Loading);
        Ok(id)
    }

    /// Encodes a snapshot of the current entity on the worker.
    ///
    /// The handle receives the encoded bytes. The history is not modified.
    pub fn save(&mut self) -> Result<TaskHandle<Result<Vec<u8>, SessionError>>, SessionError> {
        self.submit_save(None)
    }

    /// Encodes a snapshot and writes it to `path` on the worker.
    pub fn save_to_file(
        &mut self,
        path: impl Into<PathBuf>,
    ) -> Result<TaskHandle<Result<Vec<u8>, SessionError>>, SessionError> {
        self.submit_save(Some(path.into()))
    }

    fn submit_save(
        &mut self,
        target: Option<PathBuf>,
    ) -> Result<TaskHandle<Result<Vec<u8>, SessionError>>, SessionError> {
        self.ensure_not_loading()?;
        let snapshot = self
            .entity
            .as_ref()
            .ok_or(SessionError::NoFileLoaded)?
            .clone_entity();

        let generation = self.generation;
        let revision = self.revision;
        let cursor = self.history.cursor();
        let (result_tx, handle) = TaskHandle::channel();
        let error_tx = result_tx.clone();
        let done = self.dispatcher.clone();
        let failed = self.dispatcher.clone();

        self.executor.execute(
            move || {
                let bytes = snapshot.encode()?;
                if let Some(path) = &target {
                    write_file(path, &bytes)?;
                    log::info!("Saved {} bytes to {}", bytes.len(), path.display());
                }
                done.send(WorkerMessage::Saved {
                    generation,
                    revision,
                    cursor,
                });
                result_tx.send(Ok(bytes));
                Ok(())
            },
            move |err| {
                let error = SessionError::from(err);
                failed.send(WorkerMessage::SaveFailed {
                    generation,
                    error: error.clone(),
                });
                error_tx.send(Err(error));
            },
        )?;

        self.outstanding += 1;
        self.pending_saves += 1;
        self.set_state(SessionState::Saving);
        Ok(handle)
    }

    /// Replaces the value at `path` and records the change.
    ///
    /// Returns the previous value.
    pub fn apply_edit(&mut self, path: &FieldPath, value: Value) -> Result<Value, SessionError> {
        self.ensure_not_loading()?;
        let entity = self.entity.as_mut().ok_or(SessionError::NoFileLoaded)?;

        let old = entity.set(path, value.clone())?;
        log::debug!("Set {path}: {old} -> {value}");
        self.history
            .record(Box::new(SetFieldAction::new(path.clone(), old.clone(), value)));
        self.revision += 1;

        self.emit(SessionEvent::FieldChanged { path: path.clone() });
        self.emit_history();
        Ok(old)
    }

    /// Parses `path` and `text` against the field's kind, then applies the edit.
    pub fn apply_edit_text(&mut self, path: &str, text: &str) -> Result<Value, SessionError> {
        let path = FieldPath::parse(path)?;
        let kind = self
            .entity
            .as_ref()
            .ok_or(SessionError::NoFileLoaded)?
            .kind_at(&path)?;
        let value = Value::parse_as(kind, text).ok_or_else(|| FieldError::TypeMismatch {
            path: path.to_string(),
            expected: kind.to_string(),
            found: format!("{text:?}"),
        })?;
        self.apply_edit(&path, value)
    }

    pub fn undo(&mut self) -> Result<(), SessionError> {
        self.ensure_not_loading()?;
        let entity = self.entity.as_mut().ok_or(SessionError::NoFileLoaded)?;
        let description = self
            .history
            .undo_descriptions()
            .next()
            .unwrap_or_default()
            .to_owned();

        self.history.undo(entity)?;
        log::debug!("Undo: {description}");
        self.emit(SessionEvent::Undone { description });
        self.emit_history();
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), SessionError> {
        self.ensure_not_loading()?;
        let entity = self.entity.as_mut().ok_or(SessionError::NoFileLoaded)?;
        let description = self
            .history
            .redo_descriptions()
            .next()
            .unwrap_or_default()
            .to_owned();

        self.history.redo(entity)?;
        log::debug!("Redo: {description}");
        self.emit(SessionEvent::Redone { description });
        self.emit_history();
        Ok(())
    }

    /// Drains the presentation queue without blocking.
    ///
    /// Returns the number of events handled.
    pub fn process_events(&mut self) -> usize {
        let events = self.queue.drain();
        let count = events.len();
        for event in events {
            self.handle_event(event);
        }
        count
    }

    /// Blocks until every submitted job has finished, or `timeout` elapses.
    ///
    /// Returns `true` when idle. Intended for headless drivers and tests.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.process_events();

        while self.outstanding > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.queue.next_timeout(deadline - now) {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
        self.outstanding == 0
    }

    /// Stops accepting jobs, waits for queued ones and handles their results.
    pub fn shutdown(&mut self) {
        self.executor.shutdown();
        self.process_events();
    }

    fn ensure_not_loading(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Loading {
            Err(SessionError::LoadInProgress)
        } else {
            Ok(())
        }
    }

    fn handle_event(&mut self, event: PresentationEvent<WorkerMessage>) {
        match event {
            PresentationEvent::Busy(busy) => {
                if !busy {
                    self.outstanding = self.outstanding.saturating_sub(1);
                }
                self.emit(SessionEvent::BusyChanged(busy));
            }
            PresentationEvent::Message(message) => self.handle_message(message),
        }
    }

    fn handle_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Loaded { generation, entity } if generation == self.generation => {
                log::info!("Loaded {}", entity.class_name());
                let class_name = entity.class_name().to_owned();
                self.entity = Some(entity);
                self.history.clear();
                self.set_state(SessionState::Loaded);
                self.emit(SessionEvent::EntityReplaced { class_name });
                self.emit_history();
            }
            WorkerMessage::LoadFailed { generation, error } if generation == self.generation => {
                log::error!("Load failed: {error}");
                self.entity = None;
                self.history.clear();
                self.last_error = Some(error.clone());
                self.set_state(SessionState::NoFileLoaded);
                self.emit(SessionEvent::EntityCleared);
                self.emit_history();
                self.emit(SessionEvent::LoadFailed(error));
            }
            WorkerMessage::Saved {
                generation,
                revision,
                cursor,
            } if generation == self.generation => {
                if revision == self.revision {
                    self.history.mark_saved_at(cursor);
                } else {
                    log::debug!("History changed during save; keeping previous save point");
                }
                self.finish_save();
                self.emit(SessionEvent::Saved {
                    has_unsaved_changes: self.history.has_unsaved_changes(),
                });
            }
            WorkerMessage::SaveFailed { generation, error } if generation == self.generation => {
                log::error!("Save failed: {error}");
                self.last_error = Some(error.clone());
                self.finish_save();
                self.emit(SessionEvent::SaveFailed(error));
            }
            stale => log::debug!("Dropping {stale:?} from a superseded load"),
        }
    }

    fn finish_save(&mut self) {
        self.pending_saves = self.pending_saves.saturating_sub(1);
        if self.pending_saves == 0 && self.state == SessionState::Saving {
            self.set_state(SessionState::Loaded);
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            log::trace!("Session state {:?} -> {state:?}", self.state);
            self.state = state;
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    fn emit_history(&mut self) {
        let event = SessionEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        };
        self.emit(event);
    }

    fn emit(&mut self, event: SessionEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("selected", &self.selected_version())
            .field("history", &self.history)
            .field("executor", &self.executor)
            .finish()
    }
}

impl fmt::Debug for WorkerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded { generation, .. } => write!(f, "Loaded(generation {generation})"),
            Self::LoadFailed { generation, .. } => {
                write!(f, "LoadFailed(generation {generation})")
            }
            Self::Saved { generation, .. } => write!(f, "Saved(generation {generation})"),
            Self::SaveFailed { generation, .. } => {
                write!(f, "SaveFailed(generation {generation})")
            }
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
}
