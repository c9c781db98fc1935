//! xdat editor: session, built-in schema classes and the ambient pieces the
//! command-line front end needs (configuration, preferences, log capture).

pub mod config;
pub mod log_capture;
pub mod prefs;
pub mod schemas;
pub mod session;

pub use config::EditorConfig;
pub use prefs::Preferences;
pub use session::{Session, SessionError, SessionEvent, SessionState};
