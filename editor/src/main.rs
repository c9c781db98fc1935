use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use xdat_core::entity::{FieldPath, Value};
use xdat_core::registry::VersionRegistry;
use xdat_editor::log_capture::{self, LogEntry};
use xdat_editor::prefs::{self, Geometry, Preferences};
use xdat_editor::{config, schemas, EditorConfig, Session, SessionError};

/// Headless front end for the xdat editor.
#[derive(Parser, Debug)]
#[command(
    name = "xdat-editor",
    about = "Inspect and edit versioned xdat data files",
    long_about = "Inspect and edit versioned xdat data files.\n\n\
        The schema version is chosen with --version; when omitted, the version \
        used last time is reused.\n\
        \n\
        EXAMPLES:\n\
          # List known schema versions\n\
          xdat-editor versions\n\
        \n\
          # Print one field\n\
          xdat-editor show interface.xdat --version Gracia --path 'windows[0].name'\n\
        \n\
          # Hide a window and write the result elsewhere\n\
          xdat-editor edit interface.xdat --set 'windows[0].visible=false' -o out.xdat",
    version
)]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered schema versions.
    Versions,

    /// Load a file and print its fields.
    Show {
        input: PathBuf,

        /// Schema version label.
        #[arg(long = "version", value_name = "LABEL")]
        schema: Option<String>,

        /// Print only this field, e.g. `windows[0].name`.
        #[arg(long)]
        path: Option<String>,
    },

    /// Apply field edits to a file and save it.
    Edit {
        input: PathBuf,

        /// Schema version label.
        #[arg(long = "version", value_name = "LABEL")]
        schema: Option<String>,

        /// Field assignment; may be repeated.
        #[arg(long = "set", value_name = "PATH=VALUE", required = true)]
        sets: Vec<String>,

        /// Undo the last N edits before saving.
        #[arg(long, default_value_t = 0)]
        undo: usize,

        /// Output file. Defaults to overwriting the input.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print stored preferences, optionally updating the window placement.
    Prefs {
        /// Main window placement.
        #[arg(long, value_name = "X,Y,WIDTH,HEIGHT")]
        geometry: Option<Geometry>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("failed to start worker thread: {0}")]
    Worker(#[from] std::io::Error),

    #[error("no version given and none remembered; pass --version (known: {0})")]
    NoVersion(String),

    #[error("invalid assignment '{0}': expected PATH=VALUE")]
    BadAssignment(String),

    #[error("timed out waiting for a background task")]
    Timeout,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = EditorConfig::load(&cli.config);
    let filter = loaded
        .as_ref()
        .map_or(config::DEFAULT_LOG_FILTER, |c| c.log_filter.as_str());
    let logs = match log_capture::install(filter) {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("failed to install logger: {err}");
            None
        }
    };
    let config = EditorConfig::or_default(loaded);
    let mark = logs.as_ref().map_or(0, |l| l.lock().mark());

    let result = run(cli.command, &cli.config, &config);

    if let Some(logs) = &logs {
        report_problems(&logs.lock().problems_since(mark));
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config_path: &Path, config: &EditorConfig) -> Result<(), CliError> {
    let table = config.version_table_path(config_path);
    let (registry, report) = schemas::build_registry(table.as_deref());
    if !report.is_clean() {
        log::warn!(
            "{} version table rows skipped; see warnings above",
            report.warnings.len()
        );
    }
    let timeout = Duration::from_secs(config.task_timeout_secs);
    let mut prefs = Preferences::load(&config.prefs_file);

    match command {
        Command::Versions => {
            for entry in registry.entries() {
                println!("{}\t{}", entry.label(), entry.class_name());
            }
        }
        Command::Show {
            input,
            schema,
            path,
        } => {
            let session = open(registry, config, &mut prefs, &input, schema, timeout)?;
            let entity = session.entity().ok_or(SessionError::NoFileLoaded)?;
            match path {
                Some(path) => {
                    let path = FieldPath::parse(&path).map_err(SessionError::from)?;
                    println!("{}", entity.get(&path).map_err(SessionError::from)?);
                }
                None => print_value(entity.root(), "", 0),
            }
        }
        Command::Edit {
            input,
            schema,
            sets,
            undo,
            output,
        } => {
            let mut session = open(registry, config, &mut prefs, &input, schema, timeout)?;
            for assignment in &sets {
                let (path, text) = parse_assignment(assignment)?;
                let old = session.apply_edit_text(path, text)?;
                log::info!("{path}: {old} -> {text}");
            }
            for _ in 0..undo {
                session.undo()?;
            }

            let target = output.unwrap_or(input);
            let bytes = session
                .save_to_file(&target)?
                .recv_timeout(timeout)
                .ok_or(CliError::Timeout)??;
            session.wait_idle(timeout);
            println!("Wrote {} bytes to {}", bytes.len(), target.display());
        }
        Command::Prefs { geometry } => {
            if let Some(geometry) = geometry {
                prefs.set_window_geometry(geometry);
            }
            println!("file\t{}", prefs.path().display());
            for key in [prefs::LAST_OPENED, prefs::LAST_VERSION] {
                println!("{key}\t{}", prefs.get(key).unwrap_or("-"));
            }
            match prefs.window_geometry() {
                Some(geometry) => println!("{}\t{geometry}", prefs::WINDOW_GEOMETRY),
                None => println!("{}\t-", prefs::WINDOW_GEOMETRY),
            }
        }
    }

    if let Err(err) = prefs.save() {
        log::warn!("{err}");
    }
    Ok(())
}

/// Creates a session and loads `input` with the requested or remembered version.
fn open(
    registry: VersionRegistry,
    config: &EditorConfig,
    prefs: &mut Preferences,
    input: &Path,
    version: Option<String>,
    timeout: Duration,
) -> Result<Session, CliError> {
    let label = version
        .or_else(|| prefs.get(prefs::LAST_VERSION).map(str::to_owned))
        .ok_or_else(|| CliError::NoVersion(registry.labels().collect::<Vec<_>>().join(", ")))?;

    let mut session = Session::new(registry, &config.worker_thread)?;
    session.subscribe(|event| log::trace!("Session event: {event:?}"));
    session.select_version(&label)?;
    session.load_file(input)?;

    if !session.wait_idle(timeout) {
        return Err(CliError::Timeout);
    }
    if let Some(err) = session.take_error() {
        return Err(err.into());
    }

    prefs.set(prefs::LAST_OPENED, input.display().to_string());
    prefs.set(prefs::LAST_VERSION, label);
    Ok(session)
}

/// Splits `PATH=VALUE`, trimming both sides.
///
/// Quote a string value to keep surrounding spaces: `name=" bag"`.
fn parse_assignment(assignment: &str) -> Result<(&str, &str), CliError> {
    match assignment.split_once('=') {
        Some((path, text)) if !path.trim().is_empty() => Ok((path.trim(), text.trim())),
        _ => Err(CliError::BadAssignment(assignment.to_owned())),
    }
}

fn print_value(value: &Value, label: &str, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Map(fields) => {
            let depth = if label.is_empty() {
                depth
            } else {
                println!("{indent}{label}:");
                depth + 1
            };
            for (name, field) in fields {
                print_value(field, name, depth);
            }
        }
        Value::List(items) => {
            println!("{indent}{label}: {} items", items.len());
            for (i, item) in items.iter().enumerate() {
                print_value(item, &format!("[{i}]"), depth + 1);
            }
        }
        scalar => println!("{indent}{label} = {scalar}"),
    }
}

fn report_problems(problems: &[LogEntry]) {
    if problems.is_empty() {
        return;
    }
    println!("{} problem(s) reported:", problems.len());
    for entry in problems {
        println!("  [{}] {}", entry.level, entry.message);
    }
}
