//! Run events and failure reporting.
//!
//! A [`RecipeObserver`] receives [`RecipeEvent`]s while a recipe runs, and the final error (with
//! a [`RecipeSeverity`]) when it fails. Observers are how the engine logs: [`StdErrObserver`]
//! prints one line per event, [`FileObserver`] appends them to a file, and
//! [`CompositeObserver`] fans out to several.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::RecipeError;
use crate::execution::HashMetricsSnapshot;

/// Severity classification used for failure callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RecipeSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (the run failed).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

impl RecipeSeverity {
    /// Severity of a failed run.
    pub fn of(error: &RecipeError) -> Self {
        match error.root() {
            RecipeError::Io(_) => Self::Critical,
            RecipeError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => Self::Critical,
                _ => Self::Error,
            },
            _ => Self::Error,
        }
    }
}

/// Events emitted during a run.
#[derive(Debug, Clone)]
pub enum RecipeEvent {
    /// The input was read and every row built.
    RowsBuilt { rows: usize, elapsed: Duration },
    OperationStarted {
        name: String,
        operation: String,
        from_state: Option<String>,
        input_rows: usize,
    },
    /// `output_rows` is `None` for terminal operations.
    OperationFinished {
        name: String,
        output_rows: Option<usize>,
        elapsed: Duration,
    },
    StateRetained { name: String, rows: usize },
    /// A hashing task waited for admission.
    HashThrottled { row: usize, waited: Duration },
    /// A hashing fan-out completed.
    FilesHashed { metrics: HashMetricsSnapshot },
    RunFinished { elapsed: Duration },
}

/// Observer interface for recipe runs.
///
/// Implementors can record metrics, logs, or trigger alerts. Every method has a no-op default.
pub trait RecipeObserver: Send + Sync {
    fn on_event(&self, _event: &RecipeEvent) {}

    /// Called when a run fails.
    fn on_failure(&self, _severity: RecipeSeverity, _error: &RecipeError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, severity: RecipeSeverity, error: &RecipeError) {
        self.on_failure(severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn RecipeObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn RecipeObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl RecipeObserver for CompositeObserver {
    fn on_event(&self, event: &RecipeEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }

    fn on_failure(&self, severity: RecipeSeverity, error: &RecipeError) {
        for o in &self.observers {
            o.on_failure(severity, error);
        }
    }

    fn on_alert(&self, severity: RecipeSeverity, error: &RecipeError) {
        for o in &self.observers {
            o.on_alert(severity, error);
        }
    }
}

/// Logs events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl RecipeObserver for StdErrObserver {
    fn on_event(&self, event: &RecipeEvent) {
        eprintln!("[recipe] {}", describe(event));
    }

    fn on_failure(&self, severity: RecipeSeverity, error: &RecipeError) {
        eprintln!("[recipe][{severity:?}] err={error}");
    }

    fn on_alert(&self, severity: RecipeSeverity, error: &RecipeError) {
        eprintln!("[ALERT][recipe][{severity:?}] err={error}");
    }
}

/// Appends events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl RecipeObserver for FileObserver {
    fn on_event(&self, event: &RecipeEvent) {
        self.append_line(&format!("{} {}", unix_ts(), describe(event)));
    }

    fn on_failure(&self, severity: RecipeSeverity, error: &RecipeError) {
        self.append_line(&format!("{} fail severity={severity:?} err={error}", unix_ts()));
    }

    fn on_alert(&self, severity: RecipeSeverity, error: &RecipeError) {
        self.append_line(&format!("{} ALERT severity={severity:?} err={error}", unix_ts()));
    }
}

fn describe(event: &RecipeEvent) -> String {
    match event {
        RecipeEvent::RowsBuilt { rows, elapsed } => format!("rows built rows={rows} elapsed={elapsed:?}"),
        RecipeEvent::OperationStarted {
            name,
            operation,
            from_state,
            input_rows,
        } => format!(
            "op started name={name} operation={operation} from_state={} input_rows={input_rows}",
            from_state.as_deref().unwrap_or("-")
        ),
        RecipeEvent::OperationFinished {
            name,
            output_rows,
            elapsed,
        } => match output_rows {
            Some(n) => format!("op finished name={name} output_rows={n} elapsed={elapsed:?}"),
            None => format!("op finished name={name} terminal elapsed={elapsed:?}"),
        },
        RecipeEvent::StateRetained { name, rows } => format!("state kept name={name} rows={rows}"),
        RecipeEvent::HashThrottled { row, waited } => format!("hash throttled row={row} waited={waited:?}"),
        RecipeEvent::FilesHashed { metrics } => format!("files hashed {metrics}"),
        RecipeEvent::RunFinished { elapsed } => format!("run finished elapsed={elapsed:?}"),
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failures_are_critical() {
        let io = RecipeError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(RecipeSeverity::of(&io), RecipeSeverity::Critical);

        let wrapped = RecipeError::Operation {
            name: "out".into(),
            operation: "toFile".into(),
            source: Box::new(io),
        };
        assert_eq!(RecipeSeverity::of(&wrapped), RecipeSeverity::Critical);

        let state = RecipeError::StateNotFound { state: "x".into() };
        assert_eq!(RecipeSeverity::of(&state), RecipeSeverity::Error);
    }

    #[test]
    fn file_observer_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let obs = FileObserver::new(&path);

        obs.on_event(&RecipeEvent::StateRetained { name: "s".into(), rows: 3 });
        obs.on_failure(RecipeSeverity::Error, &RecipeError::StateNotFound { state: "x".into() });

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("state kept name=s rows=3"));
        assert!(lines[1].contains("fail severity=Error"));
    }
}
