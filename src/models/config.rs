use crate::models::Severity;
use serde::{Deserialize, Serialize};

/// Complete settings tree loaded from `doasdrive.yaml` and the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub dispatcher: DispatcherSettings,
    pub session: SessionSettings,
    pub logging: LoggingSettings,
}

/// Worker thread settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    pub worker_thread_name: String,

    /// Drains returning more responses than this are logged as a warning
    pub response_batch_warn: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            worker_thread_name: "doasdrive-engine".to_string(),
            response_batch_warn: 256,
        }
    }
}

/// Foreground session behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Open the next file of the session once a file runs out of records
    pub auto_advance_files: bool,

    /// Messages below this level are logged but not forwarded to the view.
    /// Fatal messages are always forwarded.
    pub min_reported_severity: Severity,

    /// Queue a Stop request when the last file of a session is exhausted
    pub stop_engine_on_finish: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auto_advance_files: true,
            min_reported_severity: Severity::Info,
            stop_engine_on_finish: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub directory: String,
    pub prefix: String,
    pub debug: bool,
    pub console: bool,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            prefix: "doasdrive".to_string(),
            debug: false,
            console: true,
            json: false,
        }
    }
}
