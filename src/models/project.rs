use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a file is opened by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    Browse,
    Export,
    Analyse,
    Calibrate,
}

impl AccessMode {
    /// Modes that need analysis windows loaded before a file is opened.
    pub fn needs_analysis_windows(self) -> bool {
        matches!(self, AccessMode::Analyse | AccessMode::Calibrate)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccessMode::Browse => "browse",
            AccessMode::Export => "export",
            AccessMode::Analyse => "analyse",
            AccessMode::Calibrate => "calibrate",
        };
        f.write_str(label)
    }
}

/// Cross section used by an analysis window, keyed by symbol name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossSectionRef {
    pub symbol: String,
    pub file: Utf8PathBuf,
}

/// Spectral window over which a fit is performed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub fit_min_nm: f64,
    pub fit_max_nm: f64,
    #[serde(default)]
    pub reference_file: Option<Utf8PathBuf>,
    #[serde(default)]
    pub cross_sections: Vec<CrossSectionRef>,
}

impl AnalysisWindow {
    pub fn new(name: impl Into<String>, fit_min_nm: f64, fit_max_nm: f64) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            fit_min_nm,
            fit_max_nm,
            reference_file: None,
            cross_sections: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Record selection applied when a file is browsed or analysed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSelection {
    /// First record to consider (1-based), `None` for the start of the file
    pub first_record: Option<usize>,
    /// Last record to consider (1-based, inclusive), `None` for the end
    pub last_record: Option<usize>,
}

impl RecordSelection {
    pub fn contains(&self, record: usize) -> bool {
        self.first_record.is_none_or(|first| record >= first)
            && self.last_record.is_none_or(|last| record <= last)
    }
}

/// Complete project settings handed to the engine.
///
/// Commands carry their own deep copy, so later edits in the workspace never
/// reach a command that is already queued.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub instrument_format: String,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub selection: RecordSelection,
    #[serde(default)]
    pub output_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub windows: Vec<AnalysisWindow>,
}

impl ProjectConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instrument_format: "ascii".to_string(),
            ..Self::default()
        }
    }

    /// Analysis windows that take part in a run.
    pub fn enabled_windows(&self) -> Vec<AnalysisWindow> {
        self.windows.iter().filter(|w| w.enabled).cloned().collect()
    }
}

/// Named molecule/cross-section symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Symbol {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Observation site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    #[serde(default)]
    pub abbreviation: String,
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default)]
    pub altitude_m: f64,
}

impl Site {
    pub fn new(name: impl Into<String>, longitude: f64, latitude: f64) -> Self {
        Self {
            name: name.into(),
            abbreviation: String::new(),
            longitude,
            latitude,
            altitude_m: 0.0,
        }
    }
}
