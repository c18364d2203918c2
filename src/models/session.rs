use crate::models::{AccessMode, Severity};
use camino::Utf8PathBuf;
use std::fmt;

/// Where a navigable file session currently stands.
///
/// ```text
/// Idle -> AwaitingOpen -> (count > 0) Navigating -> EndOfRecords -> Idle
///         AwaitingOpen -> (count == 0) EndOfRecords
/// any  -> (fatal error) Idle
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    AwaitingOpen,
    Navigating,
    EndOfRecords,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::AwaitingOpen => "awaiting-open",
            SessionPhase::Navigating => "navigating",
            SessionPhase::EndOfRecords => "end-of-records",
        };
        f.write_str(label)
    }
}

/// Navigation state owned by the foreground thread.
///
/// Only the controller mutates this, through
/// [`StateManager`](crate::state::StateManager); everyone else reads snapshots
/// or listens to [`StateChange`](crate::state::StateChange) events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub mode: Option<AccessMode>,
    pub is_running: bool,

    // File list of the active session
    pub files: Vec<Utf8PathBuf>,
    pub current_file_index: Option<usize>,
    pub current_file: Option<Utf8PathBuf>,

    // Record navigation
    pub record_count: usize,
    /// Current record (1-based), 0 when no record has been shown yet
    pub current_record: usize,
    /// A navigation request has been queued and its response not yet delivered
    pub awaiting_record: bool,

    // Message statistics for the session
    pub highest_severity: Option<Severity>,
    pub warning_count: usize,
    pub fatal_count: usize,
}

impl SessionState {
    pub fn is_first_record(&self) -> bool {
        self.current_record == 1
    }

    pub fn is_last_record(&self) -> bool {
        self.current_record > 0 && self.current_record == self.record_count
    }

    /// Whether a "next record" request makes sense right now.
    pub fn can_advance(&self) -> bool {
        self.is_running && self.phase == SessionPhase::Navigating && !self.awaiting_record
    }

    /// Index of the file that follows the current one, if any.
    pub fn next_file_index(&self) -> Option<usize> {
        let next = self.current_file_index.map_or(0, |i| i + 1);
        (next < self.files.len()).then_some(next)
    }

    /// Reset navigation fields to the idle state, keeping message statistics.
    pub fn reset_navigation(&mut self) {
        self.phase = SessionPhase::Idle;
        self.is_running = false;
        self.awaiting_record = false;
        self.current_record = 0;
        self.record_count = 0;
    }

    /// Clear everything, including the file list and statistics.
    pub fn reset(&mut self) {
        *self = SessionState::default();
    }
}
