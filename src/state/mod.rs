// State management module
//
// This module provides the StateManager which wraps SessionState with thread-safe
// access using Arc<RwLock<T>> and emits change events for views and tests.

use crate::models::{AccessMode, EngineMessage, SessionPhase, SessionState, Severity};
use camino::Utf8PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when session state is modified
///
/// These events let interested parties follow a session without polling the
/// state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A session has started on a list of files
    SessionStarted { mode: AccessMode, file_count: usize },

    /// The session is no longer running
    SessionStopped,

    /// The navigation phase has changed
    PhaseChanged { from: SessionPhase, to: SessionPhase },

    /// A different file of the session is being opened
    FileChanged { index: usize, file: Utf8PathBuf },

    /// The record position or record count has changed
    RecordChanged {
        current: usize,
        total: usize,
        is_first: bool,
        is_last: bool,
    },

    /// Message statistics have changed
    MessagesRecorded {
        highest: Option<Severity>,
        warnings: usize,
        fatals: usize,
    },

    /// State has been reset
    StateReset,
}

/// Thread-safe session state with event emission
///
/// - [`read()`](Self::read) for reading state
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
///
/// The [`Controller`](crate::ui::Controller) is the only writer; views and
/// tests read snapshots or subscribe.
pub struct StateManager {
    state: Arc<RwLock<SessionState>>,

    /// Multiple subscribers can listen for state changes
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with an idle session and a 100 event buffer
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            state_tx,
        }
    }

    /// Get a clone of the current state
    pub fn snapshot(&self) -> SessionState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let can_advance = state_manager.read(|state| state.can_advance());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SessionState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// Captures the old state, applies `update_fn`, detects what changed and
    /// broadcasts one event per change. Returns the emitted events.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut SessionState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);
        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(old: &SessionState, new: &SessionState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.is_running != new.is_running {
            if new.is_running {
                if let Some(mode) = new.mode {
                    changes.push(StateChange::SessionStarted {
                        mode,
                        file_count: new.files.len(),
                    });
                }
            } else {
                changes.push(StateChange::SessionStopped);
            }
        }

        if old.phase != new.phase {
            changes.push(StateChange::PhaseChanged {
                from: old.phase,
                to: new.phase,
            });
        }

        if old.current_file_index != new.current_file_index
            || old.current_file != new.current_file
        {
            if let (Some(index), Some(file)) = (new.current_file_index, &new.current_file) {
                changes.push(StateChange::FileChanged {
                    index,
                    file: file.clone(),
                });
            }
        }

        if old.current_record != new.current_record || old.record_count != new.record_count {
            changes.push(StateChange::RecordChanged {
                current: new.current_record,
                total: new.record_count,
                is_first: new.is_first_record(),
                is_last: new.is_last_record(),
            });
        }

        if old.highest_severity != new.highest_severity
            || old.warning_count != new.warning_count
            || old.fatal_count != new.fatal_count
        {
            changes.push(StateChange::MessagesRecorded {
                highest: new.highest_severity,
                warnings: new.warning_count,
                fatals: new.fatal_count,
            });
        }

        changes
    }

    // Convenience methods for common state updates

    /// Start a session on `files`, opening the first one
    pub fn begin_session(&self, mode: AccessMode, files: Vec<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|state| {
            state.reset();
            state.mode = Some(mode);
            state.current_file = files.first().cloned();
            state.current_file_index = state.current_file.as_ref().map(|_| 0);
            state.files = files;
            state.phase = SessionPhase::AwaitingOpen;
            state.is_running = true;
        })
    }

    /// Fold a batch of engine messages into the session statistics
    pub fn record_messages(&self, messages: &[EngineMessage]) -> Vec<StateChange> {
        self.update(|state| {
            for message in messages {
                match message.severity {
                    Severity::Warning => state.warning_count += 1,
                    Severity::Fatal => state.fatal_count += 1,
                    _ => {}
                }
                if state.highest_severity.is_none_or(|h| message.severity > h) {
                    state.highest_severity = Some(message.severity);
                }
            }
        })
    }

    /// Stop navigation and return to idle, keeping message statistics
    pub fn end_session(&self) -> Vec<StateChange> {
        self.update(|state| state.reset_navigation())
    }

    /// Reset everything
    pub fn reset(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| state.reset());

        let reset_event = StateChange::StateReset;
        let _ = self.state_tx.send(reset_event.clone());
        changes.push(reset_event);

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across threads
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<Utf8PathBuf> {
        names.iter().map(Utf8PathBuf::from).collect()
    }

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert_eq!(state.phase, SessionPhase::Idle);
        assert!(!state.is_running);
        assert!(state.files.is_empty());
    }

    #[test]
    fn test_begin_session_events() {
        let manager = StateManager::new();

        let changes = manager.begin_session(AccessMode::Browse, files(&["a.dat", "b.dat"]));

        assert_eq!(
            changes,
            vec![
                StateChange::SessionStarted {
                    mode: AccessMode::Browse,
                    file_count: 2,
                },
                StateChange::PhaseChanged {
                    from: SessionPhase::Idle,
                    to: SessionPhase::AwaitingOpen,
                },
                StateChange::FileChanged {
                    index: 0,
                    file: Utf8PathBuf::from("a.dat"),
                },
            ]
        );
        assert!(manager.read(|s| s.is_running));
    }

    #[test]
    fn test_record_change_flags() {
        let manager = StateManager::new();
        manager.update(|state| state.record_count = 2);

        let changes = manager.update(|state| state.current_record = 2);

        assert_eq!(
            changes,
            vec![StateChange::RecordChanged {
                current: 2,
                total: 2,
                is_first: false,
                is_last: true,
            }]
        );
    }

    #[test]
    fn test_no_change_no_event() {
        let manager = StateManager::new();
        let changes = manager.update(|state| state.awaiting_record = false);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_record_messages_tracks_highest() {
        let manager = StateManager::new();

        manager.record_messages(&[
            EngineMessage::new(Severity::Warning, "io", "bad token"),
            EngineMessage::new(Severity::Info, "io", "ok"),
        ]);
        let state = manager.snapshot();
        assert_eq!(state.highest_severity, Some(Severity::Warning));
        assert_eq!(state.warning_count, 1);

        manager.record_messages(&[EngineMessage::new(Severity::Fatal, "io", "gone")]);
        let state = manager.snapshot();
        assert_eq!(state.highest_severity, Some(Severity::Fatal));
        assert_eq!(state.fatal_count, 1);
    }

    #[test]
    fn test_end_session_keeps_statistics() {
        let manager = StateManager::new();
        manager.begin_session(AccessMode::Browse, files(&["a.dat"]));
        manager.record_messages(&[EngineMessage::new(Severity::Warning, "io", "w")]);

        let changes = manager.end_session();

        assert!(changes.contains(&StateChange::SessionStopped));
        let state = manager.snapshot();
        assert_eq!(state.phase, SessionPhase::Idle);
        assert_eq!(state.warning_count, 1);
    }

    #[test]
    fn test_reset_emits_reset_event() {
        let manager = StateManager::new();
        manager.begin_session(AccessMode::Export, files(&["a.dat"]));

        let changes = manager.reset();

        assert_eq!(changes.last(), Some(&StateChange::StateReset));
        assert_eq!(manager.snapshot(), SessionState::default());
    }

    #[tokio::test]
    async fn test_subscribe_receives_events() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.update(|state| state.phase = SessionPhase::Navigating);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            StateChange::PhaseChanged {
                from: SessionPhase::Idle,
                to: SessionPhase::Navigating,
            }
        );
    }

    #[test]
    fn test_clone_shares_state() {
        let manager = StateManager::new();
        let clone = manager.clone();

        manager.update(|state| state.record_count = 5);

        assert_eq!(clone.read(|s| s.record_count), 5);
    }
}
