//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits state change events on mutations
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple threads
//! - Keeps message statistics across the end of a session

use camino::Utf8PathBuf;
use doasdrive::models::{AccessMode, EngineMessage, SessionPhase, Severity};
use doasdrive::{StateChange, StateManager};
use std::sync::Arc;
use tokio::time::{Duration, timeout};

fn files(names: &[&str]) -> Vec<Utf8PathBuf> {
    names.iter().map(Utf8PathBuf::from).collect()
}

#[tokio::test]
async fn test_session_start_events_emitted() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    state.begin_session(AccessMode::Browse, files(&["a.dat", "b.dat"]));

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");
    assert_eq!(
        event,
        StateChange::SessionStarted {
            mode: AccessMode::Browse,
            file_count: 2
        }
    );

    let event = rx.recv().await.expect("Channel closed");
    assert_eq!(
        event,
        StateChange::PhaseChanged {
            from: SessionPhase::Idle,
            to: SessionPhase::AwaitingOpen
        }
    );

    let event = rx.recv().await.expect("Channel closed");
    assert_eq!(
        event,
        StateChange::FileChanged {
            index: 0,
            file: Utf8PathBuf::from("a.dat")
        }
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(StateManager::new());
    let mut receivers = vec![state.subscribe(), state.subscribe(), state.subscribe()];

    state.update(|s| {
        s.record_count = 4;
        s.current_record = 1;
    });

    for rx in receivers.iter_mut() {
        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Channel closed");
        assert_eq!(
            event,
            StateChange::RecordChanged {
                current: 1,
                total: 4,
                is_first: true,
                is_last: false
            }
        );
    }
}

#[tokio::test]
async fn test_dropped_subscriber_does_not_block_updates() {
    let state = Arc::new(StateManager::new());
    let rx = state.subscribe();
    drop(rx);

    let changes = state.update(|s| s.phase = SessionPhase::Navigating);

    assert_eq!(changes.len(), 1);
    assert_eq!(state.read(|s| s.phase), SessionPhase::Navigating);
}

#[tokio::test]
async fn test_end_session_keeps_statistics() {
    let state = Arc::new(StateManager::new());
    state.begin_session(AccessMode::Analyse, files(&["a.dat"]));
    state.record_messages(&[
        EngineMessage::new(Severity::Warning, "engine", "low signal"),
        EngineMessage::new(Severity::Fatal, "engine", "fit diverged"),
    ]);

    let mut rx = state.subscribe();
    state.end_session();

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");
    assert_eq!(event, StateChange::SessionStopped);

    let snapshot = state.snapshot();
    assert!(!snapshot.is_running);
    assert_eq!(snapshot.phase, SessionPhase::Idle);
    assert_eq!(snapshot.warning_count, 1);
    assert_eq!(snapshot.fatal_count, 1);
    assert_eq!(snapshot.highest_severity, Some(Severity::Fatal));
}

#[tokio::test]
async fn test_reset_emits_state_reset() {
    let state = Arc::new(StateManager::new());
    state.begin_session(AccessMode::Browse, files(&["a.dat"]));
    let mut rx = state.subscribe();

    let changes = state.reset();
    assert_eq!(changes.last(), Some(&StateChange::StateReset));

    let mut saw_reset = false;
    while let Ok(Ok(event)) = timeout(Duration::from_millis(50), rx.recv()).await {
        if event == StateChange::StateReset {
            saw_reset = true;
            break;
        }
    }
    assert!(saw_reset);
    assert!(state.snapshot().files.is_empty());
}

#[test]
fn test_concurrent_message_recording() {
    let state = Arc::new(StateManager::new());
    let mut handles = Vec::new();

    for i in 0..8 {
        let state = Arc::clone(&state);
        handles.push(std::thread::spawn(move || {
            for j in 0..25 {
                state.record_messages(&[EngineMessage::new(
                    Severity::Warning,
                    "worker",
                    format!("warning {}-{}", i, j),
                )]);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(state.read(|s| s.warning_count), 200);
}

#[test]
fn test_clones_share_state() {
    let state = StateManager::new();
    let clone = state.clone();
    let mut rx = clone.subscribe();

    state.update(|s| s.is_running = true);

    assert!(clone.read(|s| s.is_running));
    // No mode set, so there is no SessionStarted event to report
    assert!(rx.try_recv().is_err());
}
