//! Shared fixtures for the integration tests
#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use doasdrive::engine::SimulatedEngine;
use doasdrive::models::{
    DispatcherSettings, EngineMessage, ProjectConfig, SessionSettings, Severity, SharedPage,
    TableCell,
};
use doasdrive::ui::{WakeReceiver, wake_channel};
use doasdrive::{Controller, Dispatcher, Notify, StateManager, Workspace};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// One notification as seen by a view.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Ready(Utf8PathBuf, usize),
    Current(usize),
    End,
    Table(usize),
    Plot(Vec<i32>, Vec<i32>),
    Errors(Severity, Vec<String>),
}

/// Notify implementation recording into a shared list.
#[derive(Clone, Default)]
pub struct RecordingView {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Only the navigation events, without payloads or messages.
    pub fn navigation(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::Ready(..) | Event::Current(_) | Event::End))
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Notify for RecordingView {
    fn notify_ready_to_navigate(&mut self, file: &Utf8Path, record_count: usize) {
        self.push(Event::Ready(file.to_path_buf(), record_count));
    }

    fn notify_current_record(&mut self, record: usize) {
        self.push(Event::Current(record));
    }

    fn notify_end_of_records(&mut self) {
        self.push(Event::End);
    }

    fn notify_table_data(&mut self, cells: &[TableCell]) {
        self.push(Event::Table(cells.len()));
    }

    fn notify_plot_data(&mut self, pages: &[SharedPage], retained: &[i32]) {
        self.push(Event::Plot(
            pages.iter().map(|p| p.number).collect(),
            retained.to_vec(),
        ));
    }

    fn notify_errors(&mut self, highest: Severity, messages: &[EngineMessage]) {
        self.push(Event::Errors(
            highest,
            messages.iter().map(|m| m.message.clone()).collect(),
        ));
    }
}

/// Temporary directory of record files.
pub struct Fixtures {
    dir: TempDir,
}

impl Fixtures {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::try_from(self.dir.path().join(name)).unwrap()
    }

    /// Write a record file with `records` three-value records.
    pub fn record_file(&self, name: &str, records: usize) -> Utf8PathBuf {
        let mut contents = String::from("# site: Uccle\n# instrument: mfdoas\n");
        for i in 0..records {
            contents.push_str(&format!("{} {} {}\n", 100 + i, 200 + i, 300 + i));
        }
        self.write(name, &contents)
    }

    pub fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}

pub fn workspace() -> Workspace {
    let workspace = Workspace::new();
    workspace
        .projects
        .insert(ProjectConfig::new("default"))
        .unwrap();
    workspace
}

pub fn dispatcher() -> (Arc<Dispatcher>, WakeReceiver) {
    let (wake_tx, wake_rx) = wake_channel();
    let dispatcher = Dispatcher::new(
        Box::new(SimulatedEngine::new()),
        DispatcherSettings::default(),
        wake_tx.into_wake_fn(),
    )
    .unwrap();
    dispatcher.set_running(true).unwrap();
    (Arc::new(dispatcher), wake_rx)
}

pub struct Harness {
    pub controller: Controller,
    pub view: RecordingView,
    pub state: Arc<StateManager>,
    pub wake_rx: WakeReceiver,
}

impl Harness {
    pub fn new(settings: SessionSettings) -> Self {
        let (dispatcher, wake_rx) = dispatcher();
        let view = RecordingView::new();
        let state = Arc::new(StateManager::new());
        let controller = Controller::new(
            dispatcher,
            Arc::clone(&state),
            Box::new(view.clone()),
            settings,
        );
        Self {
            controller,
            view,
            state,
            wake_rx,
        }
    }

    /// Pump until every enqueued command has run and its responses were delivered.
    pub fn settle(&mut self) {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let metrics = self.controller.dispatcher().metrics();
            let enqueued = metrics.commands_enqueued.load(Ordering::Relaxed);
            if metrics.executed() == enqueued {
                if self.controller.pump() == 0 {
                    return;
                }
                continue;
            }
            assert!(Instant::now() < deadline, "dispatcher did not settle");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// Advance after every delivered record until the session is over.
    pub fn run_to_completion(&mut self) {
        for _ in 0..1000 {
            self.settle();
            if !self.state.read(|s| s.is_running) {
                return;
            }
            if !self.controller.advance() {
                panic!("session stuck in {:?}", self.state.snapshot().phase);
            }
        }
        panic!("session did not finish");
    }
}
