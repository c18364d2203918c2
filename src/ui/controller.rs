// Controller - foreground consumer of dispatcher responses
//
// The controller sits between the dispatcher and whichever view is active.
// It builds commands for the user's requests, drains responses when the wake
// bridge fires, and implements the notification boundary: every
// notification updates the session state and is then forwarded to the view.
//
// Each session's commands carry the session's ticket. Responses stamped with
// a ticket other than the active one belong to a stopped session; they reach
// the view without touching navigation state.

use crate::dispatch::{
    AdvanceRecord, BeginFileAccess, Command, CompoundCommand, Dispatcher, GotoRecord,
    SetAnalysisWindows, SetProjectConfig, SetSiteTable, SetSymbolTable, Stop, Ticket,
    ViewCrossSections,
};
use crate::models::{
    AccessMode, EngineMessage, SessionPhase, SessionSettings, Severity, SharedPage, TableCell,
};
use crate::registry::Workspace;
use crate::state::StateManager;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Notification boundary between delivered responses and the UI.
///
/// [`Response::deliver`](crate::dispatch::Response::deliver) calls these in a
/// fixed order; implementations only ever run on the foreground thread.
#[cfg_attr(test, mockall::automock)]
pub trait Notify {
    /// A file was opened and has `record_count` records to step through.
    fn notify_ready_to_navigate(&mut self, file: &Utf8Path, record_count: usize);

    /// Record `record` (1-based) is now displayed.
    fn notify_current_record(&mut self, record: usize);

    /// No further record is available in the open file.
    fn notify_end_of_records(&mut self);

    /// Table cells for the current record. Always delivered before plot data.
    fn notify_table_data(&mut self, cells: &[TableCell]);

    /// Plot pages for the current record plus the page numbers whose
    /// previous content must be kept.
    fn notify_plot_data(&mut self, pages: &[SharedPage], retained: &[i32]);

    /// Engine messages of one response, with their highest severity.
    fn notify_errors(&mut self, highest: Severity, messages: &[EngineMessage]);
}

/// View that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNotify;

impl Notify for NullNotify {
    fn notify_ready_to_navigate(&mut self, _file: &Utf8Path, _record_count: usize) {}
    fn notify_current_record(&mut self, _record: usize) {}
    fn notify_end_of_records(&mut self) {}
    fn notify_table_data(&mut self, _cells: &[TableCell]) {}
    fn notify_plot_data(&mut self, _pages: &[SharedPage], _retained: &[i32]) {}
    fn notify_errors(&mut self, _highest: Severity, _messages: &[EngineMessage]) {}
}

/// Receives the responses of a session that is no longer active.
///
/// Payloads and messages still reach the view; navigation notifications and
/// fatal errors no longer affect any session.
struct LateDelivery<'a> {
    view: &'a mut dyn Notify,
    threshold: Severity,
}

impl Notify for LateDelivery<'_> {
    fn notify_ready_to_navigate(&mut self, file: &Utf8Path, _record_count: usize) {
        tracing::debug!("Ignoring late open of {}", file);
    }

    fn notify_current_record(&mut self, record: usize) {
        tracing::debug!("Ignoring late record {}", record);
    }

    fn notify_end_of_records(&mut self) {
        tracing::debug!("Ignoring late end of records");
    }

    fn notify_table_data(&mut self, cells: &[TableCell]) {
        self.view.notify_table_data(cells);
    }

    fn notify_plot_data(&mut self, pages: &[SharedPage], retained: &[i32]) {
        self.view.notify_plot_data(pages, retained);
    }

    fn notify_errors(&mut self, highest: Severity, messages: &[EngineMessage]) {
        messages.iter().for_each(log_message);
        let reported = reportable(messages, self.threshold);
        if !reported.is_empty() {
            self.view.notify_errors(highest, &reported);
        }
    }
}

fn log_message(message: &EngineMessage) {
    match message.severity {
        Severity::Info => tracing::info!("[{}] {}", message.tag, message.message),
        Severity::Warning => tracing::warn!("[{}] {}", message.tag, message.message),
        Severity::Fatal => tracing::error!("[{}] {}", message.tag, message.message),
    }
}

/// Messages at or above `threshold`; fatal ones always pass.
fn reportable(messages: &[EngineMessage], threshold: Severity) -> Vec<EngineMessage> {
    messages
        .iter()
        .filter(|m| m.severity >= threshold || m.severity == Severity::Fatal)
        .cloned()
        .collect()
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ControllerError {
    #[error("No files given for the session")]
    NoFiles,

    #[error("Project '{0}' not found")]
    UnknownProject(String),

    #[error("A session is already running")]
    SessionActive,

    #[error("Record {record} is out of range (file has {count} records)")]
    RecordOutOfRange { record: usize, count: usize },
}

/// Foreground-thread coordinator for file sessions.
///
/// # Example
/// ```ignore
/// let (wake_tx, mut wake_rx) = wake_channel();
/// let dispatcher = Arc::new(Dispatcher::new(engine, settings.dispatcher, wake_tx.into_wake_fn())?);
/// dispatcher.set_running(true)?;
///
/// let mut controller = Controller::new(dispatcher, state, Box::new(view), settings.session);
/// controller.start_session(&workspace, "default", AccessMode::Browse, files)?;
/// while wake_rx.blocking_wait() {
///     controller.pump();
/// }
/// ```
pub struct Controller {
    dispatcher: Arc<Dispatcher>,
    state: Arc<StateManager>,
    view: Box<dyn Notify>,
    settings: SessionSettings,
    /// Ticket of the running session
    session: Option<Ticket>,
    last_ticket: Ticket,
}

impl Controller {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        state: Arc<StateManager>,
        view: Box<dyn Notify>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            dispatcher,
            state,
            view,
            settings,
            session: None,
            last_ticket: 0,
        }
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Enqueue an arbitrary command.
    pub fn submit(&self, command: Box<dyn Command>) {
        self.dispatcher.enqueue(command);
    }

    /// Drain the response queue and deliver every response in order.
    ///
    /// Returns the number of responses delivered.
    pub fn pump(&mut self) -> usize {
        let responses = self.dispatcher.drain_responses();
        let count = responses.len();
        for response in responses {
            let ticket = response.ticket();
            if ticket != 0 && self.session != Some(ticket) {
                tracing::trace!(
                    "Delivering late {:?} response of session {}",
                    response.kind(),
                    ticket
                );
                response.deliver(&mut LateDelivery {
                    view: self.view.as_mut(),
                    threshold: self.settings.min_reported_severity,
                });
            } else {
                tracing::trace!("Delivering {:?} response", response.kind());
                response.deliver(self);
            }
        }
        count
    }

    /// Configure the engine from `workspace` and open the first of `files`.
    pub fn start_session(
        &mut self,
        workspace: &Workspace,
        project_name: &str,
        mode: AccessMode,
        files: Vec<Utf8PathBuf>,
    ) -> Result<(), ControllerError> {
        let Some(first) = files.first().cloned() else {
            return Err(ControllerError::NoFiles);
        };
        if self.state.read(|s| s.is_running) {
            return Err(ControllerError::SessionActive);
        }
        let project = workspace
            .projects
            .get(project_name)
            .ok_or_else(|| ControllerError::UnknownProject(project_name.to_string()))?;

        let mut setup = CompoundCommand::new()
            .with(SetProjectConfig::new(project.clone()))
            .with(SetSymbolTable::new(workspace.symbols.snapshot()))
            .with(SetSiteTable::new(workspace.sites.snapshot()));
        if mode.needs_analysis_windows() {
            setup.push(SetAnalysisWindows::new(project.enabled_windows(), mode));
        }
        setup.push(BeginFileAccess::new(mode, first));

        tracing::info!(
            "Starting {} session on {} file(s) with project '{}'",
            mode,
            files.len(),
            project_name
        );
        self.last_ticket += 1;
        self.session = Some(self.last_ticket);
        self.state.begin_session(mode, files);
        self.enqueue_for_session(Box::new(setup));
        Ok(())
    }

    /// Request the next record. Returns whether a request was enqueued.
    pub fn advance(&mut self) -> bool {
        let Some(mode) = self.claim_navigation() else {
            return false;
        };
        self.enqueue_for_session(Box::new(AdvanceRecord::new(mode)));
        true
    }

    /// Request a given record. Returns whether a request was enqueued.
    pub fn goto_record(&mut self, record: usize) -> Result<bool, ControllerError> {
        let count = self.state.read(|s| s.record_count);
        if record == 0 || record > count {
            return Err(ControllerError::RecordOutOfRange { record, count });
        }
        let Some(mode) = self.claim_navigation() else {
            return Ok(false);
        };
        self.enqueue_for_session(Box::new(GotoRecord::new(mode, record)));
        Ok(true)
    }

    /// Abort the running session. Returns whether one was running.
    pub fn stop_session(&mut self) -> bool {
        if !self.state.read(|s| s.is_running) {
            return false;
        }
        tracing::info!("Session stopped by user");
        self.enqueue_for_session(Box::new(Stop));
        self.end_session();
        true
    }

    /// Plot the cross sections of an analysis window.
    pub fn view_cross_sections(&self, window: &str, files: Vec<Utf8PathBuf>) {
        self.dispatcher
            .enqueue(Box::new(ViewCrossSections::new(window, files)));
    }

    fn enqueue_for_session(&self, command: Box<dyn Command>) {
        self.dispatcher
            .enqueue_with_ticket(self.session.unwrap_or(0), command);
    }

    /// Return to idle; responses still in flight become late.
    fn end_session(&mut self) {
        self.state.end_session();
        self.session = None;
    }

    /// Mark a navigation request outstanding, if one is allowed now.
    fn claim_navigation(&self) -> Option<AccessMode> {
        let mut claimed = None;
        self.state.update(|state| {
            if state.can_advance() {
                state.awaiting_record = true;
                claimed = state.mode;
            }
        });
        claimed
    }

    fn open_next_file(&mut self) -> bool {
        if !self.settings.auto_advance_files {
            return false;
        }
        let Some((index, file, mode)) = self.state.read(|s| {
            let index = s.next_file_index()?;
            Some((index, s.files[index].clone(), s.mode?))
        }) else {
            return false;
        };

        tracing::info!("Opening next file {} ({})", file, index + 1);
        self.state.update(|state| {
            state.current_file_index = Some(index);
            state.current_file = Some(file.clone());
            state.phase = SessionPhase::AwaitingOpen;
            state.record_count = 0;
            state.current_record = 0;
            state.awaiting_record = false;
        });
        self.enqueue_for_session(Box::new(BeginFileAccess::new(mode, file)));
        true
    }

    fn finish_session(&mut self) {
        tracing::info!("Session finished");
        if self.settings.stop_engine_on_finish {
            self.enqueue_for_session(Box::new(Stop));
        }
        self.end_session();
    }
}

impl Notify for Controller {
    fn notify_ready_to_navigate(&mut self, file: &Utf8Path, record_count: usize) {
        if !self.state.read(|s| s.is_running) {
            tracing::debug!("Ignoring late open of {}, no session running", file);
            return;
        }
        self.state.update(|state| {
            state.phase = SessionPhase::Navigating;
            state.record_count = record_count;
            state.current_record = 0;
            state.awaiting_record = false;
        });
        self.view.notify_ready_to_navigate(file, record_count);
    }

    fn notify_current_record(&mut self, record: usize) {
        if !self.state.read(|s| s.is_running) {
            tracing::debug!("Ignoring late record {}, no session running", record);
            return;
        }
        self.state.update(|state| {
            state.current_record = record;
            state.awaiting_record = false;
        });
        self.view.notify_current_record(record);
    }

    fn notify_end_of_records(&mut self) {
        if !self.state.read(|s| s.is_running) {
            tracing::debug!("Ignoring late end of records, no session running");
            return;
        }
        self.state.update(|state| {
            state.phase = SessionPhase::EndOfRecords;
            state.awaiting_record = false;
        });
        self.view.notify_end_of_records();

        if !self.open_next_file() {
            self.finish_session();
        }
    }

    fn notify_table_data(&mut self, cells: &[TableCell]) {
        self.view.notify_table_data(cells);
    }

    fn notify_plot_data(&mut self, pages: &[SharedPage], retained: &[i32]) {
        self.view.notify_plot_data(pages, retained);
    }

    fn notify_errors(&mut self, highest: Severity, messages: &[EngineMessage]) {
        messages.iter().for_each(log_message);
        self.state.record_messages(messages);

        let reported = reportable(messages, self.settings.min_reported_severity);
        if !reported.is_empty() {
            self.view.notify_errors(highest, &reported);
        }

        if highest == Severity::Fatal {
            tracing::error!("Fatal engine error, session aborted");
            self.end_session();
        }
    }
}
