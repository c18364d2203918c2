// Responses - the outcome of one executed command
//
// A response is created on the worker thread, filled in by the engine through
// `ResultSink`, moved onto the outbound queue and consumed exactly once on the
// foreground thread by `deliver`.

use super::dispatcher::Ticket;
use crate::engine::{ResultSink, Status};
use crate::models::{
    CellValue, EngineMessage, MessageLog, PlotDataSet, PlotImage, PlotPage, Severity, SharedPage,
    TableCell,
};
use crate::ui::controller::Notify;
use camino::Utf8PathBuf;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of a record navigation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The engine moved to this record (1-based)
    Found(usize),
    /// No more matching records
    Exhausted,
    /// The engine reported an error code
    Error(i32),
}

impl From<Status> for RecordOutcome {
    fn from(status: Status) -> Self {
        match status.value() {
            0 => RecordOutcome::Exhausted,
            n if n > 0 => RecordOutcome::Found(n as usize),
            code => RecordOutcome::Error(code),
        }
    }
}

/// What kind of command produced the response, with its kind-specific data.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseKind {
    /// Only messages are delivered
    Message,
    /// Table and plot payloads, then messages
    Visual,
    /// Result of opening a file
    BeginAccess {
        file: Utf8PathBuf,
        record_count: usize,
    },
    /// Result of a record navigation request
    Record { outcome: RecordOutcome },
}

#[derive(Debug, Default)]
struct PageContent {
    title: String,
    tag: String,
    plots: Vec<Arc<PlotDataSet>>,
    cells: Vec<TableCell>,
    images: Vec<PlotImage>,
}

impl PageContent {
    fn has_plot_content(&self) -> bool {
        !self.plots.is_empty() || !self.images.is_empty()
    }
}

/// Messages and payloads produced by one command.
#[derive(Debug)]
pub struct Response {
    kind: ResponseKind,
    ticket: Ticket,
    messages: MessageLog,
    pages: BTreeMap<i32, PageContent>,
    retained: Vec<i32>,
}

impl Response {
    fn with_kind(kind: ResponseKind) -> Self {
        Self {
            kind,
            ticket: 0,
            messages: MessageLog::new(),
            pages: BTreeMap::new(),
            retained: Vec::new(),
        }
    }

    pub fn message() -> Self {
        Self::with_kind(ResponseKind::Message)
    }

    pub fn visual() -> Self {
        Self::with_kind(ResponseKind::Visual)
    }

    pub fn begin_access(file: impl Into<Utf8PathBuf>) -> Self {
        Self::with_kind(ResponseKind::BeginAccess {
            file: file.into(),
            record_count: 0,
        })
    }

    pub fn record() -> Self {
        Self::with_kind(ResponseKind::Record {
            outcome: RecordOutcome::Exhausted,
        })
    }

    pub fn kind(&self) -> &ResponseKind {
        &self.kind
    }

    /// Ticket of the command that posted this response, 0 if it had none.
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub(crate) fn set_ticket(&mut self, ticket: Ticket) {
        self.ticket = ticket;
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.messages.highest()
    }

    pub fn is_fatal(&self) -> bool {
        self.messages.is_fatal()
    }

    /// Record the file's record count (begin-access responses only).
    pub fn set_record_count(&mut self, count: usize) {
        if let ResponseKind::BeginAccess { record_count, .. } = &mut self.kind {
            *record_count = count;
        }
    }

    /// Record the navigation outcome (record responses only).
    pub fn set_outcome(&mut self, value: RecordOutcome) {
        if let ResponseKind::Record { outcome } = &mut self.kind {
            *outcome = value;
        }
    }

    /// Whether any table, plot, image or retained page is attached.
    pub fn has_visual_payload(&self) -> bool {
        !self.retained.is_empty()
            || self
                .pages
                .values()
                .any(|p| p.has_plot_content() || !p.cells.is_empty())
    }

    fn page_mut(&mut self, page: i32) -> &mut PageContent {
        self.pages.entry(page).or_default()
    }

    /// Forward messages; returns whether the highest severity was fatal.
    fn deliver_messages(&self, notify: &mut dyn Notify) -> bool {
        if let Some(highest) = self.messages.highest() {
            notify.notify_errors(highest, self.messages.entries());
        }
        self.messages.is_fatal()
    }

    /// Table first, then plots: the view lays out a page from its cells.
    fn deliver_visual(&mut self, notify: &mut dyn Notify) {
        let cells: Vec<TableCell> = self
            .pages
            .values_mut()
            .flat_map(|p| std::mem::take(&mut p.cells))
            .collect();
        if !cells.is_empty() {
            notify.notify_table_data(&cells);
        }

        let pages: Vec<SharedPage> = std::mem::take(&mut self.pages)
            .into_iter()
            .filter(|(_, content)| content.has_plot_content())
            .map(|(number, content)| {
                SharedPage::new(PlotPage {
                    number,
                    title: content.title,
                    tag: content.tag,
                    plots: content.plots,
                    images: content.images,
                })
            })
            .collect();
        if !pages.is_empty() || !self.retained.is_empty() {
            notify.notify_plot_data(&pages, &self.retained);
        }
    }

    /// Hand the response to the controller. Consumes the response.
    pub fn deliver(mut self, notify: &mut dyn Notify) {
        match self.kind.clone() {
            ResponseKind::Message => {
                self.deliver_messages(notify);
            }
            ResponseKind::Visual => {
                if !self.is_fatal() && self.has_visual_payload() {
                    self.deliver_visual(notify);
                }
                self.deliver_messages(notify);
            }
            ResponseKind::BeginAccess { file, record_count } => {
                if !self.is_fatal() && self.has_visual_payload() {
                    self.deliver_visual(notify);
                }
                if self.deliver_messages(notify) {
                    return;
                }
                if record_count > 0 {
                    notify.notify_ready_to_navigate(&file, record_count);
                } else {
                    notify.notify_end_of_records();
                }
            }
            ResponseKind::Record { outcome } => {
                if self.deliver_messages(notify) {
                    return;
                }
                match outcome {
                    RecordOutcome::Found(record) => {
                        self.deliver_visual(notify);
                        notify.notify_current_record(record);
                    }
                    RecordOutcome::Exhausted | RecordOutcome::Error(_) => {
                        notify.notify_end_of_records();
                    }
                }
            }
        }
    }
}

impl ResultSink for Response {
    fn add_message(&mut self, tag: &str, message: &str, severity: Severity) {
        self.messages.push(EngineMessage::new(severity, tag, message));
    }

    fn add_plot(&mut self, page: i32, plot: PlotDataSet) {
        self.page_mut(page).plots.push(Arc::new(plot));
    }

    fn add_cell(&mut self, page: i32, row: usize, column: usize, value: CellValue) {
        self.page_mut(page).cells.push(TableCell {
            page,
            row,
            column,
            value,
        });
    }

    fn add_image(&mut self, image: PlotImage) {
        self.page_mut(image.page).images.push(image);
    }

    fn set_page_title(&mut self, page: i32, title: &str, tag: &str) {
        let content = self.page_mut(page);
        content.title = title.to_string();
        content.tag = tag.to_string();
    }

    fn retain_page(&mut self, page: i32) {
        if !self.retained.contains(&page) {
            self.retained.push(page);
        }
    }
}
