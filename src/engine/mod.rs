//! Engine boundary - the only way the dispatcher talks to the numerical engine.
//!
//! Two boundaries live here:
//!
//! - [`Engine`]: the call boundary consumed by commands. Every entry point takes
//!   the session's [`EngineHandle`], typed arguments and a [`ResultSink`], and
//!   returns an integer [`Status`] (`>= 0` success or a count, `< 0` error).
//! - [`ResultSink`]: the population boundary exposed to the engine side. The
//!   engine reports messages and attaches plot/table/image payloads through it
//!   before returning; the dispatcher never inspects engine internals.
//!
//! An engine is not reentrant. The [`Dispatcher`](crate::dispatch::Dispatcher)
//! moves it onto its worker thread and calls it from there only, one request
//! at a time.

pub mod simulated;

use crate::models::{
    AccessMode, AnalysisWindow, CellValue, PlotDataSet, PlotImage, ProjectConfig, Severity, Site,
    Symbol,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use thiserror::Error;

pub use simulated::SimulatedEngine;

/// Opaque token identifying one engine context.
///
/// Created once by [`Engine::create_context`] and consumed by
/// [`Engine::destroy_context`]; it cannot be cloned, so there is exactly one
/// owner at a time.
#[derive(Debug, PartialEq, Eq)]
pub struct EngineHandle(u64);

impl EngineHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Integer status returned by every engine entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status(pub i32);

impl Status {
    pub const OK: Status = Status(0);
    pub const ERROR: Status = Status(-1);

    pub fn is_ok(self) -> bool {
        self.0 >= 0
    }

    pub fn value(self) -> i32 {
        self.0
    }

    /// Success status carrying a record number or count, saturating at `i32::MAX`.
    pub fn from_count(count: usize) -> Status {
        Status(i32::try_from(count).unwrap_or(i32::MAX))
    }

    /// Non-negative status as a count, `None` for errors.
    pub fn count(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failures of the engine context lifecycle.
///
/// Request-level problems are not errors at this level: they travel as
/// messages inside the response.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to create engine context: {0}")]
    ContextCreation(String),

    #[error("Failed to release engine context {0}: {1}")]
    ContextRelease(u64, String),
}

/// Population boundary: how the engine hands results back.
pub trait ResultSink {
    /// Append a message; the sink keeps track of the highest severity.
    fn add_message(&mut self, tag: &str, message: &str, severity: Severity);

    /// Attach a plot to a page.
    fn add_plot(&mut self, page: i32, plot: PlotDataSet);

    /// Attach a table cell to a page.
    fn add_cell(&mut self, page: i32, row: usize, column: usize, value: CellValue);

    /// Attach an already-rendered image.
    fn add_image(&mut self, image: PlotImage);

    /// Set the title and tag of a page.
    fn set_page_title(&mut self, page: i32, title: &str, tag: &str);

    /// Ask the display to keep what it currently shows for this page.
    fn retain_page(&mut self, page: i32);
}

/// Call boundary of the external engine.
///
/// Implementations run on the dispatcher's worker thread only. Each method is
/// a synchronous, potentially long-running call.
pub trait Engine: Send {
    fn create_context(&mut self) -> Result<EngineHandle, EngineError>;

    fn destroy_context(&mut self, handle: EngineHandle) -> Result<(), EngineError>;

    fn set_project(
        &mut self,
        handle: &EngineHandle,
        project: &ProjectConfig,
        sink: &mut dyn ResultSink,
    ) -> Status;

    fn set_analysis_windows(
        &mut self,
        handle: &EngineHandle,
        windows: &[AnalysisWindow],
        mode: AccessMode,
        sink: &mut dyn ResultSink,
    ) -> Status;

    fn set_symbols(
        &mut self,
        handle: &EngineHandle,
        symbols: &[Symbol],
        sink: &mut dyn ResultSink,
    ) -> Status;

    fn set_sites(&mut self, handle: &EngineHandle, sites: &[Site], sink: &mut dyn ResultSink)
    -> Status;

    /// Open a file; returns the number of records found.
    fn begin_access(
        &mut self,
        handle: &EngineHandle,
        mode: AccessMode,
        file: &Utf8Path,
        sink: &mut dyn ResultSink,
    ) -> Status;

    /// Move to the next matching record; returns its number, 0 when exhausted.
    fn next_record(
        &mut self,
        handle: &EngineHandle,
        mode: AccessMode,
        sink: &mut dyn ResultSink,
    ) -> Status;

    /// Jump to a record; returns its number, 0 when out of range.
    fn goto_record(
        &mut self,
        handle: &EngineHandle,
        mode: AccessMode,
        record: usize,
        sink: &mut dyn ResultSink,
    ) -> Status;

    /// Close the current file session.
    fn stop(&mut self, handle: &EngineHandle, sink: &mut dyn ResultSink) -> Status;

    /// Plot the cross sections used by an analysis window.
    fn view_cross_sections(
        &mut self,
        handle: &EngineHandle,
        window: &str,
        files: &[Utf8PathBuf],
        sink: &mut dyn ResultSink,
    ) -> Status;
}
