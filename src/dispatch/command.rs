// Commands - units of work executed on the dispatcher's worker thread
//
// Every command follows the same skeleton: create a response, make exactly one
// engine call with it, post the response unconditionally, and report whether
// the engine call succeeded. The UI therefore always gets feedback, even when
// the engine refused the request.

use super::dispatcher::WorkerContext;
use super::response::{RecordOutcome, Response};
use crate::models::{AccessMode, AnalysisWindow, ProjectConfig, Site, Symbol};
use camino::Utf8PathBuf;

/// A request to the engine.
///
/// Commands own all the data they need; they are created on the foreground
/// thread, moved into the dispatcher's queue and executed and dropped on the
/// worker thread.
pub trait Command: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Run the command against the engine. Posts at least one response and
    /// returns whether the engine reported success.
    fn execute(&mut self, ctx: &mut WorkerContext<'_>) -> bool;
}

/// Commands executed back-to-back, stopping at the first failure.
///
/// Children after a failing one are never executed; they are dropped along
/// with the compound.
#[derive(Default)]
pub struct CompoundCommand {
    commands: Vec<Box<dyn Command>>,
}

impl CompoundCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: impl Command + 'static) {
        self.commands.push(Box::new(command));
    }

    pub fn with(mut self, command: impl Command + 'static) -> Self {
        self.push(command);
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Command for CompoundCommand {
    fn name(&self) -> &'static str {
        "compound"
    }

    fn execute(&mut self, ctx: &mut WorkerContext<'_>) -> bool {
        for (i, command) in self.commands.iter_mut().enumerate() {
            if !command.execute(ctx) {
                tracing::debug!(
                    "Compound stopped at {} ({} of {}), {} skipped",
                    command.name(),
                    i + 1,
                    self.commands.len(),
                    self.commands.len() - i - 1
                );
                return false;
            }
        }
        true
    }
}

/// Load a project's settings into the engine.
pub struct SetProjectConfig {
    project: ProjectConfig,
}

impl SetProjectConfig {
    pub fn new(project: ProjectConfig) -> Self {
        Self { project }
    }
}

impl Command for SetProjectConfig {
    fn name(&self) -> &'static str {
        "set-project"
    }

    fn execute(&mut self, ctx: &mut WorkerContext<'_>) -> bool {
        let mut response = Response::message();
        let status = ctx.invoke(&mut response, |engine, handle, sink| {
            engine.set_project(handle, &self.project, sink)
        });
        ctx.post(response);
        status.is_ok()
    }
}

/// Load the analysis windows used by an analysis or calibration run.
pub struct SetAnalysisWindows {
    windows: Vec<AnalysisWindow>,
    mode: AccessMode,
}

impl SetAnalysisWindows {
    pub fn new(windows: Vec<AnalysisWindow>, mode: AccessMode) -> Self {
        Self { windows, mode }
    }
}

impl Command for SetAnalysisWindows {
    fn name(&self) -> &'static str {
        "set-analysis-windows"
    }

    fn execute(&mut self, ctx: &mut WorkerContext<'_>) -> bool {
        let mut response = Response::message();
        let status = ctx.invoke(&mut response, |engine, handle, sink| {
            engine.set_analysis_windows(handle, &self.windows, self.mode, sink)
        });
        ctx.post(response);
        status.is_ok()
    }
}

pub struct SetSymbolTable {
    symbols: Vec<Symbol>,
}

impl SetSymbolTable {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }
}

impl Command for SetSymbolTable {
    fn name(&self) -> &'static str {
        "set-symbols"
    }

    fn execute(&mut self, ctx: &mut WorkerContext<'_>) -> bool {
        let mut response = Response::message();
        let status = ctx.invoke(&mut response, |engine, handle, sink| {
            engine.set_symbols(handle, &self.symbols, sink)
        });
        ctx.post(response);
        status.is_ok()
    }
}

pub struct SetSiteTable {
    sites: Vec<Site>,
}

impl SetSiteTable {
    pub fn new(sites: Vec<Site>) -> Self {
        Self { sites }
    }
}

impl Command for SetSiteTable {
    fn name(&self) -> &'static str {
        "set-sites"
    }

    fn execute(&mut self, ctx: &mut WorkerContext<'_>) -> bool {
        let mut response = Response::message();
        let status = ctx.invoke(&mut response, |engine, handle, sink| {
            engine.set_sites(handle, &self.sites, sink)
        });
        ctx.post(response);
        status.is_ok()
    }
}

/// Open a file for browsing, export, analysis or calibration.
pub struct BeginFileAccess {
    mode: AccessMode,
    file: Utf8PathBuf,
}

impl BeginFileAccess {
    pub fn new(mode: AccessMode, file: impl Into<Utf8PathBuf>) -> Self {
        Self {
            mode,
            file: file.into(),
        }
    }
}

impl Command for BeginFileAccess {
    fn name(&self) -> &'static str {
        "begin-file-access"
    }

    fn execute(&mut self, ctx: &mut WorkerContext<'_>) -> bool {
        let mut response = Response::begin_access(self.file.clone());
        let status = ctx.invoke(&mut response, |engine, handle, sink| {
            engine.begin_access(handle, self.mode, &self.file, sink)
        });
        response.set_record_count(status.count().unwrap_or(0));
        ctx.post(response);
        status.is_ok()
    }
}

/// Step to the next matching record of the open file.
pub struct AdvanceRecord {
    mode: AccessMode,
}

impl AdvanceRecord {
    pub fn new(mode: AccessMode) -> Self {
        Self { mode }
    }
}

impl Command for AdvanceRecord {
    fn name(&self) -> &'static str {
        "advance-record"
    }

    fn execute(&mut self, ctx: &mut WorkerContext<'_>) -> bool {
        let mut response = Response::record();
        let status = ctx.invoke(&mut response, |engine, handle, sink| {
            engine.next_record(handle, self.mode, sink)
        });
        response.set_outcome(RecordOutcome::from(status));
        ctx.post(response);
        status.is_ok()
    }
}

/// Jump to a given record of the open file.
pub struct GotoRecord {
    mode: AccessMode,
    record: usize,
}

impl GotoRecord {
    pub fn new(mode: AccessMode, record: usize) -> Self {
        Self { mode, record }
    }
}

impl Command for GotoRecord {
    fn name(&self) -> &'static str {
        "goto-record"
    }

    fn execute(&mut self, ctx: &mut WorkerContext<'_>) -> bool {
        let mut response = Response::record();
        let status = ctx.invoke(&mut response, |engine, handle, sink| {
            engine.goto_record(handle, self.mode, self.record, sink)
        });
        response.set_outcome(RecordOutcome::from(status));
        ctx.post(response);
        status.is_ok()
    }
}

/// Close the engine's current file session.
#[derive(Default)]
pub struct Stop;

impl Command for Stop {
    fn name(&self) -> &'static str {
        "stop"
    }

    fn execute(&mut self, ctx: &mut WorkerContext<'_>) -> bool {
        let mut response = Response::message();
        let status = ctx.invoke(&mut response, |engine, handle, sink| engine.stop(handle, sink));
        ctx.post(response);
        status.is_ok()
    }
}

/// Plot the cross sections of an analysis window.
pub struct ViewCrossSections {
    window: String,
    files: Vec<Utf8PathBuf>,
}

impl ViewCrossSections {
    pub fn new(window: impl Into<String>, files: Vec<Utf8PathBuf>) -> Self {
        Self {
            window: window.into(),
            files,
        }
    }
}

impl Command for ViewCrossSections {
    fn name(&self) -> &'static str {
        "view-cross-sections"
    }

    fn execute(&mut self, ctx: &mut WorkerContext<'_>) -> bool {
        let mut response = Response::visual();
        let status = ctx.invoke(&mut response, |engine, handle, sink| {
            engine.view_cross_sections(handle, &self.window, &self.files, sink)
        });
        ctx.post(response);
        status.is_ok()
    }
}
