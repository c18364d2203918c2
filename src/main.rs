//! doasdrive - headless front-end for the engine dispatcher
//!
//! Opens each file given on the command line through the dispatcher, steps
//! through every record and logs every notification the controller forwards.
//!
//! # Execution Flow
//!
//! 1. Load settings from `<config-dir>/doasdrive.yaml` and `DOASDRIVE__*` variables
//! 2. Initialize logging → `<logging.directory>/<logging.prefix>.<date>`
//! 3. Load the workspace (`<config-dir>/workspace.yaml`), adding the project if missing
//! 4. Create the engine context and start the dispatcher's worker thread
//! 5. Start a session and advance after every delivered record until it is idle
//! 6. Stop the worker and release the engine context

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, ValueEnum};
use doasdrive::engine::SimulatedEngine;
use doasdrive::models::{AccessMode, EngineMessage, ProjectConfig, Severity, SharedPage, TableCell};
use doasdrive::ui::{Controller, Notify, wake_channel};
use doasdrive::{APP_NAME, ConfigManager, Dispatcher, StateManager, VERSION, logging};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Step through DOAS record files with the engine running on a worker thread"
)]
struct Cli {
    /// Directory holding doasdrive.yaml and workspace.yaml
    #[arg(long, value_name = "DIR", default_value = "doasdrive-data")]
    config_dir: Utf8PathBuf,

    /// How the engine opens the files
    #[arg(long, value_enum, default_value_t = ModeArg::Browse)]
    mode: ModeArg,

    /// Project to configure the engine with
    #[arg(long, value_name = "NAME", default_value = "default")]
    project: String,

    /// Force debug-level logging
    #[arg(long)]
    debug: bool,

    /// Record files, opened in order
    #[arg(required = true, value_name = "FILE")]
    files: Vec<Utf8PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Browse,
    Export,
    Analyse,
    Calibrate,
}

impl From<ModeArg> for AccessMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Browse => AccessMode::Browse,
            ModeArg::Export => AccessMode::Export,
            ModeArg::Analyse => AccessMode::Analyse,
            ModeArg::Calibrate => AccessMode::Calibrate,
        }
    }
}

/// View that writes every notification to the log.
#[derive(Default)]
struct ConsoleView {
    records_shown: usize,
}

impl Notify for ConsoleView {
    fn notify_ready_to_navigate(&mut self, file: &Utf8Path, record_count: usize) {
        tracing::info!("{}: {} records", file, record_count);
    }

    fn notify_current_record(&mut self, record: usize) {
        self.records_shown += 1;
        tracing::info!("Record {}", record);
    }

    fn notify_end_of_records(&mut self) {
        tracing::info!("End of records ({} shown so far)", self.records_shown);
    }

    fn notify_table_data(&mut self, cells: &[TableCell]) {
        for cell in cells.iter().filter(|c| c.column == 1) {
            tracing::debug!("  page {} row {}: {}", cell.page, cell.row, cell.value);
        }
    }

    fn notify_plot_data(&mut self, pages: &[SharedPage], retained: &[i32]) {
        for page in pages {
            tracing::debug!(
                "  page {} '{}': {} plot(s), {} image(s)",
                page.number,
                page.title,
                page.plots.len(),
                page.images.len()
            );
        }
        if !retained.is_empty() {
            tracing::debug!("  retained pages {:?}", retained);
        }
    }

    fn notify_errors(&mut self, highest: Severity, messages: &[EngineMessage]) {
        for message in messages {
            let text = format!("[{}] {}", message.tag, message.message);
            match message.severity {
                Severity::Info => tracing::info!("{}", text),
                Severity::Warning => tracing::warn!("{}", text),
                Severity::Fatal => tracing::error!("{}", text),
            }
        }
        if highest == Severity::Fatal {
            tracing::error!("Session aborted");
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let mut settings = config_manager.load_settings()?;
    if cli.debug {
        settings.logging.debug = true;
    }

    let _log_guard = logging::init_logging(&settings.logging)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let workspace = config_manager.load_workspace()?;
    if !workspace.projects.contains(&cli.project) {
        tracing::warn!("Project '{}' not in workspace, using defaults", cli.project);
        workspace
            .projects
            .insert(ProjectConfig::new(cli.project.as_str()))
            .with_context(|| format!("Cannot create project '{}'", cli.project))?;
    }

    let (wake_tx, mut wake_rx) = wake_channel();
    let dispatcher = Arc::new(Dispatcher::new(
        Box::new(SimulatedEngine::new()),
        settings.dispatcher.clone(),
        wake_tx.into_wake_fn(),
    )?);
    dispatcher.set_running(true)?;

    let state = Arc::new(StateManager::new());
    let mut controller = Controller::new(
        Arc::clone(&dispatcher),
        Arc::clone(&state),
        Box::new(ConsoleView::default()),
        settings.session.clone(),
    );
    controller.start_session(&workspace, &cli.project, cli.mode.into(), cli.files)?;

    while state.read(|s| s.is_running) {
        if !wake_rx.blocking_wait() {
            break;
        }
        controller.pump();
        if state.read(|s| s.can_advance()) {
            controller.advance();
        }
    }

    // Deliver whatever the worker finished before it stopped
    dispatcher.shutdown()?;
    controller.pump();

    let summary = state.snapshot();
    tracing::info!(
        "Session finished: {} warning(s), {} fatal error(s)",
        summary.warning_count,
        summary.fatal_count
    );

    drop(controller);
    drop(dispatcher);

    if summary.fatal_count > 0 {
        anyhow::bail!("Session aborted by a fatal engine error");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_console_errors_logged_by_severity() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .without_time()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            ConsoleView::default().notify_errors(
                Severity::Fatal,
                &[
                    EngineMessage::new(Severity::Warning, "engine", "low signal"),
                    EngineMessage::new(Severity::Fatal, "engine", "fit diverged"),
                ],
            );
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("WARN") && lines[0].contains("[engine] low signal"));
        assert!(lines[1].contains("ERROR") && lines[1].contains("[engine] fit diverged"));
        assert!(lines[2].contains("ERROR") && lines[2].contains("Session aborted"));
    }
}
