// File-backed stand-in for the numerical engine
//
// Record files are plain text: `# key: value` header lines, blank lines, and
// one record per remaining line made of whitespace-separated numbers. The
// engine produces the same kinds of payloads the real engine does (a spectrum
// page, a record table, one page per analysis window) so that the whole
// dispatch pipeline can be driven without the numerical core.

use super::{Engine, EngineError, EngineHandle, ResultSink, Status};
use crate::models::{
    AccessMode, AnalysisWindow, CurveStyle, PlotDataSet, PlotSeries, ProjectConfig, Severity,
    Site, Symbol,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use regex::Regex;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const TAG: &str = "simulated-engine";

/// Page showing the current spectrum and record table
pub const SPECTRUM_PAGE: i32 = 0;

/// First page used for analysis windows (window `i` goes on `WINDOW_PAGE_BASE + i`)
pub const WINDOW_PAGE_BASE: i32 = 1;

struct Record {
    values: Vec<f64>,
}

struct OpenFile {
    path: Utf8PathBuf,
    mode: AccessMode,
    metadata: IndexMap<String, String>,
    records: Vec<Record>,
    /// Last record shown (1-based), 0 before the first one
    cursor: usize,
}

/// Deterministic engine reading record files from disk.
pub struct SimulatedEngine {
    next_context: u64,
    live_context: Option<u64>,
    project: Option<ProjectConfig>,
    windows: Vec<AnalysisWindow>,
    symbols: Vec<Symbol>,
    sites: Vec<Site>,
    file: Option<OpenFile>,
    header_pattern: Regex,
    released: Arc<AtomicUsize>,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self {
            next_context: 1,
            live_context: None,
            project: None,
            windows: Vec::new(),
            symbols: Vec::new(),
            sites: Vec::new(),
            file: None,
            header_pattern: Regex::new(r"^#\s*([A-Za-z_][\w ]*?)\s*[:=]\s*(.*?)\s*$")
                .expect("Invalid header regex"),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of released contexts, observable after the engine has been
    /// moved into a dispatcher.
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.released)
    }

    fn check_handle(&self, handle: &EngineHandle, sink: &mut dyn ResultSink) -> bool {
        if self.live_context == Some(handle.id()) {
            true
        } else {
            sink.add_message(
                TAG,
                &format!("invalid engine context {}", handle.id()),
                Severity::Fatal,
            );
            false
        }
    }

    fn parse_records(&self, path: &Utf8Path, text: &str, sink: &mut dyn ResultSink) -> OpenFile {
        let mut metadata = IndexMap::new();
        let mut records = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('#') {
                if let Some(caps) = self.header_pattern.captures(line) {
                    metadata.insert(caps[1].to_lowercase(), caps[2].to_string());
                }
                continue;
            }

            let mut values = Vec::new();
            for token in line.split_whitespace() {
                match token.parse::<f64>() {
                    Ok(v) => values.push(v),
                    Err(_) => sink.add_message(
                        TAG,
                        &format!("{}:{}: ignoring invalid value '{}'", path, line_no + 1, token),
                        Severity::Warning,
                    ),
                }
            }

            if values.is_empty() {
                sink.add_message(
                    TAG,
                    &format!("{}:{}: record has no values", path, line_no + 1),
                    Severity::Warning,
                );
            } else {
                records.push(Record { values });
            }
        }

        // Record selection is applied on the 1-based position in the file
        if let Some(project) = &self.project {
            let selection = &project.selection;
            records = records
                .into_iter()
                .enumerate()
                .filter(|(i, _)| selection.contains(i + 1))
                .map(|(_, r)| r)
                .collect();
        }

        OpenFile {
            path: path.to_path_buf(),
            mode: AccessMode::Browse,
            metadata,
            records,
            cursor: 0,
        }
    }

    fn show_record(&self, file: &OpenFile, number: usize, sink: &mut dyn ResultSink) {
        let record = &file.records[number - 1];
        let values = &record.values;

        if file.mode == AccessMode::Export {
            sink.add_message(TAG, &format!("record {} exported", number), Severity::Info);
            sink.retain_page(SPECTRUM_PAGE);
            return;
        }

        let pixels: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
        let file_name = file.path.file_name().unwrap_or(file.path.as_str());

        sink.set_page_title(SPECTRUM_PAGE, file_name, "spectra");
        sink.add_plot(
            SPECTRUM_PAGE,
            PlotDataSet::new(format!("Record {}", number), "Pixel", "Counts").with_series(
                PlotSeries::new("spectrum", pixels, values.clone()),
            ),
        );

        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let max = values.iter().copied().fold(f64::MIN, f64::max);

        let mut row = 0;
        let mut cell = |label: &str, value: crate::models::CellValue| {
            sink.add_cell(SPECTRUM_PAGE, row, 0, label.into());
            sink.add_cell(SPECTRUM_PAGE, row, 1, value);
            row += 1;
        };
        cell("Record", (number as i64).into());
        cell("Points", (values.len() as i64).into());
        cell("Mean", mean.into());
        cell("Max", max.into());
        for (key, value) in &file.metadata {
            cell(key, value.as_str().into());
        }

        if file.mode.needs_analysis_windows() {
            for (i, window) in self.windows.iter().enumerate() {
                let page = WINDOW_PAGE_BASE + i as i32;
                let span = window.fit_max_nm - window.fit_min_nm;
                let step = span / (values.len().max(2) - 1) as f64;
                let wavelengths: Vec<f64> =
                    (0..values.len()).map(|j| window.fit_min_nm + j as f64 * step).collect();
                let residual: Vec<f64> = values.iter().map(|v| v - mean).collect();
                let rms = (residual.iter().map(|r| r * r).sum::<f64>() / count).sqrt();

                sink.set_page_title(page, &window.name, &file.mode.to_string());
                sink.add_plot(
                    page,
                    PlotDataSet::new(format!("{} residual", window.name), "nm", "Residual")
                        .with_series(
                            PlotSeries::new("residual", wavelengths, residual)
                                .with_style(CurveStyle::Point),
                        ),
                );
                sink.add_cell(page, 0, 0, "RMS".into());
                sink.add_cell(page, 0, 1, rms.into());
            }
        }
    }

    fn read_cross_section(&self, path: &Utf8Path) -> Option<PlotSeries> {
        let text = fs::read_to_string(path).ok()?;
        let mut x = Vec::new();
        let mut y = Vec::new();
        for line in text.lines() {
            let mut cols = line.split_whitespace().map(str::parse::<f64>);
            if let (Some(Ok(a)), Some(Ok(b))) = (cols.next(), cols.next()) {
                x.push(a);
                y.push(b);
            }
        }
        let name = path.file_stem().unwrap_or(path.as_str());
        Some(PlotSeries::new(name, x, y))
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for SimulatedEngine {
    fn create_context(&mut self) -> Result<EngineHandle, EngineError> {
        if let Some(live) = self.live_context {
            return Err(EngineError::ContextCreation(format!(
                "context {} is still live",
                live
            )));
        }
        let id = self.next_context;
        self.next_context += 1;
        self.live_context = Some(id);
        tracing::debug!("Simulated engine context {} created", id);
        Ok(EngineHandle::new(id))
    }

    fn destroy_context(&mut self, handle: EngineHandle) -> Result<(), EngineError> {
        if self.live_context != Some(handle.id()) {
            return Err(EngineError::ContextRelease(
                handle.id(),
                "unknown context".to_string(),
            ));
        }
        self.live_context = None;
        self.file = None;
        self.released.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Simulated engine context {} released", handle.id());
        Ok(())
    }

    fn set_project(
        &mut self,
        handle: &EngineHandle,
        project: &ProjectConfig,
        sink: &mut dyn ResultSink,
    ) -> Status {
        if !self.check_handle(handle, sink) {
            return Status::ERROR;
        }
        if project.name.trim().is_empty() {
            sink.add_message(TAG, "project has no name", Severity::Fatal);
            return Status::ERROR;
        }
        self.project = Some(project.clone());
        Status::OK
    }

    fn set_analysis_windows(
        &mut self,
        handle: &EngineHandle,
        windows: &[AnalysisWindow],
        mode: AccessMode,
        sink: &mut dyn ResultSink,
    ) -> Status {
        if !self.check_handle(handle, sink) {
            return Status::ERROR;
        }

        let mut ok = true;
        for window in windows {
            if window.fit_min_nm >= window.fit_max_nm {
                sink.add_message(
                    TAG,
                    &format!(
                        "window {}: empty fitting interval [{}, {}]",
                        window.name, window.fit_min_nm, window.fit_max_nm
                    ),
                    Severity::Fatal,
                );
                ok = false;
            }
            for xs in &window.cross_sections {
                if !self.symbols.iter().any(|s| s.name == xs.symbol) {
                    sink.add_message(
                        TAG,
                        &format!("window {}: unknown symbol {}", window.name, xs.symbol),
                        Severity::Warning,
                    );
                }
            }
        }

        if !ok {
            return Status::ERROR;
        }
        tracing::debug!("{} analysis windows loaded for {}", windows.len(), mode);
        self.windows = windows.to_vec();
        Status::OK
    }

    fn set_symbols(
        &mut self,
        handle: &EngineHandle,
        symbols: &[Symbol],
        sink: &mut dyn ResultSink,
    ) -> Status {
        if !self.check_handle(handle, sink) {
            return Status::ERROR;
        }
        self.symbols = symbols.to_vec();
        Status::OK
    }

    fn set_sites(
        &mut self,
        handle: &EngineHandle,
        sites: &[Site],
        sink: &mut dyn ResultSink,
    ) -> Status {
        if !self.check_handle(handle, sink) {
            return Status::ERROR;
        }
        if let Some(site) = self.project.as_ref().and_then(|p| p.site.as_ref()) {
            if !sites.iter().any(|s| &s.name == site) {
                sink.add_message(
                    TAG,
                    &format!("project site {} is not in the site table", site),
                    Severity::Warning,
                );
            }
        }
        self.sites = sites.to_vec();
        Status::OK
    }

    fn begin_access(
        &mut self,
        handle: &EngineHandle,
        mode: AccessMode,
        file: &Utf8Path,
        sink: &mut dyn ResultSink,
    ) -> Status {
        if !self.check_handle(handle, sink) {
            return Status::ERROR;
        }
        self.file = None;

        if mode.needs_analysis_windows() && self.windows.is_empty() {
            sink.add_message(TAG, "no analysis window defined", Severity::Fatal);
            return Status::ERROR;
        }

        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) => {
                sink.add_message(
                    TAG,
                    &format!("cannot open file {}: {}", file, e),
                    Severity::Fatal,
                );
                return Status::ERROR;
            }
        };

        let mut open = self.parse_records(file, &text, sink);
        open.mode = mode;
        let count = open.records.len();
        self.file = Some(open);

        tracing::debug!("Opened {} for {}: {} records", file, mode, count);
        Status::from_count(count)
    }

    fn next_record(
        &mut self,
        handle: &EngineHandle,
        mode: AccessMode,
        sink: &mut dyn ResultSink,
    ) -> Status {
        if !self.check_handle(handle, sink) {
            return Status::ERROR;
        }
        let Some(file) = self.file.as_ref() else {
            sink.add_message(TAG, &format!("no file open for {}", mode), Severity::Fatal);
            return Status::ERROR;
        };

        if file.cursor >= file.records.len() {
            return Status::OK;
        }
        let number = file.cursor + 1;
        self.show_record(file, number, sink);
        if let Some(file) = self.file.as_mut() {
            file.cursor = number;
        }
        Status::from_count(number)
    }

    fn goto_record(
        &mut self,
        handle: &EngineHandle,
        mode: AccessMode,
        record: usize,
        sink: &mut dyn ResultSink,
    ) -> Status {
        if !self.check_handle(handle, sink) {
            return Status::ERROR;
        }
        let Some(file) = self.file.as_ref() else {
            sink.add_message(TAG, &format!("no file open for {}", mode), Severity::Fatal);
            return Status::ERROR;
        };

        if record == 0 || record > file.records.len() {
            sink.add_message(
                TAG,
                &format!("record {} is out of range", record),
                Severity::Warning,
            );
            return Status::OK;
        }
        self.show_record(file, record, sink);
        if let Some(file) = self.file.as_mut() {
            file.cursor = record;
        }
        Status::from_count(record)
    }

    fn stop(&mut self, handle: &EngineHandle, sink: &mut dyn ResultSink) -> Status {
        if !self.check_handle(handle, sink) {
            return Status::ERROR;
        }
        if let Some(file) = self.file.take() {
            tracing::debug!("Closed {}", file.path);
        }
        Status::OK
    }

    fn view_cross_sections(
        &mut self,
        handle: &EngineHandle,
        window: &str,
        files: &[Utf8PathBuf],
        sink: &mut dyn ResultSink,
    ) -> Status {
        if !self.check_handle(handle, sink) {
            return Status::ERROR;
        }

        let mut plot = PlotDataSet::new(format!("{} cross sections", window), "nm", "cm2/molec");
        for path in files {
            match self.read_cross_section(path) {
                Some(series) => plot.series.push(series),
                None => sink.add_message(
                    TAG,
                    &format!("cannot read cross section {}", path),
                    Severity::Warning,
                ),
            }
        }

        if plot.series.is_empty() {
            sink.add_message(TAG, "no cross section could be loaded", Severity::Fatal);
            return Status::ERROR;
        }

        sink.set_page_title(SPECTRUM_PAGE, window, "cross-sections");
        sink.add_plot(SPECTRUM_PAGE, plot);
        Status::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, PlotImage};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Default)]
    struct Collected {
        messages: Vec<(Severity, String)>,
        plots: Vec<(i32, PlotDataSet)>,
        cells: Vec<(i32, usize, usize, CellValue)>,
        retained: Vec<i32>,
    }

    impl ResultSink for Collected {
        fn add_message(&mut self, _tag: &str, message: &str, severity: Severity) {
            self.messages.push((severity, message.to_string()));
        }
        fn add_plot(&mut self, page: i32, plot: PlotDataSet) {
            self.plots.push((page, plot));
        }
        fn add_cell(&mut self, page: i32, row: usize, column: usize, value: CellValue) {
            self.cells.push((page, row, column, value));
        }
        fn add_image(&mut self, _image: PlotImage) {}
        fn set_page_title(&mut self, _page: i32, _title: &str, _tag: &str) {}
        fn retain_page(&mut self, page: i32) {
            self.retained.push(page);
        }
    }

    fn record_file(contents: &str) -> (NamedTempFile, Utf8PathBuf) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let path = Utf8PathBuf::try_from(file.path().to_path_buf()).unwrap();
        (file, path)
    }

    #[test]
    fn test_context_lifecycle() {
        let mut engine = SimulatedEngine::new();
        let released = engine.release_counter();

        let handle = engine.create_context().unwrap();
        assert!(engine.create_context().is_err());

        engine.destroy_context(handle).unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let again = engine.create_context().unwrap();
        assert_eq!(again.id(), 2);
    }

    #[test]
    fn test_browse_records_until_exhausted() {
        let (_guard, path) = record_file("# site: Uccle\n1 2 3\n\n4 5 6\n");
        let mut engine = SimulatedEngine::new();
        let handle = engine.create_context().unwrap();
        let mut sink = Collected::default();

        let count = engine.begin_access(&handle, AccessMode::Browse, &path, &mut sink);
        assert_eq!(count, Status(2));

        assert_eq!(engine.next_record(&handle, AccessMode::Browse, &mut sink), Status(1));
        assert_eq!(engine.next_record(&handle, AccessMode::Browse, &mut sink), Status(2));
        assert_eq!(engine.next_record(&handle, AccessMode::Browse, &mut sink), Status(0));

        assert_eq!(sink.plots.len(), 2);
        assert!(
            sink.cells
                .iter()
                .any(|(_, _, _, v)| *v == CellValue::Text("Uccle".to_string()))
        );
    }

    #[test]
    fn test_invalid_tokens_are_warnings() {
        let (_guard, path) = record_file("1 x 3\nfoo\n");
        let mut engine = SimulatedEngine::new();
        let handle = engine.create_context().unwrap();
        let mut sink = Collected::default();

        let count = engine.begin_access(&handle, AccessMode::Browse, &path, &mut sink);

        assert_eq!(count, Status(1));
        assert_eq!(sink.messages.len(), 3);
        assert!(sink.messages.iter().all(|(s, _)| *s == Severity::Warning));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let mut engine = SimulatedEngine::new();
        let handle = engine.create_context().unwrap();
        let mut sink = Collected::default();

        let status = engine.begin_access(
            &handle,
            AccessMode::Browse,
            Utf8Path::new("/nonexistent/file.dat"),
            &mut sink,
        );

        assert!(!status.is_ok());
        assert_eq!(sink.messages[0].0, Severity::Fatal);
    }

    #[test]
    fn test_analyse_requires_windows() {
        let (_guard, path) = record_file("1 2 3\n");
        let mut engine = SimulatedEngine::new();
        let handle = engine.create_context().unwrap();
        let mut sink = Collected::default();

        let status = engine.begin_access(&handle, AccessMode::Analyse, &path, &mut sink);
        assert!(!status.is_ok());

        let windows = vec![AnalysisWindow::new("NO2", 425.0, 490.0)];
        let status = engine.set_analysis_windows(&handle, &windows, AccessMode::Analyse, &mut sink);
        assert!(status.is_ok());

        let status = engine.begin_access(&handle, AccessMode::Analyse, &path, &mut sink);
        assert_eq!(status, Status(1));
        engine.next_record(&handle, AccessMode::Analyse, &mut sink);
        assert!(sink.plots.iter().any(|(page, _)| *page == WINDOW_PAGE_BASE));
    }

    #[test]
    fn test_inverted_window_is_fatal() {
        let mut engine = SimulatedEngine::new();
        let handle = engine.create_context().unwrap();
        let mut sink = Collected::default();

        let windows = vec![AnalysisWindow::new("bad", 500.0, 400.0)];
        let status = engine.set_analysis_windows(&handle, &windows, AccessMode::Analyse, &mut sink);

        assert!(!status.is_ok());
        assert_eq!(sink.messages[0].0, Severity::Fatal);
    }

    #[test]
    fn test_export_retains_page() {
        let (_guard, path) = record_file("1 2\n");
        let mut engine = SimulatedEngine::new();
        let handle = engine.create_context().unwrap();
        let mut sink = Collected::default();

        engine.begin_access(&handle, AccessMode::Export, &path, &mut sink);
        engine.next_record(&handle, AccessMode::Export, &mut sink);

        assert!(sink.plots.is_empty());
        assert_eq!(sink.retained, vec![SPECTRUM_PAGE]);
    }

    #[test]
    fn test_wrong_handle_is_rejected() {
        let mut engine = SimulatedEngine::new();
        let _handle = engine.create_context().unwrap();
        let mut sink = Collected::default();

        let status = engine.stop(&EngineHandle::new(99), &mut sink);

        assert!(!status.is_ok());
        assert_eq!(sink.messages[0].0, Severity::Fatal);
    }

    #[test]
    fn test_record_selection_applies() {
        let (_guard, path) = record_file("1\n2\n3\n4\n");
        let mut engine = SimulatedEngine::new();
        let handle = engine.create_context().unwrap();
        let mut sink = Collected::default();

        let mut project = ProjectConfig::new("subset");
        project.selection.first_record = Some(2);
        project.selection.last_record = Some(3);
        engine.set_project(&handle, &project, &mut sink);

        let count = engine.begin_access(&handle, AccessMode::Browse, &path, &mut sink);
        assert_eq!(count, Status(2));
    }
}
