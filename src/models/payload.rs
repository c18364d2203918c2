// Visual payloads produced by the engine
//
// Plot data sets are shared between a response and whatever page cache the UI
// keeps, so they live behind `Arc`. `SharedPage` is the read-only view handed
// to the UI; nothing outside the response under construction can mutate a page.

use camino::Utf8PathBuf;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// How a series is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CurveStyle {
    #[default]
    Line,
    Point,
    Dashed,
    DashDot,
}

/// One x/y curve.
#[derive(Clone, Debug, PartialEq)]
pub struct PlotSeries {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub style: CurveStyle,
}

impl PlotSeries {
    pub fn new(name: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            style: CurveStyle::Line,
        }
    }

    pub fn with_style(mut self, style: CurveStyle) -> Self {
        self.style = style;
        self
    }

    /// Number of plottable points (the shorter of the two axes).
    pub fn len(&self) -> usize {
        self.x.len().min(self.y.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single plot: axes labels plus the series drawn on it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlotDataSet {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub force_autoscale: bool,
    pub series: Vec<PlotSeries>,
}

impl PlotDataSet {
    pub fn new(
        title: impl Into<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            force_autoscale: true,
            series: Vec::new(),
        }
    }

    pub fn with_series(mut self, series: PlotSeries) -> Self {
        self.series.push(series);
        self
    }
}

/// Value held by a table cell.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Number(f64),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Integer(n) => write!(f, "{}", n),
            CellValue::Number(x) => write!(f, "{}", x),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// A table cell positioned on a page.
#[derive(Clone, Debug, PartialEq)]
pub struct TableCell {
    pub page: i32,
    pub row: usize,
    pub column: usize,
    pub value: CellValue,
}

/// An already-rendered image attached to a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlotImage {
    pub page: i32,
    pub path: Utf8PathBuf,
    pub title: String,
}

/// Everything drawn on one page of the display.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlotPage {
    pub number: i32,
    pub title: String,
    pub tag: String,
    pub plots: Vec<Arc<PlotDataSet>>,
    pub images: Vec<PlotImage>,
}

impl PlotPage {
    pub fn new(number: i32) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty() && self.images.is_empty()
    }
}

/// Read-only shared handle to a [`PlotPage`].
///
/// Cloning is cheap; the page itself is never mutated once shared.
#[derive(Clone, Debug, PartialEq)]
pub struct SharedPage(Arc<PlotPage>);

impl SharedPage {
    pub fn new(page: PlotPage) -> Self {
        Self(Arc::new(page))
    }

    /// Whether two handles point at the same page allocation.
    pub fn ptr_eq(&self, other: &SharedPage) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for SharedPage {
    type Target = PlotPage;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_len_uses_shorter_axis() {
        let series = PlotSeries::new("spectrum", vec![1.0, 2.0, 3.0], vec![4.0, 5.0]);
        assert_eq!(series.len(), 2);
        assert!(!series.is_empty());
        assert_eq!(series.style, CurveStyle::Line);
    }

    #[test]
    fn test_shared_page_is_cheap_to_clone() {
        let mut page = PlotPage::new(2);
        page.title = "Spectra".to_string();
        page.plots.push(Arc::new(PlotDataSet::new("Radiance", "nm", "counts")));

        let shared = SharedPage::new(page);
        let other = shared.clone();

        assert!(shared.ptr_eq(&other));
        assert_eq!(other.number, 2);
        assert_eq!(other.title, "Spectra");
        assert!(!other.is_empty());
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::from("Uccle").to_string(), "Uccle");
        assert_eq!(CellValue::from(42_i64).to_string(), "42");
        assert_eq!(CellValue::from(0.5).to_string(), "0.5");
    }
}
