//! Data models shared by the dispatcher, the controller and the engine boundary.
//!
//! - [`message`]: severities and the message log every response carries
//! - [`payload`]: plot, table and image payloads for visual responses
//! - [`project`]: project settings, analysis windows, symbols and sites that
//!   commands hand to the engine
//! - [`session`]: navigation state of a file session, owned by the foreground thread
//! - [`config`]: application settings loaded by [`ConfigManager`](crate::config::ConfigManager)

pub mod config;
pub mod message;
pub mod payload;
pub mod project;
pub mod session;

pub use config::{AppSettings, DispatcherSettings, LoggingSettings, SessionSettings};
pub use message::{EngineMessage, MessageLog, Severity};
pub use payload::{
    CellValue, CurveStyle, PlotDataSet, PlotImage, PlotPage, PlotSeries, SharedPage, TableCell,
};
pub use project::{
    AccessMode, AnalysisWindow, CrossSectionRef, ProjectConfig, RecordSelection, Site, Symbol,
};
pub use session::{SessionPhase, SessionState};
