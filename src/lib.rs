// doasdrive - asynchronous command dispatcher for a DOAS analysis engine
//
// This is the library crate containing the dispatcher, the engine boundary and
// the foreground controller. The binary crate (main.rs) provides a headless
// console front-end.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use dispatch::{Command, DispatchError, Dispatcher, Response};
pub use engine::{Engine, EngineHandle, ResultSink, Status};
pub use registry::Workspace;
pub use state::{StateChange, StateManager};
pub use ui::{Controller, Notify};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
