//! Asynchronous command/response dispatch between the foreground thread and
//! the engine worker.
//!
//! - [`command`]: the [`Command`] trait, [`CompoundCommand`] and the concrete
//!   engine requests
//! - [`response`]: [`Response`] and its delivery to a [`Notify`](crate::ui::Notify)
//!   implementation
//! - [`dispatcher`]: the [`Dispatcher`] that owns the engine context, the
//!   worker thread and both queues

pub mod command;
pub mod dispatcher;
pub mod response;

pub use command::{
    AdvanceRecord, BeginFileAccess, Command, CompoundCommand, GotoRecord, SetAnalysisWindows,
    SetProjectConfig, SetSiteTable, SetSymbolTable, Stop, ViewCrossSections,
};
pub use dispatcher::{DispatchError, Dispatcher, Ticket, WakeFn, WorkerContext};
pub use response::{RecordOutcome, Response, ResponseKind};
