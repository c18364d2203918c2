// UI module - foreground side of the dispatcher
//
// This module contains:
// - bridge: wake channel the worker uses to request a drain
// - controller: the Notify boundary and the Controller that drives sessions

pub mod bridge;
pub mod controller;

pub use bridge::{WakeReceiver, WakeSender, wake_channel};
pub use controller::{Controller, ControllerError, Notify, NullNotify};
