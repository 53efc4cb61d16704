//! Seat lifecycle: the call-session controller and the process-level
//! orchestration around it.

pub mod controller;
pub mod orchestrator;

pub use controller::{CallSessionController, ControllerSettings};
pub use orchestrator::{
    LabelerProcess, Orchestrator, RunOptions, RunReport, ShutdownGuard, spawn_signal_listener,
};
