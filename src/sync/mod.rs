//! Readiness signalling between pipeline stages
//!
//! Waits block without timeout or cancellation; a stuck wait is a topology
//! error for the orchestrator to diagnose.

mod gate;
mod monitor;

pub use gate::ReadinessGate;
pub use monitor::Monitor;
