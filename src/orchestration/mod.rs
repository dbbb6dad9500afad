//! # Orchestration
//!
//! Coordination of execution lifecycles between the transition log and the
//! workflow runtime. See [`ExecutionCoordinator`].

pub mod execution_coordinator;

pub use execution_coordinator::ExecutionCoordinator;
