// State machine module for execution tracking
//
// An execution's state is never stored. It is the projection of the latest entry
// of an append-only transition chain, and every change goes through a guarded,
// atomic append.

pub mod guards;
pub mod persistence;
pub mod states;

// Re-export main types for convenient access
pub use guards::{AppendDecision, ChainGuard};
pub use persistence::{order_chain, verify_chain, AppendOutcome, TransitionLog};
pub use states::{ExecutionStatus, TransitionType};
