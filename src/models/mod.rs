//! # Models
//!
//! Data layer for the execution core. All persisted types live under [`core`]
//! and are re-exported here.

pub mod core;

pub use self::core::*;
