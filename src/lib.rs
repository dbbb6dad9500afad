#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Agents Core Rust
//!
//! Durable task execution and transition tracking for an agent platform.
//!
//! ## Overview
//!
//! Developers own agents, users, sessions, documents, tools and tasks. A task is an
//! immutable multi-step definition; running it creates an **execution** that an
//! external durable-workflow runtime drives step by step. Every step reports a
//! **transition**, and the transitions of one execution form an append-only chain
//! from which the execution's status is projected.
//!
//! ## Architecture
//!
//! The runtime may crash, retry activities, or spread them over many workers. The
//! core stays correct under that by:
//!
//! - appending transitions with a per-execution compare-and-append, so a chain
//!   never forks and nothing follows its terminal transition
//! - deduplicating redelivered reports, so at-least-once delivery is safe
//! - never storing status, so there is nothing to fall out of sync with the chain
//!
//! ## Module Organization
//!
//! - [`models`] - Entities, executions and transitions
//! - [`database`] - Entity, execution and transition storage (in-memory, PostgreSQL)
//! - [`state_machine`] - Transition types, status projection and chain guards
//! - [`orchestration`] - The execution coordinator
//! - [`workflow`] - Durable-workflow runtime contract and activity adapter
//! - [`services`] - Typed entity CRUD
//! - [`config`] - Layered configuration
//! - [`events`] - Lifecycle event publishing
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agents_core::config::ExecutionConfig;
//! use agents_core::database::InMemoryStore;
//! use agents_core::events::EventPublisher;
//! use agents_core::orchestration::ExecutionCoordinator;
//! use agents_core::workflow::InMemoryWorkflowRuntime;
//! use std::sync::Arc;
//!
//! let coordinator = ExecutionCoordinator::new(
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(InMemoryWorkflowRuntime::new()),
//!     EventPublisher::default(),
//!     ExecutionConfig::default(),
//! );
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests; PostgreSQL tests are ignored without DATABASE_URL
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod services;
pub mod state_machine;
pub mod workflow;

pub use config::{AgentsConfig, ConfigManager, DatabaseConfig, ExecutionConfig};
pub use constants::{ExecutionStatus, TransitionType};
pub use database::{DatabaseConnection, InMemoryStore, PgStore};
pub use error::{AgentsError, Result};
pub use events::EventPublisher;
pub use models::{Execution, NewTransition, Task, Transition, TransitionTarget};
pub use orchestration::ExecutionCoordinator;
pub use services::EntityService;
pub use workflow::{InMemoryWorkflowRuntime, TransitionActivity, WorkflowHandle, WorkflowRuntime};
