//! Core data models: tenants, CRUD entities, tasks, executions and transitions.

pub mod agent;
pub mod doc;
pub mod entity;
pub mod execution;
pub mod session;
pub mod task;
pub mod tool;
pub mod transition;
pub mod user;

pub use agent::{Agent, NewAgent};
pub use doc::{Doc, DocOwner, NewDoc};
pub use entity::{Developer, Entity, EntityKind, EntityRecord, NewEntity};
pub use execution::{CreateExecutionRequest, Execution, ExecutionSnapshot};
pub use session::{NewSession, Session};
pub use task::{NewTask, Task, TaskStep};
pub use tool::{FunctionDef, NewTool, Tool, ToolType};
pub use transition::{describe_target, NewTransition, Transition, TransitionTarget};
pub use user::{NewUser, User};
