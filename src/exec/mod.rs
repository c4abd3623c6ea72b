// src/exec/mod.rs

//! Job submission layer.
//!
//! The planner never runs work itself: it hands each command to a
//! [`JobSubmitter`] and records the returned handle.
//!
//! - [`backend`] provides the `JobSubmitter` trait, the request/handle types
//!   and a `DryRunSubmitter` that only logs.
//! - [`script`] provides `ScriptSubmitter`, which materialises every job as a
//!   shell script through the storage collaborator.

pub mod backend;
pub mod script;

pub use backend::{CommandSpec, DryRunSubmitter, JobHandle, JobSubmitter, SubmitRequest};
pub use script::ScriptSubmitter;
