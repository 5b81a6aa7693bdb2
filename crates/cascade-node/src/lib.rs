//! Storage-node runtime for Cascade.
//!
//! A [`StorageNode`] owns a [`cascade_store::StorageBackend`], decodes
//! requests into backend calls, and answers with status envelopes — zero or
//! more MORE-flagged data frames followed by a terminal acknowledgement.
//! It also hosts the remote execution engine: a registry of named script
//! handlers plus an optional inline-source interpreter, both running
//! colocated with the node's data.

pub mod exec;
pub mod node;

pub use exec::{ExecError, ScriptContext, ScriptEngine, ScriptHandler, ScriptRegistry};
pub use node::StorageNode;
