//! Market Analyst Agent
//!
//! Lets a user talk to an LLM that can call market-data tools mid-conversation:
//! - Binds a closed catalogue of tools to a remote-execution platform at startup
//! - Dispatches model-issued tool calls one at a time, in order
//! - Feeds results back to the model until it commits to an answer
//! - Records every invocation in an audit trail
//!
//! LOOP:
//! USER TURN → MODEL → (TOOL CALLS → DISPATCH → RESULT TURNS → MODEL)* → ANSWER

pub mod agent;
pub mod api;
pub mod audit;
pub mod bootstrap;
pub mod config;
pub mod conversation;
pub mod error;
pub mod execution;
pub mod model;
pub mod models;
pub mod prompt;
pub mod tools;

pub use error::Result;

// Re-export common types
pub use agent::{LoopSettings, Orchestrator, ToolFailurePolicy};
pub use conversation::ChatSession;
pub use models::*;
