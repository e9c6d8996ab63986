//! Persona catalog and the slash-command engine that switches between personas.

pub mod agent;
pub mod commands;
pub mod outcome;
pub mod registry;
pub mod service;
pub mod store;

pub use agent::Agent;
pub use outcome::Outcome;
pub use service::{ActivationRecord, AgentService, AgentSnapshot};
pub use store::{FileStore, KeyValueStore, MemoryStore};
