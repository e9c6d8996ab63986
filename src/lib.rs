//! Multi-provider chat orchestration with switchable agent personas.

pub mod agents;
pub mod config;
pub mod core;
pub mod manager;
pub mod providers;
pub mod session;

pub use crate::core::error::AgoraError;
