//! blackice - a network-intrusion simulation engine
//!
//! An offensive/defensive hacking game core: the player issues commands
//! against a discovered graph of hosts, cracks services guarded by security
//! tiers, and is hunted by a detection/trace/counter-attack subsystem that
//! competes for the same finite CPU, RAM and bandwidth the player's own
//! tools burn.
//!
//! # Architecture
//!
//! - `engine` - Simulation subsystems: resources, network, tool execution,
//!   intrusion detection, counter-attacks, plus the session that owns them
//! - `data` - Game-world data structures and static content tables
//!
//! Presentation is deliberately not part of this crate; callers drive the
//! command router and drain [`engine::GameEvent`]s however they like.

pub mod data;
pub mod engine;

pub use engine::Session;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type for the engine
pub type Result<T> = anyhow::Result<T>;

/// Custom error types
///
/// Expected gameplay conditions (resource exhaustion, cooldowns, failed
/// rolls) are never errors; they surface as discriminated results carrying a
/// plain-text explanation. These variants are for genuinely broken states.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Unknown host: {0}")]
    UnknownHost(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("State snapshot rejected: {0}")]
    BadSnapshot(String),

    #[error("Invalid engine state: {0}")]
    InvalidState(String),
}
