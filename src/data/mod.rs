//! Data structures for the game world
//!
//! Defines hosts, ports, tools, defense commands, and the shared vocabulary
//! used across the engine.

pub mod defense;
pub mod hosts;
pub mod tools;

pub use defense::*;
pub use hosts::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for events and alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn symbol(&self) -> &'static str {
        match self {
            Severity::Info => "ℹ",
            Severity::Low => "◆",
            Severity::Medium => "▲",
            Severity::High => "●",
            Severity::Critical => "⬤",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Security classification of a host
///
/// Ordered: the higher the tier, the better the odds its defenses detect,
/// block, and counter an intrusion, and the worse the odds a crack lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SecurityTier {
    None,
    Low,
    Standard,
    High,
    Maximum,
}

impl SecurityTier {
    /// How likely this tier's monitoring notices a tool run (scaled by tool risk)
    pub fn detection_threshold(&self) -> f32 {
        match self {
            SecurityTier::None => 0.05,
            SecurityTier::Low => 0.15,
            SecurityTier::Standard => 0.20,
            SecurityTier::High => 0.35,
            SecurityTier::Maximum => 0.50,
        }
    }

    /// How likely a detected attempt is blocked outright (scaled by aggressiveness)
    pub fn block_threshold(&self) -> f32 {
        match self {
            SecurityTier::None => 0.0,
            SecurityTier::Low => 0.10,
            SecurityTier::Standard => 0.25,
            SecurityTier::High => 0.45,
            SecurityTier::Maximum => 0.65,
        }
    }

    /// Base odds that a crack attempt succeeds against this tier
    pub fn crack_base(&self) -> f32 {
        match self {
            SecurityTier::None => 0.95,
            SecurityTier::Low => 0.85,
            SecurityTier::Standard => 0.65,
            SecurityTier::High => 0.40,
            SecurityTier::Maximum => 0.15,
        }
    }

    /// Trace magnitude contributed by this tier's pursuers
    pub fn trace_strength(&self) -> f32 {
        match self {
            SecurityTier::None => 2.0,
            SecurityTier::Low => 5.0,
            SecurityTier::Standard => 10.0,
            SecurityTier::High => 20.0,
            SecurityTier::Maximum => 35.0,
        }
    }

    /// Multiplier on the 45s base trace duration; hardened sites trace faster
    pub fn trace_duration_multiplier(&self) -> f32 {
        match self {
            SecurityTier::None => 2.0,
            SecurityTier::Low => 1.6,
            SecurityTier::Standard => 1.2,
            SecurityTier::High => 1.0,
            SecurityTier::Maximum => 0.7,
        }
    }

    /// Odds this tier retaliates after detecting an intrusion
    pub fn counter_attack_chance(&self) -> f32 {
        match self {
            SecurityTier::None => 0.0,
            SecurityTier::Low => 0.10,
            SecurityTier::Standard => 0.25,
            SecurityTier::High => 0.45,
            SecurityTier::Maximum => 0.65,
        }
    }
}

impl std::fmt::Display for SecurityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityTier::None => write!(f, "none"),
            SecurityTier::Low => write!(f, "low"),
            SecurityTier::Standard => write!(f, "standard"),
            SecurityTier::High => write!(f, "high"),
            SecurityTier::Maximum => write!(f, "maximum"),
        }
    }
}

/// A unique identifier wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id(pub Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short prefix used when listing processes and traces
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
