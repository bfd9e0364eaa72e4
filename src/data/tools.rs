//! Offensive tool catalogue
//!
//! Static configuration data: costs, durations, and risk coefficients. The
//! engine reads these by key; swapping the table never changes engine logic.

use super::SecurityTier;
use chrono::Duration;
use std::collections::HashMap;

/// Fallback risk for operations with no catalogue entry (trace escalation)
pub const DEFAULT_TOOL_RISK: f32 = 0.5;

/// What a tool does when its run completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Attacks a specific service port on the target
    Crack,
    /// Local utility with no target port (e.g. trace scrubbing)
    Utility,
}

/// One entry in the offensive tool catalogue
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ToolKind,
    /// Port this tool cracks; `None` for utilities
    pub port: Option<u16>,
    pub cpu: f32,
    pub ram: f32,
    pub network: f32,
    pub duration: Duration,
    /// How noisy the tool is; feeds detection odds
    pub risk: f32,
    /// How hard it hits; feeds block odds and crack success
    pub aggressiveness: f32,
}

/// The built-in tool table
pub fn tool_catalog() -> HashMap<&'static str, ToolSpec> {
    let mut tools = HashMap::new();

    tools.insert(
        "sshcrack",
        ToolSpec {
            name: "sshcrack",
            description: "Dictionary assault against an sshd service",
            kind: ToolKind::Crack,
            port: Some(22),
            cpu: 25.0,
            ram: 512.0,
            network: 12.0,
            duration: Duration::seconds(10),
            risk: 0.5,
            aggressiveness: 0.6,
        },
    );

    tools.insert(
        "ftpbounce",
        ToolSpec {
            name: "ftpbounce",
            description: "Classic FTP bounce to slip past the login prompt",
            kind: ToolKind::Crack,
            port: Some(21),
            cpu: 18.0,
            ram: 384.0,
            network: 20.0,
            duration: Duration::seconds(8),
            risk: 0.4,
            aggressiveness: 0.5,
        },
    );

    tools.insert(
        "webserverworm",
        ToolSpec {
            name: "webserverworm",
            description: "Self-propagating exploit chain for port 80 services",
            kind: ToolKind::Crack,
            port: Some(80),
            cpu: 35.0,
            ram: 768.0,
            network: 30.0,
            duration: Duration::seconds(14),
            risk: 0.7,
            aggressiveness: 0.8,
        },
    );

    tools.insert(
        "sqlhammer",
        ToolSpec {
            name: "sqlhammer",
            description: "Blind injection battering ram for exposed databases",
            kind: ToolKind::Crack,
            port: Some(3306),
            cpu: 30.0,
            ram: 640.0,
            network: 16.0,
            duration: Duration::seconds(12),
            risk: 0.55,
            aggressiveness: 0.65,
        },
    );

    tools.insert(
        "rdpbreach",
        ToolSpec {
            name: "rdpbreach",
            description: "Credential-stuffing loop against remote desktop",
            kind: ToolKind::Crack,
            port: Some(3389),
            cpu: 28.0,
            ram: 512.0,
            network: 24.0,
            duration: Duration::seconds(12),
            risk: 0.65,
            aggressiveness: 0.7,
        },
    );

    tools.insert(
        "tracekill",
        ToolSpec {
            name: "tracekill",
            description: "Burns every active trace. Loud, expensive, effective.",
            kind: ToolKind::Utility,
            port: None,
            cpu: 40.0,
            ram: 1024.0,
            network: 8.0,
            duration: Duration::seconds(3),
            risk: 0.2,
            aggressiveness: 0.1,
        },
    );

    tools
}

/// Canonical crack-success formula: tier-derived, modulated by aggressiveness
pub fn crack_success_rate(tier: SecurityTier, aggressiveness: f32) -> f32 {
    (tier.crack_base() * (0.7 + 0.6 * aggressiveness)).clamp(0.05, 0.95)
}
