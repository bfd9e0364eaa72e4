//! Defense command catalogue
//!
//! The player's options while a counter-attack is live. Static data, same
//! contract as the tool table.

use chrono::Duration;
use std::collections::HashMap;

/// One defense command the player can invoke mid-attack
#[derive(Debug, Clone)]
pub struct DefenseSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Base odds of ending the attack, before the timing bonus
    pub base_effectiveness: f32,
    pub cooldown: Duration,
    /// Independent odds of the counter-hack bonus (access to the attacker)
    pub counter_hack_chance: Option<f32>,
    /// Success additionally drops every connection and kills running tools
    pub full_disconnect: bool,
}

/// The built-in defense table
pub fn defense_catalog() -> HashMap<&'static str, DefenseSpec> {
    let mut commands = HashMap::new();

    commands.insert(
        "firewall",
        DefenseSpec {
            name: "firewall",
            description: "Slam emergency filter rules in front of the uplink",
            base_effectiveness: 0.75,
            cooldown: Duration::seconds(45),
            counter_hack_chance: None,
            full_disconnect: false,
        },
    );

    commands.insert(
        "isolate",
        DefenseSpec {
            name: "isolate",
            description: "Quarantine the rig's hot segments from the attacker",
            base_effectiveness: 0.85,
            cooldown: Duration::seconds(90),
            counter_hack_chance: None,
            full_disconnect: false,
        },
    );

    commands.insert(
        "trace_block",
        DefenseSpec {
            name: "trace_block",
            description: "Flood the pursuer's telemetry with junk routes",
            base_effectiveness: 0.65,
            cooldown: Duration::seconds(30),
            counter_hack_chance: None,
            full_disconnect: false,
        },
    );

    commands.insert(
        "counter_hack",
        DefenseSpec {
            name: "counter_hack",
            description: "Ride the attack channel back to its origin",
            base_effectiveness: 0.55,
            cooldown: Duration::seconds(120),
            counter_hack_chance: Some(0.35),
            full_disconnect: false,
        },
    );

    commands.insert(
        "panic",
        DefenseSpec {
            name: "panic",
            description: "Pull the plug: drop every link and kill every tool",
            base_effectiveness: 0.95,
            cooldown: Duration::seconds(300),
            counter_hack_chance: None,
            full_disconnect: true,
        },
    );

    commands
}
