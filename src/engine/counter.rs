//! Counter-attacks and defense commands
//!
//! When a detection escalates, the defender may strike back: a severity is
//! rolled, consequences land (trace spike, tool loss, forced disconnect),
//! and resource stress is injected through the shared ledger. The player
//! answers with timed, cooldown-gated defense commands.

use crate::data::{defense_catalog, DefenseSpec, Id, SecurityTier};
use crate::engine::resources::{ResourceManager, ResourceSpec};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::SmallRng;
use rand::Rng;
use std::collections::HashMap;

/// Responding within this window earns the full timing bonus taper
pub const TIMING_BONUS_WINDOW_SECS: f32 = 30.0;

/// How hard the retaliation hits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AttackSeverity {
    /// Fixed cumulative distribution: 40 / 30 / 20 / 10
    pub fn from_roll(roll: f32) -> Self {
        match roll {
            r if r < 0.4 => AttackSeverity::Low,
            r if r < 0.7 => AttackSeverity::Medium,
            r if r < 0.9 => AttackSeverity::High,
            _ => AttackSeverity::Critical,
        }
    }
}

impl std::fmt::Display for AttackSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttackSeverity::Low => write!(f, "low"),
            AttackSeverity::Medium => write!(f, "medium"),
            AttackSeverity::High => write!(f, "high"),
            AttackSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// The fixed consequence bundle for one severity
#[derive(Debug, Clone)]
pub struct EffectBundle {
    /// Immediate trace-level pressure injected by the retaliation
    pub trace_spike: f32,
    /// Offensive tools temporarily unusable while the attack is live
    pub tools_disabled: bool,
    /// Tools wiped from the player's arsenal
    pub lost_tools: Vec<&'static str>,
    /// Every connection dropped, running tools killed
    pub force_disconnect: bool,
    /// Rough recovery time to report to the player
    pub recovery_secs: i64,
    /// Resource stress injected via reservation
    pub stress_cpu: f32,
    pub stress_ram: f32,
    pub stress_network: f32,
    pub stress_secs: i64,
}

/// Severity -> consequences, fixed table
pub fn effect_bundle(severity: AttackSeverity) -> EffectBundle {
    match severity {
        AttackSeverity::Low => EffectBundle {
            trace_spike: 5.0,
            tools_disabled: false,
            lost_tools: vec![],
            force_disconnect: false,
            recovery_secs: 15,
            stress_cpu: 10.0,
            stress_ram: 512.0,
            stress_network: 5.0,
            stress_secs: 30,
        },
        AttackSeverity::Medium => EffectBundle {
            trace_spike: 12.0,
            tools_disabled: false,
            lost_tools: vec![],
            force_disconnect: false,
            recovery_secs: 30,
            stress_cpu: 20.0,
            stress_ram: 1024.0,
            stress_network: 10.0,
            stress_secs: 45,
        },
        AttackSeverity::High => EffectBundle {
            trace_spike: 20.0,
            tools_disabled: true,
            lost_tools: vec![],
            force_disconnect: false,
            recovery_secs: 60,
            stress_cpu: 28.0,
            stress_ram: 1536.0,
            stress_network: 18.0,
            stress_secs: 60,
        },
        AttackSeverity::Critical => EffectBundle {
            trace_spike: 30.0,
            tools_disabled: true,
            lost_tools: vec!["webserverworm", "rdpbreach"],
            force_disconnect: true,
            recovery_secs: 120,
            stress_cpu: 35.0,
            stress_ram: 2048.0,
            stress_network: 25.0,
            stress_secs: 90,
        },
    }
}

/// What `initiate` decided
#[derive(Debug, Clone)]
pub struct CounterAttackResult {
    pub launched: bool,
    pub severity: Option<AttackSeverity>,
    pub message: String,
    pub effects: Option<EffectBundle>,
}

impl CounterAttackResult {
    fn quiet() -> Self {
        Self {
            launched: false,
            severity: None,
            message: String::new(),
            effects: None,
        }
    }
}

/// A live retaliation
#[derive(Debug, Clone)]
pub struct Episode {
    pub severity: AttackSeverity,
    pub started: DateTime<Utc>,
    /// Stress reservation held in the resource ledger, if it fit
    stress: Option<Id>,
}

/// Result of one defense invocation
#[derive(Debug, Clone)]
pub struct DefenseOutcome {
    pub success: bool,
    pub message: String,
    pub effectiveness: Option<f32>,
    /// Counter-hack bonus: simulated access to the attacker
    pub gained_attacker_access: bool,
    /// Panic success: caller must drop connections and kill tools
    pub full_disconnect: bool,
}

impl DefenseOutcome {
    fn refused(message: String) -> Self {
        Self {
            success: false,
            message,
            effectiveness: None,
            gained_attacker_access: false,
            full_disconnect: false,
        }
    }
}

/// Display row for the defense command list
#[derive(Debug, Clone)]
pub struct DefenseStatus {
    pub name: &'static str,
    pub description: &'static str,
    pub base_effectiveness: f32,
    pub cooldown_remaining: Duration,
}

/// Retaliation state machine plus the defense command surface
#[derive(Debug, Clone)]
pub struct CounterAttackSystem {
    catalog: HashMap<&'static str, DefenseSpec>,
    pub episode: Option<Episode>,
    last_used: HashMap<String, DateTime<Utc>>,
}

impl CounterAttackSystem {
    pub fn new() -> Self {
        Self {
            catalog: defense_catalog(),
            episode: None,
            last_used: HashMap::new(),
        }
    }

    pub fn is_under_attack(&self) -> bool {
        self.episode.is_some()
    }

    /// Maybe retaliate after a detection. `attack_probability = tier chance
    /// x (0.5 + tool risk)`; a failed draw is a quiet no-op.
    pub fn initiate(
        &mut self,
        tier: SecurityTier,
        tool_risk: f32,
        resources: &mut ResourceManager,
        now: DateTime<Utc>,
        rng: &mut SmallRng,
    ) -> CounterAttackResult {
        if self.episode.is_some() {
            return CounterAttackResult::quiet();
        }
        let probability = tier.counter_attack_chance() * (0.5 + tool_risk);
        if rng.gen::<f32>() >= probability {
            return CounterAttackResult::quiet();
        }
        let severity = AttackSeverity::from_roll(rng.gen::<f32>());
        self.launch(severity, resources, now)
    }

    /// Start an episode at a known severity (also the test harness entry)
    pub fn launch(
        &mut self,
        severity: AttackSeverity,
        resources: &mut ResourceManager,
        now: DateTime<Utc>,
    ) -> CounterAttackResult {
        let effects = effect_bundle(severity);
        // If the ledger can't fit the stress, the attack still lands; a
        // saturated rig is stress enough.
        let stress = resources
            .reserve(
                "counter-attack stress",
                ResourceSpec {
                    cpu: effects.stress_cpu,
                    ram: effects.stress_ram,
                    network: effects.stress_network,
                    duration: Some(Duration::seconds(effects.stress_secs)),
                },
                now,
            )
            .ok();
        self.episode = Some(Episode {
            severity,
            started: now,
            stress,
        });
        CounterAttackResult {
            launched: true,
            severity: Some(severity),
            message: format!(
                "COUNTER-ATTACK ({severity}): hostile traffic is hammering your rig. Defend yourself."
            ),
            effects: Some(effects),
        }
    }

    /// Run one defense command against the live episode
    pub fn execute_defense(
        &mut self,
        name: &str,
        resources: &mut ResourceManager,
        now: DateTime<Utc>,
        rng: &mut SmallRng,
    ) -> DefenseOutcome {
        let Some(spec) = self.catalog.get(name).cloned() else {
            return DefenseOutcome::refused(format!("Unknown defense command: {name}"));
        };
        let Some(episode) = &self.episode else {
            return DefenseOutcome::refused(
                "You're not under attack. Save it for when it counts.".to_string(),
            );
        };

        if let Some(last) = self.last_used.get(name) {
            let since = now - *last;
            if since < spec.cooldown {
                let remaining = (spec.cooldown - since).num_seconds().max(1);
                return DefenseOutcome::refused(format!(
                    "{name} is still recharging: {remaining}s remaining."
                ));
            }
        }
        self.last_used.insert(name.to_string(), now);

        let elapsed = (now - episode.started).num_milliseconds() as f32 / 1000.0;
        let effective = effective_chance(spec.base_effectiveness, elapsed);

        if rng.gen::<f32>() < effective {
            let stress = episode.stress;
            self.episode = None;
            if let Some(id) = stress {
                resources.release(id);
            }
            let gained_attacker_access = spec
                .counter_hack_chance
                .is_some_and(|chance| rng.gen::<f32>() < chance);
            let mut message = format!("{name} worked. The counter-attack collapses.");
            if gained_attacker_access {
                message.push_str(" Better: you rode the channel back and own the attacker's shell.");
            }
            DefenseOutcome {
                success: true,
                message,
                effectiveness: Some(effective),
                gained_attacker_access,
                full_disconnect: spec.full_disconnect,
            }
        } else {
            DefenseOutcome {
                success: false,
                message: format!(
                    "{name} blunted some of the attack, but they're still inside. Try another angle."
                ),
                effectiveness: Some(effective),
                gained_attacker_access: false,
                full_disconnect: false,
            }
        }
    }

    /// Administrative reset (expiry, test harnesses)
    pub fn end_attack(&mut self, resources: &mut ResourceManager) -> bool {
        match self.episode.take() {
            Some(episode) => {
                if let Some(id) = episode.stress {
                    resources.release(id);
                }
                true
            }
            None => false,
        }
    }

    /// Static command data plus computed remaining cooldowns, for display
    pub fn defense_commands(&self, now: DateTime<Utc>) -> Vec<DefenseStatus> {
        let mut rows: Vec<DefenseStatus> = self
            .catalog
            .values()
            .map(|spec| DefenseStatus {
                name: spec.name,
                description: spec.description,
                base_effectiveness: spec.base_effectiveness,
                cooldown_remaining: self.cooldown_remaining(spec, now),
            })
            .collect();
        rows.sort_by_key(|r| r.name);
        rows
    }

    fn cooldown_remaining(&self, spec: &DefenseSpec, now: DateTime<Utc>) -> Duration {
        match self.last_used.get(spec.name) {
            Some(last) => (spec.cooldown - (now - *last)).max(Duration::zero()),
            None => Duration::zero(),
        }
    }
}

impl Default for CounterAttackSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Success odds for a defense: base effectiveness scaled by how fast the
/// player reacted, `base x (0.7 + 0.3 x timing_bonus)`.
pub fn effective_chance(base_effectiveness: f32, elapsed_secs: f32) -> f32 {
    let timing_bonus = (1.0 - elapsed_secs / TIMING_BONUS_WINDOW_SECS).clamp(0.0, 1.0);
    base_effectiveness * (0.7 + 0.3 * timing_bonus)
}
