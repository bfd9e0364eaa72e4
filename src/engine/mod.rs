//! Core simulation engine and session state
//!
//! The [`Session`] owns every subsystem as an explicitly constructed,
//! injected service: one resource ledger, one host graph, one tool engine,
//! one detection system, one counter-attack system, one rng. Callers drive
//! it with commands and a periodic [`Session::tick`], and observe it by
//! draining [`GameEvent`]s and (optionally) attaching a [`StateStore`].

pub mod counter;
pub mod detection;
pub mod exec;
pub mod network;
pub mod resources;
pub mod router;

pub use counter::{AttackSeverity, CounterAttackSystem, DefenseOutcome};
pub use detection::{IntrusionDetectionSystem, Trace, TraceKind};
pub use exec::{ExecStart, ProcessStatus, ToolExecutionEngine, ToolProcess};
pub use network::{NetworkModel, ScanReport};
pub use resources::{ResourceLedger, ResourceManager};

use crate::data::{
    crack_success_rate, tool_catalog, Severity, ToolKind, ToolSpec, DEFAULT_TOOL_RISK,
};
use crate::EngineError;
use chrono::{DateTime, Duration, Utc};
use log::warn;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Oldest events are dropped past this if the caller never drains
const EVENT_BACKLOG_LIMIT: usize = 256;

/// Fire-and-forget notifications out of the core. The engine never depends
/// on anyone listening.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    ScanCompleted { source: String, discovered: Vec<String> },
    NetworkUpdated,
    ToolStarted { tool: String, target: String, duration_secs: i64 },
    ToolCompleted { tool: String, target: String, success: bool },
    AttackBlocked { tool: String, target: String },
    PortCracked { target: String, port: u16 },
    HostCompromised { address: String },
    TraceSpawned { source: String, kind: String },
    TraceCompleted { source: String, strength: f32 },
    TracesScrubbed { count: usize },
    CounterAttackLaunched { severity: AttackSeverity },
    DefenseResolved { command: String, success: bool },
    ToolsLost { tools: Vec<String> },
    ForcedDisconnect,
}

impl GameEvent {
    pub fn severity(&self) -> Severity {
        match self {
            GameEvent::ScanCompleted { .. } | GameEvent::NetworkUpdated => Severity::Info,
            GameEvent::ToolStarted { .. } => Severity::Info,
            GameEvent::ToolCompleted { success, .. } => {
                if *success {
                    Severity::Low
                } else {
                    Severity::Info
                }
            }
            GameEvent::PortCracked { .. } => Severity::Low,
            GameEvent::HostCompromised { .. } => Severity::Medium,
            GameEvent::AttackBlocked { .. } => Severity::Medium,
            GameEvent::TraceSpawned { .. } => Severity::High,
            GameEvent::TraceCompleted { .. } => Severity::Critical,
            GameEvent::TracesScrubbed { .. } => Severity::Low,
            GameEvent::CounterAttackLaunched { .. } => Severity::Critical,
            GameEvent::DefenseResolved { success, .. } => {
                if *success {
                    Severity::Medium
                } else {
                    Severity::High
                }
            }
            GameEvent::ToolsLost { .. } => Severity::High,
            GameEvent::ForcedDisconnect => Severity::Critical,
        }
    }

    pub fn message(&self) -> String {
        match self {
            GameEvent::ScanCompleted { source, discovered } => {
                if discovered.is_empty() {
                    format!("Scan from {source} finished. Nothing new out there.")
                } else {
                    format!(
                        "Scan from {source} finished: {} new host(s): {}",
                        discovered.len(),
                        discovered.join(", ")
                    )
                }
            }
            GameEvent::NetworkUpdated => "Network map updated.".to_string(),
            GameEvent::ToolStarted { tool, target, duration_secs } => {
                format!("{tool} running against {target} (~{duration_secs}s)")
            }
            GameEvent::ToolCompleted { tool, target, success } => {
                if *success {
                    format!("{tool} finished against {target}: access gained.")
                } else {
                    format!("{tool} finished against {target}: no luck this time.")
                }
            }
            GameEvent::AttackBlocked { tool, target } => {
                format!("{target} shut the door on {tool}. Attempt wasted.")
            }
            GameEvent::PortCracked { target, port } => {
                format!("Port {port} on {target} is cracked open.")
            }
            GameEvent::HostCompromised { address } => {
                format!("{address} is yours now.")
            }
            GameEvent::TraceSpawned { source, kind } => {
                format!("{source} started a {kind} trace on you. Clock's ticking.")
            }
            GameEvent::TraceCompleted { source, .. } => {
                format!("TRACE COMPLETE: {source} pinned your location.")
            }
            GameEvent::TracesScrubbed { count } => {
                format!("tracekill burned {count} active trace(s).")
            }
            GameEvent::CounterAttackLaunched { severity } => {
                format!("Counter-attack incoming, severity {severity}. Defend or bleed.")
            }
            GameEvent::DefenseResolved { command, success } => {
                if *success {
                    format!("{command} held. Attack repelled.")
                } else {
                    format!("{command} wasn't enough. They're still hitting you.")
                }
            }
            GameEvent::ToolsLost { tools } => {
                format!("They wiped tools from your rig: {}", tools.join(", "))
            }
            GameEvent::ForcedDisconnect => {
                "Emergency disconnect: every link dropped, every tool killed.".to_string()
            }
        }
    }
}

/// Every field the core reads or writes through the injected state object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub current_node: String,
    /// "address:port" pairs
    pub cracked_ports: Vec<String>,
    pub trace_level: f32,
    pub compromised_nodes: Vec<String>,
    pub unlocked_tools: Vec<String>,
    pub is_under_attack: bool,
}

/// Partial update merged into a snapshot; `None` fields are untouched
#[derive(Debug, Clone, Default)]
pub struct StateUpdates {
    pub current_node: Option<String>,
    pub cracked_ports: Option<Vec<String>>,
    pub trace_level: Option<f32>,
    pub compromised_nodes: Option<Vec<String>>,
    pub unlocked_tools: Option<Vec<String>>,
    pub is_under_attack: Option<bool>,
}

/// Injected game-state accessor. The engine tolerates this being absent;
/// writes then simply vanish.
pub trait StateStore {
    fn snapshot(&self) -> StateSnapshot;
    fn apply(&mut self, updates: StateUpdates);
}

/// In-memory store, good enough for the REPL and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    snapshot: StateSnapshot,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot)?)
    }
}

/// Shared handle so a caller can keep reading the store after injecting it
impl StateStore for std::rc::Rc<std::cell::RefCell<MemoryState>> {
    fn snapshot(&self) -> StateSnapshot {
        self.borrow().snapshot()
    }

    fn apply(&mut self, updates: StateUpdates) {
        self.borrow_mut().apply(updates);
    }
}

impl StateStore for MemoryState {
    fn snapshot(&self) -> StateSnapshot {
        self.snapshot.clone()
    }

    fn apply(&mut self, updates: StateUpdates) {
        if let Some(v) = updates.current_node {
            self.snapshot.current_node = v;
        }
        if let Some(v) = updates.cracked_ports {
            self.snapshot.cracked_ports = v;
        }
        if let Some(v) = updates.trace_level {
            self.snapshot.trace_level = v;
        }
        if let Some(v) = updates.compromised_nodes {
            self.snapshot.compromised_nodes = v;
        }
        if let Some(v) = updates.unlocked_tools {
            self.snapshot.unlocked_tools = v;
        }
        if let Some(v) = updates.is_under_attack {
            self.snapshot.is_under_attack = v;
        }
    }
}

/// Session statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub scans_run: u32,
    pub tools_launched: u32,
    pub ports_cracked: u32,
    pub hosts_compromised: u32,
    pub times_detected: u32,
    pub attempts_blocked: u32,
    pub traces_scrubbed: u32,
    pub traces_completed: u32,
    pub counter_attacks_suffered: u32,
    pub counter_attacks_survived: u32,
}

/// One player's simulation: all subsystems, one clock, one rng
pub struct Session {
    pub resources: ResourceManager,
    pub network: NetworkModel,
    pub exec: ToolExecutionEngine,
    pub detection: IntrusionDetectionSystem,
    pub counter: CounterAttackSystem,
    pub stats: SessionStats,
    /// Host the player is currently connected to
    pub current_node: String,
    tools: HashMap<&'static str, ToolSpec>,
    unlocked_tools: HashSet<String>,
    /// Offensive launches refused while a disabling counter-attack is live
    offense_locked: bool,
    state: Option<Box<dyn StateStore>>,
    events: VecDeque<GameEvent>,
    rng: SmallRng,
}

impl Session {
    pub fn new() -> Self {
        Self::from_rng(SmallRng::from_entropy())
    }

    /// Deterministic session for tests and replays
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(SmallRng::seed_from_u64(seed))
    }

    fn from_rng(rng: SmallRng) -> Self {
        let network = NetworkModel::seeded();
        let current_node = network.local_address.clone();
        let tools = tool_catalog();
        // Everything offensive starts in the kit; tracekill must be earned.
        let unlocked_tools = tools
            .values()
            .filter(|t| t.kind == ToolKind::Crack)
            .map(|t| t.name.to_string())
            .collect();
        Self {
            resources: ResourceManager::new(),
            network,
            exec: ToolExecutionEngine::new(),
            detection: IntrusionDetectionSystem::new(),
            counter: CounterAttackSystem::new(),
            stats: SessionStats::default(),
            current_node,
            tools,
            unlocked_tools,
            offense_locked: false,
            state: None,
            events: VecDeque::new(),
            rng,
        }
    }

    /// Attach the injected state accessor, hydrating session fields from its
    /// snapshot. Rejects a snapshot pointing at a host that doesn't exist.
    pub fn attach_state(&mut self, store: Box<dyn StateStore>) -> Result<(), EngineError> {
        let snapshot = store.snapshot();
        if !snapshot.current_node.is_empty() {
            if self.network.host(&snapshot.current_node).is_none() {
                return Err(EngineError::BadSnapshot(format!(
                    "current_node {} is not on the map",
                    snapshot.current_node
                )));
            }
            self.current_node = snapshot.current_node.clone();
        }
        if !snapshot.unlocked_tools.is_empty() {
            self.unlocked_tools = snapshot.unlocked_tools.iter().cloned().collect();
        }
        self.state = Some(store);
        self.push_state();
        Ok(())
    }

    /// Advance the simulation. Order is fixed: resource recompute first, then
    /// tool completions (crack -> detection -> counter-attack), then traces,
    /// then the state push.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.resources.tick(now, &mut self.rng);

        let finished = self.exec.advance(now);
        for run in finished {
            self.resolve_run(run, now);
        }

        let completed = self.detection.update_traces(now);
        for trace in completed {
            self.stats.traces_completed += 1;
            self.push_event(GameEvent::TraceCompleted {
                source: trace.source.clone(),
                strength: trace.strength,
            });
            // A completed trace escalates like a fresh detection would.
            let tier = self.network.host(&trace.source).map(|h| h.tier);
            if let Some(tier) = tier {
                let result = self.counter.initiate(
                    tier,
                    DEFAULT_TOOL_RISK,
                    &mut self.resources,
                    now,
                    &mut self.rng,
                );
                if result.launched {
                    self.apply_counter_attack(result, now);
                }
            }
        }

        self.push_state();
    }

    /// `tick` with the wall clock
    pub fn tick_now(&mut self) {
        self.tick(Utc::now());
    }

    /// Start a tool against a target. Non-blocking; the outcome lands on a
    /// later tick as events.
    pub fn run_tool(&mut self, tool: &str, target: &str, now: DateTime<Utc>) -> ExecStart {
        let Some(spec) = self.tools.get(tool).cloned() else {
            return ExecStart::Rejected {
                reason: format!("Unknown tool: {tool}. Check `tools`."),
            };
        };
        if !self.unlocked_tools.contains(tool) {
            return ExecStart::Rejected {
                reason: format!("{tool} isn't in your kit (lost or never acquired)."),
            };
        }
        if self.offense_locked && spec.kind == ToolKind::Crack {
            return ExecStart::Rejected {
                reason: "Your tools are scrambled by the counter-attack. Defend first.".to_string(),
            };
        }

        let start = self
            .exec
            .execute(&spec, target, &self.network, &mut self.resources, now);
        if let ExecStart::Started { duration, .. } = &start {
            self.stats.tools_launched += 1;
            self.push_event(GameEvent::ToolStarted {
                tool: tool.to_string(),
                target: target.to_string(),
                duration_secs: duration.num_seconds(),
            });
        }
        start
    }

    /// Discovery sweep from the current node
    pub fn scan(&mut self) -> ScanReport {
        let from = self.current_node.clone();
        let report = self.network.scan(&from, &mut self.rng);
        self.stats.scans_run += 1;
        self.push_event(GameEvent::ScanCompleted {
            source: from,
            discovered: report.newly_discovered.clone(),
        });
        if !report.newly_discovered.is_empty() {
            self.push_event(GameEvent::NetworkUpdated);
        }
        self.push_state();
        report
    }

    /// Invoke a defense command against the live counter-attack
    pub fn execute_defense(&mut self, command: &str, now: DateTime<Utc>) -> DefenseOutcome {
        let outcome = self
            .counter
            .execute_defense(command, &mut self.resources, now, &mut self.rng);
        if outcome.effectiveness.is_some() {
            self.push_event(GameEvent::DefenseResolved {
                command: command.to_string(),
                success: outcome.success,
            });
        }
        if outcome.success {
            self.offense_locked = false;
            self.stats.counter_attacks_survived += 1;
            if outcome.gained_attacker_access {
                // Riding the channel home pays off in kit
                self.unlock_tool("tracekill");
            }
            if outcome.full_disconnect {
                self.disconnect_all();
            }
        }
        self.push_state();
        outcome
    }

    /// Kill a running tool by short-id prefix. Returns what was killed.
    pub fn kill_tool(&mut self, prefix: &str) -> Option<(String, String)> {
        let id = self.exec.find_running_by_prefix(prefix).map(|p| p.id)?;
        let process = self.exec.get(id).map(|p| (p.tool.clone(), p.target.clone()))?;
        self.exec.kill(id, &mut self.resources);
        Some(process)
    }

    /// Administrative reset of a live counter-attack
    pub fn end_attack(&mut self) -> bool {
        let ended = self.counter.end_attack(&mut self.resources);
        if ended {
            self.offense_locked = false;
            self.push_state();
        }
        ended
    }

    /// Point the session at a different host. Access policy is the router's
    /// job; this just moves the connection and mirrors state.
    pub fn set_current_node(&mut self, address: &str) {
        self.current_node = address.to_string();
        self.push_state();
    }

    /// Add a tool to the kit; false if already owned
    pub fn unlock_tool(&mut self, tool: &str) -> bool {
        self.unlocked_tools.insert(tool.to_string())
    }

    pub fn has_tool(&self, tool: &str) -> bool {
        self.unlocked_tools.contains(tool)
    }

    pub fn tool_spec(&self, tool: &str) -> Option<&ToolSpec> {
        self.tools.get(tool)
    }

    pub fn tools(&self) -> &HashMap<&'static str, ToolSpec> {
        &self.tools
    }

    pub fn trace_level(&self) -> f32 {
        self.detection.trace_level
    }

    /// Pull everything that happened since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    /// Resolve one elapsed tool run: outcome roll, then detection, then
    /// world mutation or blocked failure, then the counter-attack draw.
    fn resolve_run(&mut self, run: exec::FinishedRun, now: DateTime<Utc>) {
        let spec = match self.tools.get(run.tool.as_str()).cloned() {
            Some(spec) => spec,
            None => {
                warn!("process {} references unknown tool {}", run.process.short(), run.tool);
                self.exec.finish(run.process, false);
                return;
            }
        };

        // Local utility: scrub traces and stop there, nobody remote to roll
        // detection against.
        if spec.kind == ToolKind::Utility {
            let count = self.detection.kill_all_traces();
            self.stats.traces_scrubbed += count as u32;
            self.exec.finish(run.process, true);
            self.push_event(GameEvent::TracesScrubbed { count });
            self.push_state();
            return;
        }

        let Some(host) = self.network.host(&run.target) else {
            // Defensive: target vanished mid-flight. Treated as failure.
            warn!("target {} vanished while {} was running", run.target, run.tool);
            self.exec.finish(run.process, false);
            return;
        };
        let tier = host.tier;

        let success = self.rng.gen::<f32>() < crack_success_rate(tier, spec.aggressiveness);
        let verdict = self.detection.check_detection(
            &run.target,
            spec.risk,
            spec.aggressiveness,
            tier,
            now,
            &mut self.rng,
        );

        if verdict.blocked {
            self.stats.times_detected += 1;
            self.stats.attempts_blocked += 1;
            self.exec.finish(run.process, false);
            self.push_event(GameEvent::AttackBlocked {
                tool: run.tool.clone(),
                target: run.target.clone(),
            });
        } else {
            if success {
                if let Some(port) = spec.port {
                    self.network.crack_port(&run.target, port);
                    self.stats.ports_cracked += 1;
                    self.push_event(GameEvent::PortCracked {
                        target: run.target.clone(),
                        port,
                    });
                }
                if self.network.compromise(&run.target) {
                    self.stats.hosts_compromised += 1;
                    self.push_event(GameEvent::HostCompromised {
                        address: run.target.clone(),
                    });
                }
            }
            self.exec.finish(run.process, success);
            self.push_event(GameEvent::ToolCompleted {
                tool: run.tool.clone(),
                target: run.target.clone(),
                success,
            });
            if verdict.detected {
                self.stats.times_detected += 1;
                let kind = if tier >= crate::data::SecurityTier::High {
                    TraceKind::Admin
                } else {
                    TraceKind::Active
                };
                self.push_event(GameEvent::TraceSpawned {
                    source: run.target.clone(),
                    kind: kind.to_string(),
                });
            }
        }

        if verdict.detected {
            let result =
                self.counter
                    .initiate(tier, spec.risk, &mut self.resources, now, &mut self.rng);
            if result.launched {
                self.apply_counter_attack(result, now);
            }
        }

        self.push_state();
    }

    fn apply_counter_attack(&mut self, result: counter::CounterAttackResult, now: DateTime<Utc>) {
        let Some(severity) = result.severity else {
            return;
        };
        let Some(effects) = result.effects else {
            return;
        };
        self.stats.counter_attacks_suffered += 1;
        self.push_event(GameEvent::CounterAttackLaunched { severity });

        // The retaliation shows up on the trace board immediately.
        self.detection.spawn_trace(
            "counter-attack",
            effects.trace_spike,
            Duration::seconds(90),
            TraceKind::Admin,
            50.0,
            now,
        );

        if effects.tools_disabled {
            self.offense_locked = true;
        }
        if !effects.lost_tools.is_empty() {
            let mut lost = Vec::new();
            for tool in &effects.lost_tools {
                if self.unlocked_tools.remove(*tool) {
                    lost.push(tool.to_string());
                }
            }
            if !lost.is_empty() {
                self.push_event(GameEvent::ToolsLost { tools: lost });
            }
        }
        if effects.force_disconnect {
            self.disconnect_all();
        }
    }

    /// Drop every link and kill every running tool
    fn disconnect_all(&mut self) {
        self.current_node = self.network.local_address.clone();
        let running: Vec<_> = self.exec.running().map(|p| p.id).collect();
        for id in running {
            self.exec.kill(id, &mut self.resources);
        }
        self.push_event(GameEvent::ForcedDisconnect);
    }

    fn push_event(&mut self, event: GameEvent) {
        self.events.push_back(event);
        while self.events.len() > EVENT_BACKLOG_LIMIT {
            self.events.pop_front();
        }
    }

    /// Mirror the session's truth into the injected store, if any
    fn push_state(&mut self) {
        let Some(store) = self.state.as_mut() else {
            return;
        };
        let mut cracked_ports = Vec::new();
        let mut compromised_nodes = Vec::new();
        for host in self.network.hosts() {
            for port in &host.ports {
                if port.cracked {
                    cracked_ports.push(format!("{}:{}", host.address, port.number));
                }
            }
            if host.compromised && host.address != self.network.local_address {
                compromised_nodes.push(host.address.clone());
            }
        }
        let mut unlocked_tools: Vec<String> = self.unlocked_tools.iter().cloned().collect();
        unlocked_tools.sort();
        store.apply(StateUpdates {
            current_node: Some(self.current_node.clone()),
            cracked_ports: Some(cracked_ports),
            trace_level: Some(self.detection.trace_level),
            compromised_nodes: Some(compromised_nodes),
            unlocked_tools: Some(unlocked_tools),
            is_under_attack: Some(self.counter.is_under_attack()),
        });
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn first_scan_from_home_discovers_the_seed_hosts() {
        let mut session = Session::with_seed(1);
        let report = session.scan();
        assert!(report.newly_discovered.contains(&"10.0.0.25".to_string()));
        let events = session.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::ScanCompleted { .. })));
        assert!(events.iter().any(|e| matches!(e, GameEvent::NetworkUpdated)));
    }

    #[test]
    fn locked_tools_are_refused() {
        let mut session = Session::with_seed(2);
        session.scan();
        let start = session.run_tool("tracekill", "127.0.0.1", Utc::now());
        match start {
            ExecStart::Rejected { reason } => assert!(reason.contains("kit")),
            other => panic!("expected rejection, got {other:?}"),
        }

        assert!(session.unlock_tool("tracekill"));
        let start = session.run_tool("tracekill", "127.0.0.1", Utc::now());
        assert!(matches!(start, ExecStart::Started { .. }));
    }

    #[test]
    fn tracekill_scrubs_traces_on_completion() {
        let mut session = Session::with_seed(3);
        let now = Utc::now();
        session.scan();
        session.unlock_tool("tracekill");
        session.detection.spawn_trace(
            "10.0.3.7",
            10.0,
            Duration::seconds(300),
            TraceKind::Active,
            20.0,
            now,
        );
        assert!(session.trace_level() > 0.0);

        session.run_tool("tracekill", "127.0.0.1", now);
        session.tick(now + Duration::seconds(4));
        assert_eq!(session.trace_level(), 0.0);
        assert!(session
            .drain_events()
            .iter()
            .any(|e| matches!(e, GameEvent::TracesScrubbed { count: 1 })));
    }

    #[test]
    fn state_store_mirrors_engine_truth() {
        let mut session = Session::with_seed(4);
        let shared = Rc::new(RefCell::new(MemoryState::new()));
        session.attach_state(Box::new(shared.clone())).unwrap();

        session.scan();
        session.network.crack_port("10.0.0.25", 22);
        session.network.compromise("10.0.0.25");
        session.tick(Utc::now());

        let snapshot = shared.borrow().snapshot();
        assert!(snapshot.cracked_ports.contains(&"10.0.0.25:22".to_string()));
        assert!(snapshot
            .compromised_nodes
            .contains(&"10.0.0.25".to_string()));
        assert_eq!(snapshot.current_node, "127.0.0.1");
        assert!(!snapshot.is_under_attack);
        assert!(snapshot.unlocked_tools.contains(&"sshcrack".to_string()));
    }

    #[test]
    fn attach_state_rejects_unknown_current_node() {
        let mut session = Session::with_seed(5);
        let mut store = MemoryState::new();
        store.apply(StateUpdates {
            current_node: Some("198.51.100.77".to_string()),
            ..Default::default()
        });
        assert!(session.attach_state(Box::new(store)).is_err());
    }

    #[test]
    fn attach_state_hydrates_the_tool_kit() {
        let mut session = Session::with_seed(6);
        let mut store = MemoryState::new();
        store.apply(StateUpdates {
            unlocked_tools: Some(vec!["sshcrack".to_string(), "tracekill".to_string()]),
            ..Default::default()
        });
        session.attach_state(Box::new(store)).unwrap();
        assert!(session.has_tool("tracekill"));
        assert!(!session.has_tool("webserverworm"));
    }

    #[test]
    fn forced_critical_attack_disconnects_and_strips_tools() {
        let mut session = Session::with_seed(7);
        session.scan();
        let now = Utc::now();
        session.current_node = "10.0.0.25".to_string();

        let result = session
            .counter
            .launch(counter::AttackSeverity::Critical, &mut session.resources, now);
        session.apply_counter_attack(result, now);

        assert!(session.counter.is_under_attack());
        assert_eq!(session.current_node, "127.0.0.1");
        assert!(!session.has_tool("webserverworm"));
        let events = session.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::ForcedDisconnect)));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::CounterAttackLaunched { .. })));

        // Offensive launches are refused until the attack resolves
        let start = session.run_tool("sshcrack", "10.0.0.25", now);
        assert!(matches!(start, ExecStart::Rejected { .. }));

        assert!(session.end_attack());
        assert!(!session.counter.is_under_attack());
    }

    #[test]
    fn completed_runs_resolve_exactly_once() {
        let mut session = Session::with_seed(8);
        let now = Utc::now();
        session.scan();
        session.run_tool("sshcrack", "10.0.0.25", now);
        session.tick(now + Duration::seconds(11));
        let first: usize = session
            .drain_events()
            .iter()
            .filter(|e| matches!(e, GameEvent::ToolCompleted { .. } | GameEvent::AttackBlocked { .. }))
            .count();
        assert_eq!(first, 1);

        session.tick(now + Duration::seconds(12));
        let second = session
            .drain_events()
            .iter()
            .filter(|e| matches!(e, GameEvent::ToolCompleted { .. } | GameEvent::AttackBlocked { .. }))
            .count();
        assert_eq!(second, 0);
    }
}
