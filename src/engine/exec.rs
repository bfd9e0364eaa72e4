//! Resource-gated asynchronous tool execution
//!
//! Starting a tool never blocks: the engine validates the target, reserves
//! capacity, and registers a timed process. Completions are collected by the
//! session on tick, which resolves crack outcome and detection.

use crate::data::{Id, ToolKind, ToolSpec};
use crate::engine::network::NetworkModel;
use crate::engine::resources::{ResourceManager, ResourceSpec};
use chrono::{DateTime, Duration, Utc};

/// How many resolved runs to keep around for listings
const HISTORY_LIMIT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Completed,
    Failed,
    Killed,
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessStatus::Running => write!(f, "running"),
            ProcessStatus::Completed => write!(f, "completed"),
            ProcessStatus::Failed => write!(f, "failed"),
            ProcessStatus::Killed => write!(f, "killed"),
        }
    }
}

/// One timed tool run against a target
#[derive(Debug, Clone)]
pub struct ToolProcess {
    pub id: Id,
    pub tool: String,
    pub target: String,
    /// Claim held in the resource ledger while this runs
    pub resource_id: Id,
    pub started: DateTime<Utc>,
    pub duration: Duration,
    pub status: ProcessStatus,
}

impl ToolProcess {
    pub fn progress(&self, now: DateTime<Utc>) -> f32 {
        let elapsed = (now - self.started).num_milliseconds() as f32;
        let total = self.duration.num_milliseconds().max(1) as f32;
        (elapsed / total).clamp(0.0, 1.0)
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.started + self.duration - now).max(Duration::zero())
    }
}

/// Immediate answer to an execute request
#[derive(Debug, Clone)]
pub enum ExecStart {
    /// Operation started; outcome arrives later via the event queue
    Started { process: Id, duration: Duration },
    /// Same (tool, target) pair already in flight
    AlreadyRunning { process: Id, remaining: Duration },
    /// Invalid target, policy violation, or resource denial
    Rejected { reason: String },
}

/// A run whose duration elapsed, awaiting resolution by the session
#[derive(Debug, Clone)]
pub struct FinishedRun {
    pub process: Id,
    pub tool: String,
    pub target: String,
}

/// Owner of every ToolProcess
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionEngine {
    processes: Vec<ToolProcess>,
}

impl ToolExecutionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `spec` against `target`. Never blocks; every refusal comes back
    /// as a descriptive `Rejected` (resource denials verbatim).
    pub fn execute(
        &mut self,
        spec: &ToolSpec,
        target: &str,
        network: &NetworkModel,
        resources: &mut ResourceManager,
        now: DateTime<Utc>,
    ) -> ExecStart {
        let Some(host) = network.host(target) else {
            return ExecStart::Rejected {
                reason: format!("Unknown host {target}. Run scan first."),
            };
        };
        if !host.discovered {
            return ExecStart::Rejected {
                reason: format!("{target} has not been discovered. Run scan first."),
            };
        }
        if spec.kind == ToolKind::Crack {
            if host.compromised {
                return ExecStart::Rejected {
                    reason: format!("{target} is already compromised."),
                };
            }
            match spec.port {
                Some(port) if host.port(port).is_some_and(|p| p.open) => {}
                Some(port) => {
                    return ExecStart::Rejected {
                        reason: format!("Nothing listening on {target}:{port}."),
                    }
                }
                None => {}
            }
        }

        if let Some(active) = self.active(spec.name, target) {
            return ExecStart::AlreadyRunning {
                process: active.id,
                remaining: active.remaining(now),
            };
        }

        let resource_id = match resources.start_process(
            &format!("{} vs {}", spec.name, target),
            ResourceSpec {
                cpu: spec.cpu,
                ram: spec.ram,
                network: spec.network,
                duration: Some(spec.duration),
            },
            now,
        ) {
            Ok(id) => id,
            Err(denial) => {
                return ExecStart::Rejected {
                    reason: denial.to_string(),
                }
            }
        };

        let process = ToolProcess {
            id: Id::new(),
            tool: spec.name.to_string(),
            target: target.to_string(),
            resource_id,
            started: now,
            duration: spec.duration,
            status: ProcessStatus::Running,
        };
        let id = process.id;
        self.processes.push(process);
        ExecStart::Started {
            process: id,
            duration: spec.duration,
        }
    }

    /// The running process for a (tool, target) pair, if any
    pub fn active(&self, tool: &str, target: &str) -> Option<&ToolProcess> {
        self.processes
            .iter()
            .find(|p| p.status == ProcessStatus::Running && p.tool == tool && p.target == target)
    }

    /// Collect runs whose duration elapsed. Statuses stay Running until the
    /// session resolves each via [`finish`](Self::finish).
    pub fn advance(&mut self, now: DateTime<Utc>) -> Vec<FinishedRun> {
        self.prune_history();
        self.processes
            .iter()
            .filter(|p| p.status == ProcessStatus::Running && p.progress(now) >= 1.0)
            .map(|p| FinishedRun {
                process: p.id,
                tool: p.tool.clone(),
                target: p.target.clone(),
            })
            .collect()
    }

    /// Record a resolved outcome
    pub fn finish(&mut self, id: Id, success: bool) {
        if let Some(p) = self.processes.iter_mut().find(|p| p.id == id) {
            p.status = if success {
                ProcessStatus::Completed
            } else {
                ProcessStatus::Failed
            };
        }
    }

    /// Kill a running process and release its resources. No completion ever
    /// fires for a killed process.
    pub fn kill(&mut self, id: Id, resources: &mut ResourceManager) -> bool {
        match self
            .processes
            .iter_mut()
            .find(|p| p.id == id && p.status == ProcessStatus::Running)
        {
            Some(p) => {
                p.status = ProcessStatus::Killed;
                resources.kill_process(p.resource_id);
                true
            }
            None => false,
        }
    }

    /// Resolve a short id prefix (as printed by `ps`) to a running process
    pub fn find_running_by_prefix(&self, prefix: &str) -> Option<&ToolProcess> {
        self.processes
            .iter()
            .find(|p| p.status == ProcessStatus::Running && p.id.to_string().starts_with(prefix))
    }

    pub fn running(&self) -> impl Iterator<Item = &ToolProcess> {
        self.processes
            .iter()
            .filter(|p| p.status == ProcessStatus::Running)
    }

    pub fn get(&self, id: Id) -> Option<&ToolProcess> {
        self.processes.iter().find(|p| p.id == id)
    }

    fn prune_history(&mut self) {
        let resolved = self
            .processes
            .iter()
            .filter(|p| p.status != ProcessStatus::Running)
            .count();
        if resolved > HISTORY_LIMIT {
            let mut to_drop = resolved - HISTORY_LIMIT;
            self.processes.retain(|p| {
                if to_drop > 0 && p.status != ProcessStatus::Running {
                    to_drop -= 1;
                    false
                } else {
                    true
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tool_catalog;
    use crate::engine::network::NetworkModel;

    fn setup() -> (ToolExecutionEngine, NetworkModel, ResourceManager) {
        let mut network = NetworkModel::seeded();
        for host in ["10.0.0.25", "10.0.0.113", "10.0.3.7"] {
            network.host_mut(host).unwrap().discovered = true;
        }
        (ToolExecutionEngine::new(), network, ResourceManager::new())
    }

    #[test]
    fn undiscovered_targets_are_rejected_with_a_hint() {
        let (mut exec, network, mut resources) = setup();
        let tools = tool_catalog();
        let start = exec.execute(&tools["sshcrack"], "172.16.8.9", &network, &mut resources, Utc::now());
        match start {
            ExecStart::Rejected { reason } => assert!(reason.contains("scan")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_run_reports_remaining_time_instead_of_restarting() {
        let (mut exec, network, mut resources) = setup();
        let tools = tool_catalog();
        let now = Utc::now();
        let first = exec.execute(&tools["sshcrack"], "10.0.0.25", &network, &mut resources, now);
        let first_id = match first {
            ExecStart::Started { process, .. } => process,
            other => panic!("expected start, got {other:?}"),
        };

        let again = exec.execute(
            &tools["sshcrack"],
            "10.0.0.25",
            &network,
            &mut resources,
            now + Duration::seconds(4),
        );
        match again {
            ExecStart::AlreadyRunning { process, remaining } => {
                assert_eq!(process, first_id);
                assert_eq!(remaining, Duration::seconds(6));
            }
            other => panic!("expected already-running, got {other:?}"),
        }
        assert_eq!(exec.running().count(), 1);
    }

    #[test]
    fn resource_denial_reason_is_propagated_verbatim() {
        let (mut exec, network, mut resources) = setup();
        resources.max.ram = 1600.0; // base load already near the cap
        let tools = tool_catalog();
        let start = exec.execute(&tools["sshcrack"], "10.0.0.25", &network, &mut resources, Utc::now());
        match start {
            ExecStart::Rejected { reason } => assert!(reason.contains("RAM"), "reason: {reason}"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn wrong_port_targets_are_rejected() {
        let (mut exec, network, mut resources) = setup();
        let tools = tool_catalog();
        // ftpbounce wants port 21; the gateway only runs ssh+http
        let start = exec.execute(&tools["ftpbounce"], "10.0.0.25", &network, &mut resources, Utc::now());
        assert!(matches!(start, ExecStart::Rejected { .. }));
    }

    #[test]
    fn advance_surfaces_elapsed_runs_until_finished() {
        let (mut exec, network, mut resources) = setup();
        let tools = tool_catalog();
        let now = Utc::now();
        exec.execute(&tools["sshcrack"], "10.0.0.25", &network, &mut resources, now);

        assert!(exec.advance(now + Duration::seconds(5)).is_empty());
        let done = exec.advance(now + Duration::seconds(11));
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].tool, "sshcrack");

        exec.finish(done[0].process, true);
        assert!(exec.advance(now + Duration::seconds(12)).is_empty());
        assert_eq!(exec.get(done[0].process).unwrap().status, ProcessStatus::Completed);
    }

    #[test]
    fn killed_processes_release_resources_and_never_complete() {
        let (mut exec, network, mut resources) = setup();
        let tools = tool_catalog();
        let now = Utc::now();
        let ram_idle = resources.current.ram;
        let id = match exec.execute(&tools["sshcrack"], "10.0.0.25", &network, &mut resources, now) {
            ExecStart::Started { process, .. } => process,
            other => panic!("expected start, got {other:?}"),
        };
        assert!(resources.current.ram > ram_idle);

        assert!(exec.kill(id, &mut resources));
        assert!((resources.current.ram - ram_idle).abs() < f32::EPSILON);
        assert!(exec.advance(now + Duration::seconds(60)).is_empty());
        assert!(!exec.kill(id, &mut resources));
    }
}
