//! Intrusion detection and trace pursuit
//!
//! Every tool invocation rolls against the target's monitoring. A detection
//! either blocks the attempt outright or spawns a trace that creeps toward
//! the player; the sum of active traces is the player's trace level.

use crate::data::{Id, SecurityTier};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::SmallRng;
use rand::Rng;

/// Base trace duration before the tier multiplier is applied
pub const BASE_TRACE_SECONDS: i64 = 45;

/// How determined the pursuer is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Passive,
    Active,
    Admin,
}

impl std::fmt::Display for TraceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceKind::Passive => write!(f, "passive"),
            TraceKind::Active => write!(f, "active"),
            TraceKind::Admin => write!(f, "admin"),
        }
    }
}

/// A timed pursuit running against the player's own host
#[derive(Debug, Clone)]
pub struct Trace {
    pub id: Id,
    pub source: String,
    pub strength: f32,
    /// 0..=100, recomputed from elapsed time on every update
    pub progress: f32,
    pub started: DateTime<Utc>,
    pub duration: Duration,
    pub kind: TraceKind,
}

impl Trace {
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.started + self.duration - now).max(Duration::zero())
    }
}

/// Outcome of the per-invocation detection roll
#[derive(Debug, Clone)]
pub struct DetectionVerdict {
    pub detected: bool,
    pub blocked: bool,
    pub message: String,
}

impl DetectionVerdict {
    fn clean() -> Self {
        Self {
            detected: false,
            blocked: false,
            message: String::new(),
        }
    }
}

/// The defender-side detection state machine
#[derive(Debug, Clone)]
pub struct IntrusionDetectionSystem {
    traces: Vec<Trace>,
    /// Aggregate pursuit pressure: sum of strength x progress/100
    pub trace_level: f32,
}

impl IntrusionDetectionSystem {
    pub fn new() -> Self {
        Self {
            traces: Vec::new(),
            trace_level: 0.0,
        }
    }

    /// Roll detection for one tool invocation against a target.
    ///
    /// `detection_chance = risk x tier threshold`. A detected attempt is
    /// then either blocked (`block_chance = tier block x aggressiveness`,
    /// no trace) or answered with a fresh trace.
    pub fn check_detection(
        &mut self,
        source: &str,
        risk: f32,
        aggressiveness: f32,
        tier: SecurityTier,
        now: DateTime<Utc>,
        rng: &mut SmallRng,
    ) -> DetectionVerdict {
        let detection_chance = risk * tier.detection_threshold();
        if rng.gen::<f32>() >= detection_chance {
            return DetectionVerdict::clean();
        }

        let block_chance = tier.block_threshold() * aggressiveness;
        if rng.gen::<f32>() < block_chance {
            return DetectionVerdict {
                detected: true,
                blocked: true,
                message: format!("{source} perimeter flagged the attempt and shut it down."),
            };
        }

        let kind = if tier >= SecurityTier::High {
            TraceKind::Admin
        } else {
            TraceKind::Active
        };
        let duration = Duration::milliseconds(
            (BASE_TRACE_SECONDS as f32 * 1000.0 * tier.trace_duration_multiplier()) as i64,
        );
        self.spawn_trace(source, tier.trace_strength(), duration, kind, 0.0, now);
        DetectionVerdict {
            detected: true,
            blocked: false,
            message: format!("{source} noticed you. A {kind} trace is running."),
        }
    }

    /// Register a trace directly. `head_start` (0..=100) backdates the start
    /// so counter-attack spikes raise the trace level immediately.
    pub fn spawn_trace(
        &mut self,
        source: &str,
        strength: f32,
        duration: Duration,
        kind: TraceKind,
        head_start: f32,
        now: DateTime<Utc>,
    ) -> Id {
        let lead = Duration::milliseconds(
            (duration.num_milliseconds() as f32 * (head_start / 100.0).clamp(0.0, 1.0)) as i64,
        );
        let trace = Trace {
            id: Id::new(),
            source: source.to_string(),
            strength,
            progress: head_start.clamp(0.0, 100.0),
            started: now - lead,
            duration,
            kind,
        };
        let id = trace.id;
        self.traces.push(trace);
        self.recompute_level();
        id
    }

    /// Advance every trace; traces that hit 100% complete and are returned
    /// to the caller for escalation. The aggregate level is recomputed after
    /// every change.
    pub fn update_traces(&mut self, now: DateTime<Utc>) -> Vec<Trace> {
        for trace in &mut self.traces {
            let elapsed = (now - trace.started).num_milliseconds() as f32;
            let total = trace.duration.num_milliseconds().max(1) as f32;
            trace.progress = (elapsed / total * 100.0).clamp(0.0, 100.0);
        }
        let mut completed = Vec::new();
        let mut remaining = Vec::with_capacity(self.traces.len());
        for trace in self.traces.drain(..) {
            if trace.progress >= 100.0 {
                completed.push(trace);
            } else {
                remaining.push(trace);
            }
        }
        self.traces = remaining;
        self.recompute_level();
        completed
    }

    /// Wipe the trace set; the dedicated scrubbing tool calls this
    pub fn kill_all_traces(&mut self) -> usize {
        let count = self.traces.len();
        self.traces.clear();
        self.recompute_level();
        count
    }

    pub fn traces(&self) -> impl Iterator<Item = &Trace> {
        self.traces.iter()
    }

    pub fn active_count(&self) -> usize {
        self.traces.len()
    }

    fn recompute_level(&mut self) {
        self.trace_level = self
            .traces
            .iter()
            .map(|t| t.strength * t.progress / 100.0)
            .sum();
    }
}

impl Default for IntrusionDetectionSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn zero_risk_tools_are_never_detected() {
        let mut ids = IntrusionDetectionSystem::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let now = Utc::now();
        for _ in 0..50 {
            let verdict =
                ids.check_detection("10.0.3.7", 0.0, 0.5, SecurityTier::Maximum, now, &mut rng);
            assert!(!verdict.detected);
        }
        assert_eq!(ids.active_count(), 0);
        assert_eq!(ids.trace_level, 0.0);
    }

    #[test]
    fn detections_spawn_traces_unless_blocked() {
        let mut ids = IntrusionDetectionSystem::new();
        let mut rng = SmallRng::seed_from_u64(9);
        let now = Utc::now();
        let mut detected = 0;
        let mut blocked = 0;
        for _ in 0..200 {
            let verdict =
                ids.check_detection("203.0.113.66", 1.0, 1.0, SecurityTier::Maximum, now, &mut rng);
            if verdict.detected {
                detected += 1;
            }
            if verdict.blocked {
                blocked += 1;
            }
        }
        assert!(detected > 0, "no detections in 200 max-risk rolls");
        assert_eq!(ids.active_count(), detected - blocked);
        for trace in ids.traces() {
            assert_eq!(trace.kind, TraceKind::Admin);
        }
    }

    #[test]
    fn trace_level_matches_the_aggregate_formula() {
        let mut ids = IntrusionDetectionSystem::new();
        let now = Utc::now();
        ids.spawn_trace("a", 10.0, Duration::seconds(40), TraceKind::Active, 0.0, now);
        ids.spawn_trace("b", 20.0, Duration::seconds(40), TraceKind::Admin, 0.0, now);

        let completed = ids.update_traces(now + Duration::seconds(20));
        assert!(completed.is_empty());
        let expected: f32 = ids.traces().map(|t| t.strength * t.progress / 100.0).sum();
        assert!((ids.trace_level - expected).abs() < 1e-4);
        assert!((ids.trace_level - 15.0).abs() < 0.5);
    }

    #[test]
    fn completed_traces_are_removed_and_reported() {
        let mut ids = IntrusionDetectionSystem::new();
        let now = Utc::now();
        ids.spawn_trace("fast", 10.0, Duration::seconds(5), TraceKind::Active, 0.0, now);
        ids.spawn_trace("slow", 10.0, Duration::seconds(500), TraceKind::Active, 0.0, now);

        let completed = ids.update_traces(now + Duration::seconds(6));
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].source, "fast");
        assert_eq!(ids.active_count(), 1);
    }

    #[test]
    fn head_start_raises_the_level_immediately() {
        let mut ids = IntrusionDetectionSystem::new();
        let now = Utc::now();
        ids.spawn_trace("spike", 30.0, Duration::seconds(90), TraceKind::Admin, 50.0, now);
        assert!((ids.trace_level - 15.0).abs() < 1e-4);
    }

    #[test]
    fn kill_all_traces_resets_the_level() {
        let mut ids = IntrusionDetectionSystem::new();
        let now = Utc::now();
        ids.spawn_trace("a", 10.0, Duration::seconds(40), TraceKind::Active, 25.0, now);
        ids.spawn_trace("b", 20.0, Duration::seconds(40), TraceKind::Active, 25.0, now);
        assert!(ids.trace_level > 0.0);
        assert_eq!(ids.kill_all_traces(), 2);
        assert_eq!(ids.active_count(), 0);
        assert_eq!(ids.trace_level, 0.0);
    }
}
