//! Shared finite-resource arbitration
//!
//! Every subsystem that consumes CPU, RAM or bandwidth goes through this
//! ledger: player tools as visible processes, counter-attack stress as
//! invisible reservations. Nothing else in the engine does its own resource
//! accounting.

use crate::data::Id;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use rand::rngs::SmallRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// No start may project CPU beyond this, throttled or not
pub const CPU_HARD_CEILING: f32 = 95.0;
/// Above this temperature the rig throttles
pub const THERMAL_HIGH_WATER: f32 = 80.0;
/// Reported CPU capacity while throttled
pub const THERMAL_DERATE: f32 = 0.75;
/// Idle temperature the rig cools back toward
const AMBIENT_TEMP: f32 = 38.0;

/// Point-in-time resource usage or capacity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLedger {
    pub cpu: f32,
    pub ram: f32,
    pub network: f32,
    pub temperature: f32,
}

impl ResourceLedger {
    pub fn zero() -> Self {
        Self {
            cpu: 0.0,
            ram: 0.0,
            network: 0.0,
            temperature: 0.0,
        }
    }
}

/// Resource demand for a process or reservation
#[derive(Debug, Clone, Copy)]
pub struct ResourceSpec {
    pub cpu: f32,
    pub ram: f32,
    pub network: f32,
    /// Expiry; `None` means held until explicitly killed/released
    pub duration: Option<Duration>,
}

/// A resource commitment, visible (process) or invisible (reservation)
#[derive(Debug, Clone)]
pub struct ResourceClaim {
    pub id: Id,
    pub label: String,
    pub cpu: f32,
    pub ram: f32,
    pub network: f32,
    pub started: DateTime<Utc>,
    pub expires: Option<DateTime<Utc>>,
}

/// Why a start or reservation was refused. Never an error: the caller turns
/// this into a plain-text explanation for the player.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDenial {
    Ram { requested: f32, available: f32 },
    Cpu { projected: f32, ceiling: f32 },
    Network { requested: f32, available: f32 },
}

impl std::fmt::Display for ResourceDenial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceDenial::Ram { requested, available } => write!(
                f,
                "Not enough RAM: need {requested:.0}MB, only {available:.0}MB free"
            ),
            ResourceDenial::Cpu { projected, ceiling } => write!(
                f,
                "CPU would spike to {projected:.0}%, ceiling is {ceiling:.0}%"
            ),
            ResourceDenial::Network { requested, available } => write!(
                f,
                "Not enough bandwidth: need {requested:.0}Mbps, only {available:.0}Mbps free"
            ),
        }
    }
}

/// Arbiter of CPU/RAM/network/thermal capacity
#[derive(Debug, Clone)]
pub struct ResourceManager {
    pub max: ResourceLedger,
    pub current: ResourceLedger,
    base: ResourceLedger,
    processes: HashMap<Id, ResourceClaim>,
    reservations: HashMap<Id, ResourceClaim>,
}

impl ResourceManager {
    pub fn new() -> Self {
        let max = ResourceLedger {
            cpu: 100.0,
            ram: 8192.0,
            network: 100.0,
            temperature: 95.0,
        };
        let base = ResourceLedger {
            cpu: 8.0,
            ram: 1536.0,
            network: 2.0,
            temperature: AMBIENT_TEMP,
        };
        let mut manager = Self {
            max,
            current: base,
            base,
            processes: HashMap::new(),
            reservations: HashMap::new(),
        };
        manager.recompute();
        manager
    }

    /// Reported CPU capacity, derated while the rig runs hot
    pub fn cpu_capacity(&self) -> f32 {
        if self.current.temperature > THERMAL_HIGH_WATER {
            self.max.cpu * THERMAL_DERATE
        } else {
            self.max.cpu
        }
    }

    /// Start a visible process. All checks run before any state mutates, so
    /// a rejection leaves the ledger untouched.
    pub fn start_process(
        &mut self,
        label: &str,
        spec: ResourceSpec,
        now: DateTime<Utc>,
    ) -> Result<Id, ResourceDenial> {
        self.check(spec)?;
        let id = Id::new();
        self.processes.insert(id, claim(id, label, spec, now));
        self.recompute();
        debug!("process {} started: {}", id.short(), label);
        Ok(id)
    }

    /// Remove a running process immediately; returns false if unknown
    pub fn kill_process(&mut self, id: Id) -> bool {
        let removed = self.processes.remove(&id).is_some();
        if removed {
            self.recompute();
        }
        removed
    }

    /// Commit capacity with no visible process (counter-attack stress).
    /// Same capacity rules as a process start.
    pub fn reserve(
        &mut self,
        label: &str,
        spec: ResourceSpec,
        now: DateTime<Utc>,
    ) -> Result<Id, ResourceDenial> {
        self.check(spec)?;
        let id = Id::new();
        self.reservations.insert(id, claim(id, label, spec, now));
        self.recompute();
        Ok(id)
    }

    /// Release a reservation; returns false if unknown
    pub fn release(&mut self, id: Id) -> bool {
        let removed = self.reservations.remove(&id).is_some();
        if removed {
            self.recompute();
        }
        removed
    }

    /// Drop every reservation (explicit "clear stress" reset)
    pub fn clear_reservations(&mut self) {
        self.reservations.clear();
        self.recompute();
    }

    /// Periodic tick: reap expired claims, recompute usage with jitter, and
    /// integrate temperature toward a load-driven equilibrium. Returns the
    /// ids of processes that expired this tick.
    pub fn tick(&mut self, now: DateTime<Utc>, rng: &mut SmallRng) -> Vec<Id> {
        let expired: Vec<Id> = self
            .processes
            .values()
            .filter(|p| p.expires.is_some_and(|at| at <= now))
            .map(|p| p.id)
            .collect();
        for id in &expired {
            self.processes.remove(id);
        }
        self.reservations
            .retain(|_, r| !r.expires.is_some_and(|at| at <= now));

        self.recompute();

        // Temperature chases an equilibrium set by CPU load, 20% per tick.
        let load = self.current.cpu / self.max.cpu;
        let equilibrium = AMBIENT_TEMP + load * 45.0;
        let temp = self.current.temperature;
        self.current.temperature = (temp + (equilibrium - temp) * 0.2
            + rng.gen_range(-0.5..0.5))
        .clamp(AMBIENT_TEMP, self.max.temperature);

        // Small usage jitter for realism
        self.current.cpu =
            (self.current.cpu + rng.gen_range(-2.0..2.0)).clamp(0.0, self.cpu_capacity());
        self.current.network =
            (self.current.network + rng.gen_range(-1.0..1.0)).clamp(0.0, self.max.network);

        expired
    }

    /// Running processes, for `ps`-style listings
    pub fn processes(&self) -> impl Iterator<Item = &ResourceClaim> {
        self.processes.values()
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    fn check(&self, spec: ResourceSpec) -> Result<(), ResourceDenial> {
        if self.current.ram + spec.ram > self.max.ram {
            return Err(ResourceDenial::Ram {
                requested: spec.ram,
                available: self.max.ram - self.current.ram,
            });
        }
        let ceiling = CPU_HARD_CEILING.min(self.cpu_capacity());
        let projected = self.current.cpu + spec.cpu;
        if projected > ceiling {
            return Err(ResourceDenial::Cpu { projected, ceiling });
        }
        if self.current.network + spec.network > self.max.network {
            return Err(ResourceDenial::Network {
                requested: spec.network,
                available: self.max.network - self.current.network,
            });
        }
        Ok(())
    }

    /// Aggregate current usage: base load plus every live claim, clamped so
    /// `current <= max` holds after every call.
    fn recompute(&mut self) {
        let mut cpu = self.base.cpu;
        let mut ram = self.base.ram;
        let mut network = self.base.network;
        for claim in self.processes.values().chain(self.reservations.values()) {
            cpu += claim.cpu;
            ram += claim.ram;
            network += claim.network;
        }
        self.current.cpu = cpu.clamp(0.0, self.max.cpu);
        self.current.ram = ram.clamp(0.0, self.max.ram);
        self.current.network = network.clamp(0.0, self.max.network);
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

fn claim(id: Id, label: &str, spec: ResourceSpec, now: DateTime<Utc>) -> ResourceClaim {
    ResourceClaim {
        id,
        label: label.to_string(),
        cpu: spec.cpu,
        ram: spec.ram,
        network: spec.network,
        started: now,
        expires: spec.duration.map(|d| now + d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn spec(cpu: f32, ram: f32, network: f32, secs: Option<i64>) -> ResourceSpec {
        ResourceSpec {
            cpu,
            ram,
            network,
            duration: secs.map(Duration::seconds),
        }
    }

    #[test]
    fn usage_never_exceeds_max() {
        let mut rm = ResourceManager::new();
        let now = Utc::now();
        let mut ids = Vec::new();
        for _ in 0..10 {
            if let Ok(id) = rm.start_process("loop", spec(10.0, 512.0, 5.0, None), now) {
                ids.push(id);
            }
            assert!(rm.current.cpu <= rm.max.cpu);
            assert!(rm.current.ram <= rm.max.ram);
            assert!(rm.current.network <= rm.max.network);
        }
        for id in ids {
            rm.kill_process(id);
            assert!(rm.current.cpu <= rm.max.cpu);
            assert!(rm.current.ram <= rm.max.ram);
        }
    }

    #[test]
    fn over_budget_start_is_rejected_without_mutation() {
        let mut rm = ResourceManager::new();
        let before = rm.current;
        let result = rm.start_process(
            "hog",
            spec(10.0, rm.max.ram + 1.0, 0.0, Some(1)),
            Utc::now(),
        );
        assert!(matches!(result, Err(ResourceDenial::Ram { .. })));
        assert_eq!(rm.current, before);
        assert_eq!(rm.processes().count(), 0);
    }

    #[test]
    fn cpu_ceiling_blocks_projected_spikes() {
        let mut rm = ResourceManager::new();
        let now = Utc::now();
        rm.start_process("a", spec(40.0, 256.0, 1.0, None), now).unwrap();
        rm.start_process("b", spec(40.0, 256.0, 1.0, None), now).unwrap();
        let result = rm.start_process("c", spec(40.0, 256.0, 1.0, None), now);
        assert!(matches!(result, Err(ResourceDenial::Cpu { .. })));
    }

    #[test]
    fn expired_processes_are_reaped_on_tick() {
        let mut rm = ResourceManager::new();
        let mut rng = SmallRng::seed_from_u64(7);
        let now = Utc::now();
        let id = rm.start_process("short", spec(10.0, 256.0, 1.0, Some(5)), now).unwrap();
        let reaped = rm.tick(now + Duration::seconds(6), &mut rng);
        assert_eq!(reaped, vec![id]);
        assert_eq!(rm.processes().count(), 0);
    }

    #[test]
    fn reservations_count_toward_usage_and_release_cleanly() {
        let mut rm = ResourceManager::new();
        let now = Utc::now();
        let ram_before = rm.current.ram;
        let id = rm.reserve("stress", spec(15.0, 1024.0, 10.0, None), now).unwrap();
        assert!(rm.current.ram > ram_before);
        assert!(rm.release(id));
        assert!((rm.current.ram - ram_before).abs() < f32::EPSILON);
        assert!(!rm.release(id));
    }

    #[test]
    fn clear_reservations_resets_all_stress_at_once() {
        let mut rm = ResourceManager::new();
        let now = Utc::now();
        let idle = rm.current;
        rm.reserve("stress-a", spec(10.0, 512.0, 5.0, None), now).unwrap();
        rm.reserve("stress-b", spec(10.0, 512.0, 5.0, None), now).unwrap();
        assert_eq!(rm.reservation_count(), 2);

        rm.clear_reservations();
        assert_eq!(rm.reservation_count(), 0);
        assert_eq!(rm.current, idle);
    }

    #[test]
    fn thermal_throttle_derates_cpu_capacity() {
        let mut rm = ResourceManager::new();
        assert!((rm.cpu_capacity() - rm.max.cpu).abs() < f32::EPSILON);
        rm.current.temperature = THERMAL_HIGH_WATER + 5.0;
        assert!((rm.cpu_capacity() - rm.max.cpu * THERMAL_DERATE).abs() < f32::EPSILON);
    }
}
