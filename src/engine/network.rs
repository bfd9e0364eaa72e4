//! The discovered-host graph
//!
//! A dumb store over the seeded host set. Discovery, cracking and compromise
//! mutate flags; hosts are never deleted. Access policy (who may touch which
//! files) lives in the command router, not here.

use crate::data::{create_seed_network, Host, VirtualFile};
use rand::rngs::SmallRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a scan turned up
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub newly_discovered: Vec<String>,
}

/// The simulated network
#[derive(Debug, Clone)]
pub struct NetworkModel {
    hosts: HashMap<String, Host>,
    /// Insertion order, so listings stay stable
    order: Vec<String>,
    pub local_address: String,
}

impl NetworkModel {
    pub fn new(seed: Vec<Host>, local_address: &str) -> Self {
        let mut hosts = HashMap::new();
        let mut order = Vec::new();
        for host in seed {
            order.push(host.address.clone());
            hosts.insert(host.address.clone(), host);
        }
        Self {
            hosts,
            order,
            local_address: local_address.to_string(),
        }
    }

    /// The fixed topology every fresh session starts from
    pub fn seeded() -> Self {
        Self::new(create_seed_network(), "127.0.0.1")
    }

    pub fn host(&self, address: &str) -> Option<&Host> {
        self.hosts.get(address)
    }

    pub fn host_mut(&mut self, address: &str) -> Option<&mut Host> {
        self.hosts.get_mut(address)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.order.iter().filter_map(|a| self.hosts.get(a))
    }

    pub fn discovered(&self) -> impl Iterator<Item = &Host> {
        self.hosts().filter(|h| h.discovered)
    }

    /// Discovery sweep from `from`.
    ///
    /// From the player's own host: full discovery (the guaranteed first
    /// scan). From a compromised remote host: proximity heuristic, base 0.3
    /// plus 0.2 per shared address-prefix segment. From anywhere else:
    /// nothing.
    pub fn scan(&mut self, from: &str, rng: &mut SmallRng) -> ScanReport {
        let mut report = ScanReport::default();

        if from == self.local_address {
            for address in self.order.clone() {
                if let Some(host) = self.hosts.get_mut(&address) {
                    if !host.discovered {
                        host.discovered = true;
                        report.newly_discovered.push(address);
                    }
                }
            }
            return report;
        }

        let Some(origin) = self.hosts.get(from) else {
            return report;
        };
        if !origin.compromised {
            return report;
        }

        for address in self.order.clone() {
            let Some(host) = self.hosts.get(&address) else {
                continue;
            };
            if host.discovered {
                continue;
            }
            let shared = shared_prefix_segments(&host.address, from);
            let chance = 0.3 + 0.2 * shared as f32;
            if rng.gen::<f32>() < chance {
                if let Some(host) = self.hosts.get_mut(&address) {
                    host.discovered = true;
                    report.newly_discovered.push(address);
                }
            }
        }
        report
    }

    /// Mark a port cracked. Idempotent; false when host/port is unknown.
    pub fn crack_port(&mut self, address: &str, port: u16) -> bool {
        match self.hosts.get_mut(address).and_then(|h| h.port_mut(port)) {
            Some(p) => {
                p.cracked = true;
                true
            }
            None => false,
        }
    }

    /// True iff every access-critical port is cracked
    pub fn can_compromise(&self, address: &str) -> bool {
        self.hosts
            .get(address)
            .is_some_and(|h| h.required_ports_cracked())
    }

    /// Flip the compromised flag. No-op unless `can_compromise`; returns
    /// true only when the flag newly flipped.
    pub fn compromise(&mut self, address: &str) -> bool {
        if !self.can_compromise(address) {
            return false;
        }
        match self.hosts.get_mut(address) {
            Some(host) if !host.compromised => {
                host.discovered = true;
                host.compromised = true;
                true
            }
            _ => false,
        }
    }

    /// Files under a directory on a host
    pub fn files(&self, address: &str, path: &str) -> Option<&[VirtualFile]> {
        self.hosts
            .get(address)
            .and_then(|h| h.files.get(path))
            .map(|v| v.as_slice())
    }

    /// Directory paths present on a host
    pub fn paths(&self, address: &str) -> Vec<&str> {
        self.hosts
            .get(address)
            .map(|h| {
                let mut paths: Vec<&str> = h.files.keys().map(|s| s.as_str()).collect();
                paths.sort_unstable();
                paths
            })
            .unwrap_or_default()
    }

    pub fn add_file(&mut self, address: &str, path: &str, file: VirtualFile) -> bool {
        match self.hosts.get_mut(address) {
            Some(host) => {
                host.files.entry(path.to_string()).or_default().push(file);
                true
            }
            None => false,
        }
    }

    pub fn delete_file(&mut self, address: &str, path: &str, name: &str) -> bool {
        let Some(files) = self.hosts.get_mut(address).and_then(|h| h.files.get_mut(path)) else {
            return false;
        };
        let before = files.len();
        files.retain(|f| f.name != name);
        files.len() < before
    }
}

/// Matching dotted-address segments, out of the first three
fn shared_prefix_segments(a: &str, b: &str) -> usize {
    a.split('.')
        .zip(b.split('.'))
        .take(3)
        .take_while(|(x, y)| x == y)
        .count()
}
