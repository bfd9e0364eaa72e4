//! Host and network infrastructure definitions

use super::SecurityTier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Operating system tags, flavor only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsTag {
    Linux,
    Windows,
    WindowsServer,
    FreeBsd,
    EmbeddedLinux,
    Mainframe,
    Unknown,
}

/// A network service listening on a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub number: u16,
    pub service: String,
    pub open: bool,
    pub cracked: bool,
    /// Cracking every required port is what grants host compromise
    pub required: bool,
}

impl Port {
    pub fn new(number: u16, service: &str, required: bool) -> Self {
        Self {
            number,
            service: service.to_string(),
            open: true,
            cracked: false,
            required,
        }
    }
}

/// Whether a virtual file is a file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Directory,
}

/// An entry in a host's virtual file system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFile {
    pub name: String,
    pub kind: FileKind,
    pub size_bytes: u64,
    pub permissions: String,
    pub content: Option<String>,
    pub encrypted: bool,
}

impl VirtualFile {
    pub fn file(name: &str, size_bytes: u64, content: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FileKind::File,
            size_bytes,
            permissions: "-rw-r--r--".to_string(),
            content: Some(content.to_string()),
            encrypted: false,
        }
    }

    pub fn encrypted_file(name: &str, size_bytes: u64) -> Self {
        Self {
            name: name.to_string(),
            kind: FileKind::File,
            size_bytes,
            permissions: "-rw-------".to_string(),
            content: None,
            encrypted: true,
        }
    }

    pub fn directory(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FileKind::Directory,
            size_bytes: 4096,
            permissions: "drwxr-xr-x".to_string(),
            content: None,
            encrypted: false,
        }
    }
}

/// A host on the simulated network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub address: String,
    pub hostname: String,
    pub tier: SecurityTier,
    pub os: OsTag,
    pub discovered: bool,
    pub compromised: bool,
    pub ports: Vec<Port>,
    /// Virtual file table, keyed by directory path
    pub files: HashMap<String, Vec<VirtualFile>>,
}

impl Host {
    pub fn new(address: &str, hostname: &str, tier: SecurityTier, os: OsTag) -> Self {
        Self {
            address: address.to_string(),
            hostname: hostname.to_string(),
            tier,
            os,
            discovered: false,
            compromised: false,
            ports: Vec::new(),
            files: HashMap::new(),
        }
    }

    /// The player's own machine: always discovered, always accessible
    pub fn localhost() -> Self {
        let mut host = Host::new("127.0.0.1", "ghost-rig", SecurityTier::None, OsTag::Linux);
        host.discovered = true;
        host.compromised = true;
        host.with_files(
            "/home/ghost",
            vec![
                VirtualFile::file(
                    "readme.txt",
                    412,
                    "Keep the rig cool. Every tool you run eats CPU the trace eats too.",
                ),
                VirtualFile::file("contacts.db", 2048, "encrypted contact list (stub)"),
                VirtualFile::directory("loot"),
            ],
        )
    }

    pub fn server(address: &str, hostname: &str, tier: SecurityTier, ports: Vec<Port>) -> Self {
        let mut host = Host::new(address, hostname, tier, OsTag::Linux);
        host.ports = ports;
        host
    }

    pub fn workstation(address: &str, hostname: &str, tier: SecurityTier) -> Self {
        let mut host = Host::new(address, hostname, tier, OsTag::Windows);
        host.ports = vec![Port::new(3389, "rdp", true), Port::new(445, "smb", false)];
        host
    }

    /// Builder-style helper for seeding the virtual file table
    pub fn with_files(mut self, path: &str, files: Vec<VirtualFile>) -> Self {
        self.files.insert(path.to_string(), files);
        self
    }

    pub fn port(&self, number: u16) -> Option<&Port> {
        self.ports.iter().find(|p| p.number == number)
    }

    pub fn port_mut(&mut self, number: u16) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.number == number)
    }

    /// True when every access-critical port has been cracked
    pub fn required_ports_cracked(&self) -> bool {
        let mut any_required = false;
        for port in &self.ports {
            if port.required {
                any_required = true;
                if !port.cracked {
                    return false;
                }
            }
        }
        any_required
    }
}

/// The fixed seed topology every fresh session starts from
///
/// One host per tier band plus a few mid-tier targets; `10.0.0.25` is the
/// traditional first crack for new players.
pub fn create_seed_network() -> Vec<Host> {
    vec![
        Host::localhost(),
        Host::server(
            "10.0.0.25",
            "corp-gateway",
            SecurityTier::Low,
            vec![Port::new(22, "ssh", true), Port::new(80, "http", false)],
        )
        .with_files(
            "/var/log",
            vec![
                VirtualFile::file("auth.log", 9314, "Failed password for admin from 10.0.0.113"),
                VirtualFile::file("syslog", 22110, "gateway heartbeat ok"),
            ],
        ),
        Host::server(
            "10.0.0.113",
            "ftp-archive",
            SecurityTier::Low,
            vec![Port::new(21, "ftp", true), Port::new(22, "ssh", false)],
        )
        .with_files(
            "/srv/ftp",
            vec![
                VirtualFile::file("backup_2087.tar", 1_048_576, "old site backup"),
                VirtualFile::encrypted_file("payroll.gpg", 524_288),
            ],
        ),
        Host::server(
            "10.0.3.7",
            "web-kiosk",
            SecurityTier::Standard,
            vec![Port::new(80, "http", true), Port::new(22, "ssh", false)],
        )
        .with_files(
            "/var/www",
            vec![
                VirtualFile::file("index.html", 1820, "<h1>Kiosk online</h1>"),
                VirtualFile::directory("uploads"),
            ],
        ),
        Host::server(
            "10.0.3.40",
            "db-silo",
            SecurityTier::Standard,
            vec![Port::new(3306, "mysql", true), Port::new(22, "ssh", false)],
        )
        .with_files(
            "/data",
            vec![VirtualFile::encrypted_file("customers.ibd", 8_388_608)],
        ),
        Host::workstation("172.16.8.2", "ops-terminal", SecurityTier::High).with_files(
            "/users/operator",
            vec![VirtualFile::file("shift_notes.txt", 733, "rotate vault creds friday")],
        ),
        Host::server(
            "172.16.8.9",
            "vault-node",
            SecurityTier::High,
            vec![Port::new(22, "ssh", true), Port::new(443, "https", false)],
        )
        .with_files(
            "/vault",
            vec![VirtualFile::encrypted_file("masterkeys.kdbx", 65_536)],
        ),
        Host::server(
            "203.0.113.66",
            "blacksite",
            SecurityTier::Maximum,
            vec![
                Port::new(22, "ssh", true),
                Port::new(443, "https", true),
                Port::new(8080, "proxy", false),
            ],
        )
        .with_files(
            "/",
            vec![VirtualFile::encrypted_file("do_not_open.bin", 4_194_304)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_network_contains_the_training_target() {
        let hosts = create_seed_network();
        let target = hosts
            .iter()
            .find(|h| h.address == "10.0.0.25")
            .expect("seed host present");
        assert_eq!(target.tier, SecurityTier::Low);
        assert!(target.port(22).is_some_and(|p| p.required && !p.cracked));
        assert!(!target.discovered);
    }

    #[test]
    fn localhost_is_always_ours() {
        let local = Host::localhost();
        assert!(local.discovered);
        assert!(local.compromised);
        assert_eq!(local.tier, SecurityTier::None);
    }

    #[test]
    fn required_ports_gate_compromise() {
        let mut host = Host::server(
            "192.0.2.1",
            "dual",
            SecurityTier::Standard,
            vec![Port::new(22, "ssh", true), Port::new(443, "https", true)],
        );
        assert!(!host.required_ports_cracked());
        host.port_mut(22).unwrap().cracked = true;
        assert!(!host.required_ports_cracked());
        host.port_mut(443).unwrap().cracked = true;
        assert!(host.required_ports_cracked());
    }

    #[test]
    fn host_without_required_ports_cannot_be_compromised() {
        let host = Host::new("192.0.2.9", "husk", SecurityTier::Low, OsTag::Unknown);
        assert!(!host.required_ports_cracked());
    }
}
