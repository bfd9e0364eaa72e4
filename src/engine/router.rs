//! Thin command dispatch
//!
//! Maps a textual command to engine calls and renders plain-text output in
//! return. Argument parsing and access policy (who may connect where, who
//! may touch which files) live here; the engine itself stays dumb.

use crate::data::{FileKind, ToolKind, VirtualFile};
use crate::engine::{ExecStart, Session};
use chrono::{DateTime, Duration, Utc};

/// Process one command line against the session, wall-clock time
pub fn dispatch(session: &mut Session, line: &str) -> Vec<String> {
    dispatch_at(session, line, Utc::now())
}

/// Process one command line at an explicit time (test harnesses)
pub fn dispatch_at(session: &mut Session, line: &str, now: DateTime<Utc>) -> Vec<String> {
    // Traces and completions advance before anything is reported, so the
    // player never reads a stale trace level.
    session.tick(now);

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return vec![];
    }

    match parts[0] {
        "help" | "?" => help_text(),

        "scan" => {
            let report = session.scan();
            if report.newly_discovered.is_empty() {
                vec!["[SCAN] Sweep complete. Nothing new.".to_string()]
            } else {
                let mut output = vec![format!(
                    "[SCAN] Sweep complete: {} new host(s).",
                    report.newly_discovered.len()
                )];
                for address in &report.newly_discovered {
                    if let Some(host) = session.network.host(address) {
                        output.push(format!(
                            "  {} ({}) security: {}",
                            host.address, host.hostname, host.tier
                        ));
                    }
                }
                output
            }
        }

        "hosts" => {
            let rows: Vec<String> = session
                .network
                .discovered()
                .map(|h| {
                    let status = if h.address == session.network.local_address {
                        "home"
                    } else if h.compromised {
                        "COMPROMISED"
                    } else {
                        "locked"
                    };
                    format!(
                        "  {:<15} {:<14} {:<9} {}",
                        h.address, h.hostname, h.tier.to_string(), status
                    )
                })
                .collect();
            let mut output = vec![format!("[NET] {} known host(s):", rows.len())];
            output.extend(rows);
            output
        }

        "probe" => {
            let Some(target) = parts.get(1) else {
                return vec!["[ERROR] Usage: probe <ip>".to_string()];
            };
            let Some(host) = session.network.host(target) else {
                return vec![format!("[ERROR] Unknown host {target}. Run scan first.")];
            };
            if !host.discovered {
                return vec![format!("[ERROR] {target} has not been discovered. Run scan first.")];
            }
            let mut output = vec![
                format!("[PROBE] {} ({})", host.address, host.hostname),
                format!("  security: {} | os: {:?}", host.tier, host.os),
                format!(
                    "  status: {}",
                    if host.compromised { "COMPROMISED" } else { "locked" }
                ),
            ];
            for port in &host.ports {
                output.push(format!(
                    "  {:>5}/{:<8} {}",
                    port.number,
                    port.service,
                    if port.cracked { "CRACKED" } else { "closed to you" }
                ));
            }
            output
        }

        "connect" => {
            let Some(target) = parts.get(1) else {
                return vec!["[ERROR] Usage: connect <ip>".to_string()];
            };
            let Some(host) = session.network.host(target) else {
                return vec![format!("[ERROR] Unknown host {target}. Run scan first.")];
            };
            if !host.discovered {
                return vec![format!("[ERROR] {target} has not been discovered. Run scan first.")];
            }
            if !host.compromised {
                return vec![format!(
                    "[ERROR] No access to {target}. Crack its services first."
                )];
            }
            let hostname = host.hostname.clone();
            session.set_current_node(target);
            vec![format!("[CONNECT] Shell open on {target} ({hostname})")]
        }

        "disconnect" => {
            let local = session.network.local_address.clone();
            if session.current_node == local {
                vec!["[NET] Already home.".to_string()]
            } else {
                let previous = session.current_node.clone();
                session.set_current_node(&local);
                vec![format!("[NET] Dropped link to {previous}. Back home.")]
            }
        }

        "ps" | "processes" => {
            let rows: Vec<String> = session
                .exec
                .running()
                .map(|p| {
                    format!(
                        "  {}  {:<14} {:<15} {:>3.0}%  {}s left",
                        p.id.short(),
                        p.tool,
                        p.target,
                        p.progress(now) * 100.0,
                        p.remaining(now).num_seconds()
                    )
                })
                .collect();
            if rows.is_empty() {
                vec!["[PS] Nothing running.".to_string()]
            } else {
                let mut output = vec!["[PS] Active operations:".to_string()];
                output.extend(rows);
                output
            }
        }

        "kill" => {
            let Some(prefix) = parts.get(1) else {
                return vec!["[ERROR] Usage: kill <process-id>".to_string()];
            };
            match session.kill_tool(prefix) {
                Some((tool, target)) => {
                    vec![format!("[KILL] Stopped {tool} against {target}. Resources freed.")]
                }
                None => vec![format!("[ERROR] No running process matches '{prefix}'.")],
            }
        }

        "status" => {
            let under_attack = session.counter.is_under_attack();
            vec![
                format!(
                    "node: {} | trace level: {:.1} | traces: {} | {}",
                    session.current_node,
                    session.trace_level(),
                    session.detection.active_count(),
                    if under_attack { "UNDER ATTACK" } else { "quiet" }
                ),
                format!(
                    "cracked: {} | compromised: {} | detected {} times | attacks survived: {}/{}",
                    session.stats.ports_cracked,
                    session.stats.hosts_compromised,
                    session.stats.times_detected,
                    session.stats.counter_attacks_survived,
                    session.stats.counter_attacks_suffered,
                ),
            ]
        }

        "resources" | "top" => {
            let r = &session.resources;
            vec![
                format!(
                    "CPU {:>5.1}% of {:.0}%{}",
                    r.current.cpu,
                    r.cpu_capacity(),
                    if r.cpu_capacity() < r.max.cpu {
                        " (thermal throttle)"
                    } else {
                        ""
                    }
                ),
                format!("RAM {:>5.0}MB of {:.0}MB", r.current.ram, r.max.ram),
                format!("NET {:>5.1}Mbps of {:.0}Mbps", r.current.network, r.max.network),
                format!("TMP {:>5.1}C", r.current.temperature),
            ]
        }

        "traces" => {
            let rows: Vec<String> = session
                .detection
                .traces()
                .map(|t| {
                    format!(
                        "  {}  {:<16} {:<8} {:>5.1}%  strength {:.0}",
                        t.id.short(),
                        t.source,
                        t.kind.to_string(),
                        t.progress,
                        t.strength
                    )
                })
                .collect();
            if rows.is_empty() {
                vec!["[TRACE] Board is clear.".to_string()]
            } else {
                let mut output = vec![format!(
                    "[TRACE] Level {:.1}, {} active:",
                    session.trace_level(),
                    rows.len()
                )];
                output.extend(rows);
                output
            }
        }

        "tools" => {
            let mut names: Vec<&&str> = session.tools().keys().collect();
            names.sort();
            let mut output = vec!["[KIT] Tool catalogue:".to_string()];
            for name in names {
                let spec = &session.tools()[*name];
                let owned = if session.has_tool(name) { " " } else { "*" };
                output.push(format!(
                    " {}{:<14} cpu {:>2.0}% ram {:>4.0}MB net {:>2.0}Mbps {:>3}s  {}",
                    owned,
                    spec.name,
                    spec.cpu,
                    spec.ram,
                    spec.network,
                    spec.duration.num_seconds(),
                    spec.description
                ));
            }
            output.push("  (* = not in your kit)".to_string());
            output
        }

        "defenses" => {
            let mut output = vec!["[DEF] Defense commands:".to_string()];
            for row in session.counter.defense_commands(now) {
                let cooldown = if row.cooldown_remaining > Duration::zero() {
                    format!("recharging {}s", row.cooldown_remaining.num_seconds())
                } else {
                    "ready".to_string()
                };
                output.push(format!(
                    "  {:<12} {:>3.0}%  {:<14} {}",
                    row.name,
                    row.base_effectiveness * 100.0,
                    cooldown,
                    row.description
                ));
            }
            output
        }

        "firewall" | "isolate" | "trace_block" | "counter_hack" | "panic" => {
            let outcome = session.execute_defense(parts[0], now);
            vec![outcome.message]
        }

        "tracekill" => {
            if !session.has_tool("tracekill") {
                return vec![
                    "[ERROR] You don't own tracekill. Counter-hack an attacker to learn it."
                        .to_string(),
                ];
            }
            let local = session.network.local_address.clone();
            start_output(session.run_tool("tracekill", &local, now), "tracekill", &local)
        }

        "ls" => {
            let node = session.current_node.clone();
            match parts.get(1) {
                None => {
                    let paths = session.network.paths(&node);
                    if paths.is_empty() {
                        vec!["[FS] No readable directories here.".to_string()]
                    } else {
                        let mut output = vec![format!("[FS] Directories on {node}:")];
                        output.extend(paths.iter().map(|p| format!("  {p}")));
                        output
                    }
                }
                Some(path) => match session.network.files(&node, path) {
                    Some(files) => {
                        let mut output = vec![format!("[FS] {node}:{path}")];
                        for file in files {
                            let marker = match (file.kind, file.encrypted) {
                                (FileKind::Directory, _) => "/",
                                (_, true) => " [encrypted]",
                                _ => "",
                            };
                            output.push(format!(
                                "  {} {:>9}  {}{}",
                                file.permissions, file.size_bytes, file.name, marker
                            ));
                        }
                        output
                    }
                    None => vec![format!("[ERROR] No such directory: {path}")],
                },
            }
        }

        "cat" => {
            let Some(full) = parts.get(1) else {
                return vec!["[ERROR] Usage: cat <path/file>".to_string()];
            };
            let node = session.current_node.clone();
            let Some((path, name)) = split_path(full) else {
                return vec![format!("[ERROR] Can't parse path: {full}")];
            };
            let Some(files) = session.network.files(&node, &path) else {
                return vec![format!("[ERROR] No such directory: {path}")];
            };
            match files.iter().find(|f| f.name == name) {
                Some(file) if file.encrypted => {
                    vec![format!("[FS] {name} is encrypted. You'd need the key.")]
                }
                Some(file) => match &file.content {
                    Some(content) => content.lines().map(|l| l.to_string()).collect(),
                    None => vec![format!("[FS] {name}: binary data.")],
                },
                None => vec![format!("[ERROR] No such file: {name}")],
            }
        }

        "rm" => {
            let Some(full) = parts.get(1) else {
                return vec!["[ERROR] Usage: rm <path/file>".to_string()];
            };
            let node = session.current_node.clone();
            if let Some(denied) = file_mutation_denied(session, &node) {
                return vec![denied];
            }
            let Some((path, name)) = split_path(full) else {
                return vec![format!("[ERROR] Can't parse path: {full}")];
            };
            if session.network.delete_file(&node, &path, &name) {
                vec![format!("[FS] {name} wiped from {node}:{path}")]
            } else {
                vec![format!("[ERROR] No such file: {full}")]
            }
        }

        "touch" => {
            let Some(full) = parts.get(1) else {
                return vec!["[ERROR] Usage: touch <path/file>".to_string()];
            };
            let node = session.current_node.clone();
            if let Some(denied) = file_mutation_denied(session, &node) {
                return vec![denied];
            }
            let Some((path, name)) = split_path(full) else {
                return vec![format!("[ERROR] Can't parse path: {full}")];
            };
            session
                .network
                .add_file(&node, &path, VirtualFile::file(&name, 0, ""));
            vec![format!("[FS] {name} dropped in {node}:{path}")]
        }

        // Anything else: maybe it's a tool invocation, `<tool> <ip>`
        tool if session.tool_spec(tool).is_some() => {
            let spec = session.tool_spec(tool).cloned();
            let is_crack = spec.is_some_and(|s| s.kind == ToolKind::Crack);
            if !is_crack {
                return vec![format!("[ERROR] {tool} takes no target. Just run `{tool}`.")];
            }
            let Some(target) = parts.get(1) else {
                return vec![format!("[ERROR] Usage: {tool} <ip>")];
            };
            start_output(session.run_tool(tool, target, now), tool, target)
        }

        unknown => vec![format!("[ERROR] Unknown command: {unknown}. Try `help`.")],
    }
}

/// Access policy for file mutation: localhost always; remote hosts only
/// once compromised.
fn file_mutation_denied(session: &Session, node: &str) -> Option<String> {
    if node == session.network.local_address {
        return None;
    }
    let compromised = session.network.host(node).is_some_and(|h| h.compromised);
    if compromised {
        None
    } else {
        Some(format!("[ERROR] {node} won't let you touch its files."))
    }
}

/// "/var/log/auth.log" -> ("/var/log", "auth.log")
fn split_path(full: &str) -> Option<(String, String)> {
    let (path, name) = full.rsplit_once('/')?;
    if name.is_empty() {
        return None;
    }
    let path = if path.is_empty() { "/" } else { path };
    Some((path.to_string(), name.to_string()))
}

fn start_output(start: ExecStart, tool: &str, target: &str) -> Vec<String> {
    match start {
        ExecStart::Started { process, duration } => vec![format!(
            "[RUN] {tool} launched against {target} (~{}s). Process {}.",
            duration.num_seconds(),
            process.short()
        )],
        ExecStart::AlreadyRunning { remaining, .. } => vec![format!(
            "[RUN] {tool} is already working on {target}: {}s remaining.",
            remaining.num_seconds()
        )],
        ExecStart::Rejected { reason } => vec![format!("[ERROR] {reason}")],
    }
}

fn help_text() -> Vec<String> {
    vec![
        "COMMANDS".to_string(),
        "  scan                 sweep for hosts from where you sit".to_string(),
        "  hosts                everything you've discovered so far".to_string(),
        "  probe <ip>           port and security detail on a host".to_string(),
        "  connect <ip>         open a shell on a compromised host".to_string(),
        "  disconnect           drop back to your own rig".to_string(),
        "  <tool> <ip>          run an offensive tool (see `tools`)".to_string(),
        "  ps / kill <id>       running operations, stop one".to_string(),
        "  ls / cat / rm / touch  poke at the local file table".to_string(),
        "  status / resources / traces   how bad is it".to_string(),
        "  defenses             defense commands and cooldowns".to_string(),
        "  firewall|isolate|trace_block|counter_hack|panic   fight back".to_string(),
        "  tracekill            burn every active trace (if you own it)".to_string(),
    ]
}
