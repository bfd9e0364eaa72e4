//! End-to-end runs through the public surface: scan, crack, compromise,
//! get detected, survive the counter-attack.

use blackice::data::SecurityTier;
use blackice::engine::{router, AttackSeverity, GameEvent, MemoryState, Session, StateStore};
use chrono::{Duration, Utc};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn first_crack_of_the_training_target() {
    let mut session = Session::with_seed(0xb1ac);
    let shared = Rc::new(RefCell::new(MemoryState::new()));
    session.attach_state(Box::new(shared.clone())).unwrap();
    let mut now = Utc::now();

    let report = session.scan();
    assert!(report.newly_discovered.contains(&"10.0.0.25".to_string()));
    assert_eq!(session.network.host("10.0.0.25").unwrap().tier, SecurityTier::Low);

    // The crack roll is probabilistic (0.85 base against a low tier), so
    // drive attempts until one lands. Each attempt is one start + one tick
    // past the tool duration.
    let mut compromised_events = 0;
    for _ in 0..25 {
        if session.counter.is_under_attack() {
            session.end_attack();
        }
        session.run_tool("sshcrack", "10.0.0.25", now);
        now += Duration::seconds(11);
        session.tick(now);
        compromised_events += session
            .drain_events()
            .iter()
            .filter(|e| matches!(e, GameEvent::HostCompromised { .. }))
            .count();
        if session.network.host("10.0.0.25").unwrap().compromised {
            break;
        }
    }

    let host = session.network.host("10.0.0.25").unwrap();
    assert!(host.port(22).unwrap().cracked, "port 22 should be cracked");
    assert!(host.compromised, "host should be compromised");
    assert_eq!(compromised_events, 1, "exactly one host-compromised event");

    // The injected store saw all of it
    let snapshot = shared.borrow().snapshot();
    assert!(snapshot.cracked_ports.contains(&"10.0.0.25:22".to_string()));
    assert!(snapshot.compromised_nodes.contains(&"10.0.0.25".to_string()));
}

#[test]
fn compromise_opens_connect_and_the_remote_file_table() {
    let mut session = Session::with_seed(7);
    let now = Utc::now();
    router::dispatch_at(&mut session, "scan", now);

    // Skip the dice: set up the world directly, then walk the router path
    session.network.crack_port("10.0.0.25", 22);
    session.network.compromise("10.0.0.25");

    let output = router::dispatch_at(&mut session, "connect 10.0.0.25", now);
    assert!(output[0].contains("Shell open"));
    let output = router::dispatch_at(&mut session, "ls /var/log", now);
    assert!(output.iter().any(|l| l.contains("auth.log")));

    // Compromised remote hosts allow file mutation through the router
    let output = router::dispatch_at(&mut session, "rm /var/log/auth.log", now);
    assert!(output[0].contains("wiped"));
}

#[test]
fn compromise_is_monotone_across_engine_operations() {
    let mut session = Session::with_seed(11);
    let mut now = Utc::now();
    session.scan();
    session.network.crack_port("10.0.0.25", 22);
    session.network.compromise("10.0.0.25");

    // Grind a bunch of operations; nothing may undo the flag
    for round in 0..10 {
        session.run_tool("ftpbounce", "10.0.0.113", now);
        now += Duration::seconds(9);
        session.tick(now);
        if session.counter.is_under_attack() {
            session.execute_defense("firewall", now + Duration::seconds(round));
            session.end_attack();
        }
        assert!(session.network.host("10.0.0.25").unwrap().compromised);
    }
}

#[test]
fn critical_retaliation_full_bundle_and_defense_recovery() {
    let mut session = Session::with_seed(23);
    let mut now = Utc::now();
    session.scan();

    let result = session
        .counter
        .launch(AttackSeverity::Critical, &mut session.resources, now);
    assert!(result.launched);
    let effects = result.effects.expect("critical carries a bundle");
    assert!(effects.force_disconnect);
    assert!(!effects.lost_tools.is_empty());
    assert!(session.counter.is_under_attack());

    // Defense commands roll until one lands; cooldowns force us to wait
    // between attempts on the same command.
    let mut survived = false;
    for _ in 0..30 {
        let outcome = session.execute_defense("isolate", now);
        if outcome.success {
            survived = true;
            break;
        }
        now += Duration::seconds(91);
    }
    assert!(survived, "isolate never landed in 30 windows");
    assert!(!session.counter.is_under_attack());
}

#[test]
fn defense_cooldown_is_enforced_through_the_router() {
    let mut session = Session::with_seed(31);
    let now = Utc::now();
    session
        .counter
        .launch(AttackSeverity::Medium, &mut session.resources, now);

    let first = router::dispatch_at(&mut session, "trace_block", now);
    // Whatever the roll did, an immediate retry must hit the cooldown
    if session.counter.is_under_attack() {
        let retry = router::dispatch_at(&mut session, "trace_block", now + Duration::seconds(2));
        assert!(retry[0].contains("recharging"), "got: {}", retry[0]);
    } else {
        assert!(first[0].contains("worked"), "got: {}", first[0]);
    }
}

#[test]
fn trace_level_reported_by_status_is_fresh() {
    let mut session = Session::with_seed(47);
    let now = Utc::now();
    session.detection.spawn_trace(
        "10.0.3.7",
        10.0,
        Duration::seconds(100),
        blackice::engine::TraceKind::Active,
        0.0,
        now,
    );

    // Status at t+50 must show the advanced progress, not the stale zero
    let output = router::dispatch_at(&mut session, "status", now + Duration::seconds(50));
    assert!(output[0].contains("trace level: 5.0"), "got: {}", output[0]);
}

#[test]
fn resource_pressure_rejects_tool_starts_with_a_reason() {
    let mut session = Session::with_seed(53);
    let now = Utc::now();
    session.scan();
    session.resources.max.ram = 1700.0;

    let output = router::dispatch_at(&mut session, "sshcrack 10.0.0.25", now);
    assert!(output[0].contains("RAM"), "got: {}", output[0]);
    assert_eq!(session.exec.running().count(), 0);
}
