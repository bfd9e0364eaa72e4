//! blackice - line-oriented front end for the intrusion simulation engine
//!
//! Reads commands from stdin, hands them to the router, and prints whatever
//! the engine reports. All the interesting behavior lives in the library.

use blackice::engine::{router, MemoryState, Session};
use std::io::{self, BufRead, Write};

fn main() -> io::Result<()> {
    env_logger::init();

    let mut session = Session::new();
    if let Err(err) = session.attach_state(Box::new(MemoryState::new())) {
        eprintln!("state store rejected: {err}");
    }

    println!("blackice {} - type `help` to get started, `quit` to bail.", blackice::VERSION);
    println!("Your rig is 127.0.0.1. First move is usually `scan`.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("{}> ", session.current_node);
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        for out in router::dispatch(&mut session, line) {
            println!("{out}");
        }
        for event in session.drain_events() {
            println!("[{}] {}", event.severity().symbol(), event.message());
        }
    }

    println!("Link severed. Stay untraceable.");
    Ok(())
}
