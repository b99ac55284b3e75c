//! Trackplan CLI
//!
//! Usage:
//!   trackplan [OPTIONS] [FILE]
//!
//! Validates a saved layout file (TOML of connection and group records) and
//! prints a structural summary. Exits non-zero when any record is
//! malformed.

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::Parser;

use trackplan::{LayoutFile, LayoutFileError};

#[derive(Parser)]
#[command(name = "trackplan")]
#[command(about = "Inspect and validate saved piece-layout files")]
struct Cli {
    /// Input file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Only report validity; suppress the summary
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.input.is_none() && io::stdin().is_terminal() {
        eprintln!("trackplan: pass a layout file or pipe one on stdin (see --help)");
        std::process::exit(2);
    }

    let source = match read_input(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading input: {}", e);
            std::process::exit(1);
        }
    };

    let layout = match LayoutFile::from_toml(&source) {
        Ok(layout) => layout,
        Err(LayoutFileError::Parse(e)) => {
            eprintln!("Error parsing layout: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let bad_connections: Vec<_> = layout
        .connections
        .iter()
        .filter(|r| !r.is_valid())
        .collect();
    let bad_groups: Vec<_> = layout.groups.iter().filter(|r| !r.is_valid()).collect();
    let paired = layout
        .connections
        .iter()
        .filter(|r| !r.other_connection.is_empty())
        .count();
    let nested = layout.groups.iter().filter(|r| r.group.is_some()).count();
    let locked = layout
        .groups
        .iter()
        .filter(|r| r.locked == Some(1))
        .count();

    if !cli.quiet {
        println!(
            "connections: {} ({} paired, {} open)",
            layout.connections.len(),
            paired,
            layout.connections.len() - paired
        );
        println!(
            "groups: {} ({} nested, {} locked)",
            layout.groups.len(),
            nested,
            locked
        );
    }

    if bad_connections.is_empty() && bad_groups.is_empty() {
        if !cli.quiet {
            println!("ok");
        }
        return;
    }

    for record in &bad_connections {
        eprintln!("invalid connection record: '{}'", record.id);
    }
    for record in &bad_groups {
        eprintln!("invalid group record: '{}'", record.id);
    }
    std::process::exit(1);
}

fn read_input(input: &Option<PathBuf>) -> io::Result<String> {
    match input {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
