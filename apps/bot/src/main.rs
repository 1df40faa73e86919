#![deny(warnings)]

//! Referee-facing bot: reads turn records on stdin and answers each with
//! one command on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use lab_ai::{decide, PolicyConfig};
use lab_core::{validate_snapshot, Snapshot};
use lab_protocol::{write_command, ProtocolReader};
use std::io;
use tracing::{info, trace, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    snapshot: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next(),
            "--snapshot" => args.snapshot = it.next(),
            _ => {}
        }
    }
    args
}

fn load_config(path: Option<&str>) -> Result<PolicyConfig> {
    match path {
        Some(path) => PolicyConfig::load(path)
            .with_context(|| format!("loading policy config from {path}")),
        None => Ok(PolicyConfig::default()),
    }
}

/// Decide once from a JSON snapshot on disk.
fn replay(path: &str, config: &PolicyConfig) -> Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let snapshot: Snapshot =
        serde_json::from_str(&text).with_context(|| format!("parsing snapshot {path}"))?;
    validate_snapshot(&snapshot)?;
    let command = decide(&snapshot, config);
    write_command(&mut io::stdout().lock(), &command)?;
    Ok(())
}

fn play(config: &PolicyConfig) -> Result<()> {
    let mut reader = ProtocolReader::new(io::stdin().lock());
    let mut out = io::stdout().lock();

    let projects = reader
        .read_projects()
        .context("reading science projects")?;
    info!(count = projects.len(), "science projects ignored");

    let mut turn_no: u32 = 0;
    loop {
        let turn = match reader.read_turn() {
            Ok(Some(turn)) => turn,
            Ok(None) => break,
            Err(err) => {
                if let Some(token) = err.unknown_station() {
                    warn!(token, turn = turn_no, "unknown station, no command this turn");
                    turn_no += 1;
                    continue;
                }
                return Err(err).with_context(|| format!("reading turn {turn_no}"));
            }
        };
        if tracing::enabled!(Level::TRACE) {
            trace!(snapshot = %serde_json::to_string(&turn.snapshot)?, "snapshot");
        }
        let command = decide(&turn.snapshot, config);
        write_command(&mut out, &command).context("writing command")?;
        turn_no += 1;
    }
    info!(turns = turn_no, "input closed");
    Ok(())
}

fn main() -> Result<()> {
    // stdout is the command channel
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = parse_args();
    info!(?args, "starting bot");

    let config = load_config(args.config.as_deref())?;
    match args.snapshot.as_deref() {
        Some(path) => replay(path, &config),
        None => play(&config),
    }
}
