// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # RaSe Node
//!
//! Entry point for the `rase-node` binary. Parses CLI arguments, initializes
//! logging, opens the record store and runs one subcommand against it.
//!
//! - `store` / `retrieve` / `repair` / `health` / `list`: record operations
//! - `corrupt` / `tamper`: simulated fragment loss
//! - `audit` / `changes`: print the journals
//! - `repl`: interactive session with the attack state machine
//! - `version`: print build version information
//!
//! Results go to stdout, logs to stderr.

mod cli;
mod logging;
mod metrics;
mod repl;
mod setup;

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use rase_protocol::journal::render_payload;
use rase_protocol::RecordStore;

use cli::{Commands, RaseNodeCli};
use logging::LogFormat;
use metrics::StoreMetrics;
use setup::JournalView;

fn main() -> Result<()> {
    let cli = RaseNodeCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    logging::init_logging(&cli.log_level, LogFormat::from(cli.log_format));

    let config = setup::resolve_config(cli.config.as_deref(), &cli.data_dir, cli.ephemeral)?;
    let (store, journals) = setup::open_store(&config)?;

    run_command(cli.command, store, journals)
}

fn run_command(command: Commands, store: RecordStore, journals: JournalView) -> Result<()> {
    match command {
        Commands::Store(args) => {
            let payload = match (&args.data, &args.file) {
                (_, Some(path)) => std::fs::read(path)
                    .with_context(|| format!("failed to read payload from {}", path.display()))?,
                (Some(data), None) => data.clone().into_bytes(),
                (None, None) => anyhow::bail!("no payload given"),
            };
            let receipt = store
                .store(&args.user, &args.id, &payload)
                .with_context(|| format!("failed to store {}", args.id))?;
            print_json(&receipt)
        }
        Commands::Retrieve(args) => {
            let payload = store
                .retrieve(&args.user, &args.id)
                .with_context(|| format!("failed to retrieve {}", args.id))?;
            let mut stdout = std::io::stdout().lock();
            if args.hex {
                writeln!(stdout, "{}", hex::encode(&payload))?;
            } else if std::str::from_utf8(&payload).is_ok() {
                stdout.write_all(&payload)?;
                writeln!(stdout)?;
            } else {
                writeln!(stdout, "{}", render_payload(&payload))?;
            }
            Ok(())
        }
        Commands::Corrupt(args) => {
            let report = if args.shards.is_empty() && args.shares.is_empty() {
                store.inject_corruption(&args.user, &args.id, args.count)
            } else {
                store.inject_corruption_at(&args.user, &args.id, &args.shards, &args.shares)
            }
            .with_context(|| format!("failed to corrupt {}", args.id))?;
            print_json(&report)
        }
        Commands::Tamper(args) => {
            let report = store
                .tamper_shard(&args.user, &args.id, args.index)
                .with_context(|| format!("failed to tamper with {}", args.id))?;
            print_json(&report)
        }
        Commands::Repair(args) => {
            let report = store
                .repair(&args.user, &args.id)
                .with_context(|| format!("failed to repair {}", args.id))?;
            print_json(&report)
        }
        Commands::Health(args) => {
            let health = store.health(&args.id)?;
            tracing::info!("{}", repl::describe_health(&health));
            print_json(&health)
        }
        Commands::List => {
            for id in store.list_ids()? {
                println!("{id}");
            }
            Ok(())
        }
        Commands::Audit => print_lines(journals.audit_lines()?),
        Commands::Changes => print_lines(journals.change_lines()?),
        Commands::Repl => {
            let metrics = StoreMetrics::new().context("failed to register metrics")?;
            let session = repl::Session::new(store, journals, metrics);
            session.run(std::io::stdin().lock(), std::io::stdout().lock())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_lines(lines: Vec<String>) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    Ok(())
}

fn print_version() {
    println!("rase-node      {}", env!("CARGO_PKG_VERSION"));
    println!(
        "record format  v{}",
        rase_protocol::persistence::sled_backend::RECORD_FORMAT_VERSION
    );
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
