//! Binary entry point: loads configuration and an optional rules file,
//! wires the context/bus/plugin pipeline together, streams a KIF file (or
//! stdin) in as input, and reports what landed until interrupted.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use reasoner_bus::EventBus;
use reasoner_context::Context;
use reasoner_plugins::{install, standard_plugins, shutdown, ExternalInput, Lifecycle};
use reasoner_system::ReasonerConfig;

/// Concurrent forward-chaining reasoner over KIF.
#[derive(Parser, Debug)]
#[command(name = "reasoner", version, about)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// A KIF file to assert on startup, in addition to anything read from
    /// stdin.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Read additional KIF input from stdin, one form (or several) per
    /// line, until EOF.
    #[arg(long, default_value_t = false)]
    stdin: bool,

    /// Attribute all input from this invocation to a named note instead
    /// of the global scope.
    #[arg(long)]
    note: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    reasoner_system::init_logging();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ReasonerConfig::from_file(path)?,
        None => ReasonerConfig::default(),
    };

    let ctx = Arc::new(Context::new(config.max_kb_size));
    if let Some(rules_path) = &config.rules_file {
        let text = std::fs::read_to_string(rules_path)?;
        let installed = reasoner_system::load_rules(&ctx, &text)?;
        log::info!("loaded {installed} rules from {rules_path}");
    }

    let bus = Arc::new(EventBus::new());
    let lifecycle = Arc::new(Lifecycle::new());
    let plugins = standard_plugins();
    install(&plugins, &bus, &ctx, &lifecycle);

    if let Some(input_path) = &args.input {
        let text = std::fs::read_to_string(input_path)?;
        bus.publish(ExternalInput {
            text,
            source_note: args.note.clone(),
        });
    }

    if args.stdin {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            bus.publish(ExternalInput {
                text: line,
                source_note: args.note.clone(),
            });
        }
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("received interrupt, shutting down");
        }
        _ = tokio::time::sleep(std::time::Duration::from_millis(500)) => {
            // Give the pipeline a moment to settle before reporting, for
            // the common case of a one-shot file load with no stdin.
        }
    }

    let global = ctx.get_kb(None);
    let stats = global.stats();
    log::info!(
        "global scope: {}/{} assertions, {} universal",
        stats.count,
        stats.capacity,
        stats.universal_count
    );

    shutdown(&plugins, &bus, &lifecycle);
    Ok(())
}
