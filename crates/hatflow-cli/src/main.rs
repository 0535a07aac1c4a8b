//! `hatflow-cli` – run a `weatherhat` node on the command line.
//!
//! The binary stands in for a flow host:
//!
//! 1. Loads `~/.hatflow/config.toml` (or `--config <path>`), then applies
//!    `HATFLOW_*` overrides.
//! 2. Registers the `weatherhat` type against the simulated Weather HAT and
//!    creates one node from the configured settings.
//! 3. Injects a timestamp message every `inject_interval_ms` and prints each
//!    outbound message and status change.
//! 4. Closes the node on Ctrl-C or after `inject_count` messages.
//!
//! `--init-config` writes the default configuration and exits.

mod config;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use hatflow_hal::BusGuard;
use hatflow_hal::sim::SimBackend;
use hatflow_middleware::{EventBus, FlowEvent, NodeContext, NodeRegistry, Topic, TopicReceiver};
use hatflow_node::NODE_KIND;
use hatflow_types::{Message, StatusFill};
use tokio::sync::watch;
use tracing::{info, warn};

const NODE_ID: &str = "weatherhat-1";

fn main() {
    let _telemetry = telemetry::init_tracing("hatflow");

    let args = Args::parse();

    print_banner();

    let path = args.config.unwrap_or_else(config::config_path);
    if args.init_config {
        match config::save_to(&config::Config::default(), &path) {
            Ok(()) => println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            ),
            Err(e) => {
                println!("{}: {}", "Error saving config".red(), e);
                std::process::exit(1);
            }
        }
        return;
    }

    let mut cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            println!(
                "  No config at {}; using defaults.",
                path.display().to_string().dimmed()
            );
            config::Config::default()
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – closing node …".yellow().bold());
        shutdown_tx.send_replace(true);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start runtime".red(), e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run(cfg, shutdown_rx));
}

async fn run(cfg: config::Config, mut shutdown: watch::Receiver<bool>) {
    let bus = EventBus::default();
    let printer = tokio::spawn(print_events(
        bus.subscribe_to(Topic::Output),
        bus.subscribe_to(Topic::Status),
    ));

    let mut registry = NodeRegistry::new();
    hatflow_node::register(
        &mut registry,
        Arc::new(SimBackend::new(cfg.simulation.clone())),
        BusGuard::new(),
    );

    let node = match registry.create(NODE_KIND, NodeContext::new(NODE_ID, bus.clone()), &cfg.node)
    {
        Ok(node) => node,
        Err(e) => {
            println!("{}: {}", "Cannot create node".red(), e);
            return;
        }
    };

    let topic = cfg.node.topic.clone().unwrap_or_default();
    let mut ticker = tokio::time::interval(Duration::from_millis(cfg.inject_interval_ms.max(1)));
    let mut injected: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut msg = Message::new(chrono::Utc::now().timestamp_millis());
                if !topic.is_empty() {
                    msg = msg.with_field("topic", topic.as_str());
                }
                node.on_input(msg).await;
                injected += 1;
                if cfg.inject_count > 0 && injected >= cfg.inject_count {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    node.close().await;
    info!(injected, "node closed");

    // Let the printer drain what is already on the bus.
    tokio::time::sleep(Duration::from_millis(50)).await;
    printer.abort();
    println!("  {}", "✓ Exiting hatflow.".green());
}

async fn print_events(mut outputs: TopicReceiver, mut statuses: TopicReceiver) {
    loop {
        let event = tokio::select! {
            event = outputs.recv() => event,
            event = statuses.recv() => event,
        };
        match event {
            Ok(FlowEvent::Output { message, .. }) => match serde_json::to_string_pretty(&message) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!(error = %e, "cannot render message"),
            },
            Ok(FlowEvent::Status { node_id, status }) => {
                let text = match status.fill {
                    StatusFill::Grey => status.text.as_str().dimmed(),
                    StatusFill::Green => status.text.as_str().green(),
                    StatusFill::Red => status.text.as_str().red(),
                };
                println!("  [{}] {}", node_id.as_str().bold(), text);
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "printer lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Arguments
// ─────────────────────────────────────────────────────────────────────────────

/// Run a `weatherhat` flow node against a simulated Weather HAT.
#[derive(Debug, Parser)]
#[command(name = "hatflow", version)]
struct Args {
    /// Config file (default ~/.hatflow/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the default config and exit
    #[arg(long)]
    init_config: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __          __  ______             "#.bold().cyan());
    println!("{}", r#"  / /_  ____ _/ /_/ __/ /___ _      __"#.bold().cyan());
    println!("{}", r#" / __ \/ __ `/ __/ /_/ / __ \ | /| / /"#.bold().cyan());
    println!("{}", r#"/_/ /_/\__,_/\__/_/ /_/\____/__/|__/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "hatflow".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Weather HAT flow node");
    println!();
}
