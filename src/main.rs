//! `toolfabric` — CLI entry point for the agent-side tool fabric.
//!
//! Thin binary: parses arguments, initializes tracing, and delegates to
//! `toolfabric-core`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use toolfabric_core::{Manager, Registry};

#[derive(Parser, Debug)]
#[command(name = "toolfabric", version, about = "Agent-side tool fabric runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to every configured server and register their tools.
    Connect {
        /// Path to the `mcp.json`-shaped configuration file.
        #[arg(default_value = "mcp.json", value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Re-read the config, diff it against the running set, and apply the
    /// difference: connect new servers, close removed ones, scan scripts.
    Reload {
        #[arg(default_value = "mcp.json", value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Statically scan a single script file and print any findings.
    Scan {
        /// Path to the `.py`, `.ts`, or `.js` file to scan.
        script: PathBuf,
    },

    /// Print every tool currently registered, qualified name first.
    List {
        #[arg(default_value = "mcp.json", value_name = "CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let registry = Registry::new();

    match cli.command {
        Command::Connect { config } => {
            let manager = Manager::new(config);
            run_connect(&manager, &registry).await?;
            manager.close_all().await;
        }
        Command::Reload { config } => {
            let manager = Manager::new(config);
            run_reload(&manager, &registry).await?;
            manager.close_all().await;
        }
        Command::Scan { script } => run_scan(&script)?,
        Command::List { config } => {
            let manager = Manager::new(config);
            run_list(&manager, &registry).await?;
            manager.close_all().await;
        }
    }

    Ok(())
}

async fn run_connect(manager: &Manager, registry: &Arc<Registry>) -> Result<()> {
    let (connected, errors) = manager
        .connect_all()
        .await
        .context("failed to connect configured servers")?;
    manager.register_tools(registry).await;
    println!("connected {connected} server(s)");
    for (server, reason) in errors {
        println!("  [WARNING] {server}: {reason}");
    }
    for tool in registry.list() {
        println!("  {}", tool.name());
    }
    Ok(())
}

async fn run_reload(manager: &Manager, registry: &Arc<Registry>) -> Result<()> {
    let summary = manager
        .reload(registry)
        .await
        .context("reload failed to load configuration")?;
    println!("{summary}");
    Ok(())
}

fn run_scan(path: &PathBuf) -> Result<()> {
    let findings = toolfabric_core::scan(path).context("scan failed")?;
    if findings.is_empty() {
        println!("no findings");
        return Ok(());
    }
    for finding in &findings {
        println!(
            "[{:?}] {} line {}: {}",
            finding.severity, finding.rule_id, finding.line_number, finding.snippet
        );
    }
    if toolfabric_core::has_critical(&findings) {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_list(manager: &Manager, registry: &Arc<Registry>) -> Result<()> {
    manager
        .connect_all()
        .await
        .context("failed to connect configured servers")?;
    manager.register_tools(registry).await;
    for tool in registry.list() {
        println!("{}\t{}", tool.name(), tool.description());
    }
    Ok(())
}

fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
