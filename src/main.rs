//! stackgraph: declare, check, and resolve resource stacks
//!
//! Usage:
//!   stackgraph plan studio                    → validate, print order and lint findings
//!   stackgraph apply endpoint --keep          → resolve offline, save journal + report
//!   stackgraph policy studio                  → print identity documents
//!   stackgraph config                         → print effective config
//!   stackgraph version                        → show version

use clap::{Parser, Subcommand};
use stackgraph::config::{runs_dir, StackConfig};
use stackgraph::{simulated_effect, Blueprint};
use stackgraph_graph::{JournalingEffect, StackGraph};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "stackgraph",
    about = "Declarative resource graphs with typed capability grants",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (TOML)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a stack and print its resolution order and lint findings
    Plan {
        #[arg(value_enum)]
        blueprint: Blueprint,
    },
    /// Resolve a stack against the offline simulator and print its outputs
    Apply {
        #[arg(value_enum)]
        blueprint: Blueprint,
        /// Append one JSON line per provisioning call to this file
        #[arg(long)]
        journal: Option<PathBuf>,
        /// Write the YAML resolution report to this file
        #[arg(long)]
        report: Option<PathBuf>,
        /// Keep journal and report under the runs directory
        #[arg(long, default_value_t = false)]
        keep: bool,
    },
    /// Print the stack's identity documents and lint findings
    Policy {
        #[arg(value_enum)]
        blueprint: Blueprint,
    },
    /// Print the effective config as TOML
    Config,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref());

    let config_path = cli
        .config
        .as_ref()
        .map(|p| expand_tilde(p))
        .unwrap_or_else(StackConfig::default_path);

    match cli.command {
        Commands::Plan { blueprint } => {
            let config = StackConfig::load(&config_path);
            plan(blueprint, &config)?;
        }
        Commands::Apply {
            blueprint,
            journal,
            report,
            keep,
        } => {
            let config = StackConfig::load(&config_path);
            apply(blueprint, &config, journal, report, keep).await?;
        }
        Commands::Policy { blueprint } => {
            let config = StackConfig::load(&config_path);
            policy(blueprint, &config)?;
        }
        Commands::Config => {
            let config = StackConfig::load(&config_path);
            print!("{}", config.to_toml());
        }
        Commands::Version => {
            println!("stackgraph v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn init_tracing(log_file: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let (file_layer, guard) = match log_file.map(expand_tilde) {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "stackgraph.log".into());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));
            (
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                ),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stackgraph=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

fn plan(blueprint: Blueprint, config: &StackConfig) -> anyhow::Result<()> {
    let mut graph = blueprint.build(config)?;
    let order = graph.validate()?;

    println!("stack {} ({})", graph.name(), blueprint.name());
    for (i, id) in order.iter().enumerate() {
        let kind = graph.node(id.as_str()).map(|n| n.kind()).unwrap_or("?");
        println!("  {:>2}. {} [{}]", i + 1, id, kind);
    }
    print_findings(&graph);
    Ok(())
}

async fn apply(
    blueprint: Blueprint,
    config: &StackConfig,
    journal: Option<PathBuf>,
    report: Option<PathBuf>,
    keep: bool,
) -> anyhow::Result<()> {
    let mut graph = blueprint.build(config)?;
    graph.validate()?;

    let run = format!("{}-{}", graph.name(), graph.report().run_id);
    let journal = journal.or_else(|| keep.then(|| runs_dir().join(format!("{}.jsonl", run))));
    let report = report.or_else(|| keep.then(|| runs_dir().join(format!("{}.yaml", run))));

    let effect = simulated_effect(config);
    let resolved = match &journal {
        Some(path) => {
            tracing::info!("journaling to {}", path.display());
            graph.resolve_all(&JournalingEffect::new(effect, path)).await
        }
        None => graph.resolve_all(&effect).await,
    };

    if let Some(path) = &report {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        graph.report().write(path)?;
        tracing::info!("report written to {}", path.display());
    }
    eprintln!("{}", graph.report().summary_line());
    resolved?;

    let outputs = graph.compute_outputs()?;
    println!("{}", serde_json::to_string_pretty(&outputs)?);
    let exports = graph.compute_exports()?;
    if !exports.is_empty() {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "exports": exports }))?);
    }
    Ok(())
}

fn policy(blueprint: Blueprint, config: &StackConfig) -> anyhow::Result<()> {
    let graph = blueprint.build(config)?;
    for identity in graph.identities() {
        let mut inline = serde_json::Map::new();
        for (name, doc) in identity.inline_documents() {
            inline.insert(name.clone(), doc.to_json());
        }
        let rendered = serde_json::json!({
            "name": identity.name(),
            "path": identity.path(),
            "trust": identity.trust_document()?.to_json(),
            "inline": inline,
            "managed": identity.managed_capability_refs(),
        });
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    }
    print_findings(&graph);
    Ok(())
}

fn print_findings(graph: &StackGraph) {
    let findings = graph.lint();
    if findings.is_empty() {
        println!("no lint findings");
        return;
    }
    println!("{} lint findings:", findings.len());
    for finding in findings {
        println!("  {}", finding);
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
