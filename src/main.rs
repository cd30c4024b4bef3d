//! `orchestrator-demo`: a small CLI that loads an `OrchestratorConfig`,
//! registers the three reference agents, and runs a workflow definition to
//! completion (or until interrupted).
//!
//! This binary has no real Model Gateway or External Service implementation
//! to call into, so it wires the reference agents against the mock
//! doubles in [`agent_orchestrator::testing::mocks`]. A real deployment
//! supplies its own `ModelGateway`/`ExternalServices` implementations and
//! calls the library directly rather than going through this binary.

use agent_orchestrator::config::OrchestratorConfig;
use agent_orchestrator::model::{AgentContext, WorkflowDefinition, WorkflowStep};
use agent_orchestrator::orchestrator::Orchestrator;
use agent_orchestrator::testing::mocks::{MockExternalServices, MockMetricsSink, MockModelGateway};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orchestrator-demo")]
#[command(about = "Demo CLI for the agent orchestration engine")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow definition to completion
    Run {
        /// Workflow definition as a JSON file; the built-in sourcing-and-enrichment demo runs if omitted
        #[arg(short, long, value_name = "FILE")]
        workflow: Option<PathBuf>,
    },
    /// Validate and print the effective configuration
    Config {
        /// Print the resolved configuration as TOML
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("starting orchestrator-demo v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run { workflow } => run_workflow(config, workflow).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(err) = result {
        error!(error = %err, "command failed");
        process::exit(1);
    }

    info!("shutdown complete");
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<OrchestratorConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            Ok(OrchestratorConfig::load_from_file(path)?)
        }
        None => {
            for candidate in ["orchestrator.toml", "config/orchestrator.toml"] {
                let path = PathBuf::from(candidate);
                if path.exists() {
                    info!(path = %path.display(), "loading configuration");
                    return Ok(OrchestratorConfig::load_from_file(&path)?);
                }
            }
            info!("no configuration file found, using defaults");
            Ok(OrchestratorConfig::default())
        }
    }
}

fn handle_config_command(config: OrchestratorConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    if show {
        println!("{}", toml::to_string_pretty(&config)?);
    }
    info!("configuration is valid");
    Ok(())
}

fn demo_workflow() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "sourcing-pipeline",
        "source, enrich, and plan outreach",
        vec![
            WorkflowStep::new("find", "sourcing", "candidate_search")
                .with_input(serde_json::json!({"query": "staff engineer", "limit": 5})),
            WorkflowStep::new("enrich", "enrichment", "enrichment")
                .with_dependencies(vec!["find"])
                .with_input(serde_json::json!({"candidates": []})),
            WorkflowStep::new("plan", "planning", "planning")
                .with_dependencies(vec!["enrich"])
                .with_input(serde_json::json!({"role": "staff engineer"})),
        ],
    )
}

async fn run_workflow(config: OrchestratorConfig, workflow_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let definition = match workflow_path {
        Some(path) => {
            info!(path = %path.display(), "loading workflow definition");
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        }
        None => demo_workflow(),
    };

    let orchestrator = Arc::new(Orchestrator::new(config, Arc::new(MockMetricsSink::new())));
    orchestrator.register_reference_agents(
        Arc::new(MockModelGateway::passthrough()),
        Arc::new(MockExternalServices::with_candidates(vec![])),
    );
    orchestrator.initialize().await?;

    let context = AgentContext::new("demo-user", "demo-session");
    let workflow_id = definition.id.clone();
    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.execute_workflow(definition, context).await })
    };

    tokio::pin!(running);
    let instance = tokio::select! {
        result = &mut running => result??,
        _ = wait_for_shutdown_signal() => {
            info!("interrupt received, cancelling in-flight workflow");
            if let Some(id) = orchestrator.active_instance_ids().into_iter().find(|id| id.starts_with(&workflow_id)) {
                orchestrator.cancel_workflow(&id)?;
            }
            running.await??
        }
    };

    info!(status = ?instance.status, "workflow finished");
    for (step_id, outcome) in &instance.results {
        info!(step_id, status = ?outcome.status, "step outcome");
    }

    orchestrator.shutdown().await?;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
