mod recovery;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use skillflow_core::config::{dirs_home, AppConfig};
use skillflow_core::context::ExecutionContext;
use skillflow_core::error::SkillflowError;
use skillflow_engine::{GraphExecutor, Workflow};
use skillflow_skills::SkillRegistry;

use recovery::RecoveryPolicy;

#[derive(Parser)]
#[command(name = "skillflow", version, about = "Run workflow graphs of pluggable skills")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "skillflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow and print the final context
    Run {
        /// Workflow description (JSON)
        workflow: PathBuf,
        /// Initial context: a JSON object, or @path to a JSON file
        #[arg(long)]
        context: Option<String>,
        /// Fail once this many steps have run
        #[arg(long)]
        max_steps: Option<usize>,
        /// Check every output target before running
        #[arg(long)]
        strict: bool,
        /// Also print the step records
        #[arg(long)]
        summary: bool,
    },
    /// Validate a workflow and resolve its skills without running it
    Validate {
        /// Workflow description (JSON)
        workflow: PathBuf,
    },
    /// List registered skill types
    Plugins,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("skillflow=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<SkillflowError>() {
                Some(err) => error!(code = err.code(), error = %format!("{e:#}"), "Workflow failed"),
                None => error!(error = %format!("{e:#}"), "Command failed"),
            }
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> anyhow::Result<()> {
    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "skillflow", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;
    let registry = Arc::new(build_registry(&config));

    match cli.command {
        Commands::Run {
            workflow,
            context,
            max_steps,
            strict,
            summary,
        } => {
            let mut engine = config.engine.clone();
            if max_steps.is_some() {
                engine.max_steps = max_steps;
            }
            engine.strict_outputs |= strict;

            let workflow = Arc::new(load_workflow(&workflow)?);
            let initial = match context {
                Some(arg) => parse_context(&arg)?,
                None => ExecutionContext::new(),
            };

            let mut executor = GraphExecutor::new(workflow, registry, engine)?;
            let policy = RecoveryPolicy::from_config(&config.recovery);
            let (result, context) = policy.run(&mut executor, &initial)?;

            let output = if summary {
                json!({ "run": result, "context": context })
            } else {
                serde_json::to_value(&context)?
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Validate { workflow } => {
            let mut engine = config.engine.clone();
            engine.eager_resolution = true;

            let workflow = Arc::new(load_workflow(&workflow)?);
            let executor = GraphExecutor::new(workflow, registry, engine)?;
            let workflow = executor.workflow();
            println!(
                "{}: valid ({} nodes, entry {})",
                workflow.workflow_id(),
                workflow.len(),
                workflow.entry()
            );
        }
        Commands::Plugins => {
            for name in registry.list() {
                println!("{}", name);
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Load the config file, falling back to `~/.skillflow/config.toml`, then defaults.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }

    if let Some(home_config) = dirs_home().map(|h| h.join(".skillflow").join("config.toml")) {
        if home_config.exists() {
            info!(path = %home_config.display(), "Loading config from home directory");
            return Ok(AppConfig::load(&home_config)?);
        }
    }

    Ok(AppConfig::default())
}

fn build_registry(config: &AppConfig) -> SkillRegistry {
    let mut registry = if config.plugins.builtins {
        SkillRegistry::with_builtins()
    } else {
        SkillRegistry::new()
    };

    for dir in config.plugin_dirs() {
        let count = skillflow_skills::load_and_register_plugins(&dir, &mut registry);
        if count > 0 {
            info!(count, path = %dir.display(), "Loaded plugins");
        }
    }

    registry
}

fn load_workflow(path: &Path) -> anyhow::Result<Workflow> {
    Workflow::load(path).with_context(|| format!("loading workflow {}", path.display()))
}

fn parse_context(arg: &str) -> anyhow::Result<ExecutionContext> {
    let json = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading context file {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&json).context("initial context must be a JSON object")
}
