use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use modelgraph_core::{ConfigManager, HandlerKind, LoggingConfig, ModelGraphConfig, Snapshot};
use modelgraph_graph::CommandProcessor;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, Registry};

#[derive(Parser)]
#[command(name = "modelgraph")]
#[command(about = "ModelGraph CLI - Inspect and edit declarative state modules", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Explicit configuration file
    #[arg(long, global = true, env = "MODELGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a named command such as `models.addReducer`
    Exec {
        /// Command name, with or without the `models.` prefix
        command: String,

        /// Payload as inline JSON
        #[arg(short, long, conflicts_with = "payload_file")]
        payload: Option<String>,

        /// Read the payload from a JSON file
        #[arg(long)]
        payload_file: Option<PathBuf>,

        /// Scan root used when the payload has no `sourcePath`
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Print the snapshot of a scan root without editing anything
    Snapshot {
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// Write a default configuration file
    InitConfig {
        #[arg(short, long, default_value = ".modelgraph.toml")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    if let Commands::InitConfig { path } = &cli.command {
        ConfigManager::create_default_config(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} {}", "Wrote default configuration to".green(), path.display());
        return Ok(());
    }

    let manager = match &cli.config {
        Some(path) => ConfigManager::from_path(path),
        None => ConfigManager::load(),
    }
    .context("Failed to load configuration")?;
    let config = manager.config().clone();
    init_logging(&config.logging, cli.verbose)?;
    if let Some(path) = manager.config_path() {
        debug!("Using configuration from {}", path.display());
    }

    let snapshot = match &cli.command {
        Commands::Exec {
            command,
            payload,
            payload_file,
            root,
        } => {
            let payload = read_payload(payload.as_deref(), payload_file.as_deref(), root.as_deref())?;
            execute(config, command, &payload)?
        }
        Commands::Snapshot { root } => {
            let payload = serde_json::json!({ "sourcePath": root.to_string_lossy() });
            execute(config, "load", &payload)?
        }
        Commands::InitConfig { .. } => return Ok(()),
    };

    print_output(&cli.output, &snapshot)
}

fn execute(config: ModelGraphConfig, command: &str, payload: &Value) -> Result<Snapshot> {
    CommandProcessor::new(config)
        .execute(command, payload)
        .with_context(|| format!("Command '{}' failed", command))
}

fn read_payload(inline: Option<&str>, file: Option<&Path>, root: Option<&Path>) -> Result<Value> {
    let raw = match (inline, file) {
        (Some(inline), _) => inline.to_string(),
        (None, Some(file)) => std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read payload file {}", file.display()))?,
        (None, None) => "{}".to_string(),
    };
    let mut payload: Value = serde_json::from_str(&raw).context("Payload is not valid JSON")?;

    let Some(fields) = payload.as_object_mut() else {
        bail!("Payload must be a JSON object");
    };
    if !fields.contains_key("sourcePath") {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => std::env::current_dir().context("Failed to resolve the current directory")?,
        };
        fields.insert(
            "sourcePath".to_string(),
            Value::String(root.to_string_lossy().into_owned()),
        );
    }
    Ok(payload)
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log filter")?;

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let result = match logging.format.as_str() {
        "json" => tracing::subscriber::set_global_default(
            Registry::default().with(env_filter).with(fmt_layer.json()),
        ),
        "compact" => tracing::subscriber::set_global_default(
            Registry::default().with(env_filter).with(fmt_layer.compact()),
        ),
        _ => tracing::subscriber::set_global_default(
            Registry::default().with(env_filter).with(fmt_layer.pretty()),
        ),
    };
    if let Err(err) = result {
        // Reported through whichever subscriber is already installed.
        debug!("Keeping the existing tracing subscriber: {}", err);
    }
    Ok(())
}

fn print_output(format: &OutputFormat, snapshot: &Snapshot) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(snapshot)?);
        }
        OutputFormat::Pretty => print_pretty(snapshot),
    }
    Ok(())
}

fn print_pretty(snapshot: &Snapshot) {
    println!("{}", "Models".cyan().bold());
    if snapshot.models.data.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for module in &snapshot.models.data {
        println!(
            "  {} {}",
            module.namespace.green().bold(),
            module.file_path.dimmed()
        );
        println!("    {}: {}", "state".cyan(), module.state);
        for kind in HandlerKind::ALL {
            let names: Vec<&str> = module
                .handler_ids(kind)
                .iter()
                .map(|id| id.local_name.as_str())
                .collect();
            if !names.is_empty() {
                println!("    {}: {}", kind.collection_key().cyan(), names.join(", "));
            }
        }
    }

    println!("\n{}", "Dispatches".cyan().bold());
    if snapshot.dispatches.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (action, entry) in &snapshot.dispatches {
        let inputs: Vec<String> = entry.input.iter().map(|id| id.local_name.clone()).collect();
        let outputs: Vec<String> = entry.output.iter().map(|id| id.to_string()).collect();
        println!("  {}", action.yellow());
        if !inputs.is_empty() {
            println!("    {} {}", "from".dimmed(), inputs.join(", "));
        }
        println!("    {} {}", "to".dimmed(), outputs.join(", "));
    }

    if let Some(router) = &snapshot.router {
        println!("\n{} {}", "Router".cyan().bold(), router.file_path.dimmed());
        for component in &snapshot.route_components {
            println!(
                "  {} {}",
                component.component_name.green(),
                component.file_path.dimmed()
            );
        }
    }
}
