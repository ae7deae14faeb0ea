//! Energy Dashboard
//!
//! CLI commands:
//! - serve: Start the dashboard HTTP server
//! - controls: Print the control registry
//! - render: Run the chart pipeline once and print the result

mod chart;
mod config;
mod controls;
mod dataset;
mod logging;
mod pipeline;
mod server;
mod state;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "energy_dashboard")]
#[command(about = "Interactive dashboard of historical energy production")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to dashboard.yaml config
    #[arg(short, long, default_value = "dashboard.yaml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on (defaults to DASHBOARD_PORT or 8050)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the control registry as JSON
    Controls,

    /// Render one snapshot and print the charts as JSON
    Render {
        /// JSON file holding a control snapshot; defaults are used when omitted
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = config::Env::load();

    let _log_guard = logging::init_logging(&env.log_dir)
        .with_context(|| format!("Failed to start logging in {}", env.log_dir))?;
    tracing::info!("Energy Dashboard starting up");

    let cli = Cli::parse();
    tracing::debug!("CLI args parsed: config={:?}", cli.config);

    let config = load_config(&cli.config)?.with_env(&env);
    tracing::info!("Config loaded: dataset={:?}, {} sectors", config.dataset, config.sectors.len());

    let dataset = dataset::Dataset::load(&config)
        .with_context(|| format!("Cannot start without dataset {:?}", config.dataset))?;

    match cli.command {
        Commands::Serve { port } => {
            let state = state::AppState::new(config, dataset);
            server::serve(state, port.unwrap_or(env.port)).await?;
        }

        Commands::Controls => {
            let registry = controls::ControlRegistry::from_dataset(&dataset, &config);
            println!("{}", serde_json::to_string_pretty(&registry)?);
        }

        Commands::Render { snapshot } => {
            let snapshot = match snapshot {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read snapshot {:?}", path))?;
                    serde_json::from_str(&content)?
                }
                None => controls::ControlRegistry::from_dataset(&dataset, &config).default_snapshot(),
            };
            let render = pipeline::render(&dataset, &snapshot)?;
            for warning in &render.warnings {
                tracing::warn!("{}", warning);
            }
            println!("{}", serde_json::to_string_pretty(&render)?);
        }
    }

    Ok(())
}

/// Config file when present, built-in defaults otherwise
fn load_config(path: &Path) -> anyhow::Result<config::Config> {
    if path.exists() {
        tracing::info!("Loading config from {:?}", path);
        Ok(config::Config::load(path)?)
    } else {
        tracing::warn!("Config file not found: {:?}, using defaults", path);
        Ok(config::Config::default())
    }
}
