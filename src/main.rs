use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use incident_intel::config::{AppConfig, LogFormat, LoggingConfig};

#[derive(Parser)]
#[command(
    name = "incident-intel",
    about = "Incident intelligence API: simulated alerts, error trends and clusters",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Create an empty incident store if none exists
    InitStore,

    /// Run one alert simulation against the configured store and worker
    Simulate {
        /// Scenario: timeout, auth, throttle or mixed (random if omitted)
        #[arg(long)]
        scenario: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List recorded incidents, newest first
    Incidents,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    // Logs go to stderr so `--json` output stays machine readable.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Text of a stored record field, or `-` when absent or not a string.
fn field<'a>(record: &'a serde_json::Value, key: &str) -> &'a str {
    record.get(key).and_then(serde_json::Value::as_str).unwrap_or("-")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::resolve(cli.config.as_deref())?;

    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting incident-intel API");
            incident_intel::serve(config).await?;
        }
        Commands::InitStore => {
            let created = incident_intel::storage::init_backend(&config.storage)?;
            if created {
                println!("Created empty incident store at {}", config.storage.path.display());
            } else {
                println!("Incident store already exists at {}", config.storage.path.display());
            }
        }
        Commands::Simulate { scenario, json } => {
            let simulator = incident_intel::build_simulator(&config).await?;
            let summary = simulator.simulate(scenario.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\n=== Simulated Alert ===");
                println!("Incident: {}", summary.incident_id);
                println!("Scenario: {}", summary.scenario);
                println!("Engine:   {}", summary.engine);
                println!("Clusters: {}", summary.cluster_count);
                println!("=======================\n");
            }
        }
        Commands::Incidents => {
            let simulator = incident_intel::build_simulator(&config).await?;
            let store = simulator.store().snapshot().await?;
            if store.incidents.is_empty() {
                println!("No incidents recorded.");
            } else {
                println!(
                    "{:<10} | {:<16} | {:<5} | {:<6} | {:<9} | {:<9} | Created",
                    "Id", "Service", "Sev", "Status", "Scenario", "Engine"
                );
                println!("{:-<10}-|-{:-<16}-|-{:-<5}-|-{:-<6}-|-{:-<9}-|-{:-<9}-|-{:-<25}", "", "", "", "", "", "", "");
                for i in &store.incidents {
                    println!(
                        "{:<10} | {:<16} | {:<5} | {:<6} | {:<9} | {:<9} | {}",
                        field(i, "id"),
                        field(i, "service"),
                        field(i, "severity"),
                        field(i, "status"),
                        field(i, "scenario"),
                        field(i, "engine"),
                        field(i, "createdAt"),
                    );
                }
            }
        }
    }

    Ok(())
}
