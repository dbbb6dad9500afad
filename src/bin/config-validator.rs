//! # Agents Configuration Validator
//!
//! Command-line tool for validating the layered configuration of an environment
//! before starting coordinators or workers.

use agents_core::config::{AgentsConfig, ConfigManager};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate agents-core configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate every configuration section
    All,

    /// Print the effective configuration as JSON, with secrets masked
    Show,

    /// Check that the configured database accepts connections
    Database {
        /// Apply the embedded schema migrations once connected
        #[arg(long)]
        migrate: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::All) | None => validate_all(&cli),
        Some(Commands::Show) => show(&cli),
        Some(Commands::Database { migrate }) => check_database(&cli, *migrate).await,
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> Result<AgentsConfig> {
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
        .with_context(|| format!("loading configuration for '{}'", cli.environment))?;
    Ok(manager.config().clone())
}

fn validate_all(cli: &Cli) -> Result<()> {
    println!("🔧 Validating Agents Configuration");
    println!("Environment: {}", cli.environment);
    if let Some(config_dir) = &cli.config_dir {
        println!("Config Directory: {}", config_dir.display());
    }
    println!();

    let config = load(cli)?;
    println!("✅ Configuration loaded and validated");

    println!("🗄️  Database");
    println!("   ✅ URL: {}", config.sanitized_database_url());
    println!(
        "   ✅ Pool: min {}, max {}, acquire timeout {}s",
        config.database.min_connections,
        config.database.max_connections,
        config.database.acquire_timeout_seconds
    );

    println!("🎼 Workflow runtime");
    println!("   ✅ Endpoint: {}", config.workflow.endpoint);
    println!("   ✅ Namespace: {}", config.workflow.namespace);
    println!("   ✅ Task queue: {}", config.workflow.task_queue);

    println!("📋 Execution");
    println!(
        "   ✅ Cancel append attempts: {}",
        config.execution.cancel_append_attempts
    );
    println!(
        "   ✅ Event channel capacity: {}",
        config.execution.event_channel_capacity
    );

    println!("📊 Logging");
    println!(
        "   ✅ Level: {}",
        config.logging.level.as_deref().unwrap_or("(environment default)")
    );
    println!("   ✅ JSON output: {}", config.logging.json);

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

fn show(cli: &Cli) -> Result<()> {
    let mut config = load(cli)?;
    config.database.url = config.sanitized_database_url();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn check_database(cli: &Cli, migrate: bool) -> Result<()> {
    let config = load(cli)?;
    println!("🗄️  Connecting to {}", config.sanitized_database_url());

    let connection = agents_core::DatabaseConnection::connect(&config.database)
        .await
        .context("connecting to database")?;
    let healthy = connection.health_check().await.context("running health check")?;
    anyhow::ensure!(healthy, "database health check returned an unexpected result");
    println!("   ✅ Database reachable");

    if migrate {
        agents_core::PgStore::new(connection.pool().clone())
            .migrate()
            .await
            .context("applying migrations")?;
        println!("   ✅ Migrations applied");
    }

    connection.close().await;
    Ok(())
}
