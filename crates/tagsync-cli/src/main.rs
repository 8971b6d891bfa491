use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tagsync_catalog::{AlationClient, AltrClient, HttpClient, SnowflakeTagger, SnowflakeTaggerBuilder};
use tagsync_core::{Config, Severity, SyncReport};
use tagsync_engine::{SyncOptions, SyncPipeline};

const DEFAULT_CONFIG: &str = "tagsync.toml";

/// tagsync - Sync catalog governance tags to the warehouse and protection service
#[derive(Parser)]
#[command(name = "tagsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: tagsync.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full sync
    Sync {
        /// Output file for the JSON report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compute the plan without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Check credentials and permissions against every service
    Check,

    /// Show what a sync would do
    Plan {
        /// Output file for the JSON report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a default config file
    InitConfig {
        /// Where to write the config
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::InitConfig { path, force } = &cli.command {
        return init_config_command(path, *force);
    }

    // Secrets usually live in .env next to the job
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Sync { output, dry_run } => sync_command(&config, output.as_deref(), dry_run).await,
        Commands::Check => check_command(&config).await,
        Commands::Plan { output } => sync_command(&config, output.as_deref(), true).await,
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// File settings, then environment overrides, then validation
fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let mut config = if let Some(path) = path {
        Config::from_file(path)?
    } else if Path::new(DEFAULT_CONFIG).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults and environment".yellow());
        }
        Config::default()
    };

    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

struct Services {
    catalog: AlationClient,
    protection: AltrClient,
    warehouse: SnowflakeTagger,
}

fn connect(config: &Config) -> Result<Services> {
    let http = HttpClient::new(&config.http)?;
    let catalog = AlationClient::from_config(http.clone(), config);
    let protection = AltrClient::from_config(http, config)?;
    let warehouse = SnowflakeTaggerBuilder::from_config(config)
        .build()
        .context("Failed to connect to the warehouse")?;

    Ok(Services {
        catalog,
        protection,
        warehouse,
    })
}

/// Sync command - run the pipeline, or plan it with `dry_run`
async fn sync_command(config: &Config, output: Option<&Path>, dry_run: bool) -> Result<()> {
    let services = connect(config)?;
    let options = SyncOptions::from_config(config, dry_run);

    if dry_run {
        eprintln!("{}", "Dry run: nothing will be changed".cyan());
    }

    let pipeline = SyncPipeline::new(
        &services.catalog,
        &services.protection,
        &services.warehouse,
        options,
    );
    let report = pipeline.run().await?;

    if let Some(path) = output {
        report.save_to_file(path)?;
        eprintln!("{} {}", "Report saved to:".green(), path.display());
    }

    print_report_summary(&report);
    if dry_run {
        print_plan(&report);
    }

    Ok(())
}

/// Check command - permission probes only
async fn check_command(config: &Config) -> Result<()> {
    let services = connect(config)?;
    let pipeline = SyncPipeline::new(
        &services.catalog,
        &services.protection,
        &services.warehouse,
        SyncOptions::from_config(config, true),
    );

    pipeline.check_access(true).await?;
    println!("{}", "✓ Catalog, protection service and warehouse are reachable".green().bold());
    Ok(())
}

/// Init config command - write the default settings
fn init_config_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::default().save_to_file(path)?;
    println!("{} {}", "Wrote".green(), path.display());
    println!("Credentials are read from the environment (ALATION_API_ACCESS_TOKEN, ALTR_KEY_NAME, ...)");
    Ok(())
}

/// Print report summary to stdout
fn print_report_summary(report: &SyncReport) {
    let title = if report.dry_run { "Tag Sync Plan" } else { "Tag Sync Report" };

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", title.bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    let summary = &report.summary;
    println!("{}", "Summary:".bold());
    println!("  Tagged columns:        {}", summary.tagged_columns);
    println!("  Warehouse tags set:    {}", summary.warehouse_tags_applied);
    println!("  Stale tags removed:    {}", summary.stale_tags_removed);
    println!("  Databases created:     {}", summary.databases_created);
    println!("  Databases updated:     {}", summary.databases_updated);
    println!("  Governance requests:   {}", summary.governance_requests);
    println!("  Governed:              {}", format!("{}", summary.governed).green());

    if summary.conflicts > 0 {
        println!("  Already governed:      {}", format!("{}", summary.conflicts).yellow());
    } else {
        println!("  Already governed:      {}", summary.conflicts);
    }
    println!();

    if !report.new_databases.is_empty() {
        let verb = if report.dry_run { "Would register" } else { "Registered" };
        println!("{} {}", verb.bold(), report.new_databases.join(", "));
        println!();
    }

    let warnings = report.count_at_least(Severity::Warn);
    if report.diagnostics.is_empty() {
        println!("{}", "✓ No issues found!".green().bold());
    } else {
        println!(
            "{} ({} warnings)",
            "Diagnostics:".bold(),
            format!("{}", warnings).yellow()
        );
        for diag in &report.diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warn => "WARN".yellow().bold(),
                Severity::Info => "INFO".cyan(),
            };

            match &diag.subject {
                Some(subject) => println!("  [{}] {}: {} ({})", severity_str, diag.code, diag.message, subject),
                None => println!("  [{}] {}: {}", severity_str, diag.code, diag.message),
            }
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

/// Print the governance requests and updates a sync would send
fn print_plan(report: &SyncReport) {
    println!("{}", "Governance requests:".bold());
    if report.governance_requests.is_empty() {
        println!("  (none)");
    }
    for request in &report.governance_requests {
        println!(
            "  {} {}.{}",
            format!("[db {}]", request.database_id).cyan(),
            request.table_name,
            request.column_name
        );
    }
    println!();

    println!("{}", "Database updates:".bold());
    if report.updated_databases.is_empty() {
        println!("  (none)");
    }
    for database in &report.updated_databases {
        println!("  {} {}", format!("[db {}]", database.id).cyan(), database.name);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::parse_from(["tagsync", "--verbose", "sync", "--dry-run", "-o", "out.json"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Sync { output, dry_run } => {
                assert!(dry_run);
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn init_config_defaults_path() {
        let cli = Cli::parse_from(["tagsync", "init-config"]);
        match cli.command {
            Commands::InitConfig { path, force } => {
                assert_eq!(path, PathBuf::from(DEFAULT_CONFIG));
                assert!(!force);
            }
            _ => panic!("expected init-config"),
        }
    }
}
