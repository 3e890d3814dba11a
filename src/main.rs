//! Repomine CLI - crawl repositories and mine them with an external analyzer

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use repomine::config::{self, CrawlerConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "repomine")]
#[command(version)]
#[command(about = "Discover popular repositories and mine them with a static analyzer")]
#[command(long_about = r#"
Repomine walks the repository search API in star windows, queues every
repository it finds in SQLite, then clones each one, runs the analyzer over
it and records the findings. Both phases can be interrupted and resumed.

Example usage:
  repomine init
  GITHUB_API_KEY=... repomine discover
  repomine mine
  repomine stats
"#)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides config and DB_PATH)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Find repositories and add them to the queue
    Discover,

    /// Analyze every queued repository that has not been mined
    Mine,

    /// Discover, then mine
    Crawl,

    /// Show queue and result counts
    Stats,

    /// Re-queue repositories whose clone or analysis failed
    ResetFailed,

    /// Run the analyzer on a local directory and print its findings
    Analyze {
        /// Directory to analyze
        path: PathBuf,
    },
}

fn load(cli: &Cli) -> anyhow::Result<CrawlerConfig> {
    let mut config = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    config.apply_env(|name| std::env::var(name).ok())?;
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        let path = cli.config.clone().unwrap_or_else(config::default_config_path);
        return commands::run_init(&path, force);
    }

    let config = load(&cli)?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Discover => commands::run_discover(&config),
        Commands::Mine => commands::run_mine(&config),
        Commands::Crawl => {
            commands::run_discover(&config)?;
            commands::run_mine(&config)
        }
        Commands::Stats => commands::run_stats(&config),
        Commands::ResetFailed => commands::run_reset_failed(&config),
        Commands::Analyze { path } => commands::run_analyze(&config, &path),
    }
}
