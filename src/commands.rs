use std::path::Path;
use std::time::Instant;
use repomine::config::{self, CrawlerConfig};
use repomine::intern::parse_report;
use repomine::miner::Analyzer;
use repomine::ui::{self, Icons, MiningProgress, Spinner};
use repomine::{Discovery, GitHubSearch, Miner, SqliteStore};

fn open_store(config: &CrawlerConfig) -> anyhow::Result<SqliteStore> {
    config::ensure_db_dir(&config.database)?;
    Ok(SqliteStore::open(&config.database)?)
}

pub fn run_init(path: &Path, force: bool) -> anyhow::Result<()> {
    config::write_config(path, &CrawlerConfig::default(), force)?;
    ui::success(&format!("Wrote {}", path.display()));
    ui::info("Next", "set GITHUB_API_KEY and run `repomine discover`");
    Ok(())
}

pub fn run_discover(config: &CrawlerConfig) -> anyhow::Result<()> {
    config.validate_for_discovery()?;
    let mut store = open_store(config)?;
    let backend = GitHubSearch::new(&config.search.api_url, &config.search.token)?;
    let options = config.discovery_options();

    ui::header(&format!(
        "Discovering {} repositories with at least {} stars",
        options.language, options.min_stars
    ));
    ui::info("Database", &config.database.display().to_string());

    let started = Instant::now();
    let spinner = Spinner::new("Searching");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(async {
        let mut discovery = Discovery::new(backend, &mut store, options);
        discovery.run().await
    });
    spinner.finish();

    let summary = summary?;
    ui::discovery_summary(&summary, started.elapsed());
    Ok(())
}

pub fn run_mine(config: &CrawlerConfig) -> anyhow::Result<()> {
    let analyzer = config.analyzer();
    let tool = analyzer.locate()?;
    tracing::info!("Using analyzer at {}", tool.display());

    let cloner = config.cloner();
    cloner.verify()?;

    let mut store = open_store(config)?;
    ui::header("Mining queued repositories");
    ui::info("Analyzer", &tool.display().to_string());
    ui::info("Working copies", &config.miner.work_dir.display().to_string());

    let started = Instant::now();
    let progress = MiningProgress::new();
    let mut miner = Miner::new(&mut store, cloner, analyzer)
        .remove_after_mining(config.miner.remove_after_mining)
        .with_progress(progress);
    let summary = miner.run()?;

    ui::mining_summary(&summary, started.elapsed());
    Ok(())
}

pub fn run_stats(config: &CrawlerConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let stats = store.stats()?;

    ui::section(Icons::STATS, &format!("Database: {}", config.database.display()));
    println!("{}", ui::stats_table(&stats.rows()));
    Ok(())
}

pub fn run_reset_failed(config: &CrawlerConfig) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let reset = store.reset_failed()?;
    if reset == 0 {
        ui::info("Reset", "no failed repositories");
    } else {
        ui::success(&format!("Re-queued {} failed repositories", reset));
    }
    Ok(())
}

pub fn run_analyze(config: &CrawlerConfig, path: &Path) -> anyhow::Result<()> {
    if !path.is_dir() {
        anyhow::bail!("{} is not a directory", path.display());
    }
    let analyzer = config.analyzer();
    analyzer.locate()?;

    ui::header(&format!("Analyzing {}", path.display()));
    let spinner = Spinner::new("Running analyzer");
    let run = analyzer.run_analyzer(path, "local");
    spinner.finish();
    let run = run?;

    let findings = parse_report(&run.report);
    if findings.is_empty() {
        ui::info("Findings", "none");
    } else {
        println!("{}", ui::findings_table(&findings));
    }

    ui::section(Icons::MATCH, "Summary");
    ui::summary_row("Findings", findings.len());
    ui::summary_row("Successful", run.summary.successful);
    ui::summary_row("Errors", run.summary.errors);
    ui::timing(run.elapsed);
    if run.exit_code != Some(0) {
        ui::warn(&format!("Analyzer exited with {:?}", run.exit_code));
    }
    Ok(())
}
