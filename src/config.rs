use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::discovery::DiscoveryOptions;
use crate::miner::{ExternalAnalyzer, GitCloner};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrawlerConfig {
    pub database: PathBuf,
    pub search: SearchConfig,
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub api_url: String,
    pub token: String,
    pub language: String,
    pub min_stars: i64,
    pub max_repos: usize,
    pub per_page: usize,
    pub window_pause_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MinerConfig {
    pub tool: PathBuf,
    pub toolchain: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub threads: Option<usize>,
    pub work_dir: PathBuf,
    pub clone_depth: u32,
    pub remove_after_mining: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            search: SearchConfig::default(),
            miner: MinerConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        let options = DiscoveryOptions::default();
        Self {
            api_url: "https://api.github.com".to_string(),
            token: String::new(),
            language: options.language,
            min_stars: options.min_stars,
            max_repos: options.max_repos,
            per_page: options.per_page,
            window_pause_secs: options.window_pause.as_secs(),
            max_retries: options.max_retries,
        }
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            tool: PathBuf::from("miner"),
            toolchain: None,
            log_dir: None,
            threads: None,
            work_dir: PathBuf::from("/tmp/crawler-repos"),
            clone_depth: 1,
            remove_after_mining: false,
        }
    }
}

impl CrawlerConfig {
    /// Apply `GITHUB_API_KEY`, `CLANG`, `LOG_DIR`, `DB_PATH` and `N_THREADS`.
    ///
    /// Unset and empty variables leave the file value alone.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = var("GITHUB_API_KEY") {
            self.search.token = token;
        }
        if let Some(clang) = var("CLANG") {
            self.miner.toolchain = Some(PathBuf::from(clang));
        }
        if let Some(log_dir) = var("LOG_DIR") {
            self.miner.log_dir = Some(PathBuf::from(log_dir));
        }
        if let Some(db) = var("DB_PATH") {
            self.database = PathBuf::from(db);
        }
        if let Some(threads) = var("N_THREADS") {
            let threads = threads
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("N_THREADS must be a positive integer, got '{}'", threads))?;
            self.miner.threads = Some(threads);
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.search.language.trim().is_empty() {
            anyhow::bail!("search.language must not be empty");
        }
        if !(1..=100).contains(&self.search.per_page) {
            anyhow::bail!("search.per_page must be between 1 and 100, got {}", self.search.per_page);
        }
        if self.search.max_repos == 0 {
            anyhow::bail!("search.max_repos must be greater than 0");
        }
        if self.miner.clone_depth == 0 {
            anyhow::bail!("miner.clone_depth must be greater than 0");
        }
        if self.miner.threads == Some(0) {
            anyhow::bail!("miner.threads must be greater than 0");
        }
        Ok(())
    }

    /// Discovery cannot run unauthenticated
    pub fn validate_for_discovery(&self) -> anyhow::Result<()> {
        self.validate()?;
        if self.search.token.trim().is_empty() {
            anyhow::bail!("no API token: set search.token or GITHUB_API_KEY");
        }
        Ok(())
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            language: self.search.language.clone(),
            min_stars: self.search.min_stars,
            max_repos: self.search.max_repos,
            per_page: self.search.per_page,
            window_pause: Duration::from_secs(self.search.window_pause_secs),
            max_retries: self.search.max_retries,
        }
    }

    pub fn analyzer(&self) -> ExternalAnalyzer {
        ExternalAnalyzer::new(&self.miner.tool)
            .with_toolchain(self.miner.toolchain.clone())
            .with_log_dir(self.miner.log_dir.clone())
            .with_threads(self.miner.threads)
    }

    pub fn cloner(&self) -> GitCloner {
        GitCloner::new(&self.miner.work_dir, self.miner.clone_depth)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("repomine.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from("repomine.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<CrawlerConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: CrawlerConfig = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &CrawlerConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CrawlerConfig::default();
        assert_eq!(config.database, PathBuf::from("repomine.db"));
        assert_eq!(config.search.language, "c");
        assert_eq!(config.search.min_stars, 500);
        assert_eq!(config.search.max_repos, 40_000);
        assert_eq!(config.search.per_page, 100);
        assert_eq!(config.search.window_pause_secs, 5);
        assert_eq!(config.miner.work_dir, PathBuf::from("/tmp/crawler-repos"));
        assert_eq!(config.miner.clone_depth, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: CrawlerConfig = toml::from_str(
            r#"
            database = "data/crawl.db"

            [search]
            language = "rust"
            min_stars = 1000

            [miner]
            tool = "/opt/miner/bin/miner"
            threads = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.database, PathBuf::from("data/crawl.db"));
        assert_eq!(config.search.language, "rust");
        assert_eq!(config.search.min_stars, 1000);
        assert_eq!(config.search.per_page, 100);
        assert_eq!(config.miner.tool, PathBuf::from("/opt/miner/bin/miner"));
        assert_eq!(config.miner.threads, Some(16));
        assert_eq!(config.miner.toolchain, None);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CrawlerConfig::default();
        config
            .apply_env(env(&[
                ("GITHUB_API_KEY", "ghp_secret"),
                ("CLANG", "/usr/lib/llvm/bin/clang"),
                ("LOG_DIR", "/var/log/mine"),
                ("DB_PATH", "/data/crawl.db"),
                ("N_THREADS", "12"),
            ]))
            .unwrap();

        assert_eq!(config.search.token, "ghp_secret");
        assert_eq!(config.miner.toolchain, Some(PathBuf::from("/usr/lib/llvm/bin/clang")));
        assert_eq!(config.miner.log_dir, Some(PathBuf::from("/var/log/mine")));
        assert_eq!(config.database, PathBuf::from("/data/crawl.db"));
        assert_eq!(config.miner.threads, Some(12));
    }

    #[test]
    fn test_empty_env_is_ignored() {
        let mut config = CrawlerConfig::default();
        config.search.token = "from-file".to_string();
        config.apply_env(env(&[("GITHUB_API_KEY", ""), ("N_THREADS", " ")])).unwrap();
        assert_eq!(config.search.token, "from-file");
        assert_eq!(config.miner.threads, None);
    }

    #[test]
    fn test_bad_thread_count() {
        let mut config = CrawlerConfig::default();
        assert!(config.apply_env(env(&[("N_THREADS", "many")])).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = CrawlerConfig::default();
        config.search.per_page = 101;
        assert!(config.validate().is_err());

        let mut config = CrawlerConfig::default();
        config.search.language = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = CrawlerConfig::default();
        config.search.max_repos = 0;
        assert!(config.validate().is_err());

        let mut config = CrawlerConfig::default();
        config.miner.clone_depth = 0;
        assert!(config.validate().is_err());

        let mut config = CrawlerConfig::default();
        config.miner.threads = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discovery_requires_token() {
        let mut config = CrawlerConfig::default();
        assert!(config.validate_for_discovery().is_err());
        config.search.token = "t".to_string();
        assert!(config.validate_for_discovery().is_ok());
    }

    #[test]
    fn test_discovery_options() {
        let mut config = CrawlerConfig::default();
        config.search.window_pause_secs = 2;
        config.search.max_repos = 10;
        let options = config.discovery_options();
        assert_eq!(options.window_pause, Duration::from_secs(2));
        assert_eq!(options.max_repos, 10);
        assert_eq!(options.language, "c");
    }

    #[test]
    fn test_write_and_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repomine.toml");

        assert!(load_config(Some(&path)).unwrap().is_none());

        let mut config = CrawlerConfig::default();
        config.miner.threads = Some(4);
        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repomine.toml");
        std::fs::write(&path, "[search]\nper_page = \"lots\"\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_ensure_db_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested/deeper/repomine.db");
        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().is_dir());
        ensure_db_dir(Path::new("repomine.db")).unwrap();
    }
}
