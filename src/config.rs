//! Runtime configuration.
//!
//! [`Config`] is built once in `main` from the CLI plus an optional YAML
//! settings file and handed by reference to every component constructor.
//!
//! ```yaml
//! # settings.yaml (every key optional)
//! sections: [world, science]
//! max_articles: 40
//! freshness_minutes: 15
//! max_snapshots: 5
//! max_age_hours: 24
//! fetch_timeout_secs: 20
//! enrich_timeout_secs: 120
//! ```

use crate::cli::Cli;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_SECTIONS: [&str; 7] = [
    "world",
    "us",
    "politics",
    "sports",
    "movies",
    "science",
    "technology",
];

pub const DEFAULT_API_BASE_URL: &str = "https://api.nytimes.com/svc/topstories/v2/";

/// Tunables for the fetch → enrich → render pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Top Stories sections, queried in order.
    pub sections: Vec<String>,
    /// Cap on raw items considered per fetch, applied before filtering.
    pub max_articles: usize,
    /// Snapshots younger than this are not refetched.
    pub freshness_minutes: u64,
    /// Snapshots kept after culling.
    pub max_snapshots: usize,
    /// Snapshots older than this are always culled.
    pub max_age_hours: u64,
    pub fetch_timeout_secs: u64,
    pub enrich_timeout_secs: u64,
    pub api_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sections: DEFAULT_SECTIONS.iter().map(|s| s.to_string()).collect(),
            max_articles: 60,
            freshness_minutes: 30,
            max_snapshots: 5,
            max_age_hours: 24,
            fetch_timeout_secs: 20,
            enrich_timeout_secs: 120,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_minutes * 60)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours * 3600)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn enrich_timeout(&self) -> Duration {
        Duration::from_secs(self.enrich_timeout_secs)
    }
}

/// Everything the pipeline needs, resolved once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub snapshot_dir: PathBuf,
    pub output_path: PathBuf,
    /// LLM client config.yaml; `None` means the client's default config dir.
    pub llm_config_path: Option<PathBuf>,
    pub template_name: String,
    pub nyt_api_key: Option<String>,
    pub settings: Settings,
}

impl Config {
    #[instrument(level = "info", skip_all)]
    pub async fn from_cli(cli: &Cli) -> Result<Self, Box<dyn Error>> {
        let settings = match &cli.settings {
            Some(path) => {
                let yaml = tokio::fs::read_to_string(path).await?;
                let settings = Settings::from_yaml(&yaml)?;
                info!(%path, "Loaded pipeline settings");
                settings
            }
            None => Settings::default(),
        };

        Ok(Self {
            snapshot_dir: PathBuf::from(&cli.snapshot_dir),
            output_path: PathBuf::from(&cli.output),
            llm_config_path: cli.config.as_ref().map(PathBuf::from),
            template_name: cli.template.clone(),
            nyt_api_key: cli.nyt_api_key.clone(),
            settings,
        })
    }

    #[cfg(test)]
    pub fn for_tests(settings: Settings) -> Self {
        Self {
            snapshot_dir: PathBuf::from("snapshots"),
            output_path: PathBuf::from("index.html"),
            llm_config_path: None,
            template_name: "news_geolocator".to_string(),
            nyt_api_key: None,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = Settings::from_yaml("sections: [world]\nfreshness_minutes: 5\n").unwrap();
        assert_eq!(settings.sections, vec!["world"]);
        assert_eq!(settings.freshness(), Duration::from_secs(300));
        assert_eq!(settings.max_articles, 60);
        assert_eq!(settings.max_age(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_bad_yaml_is_an_error() {
        assert!(Settings::from_yaml("max_articles: many").is_err());
    }

    #[tokio::test]
    async fn test_from_cli_reads_settings_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.yaml");
        std::fs::write(&path, "max_snapshots: 2\nenrich_timeout_secs: 9\n").unwrap();

        let cli = Cli::parse_from([
            "news_globe",
            "-s",
            "/tmp/snaps",
            "--settings",
            path.to_str().unwrap(),
        ]);
        let config = Config::from_cli(&cli).await.unwrap();
        assert_eq!(config.snapshot_dir, PathBuf::from("/tmp/snaps"));
        assert_eq!(config.settings.max_snapshots, 2);
        assert_eq!(config.settings.enrich_timeout(), Duration::from_secs(9));
        assert_eq!(config.settings.sections.len(), DEFAULT_SECTIONS.len());
    }
}
