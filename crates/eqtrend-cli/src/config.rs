//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `$EQTREND_CONFIG` environment variable
//! 2. `~/.config/eqtrend/config.toml`
//! 3. Built-in defaults (everything is optional)

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub sparql: SparqlConfig,
    pub wikipedia: WikipediaConfig,
    pub latexml: LatexmlConfig,
    pub analysis: AnalysisConfig,
    pub plot: PlotConfig,
}

/// Database storage settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path. Default: platform-specific data dir.
    pub path: Option<String>,
}

/// Wikidata query service.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SparqlConfig {
    pub endpoint: String,
    /// The query service rejects requests without a descriptive agent.
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WikipediaConfig {
    pub base_url: String,
    /// List pages crawled by `eqtrend scrape` when no `--url` is given.
    pub list_pages: Vec<String>,
    /// Downloaded pages. Default: platform cache dir.
    pub cache_dir: Option<String>,
    /// Articles followed per list page.
    pub max_pages: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LatexmlConfig {
    pub command: String,
    pub timeout_secs: u64,
    /// Formulas per tool run.
    pub batch_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Period boundaries in centuries.
    pub period_breaks: Vec<f64>,
    /// The per-period complexity histogram keeps values below this.
    pub outlier_cutoff: f64,
    pub top_places: usize,
    pub metric: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub output_dir: String,
    pub width: u32,
    pub height: u32,
}

// --- Defaults ---

impl Default for SparqlConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://query.wikidata.org/bigdata/namespace/wdq/sparql".into(),
            user_agent: concat!("eqtrend/", env!("CARGO_PKG_VERSION")).into(),
            timeout_secs: 60,
        }
    }
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://en.wikipedia.org".into(),
            list_pages: vec![
                "https://en.wikipedia.org/wiki/List_of_equations".into(),
                "https://en.wikipedia.org/wiki/List_of_scientific_equations_named_after_people"
                    .into(),
            ],
            cache_dir: None,
            max_pages: 500,
            timeout_secs: 30,
        }
    }
}

impl Default for LatexmlConfig {
    fn default() -> Self {
        Self {
            command: "latexml".into(),
            timeout_secs: 600,
            batch_size: 200,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            period_breaks: vec![15.0, 18.0],
            outlier_cutoff: 100.0,
            top_places: 10,
            metric: "ops".into(),
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            output_dir: "plots".into(),
            width: 1024,
            height: 768,
        }
    }
}

/// Load config from disk. Returns defaults if no config file exists.
pub fn load_config() -> Result<Config> {
    let path = config_path();

    if let Some(p) = &path {
        if p.exists() {
            let content =
                std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            let config: Config =
                toml::from_str(&content).with_context(|| format!("parsing {}", p.display()))?;
            return Ok(config);
        }
    }

    Ok(Config::default())
}

/// Resolve the config file path.
fn config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("EQTREND_CONFIG") {
        return Some(PathBuf::from(p));
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join("eqtrend").join("config.toml"))
}

/// Show the active config path (for `eqtrend config`).
pub fn show_config_path() -> String {
    match config_path() {
        Some(p) if p.exists() => format!("{} (loaded)", p.display()),
        Some(p) => format!("{} (not found, using defaults)", p.display()),
        None => "no config path resolved (using defaults)".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.period_breaks, vec![15.0, 18.0]);
        assert_eq!(config.analysis.outlier_cutoff, 100.0);
        assert_eq!(config.wikipedia.list_pages.len(), 2);
        assert_eq!(config.latexml.command, "latexml");
        assert!(config.sparql.user_agent.starts_with("eqtrend/"));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[analysis]
metric = "depth"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.analysis.metric, "depth");
        // Other fields should be defaults
        assert_eq!(config.analysis.top_places, 10);
        assert_eq!(config.plot.width, 1024);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[store]
path = "/tmp/test.db"

[sparql]
endpoint = "http://localhost:9999/sparql"
user_agent = "tester/1.0"
timeout_secs = 5

[wikipedia]
base_url = "http://localhost:8080"
list_pages = ["http://localhost:8080/wiki/List"]
cache_dir = "/tmp/pages"
max_pages = 3
timeout_secs = 2

[latexml]
command = "/opt/latexml/bin/latexml"
timeout_secs = 30
batch_size = 10

[analysis]
period_breaks = [10.0, 16.0, 19.0]
outlier_cutoff = 50.0
top_places = 5
metric = "nodes"

[plot]
output_dir = "/tmp/plots"
width = 800
height = 600
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.path.as_deref(), Some("/tmp/test.db"));
        assert_eq!(config.sparql.timeout_secs, 5);
        assert_eq!(config.wikipedia.cache_dir.as_deref(), Some("/tmp/pages"));
        assert_eq!(config.wikipedia.max_pages, 3);
        assert_eq!(config.latexml.batch_size, 10);
        assert_eq!(config.analysis.period_breaks.len(), 3);
        assert_eq!(config.plot.height, 600);
    }

    #[test]
    fn test_unknown_metric_is_kept_as_text() {
        let config: Config = toml::from_str("[analysis]\nmetric = \"weird\"").unwrap();
        assert!(config.analysis.metric.parse::<eqtrend_core::ScoreMetric>().is_err());
    }
}
