//! Application configuration for lexcrawl.
//!
//! User config lives at `~/.lexcrawl/lexcrawl.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LexcrawlError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lexcrawl.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lexcrawl";

// ---------------------------------------------------------------------------
// Config structs (matching lexcrawl.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Page loading.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Archive endpoints.
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// SQLite database file. `~` expands to the home directory.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Concurrent fetch-and-extract workers in the backlog sweep.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Default source limit of the backlog sweep.
    #[serde(default = "default_sweep_limit")]
    pub sweep_limit: u32,

    /// `LIKE` pattern restricting which sources the sweep picks up.
    #[serde(default = "default_source_filter")]
    pub source_url_filter: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            concurrency: default_concurrency(),
            sweep_limit: default_sweep_limit(),
            source_url_filter: default_source_filter(),
        }
    }
}

fn default_database_path() -> String {
    "~/.lexcrawl/lexcrawl.db".into()
}
fn default_concurrency() -> u32 {
    4
}
fn default_sweep_limit() -> u32 {
    100
}
fn default_source_filter() -> String {
    "%diariodarepublica.pt%".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per page-load timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum ms a worker waits before each request.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Optional headless-render service (`POST {endpoint}` with
    /// `{"url", "waitForSelector"}`), used instead of plain GETs when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_endpoint: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            rate_limit_ms: default_rate_limit(),
            user_agent: default_user_agent(),
            render_endpoint: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_rate_limit() -> u64 {
    250
}
fn default_user_agent() -> String {
    format!("lexcrawl/{}", env!("CARGO_PKG_VERSION"))
}

/// `[archive]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Origin used to resolve relative links.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Search URL with `{type}`, `{date}` and `{page}` placeholders.
    #[serde(default = "default_search_url_template")]
    pub search_url_template: String,

    /// Upper bound on result pages visited per search query.
    #[serde(default = "default_max_result_pages")]
    pub max_result_pages: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_url_template: default_search_url_template(),
            max_result_pages: default_max_result_pages(),
        }
    }
}

fn default_base_url() -> String {
    "https://diariodarepublica.pt".into()
}
fn default_search_url_template() -> String {
    "https://diariodarepublica.pt/dr/pesquisa-avancada?serie=I&tipo={type}&dataInicio={date}&dataFim={date}&pagina={page}".into()
}
fn default_max_result_pages() -> u32 {
    20
}

// ---------------------------------------------------------------------------
// Harvest config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration: merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Resolved database path.
    pub database_path: PathBuf,
    /// Maximum concurrent fetch-and-extract workers.
    pub concurrency: u32,
    /// Default limit for the backlog sweep.
    pub sweep_limit: u32,
    /// `LIKE` pattern for sweep targets.
    pub source_url_filter: String,
    /// Per page-load timeout in seconds.
    pub timeout_secs: u64,
    /// Delay before each request in ms.
    pub rate_limit_ms: u64,
    pub user_agent: String,
    pub render_endpoint: Option<String>,
    pub base_url: String,
    pub search_url_template: String,
    pub max_result_pages: u32,
}

impl From<&AppConfig> for HarvestConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            database_path: expand_home(&config.defaults.database_path),
            concurrency: config.defaults.concurrency.max(1),
            sweep_limit: config.defaults.sweep_limit,
            source_url_filter: config.defaults.source_url_filter.clone(),
            timeout_secs: config.fetch.timeout_secs,
            rate_limit_ms: config.fetch.rate_limit_ms,
            user_agent: config.fetch.user_agent.clone(),
            render_endpoint: config.fetch.render_endpoint.clone(),
            base_url: config.archive.base_url.clone(),
            search_url_template: config.archive.search_url_template.clone(),
            max_result_pages: config.archive.max_result_pages.max(1),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.lexcrawl/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LexcrawlError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.lexcrawl/lexcrawl.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LexcrawlError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LexcrawlError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_archive(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LexcrawlError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LexcrawlError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LexcrawlError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the archive section is usable: a parseable base URL and a
/// search template carrying the `{date}` and `{type}` placeholders.
pub fn validate_archive(config: &AppConfig) -> Result<()> {
    let archive = &config.archive;
    url::Url::parse(&archive.base_url).map_err(|e| {
        LexcrawlError::config(format!("archive.base_url '{}' is invalid: {e}", archive.base_url))
    })?;

    for placeholder in ["{date}", "{type}"] {
        if !archive.search_url_template.contains(placeholder) {
            return Err(LexcrawlError::config(format!(
                "archive.search_url_template must contain {placeholder}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("database_path"));
        assert!(toml_str.contains("search_url_template"));
        assert!(!toml_str.contains("render_endpoint"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.concurrency, 4);
        assert_eq!(parsed.archive.base_url, "https://diariodarepublica.pt");
        assert!(validate_archive(&parsed).is_ok());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[fetch]
render_endpoint = "http://localhost:3000/content"

[archive]
max_result_pages = 3
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(
            config.fetch.render_endpoint.as_deref(),
            Some("http://localhost:3000/content")
        );
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.archive.max_result_pages, 3);
        assert_eq!(config.defaults.sweep_limit, 100);
    }

    #[test]
    fn harvest_config_from_app_config() {
        let app = AppConfig::default();
        let harvest = HarvestConfig::from(&app);
        assert_eq!(harvest.concurrency, 4);
        assert_eq!(harvest.rate_limit_ms, 250);
        assert!(harvest.database_path.ends_with(".lexcrawl/lexcrawl.db"));
    }

    #[test]
    fn template_without_date_is_rejected() {
        let mut config = AppConfig::default();
        config.archive.search_url_template = "https://example.com/search?tipo={type}".into();
        let err = validate_archive(&config).unwrap_err();
        assert!(err.to_string().contains("{date}"));
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/var/lib/lexcrawl.db"), PathBuf::from("/var/lib/lexcrawl.db"));
    }
}
