use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::models::Category;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// One page URL per category.
#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_obfs4_ipv4_url")]
    pub obfs4_ipv4: String,
    #[serde(default = "default_obfs4_ipv6_url")]
    pub obfs4_ipv6: String,
    #[serde(default = "default_webtunnel_ipv4_url")]
    pub webtunnel_ipv4: String,
    #[serde(default = "default_webtunnel_ipv6_url")]
    pub webtunnel_ipv6: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            obfs4_ipv4: default_obfs4_ipv4_url(),
            obfs4_ipv6: default_obfs4_ipv6_url(),
            webtunnel_ipv4: default_webtunnel_ipv4_url(),
            webtunnel_ipv6: default_webtunnel_ipv6_url(),
        }
    }
}

impl SourcesConfig {
    pub fn urls(&self) -> BTreeMap<Category, String> {
        BTreeMap::from([
            (Category::Obfs4Ipv4, self.obfs4_ipv4.clone()),
            (Category::Obfs4Ipv6, self.obfs4_ipv6.clone()),
            (Category::WebtunnelIpv4, self.webtunnel_ipv4.clone()),
            (Category::WebtunnelIpv6, self.webtunnel_ipv6.clone()),
        ])
    }
}

fn default_obfs4_ipv4_url() -> String {
    "https://bridges.torproject.org/bridges?transport=obfs4".to_string()
}
fn default_obfs4_ipv6_url() -> String {
    "https://bridges.torproject.org/bridges?transport=obfs4&ipv6=yes".to_string()
}
fn default_webtunnel_ipv4_url() -> String {
    "https://bridges.torproject.org/bridges?transport=webtunnel".to_string()
}
fn default_webtunnel_ipv6_url() -> String {
    "https://bridges.torproject.org/bridges?transport=webtunnel&ipv6=yes".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_referer")]
    pub referer: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            referer: default_referer(),
            accept_language: default_accept_language(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}
fn default_referer() -> String {
    "https://bridges.torproject.org/".to_string()
}
fn default_accept_language() -> String {
    "en-US,en;q=0.5".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Directory for the JSON backend.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
    /// Database file for the SQLite backend.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            dir: default_storage_dir(),
            path: default_storage_path(),
        }
    }
}

fn default_backend() -> String {
    "json".to_string()
}
fn default_storage_dir() -> PathBuf {
    PathBuf::from("config")
}
fn default_storage_path() -> PathBuf {
    PathBuf::from("data/bridges.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: default_api_base(),
            max_message_chars: default_max_message_chars(),
        }
    }
}

impl TelegramConfig {
    pub fn is_enabled(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.bot_token) && set(&self.chat_id)
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}
fn default_max_message_chars() -> usize {
    4096
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Pause after the new-bridges message before the next one.
    #[serde(default = "default_notify_delay_ms")]
    pub notify_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            notify_delay_ms: default_notify_delay_ms(),
        }
    }
}

fn default_notify_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: default_interval_hours(),
        }
    }
}

/// Longest accepted schedule interval (one year).
pub const MAX_INTERVAL_HOURS: u64 = 24 * 365;

fn default_true() -> bool {
    true
}
fn default_interval_hours() -> u64 {
    12
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

/// Loads configuration from `path`, applies environment overrides and
/// validates the result.
///
/// A missing file is not an error: every setting has a default.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

/// Overrides from the deployment environment:
/// `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `INTERVAL_HOURS`,
/// `DISABLE_INTERNAL_CRON`, `BIND_ADDR`.
pub fn apply_env_overrides<F>(config: &mut Config, var: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = var("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty()) {
        config.telegram.bot_token = Some(token);
    }
    if let Some(chat) = var("TELEGRAM_CHAT_ID").filter(|v| !v.is_empty()) {
        config.telegram.chat_id = Some(chat);
    }
    if let Some(hours) = var("INTERVAL_HOURS").filter(|v| !v.is_empty()) {
        config.schedule.interval_hours = hours
            .trim()
            .parse()
            .with_context(|| format!("INTERVAL_HOURS must be a whole number, got '{}'", hours))?;
    }
    if let Some(disabled) = var("DISABLE_INTERNAL_CRON") {
        if disabled.trim().eq_ignore_ascii_case("true") {
            config.schedule.enabled = false;
        }
    }
    if let Some(bind) = var("BIND_ADDR").filter(|v| !v.is_empty()) {
        config.server.bind = bind;
    }
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    for (category, url) in config.sources.urls() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("sources.{} must be an http(s) URL, got '{}'", category, url);
        }
    }

    if config.fetch.timeout_secs == 0 {
        anyhow::bail!("fetch.timeout_secs must be > 0");
    }

    match config.storage.backend.as_str() {
        "json" | "sqlite" => {}
        other => anyhow::bail!(
            "Unknown storage backend: '{}'. Must be json or sqlite.",
            other
        ),
    }

    if config.telegram.max_message_chars == 0 {
        anyhow::bail!("telegram.max_message_chars must be > 0");
    }

    if config.schedule.interval_hours == 0 {
        anyhow::bail!("schedule.interval_hours must be >= 1");
    }
    if config.schedule.interval_hours > MAX_INTERVAL_HOURS {
        anyhow::bail!(
            "schedule.interval_hours must be <= {}, got {}",
            MAX_INTERVAL_HOURS,
            config.schedule.interval_hours
        );
    }

    Ok(())
}
