use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,
    pub telegram: TelegramConfig,
    pub aliexpress: AliexpressConfig,
    pub amazon: AmazonConfig,
    #[serde(default)]
    pub shortener: ShortenerConfig,
    /// Numeric ids (as decimal strings) and usernames whose messages are left alone.
    #[serde(default)]
    pub excluded_users: Vec<String>,
    /// Each keyword becomes a /command answered with the static discounts reply.
    #[serde(default)]
    pub discount_keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AliexpressConfig {
    pub app_key: String,
    pub app_secret: String,
    pub aff_id: String,
    #[serde(default = "default_aliexpress_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AmazonConfig {
    pub access_key: String,
    pub secret_key: String,
    pub affiliate_tag: String,
    pub country: String,
    #[serde(default = "default_amazon_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShortenerConfig {
    #[serde(default = "default_shortener_base_url")]
    pub base_url: String,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            base_url: default_shortener_base_url(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reload_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_aliexpress_endpoint() -> String {
    "https://api.alibaba.com/openapi/param2/2/portals.open/api.getPromotionProductDetail/"
        .to_string()
}

fn default_amazon_endpoint() -> String {
    "https://webservices.amazon.com/paapi5/getitems".to_string()
}

fn default_shortener_base_url() -> String {
    "https://tinyurl.com".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// True if the sender's numeric id or username is in the exclusion list.
    pub fn is_user_excluded(&self, user_id: u64, username: Option<&str>) -> bool {
        let id = user_id.to_string();
        self.excluded_users
            .iter()
            .any(|entry| entry == &id || Some(entry.as_str()) == username)
    }
}

/// Process-wide configuration state: loaded once at start, then wholesale
/// replaced on each reload tick. Readers take an `Arc` snapshot; a message
/// in flight across a reload keeps the snapshot it started with.
pub struct ConfigStore {
    path: PathBuf,
    current: ArcSwap<Config>,
}

impl ConfigStore {
    pub fn new(path: PathBuf, initial: Config) -> Self {
        Self {
            path,
            current: ArcSwap::from_pointee(initial),
        }
    }

    pub fn current(&self) -> Arc<Config> {
        self.current.load_full()
    }

    /// Re-read the config file and swap the snapshot. On failure the
    /// previous snapshot stays active.
    pub fn reload(&self) -> Result<()> {
        let config = Config::load(&self.path)?;
        self.current.store(Arc::new(config));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        excluded_users = ["123456789", "spamuser"]
        discount_keywords = ["descuentos"]

        [telegram]
        bot_token = "token"

        [aliexpress]
        app_key = "key"
        app_secret = "secret"
        aff_id = "aff"

        [amazon]
        access_key = "ak"
        secret_key = "sk"
        affiliate_tag = "mytag-21"
        country = "es"
    "#;

    fn sample_config() -> Config {
        toml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_defaults_fill_omitted_keys() {
        let config = sample_config();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.reload_interval_secs, 86400);
        assert_eq!(config.shortener.base_url, "https://tinyurl.com");
        assert!(config
            .aliexpress
            .endpoint
            .starts_with("https://api.alibaba.com/"));
    }

    #[test]
    fn test_excluded_by_numeric_id() {
        let config = sample_config();
        assert!(config.is_user_excluded(123456789, None));
        assert!(config.is_user_excluded(123456789, Some("someone")));
    }

    #[test]
    fn test_excluded_by_username() {
        let config = sample_config();
        assert!(config.is_user_excluded(42, Some("spamuser")));
    }

    #[test]
    fn test_not_excluded() {
        let config = sample_config();
        assert!(!config.is_user_excluded(42, Some("regular")));
        assert!(!config.is_user_excluded(42, None));
    }

    #[test]
    fn test_store_snapshot_replaced_wholesale() {
        let store = ConfigStore::new(PathBuf::from("unused.toml"), sample_config());
        let before = store.current();
        let mut next = sample_config();
        next.excluded_users.push("newuser".to_string());
        store.current.store(Arc::new(next));
        assert!(!before.is_user_excluded(0, Some("newuser")));
        assert!(store.current().is_user_excluded(0, Some("newuser")));
    }
}
