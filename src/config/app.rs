// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

pub const ENV_CONFIG_PATH: &str = "CRYPTO_DIGEST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";
pub const ENV_CMC_API_KEY: &str = "COINMARKETCAP_API_KEY";

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_cmc_base_url() -> String {
    "https://pro-api.coinmarketcap.com".to_string()
}
fn default_listing_limit() -> u32 {
    100
}
fn default_convert() -> String {
    "USD".to_string()
}
fn default_market_cron() -> String {
    "0 8,20 * * *".to_string()
}
fn default_alerts_cron() -> String {
    "0 9,21 * * *".to_string()
}
fn default_cmc_timeout_secs() -> u64 {
    15
}
fn default_alert_timeout_secs() -> u64 {
    5
}
fn default_stale_after_hours() -> i64 {
    12
}
fn default_alert_label() -> String {
    "ZachXBT Telegram (@investigations)".to_string()
}
fn default_channel_url() -> String {
    "https://t.me/investigations".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; crypto-digest/0.1)".to_string()
}
fn default_alert_sources() -> Vec<AlertSourceConfig> {
    vec![
        AlertSourceConfig {
            name: "rsshub".into(),
            url: "https://rsshub.app/telegram/channel/investigations".into(),
        },
        AlertSourceConfig {
            name: "tg-i-c-a".into(),
            url: "https://tg.i-c-a.su/rss/investigations".into(),
        },
        AlertSourceConfig {
            name: "telegram-channels-api".into(),
            url: "https://telegram-channels.p.rapidapi.com/channel/investigations/messages"
                .into(),
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertSourceConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Never read from the file; resolved from `COINMARKETCAP_API_KEY`.
    #[serde(skip)]
    pub cmc_api_key: Option<String>,
    #[serde(default = "default_cmc_base_url")]
    pub cmc_base_url: String,
    #[serde(default = "default_listing_limit")]
    pub listing_limit: u32,
    #[serde(default = "default_convert")]
    pub convert: String,
    #[serde(default = "default_cmc_timeout_secs")]
    pub cmc_timeout_secs: u64,

    #[serde(default = "default_market_cron")]
    pub market_cron: String,
    #[serde(default = "default_alerts_cron")]
    pub alerts_cron: String,

    #[serde(default = "default_alert_sources")]
    pub alert_sources: Vec<AlertSourceConfig>,
    #[serde(default = "default_alert_timeout_secs")]
    pub alert_timeout_secs: u64,
    #[serde(default = "default_alert_label")]
    pub alert_label: String,
    #[serde(default = "default_channel_url")]
    pub channel_url: String,

    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: i64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cmc_api_key: None,
            cmc_base_url: default_cmc_base_url(),
            listing_limit: default_listing_limit(),
            convert: default_convert(),
            cmc_timeout_secs: default_cmc_timeout_secs(),
            market_cron: default_market_cron(),
            alerts_cron: default_alerts_cron(),
            alert_sources: default_alert_sources(),
            alert_timeout_secs: default_alert_timeout_secs(),
            alert_label: default_alert_label(),
            channel_url: default_channel_url(),
            stale_after_hours: default_stale_after_hours(),
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s).context("parsing app config toml")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading app config from {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    /// Load using env var + fallbacks, then apply environment overrides:
    /// 1) $CRYPTO_DIGEST_CONFIG
    /// 2) config/app.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from_file(DEFAULT_CONFIG_PATH)?
        } else {
            Self::default()
        };
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        self.cmc_api_key = env::var(ENV_CMC_API_KEY)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        if let Ok(dir) = env::var("DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir.trim());
            }
        }
        if let Some(v) = env::var("ALERT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.alert_timeout_secs = v;
        }
        if let Some(v) = env::var("STALE_AFTER_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.stale_after_hours = v;
        }
        self.sanitize();
    }

    fn sanitize(&mut self) {
        if self.listing_limit == 0 {
            self.listing_limit = default_listing_limit();
        }
        if self.cmc_timeout_secs == 0 {
            self.cmc_timeout_secs = default_cmc_timeout_secs();
        }
        if self.alert_timeout_secs == 0 {
            self.alert_timeout_secs = default_alert_timeout_secs();
        }
        if self.stale_after_hours <= 0 {
            self.stale_after_hours = default_stale_after_hours();
        }
        self.convert = self.convert.trim().to_ascii_uppercase();
        if self.convert.is_empty() {
            self.convert = default_convert();
        }
        self.alert_sources
            .retain(|s| !s.name.trim().is_empty() && !s.url.trim().is_empty());
    }
}
