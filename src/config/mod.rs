use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::models::PropertyConfig;
use crate::retry::RetryPolicy;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub telegram: TelegramConfig,
    pub pipeline: PipelineConfig,
    pub report: ReportConfig,

    /// Property table keyed by a small integer; usually supplied through `OYO_PROPERTIES`.
    pub properties: BTreeMap<u32, PropertyEntry>,
}

/// Vendor API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub batch_size: u32,
    pub batch_timeout_secs: u64,
    pub detail_timeout_secs: u64,
    pub rooms_timeout_secs: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

/// Chat delivery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: Option<String>,
    pub chat_map: BTreeMap<String, i64>,
    pub default_chat: String,
    pub message_limit: usize,
    pub min_cut: usize,
    pub send_gap_ms: u64,
    pub message_gap_ms: u64,
    pub upload_timeout_secs: u64,
    pub retry: RetryPolicy,
}

/// Fan-out configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub property_concurrency: usize,
    pub detail_concurrency: usize,
    pub max_rounds: u32,
    pub round_delay_secs: u64,
    pub property_retry: RetryPolicy,
}

/// Report windows and clock
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub utc_offset_minutes: i32,
    pub cutover_hour: u32,
    pub payment_lookback_days: i64,
    pub collection_lookback_days: i64,
    pub checkin_lookback_days: i64,
}

/// One entry of the property table, in the vendor's credential naming.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PropertyEntry {
    pub name: String,
    #[serde(rename = "UIF")]
    pub uif: String,
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "QID")]
    pub qid: serde_json::Value,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.oyoos.com".to_string(),
            batch_size: 100,
            batch_timeout_secs: 35,
            detail_timeout_secs: 25,
            rooms_timeout_secs: 25,
            timeout_secs: 20,
            user_agent: "Mozilla/5.0 (hotel-reports/0.1)".to_string(),
            retry: RetryPolicy::linear(3, 2_000, 1_000),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            bot_token: None,
            chat_map: BTreeMap::new(),
            default_chat: "6am".to_string(),
            message_limit: 3900,
            min_cut: 1000,
            send_gap_ms: 300,
            message_gap_ms: 1500,
            upload_timeout_secs: 120,
            retry: RetryPolicy::linear(15, 0, 2_000).with_max_delay_ms(60_000),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            property_concurrency: 3,
            detail_concurrency: 10,
            max_rounds: 5,
            round_delay_secs: 10,
            property_retry: RetryPolicy::linear(3, 2_000, 2_000),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 330,
            cutover_hour: 12,
            payment_lookback_days: 120,
            collection_lookback_days: 60,
            checkin_lookback_days: 30,
        }
    }
}

impl PipelineConfig {
    pub fn round_delay(&self) -> Duration {
        Duration::from_secs(self.round_delay_secs)
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

/// `HOTEL_<SECTION>__<KEY>` variables, e.g. `HOTEL_PIPELINE__PROPERTY_CONCURRENCY=4`.
fn env_overrides() -> config::Environment {
    config::Environment::with_prefix("HOTEL")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(env_overrides())
            .build()?;

        let mut app_cfg: AppConfig = cfg
            .try_deserialize()
            .context("Invalid configuration")?;

        if let Ok(raw) = std::env::var("OYO_PROPERTIES") {
            app_cfg.properties = parse_property_table(&raw)?;
        }
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.trim().is_empty() {
                app_cfg.telegram.bot_token = Some(token.trim().to_string());
            }
        }
        if let Ok(raw) = std::env::var("TELEGRAM_CHAT_MAP") {
            app_cfg.telegram.chat_map.extend(parse_chat_map(&raw)?);
        }

        Ok(app_cfg)
    }

    /// Resolved, validated property list in key order.
    pub fn property_list(&self) -> Result<Vec<PropertyConfig>> {
        if self.properties.is_empty() {
            bail!("No properties configured (set OYO_PROPERTIES)");
        }
        self.properties
            .iter()
            .map(|(key, entry)| entry.resolve(*key))
            .collect()
    }

    /// Look up a chat id by its key in the chat map.
    pub fn chat_id(&self, key: Option<&str>) -> Result<i64> {
        let key = key.unwrap_or(&self.telegram.default_chat);
        self.telegram
            .chat_map
            .get(key)
            .copied()
            .with_context(|| format!("Chat ID not configured: {}", key))
    }
}

impl PropertyEntry {
    fn resolve(&self, key: u32) -> Result<PropertyConfig> {
        let qid = match &self.qid {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .with_context(|| format!("Property {} ({}) has an invalid QID", key, self.name))?;

        Ok(PropertyConfig {
            key,
            name: self.name.trim().to_string(),
            qid,
            uif: self.uif.clone(),
            uuid: self.uuid.clone(),
        })
    }
}

/// Parse the `OYO_PROPERTIES` JSON object (`{"1": {"name": .., "UIF": .., "UUID": .., "QID": ..}}`).
pub fn parse_property_table(raw: &str) -> Result<BTreeMap<u32, PropertyEntry>> {
    let table: BTreeMap<String, PropertyEntry> =
        serde_json::from_str(raw).context("OYO_PROPERTIES is not valid JSON")?;

    table
        .into_iter()
        .map(|(k, v)| {
            let key = k
                .trim()
                .parse::<u32>()
                .with_context(|| format!("Property key {:?} is not an integer", k))?;
            Ok((key, v))
        })
        .collect()
}

/// Parse the `TELEGRAM_CHAT_MAP` JSON object; ids may be numbers or numeric strings.
pub fn parse_chat_map(raw: &str) -> Result<BTreeMap<String, i64>> {
    let map: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(raw).context("TELEGRAM_CHAT_MAP is not valid JSON")?;

    map.into_iter()
        .map(|(name, v)| {
            let id = match &v {
                serde_json::Value::Number(n) => n.as_i64(),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }
            .with_context(|| format!("Chat {:?} has an invalid id", name))?;
            Ok((name, id))
        })
        .collect()
}
