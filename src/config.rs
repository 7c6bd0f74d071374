use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub escrow: EscrowSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub webhook: WebhookSettings,
    /// PostgreSQL connection URL. Absent means the in-memory store.
    #[serde(default)]
    pub postgres_url: Option<String>,
    /// Payment provider base URL. Absent means the mock gateway.
    #[serde(default)]
    pub payment_provider_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EscrowSettings {
    pub offer_ttl_secs: i64,
    pub payment_deadline_secs: i64,
    pub transfer_deadline_secs: i64,
    /// Platform fee, percent of the gross amount.
    pub fee_pct: u32,
    /// PARTIAL dispute resolution: buyer's share of the gross, percent.
    pub partial_buyer_refund_pct: u32,
    pub sweep_interval_secs: u64,
}

impl Default for EscrowSettings {
    fn default() -> Self {
        Self {
            offer_ttl_secs: 48 * 3600,
            payment_deadline_secs: 24 * 3600,
            transfer_deadline_secs: 72 * 3600,
            fee_pct: 10,
            partial_buyer_refund_pct: 50,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub max_requests: usize,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 120,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct WebhookSettings {
    /// Hex-coded Ed25519 public key of the payment provider. Absent
    /// disables webhook signature verification (local provider stub).
    pub provider_public_key_hex: Option<String>,
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
