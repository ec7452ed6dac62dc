use serde::{Deserialize, Serialize};
use std::fs;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL for the packet store
    pub postgres_url: String,
    #[serde(default)]
    pub packet: PacketConfig,
    pub network: NetworkConfig,
    /// Community operators; may send packets while the group is prohibited
    #[serde(default)]
    pub operators: Vec<Uuid>,
    #[serde(default)]
    pub message_template: MessageTemplateConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PacketConfig {
    /// Reject packets funded with unpriced assets
    pub price_assets_enable: bool,
    pub sweep_interval_secs: u64,
    pub sweep_batch_limit: i64,
}

impl Default for PacketConfig {
    fn default() -> Self {
        Self {
            price_assets_enable: false,
            sweep_interval_secs: 300,
            sweep_batch_limit: 100,
        }
    }
}

/// Payment network credentials
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    pub api_base: String,
    pub client_id: Uuid,
    pub session_token: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageTemplateConfig {
    /// `{}` is replaced with the claimer's display name
    pub group_opened_packet: String,
}

impl Default for MessageTemplateConfig {
    fn default() -> Self {
        Self {
            group_opened_packet: "{} just opened a red packet".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
