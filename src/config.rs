use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::auth::domain::App;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub env: Env,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    Local,
    Dev,
    Prod,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub postgres: Option<DatabaseConfig>,
    /// memory バックエンド起動時に投入するアプリ
    #[serde(default)]
    pub apps: Vec<App>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_connect_retry_delay_ms")]
    pub connect_retry_delay_ms: u64,
}

// 接続文字列にはパスワードが含まれるため出力しない
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"***")
            .field("max_connections", &self.max_connections)
            .field("connect_attempts", &self.connect_attempts)
            .field("connect_retry_delay_ms", &self.connect_retry_delay_ms)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// トークン有効期間 (秒)
    pub token_ttl_secs: u64,
    /// Argon2 の反復回数
    pub hash_cost: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_attempts() -> u32 {
    10
}

fn default_connect_retry_delay_ms() -> u64 {
    1000
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::new_with_config("config/default")
    }

    pub fn new_with_config(config_path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(config_path))
            .add_source(Environment::with_prefix("AUTH_SERVICE").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn token_ttl(&self) -> Result<time::Duration, ConfigError> {
        i64::try_from(self.auth.token_ttl_secs)
            .map(time::Duration::seconds)
            .map_err(|_| {
                ConfigError::Message(format!(
                    "auth.token_ttl_secs is out of range: {}",
                    self.auth.token_ttl_secs
                ))
            })
    }

    pub fn postgres(&self) -> Result<&DatabaseConfig, ConfigError> {
        self.storage
            .postgres
            .as_ref()
            .ok_or_else(|| ConfigError::NotFound("storage.postgres".into()))
    }
}
