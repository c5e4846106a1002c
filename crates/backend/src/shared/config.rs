use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Внешний сервис обогащения и параметры пакетной обработки
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub endpoint_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub batch_size: u32,
    /// Пауза между пакетами
    pub batch_delay_ms: u64,
    pub auto_enrich_limit: u32,
    /// Задержка перед автообогащением после выборки
    pub auto_enrich_delay_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:8787/functions/v1/devolucoes-enrichment".to_string(),
            api_key: None,
            timeout_secs: 60,
            batch_size: 25,
            batch_delay_ms: 1000,
            auto_enrich_limit: 10,
            auto_enrich_delay_ms: 2000,
        }
    }
}

impl EnrichmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn auto_enrich_delay(&self) -> Duration {
        Duration::from_millis(self.auto_enrich_delay_ms)
    }
}

/// Параметры консоли возвратов
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConsoleConfig {
    pub default_period_days: i64,
    pub card_page_size: u64,
    pub table_page_size: u64,
    /// 0 отключает периодическое обновление
    pub refresh_interval_secs: u64,
    /// Сессия без обращений дольше этого закрывается; 0 отключает
    pub session_idle_timeout_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            default_period_days: 30,
            card_page_size: 20,
            table_page_size: 50,
            refresh_interval_secs: 300,
            session_idle_timeout_secs: 1800,
        }
    }
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[database]
path = "target/db/app.db"

[server]
port = 3000

[enrichment]
endpoint_url = "http://localhost:8787/functions/v1/devolucoes-enrichment"
timeout_secs = 60
batch_size = 25
batch_delay_ms = 1000
auto_enrich_limit = 10
auto_enrich_delay_ms = 2000

[console]
default_period_days = 30
card_page_size = 20
table_page_size = 50
refresh_interval_secs = 300
session_idle_timeout_secs = 1800
"#;

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(config);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    tracing::info!("Using default embedded configuration");
    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    Ok(config)
}

/// Get the database file path from configuration
/// Resolves relative paths relative to the executable directory
pub fn get_database_path(config: &Config) -> anyhow::Result<PathBuf> {
    let db_path_str = &config.database.path;
    let db_path = Path::new(db_path_str);

    if db_path.is_absolute() {
        return Ok(db_path.to_path_buf());
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return Ok(exe_dir.join(db_path));
        }
    }

    Ok(PathBuf::from(db_path_str))
}
