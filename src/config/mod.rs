use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub menu: MenuConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub login_path: String,
    pub refresh_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuConfig {
    pub path: String,
    pub max_depth: usize,
    pub enable_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Preset first, then individual variables win
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("HRDESK_API_URL") {
            self.api.base_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("HRDESK_API_TIMEOUT_SECS") {
            self.api.timeout_secs = v.parse().unwrap_or(self.api.timeout_secs);
        }

        if let Ok(v) = env::var("HRDESK_MENU_PATH") {
            self.menu.path = v;
        }
        if let Ok(v) = env::var("HRDESK_MENU_MAX_DEPTH") {
            self.menu.max_depth = v.parse().unwrap_or(self.menu.max_depth);
        }
        if let Ok(v) = env::var("HRDESK_MENU_CACHE") {
            self.menu.enable_cache = v.parse().unwrap_or(self.menu.enable_cache);
        }

        if let Ok(v) = env::var("HRDESK_CONFIG_DIR") {
            self.storage.dir = PathBuf::from(v);
        }

        self
    }

    /// Development preset; also what tests build on.
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                base_url: "http://localhost:3000".to_string(),
                timeout_secs: 30,
                login_path: "/auth/login".to_string(),
                refresh_path: "/auth/refresh".to_string(),
            },
            menu: MenuConfig {
                path: "/api/menu".to_string(),
                max_depth: 16,
                enable_cache: true,
            },
            storage: StorageConfig {
                dir: default_storage_dir(),
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.api.base_url = "https://hr-staging.example.com".to_string();
        config.api.timeout_secs = 15;
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.api.base_url = "https://hr.example.com".to_string();
        config.api.timeout_secs = 10;
        config.menu.max_depth = 8;
        config
    }

    /// Point the client at a different backend, keeping everything else.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage.dir = dir.into();
        self
    }
}

fn default_storage_dir() -> PathBuf {
    match env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".config").join("hrdesk"),
        Err(_) => PathBuf::from(".hrdesk"),
    }
}

// Loaded once for the binary; library types take `&ClientConfig` instead
pub static CONFIG: Lazy<ClientConfig> = Lazy::new(ClientConfig::from_env);

pub fn config() -> &'static ClientConfig {
    &CONFIG
}
