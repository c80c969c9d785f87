use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub store: StoreConfig,
    pub cluster: ClusterConfig,
    pub api: ApiConfig,
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Portal's own request-store database (pooled)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Target cluster administrative operations (unpooled, one connection per call)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub operation_timeout_secs: u64,
    pub password_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub cors_origins: Vec<String>,
}

/// Upstream identity service the login proxy forwards credentials to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Store overrides
        if let Ok(v) = env::var("STORE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Ok(v) = env::var("STORE_CONNECT_TIMEOUT_SECS") {
            self.store.connect_timeout_secs = v.parse().unwrap_or(self.store.connect_timeout_secs);
        }

        // Cluster overrides
        if let Ok(v) = env::var("CLUSTER_OPERATION_TIMEOUT_SECS") {
            self.cluster.operation_timeout_secs =
                v.parse().unwrap_or(self.cluster.operation_timeout_secs);
        }
        if let Ok(v) = env::var("CLUSTER_PASSWORD_LENGTH") {
            self.cluster.password_length = v.parse().unwrap_or(self.cluster.password_length);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_CORS_ORIGINS") {
            self.api.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Identity service overrides
        if let Ok(v) = env::var("IDENTITY_API_URL") {
            self.identity.base_url = Some(v.trim_end_matches('/').to_string());
        }
        if let Ok(v) = env::var("IDENTITY_REQUEST_TIMEOUT_SECS") {
            self.identity.request_timeout_secs =
                v.parse().unwrap_or(self.identity.request_timeout_secs);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            store: StoreConfig {
                max_connections: 10,
                connect_timeout_secs: 30,
            },
            cluster: ClusterConfig {
                operation_timeout_secs: 30,
                password_length: 16,
            },
            api: ApiConfig {
                enable_request_logging: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            identity: IdentityConfig {
                base_url: None,
                request_timeout_secs: 10,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            store: StoreConfig {
                max_connections: 20,
                connect_timeout_secs: 10,
            },
            cluster: ClusterConfig {
                operation_timeout_secs: 15,
                password_length: 16,
            },
            api: ApiConfig {
                enable_request_logging: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            identity: IdentityConfig {
                base_url: None,
                request_timeout_secs: 10,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            store: StoreConfig {
                max_connections: 50,
                connect_timeout_secs: 5,
            },
            cluster: ClusterConfig {
                operation_timeout_secs: 10,
                password_length: 16,
            },
            api: ApiConfig {
                enable_request_logging: false,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            identity: IdentityConfig {
                base_url: None,
                request_timeout_secs: 10,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
