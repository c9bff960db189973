use std::net::SocketAddr;

use kb_common::store_client::StoreClientConfig;
use url::Url;

use crate::error::AppError;

/// Dashboard configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the JSON API listens on.
    pub bind_addr: SocketAddr,
    /// Backend connection settings (`KB_BACKEND_URL`, `KB_TIMEOUT_SECS`, ...).
    pub store: StoreClientConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `DASHBOARD_BIND_ADDR`: listen address (default `127.0.0.1:3000`)
    /// - `KB_BACKEND_URL` and friends, see `StoreClientConfig::from_env`
    pub fn from_env() -> Result<Self, AppError> {
        let bind_addr = std::env::var("DASHBOARD_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string());
        Self::build(&bind_addr, StoreClientConfig::from_env())
    }

    fn build(bind_addr: &str, store: StoreClientConfig) -> Result<Self, AppError> {
        let bind_addr = bind_addr.parse::<SocketAddr>().map_err(|e| {
            AppError::Config(format!("DASHBOARD_BIND_ADDR '{bind_addr}' is invalid: {e}"))
        })?;

        let backend = Url::parse(&store.base_url).map_err(|e| {
            AppError::Config(format!("KB_BACKEND_URL '{}' is invalid: {e}", store.base_url))
        })?;
        if !matches!(backend.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "KB_BACKEND_URL must be http or https, got '{}'",
                backend.scheme()
            )));
        }

        Ok(Self { bind_addr, store })
    }
}
