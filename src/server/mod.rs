//! REST API exposing the rating tables

mod error;
mod handlers;
mod routes;
mod state;
pub mod table;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, SharedProvider};

use crate::config::{parse_var, RatingConfig};
use crate::error::RatingError;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address (default: "127.0.0.1")
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
    pub rating: RatingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            rating: RatingConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16, rating: RatingConfig) -> Self {
        ServerConfig {
            host: host.into(),
            port,
            rating,
        }
    }

    /// Reads `HOST` and `PORT` plus every [`RatingConfig`] variable.
    ///
    /// # Errors
    /// Returns `InvalidParameter` when a variable is set but malformed.
    pub fn from_env() -> Result<Self, RatingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RatingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServerConfig {
            rating: RatingConfig::from_lookup(&lookup)?,
            ..ServerConfig::default()
        };
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse_var("PORT", &port)?;
        }
        Ok(config)
    }
}

/// Runs the API server
///
/// Log verbosity follows `RUST_LOG` and defaults to `info`. Records from
/// the `log` facade (used by the data providers) are forwarded to the same
/// subscriber.
///
/// # Example
/// ```rust,no_run
/// use strength::server::{run_server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     run_server(ServerConfig::default()).await?;
///     Ok(())
/// }
/// ```
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    tracing::info!(
        backend = ?config.rating.backend,
        data_dir = %config.rating.data_dir.display(),
        "opening datasets"
    );
    let state = Arc::new(AppState::open(config.rating)?);
    let app = routes::create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_from_lookup() {
        let config = ServerConfig::from_lookup(|key| match key {
            "HOST" => Some("0.0.0.0".to_string()),
            "PORT" => Some("8080".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);

        let defaults = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(defaults.port, 3000);
    }

    #[test]
    fn test_server_config_rejects_malformed_port() {
        for port in ["http", "70000", "-1"] {
            let result = ServerConfig::from_lookup(|key| (key == "PORT").then(|| port.to_string()));
            assert!(matches!(result, Err(RatingError::InvalidParameter(_))));
        }
    }
}
