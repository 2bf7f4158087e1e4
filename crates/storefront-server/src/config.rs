//! Server Configuration
//!
//! Read from the environment (optionally seeded from `.env`). Secrets have no
//! defaults; a missing secret disables the feature that needs it.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use storefront_core::order::DEFAULT_ORDER_PREFIX;
use storefront_payments::DEFAULT_TOLERANCE_SECS;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} is invalid: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Server settings
#[derive(Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub stripe_secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: i64,
    /// Origins allowed to call the API from a browser
    pub allowed_origins: Vec<String>,
    /// Redirect origin when the request origin is not allowed
    pub public_base_url: String,
    /// JSON order file; in-memory store when unset
    pub order_store_path: Option<PathBuf>,
    pub admin_token: Option<String>,
    pub order_id_prefix: String,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("stripe_configured", &self.stripe_secret_key.is_some())
            .field("webhook_configured", &self.webhook_secret.is_some())
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("allowed_origins", &self.allowed_origins)
            .field("public_base_url", &self.public_base_url)
            .field("order_store_path", &self.order_store_path)
            .field("admin_configured", &self.admin_token.is_some())
            .field("order_id_prefix", &self.order_id_prefix)
            .finish()
    }
}

impl ServerConfig {
    /// Load from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for each variable; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let webhook_tolerance_secs = match get("WEBHOOK_TOLERANCE_SECS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    var: "WEBHOOK_TOLERANCE_SECS",
                    message: format!("expected a positive number of seconds, got '{raw}'"),
                })?,
            None => DEFAULT_TOLERANCE_SECS,
        };

        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();
        if !is_http_origin(&public_base_url) {
            return Err(ConfigError::Invalid {
                var: "PUBLIC_BASE_URL",
                message: "must start with http:// or https://".into(),
            });
        }

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().trim_end_matches('/').to_string())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if let Some(bad) = allowed_origins.iter().find(|o| !is_http_origin(o)) {
            return Err(ConfigError::Invalid {
                var: "ALLOWED_ORIGINS",
                message: format!("'{bad}' is not an http(s) origin"),
            });
        }

        let order_id_prefix = get("ORDER_ID_PREFIX").unwrap_or_else(|| DEFAULT_ORDER_PREFIX.into());
        if !order_id_prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid {
                var: "ORDER_ID_PREFIX",
                message: "only letters and digits are allowed".into(),
            });
        }

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
            webhook_tolerance_secs,
            allowed_origins,
            public_base_url,
            order_store_path: get("ORDER_STORE_PATH").map(PathBuf::from),
            admin_token: get("ADMIN_API_TOKEN"),
            order_id_prefix,
        })
    }

    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }

    /// Where the payment page sends the customer back to
    pub fn redirect_origin<'a>(&'a self, origin: Option<&'a str>) -> &'a str {
        origin
            .filter(|o| self.is_allowed_origin(o))
            .unwrap_or(&self.public_base_url)
    }
}

fn is_http_origin(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.webhook_tolerance_secs, 300);
        assert_eq!(config.public_base_url, "http://localhost:3000");
        assert_eq!(config.order_id_prefix, "ORD");
        assert!(config.stripe_secret_key.is_none());
        assert!(config.admin_token.is_none());
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn test_blank_secret_is_unset() {
        let config = config(&[("STRIPE_WEBHOOK_SECRET", "  ")]).unwrap();
        assert!(config.webhook_secret.is_none());
    }

    #[test]
    fn test_redirect_origin_uses_allow_list() {
        let config = config(&[
            ("ALLOWED_ORIGINS", "https://shop.example, https://www.shop.example/"),
            ("PUBLIC_BASE_URL", "https://shop.example/"),
        ])
        .unwrap();
        assert_eq!(
            config.redirect_origin(Some("https://www.shop.example")),
            "https://www.shop.example"
        );
        assert_eq!(config.redirect_origin(Some("https://evil.example")), "https://shop.example");
        assert_eq!(config.redirect_origin(None), "https://shop.example");
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("WEBHOOK_TOLERANCE_SECS", "soon")]).is_err());
        assert!(config(&[("WEBHOOK_TOLERANCE_SECS", "0")]).is_err());
        assert!(config(&[("PUBLIC_BASE_URL", "shop.example")]).is_err());
        assert!(config(&[("ALLOWED_ORIGINS", "*")]).is_err());
        assert!(config(&[("ORDER_ID_PREFIX", "ORD/")]).is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = config(&[("STRIPE_SECRET_KEY", "sk_test_secret"), ("ADMIN_API_TOKEN", "hunter2")]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk_test_secret"));
        assert!(!debug.contains("hunter2"));
    }
}
