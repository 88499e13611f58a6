//! Server settings read from the environment.

use crate::error::ConfigError;
use crate::response::StatusPolicy;
use std::net::SocketAddr;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/rest_crud";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Debug)]
pub struct ServerSettings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    /// Echo panic payloads in error envelopes.
    pub expose_panics: bool,
    pub status_policy: StatusPolicy,
}

impl ServerSettings {
    /// Loads `.env` if present, then reads `DATABASE_URL`, `BIND_ADDR`,
    /// `DB_MAX_CONNECTIONS`, `EXPOSE_PANICS` and `STATUS_POLICY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.into())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Setting {
                key: "BIND_ADDR",
                message: e.to_string(),
            })?;
        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Setting {
                key: "DB_MAX_CONNECTIONS",
                message: format!("expected a positive integer, got {:?}", v),
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        if max_connections == 0 {
            return Err(ConfigError::Setting {
                key: "DB_MAX_CONNECTIONS",
                message: "must be positive".into(),
            });
        }
        let expose_panics = match lookup("EXPOSE_PANICS") {
            Some(v) => parse_bool(&v).ok_or_else(|| ConfigError::Setting {
                key: "EXPOSE_PANICS",
                message: format!("expected true or false, got {:?}", v),
            })?,
            None => false,
        };
        let status_policy = match lookup("STATUS_POLICY").as_deref().map(str::trim) {
            None | Some("") | Some("envelope") => StatusPolicy::Envelope,
            Some("reflect") => StatusPolicy::Reflect,
            Some(other) => {
                return Err(ConfigError::Setting {
                    key: "STATUS_POLICY",
                    message: format!("expected envelope or reflect, got {:?}", other),
                })
            }
        };
        Ok(ServerSettings {
            database_url,
            bind_addr,
            max_connections,
            expose_panics,
            status_policy,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Installs a fmt subscriber filtered by `RUST_LOG`, falling back to `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    // A subscriber may already be installed (tests, embedding applications).
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<ServerSettings, ConfigError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerSettings::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(s.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(s.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(!s.expose_panics);
        assert_eq!(s.status_policy, StatusPolicy::Envelope);
    }

    #[test]
    fn reads_overrides() {
        let s = settings(&[
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("DB_MAX_CONNECTIONS", "12"),
            ("EXPOSE_PANICS", "yes"),
            ("STATUS_POLICY", "reflect"),
        ])
        .unwrap();
        assert_eq!(s.bind_addr.port(), 8080);
        assert_eq!(s.max_connections, 12);
        assert!(s.expose_panics);
        assert_eq!(s.status_policy, StatusPolicy::Reflect);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(matches!(
            settings(&[("DB_MAX_CONNECTIONS", "0")]),
            Err(ConfigError::Setting { key: "DB_MAX_CONNECTIONS", .. })
        ));
        assert!(settings(&[("BIND_ADDR", "nowhere")]).is_err());
        assert!(settings(&[("STATUS_POLICY", "loud")]).is_err());
        assert!(settings(&[("EXPOSE_PANICS", "maybe")]).is_err());
    }
}
