use crate::error::ConfigError;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8883;
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 60;
/// The MQTT keep-alive field is 16 bits and the client refuses anything
/// shorter than this.
pub const MIN_KEEP_ALIVE_SECS: u16 = 5;

const HOST_VAR: &str = "ALEX_MQTT_HOST";
const PORT_VAR: &str = "ALEX_MQTT_PORT";
const USERNAME_VAR: &str = "ALEX_MQTT_USERNAME";
const PASSWORD_VAR: &str = "ALEX_MQTT_PASSWORD";
const CLIENT_ID_VAR: &str = "ALEX_MQTT_CLIENT_ID";
const KEEP_ALIVE_VAR: &str = "ALEX_MQTT_KEEPALIVE_SECS";
const TLS_VAR: &str = "ALEX_MQTT_TLS";
const RECONNECT_VAR: &str = "ALEX_RECONNECT";

/// Broker settings, read once at start.
#[derive(Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub keep_alive: Duration,
    pub tls: bool,
    pub reconnect: bool,
}

impl std::fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("keep_alive", &self.keep_alive)
            .field("tls", &self.tls)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

impl BusConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let host = non_empty(HOST_VAR).ok_or(ConfigError::Missing(HOST_VAR))?;
        let username = non_empty(USERNAME_VAR).ok_or(ConfigError::Missing(USERNAME_VAR))?;
        let password = lookup(PASSWORD_VAR)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing(PASSWORD_VAR))?;

        let port = match non_empty(PORT_VAR) {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or(ConfigError::Invalid {
                    key: PORT_VAR,
                    value,
                })?,
            None => DEFAULT_PORT,
        };
        let keep_alive_secs = match non_empty(KEEP_ALIVE_VAR) {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|secs| *secs >= MIN_KEEP_ALIVE_SECS)
                .ok_or(ConfigError::Invalid {
                    key: KEEP_ALIVE_VAR,
                    value,
                })?,
            None => DEFAULT_KEEP_ALIVE_SECS,
        };
        let tls = resolve_flag(&non_empty, TLS_VAR, true)?;
        let reconnect = resolve_flag(&non_empty, RECONNECT_VAR, true)?;
        let client_id = non_empty(CLIENT_ID_VAR).unwrap_or_else(default_client_id);

        Ok(Self {
            host: host.trim().to_string(),
            port,
            username: username.trim().to_string(),
            password,
            client_id,
            keep_alive: Duration::from_secs(u64::from(keep_alive_secs)),
            tls,
            reconnect,
        })
    }

    pub fn broker_label(&self) -> String {
        let scheme = if self.tls { "mqtts" } else { "mqtt" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn resolve_flag<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => parse_bool_flag(&value).ok_or(ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn default_client_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("alex_dashboard_{}_{}", std::process::id(), &suffix[..8])
}
