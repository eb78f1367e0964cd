use std::{fmt::Display, fs::read_to_string, str::FromStr};

use anyhow::{anyhow, Context};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    identity::{AnyIdentity, EmulatorIdentity, FirebaseIdentity},
    GetField,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityBackend {
    Firebase,
    Emulator,
}

impl FromStr for IdentityBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "firebase" => Ok(IdentityBackend::Firebase),
            "emulator" => Ok(IdentityBackend::Emulator),
            other => Err(format!("unknown identity backend {other:?}")),
        }
    }
}

pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub identity_backend: IdentityBackend,
    pub firebase_api_key: Option<String>,
    pub identity_endpoint: Option<String>,
    pub client_secret_path: Option<String>,
    pub public_url: String,
    pub session_minutes: i64,
}

impl Config {
    /// Reads the environment, with `.env` loaded first.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            bind_addr: try_load(&var, "BIND_ADDR", "0.0.0.0:8080")?,
            database_url: try_load(&var, "DATABASE_URL", "sqlite://fixitnow.db?mode=rwc")?,
            database_max_connections: try_load(&var, "DATABASE_MAX_CONNECTIONS", "16")?,
            identity_backend: try_load(&var, "IDENTITY_BACKEND", "emulator")?,
            firebase_api_key: var("FIREBASE_API_KEY"),
            identity_endpoint: var("IDENTITY_ENDPOINT"),
            client_secret_path: var("CLIENT_SECRET_PATH"),
            public_url: try_load(&var, "PUBLIC_URL", "http://localhost:8080")?,
            session_minutes: try_load(&var, "SESSION_MINUTES", "30")?,
        })
    }

    /// The OAuth client secrets file, or `null` when none is configured.
    pub fn client_secrets(&self) -> anyhow::Result<Value> {
        let Some(path) = &self.client_secret_path else {
            warn!("CLIENT_SECRET_PATH not set, federated sign-in disabled");
            return Ok(Value::Null);
        };
        let raw = read_to_string(path).with_context(|| format!("reading {path}"))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn identity(&self, secrets: &Value) -> anyhow::Result<AnyIdentity> {
        match self.identity_backend {
            IdentityBackend::Emulator => {
                warn!("using the in-process identity emulator");
                Ok(AnyIdentity::Emulator(EmulatorIdentity::default()))
            }
            IdentityBackend::Firebase => {
                let api_key = match &self.firebase_api_key {
                    Some(key) => key.clone(),
                    None => secrets
                        .get_obj_field("firebase")
                        .and_then(|firebase| firebase.get_str_field("apikey"))
                        .map_err(|_| anyhow!("firebase backend needs FIREBASE_API_KEY or firebase.apikey in client secrets"))?,
                };
                Ok(AnyIdentity::Firebase(match &self.identity_endpoint {
                    Some(endpoint) => FirebaseIdentity::with_endpoint(api_key, endpoint.as_str()),
                    None => FirebaseIdentity::new(api_key),
                }))
            }
        }
    }
}

fn try_load<T: FromStr>(var: impl Fn(&str) -> Option<String>, key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse().map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.identity_backend, IdentityBackend::Emulator);
        assert_eq!(config.database_max_connections, 16);
        assert!(config.client_secret_path.is_none());
    }

    #[test]
    fn bad_values_are_reported() {
        let err = Config::from_lookup(lookup(&[("SESSION_MINUTES", "soon")])).err().unwrap();
        assert!(err.to_string().contains("SESSION_MINUTES"));
        assert!(Config::from_lookup(lookup(&[("IDENTITY_BACKEND", "ldap")])).is_err());
    }

    #[test]
    fn firebase_key_from_secrets() {
        let config = Config::from_lookup(lookup(&[("IDENTITY_BACKEND", "Firebase")])).unwrap();
        assert!(config.identity(&Value::Null).is_err());
        let identity = config.identity(&json!({ "firebase": { "apikey": "k" } })).unwrap();
        assert!(matches!(identity, AnyIdentity::Firebase(_)));
    }
}
