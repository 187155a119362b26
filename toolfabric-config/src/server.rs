//! [`ServerSpec`] — one row of the fabric's declarative configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;

/// Transport used to reach a tool server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Sse,
}

/// Whether a server's connection is kept alive across calls or rebuilt per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Persistent,
    PerCall,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle::Persistent
    }
}

fn default_lifecycle() -> Lifecycle {
    Lifecycle::Persistent
}

/// One row of configuration: a single tool server, keyed by its config name.
///
/// `name` is always derived from the config key under which this entry was
/// parsed, never from a field inside the entry body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSpec {
    #[serde(skip)]
    pub name: String,

    pub transport: Transport,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: Vec<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_lifecycle")]
    pub lifecycle: Lifecycle,

    #[serde(rename = "_meta", default)]
    pub meta: BTreeMap<String, String>,
}

impl ServerSpec {
    /// Stdio needs a non-empty command, sse needs a well-formed url. Does
    /// not reject any other shape — the Manager is the sole caller, at
    /// connect/probe time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.transport {
            Transport::Stdio => {
                if self.command.as_deref().unwrap_or("").trim().is_empty() {
                    return Err(ConfigError::InvalidServerSpec {
                        name: self.name.clone(),
                        reason: "stdio transport requires a non-empty command".to_string(),
                    });
                }
            }
            Transport::Sse => {
                let url = self.url.as_deref().unwrap_or("");
                if url::Url::parse(url).is_err() {
                    return Err(ConfigError::InvalidServerSpec {
                        name: self.name.clone(),
                        reason: format!("sse transport requires a well-formed url, got '{url}'"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Parsed `KEY=VALUE` environment entries, skipping malformed ones.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .filter_map(|entry| entry.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(transport: Transport) -> ServerSpec {
        ServerSpec {
            name: "demo".to_string(),
            transport,
            command: None,
            args: Vec::new(),
            env: Vec::new(),
            url: None,
            lifecycle: Lifecycle::Persistent,
            meta: BTreeMap::new(),
        }
    }

    #[test]
    fn stdio_requires_command() {
        let mut s = spec(Transport::Stdio);
        assert!(s.validate().is_err());
        s.command = Some("python3".to_string());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn sse_requires_well_formed_url() {
        let mut s = spec(Transport::Sse);
        assert!(s.validate().is_err());
        s.url = Some("not a url".to_string());
        assert!(s.validate().is_err());
        s.url = Some("https://example.com/sse".to_string());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn env_pairs_skips_malformed_entries() {
        let mut s = spec(Transport::Stdio);
        s.env = vec!["KEY=value".to_string(), "malformed".to_string()];
        assert_eq!(
            s.env_pairs(),
            vec![("KEY".to_string(), "value".to_string())]
        );
    }

    #[test]
    fn lifecycle_defaults_to_persistent() {
        assert_eq!(Lifecycle::default(), Lifecycle::Persistent);
    }
}
