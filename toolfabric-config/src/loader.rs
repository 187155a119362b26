//! Config Loader — parses the declarative config file into an ordered
//! mapping of server specs, merging `_meta` annotations.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::server::ServerSpec;

/// Name-ordered mapping of server name to [`ServerSpec`], preserving the
/// order in which entries appeared in the config file.
pub type OrderedServerMap = IndexMap<String, ServerSpec>;

#[derive(Debug, Deserialize)]
struct RawConfigFile {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: IndexMap<String, ServerSpec>,
}

/// Parses `path` into an [`OrderedServerMap`].
///
/// Fails with [`ConfigError::ConfigMissing`] if the file does not exist, or
/// [`ConfigError::ConfigMalformed`] on a JSON parse error. Does not validate
/// individual server specs beyond parseability — see [`ServerSpec::validate`],
/// which is the Manager's job at connect time.
pub fn load_config(path: &Path) -> Result<OrderedServerMap, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|_| ConfigError::ConfigMissing {
        path: path.display().to_string(),
    })?;

    let mut parsed: RawConfigFile =
        serde_json::from_str(&raw).map_err(|e| ConfigError::ConfigMalformed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    for (name, spec) in parsed.mcp_servers.iter_mut() {
        spec.name = name.clone();
    }

    Ok(parsed.mcp_servers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), contents).unwrap();
        file
    }

    #[test]
    fn missing_file_is_config_missing() {
        let result = load_config(Path::new("/nonexistent/mcp.json"));
        assert!(matches!(result, Err(ConfigError::ConfigMissing { .. })));
    }

    #[test]
    fn malformed_json_is_config_malformed() {
        let file = write_config("{ not json");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::ConfigMalformed { .. })));
    }

    #[test]
    fn name_comes_from_config_key_not_body() {
        let file = write_config(
            r#"{
                "mcpServers": {
                    "csv-tool": {
                        "transport": "stdio",
                        "command": "python3",
                        "args": ["tool.py"]
                    }
                }
            }"#,
        );
        let map = load_config(file.path()).unwrap();
        let spec = map.get("csv-tool").unwrap();
        assert_eq!(spec.name, "csv-tool");
    }

    #[test]
    fn preserves_config_order() {
        let file = write_config(
            r#"{
                "mcpServers": {
                    "zeta": {"transport": "stdio", "command": "a"},
                    "alpha": {"transport": "stdio", "command": "b"}
                }
            }"#,
        );
        let map = load_config(file.path()).unwrap();
        let names: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn meta_round_trips() {
        let file = write_config(
            r#"{
                "mcpServers": {
                    "evil": {
                        "transport": "stdio",
                        "command": "python3",
                        "_meta": {"scan_result": "blocked", "scanned_at": "2026-07-31"}
                    }
                }
            }"#,
        );
        let map = load_config(file.path()).unwrap();
        let spec = map.get("evil").unwrap();
        assert_eq!(spec.meta.get("scan_result").map(String::as_str), Some("blocked"));
    }
}
