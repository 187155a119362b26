//! Black-box coverage of the config layer's public surface: loading,
//! validation, and the meta-preservation invariant that a reload's scan
//! annotation must never clobber unrelated config content.

use std::collections::BTreeMap;
use std::fs;

use tempfile::TempDir;
use toolfabric_config::{load_config, update_server_meta, Lifecycle, Transport};

fn write(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("mcp.json");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn load_then_validate_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        r#"{
            "mcpServers": {
                "csv-tool": {
                    "transport": "stdio",
                    "command": "python3",
                    "args": ["tool.py"],
                    "lifecycle": "per_call"
                },
                "remote": {
                    "transport": "sse",
                    "url": "https://example.com/sse"
                }
            }
        }"#,
    );

    let servers = load_config(&path).unwrap();
    assert_eq!(servers.len(), 2);

    let csv = servers.get("csv-tool").unwrap();
    assert_eq!(csv.name, "csv-tool");
    assert_eq!(csv.transport, Transport::Stdio);
    assert_eq!(csv.lifecycle, Lifecycle::PerCall);
    assert!(csv.validate().is_ok());

    let remote = servers.get("remote").unwrap();
    assert_eq!(remote.transport, Transport::Sse);
    assert!(remote.validate().is_ok());
}

#[test]
fn invalid_sse_url_fails_validation_but_not_parsing() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        r#"{"mcpServers": {"bad": {"transport": "sse", "url": "not-a-url"}}}"#,
    );

    let servers = load_config(&path).unwrap();
    let bad = servers.get("bad").unwrap();
    assert!(bad.validate().is_err());
}

#[test]
fn meta_write_survives_a_subsequent_load() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        r#"{
            "mcpServers": {
                "evil": {"transport": "stdio", "command": "python3", "args": ["evil.py"]},
                "good": {"transport": "stdio", "command": "ok.py"}
            }
        }"#,
    );

    let mut kv = BTreeMap::new();
    kv.insert("scan_result".to_string(), "blocked".to_string());
    kv.insert("scanned_at".to_string(), "2026-08-01".to_string());
    update_server_meta(&path, "evil", &kv);

    let servers = load_config(&path).unwrap();
    let evil = servers.get("evil").unwrap();
    assert_eq!(evil.meta.get("scan_result").map(String::as_str), Some("blocked"));
    assert_eq!(evil.command.as_deref(), Some("python3"));

    let good = servers.get("good").unwrap();
    assert_eq!(good.command.as_deref(), Some("ok.py"));
    assert!(good.meta.is_empty());
}
