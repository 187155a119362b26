//! Meta Writer — read-modify-write of a single server's `_meta` sub-object.
//!
//! Meta is advisory: a failure here (missing file, parse error, missing
//! server, write error) is logged and swallowed rather than propagated,
//! because corrupting the config file over a lost annotation would be worse
//! than the annotation simply not being written.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

/// Deep-merges `kv_pairs` into `mcpServers[server_name]._meta`, preserving
/// every unrelated key in the file and every other server entry. Creates
/// `_meta` if it was absent. Never returns an error; all failure modes are
/// logged at `warn` and otherwise ignored.
pub fn update_server_meta(path: &Path, server_name: &str, kv_pairs: &BTreeMap<String, String>) {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "meta write skipped: config file unreadable");
            return;
        }
    };

    let mut root: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "meta write skipped: config file malformed");
            return;
        }
    };

    let Some(servers) = root
        .get_mut("mcpServers")
        .and_then(Value::as_object_mut)
    else {
        warn!(path = %path.display(), "meta write skipped: no mcpServers object");
        return;
    };

    let Some(server) = servers.get_mut(server_name).and_then(Value::as_object_mut) else {
        warn!(server = server_name, "meta write skipped: server not present in config");
        return;
    };

    let meta = server
        .entry("_meta")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(meta_obj) = meta.as_object_mut() else {
        warn!(server = server_name, "meta write skipped: _meta is not an object");
        return;
    };

    for (k, v) in kv_pairs {
        meta_obj.insert(k.clone(), Value::String(v.clone()));
    }

    let pretty = match serde_json::to_string_pretty(&root) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "meta write skipped: failed to serialize config");
            return;
        }
    };

    if let Err(e) = fs::write(path, pretty) {
        warn!(path = %path.display(), error = %e, "meta write skipped: failed to write config");
    }
}
