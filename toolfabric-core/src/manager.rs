//! Manager — owner of all live connections to tool servers, executor of
//! diff-based hot reload, coordinator of per-call vs. persistent
//! lifecycles, and point of serialization between configuration changes
//! and in-flight calls.
//!
//! Locking discipline: a single mutex guards the Manager's state maps.
//! Critical sections are short snapshots/mutations; no network I/O, no
//! subprocess spawn, no file I/O ever runs while the lock is held.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use toolfabric_config::{update_server_meta, Lifecycle, ServerSpec};

use crate::adapter::ToolAdapter;
use crate::error::FabricError;
use crate::registry::Registry;
use crate::scanner;
use crate::transport::{build_client, Client};
use crate::types::{qualified_tool_name, server_prefix, ToolInfo};

/// Deadline applied to Connect and the ListTools performed as part of a
/// connect probe.
pub const CONNECT_DEADLINE: Duration = Duration::from_secs(30);

pub type SharedClient = Arc<AsyncMutex<Box<dyn Client>>>;

/// `(ctx, registry) -> notice`. An empty string means "no notice".
pub type ReloadHook = Arc<dyn Fn(&Arc<Registry>) -> BoxFuture<'static, String> + Send + Sync>;
pub type PromptInvalidator = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct ManagerState {
    specs: HashMap<String, Arc<ServerSpec>>,
    /// `None` for a per_call server — it never holds a live client between calls.
    clients: HashMap<String, Option<SharedClient>>,
    registered_names: HashMap<String, Vec<String>>,
    /// One-shot: populated by `ConnectAll` for per_call servers, consumed
    /// and evicted by the next `RegisterTools`.
    per_call_cache: HashMap<String, Vec<ToolInfo>>,
}

pub struct Manager {
    config_path: PathBuf,
    state: StdMutex<ManagerState>,
    prompt_invalidator: StdMutex<Option<PromptInvalidator>>,
    hooks: StdMutex<Vec<ReloadHook>>,
}

enum ProbeResult {
    Persistent {
        client: SharedClient,
        tools: Option<Vec<ToolInfo>>,
    },
    PerCall {
        tools: Vec<ToolInfo>,
    },
}

struct SuccessfulAdd {
    name: String,
    spec: Arc<ServerSpec>,
    lifecycle: Lifecycle,
    client: Option<SharedClient>,
    tools: Vec<ToolInfo>,
}

impl Manager {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Manager {
            config_path: config_path.into(),
            state: StdMutex::new(ManagerState::default()),
            prompt_invalidator: StdMutex::new(None),
            hooks: StdMutex::new(Vec::new()),
        }
    }

    pub fn set_prompt_invalidator(&self, f: PromptInvalidator) {
        *self.prompt_invalidator.lock().unwrap() = Some(f);
    }

    pub fn add_reload_hook(&self, f: ReloadHook) {
        self.hooks.lock().unwrap().push(f);
    }

    /// Loads the config and connects every server, outside the lock;
    /// installs successful results under the lock. Individual server
    /// failures never abort the others.
    pub async fn connect_all(&self) -> Result<(usize, Vec<(String, String)>), FabricError> {
        let specs = toolfabric_config::load_config(&self.config_path)?;

        let mut errors = Vec::new();
        let mut connected = 0usize;

        for (name, spec) in specs.into_iter() {
            if let Err(e) = spec.validate() {
                errors.push((name.clone(), e.to_string()));
                continue;
            }
            let spec = Arc::new(spec);
            match probe(&spec, CONNECT_DEADLINE, false).await {
                Ok(ProbeResult::Persistent { client, .. }) => {
                    let mut state = self.state.lock().unwrap();
                    state.specs.insert(name.clone(), spec);
                    state.clients.insert(name.clone(), Some(client));
                    connected += 1;
                }
                Ok(ProbeResult::PerCall { tools }) => {
                    let mut state = self.state.lock().unwrap();
                    state.specs.insert(name.clone(), spec);
                    state.clients.insert(name.clone(), None);
                    state.per_call_cache.insert(name.clone(), tools);
                    connected += 1;
                }
                Err(e) => {
                    warn!(server = %name, error = %e, "connect_all: server connect failed");
                    errors.push((name, e.to_string()));
                }
            }
        }

        Ok((connected, errors))
    }

    /// Snapshots the client map, lists tools for each server outside the
    /// lock, then installs adapters into `registry` under the lock.
    pub async fn register_tools(&self, registry: &Arc<Registry>) {
        struct Snapshot {
            name: String,
            spec: Arc<ServerSpec>,
            lifecycle: Lifecycle,
            client: Option<SharedClient>,
            cached_tools: Option<Vec<ToolInfo>>,
        }

        let snapshots: Vec<Snapshot> = {
            let mut state = self.state.lock().unwrap();
            let names: Vec<String> = state.specs.keys().cloned().collect();
            names
                .into_iter()
                .map(|name| {
                    let spec = state.specs.get(&name).unwrap().clone();
                    let client = state.clients.get(&name).cloned().flatten();
                    let cached_tools = state.per_call_cache.remove(&name);
                    Snapshot {
                        name,
                        lifecycle: spec.lifecycle,
                        spec,
                        client,
                        cached_tools,
                    }
                })
                .collect()
        };

        for snap in snapshots {
            let tools = match (snap.lifecycle, snap.client.clone(), snap.cached_tools) {
                (Lifecycle::PerCall, _, Some(cached)) => cached,
                (Lifecycle::Persistent, Some(client), _) => {
                    match client.lock().await.list_tools(CONNECT_DEADLINE).await {
                        Ok(tools) => tools,
                        Err(e) => {
                            warn!(server = %snap.name, error = %e, "register_tools: list_tools failed");
                            continue;
                        }
                    }
                }
                _ => continue,
            };

            let names = install_tools(
                registry,
                &snap.name,
                snap.spec.clone(),
                snap.lifecycle,
                snap.client,
                tools,
            );

            let mut state = self.state.lock().unwrap();
            state.registered_names.insert(snap.name, names);
        }
    }

    /// Diff-driven hot update. Returns a human-readable summary on success;
    /// fails only when the new config cannot be loaded/parsed.
    pub async fn reload(&self, registry: &Arc<Registry>) -> Result<String, FabricError> {
        let new_specs = toolfabric_config::load_config(&self.config_path)?;

        let (to_remove, to_add, unchanged_count) = {
            let state = self.state.lock().unwrap();
            let current: HashSet<String> = state.specs.keys().cloned().collect();
            let incoming: HashSet<String> = new_specs.keys().cloned().collect();
            let mut to_remove: Vec<String> = current.difference(&incoming).cloned().collect();
            let mut to_add: Vec<String> = incoming.difference(&current).cloned().collect();
            let unchanged_count = current.intersection(&incoming).count();
            to_remove.sort();
            to_add.sort();
            (to_remove, to_add, unchanged_count)
        };

        let mut notices = Vec::new();

        // Remove strictly precedes add registration: a name freed here may
        // be reused below in the same pass.
        for name in &to_remove {
            let (client, names) = {
                let mut state = self.state.lock().unwrap();
                let client = state.clients.remove(name).flatten();
                let names = state.registered_names.remove(name).unwrap_or_default();
                state.specs.remove(name);
                state.per_call_cache.remove(name);
                (client, names)
            };
            for tool_name in names {
                registry.unregister(&tool_name);
            }
            if let Some(client) = client {
                client.lock().await.close().await;
            }
        }

        let mut successful_adds = Vec::new();
        for name in &to_add {
            let spec = &new_specs[name];
            if let Err(e) = spec.validate() {
                notices.push(format!("[WARNING] server '{name}' has an invalid spec: {e}"));
                continue;
            }

            if spec.transport == toolfabric_config::Transport::Stdio {
                if let Some(script) = find_script(spec) {
                    match scanner::scan(std::path::Path::new(&script)) {
                        Err(e) => {
                            notices.push(format!(
                                "[WARNING] server '{name}' scan of '{script}' failed: {e}"
                            ));
                        }
                        Ok(findings) => {
                            let today = chrono::Local::now().date_naive().to_string();
                            if scanner::has_critical(&findings) {
                                let mut lines =
                                    vec![format!("[BLOCKED] server '{name}' script '{script}':")];
                                for finding in findings
                                    .iter()
                                    .filter(|f| f.severity == scanner::Severity::Critical)
                                {
                                    lines.push(format!(
                                        "    [{}] line {}: {}",
                                        finding.rule_id, finding.line_number, finding.snippet
                                    ));
                                }
                                notices.push(lines.join("\n"));

                                let mut kv = std::collections::BTreeMap::new();
                                kv.insert("scan_result".to_string(), "blocked".to_string());
                                kv.insert("scanned_at".to_string(), today);
                                update_server_meta(&self.config_path, name, &kv);
                                continue;
                            }

                            let scan_result = if findings.is_empty() { "clean" } else { "warning" };
                            let mut kv = std::collections::BTreeMap::new();
                            kv.insert("scan_result".to_string(), scan_result.to_string());
                            kv.insert("scanned_at".to_string(), today);
                            update_server_meta(&self.config_path, name, &kv);
                        }
                    }
                }
            }

            let spec_arc = Arc::new(spec.clone());
            match probe(&spec_arc, CONNECT_DEADLINE, true).await {
                Ok(ProbeResult::Persistent { client, tools }) => {
                    successful_adds.push(SuccessfulAdd {
                        name: name.clone(),
                        spec: spec_arc,
                        lifecycle: Lifecycle::Persistent,
                        client: Some(client),
                        tools: tools.unwrap_or_default(),
                    });
                }
                Ok(ProbeResult::PerCall { tools }) => {
                    successful_adds.push(SuccessfulAdd {
                        name: name.clone(),
                        spec: spec_arc,
                        lifecycle: Lifecycle::PerCall,
                        client: None,
                        tools,
                    });
                }
                Err(e) => {
                    notices.push(format!("[WARNING] server '{name}' connect/list failed: {e}"));
                }
            }
        }

        let added_count = successful_adds.len();
        for add in successful_adds {
            let names = install_tools(
                registry,
                &add.name,
                add.spec.clone(),
                add.lifecycle,
                add.client.clone(),
                add.tools,
            );
            let mut state = self.state.lock().unwrap();
            state.specs.insert(add.name.clone(), add.spec);
            state.clients.insert(add.name.clone(), add.client);
            state.registered_names.insert(add.name, names);
        }

        if let Some(invalidator) = self.prompt_invalidator.lock().unwrap().clone() {
            invalidator().await;
            notices.push("Prompt cache cleared.".to_string());
        }

        let hooks = self.hooks.lock().unwrap().clone();
        for hook in hooks {
            let notice = hook(registry).await;
            if !notice.is_empty() {
                notices.push(notice);
            }
        }

        let mut summary = format!(
            "MCP reload: +{added_count} connected, -{removed} removed, {unchanged_count} unchanged",
            removed = to_remove.len(),
        );
        for notice in notices {
            summary.push('\n');
            summary.push_str(&notice);
        }

        info!(added = added_count, removed = to_remove.len(), unchanged = unchanged_count, "reload complete");
        Ok(summary)
    }

    /// Snapshots and empties the client map under the lock; closes every
    /// snapshotted client outside the lock. Idempotent: a second call
    /// closes an already-empty snapshot and returns cleanly.
    pub async fn close_all(&self) {
        let clients: Vec<SharedClient> = {
            let mut state = self.state.lock().unwrap();
            state.clients.drain().filter_map(|(_, c)| c).collect()
        };
        for client in clients {
            client.lock().await.close().await;
        }
    }
}

async fn probe(
    spec: &ServerSpec,
    deadline: Duration,
    list_for_persistent: bool,
) -> Result<ProbeResult, FabricError> {
    let mut client = build_client(spec)?;
    client.connect(deadline).await?;
    match spec.lifecycle {
        Lifecycle::Persistent => {
            let tools = if list_for_persistent {
                Some(client.list_tools(deadline).await?)
            } else {
                None
            };
            Ok(ProbeResult::Persistent {
                client: Arc::new(AsyncMutex::new(client)),
                tools,
            })
        }
        Lifecycle::PerCall => {
            let tools = client.list_tools(deadline).await?;
            client.close().await;
            Ok(ProbeResult::PerCall { tools })
        }
    }
}

/// Scans `command` then each `arg`, left-to-right, for the first token
/// ending in `.py`, `.ts`, or `.js`.
fn find_script(spec: &ServerSpec) -> Option<String> {
    let has_script_suffix = |s: &str| s.ends_with(".py") || s.ends_with(".ts") || s.ends_with(".js");
    if let Some(command) = &spec.command {
        if has_script_suffix(command) {
            return Some(command.clone());
        }
    }
    spec.args.iter().find(|a| has_script_suffix(a)).cloned()
}

fn install_tools(
    registry: &Arc<Registry>,
    server_name: &str,
    spec: Arc<ServerSpec>,
    lifecycle: Lifecycle,
    client: Option<SharedClient>,
    tools: Vec<ToolInfo>,
) -> Vec<String> {
    let mut names = Vec::with_capacity(tools.len());
    for tool in tools {
        let qualified = qualified_tool_name(server_name, &tool.name);
        let adapter = ToolAdapter::new(server_name.to_string(), tool, spec.clone(), lifecycle, client.clone());
        registry.register(Arc::new(adapter));
        names.push(qualified);
    }
    debug_assert!(names.iter().all(|n| n.starts_with(&server_prefix(server_name))));
    names
}
