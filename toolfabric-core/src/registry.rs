//! Registry — a thread-safe name→tool map with view-overlay semantics.
//!
//! A view returned by [`Registry::with_extra`] does not copy the parent's
//! map: it holds a live `Arc` back to the parent, so mutations on the
//! parent (an unregister during reload) are observable through every
//! outstanding view immediately.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;

use crate::types::ToolResult;

/// Interface satisfied by every registry entry — built-in or MCP adapter.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> &Value;

    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn execute(&self, deadline: std::time::Duration, args_json: &str) -> ToolResult;

    async fn close(&self) {}
}

/// A name→tool map, optionally overlaying a parent registry.
pub struct Registry {
    own: RwLock<HashMap<String, Arc<dyn Tool>>>,
    parent: Option<Arc<Registry>>,
}

impl Registry {
    pub fn new() -> Arc<Registry> {
        Arc::new(Registry {
            own: RwLock::new(HashMap::new()),
            parent: None,
        })
    }

    /// Upsert. Logs a warning when overwriting an existing entry at this
    /// level (not the parent's).
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let mut own = self.own.write();
        if own.contains_key(&name) {
            warn!(tool = %name, "registry: overwriting existing tool registration");
        }
        own.insert(name, tool);
    }

    /// Deletes from this level's own map only.
    pub fn unregister(&self, name: &str) {
        self.own.write().remove(name);
    }

    /// Returns the overlay hit if present; otherwise delegates to the
    /// parent; otherwise a miss.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        if let Some(tool) = self.own.read().get(name).cloned() {
            return Some(tool);
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Sorted by qualified name. For a view, merges the parent's list with
    /// this level's extras, with extras shadowing parent entries of the
    /// same name.
    pub fn list(&self) -> Vec<Arc<dyn Tool>> {
        let mut merged: HashMap<String, Arc<dyn Tool>> = match &self.parent {
            Some(parent) => parent
                .list()
                .into_iter()
                .map(|t| (t.name().to_string(), t))
                .collect(),
            None => HashMap::new(),
        };
        for (name, tool) in self.own.read().iter() {
            merged.insert(name.clone(), tool.clone());
        }
        let mut tools: Vec<Arc<dyn Tool>> = merged.into_values().collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    /// Returns a view over `self`: a non-owning overlay whose own map holds
    /// only `tools`, delegating every other read to `self`. Views may be
    /// chained (view-of-view).
    pub fn with_extra(self: &Arc<Self>, tools: Vec<Arc<dyn Tool>>) -> Arc<Registry> {
        let mut own = HashMap::new();
        for tool in tools {
            own.insert(tool.name().to_string(), tool);
        }
        Arc::new(Registry {
            own: RwLock::new(own),
            parent: Some(self.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubTool {
        name: String,
        schema: Value,
    }

    impl StubTool {
        fn new(name: &str) -> Arc<dyn Tool> {
            Arc::new(StubTool {
                name: name.to_string(),
                schema: Value::Null,
            })
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn input_schema(&self) -> &Value {
            &self.schema
        }
        async fn execute(&self, _deadline: std::time::Duration, _args_json: &str) -> ToolResult {
            ToolResult::Output("ok".to_string())
        }
    }

    #[test]
    fn register_then_get() {
        let root = Registry::new();
        root.register(StubTool::new("mcp_x__y"));
        assert!(root.get("mcp_x__y").is_some());
        assert!(root.get("missing").is_none());
    }

    #[test]
    fn unregister_removes() {
        let root = Registry::new();
        root.register(StubTool::new("mcp_x__y"));
        root.unregister("mcp_x__y");
        assert!(root.get("mcp_x__y").is_none());
    }

    #[test]
    fn list_is_sorted() {
        let root = Registry::new();
        root.register(StubTool::new("mcp_b__t"));
        root.register(StubTool::new("mcp_a__t"));
        let binding = root.list();
        let names: Vec<&str> = binding.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["mcp_a__t", "mcp_b__t"]);
    }

    #[test]
    fn view_sees_root_mutations_through_a_live_parent_link() {
        let root = Registry::new();
        let extra = StubTool::new("mcp_x__extra");
        let view = root.with_extra(vec![extra.clone()]);

        assert!(Arc::ptr_eq(&view.get("mcp_x__extra").unwrap(), &extra));

        // delegates to root, and root mutations are visible through the view
        root.register(StubTool::new("mcp_x__root_tool"));
        assert!(view.get("mcp_x__root_tool").is_some());

        root.unregister("mcp_x__root_tool");
        assert!(
            view.get("mcp_x__root_tool").is_none(),
            "unregister on root must be observable via an outstanding view"
        );
    }

    #[test]
    fn view_extras_shadow_parent_entries_of_same_name() {
        let root = Registry::new();
        root.register(StubTool::new("mcp_x__y"));
        let shadow = StubTool::new("mcp_x__y");
        let view = root.with_extra(vec![shadow.clone()]);
        assert!(Arc::ptr_eq(&view.get("mcp_x__y").unwrap(), &shadow));
    }

    #[test]
    fn chained_views() {
        let root = Registry::new();
        root.register(StubTool::new("mcp_a__t"));
        let v1 = root.with_extra(vec![StubTool::new("mcp_b__t")]);
        let v2 = v1.with_extra(vec![StubTool::new("mcp_c__t")]);
        assert!(v2.get("mcp_a__t").is_some());
        assert!(v2.get("mcp_b__t").is_some());
        assert!(v2.get("mcp_c__t").is_some());
    }

    #[tokio::test]
    async fn execute_runs_through_registry_lookup() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        struct Counting {
            schema: Value,
        }
        #[async_trait]
        impl Tool for Counting {
            fn name(&self) -> &str {
                "mcp_x__count"
            }
            fn description(&self) -> &str {
                ""
            }
            fn input_schema(&self) -> &Value {
                &self.schema
            }
            async fn execute(&self, _d: std::time::Duration, _a: &str) -> ToolResult {
                CALLS.fetch_add(1, Ordering::SeqCst);
                ToolResult::Output("done".to_string())
            }
        }
        let root = Registry::new();
        root.register(Arc::new(Counting { schema: Value::Null }));
        let tool = root.get("mcp_x__count").unwrap();
        let result = tool.execute(std::time::Duration::from_secs(1), "{}").await;
        assert_eq!(result, ToolResult::Output("done".to_string()));
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }
}
