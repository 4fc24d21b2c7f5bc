use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;

use super::request::Context;
use super::tool::{Tool, ToolArguments, ToolInfo};
use crate::error::ToolError;

/// Registry of tools available to a request
///
/// Shared read-only across requests; the engine only ever reads from it
/// and resolves calls through it.
#[async_trait]
pub trait Tools: Send + Sync {
    /// Every registered tool
    fn get_tools(&self) -> Vec<Tool>;

    /// Look up a tool by name
    fn get_tool(&self, name: &str) -> Option<Tool>;

    /// Resolve a call by tool name
    async fn resolve_tool(&self, name: &str, arguments: ToolArguments, context: &Context)
    -> Result<String, ToolError>;
}

/// Authentication failure recorded while building tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolAuthError {
    /// Server whose tools could not be loaded
    pub server_name: String,
    /// Where the user can authenticate
    pub auth_url: String,
    /// What went wrong
    pub error: String,
}

/// In-memory tool registry
#[derive(Debug, Default)]
pub struct ToolStore {
    tools: IndexMap<String, Tool>,
    trace: bool,
    auth_errors: Vec<ToolAuthError>,
}

impl ToolStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store that logs every resolution with its arguments
    pub fn with_tracing() -> Self {
        Self {
            trace: true,
            ..Self::default()
        }
    }

    /// Register tools, replacing any with the same name
    pub fn add_tools(&mut self, tools: impl IntoIterator<Item = Tool>) {
        for tool in tools {
            self.tools.insert(tool.name.clone(), tool);
        }
    }

    /// Names and descriptions of every registered tool
    pub fn get_tools_info(&self) -> Vec<ToolInfo> {
        self.tools.values().map(Tool::info).collect()
    }

    /// Record an authentication failure
    pub fn add_auth_error(&mut self, error: ToolAuthError) {
        self.auth_errors.push(error);
    }

    /// Authentication failures recorded while building tools
    pub fn auth_errors(&self) -> &[ToolAuthError] {
        &self.auth_errors
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl Tools for ToolStore {
    fn get_tools(&self) -> Vec<Tool> {
        self.tools.values().cloned().collect()
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.get(name).cloned()
    }

    async fn resolve_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
        context: &Context,
    ) -> Result<String, ToolError> {
        let Some(tool) = self.tools.get(name) else {
            if self.trace {
                tracing::info!(tool = %name, arguments = %arguments.raw(), "unknown tool called");
            }
            return Err(ToolError::UnknownTool(name.to_owned()));
        };

        let raw = self.trace.then(|| arguments.raw().to_owned());
        let result = tool.resolve(context, arguments).await;

        if let Some(raw) = raw {
            match &result {
                Ok(output) => tracing::info!(tool = %name, arguments = %raw, result = %output, "tool resolved"),
                Err(e) => tracing::info!(tool = %name, arguments = %raw, error = %e, "tool resolved"),
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn tool(name: &str, description: &str) -> Tool {
        let reply = name.to_owned();
        Tool::from_fn(name, description, json!({"type": "object"}), move |_, _| {
            let reply = reply.clone();
            async move { Ok(reply) }
        })
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut store = ToolStore::new();
        store.add_tools([tool("search", "v1"), tool("lookup", "lookup users")]);
        store.add_tools([tool("search", "v2")]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get_tool("search").unwrap().description, "v2");
        assert!(store.get_tool("missing").is_none());
    }

    #[test]
    fn tools_info_keeps_registration_order() {
        let mut store = ToolStore::new();
        store.add_tools([tool("b", "second"), tool("a", "first")]);

        let names: Vec<_> = store.get_tools_info().into_iter().map(|info| info.name).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let store = ToolStore::with_tracing();
        let err = store
            .resolve_tool("nope", ToolArguments::new("{}"), &Context::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "unknown tool nope");
    }

    #[tokio::test]
    async fn resolves_registered_tool() {
        let mut store = ToolStore::with_tracing();
        store.add_tools([tool("search", "Search")]);

        let output = store
            .resolve_tool("search", ToolArguments::new("{}"), &Context::default())
            .await
            .unwrap();
        assert_eq!(output, "search");
    }

    #[test]
    fn records_auth_errors() {
        let mut store = ToolStore::new();
        store.add_auth_error(ToolAuthError {
            server_name: "github".into(),
            auth_url: "https://example.com/oauth".into(),
            error: "token expired".into(),
        });

        assert_eq!(store.auth_errors().len(), 1);
        assert!(store.is_empty());
    }
}
