use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::post::Post;
use super::store::Tools;

/// Completion request in vendor-neutral form
#[derive(Debug, Default)]
pub struct CompletionRequest {
    /// Conversation so far, oldest first
    pub posts: Vec<Post>,
    /// Request-scoped collaborators
    pub context: Context,
}

impl CompletionRequest {
    /// Request without tools
    pub fn new(posts: Vec<Post>) -> Self {
        Self {
            posts,
            context: Context::default(),
        }
    }

    /// Attach a tool registry
    #[must_use]
    pub fn with_tools(mut self, tools: Arc<dyn Tools>) -> Self {
        self.context.tools = Some(tools);
        self
    }

    /// Identify the user the request is made for
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.context.requesting_user_id = Some(user_id.into());
        self
    }
}

/// Request-scoped collaborators handed to tools
#[derive(Clone, Default)]
pub struct Context {
    /// Tools the model may call
    pub tools: Option<Arc<dyn Tools>>,
    /// User the request is made for
    pub requesting_user_id: Option<String>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("tools", &self.tools.as_ref().map(|t| t.get_tools().len()))
            .field("requesting_user_id", &self.requesting_user_id)
            .finish()
    }
}

/// A model offered by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier used in requests
    pub id: String,
    /// Human-readable name
    pub display_name: String,
}
