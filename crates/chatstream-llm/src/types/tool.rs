use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::request::Context;
use crate::error::ToolError;

/// Implementation behind a tool
#[async_trait]
pub trait ToolResolver: Send + Sync {
    /// Run the tool with the model-supplied arguments
    async fn resolve(&self, context: &Context, arguments: ToolArguments) -> Result<String, ToolError>;
}

/// Arguments handed to a tool resolver
///
/// Holds the model's raw JSON plus an overlay of bound values. Bound values
/// are merged over the model's object before deserialization, so they
/// always win.
#[derive(Debug, Clone, Default)]
pub struct ToolArguments {
    raw: String,
    bound: Map<String, Value>,
}

impl ToolArguments {
    /// Wrap raw JSON arguments from the model
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            bound: Map::new(),
        }
    }

    /// The model's JSON exactly as received
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Merged arguments as a JSON value
    pub fn value(&self) -> Result<Value, ToolError> {
        let mut value = if self.raw.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&self.raw)?
        };

        if !self.bound.is_empty() {
            match &mut value {
                Value::Object(map) => {
                    for (key, bound) in &self.bound {
                        map.insert(key.clone(), bound.clone());
                    }
                }
                other => *other = Value::Object(self.bound.clone()),
            }
        }

        Ok(value)
    }

    /// Deserialize merged arguments into `T`
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        Ok(serde_json::from_value(self.value()?)?)
    }

    fn bind(mut self, values: &Map<String, Value>) -> Self {
        for (key, value) in values {
            self.bound.insert(key.clone(), value.clone());
        }
        self
    }
}

/// A function the model can call
#[derive(Clone)]
pub struct Tool {
    /// Tool name shown to the model
    pub name: String,
    /// What the tool does
    pub description: String,
    /// JSON Schema of the arguments
    pub schema: Value,
    resolver: Arc<dyn ToolResolver>,
}

impl Tool {
    /// Create a tool backed by a resolver
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        resolver: impl ToolResolver + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            resolver: Arc::new(resolver),
        }
    }

    /// Create a tool backed by an async closure
    pub fn from_fn<F, Fut>(name: impl Into<String>, description: impl Into<String>, schema: Value, f: F) -> Self
    where
        F: Fn(Context, ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self::new(name, description, schema, FnResolver(f))
    }

    /// Run the tool
    pub async fn resolve(&self, context: &Context, arguments: ToolArguments) -> Result<String, ToolError> {
        self.resolver.resolve(context, arguments).await
    }

    /// Derive a tool with some arguments fixed
    ///
    /// The bound names disappear from the derived schema's `properties` and
    /// `required`, so the model never sees them, and the derived resolver
    /// injects the bound values before delegating. The original tool is left
    /// untouched.
    #[must_use]
    pub fn with_bound_params(&self, values: Map<String, Value>) -> Self {
        if values.is_empty() {
            return self.clone();
        }

        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            schema: remove_schema_properties(&self.schema, &values),
            resolver: Arc::new(BoundResolver {
                inner: Arc::clone(&self.resolver),
                values,
            }),
        }
    }

    /// Name and description only
    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Name and description of a tool, without its implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInfo {
    /// Tool name
    pub name: String,
    /// What the tool does
    pub description: String,
}

fn remove_schema_properties(schema: &Value, values: &Map<String, Value>) -> Value {
    let mut schema = schema.clone();

    if let Some(Value::Object(properties)) = schema.get_mut("properties") {
        properties.retain(|name, _| !values.contains_key(name));
    }

    if let Some(Value::Array(required)) = schema.get_mut("required") {
        required.retain(|name| name.as_str().is_none_or(|name| !values.contains_key(name)));
    }

    schema
}

struct FnResolver<F>(F);

#[async_trait]
impl<F, Fut> ToolResolver for FnResolver<F>
where
    F: Fn(Context, ToolArguments) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, ToolError>> + Send,
{
    async fn resolve(&self, context: &Context, arguments: ToolArguments) -> Result<String, ToolError> {
        (self.0)(context.clone(), arguments).await
    }
}

struct BoundResolver {
    inner: Arc<dyn ToolResolver>,
    values: Map<String, Value>,
}

#[async_trait]
impl ToolResolver for BoundResolver {
    async fn resolve(&self, context: &Context, arguments: ToolArguments) -> Result<String, ToolError> {
        self.inner.resolve(context, arguments.bind(&self.values)).await
    }
}
