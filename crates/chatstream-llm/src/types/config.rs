use serde_json::Value;

/// Per-call settings, built from a provider default plus caller options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageModelConfig {
    /// Model identifier
    pub model: String,
    /// Maximum tokens the model may generate; zero leaves it to the vendor
    pub max_generated_tokens: u32,
    /// Hide tools from the model
    pub tools_disabled: bool,
    /// Skip reasoning even when the provider enables it
    pub reasoning_disabled: bool,
    /// Tool names that may run without user approval
    pub auto_run_tools: Vec<String>,
    /// JSON Schema the answer must follow
    pub json_output_format: Option<Value>,
}

impl LanguageModelConfig {
    /// Apply caller options in order
    #[must_use]
    pub fn apply(mut self, options: Vec<LanguageModelOption>) -> Self {
        for option in options {
            option(&mut self);
        }
        self
    }
}

/// Mutation applied over the provider's default config
pub type LanguageModelOption = Box<dyn FnOnce(&mut LanguageModelConfig) + Send>;

/// Override the model
pub fn with_model(model: impl Into<String>) -> LanguageModelOption {
    let model = model.into();
    Box::new(move |config| config.model = model)
}

/// Cap generated tokens
pub fn with_max_generated_tokens(max: u32) -> LanguageModelOption {
    Box::new(move |config| config.max_generated_tokens = max)
}

/// Hide tools from the model
pub fn with_tools_disabled() -> LanguageModelOption {
    Box::new(|config| config.tools_disabled = true)
}

/// Skip reasoning for this call
pub fn with_reasoning_disabled() -> LanguageModelOption {
    Box::new(|config| config.reasoning_disabled = true)
}

/// Constrain the answer to a JSON Schema
pub fn with_json_output(schema: Value) -> LanguageModelOption {
    Box::new(move |config| config.json_output_format = Some(schema))
}

/// Allow these tools to run without approval
pub fn with_auto_run_tools(names: impl IntoIterator<Item = impl Into<String>>) -> LanguageModelOption {
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    Box::new(move |config| config.auto_run_tools = names)
}
