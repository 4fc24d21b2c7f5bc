use std::path::Path;

use crate::{Config, LlmProviderType};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is configured or a provider
    /// configuration is invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.providers.is_empty() {
            anyhow::bail!("at least one LLM provider must be configured");
        }

        if let Some(default) = &self.llm.default_provider
            && !self.llm.providers.contains_key(default)
        {
            anyhow::bail!("default_provider '{default}' is not a configured provider");
        }

        self.validate_providers()?;

        if let Some(rate) = self.telemetry.as_ref().and_then(|t| t.tracing.as_ref()).map(|t| t.sampling_rate)
            && !(0.0..=1.0).contains(&rate)
        {
            anyhow::bail!("telemetry.tracing.sampling_rate must be between 0.0 and 1.0");
        }

        Ok(())
    }

    /// Validate per-provider settings
    fn validate_providers(&self) -> anyhow::Result<()> {
        for (name, provider) in &self.llm.providers {
            if provider.default_model.trim().is_empty() {
                anyhow::bail!("provider '{name}' must set default_model");
            }

            provider
                .streaming_timeout()
                .map_err(|e| anyhow::anyhow!("provider '{name}': {e}"))?;

            match &provider.provider_type {
                LlmProviderType::OpenaiCompatible | LlmProviderType::Azure if provider.base_url.is_none() => {
                    anyhow::bail!("provider '{name}' requires base_url");
                }
                LlmProviderType::Bedrock(bedrock)
                    if bedrock.access_key_id.is_some() != bedrock.secret_access_key.is_some() =>
                {
                    anyhow::bail!(
                        "provider '{name}': access_key_id and secret_access_key must be configured together"
                    );
                }
                _ => {}
            }

            if provider.output_token_limit == Some(0) {
                anyhow::bail!("provider '{name}': output_token_limit must be greater than 0");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use secrecy::ExposeSecret;

    use crate::{Config, DEFAULT_STREAMING_TIMEOUT, LlmProviderType, NativeTool, ReasoningEffort};

    #[test]
    fn parses_all_provider_types() {
        let config = Config::parse(
            r#"
            [llm]
            default_provider = "claude"

            [llm.providers.gpt]
            type = "openai"
            api_key = "sk-test"
            default_model = "gpt-4o"

            [llm.providers.gpt.openai]
            use_responses_api = true

            [llm.providers.gpt.embeddings]
            model = "text-embedding-3-small"
            dimensions = 512

            [llm.providers.claude]
            type = "anthropic"
            default_model = "claude-sonnet-4-20250514"
            enabled_native_tools = ["web_search"]

            [llm.providers.claude.reasoning]
            enabled = true
            thinking_budget = 4096

            [llm.providers.aws]
            type = { bedrock = { region = "us-west-2" } }
            default_model = "anthropic.claude-3-5-sonnet-20241022-v2:0"
            streaming_timeout = "45s"
            "#,
        )
        .unwrap();

        let (name, claude) = config.llm.provider(None).unwrap();
        assert_eq!(name, "claude");
        assert!(claude.native_tool_enabled(NativeTool::WebSearch));
        assert_eq!(claude.reasoning.thinking_budget, Some(4096));
        assert_eq!(claude.reasoning.effort, ReasoningEffort::Medium);

        let (_, gpt) = config.llm.provider(Some("gpt")).unwrap();
        assert!(gpt.openai.use_responses_api);
        assert_eq!(gpt.api_key.as_ref().unwrap().expose_secret(), "sk-test");
        assert_eq!(gpt.streaming_timeout().unwrap(), Some(DEFAULT_STREAMING_TIMEOUT));
        assert_eq!(gpt.embeddings.model.as_deref(), Some("text-embedding-3-small"));
        assert_eq!(gpt.embeddings.dimensions, Some(512));
        assert!(claude.embeddings.model.is_none());

        let (_, aws) = config.llm.provider(Some("aws")).unwrap();
        assert!(matches!(&aws.provider_type, LlmProviderType::Bedrock(b) if b.region == "us-west-2"));
        assert_eq!(aws.streaming_timeout().unwrap(), Some(Duration::from_secs(45)));
    }

    #[test]
    fn zero_timeout_disables_watchdog() {
        let config = Config::parse(
            r#"
            [llm.providers.local]
            type = "openai_compatible"
            base_url = "http://localhost:11434/v1"
            default_model = "llama3"
            streaming_timeout = "0s"
            "#,
        )
        .unwrap();

        let (_, local) = config.llm.provider(None).unwrap();
        assert_eq!(local.streaming_timeout().unwrap(), None);
    }

    #[test]
    fn requires_a_provider() {
        let err = Config::parse("").unwrap_err();
        assert!(err.to_string().contains("at least one LLM provider"));
    }

    #[test]
    fn rejects_unknown_default_provider() {
        let err = Config::parse(
            r#"
            [llm]
            default_provider = "missing"

            [llm.providers.gpt]
            type = "openai"
            default_model = "gpt-4o"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("default_provider 'missing'"));
    }

    #[test]
    fn compatible_provider_requires_base_url() {
        let err = Config::parse(
            r#"
            [llm.providers.local]
            type = "openai_compatible"
            default_model = "llama3"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires base_url"));
    }

    #[test]
    fn bedrock_credentials_must_be_paired() {
        let err = Config::parse(
            r#"
            [llm.providers.aws]
            type = { bedrock = { region = "us-east-1", access_key_id = "AKIA" } }
            default_model = "amazon.nova-pro-v1:0"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be configured together"));
    }

    #[test]
    fn rejects_invalid_timeout() {
        let err = Config::parse(
            r#"
            [llm.providers.gpt]
            type = "openai"
            default_model = "gpt-4o"
            streaming_timeout = "soon"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid streaming_timeout"));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = Config::parse(
            r#"
            [llm.providers.gpt]
            type = "openai"
            default_model = "gpt-4o"
            temperature = 0.2
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn loads_from_file_with_env_expansion() {
        temp_env::with_var("CHATSTREAM_LOADER_KEY", Some("sk-from-env"), || {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(
                file,
                "[llm.providers.gpt]\ntype = \"openai\"\ndefault_model = \"gpt-4o\"\napi_key = \"{{{{ env.CHATSTREAM_LOADER_KEY }}}}\""
            )
            .unwrap();

            let config = Config::load(file.path()).unwrap();
            let (_, gpt) = config.llm.provider(None).unwrap();
            assert_eq!(gpt.api_key.as_ref().unwrap().expose_secret(), "sk-from-env");
        });
    }
}
