use std::path::PathBuf;

use clap::Parser;

/// Stream a chat completion from a configured provider
#[derive(Debug, Parser)]
#[command(name = "chatstream", about = "Streaming chat completions over OpenAI, Anthropic and Bedrock")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "chatstream.toml", env = "CHATSTREAM_CONFIG")]
    pub config: PathBuf,

    /// Provider name; defaults to the configured default provider
    #[arg(short, long, env = "CHATSTREAM_PROVIDER")]
    pub provider: Option<String>,

    /// Model override
    #[arg(short, long, env = "CHATSTREAM_MODEL")]
    pub model: Option<String>,

    /// System instruction
    #[arg(short, long)]
    pub system: Option<String>,

    /// Skip reasoning for this request
    #[arg(long)]
    pub no_reasoning: bool,

    /// List the provider's models and exit
    #[arg(long)]
    pub list_models: bool,

    /// Log filter, e.g. "debug" or "chatstream_llm=trace"
    #[arg(long, default_value = "warn", env = "CHATSTREAM_LOG")]
    pub log: String,

    /// Prompt text
    #[arg(required_unless_present = "list_models")]
    pub prompt: Vec<String>,
}
