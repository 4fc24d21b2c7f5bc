#![allow(dead_code)]

pub mod mock_llm;

use std::sync::Arc;

use chatstream_config::Config;
use chatstream_llm::{Embeddings, LanguageModel, TextStreamEvent, TextStreamResult, build_embeddings, build_language_model};

/// Build the language model for a single-provider TOML snippet
pub async fn language_model(provider_toml: &str) -> Arc<dyn LanguageModel> {
    let config = Config::parse(&format!("[llm.providers.mock]\n{provider_toml}")).unwrap();
    let (name, provider) = config.llm.provider(None).unwrap();
    build_language_model(name, provider).await.unwrap()
}

/// Build the embeddings client for a single-provider TOML snippet
pub fn embeddings(provider_toml: &str) -> Arc<dyn Embeddings> {
    let config = Config::parse(&format!("[llm.providers.mock]\n{provider_toml}")).unwrap();
    let (name, provider) = config.llm.provider(None).unwrap();
    build_embeddings(name, provider).unwrap()
}

/// Drain a stream into a list of events
pub async fn collect(mut result: TextStreamResult) -> Vec<TextStreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = result.recv().await {
        events.push(event);
    }
    events
}

/// Concatenated answer text of a drained stream
pub fn answer(events: &[TextStreamEvent]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            TextStreamEvent::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
