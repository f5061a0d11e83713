//! [`TextGenerator`] backed by `edgequake-llm`.

use super::{GenerationOptions, Message, Role, TextGenerator};
use crate::config::TextModelConfig;
use crate::error::{PodcastError, ProviderError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Wraps an `edgequake-llm` chat provider with a per-call timeout.
pub struct EdgequakeGenerator {
    provider: Arc<dyn LLMProvider>,
    label: String,
    timeout_secs: u64,
}

impl EdgequakeGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            provider,
            label: label.into(),
            timeout_secs,
        }
    }
}

#[async_trait]
impl TextGenerator for EdgequakeGenerator {
    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let chat: Vec<ChatMessage> = messages.iter().map(to_chat_message).collect();
        let opts = CompletionOptions {
            temperature: Some(options.temperature),
            max_tokens: Some(options.max_tokens),
            ..Default::default()
        };

        let start = Instant::now();
        let call = self.provider.chat(&chat, Some(&opts));
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| ProviderError::Timeout {
                provider: self.label.clone(),
                secs: self.timeout_secs,
            })?
            .map_err(|e| ProviderError::Transport {
                provider: self.label.clone(),
                detail: e.to_string(),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.label,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

fn to_chat_message(m: &Message) -> ChatMessage {
    match m.role {
        Role::System => ChatMessage::system(m.content.as_str()),
        Role::User => ChatMessage::user(m.content.as_str()),
        Role::Assistant => ChatMessage::assistant(m.content.as_str()),
    }
}

/// Resolve a text provider, from most-specific to least-specific.
///
/// 1. **Named provider + model** (`model.provider`) — built through
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key (`OPENAI_API_KEY`, etc.) from the environment.
/// 2. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 3. **OpenAI** when `OPENAI_API_KEY` is set.
/// 4. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_generator(
    model: &TextModelConfig,
    timeout_secs: u64,
) -> Result<Arc<dyn TextGenerator>, PodcastError> {
    let model_name = model.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = model.provider {
        return named(name, model_name, timeout_secs);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return named(&prov, &env_model, timeout_secs);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return named("openai", model_name, timeout_secs);
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PodcastError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(Arc::new(EdgequakeGenerator::new(provider, "auto", timeout_secs)))
}

fn named(
    provider_name: &str,
    model: &str,
    timeout_secs: u64,
) -> Result<Arc<dyn TextGenerator>, PodcastError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PodcastError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(EdgequakeGenerator::new(
        provider,
        format!("{provider_name}/{model}"),
        timeout_secs,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_map_onto_chat_messages() {
        let msgs = [
            Message::system("rules"),
            Message::user("question"),
            Message::assistant("answer"),
        ];
        let chat: Vec<ChatMessage> = msgs.iter().map(to_chat_message).collect();
        assert_eq!(chat.len(), 3);
    }
}
