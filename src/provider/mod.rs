//! Provider gateway: the two seams through which the pipeline talks to models.
//!
//! * [`TextGenerator`] — ordered chat messages in, generated text out.
//!   Backed by `edgequake-llm` in [`llm`].
//! * [`SpeechSynthesizer`] — one utterance in, one audio file on disk out.
//!   Backed by HTTP speech endpoints in [`speech`].
//!
//! Stages only see the traits. Which concrete provider sits behind them is
//! decided once per run by [`resolve_text_generators`] and
//! [`resolve_synthesizer`], and pre-built instances on the config always win.

pub mod llm;
pub mod mock;
pub mod speech;

use crate::config::PodcastConfig;
use crate::error::{PodcastError, ProviderError};
use crate::pipeline::audio::AudioFormat;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Text ─────────────────────────────────────────────────────────

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message sent to a text model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling options for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: usize,
    pub temperature: f32,
}

/// Text model behind stages 1–3.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send `messages` in order and return the model's text reply.
    async fn generate(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<String, ProviderError>;

    /// Human-readable provider name.
    fn name(&self) -> &str;
}

// ── Speech ───────────────────────────────────────────────────────

/// Speech model behind stage 4.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice` and write it next to `output_stem`.
    ///
    /// The file extension is chosen from `format`; the returned path is the
    /// file actually written. Implementations must return
    /// [`ProviderError::MissingOutput`] if no file exists afterwards.
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        format: &AudioFormat,
        output_stem: &Path,
    ) -> Result<PathBuf, ProviderError>;

    /// Human-readable provider name.
    fn name(&self) -> &str;
}

// ── Resolution ───────────────────────────────────────────────────

/// Small and big text generators for one run.
#[derive(Clone)]
pub struct TextGenerators {
    pub small: Arc<dyn TextGenerator>,
    pub big: Arc<dyn TextGenerator>,
}

/// Resolve the small (stage 1) and big (stages 2–3) generators.
///
/// Only the generators the run will actually call are resolved, so resuming
/// at stage 4 needs no text provider at all.
pub fn resolve_text_generators(
    config: &PodcastConfig,
    need_small: bool,
    need_big: bool,
) -> Result<Option<TextGenerators>, PodcastError> {
    if !need_small && !need_big {
        return Ok(None);
    }
    let small = match (&config.small_generator, need_small) {
        (Some(g), _) => Arc::clone(g),
        (None, true) => llm::resolve_generator(&config.small_text_model, config.api_timeout_secs)?,
        (None, false) => Arc::new(Unavailable),
    };
    let big = match (&config.big_generator, need_big) {
        (Some(g), _) => Arc::clone(g),
        (None, true) => llm::resolve_generator(&config.big_text_model, config.api_timeout_secs)?,
        (None, false) => Arc::new(Unavailable),
    };
    Ok(Some(TextGenerators { small, big }))
}

/// Resolve the speech synthesizer named in `config.speech`.
pub fn resolve_synthesizer(
    config: &PodcastConfig,
) -> Result<Arc<dyn SpeechSynthesizer>, PodcastError> {
    if let Some(ref s) = config.synthesizer {
        return Ok(Arc::clone(s));
    }
    speech::from_config(&config.speech, config.api_timeout_secs)
        .map(Arc::from)
        .map_err(|e| match e {
            ProviderError::NotConfigured { provider, hint } => {
                PodcastError::ProviderNotConfigured { provider, hint }
            }
            other => PodcastError::ProviderNotConfigured {
                provider: config.speech.provider.to_string(),
                hint: other.to_string(),
            },
        })
}

/// Stand-in for a generator the current run never calls.
struct Unavailable;

#[async_trait]
impl TextGenerator for Unavailable {
    async fn generate(
        &self,
        _messages: &[Message],
        _options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::NotConfigured {
            provider: "none".into(),
            hint: "no text model was resolved for this stage".into(),
        })
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}
