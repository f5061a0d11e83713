//! HTTP speech synthesizers.
//!
//! Two wire shapes cover every supported provider:
//!
//! * OpenAI-compatible `POST {base}/audio/speech` — openai, lmstudio,
//!   ollama, groq, azure, and any custom endpoint speaking the same API.
//! * ElevenLabs `POST /v1/text-to-speech/{voice_id}`.
//!
//! Both stream the response body straight to disk.

use super::SpeechSynthesizer;
use crate::config::{SpeechConfig, SpeechProviderKind};
use crate::error::ProviderError;
use crate::pipeline::audio::AudioFormat;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const LMSTUDIO_BASE: &str = "http://localhost:1234/v1";
const OLLAMA_BASE: &str = "http://localhost:11434/v1";
const GROQ_BASE: &str = "https://api.groq.com/openai/v1";
const ELEVENLABS_BASE: &str = "https://api.elevenlabs.io/v1";

/// Build the synthesizer named by `config.provider`.
pub fn from_config(
    config: &SpeechConfig,
    timeout_secs: u64,
) -> Result<Box<dyn SpeechSynthesizer>, ProviderError> {
    let provider = config.provider.to_string();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::NotConfigured {
            provider: provider.clone(),
            hint: format!("HTTP client: {e}"),
        })?;
    let key = |var: &str| {
        config
            .api_key
            .clone()
            .or_else(|| std::env::var(var).ok().filter(|k| !k.is_empty()))
    };

    let synth: Box<dyn SpeechSynthesizer> = match config.provider {
        SpeechProviderKind::OpenAi => Box::new(OpenAiCompatibleSpeech::new(
            client,
            "openai",
            config.endpoint.as_deref().unwrap_or(OPENAI_BASE),
            &config.model,
            Auth::Bearer(require(key("OPENAI_API_KEY"), "openai", "OPENAI_API_KEY")?),
        )),
        SpeechProviderKind::LmStudio => Box::new(OpenAiCompatibleSpeech::new(
            client,
            "lmstudio",
            config.endpoint.as_deref().unwrap_or(LMSTUDIO_BASE),
            &config.model,
            Auth::Bearer(key("LMSTUDIO_API_KEY").unwrap_or_else(|| "lm-studio".into())),
        )),
        SpeechProviderKind::Ollama => Box::new(OpenAiCompatibleSpeech::new(
            client,
            "ollama",
            config.endpoint.as_deref().unwrap_or(OLLAMA_BASE),
            &config.model,
            Auth::Bearer(key("OLLAMA_API_KEY").unwrap_or_else(|| "ollama".into())),
        )),
        SpeechProviderKind::Groq => Box::new(OpenAiCompatibleSpeech::new(
            client,
            "groq",
            config.endpoint.as_deref().unwrap_or(GROQ_BASE),
            &config.model,
            Auth::Bearer(require(key("GROQ_API_KEY"), "groq", "GROQ_API_KEY")?),
        )),
        SpeechProviderKind::Azure => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| not_configured(
                "azure",
                "set speech.endpoint to the Azure OpenAI resource URL",
            ))?;
            let version = config.api_version.as_deref().ok_or_else(|| not_configured(
                "azure",
                "set speech.api_version (e.g. 2025-03-01-preview)",
            ))?;
            let key = require(key("AZURE_OPENAI_API_KEY"), "azure", "AZURE_OPENAI_API_KEY")?;
            Box::new(OpenAiCompatibleSpeech::azure(client, endpoint, &config.model, version, key))
        }
        SpeechProviderKind::Custom => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                not_configured("custom", "set speech.endpoint to the API base URL")
            })?;
            let auth = key("CUSTOM_API_KEY").map(Auth::Bearer).unwrap_or(Auth::None);
            Box::new(OpenAiCompatibleSpeech::new(client, "custom", endpoint, &config.model, auth))
        }
        SpeechProviderKind::ElevenLabs => Box::new(ElevenLabsSpeech {
            client,
            base: config
                .endpoint
                .clone()
                .unwrap_or_else(|| ELEVENLABS_BASE.to_string()),
            model: config.model.clone(),
            api_key: require(key("ELEVENLABS_API_KEY"), "elevenlabs", "ELEVENLABS_API_KEY")?,
        }),
    };
    Ok(synth)
}

fn not_configured(provider: &str, hint: &str) -> ProviderError {
    ProviderError::NotConfigured {
        provider: provider.to_string(),
        hint: hint.to_string(),
    }
}

fn require(key: Option<String>, provider: &str, var: &str) -> Result<String, ProviderError> {
    key.ok_or_else(|| not_configured(provider, &format!("set {var} or speech.api_key")))
}

enum Auth {
    Bearer(String),
    ApiKeyHeader(String),
    None,
}

/// Any endpoint speaking the OpenAI `audio/speech` API.
pub struct OpenAiCompatibleSpeech {
    client: reqwest::Client,
    label: String,
    url: String,
    model: String,
    auth: Auth,
}

impl OpenAiCompatibleSpeech {
    fn new(client: reqwest::Client, label: &str, base: &str, model: &str, auth: Auth) -> Self {
        Self {
            client,
            label: label.to_string(),
            url: format!("{}/audio/speech", base.trim_end_matches('/')),
            model: model.to_string(),
            auth,
        }
    }

    fn azure(client: reqwest::Client, endpoint: &str, deployment: &str, version: &str, key: String) -> Self {
        Self {
            client,
            label: "azure".to_string(),
            url: format!(
                "{}/openai/deployments/{deployment}/audio/speech?api-version={version}",
                endpoint.trim_end_matches('/')
            ),
            model: deployment.to_string(),
            auth: Auth::ApiKeyHeader(key),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiCompatibleSpeech {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        format: &AudioFormat,
        output_stem: &Path,
    ) -> Result<PathBuf, ProviderError> {
        let body = json!({
            "model": self.model,
            "voice": voice,
            "input": text,
            "response_format": format.openai_response_format(),
        });
        let mut req = self.client.post(&self.url).json(&body);
        req = match &self.auth {
            Auth::Bearer(k) => req.bearer_auth(k),
            Auth::ApiKeyHeader(k) => req.header("api-key", k),
            Auth::None => req,
        };
        let path = output_stem.with_extension(format.extension());
        send_to_file(&self.label, req, &path).await?;
        Ok(path)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// ElevenLabs text-to-speech. The voice string is the ElevenLabs voice id.
pub struct ElevenLabsSpeech {
    client: reqwest::Client,
    base: String,
    model: String,
    api_key: String,
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSpeech {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        format: &AudioFormat,
        output_stem: &Path,
    ) -> Result<PathBuf, ProviderError> {
        let url = format!(
            "{}/text-to-speech/{voice}?output_format={}",
            self.base.trim_end_matches('/'),
            format.raw()
        );
        let req = self
            .client
            .post(url)
            .header("xi-api-key", &self.api_key)
            .json(&json!({ "text": text, "model_id": self.model }));
        let path = output_stem.with_extension(format.extension());
        send_to_file("elevenlabs", req, &path).await?;
        Ok(path)
    }

    fn name(&self) -> &str {
        "elevenlabs"
    }
}

/// Send `req`, stream a successful body into `path`, and check the file exists.
async fn send_to_file(
    provider: &str,
    req: reqwest::RequestBuilder,
    path: &Path,
) -> Result<(), ProviderError> {
    let resp = req.send().await.map_err(|e| ProviderError::Transport {
        provider: provider.to_string(),
        detail: e.to_string(),
    })?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
            body: crate::error::preview(&body, 500),
        });
    }

    let io_err = |source| ProviderError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;
    let mut stream = resp.bytes_stream();
    let mut written = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ProviderError::Transport {
            provider: provider.to_string(),
            detail: e.to_string(),
        })?;
        written += chunk.len();
        file.write_all(&chunk).await.map_err(io_err)?;
    }
    file.flush().await.map_err(io_err)?;
    debug!("{provider}: wrote {written} bytes to {}", path.display());

    if !path.exists() {
        return Err(ProviderError::MissingOutput {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
