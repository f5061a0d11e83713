//! Mock providers for testing.
//!
//! Deterministic stand-ins for the text model, the speech model and the PDF
//! extractor, so the whole pipeline can run without network access or a
//! pdfium library.

use super::{GenerationOptions, Message, SpeechSynthesizer, TextGenerator};
use crate::error::{PodcastError, ProviderError};
use crate::pipeline::audio::{AudioFormat, Container};
use crate::pipeline::extract::DocumentExtractor;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type Responder = Box<dyn Fn(&[Message]) -> Result<String, String> + Send + Sync>;

// ── Text ─────────────────────────────────────────────────────────

/// Text generator that replays queued replies and records every call.
///
/// Replies are consumed in order. Once the queue is empty the responder (if
/// any) answers; otherwise the call fails.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, String>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A generator that answers every call with `f(messages)`.
    pub fn responding<F>(f: F) -> Self
    where
        F: Fn(&[Message]) -> String + Send + Sync + 'static,
    {
        Self {
            replies: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(move |m: &[Message]| Ok(f(m)))),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a failing call.
    pub fn then_error(self, detail: impl Into<String>) -> Self {
        self.lock_replies().push_back(Err(detail.into()));
        self
    }

    /// Messages of every call so far, in call order.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        self.replies.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        messages: &[Message],
        _options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        let queued = self.lock_replies().pop_front();
        let reply = match (queued, &self.responder) {
            (Some(r), _) => r,
            (None, Some(f)) => f(messages),
            (None, None) => Err("no scripted reply left".to_string()),
        };
        reply.map_err(|detail| ProviderError::Transport {
            provider: "scripted".into(),
            detail,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ── Speech ───────────────────────────────────────────────────────

/// Speech synthesizer that writes a short sine tone per call.
///
/// WAV output is a real PCM file written with `hound`; other containers get
/// the utterance bytes, which is enough to exercise stream concatenation.
pub struct ToneSynthesizer {
    pub sample_rate: u32,
    pub samples_per_char: usize,
    /// Calls whose text contains this marker fail.
    pub fail_marker: Option<String>,
    /// Write nothing and report the missing file.
    pub skip_write: bool,
    /// Write nothing but still return the path, like a provider that
    /// forgets to check its own output.
    pub claim_unwritten: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            samples_per_char: 40,
            fail_marker: None,
            skip_write: false,
            claim_unwritten: false,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ToneSynthesizer {
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    pub fn skipping_writes(mut self) -> Self {
        self.skip_write = true;
        self
    }

    pub fn claiming_unwritten_output(mut self) -> Self {
        self.claim_unwritten = true;
        self
    }

    /// `(voice, text)` of every call so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn write_tone(&self, path: &Path, chars: usize) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        let n = chars.max(1) * self.samples_per_char;
        for i in 0..n {
            let t = i as f32 / self.sample_rate as f32;
            let v = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.3;
            writer.write_sample((v * i16::MAX as f32) as i16)?;
        }
        writer.finalize()
    }
}

#[async_trait]
impl SpeechSynthesizer for ToneSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        format: &AudioFormat,
        output_stem: &Path,
    ) -> Result<PathBuf, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((voice.to_string(), text.to_string()));
        }
        if let Some(ref marker) = self.fail_marker {
            if text.contains(marker.as_str()) {
                return Err(ProviderError::Status {
                    provider: "tone".into(),
                    status: 500,
                    body: format!("refused to speak '{marker}'"),
                });
            }
        }

        let path = output_stem.with_extension(format.extension());
        if self.skip_write {
            return Err(ProviderError::MissingOutput { path });
        }
        if self.claim_unwritten {
            return Ok(path);
        }
        let written = match format.container {
            Container::Wav => self
                .write_tone(&path, text.chars().count())
                .map_err(|e| std::io::Error::other(e.to_string())),
            _ => std::fs::write(&path, text.as_bytes()),
        };
        written.map_err(|source| ProviderError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    fn name(&self) -> &str {
        "tone"
    }
}

// ── Documents ────────────────────────────────────────────────────

/// Extractor that returns fixed text for any path.
pub struct StaticExtractor {
    pub text: String,
}

impl StaticExtractor {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl DocumentExtractor for StaticExtractor {
    fn extract(&self, _path: &Path, max_chars: usize) -> Result<String, PodcastError> {
        Ok(self.text.chars().take(max_chars).collect())
    }
}
