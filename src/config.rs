//! Configuration types for PDF-to-podcast generation.
//!
//! All pipeline behaviour is controlled through [`PodcastConfig`], built via
//! its [`PodcastConfigBuilder`] or loaded from a JSON file with
//! [`PodcastConfig::from_json_file`]. Every field has a default, so a config
//! file only needs to name what it changes.
//!
//! The per-run choices (document, format, length, style, language,
//! preference, skip-to) live in [`PodcastRequest`]; the config is meant to
//! be shared across many runs.

use crate::error::PodcastError;
use crate::pipeline::audio::AudioFormat;
use crate::pipeline::extract::DocumentExtractor;
use crate::pipeline::Stage;
use crate::progress::ProgressCallback;
use crate::provider::{SpeechSynthesizer, TextGenerator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for podcast generation.
///
/// # Example
/// ```rust
/// use pdf2podcast::{PodcastConfig, SpeechProviderKind};
///
/// let config = PodcastConfig::builder()
///     .speech_provider(SpeechProviderKind::OpenAi)
///     .audio_format("mp3")
///     .voice("Speaker 1", "nova")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PodcastConfig {
    /// Model used by stage 1 (cleanup). Cheap and fast is fine here.
    pub small_text_model: TextModelConfig,

    /// Model used by stages 2 and 3 (script writing and TTS formatting).
    pub big_text_model: TextModelConfig,

    /// Speech synthesis provider and output format.
    pub speech: SpeechConfig,

    /// Speaker label → voice identifier.
    pub voices: BTreeMap<String, String>,

    /// Voice used for any speaker label missing from `voices`.
    pub co_host_voice: String,

    /// Stage 1 (extract + clean) settings.
    pub step1: CleanSettings,

    /// Stage 2 (script) settings.
    pub step2: ScriptSettings,

    /// Stage 3 (TTS formatting) settings.
    pub step3: ReformatSettings,

    /// Optional per-stage instruction overrides.
    pub system_prompts: SystemPrompts,

    /// Pause before every model or synthesis call, in milliseconds. Default: 2000.
    ///
    /// Hosted providers rate-limit bursts of requests; a fixed pause keeps a
    /// long document from tripping those limits halfway through.
    pub call_delay_ms: u64,

    /// Extra pause between chunk calls of stages 2 and 3. Default: 5000.
    pub chunk_delay_ms: u64,

    /// Per-call timeout enforced by the provider gateway. Default: 300.
    pub api_timeout_secs: u64,

    /// Number of segments synthesized at once in stage 4. Default: 1.
    pub synthesis_concurrency: usize,

    /// Pre-constructed generator for stage 1. Takes precedence over `small_text_model`.
    #[serde(skip)]
    pub small_generator: Option<Arc<dyn TextGenerator>>,

    /// Pre-constructed generator for stages 2 and 3. Takes precedence over `big_text_model`.
    #[serde(skip)]
    pub big_generator: Option<Arc<dyn TextGenerator>>,

    /// Pre-constructed synthesizer. Takes precedence over `speech.provider`.
    #[serde(skip)]
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,

    /// Pre-constructed PDF text extractor. Defaults to pdfium.
    #[serde(skip)]
    pub extractor: Option<Arc<dyn DocumentExtractor>>,

    /// Receives stage and chunk events.
    #[serde(skip)]
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PodcastConfig {
    fn default() -> Self {
        Self {
            small_text_model: TextModelConfig {
                provider: None,
                model: Some("gpt-4.1-nano".to_string()),
            },
            big_text_model: TextModelConfig {
                provider: None,
                model: Some("gpt-4.1-mini".to_string()),
            },
            speech: SpeechConfig::default(),
            voices: default_voices(),
            co_host_voice: "echo".to_string(),
            step1: CleanSettings::default(),
            step2: ScriptSettings::default(),
            step3: ReformatSettings::default(),
            system_prompts: SystemPrompts::default(),
            call_delay_ms: 2000,
            chunk_delay_ms: 5000,
            api_timeout_secs: 300,
            synthesis_concurrency: 1,
            small_generator: None,
            big_generator: None,
            synthesizer: None,
            extractor: None,
            progress_callback: None,
        }
    }
}

fn default_voices() -> BTreeMap<String, String> {
    [
        ("Speaker 1", "alloy"),
        ("Speaker 2", "echo"),
        ("Speaker 3", "fable"),
        ("Speaker 4", "onyx"),
        ("Speaker 5", "nova"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl fmt::Debug for PodcastConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PodcastConfig")
            .field("small_text_model", &self.small_text_model)
            .field("big_text_model", &self.big_text_model)
            .field("speech", &self.speech)
            .field("voices", &self.voices)
            .field("co_host_voice", &self.co_host_voice)
            .field("step1", &self.step1)
            .field("step2", &self.step2)
            .field("step3", &self.step3)
            .field("call_delay_ms", &self.call_delay_ms)
            .field("chunk_delay_ms", &self.chunk_delay_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("synthesis_concurrency", &self.synthesis_concurrency)
            .field(
                "small_generator",
                &self.small_generator.as_ref().map(|g| g.name().to_string()),
            )
            .field(
                "big_generator",
                &self.big_generator.as_ref().map(|g| g.name().to_string()),
            )
            .field(
                "synthesizer",
                &self.synthesizer.as_ref().map(|s| s.name().to_string()),
            )
            .finish()
    }
}

impl PodcastConfig {
    /// Create a new builder for `PodcastConfig`.
    pub fn builder() -> PodcastConfigBuilder {
        PodcastConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load a config from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PodcastError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PodcastError::InvalidConfig(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse a config from JSON text. Missing fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, PodcastError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| PodcastError::InvalidConfig(format!("config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Voice bound to `speaker`, falling back to the co-host voice.
    pub fn voice_for(&self, speaker: &str) -> &str {
        self.voices
            .get(speaker)
            .map(String::as_str)
            .unwrap_or(&self.co_host_voice)
    }

    /// Instruction override for `stage`, if one is configured.
    pub fn system_prompt_for(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::Extract => self.system_prompts.step1.as_deref(),
            Stage::Script => self.system_prompts.step2.as_deref(),
            Stage::Reformat => self.system_prompts.step3.as_deref(),
            Stage::Synthesize => None,
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), PodcastError> {
        if self.step1.chunk_size == 0 {
            return Err(PodcastError::InvalidConfig(
                "step1.chunk_size must be ≥ 1".into(),
            ));
        }
        if self.step2.chunk_token_limit == 0 {
            return Err(PodcastError::InvalidConfig(
                "step2.chunk_token_limit must be ≥ 1".into(),
            ));
        }
        if self.step3.chunk_size == 0 {
            return Err(PodcastError::InvalidConfig(
                "step3.chunk_size must be ≥ 1".into(),
            ));
        }
        for (name, pct) in [
            ("step2.overlap_percent", self.step2.overlap_percent),
            ("step3.overlap_percent", self.step3.overlap_percent),
        ] {
            if pct >= 100 {
                return Err(PodcastError::InvalidConfig(format!(
                    "{name} must be below 100, got {pct}"
                )));
            }
        }
        if self.synthesis_concurrency == 0 {
            return Err(PodcastError::InvalidConfig(
                "synthesis_concurrency must be ≥ 1".into(),
            ));
        }
        AudioFormat::parse(&self.speech.audio_format)?;
        Ok(())
    }
}

/// Builder for [`PodcastConfig`].
#[derive(Debug)]
pub struct PodcastConfigBuilder {
    config: PodcastConfig,
}

impl PodcastConfigBuilder {
    pub fn small_text_model(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.config.small_text_model = TextModelConfig {
            provider: Some(provider.into()),
            model: Some(model.into()),
        };
        self
    }

    pub fn big_text_model(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.config.big_text_model = TextModelConfig {
            provider: Some(provider.into()),
            model: Some(model.into()),
        };
        self
    }

    pub fn speech_provider(mut self, kind: SpeechProviderKind) -> Self {
        self.config.speech.provider = kind;
        self
    }

    pub fn speech_model(mut self, model: impl Into<String>) -> Self {
        self.config.speech.model = model.into();
        self
    }

    pub fn speech_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.speech.endpoint = Some(endpoint.into());
        self
    }

    pub fn audio_format(mut self, format: impl Into<String>) -> Self {
        self.config.speech.audio_format = format.into();
        self
    }

    pub fn voice(mut self, speaker: impl Into<String>, voice: impl Into<String>) -> Self {
        self.config.voices.insert(speaker.into(), voice.into());
        self
    }

    pub fn voices(mut self, voices: BTreeMap<String, String>) -> Self {
        self.config.voices = voices;
        self
    }

    pub fn co_host_voice(mut self, voice: impl Into<String>) -> Self {
        self.config.co_host_voice = voice.into();
        self
    }

    pub fn step1(mut self, settings: CleanSettings) -> Self {
        self.config.step1 = settings;
        self
    }

    pub fn step2(mut self, settings: ScriptSettings) -> Self {
        self.config.step2 = settings;
        self
    }

    pub fn step3(mut self, settings: ReformatSettings) -> Self {
        self.config.step3 = settings;
        self
    }

    pub fn system_prompt(mut self, stage: Stage, prompt: impl Into<String>) -> Self {
        let prompt = Some(prompt.into());
        match stage {
            Stage::Extract => self.config.system_prompts.step1 = prompt,
            Stage::Script => self.config.system_prompts.step2 = prompt,
            Stage::Reformat => self.config.system_prompts.step3 = prompt,
            Stage::Synthesize => {}
        }
        self
    }

    /// Set both pauses at once. Tests and local models usually want zero.
    pub fn delays_ms(mut self, call: u64, chunk: u64) -> Self {
        self.config.call_delay_ms = call;
        self.config.chunk_delay_ms = chunk;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn synthesis_concurrency(mut self, n: usize) -> Self {
        self.config.synthesis_concurrency = n.max(1);
        self
    }

    pub fn small_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.small_generator = Some(generator);
        self
    }

    pub fn big_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.big_generator = Some(generator);
        self
    }

    /// Use one generator for every text stage.
    pub fn generator(self, generator: Arc<dyn TextGenerator>) -> Self {
        self.small_generator(Arc::clone(&generator))
            .big_generator(generator)
    }

    pub fn synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.config.synthesizer = Some(synthesizer);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PodcastConfig, PodcastError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Sections ─────────────────────────────────────────────────────────────

/// Which text provider and model a stage talks to.
///
/// With `provider: None` the provider is auto-detected from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextModelConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
}

/// Speech provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub provider: SpeechProviderKind,
    /// Provider model id, e.g. `tts-1` or `eleven_multilingual_v2`.
    pub model: String,
    /// `container[_sampleRate[_bitDepth]]`, e.g. `wav`, `mp3_44100_128`.
    pub audio_format: String,
    /// Base URL; required for `custom` and `azure`.
    pub endpoint: Option<String>,
    /// API key. Falls back to the provider's usual environment variable.
    pub api_key: Option<String>,
    /// API version; required for `azure`.
    pub api_version: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            provider: SpeechProviderKind::OpenAi,
            model: "tts-1".to_string(),
            audio_format: "wav".to_string(),
            endpoint: None,
            api_key: None,
            api_version: None,
        }
    }
}

/// Speech provider tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechProviderKind {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "lmstudio")]
    LmStudio,
    Ollama,
    Groq,
    Azure,
    Custom,
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
}

impl SpeechProviderKind {
    pub const ALL: [SpeechProviderKind; 7] = [
        Self::OpenAi,
        Self::LmStudio,
        Self::Ollama,
        Self::Groq,
        Self::Azure,
        Self::Custom,
        Self::ElevenLabs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::LmStudio => "lmstudio",
            Self::Ollama => "ollama",
            Self::Groq => "groq",
            Self::Azure => "azure",
            Self::Custom => "custom",
            Self::ElevenLabs => "elevenlabs",
        }
    }
}

impl fmt::Display for SpeechProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeechProviderKind {
    type Err = PodcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                PodcastError::InvalidConfig(format!(
                    "unknown speech provider '{s}' (expected one of: openai, lmstudio, ollama, groq, azure, custom, elevenlabs)"
                ))
            })
    }
}

/// Stage 1 settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanSettings {
    pub max_tokens: usize,
    pub temperature: f32,
    /// Word-bounded chunk size, in characters. Default: 1000.
    pub chunk_size: usize,
    /// Extraction stops after this many characters. Default: 100 000.
    pub max_chars: usize,
}

impl Default for CleanSettings {
    fn default() -> Self {
        Self {
            max_tokens: 1028,
            temperature: 0.7,
            chunk_size: 1000,
            max_chars: 100_000,
        }
    }
}

/// Stage 2 settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    pub max_tokens: usize,
    pub temperature: f32,
    /// Inputs estimated above this many tokens are chunked. Default: 8000.
    pub chunk_token_limit: usize,
    /// Overlap between consecutive chunks, in percent of the chunk. Default: 10.
    pub overlap_percent: u8,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            max_tokens: 8126,
            temperature: 1.0,
            chunk_token_limit: 8000,
            overlap_percent: 10,
        }
    }
}

/// Stage 3 settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReformatSettings {
    pub max_tokens: usize,
    pub temperature: f32,
    /// Scripts longer than this many characters are chunked. Default: 20 000.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in percent of the chunk. Default: 10.
    pub overlap_percent: u8,
    /// Trailing turns of the combined list shown to the next chunk. Default: 3.
    pub context_turns: usize,
    /// Upper bound on turns dropped at each chunk boundary. Default: 2.
    pub max_boundary_skip: usize,
}

impl Default for ReformatSettings {
    fn default() -> Self {
        Self {
            max_tokens: 8126,
            temperature: 1.0,
            chunk_size: 20_000,
            overlap_percent: 10,
            context_turns: 3,
            max_boundary_skip: 2,
        }
    }
}

/// Per-stage instruction overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemPrompts {
    pub step1: Option<String>,
    pub step2: Option<String>,
    pub step3: Option<String>,
}

// ── Request ──────────────────────────────────────────────────────────────

/// One end-to-end pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastRequest {
    /// Source PDF.
    pub document: PathBuf,
    /// Root directory; each stage writes under `stepN/`.
    pub output_dir: PathBuf,
    pub format: PodcastFormat,
    pub length: Length,
    pub style: Style,
    /// Target language of the final transcript.
    pub language: String,
    /// Free-text preference woven into the script instruction.
    pub preference: Option<String>,
    /// First stage to actually execute; earlier stages resume from disk.
    pub skip_to: Option<Stage>,
}

impl PodcastRequest {
    /// A request with the defaults of the CLI: summary, medium, normal, english.
    pub fn new(document: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            document: document.into(),
            output_dir: output_dir.into(),
            format: PodcastFormat::default(),
            length: Length::default(),
            style: Style::default(),
            language: "english".to_string(),
            preference: None,
            skip_to: None,
        }
    }

    pub fn format(mut self, format: PodcastFormat) -> Self {
        self.format = format;
        self
    }

    pub fn length(mut self, length: Length) -> Self {
        self.length = length;
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn preference(mut self, preference: impl Into<String>) -> Self {
        self.preference = Some(preference.into());
        self
    }

    pub fn skip_to(mut self, stage: Stage) -> Self {
        self.skip_to = Some(stage);
        self
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Output format of the narration. Decides how many speakers the script has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PodcastFormat {
    Podcast,
    Interview,
    PanelDiscussion,
    Debate,
    #[default]
    Summary,
    Narration,
    Storytelling,
    Explainer,
    Lecture,
    Tutorial,
    QAndA,
    NewsReport,
    ExecutiveBrief,
    #[serde(alias = "meeting-minutes")]
    Meeting,
    Analysis,
    ThreePeoplePodcast,
    ThreePeoplePanelDiscussion,
    ThreePeopleDebate,
    FourPeoplePodcast,
    FourPeoplePanelDiscussion,
    FourPeopleDebate,
    FivePeoplePodcast,
    FivePeoplePanelDiscussion,
    FivePeopleDebate,
}

impl PodcastFormat {
    pub const ALL: [PodcastFormat; 24] = [
        Self::Podcast,
        Self::Interview,
        Self::PanelDiscussion,
        Self::Debate,
        Self::Summary,
        Self::Narration,
        Self::Storytelling,
        Self::Explainer,
        Self::Lecture,
        Self::Tutorial,
        Self::QAndA,
        Self::NewsReport,
        Self::ExecutiveBrief,
        Self::Meeting,
        Self::Analysis,
        Self::ThreePeoplePodcast,
        Self::ThreePeoplePanelDiscussion,
        Self::ThreePeopleDebate,
        Self::FourPeoplePodcast,
        Self::FourPeoplePanelDiscussion,
        Self::FourPeopleDebate,
        Self::FivePeoplePodcast,
        Self::FivePeoplePanelDiscussion,
        Self::FivePeopleDebate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Podcast => "podcast",
            Self::Interview => "interview",
            Self::PanelDiscussion => "panel-discussion",
            Self::Debate => "debate",
            Self::Summary => "summary",
            Self::Narration => "narration",
            Self::Storytelling => "storytelling",
            Self::Explainer => "explainer",
            Self::Lecture => "lecture",
            Self::Tutorial => "tutorial",
            Self::QAndA => "q-and-a",
            Self::NewsReport => "news-report",
            Self::ExecutiveBrief => "executive-brief",
            Self::Meeting => "meeting",
            Self::Analysis => "analysis",
            Self::ThreePeoplePodcast => "three-people-podcast",
            Self::ThreePeoplePanelDiscussion => "three-people-panel-discussion",
            Self::ThreePeopleDebate => "three-people-debate",
            Self::FourPeoplePodcast => "four-people-podcast",
            Self::FourPeoplePanelDiscussion => "four-people-panel-discussion",
            Self::FourPeopleDebate => "four-people-debate",
            Self::FivePeoplePodcast => "five-people-podcast",
            Self::FivePeoplePanelDiscussion => "five-people-panel-discussion",
            Self::FivePeopleDebate => "five-people-debate",
        }
    }

    /// Number of distinct speakers the format calls for (1–5).
    pub fn speaker_count(self) -> usize {
        match self {
            Self::Summary
            | Self::Narration
            | Self::Storytelling
            | Self::Explainer
            | Self::Lecture
            | Self::Tutorial
            | Self::NewsReport
            | Self::ExecutiveBrief
            | Self::Analysis => 1,
            Self::Podcast
            | Self::Interview
            | Self::PanelDiscussion
            | Self::Debate
            | Self::QAndA
            | Self::Meeting => 2,
            Self::ThreePeoplePodcast | Self::ThreePeoplePanelDiscussion | Self::ThreePeopleDebate => 3,
            Self::FourPeoplePodcast | Self::FourPeoplePanelDiscussion | Self::FourPeopleDebate => 4,
            Self::FivePeoplePodcast | Self::FivePeoplePanelDiscussion | Self::FivePeopleDebate => 5,
        }
    }

    /// `["Speaker 1", …, "Speaker N"]` for this format.
    pub fn speaker_labels(self) -> Vec<String> {
        (1..=self.speaker_count())
            .map(|n| format!("Speaker {n}"))
            .collect()
    }
}

impl fmt::Display for PodcastFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PodcastFormat {
    type Err = PodcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "meeting-minutes" {
            return Ok(Self::Meeting);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| PodcastError::InvalidConfig(format!("unknown format '{s}'")))
    }
}

/// Target length of the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Length {
    Short,
    #[default]
    Medium,
    Long,
    VeryLong,
}

impl Length {
    pub const ALL: [Length; 4] = [Self::Short, Self::Medium, Self::Long, Self::VeryLong];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
            Self::VeryLong => "very-long",
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Length {
    type Err = PodcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| PodcastError::InvalidConfig(format!("unknown length '{s}'")))
    }
}

/// Tone of the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Style {
    #[default]
    Normal,
    Friendly,
    Professional,
    Academic,
    Casual,
    Technical,
    GenZ,
    Funny,
}

impl Style {
    pub const ALL: [Style; 8] = [
        Self::Normal,
        Self::Friendly,
        Self::Professional,
        Self::Academic,
        Self::Casual,
        Self::Technical,
        Self::GenZ,
        Self::Funny,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Friendly => "friendly",
            Self::Professional => "professional",
            Self::Academic => "academic",
            Self::Casual => "casual",
            Self::Technical => "technical",
            Self::GenZ => "gen-z",
            Self::Funny => "funny",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = PodcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| PodcastError::InvalidConfig(format!("unknown style '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_round_trips_through_its_name() {
        for f in PodcastFormat::ALL {
            assert_eq!(f.as_str().parse::<PodcastFormat>().unwrap(), f);
        }
        assert_eq!(
            "meeting-minutes".parse::<PodcastFormat>().unwrap(),
            PodcastFormat::Meeting
        );
        assert!("radio-drama".parse::<PodcastFormat>().is_err());
    }

    #[test]
    fn speaker_counts_follow_format_family() {
        assert_eq!(PodcastFormat::Summary.speaker_count(), 1);
        assert_eq!(PodcastFormat::Podcast.speaker_count(), 2);
        assert_eq!(PodcastFormat::ThreePeopleDebate.speaker_count(), 3);
        assert_eq!(PodcastFormat::FourPeoplePodcast.speaker_count(), 4);
        assert_eq!(
            PodcastFormat::FivePeoplePanelDiscussion.speaker_labels(),
            vec!["Speaker 1", "Speaker 2", "Speaker 3", "Speaker 4", "Speaker 5"]
        );
    }

    #[test]
    fn length_and_style_parse() {
        assert_eq!("very-long".parse::<Length>().unwrap(), Length::VeryLong);
        assert_eq!("Gen-Z".parse::<Style>().unwrap(), Style::GenZ);
        assert!("epic".parse::<Length>().is_err());
    }

    #[test]
    fn voice_lookup_falls_back_to_co_host() {
        let config = PodcastConfig::builder()
            .voices(BTreeMap::new())
            .voice("Speaker 1", "v1")
            .co_host_voice("cohost")
            .build()
            .unwrap();
        assert_eq!(config.voice_for("Speaker 1"), "v1");
        assert_eq!(config.voice_for("Speaker 7"), "cohost");
    }

    #[test]
    fn json_config_keeps_defaults_for_missing_fields() {
        let config = PodcastConfig::from_json_str(
            r#"{ "speech": { "provider": "elevenlabs", "audio_format": "mp3_44100_128" },
                 "step1": { "chunk_size": 500 } }"#,
        )
        .unwrap();
        assert_eq!(config.speech.provider, SpeechProviderKind::ElevenLabs);
        assert_eq!(config.speech.model, "tts-1");
        assert_eq!(config.step1.chunk_size, 500);
        assert_eq!(config.step1.max_chars, 100_000);
        assert_eq!(config.step3.context_turns, 3);
    }

    #[test]
    fn rejects_full_overlap() {
        let err = PodcastConfig::builder()
            .step2(ScriptSettings {
                overlap_percent: 100,
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("overlap_percent"));
    }

    #[test]
    fn rejects_unknown_audio_container() {
        assert!(PodcastConfig::builder().audio_format("opus").build().is_err());
        assert!(PodcastConfig::builder().audio_format("wav_24000").build().is_ok());
    }

    #[test]
    fn request_defaults_match_cli() {
        let req = PodcastRequest::new("doc.pdf", "./output");
        assert_eq!(req.format, PodcastFormat::Summary);
        assert_eq!(req.length, Length::Medium);
        assert_eq!(req.style, Style::Normal);
        assert_eq!(req.language, "english");
        assert!(req.skip_to.is_none());
    }
}
