//! # pdf2podcast
//!
//! Turn a PDF document into a multi-speaker audio narration ("podcast").
//!
//! ## Why this crate?
//!
//! A single model call cannot read a 200-page paper and speak it back. This
//! crate splits the job into four stages that each leave a checkpoint on
//! disk, cuts oversized inputs into overlapping chunks, and stitches the
//! chunked model output back into one validated speaker/text turn list
//! before any audio is synthesized. A failed or interrupted run resumes at
//! any stage from those checkpoints.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract    pdfium text extraction + chunked cleanup (small model)
//!  ├─ 2. Script     narration script, overlap-chunked when too long (big model)
//!  ├─ 3. Reformat   validated ("Speaker N", text) turn list, with repair
//!  └─ 4. Synthesize one TTS segment per turn, concatenated in turn order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2podcast::{run, PodcastConfig, PodcastFormat, PodcastRequest, Stage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Text provider auto-detected from OPENAI_API_KEY / EDGEQUAKE_LLM_PROVIDER
//!     let config = PodcastConfig::builder().audio_format("mp3").build()?;
//!     let request = PodcastRequest::new("paper.pdf", "output")
//!         .format(PodcastFormat::Interview)
//!         .language("german");
//!     let audio = run(&request, &config).await.into_result()?;
//!     println!("{}", audio.display());
//!
//!     // Re-voice the same turn list without calling any text model.
//!     let request = request.skip_to(Stage::Synthesize);
//!     run(&request, &config).await.into_result()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2podcast` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2podcast = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod jobs;
pub mod pipeline;
pub mod podcast;
pub mod progress;
pub mod prompts;
pub mod provider;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    Length, PodcastConfig, PodcastConfigBuilder, PodcastFormat, PodcastRequest,
    SpeechProviderKind, Style,
};
pub use error::{ArtifactLookupError, PodcastError, ProviderError};
pub use jobs::{run_job, InMemoryJobStore, JobStatus, JobStore};
pub use pipeline::artifact::find_latest_artifact;
pub use pipeline::audio::AudioFormat;
pub use pipeline::turns::Turn;
pub use pipeline::Stage;
pub use podcast::{run, run_from_bytes, run_sync, PipelineOutcome};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use provider::{SpeechSynthesizer, TextGenerator};
