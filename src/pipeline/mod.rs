//! Pipeline stages for PDF-to-podcast generation.
//!
//! Each submodule implements exactly one transformation step, plus the
//! pure helpers those steps share.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ script ──▶ reformat ──▶ audio
//! (pdfium +   (LLM)      (LLM, turn   (TTS +
//!  cleanup)               list)        concat)
//! ```
//!
//! 1. [`extract`]  — pull text out of the PDF and clean it chunk by chunk
//!    with the small model; writes `step1/clean_extracted_text.txt`
//! 2. [`script`]   — turn the cleaned text into a narration script with the
//!    big model; writes `step2/data.json`
//! 3. [`reformat`] — rewrite the script into an ordered speaker/text turn
//!    list; writes `step3/podcast_ready_data.json`
//! 4. [`audio`]    — synthesize one segment per turn and concatenate them
//!    into `step4/podcast.<ext>`
//!
//! Every stage leaves its checkpoint on disk, so a later run can start at
//! any stage with [`artifact::find_latest_artifact`] supplying the input.

pub mod artifact;
pub mod audio;
pub mod chunker;
pub mod extract;
pub mod reformat;
pub mod script;
pub mod turns;

use crate::config::{PodcastConfig, PodcastRequest};
use crate::error::PodcastError;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One of the four pipeline stages, numbered 1 to 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extract = 1,
    Script = 2,
    Reformat = 3,
    Synthesize = 4,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Self::Extract,
        Self::Script,
        Self::Reformat,
        Self::Synthesize,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    /// Stage for a 1-based number; `None` outside 1..=4.
    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.number() == n)
    }

    /// The stage that runs before this one.
    pub fn previous(self) -> Option<Self> {
        Self::from_number(self.number().wrapping_sub(1))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Script => "script",
            Self::Reformat => "reformat",
            Self::Synthesize => "synthesize",
        }
    }

    /// `stepN` directory under the output root.
    pub fn dir(self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("step{}", self.number()))
    }

    /// Glob-style pattern of the checkpoint this stage leaves behind.
    ///
    /// Only `*` is supported, matching any run of characters.
    pub fn checkpoint_pattern(self) -> &'static str {
        match self {
            Self::Extract => "clean_*.txt",
            Self::Script => "*.json",
            Self::Reformat => "*.json",
            Self::Synthesize => "podcast.*",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.name())
    }
}

/// What every stage needs to know about the current run.
pub struct StageContext<'a> {
    pub config: &'a PodcastConfig,
    pub request: &'a PodcastRequest,
    pub progress: ProgressCallback,
}

impl<'a> StageContext<'a> {
    pub fn new(config: &'a PodcastConfig, request: &'a PodcastRequest) -> Self {
        let progress = config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));
        Self {
            config,
            request,
            progress,
        }
    }

    /// Output directory of `stage`, created if missing.
    pub fn stage_dir(&self, stage: Stage) -> Result<PathBuf, PodcastError> {
        let dir = stage.dir(&self.request.output_dir);
        std::fs::create_dir_all(&dir).map_err(|source| PodcastError::OutputWriteFailed {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Pause before a model or synthesis call.
    pub async fn call_delay(&self) {
        pause(self.config.call_delay_ms).await;
    }

    /// Extra pause between chunk calls.
    pub async fn chunk_delay(&self) {
        pause(self.config.chunk_delay_ms).await;
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
