//! Pipeline entry points.
//!
//! [`run`] drives the four stages in order. With
//! [`PodcastRequest::skip_to`] set, the stages before it do not run: the
//! checkpoint of the stage just before is located on disk with
//! [`find_latest_artifact`] and handed to the first stage that does run.
//! A missing checkpoint stops the run before anything is called.
//!
//! Failures never escape as `Err`: every outcome is a [`PipelineOutcome`]
//! naming the stage that failed, so hosts (CLI, job runners) can report
//! it directly.

use crate::config::{PodcastConfig, PodcastRequest};
use crate::error::{ArtifactLookupError, PodcastError};
use crate::pipeline::artifact::{self, find_latest_artifact};
use crate::pipeline::{audio, extract, reformat, script, Stage, StageContext};
use crate::provider;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

/// Result of one pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Every stage ran (or was resumed) and the podcast was written.
    Completed { final_audio: PathBuf },
    /// The run stopped. `stage` is `None` when it failed before any stage
    /// started (configuration, provider setup, missing checkpoint).
    Failed {
        stage: Option<Stage>,
        message: String,
        error: PodcastError,
    },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn final_audio(&self) -> Option<&Path> {
        match self {
            Self::Completed { final_audio } => Some(final_audio),
            Self::Failed { .. } => None,
        }
    }

    /// Human-readable failure message, `None` on success.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { message, .. } => Some(message),
        }
    }

    pub fn into_result(self) -> Result<PathBuf, PodcastError> {
        match self {
            Self::Completed { final_audio } => Ok(final_audio),
            Self::Failed { error, .. } => Err(error),
        }
    }

    fn failed(stage: Option<Stage>, error: PodcastError) -> Self {
        let message = match stage {
            Some(stage) => format!("Stage {stage} failed: {error}"),
            None => format!("Pipeline could not start: {error}"),
        };
        Self::Failed {
            stage,
            message,
            error,
        }
    }
}

/// Generate a podcast for `request`.
///
/// # Example
/// ```rust,no_run
/// use pdf2podcast::{run, PodcastConfig, PodcastFormat, PodcastRequest};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PodcastConfig::builder().build()?;
/// let request = PodcastRequest::new("paper.pdf", "output").format(PodcastFormat::Interview);
/// let audio = run(&request, &config).await.into_result()?;
/// println!("{}", audio.display());
/// # Ok(())
/// # }
/// ```
pub async fn run(request: &PodcastRequest, config: &PodcastConfig) -> PipelineOutcome {
    let started = Instant::now();
    info!(
        "Starting podcast generation: {} → {}",
        request.document.display(),
        request.output_dir.display()
    );

    let ctx = StageContext::new(config, request);
    let mut current: Option<Stage> = None;
    match run_stages(&ctx, &mut current).await {
        Ok(final_audio) => {
            info!(
                "Podcast generation complete in {:.1}s: {}",
                started.elapsed().as_secs_f64(),
                final_audio.display()
            );
            PipelineOutcome::Completed { final_audio }
        }
        Err(e) => {
            if let Some(stage) = current {
                ctx.progress.on_stage_error(stage, &e.to_string());
            }
            let outcome = PipelineOutcome::failed(current, e);
            if let Some(message) = outcome.message() {
                error!("{}", message);
            }
            outcome
        }
    }
}

/// Synchronous wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(request: &PodcastRequest, config: &PodcastConfig) -> PipelineOutcome {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(run(request, config)),
        Err(e) => PipelineOutcome::failed(
            None,
            PodcastError::Internal(format!("Failed to create tokio runtime: {e}")),
        ),
    }
}

/// Generate a podcast from PDF bytes held in memory.
///
/// The bytes are written to a managed temp file that is removed when the
/// run returns; `request.document` is ignored.
pub async fn run_from_bytes(
    bytes: &[u8],
    request: &PodcastRequest,
    config: &PodcastConfig,
) -> PipelineOutcome {
    let tmp = match write_temp_pdf(bytes) {
        Ok(tmp) => tmp,
        Err(e) => return PipelineOutcome::failed(None, e),
    };
    let mut request = request.clone();
    request.document = tmp.path().to_path_buf();
    // `tmp` is dropped (and the file deleted) when `run` returns
    run(&request, config).await
}

// ── Internal helpers ─────────────────────────────────────────────

fn write_temp_pdf(bytes: &[u8]) -> Result<tempfile::NamedTempFile, PodcastError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("pdf2podcast-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| PodcastError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| PodcastError::Internal(format!("tempfile write: {e}")))?;
    Ok(tmp)
}

async fn run_stages(
    ctx: &StageContext<'_>,
    current: &mut Option<Stage>,
) -> Result<PathBuf, PodcastError> {
    let config = ctx.config;
    config.validate()?;

    let first = ctx.request.skip_to.unwrap_or(Stage::Extract);
    let mut input = resume_input(ctx.request, first)?;
    for skipped in Stage::ALL.into_iter().filter(|s| *s < first) {
        ctx.progress.on_stage_skipped(skipped);
    }

    let synthesizer = provider::resolve_synthesizer(config)?;
    let generators = provider::resolve_text_generators(
        config,
        first <= Stage::Extract,
        first <= Stage::Reformat,
    )?;
    let missing = || PodcastError::Internal("no text generator was resolved".into());

    for stage in Stage::ALL.into_iter().filter(|s| *s >= first) {
        *current = Some(stage);
        ctx.progress.on_stage_start(stage);
        info!("Stage {}: starting", stage);

        input = match stage {
            Stage::Extract => {
                let g = generators.as_ref().ok_or_else(missing)?;
                extract::run_stage(ctx, g.small.as_ref()).await?
            }
            Stage::Script => {
                let g = generators.as_ref().ok_or_else(missing)?;
                script::run_stage(ctx, g.big.as_ref(), &input).await?
            }
            Stage::Reformat => {
                let g = generators.as_ref().ok_or_else(missing)?;
                reformat::run_stage(ctx, g.big.as_ref(), &input).await?
            }
            Stage::Synthesize => {
                let turns = artifact::read_turns(&input)?;
                audio::run_stage(ctx, synthesizer.as_ref(), &turns).await?
            }
        };

        ctx.progress.on_stage_complete(stage);
        info!("Stage {}: wrote {}", stage, input.display());
    }
    Ok(input)
}

/// Input of the first stage that runs: the document itself, or the
/// checkpoint left by the stage just before `first`.
fn resume_input(request: &PodcastRequest, first: Stage) -> Result<PathBuf, PodcastError> {
    let Some(previous) = first.previous() else {
        return Ok(request.document.clone());
    };
    let dir = previous.dir(&request.output_dir);
    match find_latest_artifact(&dir, previous.checkpoint_pattern()) {
        Ok(path) => {
            info!(
                "Skipping to stage {}; resuming from {}",
                first,
                path.display()
            );
            Ok(path)
        }
        Err(ArtifactLookupError::NotFound { .. }) => Err(PodcastError::SkipResume {
            stage: first.number(),
            dir,
        }),
        Err(ArtifactLookupError::Unreadable { path, source }) => {
            Err(PodcastError::ArtifactUnreadable {
                path,
                detail: source.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::script::SCRIPT_JSON_FILE;
    use crate::provider::mock::ScriptedGenerator;
    use std::sync::Arc;

    #[test]
    fn resume_input_per_stage() {
        let dir = tempfile::tempdir().unwrap();
        let request = PodcastRequest::new("paper.pdf", dir.path());
        assert_eq!(
            resume_input(&request, Stage::Extract).unwrap(),
            PathBuf::from("paper.pdf")
        );

        match resume_input(&request, Stage::Reformat) {
            Err(PodcastError::SkipResume { stage, dir: d }) => {
                assert_eq!(stage, 3);
                assert_eq!(d, dir.path().join("step2"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let step2 = dir.path().join("step2");
        std::fs::create_dir_all(&step2).unwrap();
        std::fs::write(step2.join(SCRIPT_JSON_FILE), "\"script\"").unwrap();
        assert_eq!(
            resume_input(&request, Stage::Reformat).unwrap(),
            step2.join(SCRIPT_JSON_FILE)
        );
    }

    #[tokio::test]
    async fn invalid_config_fails_before_any_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PodcastConfig::builder()
            .generator(Arc::new(ScriptedGenerator::new(Vec::<String>::new())))
            .build()
            .unwrap();
        config.speech.audio_format = "m4a".into();
        let request = PodcastRequest::new(dir.path().join("in.pdf"), dir.path());

        let outcome = run(&request, &config).await;
        match outcome {
            PipelineOutcome::Failed { stage, ref message, .. } => {
                assert_eq!(stage, None);
                assert!(message.contains("m4a"));
            }
            ref other => panic!("unexpected {other:?}"),
        }
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn failure_message_names_stage() {
        let outcome = PipelineOutcome::failed(
            Some(Stage::Script),
            PodcastError::ScriptGeneration {
                detail: "quota".into(),
            },
        );
        assert!(!outcome.is_success());
        assert_eq!(
            outcome.message(),
            Some("Stage 2 (script) failed: Failed to generate transcript: quota")
        );
    }
}
