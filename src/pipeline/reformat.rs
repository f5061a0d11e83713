//! Stage 3: rewrite the script as a validated `(speaker, text)` turn list.
//!
//! Scripts within `step3.chunk_size` characters go out in one call. Longer
//! scripts are cut into overlapping character windows and stitched back
//! together turn by turn:
//!
//! * every chunk after the first carries the tail of the combined list as
//!   context, and is told it is a continuation unless it is the last;
//! * a chunk whose reply does not parse gets exactly one repair call;
//! * farewells are cut out of every chunk except the last;
//! * the head of every later chunk is trimmed by
//!   [`turns::boundary_skip_count`] before it is appended.
//!
//! The combined list is validated once more at the end, with one
//! whole-output repair if that fails.

use super::turns::{self, Turn, TurnListError};
use super::{artifact, chunker, Stage, StageContext};
use crate::error::{preview, PodcastError};
use crate::prompts;
use crate::provider::{GenerationOptions, Message, TextGenerator};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Serialized turn-list checkpoint.
pub const TURNS_JSON_FILE: &str = "podcast_ready_data.json";
/// Human-readable copy of the turn list.
pub const TURNS_TEXT_FILE: &str = "podcast_ready_data.txt";

const PREVIEW_CHARS: usize = 300;

/// Run stage 3 on the script checkpoint at `input` and return the
/// turn-list checkpoint path.
pub async fn run_stage(
    ctx: &StageContext<'_>,
    generator: &dyn TextGenerator,
    input: &Path,
) -> Result<PathBuf, PodcastError> {
    let script = artifact::read_script(input)?;
    let dir = ctx.stage_dir(Stage::Reformat)?;
    info!(
        "Reformatting {} chars of script into {} turns",
        script.chars().count(),
        ctx.request.language
    );

    let turns = reformat_script(ctx, generator, &script).await?;

    let json_path = dir.join(TURNS_JSON_FILE);
    artifact::write_json(&json_path, &turns)?;
    artifact::write_atomic(
        &dir.join(TURNS_TEXT_FILE),
        turns::serialize_turns(&turns).as_bytes(),
    )?;
    info!("{} turns saved to: {}", turns.len(), json_path.display());
    Ok(json_path)
}

/// Turn `script` into a validated turn list.
pub async fn reformat_script(
    ctx: &StageContext<'_>,
    generator: &dyn TextGenerator,
    script: &str,
) -> Result<Vec<Turn>, PodcastError> {
    let settings = &ctx.config.step3;
    let options = GenerationOptions {
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
    };
    let system = match ctx.config.system_prompt_for(Stage::Reformat) {
        Some(p) => p.to_string(),
        None => prompts::reformat_system_prompt(ctx.request.format, &ctx.request.language),
    };

    let mut combined = if script.chars().count() <= settings.chunk_size {
        ctx.progress.on_chunk_start(Stage::Reformat, 1, 1);
        let messages = [Message::system(system), Message::user(script)];
        let raw = call(ctx, generator, &messages, &options, 1).await?;
        let turns = match turns::parse_turns(&raw) {
            Ok(turns) => turns,
            Err(e) => repair(ctx, generator, &raw, None, &options, e).await?,
        };
        ctx.progress.on_chunk_complete(Stage::Reformat, 1, 1);
        turns
    } else {
        reformat_chunked(ctx, generator, script, &system, &options).await?
    };

    let serialized = turns::serialize_turns(&combined);
    if let Err(e) = turns::parse_turns(&serialized) {
        combined = repair(ctx, generator, &serialized, None, &options, e).await?;
    }

    let unexpected = turns::unexpected_speakers(&combined, &ctx.request.format.speaker_labels());
    if !unexpected.is_empty() {
        warn!(
            "Speaker labels outside the {} cast: {}; they will use the co-host voice",
            ctx.request.format,
            unexpected.join(", ")
        );
    }
    Ok(combined)
}

async fn reformat_chunked(
    ctx: &StageContext<'_>,
    generator: &dyn TextGenerator,
    script: &str,
    system: &str,
    options: &GenerationOptions,
) -> Result<Vec<Turn>, PodcastError> {
    let settings = &ctx.config.step3;
    let chunks = chunker::overlap_chunks(script, settings.chunk_size, settings.overlap_percent);
    let total = chunks.len();
    info!("Script exceeds {} chars; processing {} overlapping chunks", settings.chunk_size, total);

    let mut combined: Vec<Turn> = Vec::new();
    for chunk in &chunks {
        let n = chunk.index + 1;
        let is_last = n == total;
        if chunk.index > 0 {
            ctx.chunk_delay().await;
        }
        ctx.progress.on_chunk_start(Stage::Reformat, n, total);

        let mut messages = vec![Message::system(system)];
        if chunk.index > 0 {
            let tail = &combined[combined.len().saturating_sub(settings.context_turns)..];
            messages.push(Message::user(prompts::reformat_context_message(tail, is_last)));
        }
        messages.push(Message::user(chunk.text.as_str()));

        let raw = call(ctx, generator, &messages, options, n).await?;
        let mut chunk_turns = match turns::parse_turns(&raw) {
            Ok(turns) => turns,
            Err(e) => repair(ctx, generator, &raw, Some(n), options, e).await?,
        };

        if !is_last {
            let cut = turns::filter_farewells(&mut chunk_turns);
            if cut > 0 {
                debug!("Chunk {}/{}: cut {} premature farewell(s)", n, total, cut);
            }
        }
        let parsed = chunk_turns.len();
        let skipped =
            turns::merge_chunk_turns(&mut combined, chunk_turns, chunk.index, settings.max_boundary_skip);
        debug!(
            "Chunk {}/{}: {} turns, {} skipped at the boundary, {} combined",
            n,
            total,
            parsed,
            skipped,
            combined.len()
        );
        ctx.progress.on_chunk_complete(Stage::Reformat, n, total);
    }
    Ok(combined)
}

async fn call(
    ctx: &StageContext<'_>,
    generator: &dyn TextGenerator,
    messages: &[Message],
    options: &GenerationOptions,
    chunk: usize,
) -> Result<String, PodcastError> {
    ctx.call_delay().await;
    generator
        .generate(messages, options)
        .await
        .map_err(|e| PodcastError::ChunkProcessing {
            chunk,
            detail: e.to_string(),
        })
}

/// One repair attempt for `raw`; a second failure is fatal.
async fn repair(
    ctx: &StageContext<'_>,
    generator: &dyn TextGenerator,
    raw: &str,
    chunk: Option<usize>,
    options: &GenerationOptions,
    cause: TurnListError,
) -> Result<Vec<Turn>, PodcastError> {
    match chunk {
        Some(n) => warn!("Chunk {} is not a valid turn list ({}); attempting repair", n, cause),
        None => warn!("Transcript is not a valid turn list ({}); attempting repair", cause),
    }
    let invalid = |detail: String| PodcastError::FormatValidation {
        chunk,
        detail,
        raw_preview: preview(raw, PREVIEW_CHARS),
    };

    let messages = [Message::system(prompts::REPAIR_PROMPT), Message::user(raw)];
    ctx.call_delay().await;
    let repaired = generator
        .generate(&messages, options)
        .await
        .map_err(|e| invalid(format!("repair call failed: {e}")))?;
    turns::parse_turns(&repaired).map_err(|e| invalid(e.to_string()))
}
