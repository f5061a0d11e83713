//! Stage 2: write the narration script from the cleaned text.
//!
//! Inputs within the token budget go out in one call. Larger inputs are cut
//! into overlapping windows: the first window asks for the beginning of the
//! transcript, every later one gets a short continuation instruction, and
//! the replies are appended with `\n` in order. Nothing is de-duplicated
//! here; the overlap is resolved by stage 3.

use super::{artifact, chunker, Stage, StageContext};
use crate::error::PodcastError;
use crate::prompts;
use crate::provider::{GenerationOptions, Message, TextGenerator};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Serialized script checkpoint (a JSON string).
pub const SCRIPT_JSON_FILE: &str = "data.json";
/// Human-readable copy of the script.
pub const SCRIPT_TEXT_FILE: &str = "data.txt";

/// Run stage 2 on the cleaned text at `input` and return the checkpoint path.
pub async fn run_stage(
    ctx: &StageContext<'_>,
    generator: &dyn TextGenerator,
    input: &Path,
) -> Result<PathBuf, PodcastError> {
    let text = artifact::read_text_lossless(input)?;
    let dir = ctx.stage_dir(Stage::Script)?;

    info!(
        "Generating {} {} {} script from {}",
        ctx.request.length,
        ctx.request.style,
        ctx.request.format,
        input.display()
    );
    let script = generate_script(ctx, generator, &text).await?;

    let json_path = dir.join(SCRIPT_JSON_FILE);
    artifact::write_json(&json_path, script.as_str())?;
    artifact::write_atomic(&dir.join(SCRIPT_TEXT_FILE), script.as_bytes())?;
    info!("Transcript saved to: {}", json_path.display());
    Ok(json_path)
}

/// Produce the script for `text`, chunking when it exceeds the token budget.
pub async fn generate_script(
    ctx: &StageContext<'_>,
    generator: &dyn TextGenerator,
    text: &str,
) -> Result<String, PodcastError> {
    let settings = &ctx.config.step2;
    let options = GenerationOptions {
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
    };
    let system = match ctx.config.system_prompt_for(Stage::Script) {
        Some(p) => p.to_string(),
        None => prompts::script_system_prompt(
            ctx.request.format,
            ctx.request.length,
            ctx.request.style,
            ctx.request.preference.as_deref(),
        ),
    };

    if !chunker::exceeds_token_budget(text, settings.chunk_token_limit) {
        debug!(
            "Script input is ~{} tokens; single call",
            chunker::estimate_tokens(text)
        );
        ctx.progress.on_chunk_start(Stage::Script, 1, 1);
        let messages = [Message::system(system), Message::user(text)];
        let script = call(ctx, generator, &messages, &options).await?;
        ctx.progress.on_chunk_complete(Stage::Script, 1, 1);
        return Ok(script);
    }

    let window = chunker::token_budget_chars(settings.chunk_token_limit);
    let chunks = chunker::overlap_chunks(text, window, settings.overlap_percent);
    let total = chunks.len();
    info!(
        "Script input is ~{} tokens (limit {}); processing {} overlapping chunks",
        chunker::estimate_tokens(text),
        settings.chunk_token_limit,
        total
    );

    let mut parts: Vec<String> = Vec::with_capacity(total);
    for chunk in &chunks {
        let n = chunk.index + 1;
        if chunk.index > 0 {
            ctx.chunk_delay().await;
        }
        ctx.progress.on_chunk_start(Stage::Script, n, total);

        let messages = if chunk.index == 0 {
            vec![
                Message::system(system.as_str()),
                Message::user(format!("{}\n\n{}", prompts::SCRIPT_FIRST_CHUNK, chunk.text)),
            ]
        } else {
            let mut instruction = prompts::SCRIPT_CONTINUATION.to_string();
            if n == total {
                instruction.push(' ');
                instruction.push_str(prompts::SCRIPT_FINAL_PART);
            }
            vec![Message::system(instruction), Message::user(chunk.text.as_str())]
        };

        let part = call(ctx, generator, &messages, &options).await?;
        debug!("Script chunk {}/{}: {} chars", n, total, part.chars().count());
        parts.push(part);
        ctx.progress.on_chunk_complete(Stage::Script, n, total);
    }
    Ok(parts.join("\n"))
}

async fn call(
    ctx: &StageContext<'_>,
    generator: &dyn TextGenerator,
    messages: &[Message],
    options: &GenerationOptions,
) -> Result<String, PodcastError> {
    ctx.call_delay().await;
    generator
        .generate(messages, options)
        .await
        .map_err(|e| PodcastError::ScriptGeneration {
            detail: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PodcastConfig, PodcastFormat, PodcastRequest, ScriptSettings};
    use crate::provider::mock::ScriptedGenerator;
    use crate::provider::Role;

    fn config(limit: usize) -> PodcastConfig {
        PodcastConfig::builder()
            .step2(ScriptSettings {
                chunk_token_limit: limit,
                ..Default::default()
            })
            .delays_ms(0, 0)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn small_input_is_one_call_with_composed_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clean_extracted_text.txt");
        std::fs::write(&input, "A short paper about owls.").unwrap();
        let config = config(8000);
        let request = PodcastRequest::new(dir.path().join("in.pdf"), dir.path())
            .format(PodcastFormat::Interview)
            .preference("mention barn owls");
        let ctx = StageContext::new(&config, &request);
        let gen = ScriptedGenerator::new(["Speaker 1: Owls!\nSpeaker 2: Hoo."]);

        let out = run_stage(&ctx, &gen, &input).await.unwrap();
        assert_eq!(out, dir.path().join("step2").join(SCRIPT_JSON_FILE));
        assert_eq!(
            artifact::read_script(&out).unwrap(),
            "Speaker 1: Owls!\nSpeaker 2: Hoo."
        );
        let txt = std::fs::read_to_string(dir.path().join("step2").join(SCRIPT_TEXT_FILE)).unwrap();
        assert_eq!(txt, "Speaker 1: Owls!\nSpeaker 2: Hoo.");

        let calls = gen.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].role, Role::System);
        assert!(calls[0][0].content.contains("mention barn owls"));
        assert!(calls[0][0].content.contains("exactly 2 speaker(s)"));
        assert_eq!(calls[0][1].content, "A short paper about owls.");
    }

    #[tokio::test]
    async fn oversized_input_is_chunked_and_appended() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(2000);
        let request = PodcastRequest::new(dir.path().join("in.pdf"), dir.path());
        let ctx = StageContext::new(&config, &request);
        let text = "x".repeat(50_000);
        let gen = ScriptedGenerator::responding(|m| format!("part-{}", m[1].content.len()));

        let script = generate_script(&ctx, &gen, &text).await.unwrap();
        let calls = gen.calls();
        assert_eq!(calls.len(), 8);
        assert!(calls[0][1].content.starts_with(prompts::SCRIPT_FIRST_CHUNK));
        assert!(calls[1][0].content.starts_with(prompts::SCRIPT_CONTINUATION));
        assert!(!calls[1][0].content.contains(prompts::SCRIPT_FINAL_PART));
        assert!(calls[7][0].content.contains(prompts::SCRIPT_FINAL_PART));
        assert_eq!(script.lines().count(), 8);
        assert!(script.starts_with("part-"));
    }

    #[tokio::test]
    async fn override_replaces_composed_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let config = PodcastConfig::builder()
            .system_prompt(Stage::Script, "Write a haiku.")
            .delays_ms(0, 0)
            .build()
            .unwrap();
        let request = PodcastRequest::new(dir.path().join("in.pdf"), dir.path());
        let ctx = StageContext::new(&config, &request);
        let gen = ScriptedGenerator::new(["haiku"]);
        generate_script(&ctx, &gen, "text").await.unwrap();
        assert_eq!(gen.calls()[0][0], Message::system("Write a haiku."));
    }

    #[tokio::test]
    async fn call_failure_is_a_script_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(8000);
        let request = PodcastRequest::new(dir.path().join("in.pdf"), dir.path());
        let ctx = StageContext::new(&config, &request);
        let gen = ScriptedGenerator::new(Vec::<String>::new()).then_error("quota");
        let err = generate_script(&ctx, &gen, "text").await.unwrap_err();
        assert!(matches!(err, PodcastError::ScriptGeneration { ref detail } if detail.contains("quota")));
    }
}
