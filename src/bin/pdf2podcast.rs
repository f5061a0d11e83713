//! CLI binary for pdf2podcast.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `PodcastRequest` plus `PodcastConfig` and reports the outcome.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2podcast::{
    run, Length, PipelineOutcome, PipelineProgressCallback, PodcastConfig, PodcastFormat,
    PodcastRequest, ProgressCallback, SpeechProviderKind, Stage, Style,
};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar that is re-labelled for every stage
/// and counts that stage's chunks (or segments, in stage 4).
struct CliProgressCallback {
    bar: ProgressBar,
    /// Wall-clock start of the running stage.
    stage_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(spinner_style());
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            stage_started: Mutex::new(None),
        })
    }

    fn elapsed(&self) -> String {
        let secs = self
            .stage_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

fn bar_style(unit: &str) -> ProgressStyle {
    ProgressStyle::with_template(&format!(
        "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  ⏱ {{elapsed_precise}}"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(TICKS)
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut s) = self.stage_started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_style(spinner_style());
        self.bar.set_prefix(format!("Stage {}", stage.number()));
        self.bar.set_message(format!("{}…", stage.name()));
        self.bar.set_position(0);
        self.bar.set_length(0);
        self.bar.reset_elapsed();
    }

    fn on_stage_skipped(&self, stage: Stage) {
        self.bar.println(format!(
            "  {} Stage {}  {}",
            dim("↷"),
            stage,
            dim("resumed from checkpoint")
        ));
    }

    fn on_chunk_start(&self, stage: Stage, index: usize, total: usize) {
        if self.bar.length() != Some(total as u64) {
            let unit = if stage == Stage::Synthesize {
                "segments"
            } else {
                "chunks"
            };
            self.bar.set_style(bar_style(unit));
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(index.saturating_sub(1) as u64);
    }

    fn on_chunk_complete(&self, _stage: Stage, _index: usize, _total: usize) {
        self.bar.inc(1);
    }

    fn on_stage_complete(&self, stage: Stage) {
        self.bar.println(format!(
            "  {} Stage {}  {}",
            green("✓"),
            stage,
            self.elapsed()
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let msg = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Stage {}  {}  {}",
            red("✗"),
            stage,
            red(&msg),
            self.elapsed()
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Two-speaker podcast, default settings (wav)
  pdf2podcast paper.pdf

  # German interview, long and casual, into ./episode
  pdf2podcast paper.pdf --format interview --length long --style casual \
      --language german --output-dir episode

  # Re-run only the speech stage with new voices from a config file
  pdf2podcast paper.pdf --config voices.json --skip-to 4

  # Machine-readable result
  pdf2podcast paper.pdf --json > result.json

STAGES & CHECKPOINTS (under --output-dir):
  1 extract     step1/clean_extracted_text.txt
  2 script      step2/data.json (+ data.txt)
  3 reformat    step3/podcast_ready_data.json (+ .txt)
  4 synthesize  step4/segments/podcast_segment_<n>.<ext>, step4/podcast.<ext>

  --skip-to N starts at stage N and reads the newest checkpoint of stage N-1.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI key (text and speech)
  EDGEQUAKE_LLM_PROVIDER  Override text provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override text model ID
  GROQ_API_KEY            Groq speech key
  AZURE_OPENAI_API_KEY    Azure OpenAI speech key
  ELEVENLABS_API_KEY      ElevenLabs speech key
  PDFIUM_LIB_PATH         Directory containing libpdfium
  RUST_LOG                Log filter (overrides --verbose / --quiet)
"#;

/// Turn PDF documents into multi-speaker podcasts.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2podcast",
    version,
    about = "Turn PDF documents into multi-speaker podcasts with LLM scripts and TTS",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to narrate.
    input: PathBuf,

    /// JSON config file (models, voices, per-stage settings).
    #[arg(short, long, env = "PDF2PODCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Output format, e.g. podcast, interview, summary, three-people-debate.
    #[arg(short, long, default_value = "summary")]
    format: PodcastFormat,

    /// Script length: short, medium, long, very-long.
    #[arg(short, long, default_value = "medium")]
    length: Length,

    /// Script style: normal, friendly, professional, academic, casual,
    /// technical, gen-z, funny.
    #[arg(short, long, default_value = "normal")]
    style: Style,

    /// Language of the spoken output.
    #[arg(long, default_value = "english")]
    language: String,

    /// Free-text preferences passed to the script writer.
    #[arg(short, long)]
    preference: Option<String>,

    /// Root directory for checkpoints and the final audio.
    #[arg(short, long, env = "PDF2PODCAST_OUTPUT_DIR", default_value = "./output")]
    output_dir: PathBuf,

    /// First stage to run (1-4); earlier stages are read from disk.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    skip_to: Option<u8>,

    /// Audio format, e.g. wav, mp3, wav_24000 (overrides the config file).
    #[arg(long)]
    audio_format: Option<String>,

    /// Speech provider (overrides the config file).
    #[arg(long)]
    speech_provider: Option<SpeechProviderKind>,

    /// Print the outcome as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2PODCAST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight with the progress bar; keep them for
    // runs without it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and request ─────────────────────────────────────────
    let progress: Option<Arc<CliProgressCallback>> = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressCallback))?;
    let request = build_request(&cli)?;

    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "{} → {} ({}, {}, {})",
                cli.input.display(),
                cli.output_dir.display(),
                request.format,
                request.length,
                request.style
            ))
        );
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let started = Instant::now();
    let outcome = run(&request, &config).await;
    if let Some(ref p) = progress {
        p.bar.finish_and_clear();
    }

    if cli.json {
        let value = match &outcome {
            PipelineOutcome::Completed { final_audio } => serde_json::json!({
                "success": true,
                "result": final_audio,
            }),
            PipelineOutcome::Failed { stage, message, .. } => serde_json::json!({
                "success": false,
                "stage": stage.map(Stage::number),
                "result": message,
            }),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise outcome")?
        );
        if !outcome.is_success() {
            std::process::exit(1);
        }
        return Ok(());
    }

    match outcome {
        PipelineOutcome::Completed { final_audio } => {
            if !cli.quiet {
                eprintln!(
                    "{}  {:.1}s  →  {}",
                    green("✔"),
                    started.elapsed().as_secs_f64(),
                    bold(&final_audio.display().to_string())
                );
            }
            Ok(())
        }
        PipelineOutcome::Failed { message, .. } => {
            eprintln!("{} {}", red("✘"), message);
            std::process::exit(1);
        }
    }
}

/// Load the config file (or defaults) and apply CLI overrides.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PodcastConfig> {
    let mut config = match cli.config {
        Some(ref path) => PodcastConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => PodcastConfig::default(),
    };
    if let Some(ref format) = cli.audio_format {
        config.speech.audio_format = format.clone();
    }
    if let Some(kind) = cli.speech_provider {
        config.speech.provider = kind;
    }
    config.progress_callback = progress;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Map CLI args to a `PodcastRequest`.
fn build_request(cli: &Cli) -> Result<PodcastRequest> {
    let mut request = PodcastRequest::new(&cli.input, &cli.output_dir)
        .format(cli.format)
        .length(cli.length)
        .style(cli.style)
        .language(cli.language.trim().to_lowercase());
    if let Some(ref preference) = cli.preference {
        request = request.preference(preference.clone());
    }
    if let Some(n) = cli.skip_to {
        let stage = Stage::from_number(n)
            .with_context(|| format!("--skip-to must be between 1 and 4 (got {n})"))?;
        request = request.skip_to(stage);
    }
    Ok(request)
}
