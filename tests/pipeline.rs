//! Integration tests for the full pdf2podcast pipeline.
//!
//! Every collaborator is a deterministic mock from `provider::mock`, so the
//! tests need neither network access nor a pdfium library. Each test works
//! in its own temp output root with all delays set to zero.

use pdf2podcast::pipeline::artifact;
use pdf2podcast::provider::mock::{ScriptedGenerator, StaticExtractor, ToneSynthesizer};
use pdf2podcast::provider::Message;
use pdf2podcast::{
    run, run_from_bytes, PipelineOutcome, PipelineProgressCallback, PodcastConfig,
    PodcastConfigBuilder, PodcastError, PodcastFormat, PodcastRequest, Stage, Turn,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const SCRIPT: &str = "Speaker 1: Welcome to the show.\nSpeaker 2: Glad to be here.";
const TURN_LIST: &str = r#"[
    ("Speaker 1", "Welcome to the show."),
    ("Speaker 2", "Glad to be here."),
]"#;

/// Records stage-level events as `"<event> <n>"`.
#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Recorder {
    fn push(&self, event: &str, stage: Stage) {
        self.0
            .lock()
            .unwrap()
            .push(format!("{event} {}", stage.number()));
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl PipelineProgressCallback for Recorder {
    fn on_stage_start(&self, stage: Stage) {
        self.push("start", stage);
    }
    fn on_stage_skipped(&self, stage: Stage) {
        self.push("skip", stage);
    }
    fn on_stage_complete(&self, stage: Stage) {
        self.push("done", stage);
    }
    fn on_stage_error(&self, stage: Stage, _error: &str) {
        self.push("error", stage);
    }
}

fn fake_pdf(dir: &Path) -> PathBuf {
    let path = dir.join("paper.pdf");
    std::fs::write(&path, b"%PDF-1.7\n%stub").unwrap();
    path
}

/// Big-model stand-in: a turn list for reformat calls, a script otherwise.
fn big_model() -> ScriptedGenerator {
    ScriptedGenerator::responding(|m: &[Message]| {
        if m[0].content.contains("script formatter") {
            TURN_LIST.to_string()
        } else {
            SCRIPT.to_string()
        }
    })
}

fn base_config() -> PodcastConfigBuilder {
    PodcastConfig::builder()
        .voice("Speaker 1", "v1")
        .voice("Speaker 2", "v2")
        .extractor(Arc::new(StaticExtractor::new(
            "Attention is all you need. The transformer relies on attention.",
        )))
        .delays_ms(0, 0)
}

fn two_speaker_request(dir: &Path) -> PodcastRequest {
    PodcastRequest::new(fake_pdf(dir), dir.join("out")).format(PodcastFormat::Podcast)
}

// ── Full runs ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_writes_every_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let small = Arc::new(ScriptedGenerator::responding(|_: &[Message]| {
        "Attention is all you need.".to_string()
    }));
    let big = Arc::new(big_model());
    let synth = Arc::new(ToneSynthesizer::default());
    let recorder = Arc::new(Recorder::default());
    let config = base_config()
        .small_generator(small.clone())
        .big_generator(big.clone())
        .synthesizer(synth.clone())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let request = two_speaker_request(dir.path());

    let outcome = run(&request, &config).await;
    let out = dir.path().join("out");
    assert_eq!(outcome.final_audio(), Some(out.join("step4/podcast.wav").as_path()));

    assert!(out.join("step1/extracted_text.txt").is_file());
    assert!(out.join("step1/clean_extracted_text.txt").is_file());
    assert_eq!(artifact::read_script(&out.join("step2/data.json")).unwrap(), SCRIPT);
    assert!(out.join("step2/data.txt").is_file());
    let turns = artifact::read_turns(&out.join("step3/podcast_ready_data.json")).unwrap();
    assert_eq!(
        turns,
        vec![
            Turn::new("Speaker 1", "Welcome to the show."),
            Turn::new("Speaker 2", "Glad to be here."),
        ]
    );
    assert!(out.join("step3/podcast_ready_data.txt").is_file());

    // Two segments, voiced v1 then v2, assembled in that order.
    assert!(out.join("step4/segments/podcast_segment_1.wav").is_file());
    assert!(out.join("step4/segments/podcast_segment_2.wav").is_file());
    let voices: Vec<String> = synth.calls().into_iter().map(|(v, _)| v).collect();
    assert_eq!(voices, ["v1", "v2"]);
    let reader = hound::WavReader::open(out.join("step4/podcast.wav")).unwrap();
    let expected_samples = ("Welcome to the show.".len() + "Glad to be here.".len()) * 40;
    assert_eq!(reader.duration() as usize, expected_samples);

    assert_eq!(small.call_count(), 1);
    assert_eq!(big.call_count(), 2);
    assert_eq!(
        recorder.events(),
        ["start 1", "done 1", "start 2", "done 2", "start 3", "done 3", "start 4", "done 4"]
    );
}

#[tokio::test]
async fn run_from_bytes_uses_a_temp_document() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config()
        .small_generator(Arc::new(ScriptedGenerator::responding(|_: &[Message]| {
            "clean".to_string()
        })))
        .big_generator(Arc::new(big_model()))
        .synthesizer(Arc::new(ToneSynthesizer::default()))
        .audio_format("mp3")
        .build()
        .unwrap();
    let request = PodcastRequest::new("ignored.pdf", dir.path().join("out"));

    let outcome = run_from_bytes(b"%PDF-1.4 in memory", &request, &config).await;
    assert!(outcome.is_success(), "{:?}", outcome.message());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("out/step4/podcast.mp3")).unwrap(),
        "Welcome to the show.Glad to be here."
    );
}

// ── Skip-to / resume ─────────────────────────────────────────────────────────

#[tokio::test]
async fn skip_to_reformat_uses_script_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    artifact::write_json(&out.join("step2/data.json"), SCRIPT).unwrap();

    let small = Arc::new(ScriptedGenerator::new(Vec::<String>::new()));
    let big = Arc::new(big_model());
    let recorder = Arc::new(Recorder::default());
    let config = base_config()
        .small_generator(small.clone())
        .big_generator(big.clone())
        .synthesizer(Arc::new(ToneSynthesizer::default()))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let request = two_speaker_request(dir.path()).skip_to(Stage::Reformat);

    let outcome = run(&request, &config).await;
    assert!(outcome.is_success(), "{:?}", outcome.message());
    assert_eq!(small.call_count(), 0);
    assert_eq!(big.call_count(), 1);
    assert_eq!(big.calls()[0][1].content, SCRIPT);
    assert!(!out.join("step1").exists());
    assert_eq!(
        recorder.events(),
        ["skip 1", "skip 2", "start 3", "done 3", "start 4", "done 4"]
    );
}

#[tokio::test]
async fn skip_to_without_checkpoint_fails_before_any_stage() {
    let dir = tempfile::tempdir().unwrap();
    let small = Arc::new(ScriptedGenerator::new(Vec::<String>::new()));
    let big = Arc::new(big_model());
    let synth = Arc::new(ToneSynthesizer::default());
    let recorder = Arc::new(Recorder::default());
    let config = base_config()
        .small_generator(small.clone())
        .big_generator(big.clone())
        .synthesizer(synth.clone())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let request = two_speaker_request(dir.path()).skip_to(Stage::Reformat);

    let outcome = run(&request, &config).await;
    assert!(matches!(
        outcome,
        PipelineOutcome::Failed { stage: None, .. }
    ));
    match outcome.into_result() {
        Err(PodcastError::SkipResume { stage, dir: step_dir }) => {
            assert_eq!(stage, 3);
            assert_eq!(step_dir, dir.path().join("out/step2"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(small.call_count() + big.call_count(), 0);
    assert!(synth.calls().is_empty());
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn skip_to_synthesis_needs_no_text_model() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let turns: Vec<Turn> = (1..=12)
        .map(|i| Turn::new(format!("Speaker {}", 1 + i % 2), format!("[{i}]")))
        .collect();
    artifact::write_json(&out.join("step3/podcast_ready_data.json"), &turns).unwrap();

    // No text generators configured at all.
    let config = PodcastConfig::builder()
        .synthesizer(Arc::new(ToneSynthesizer::default()))
        .audio_format("mp3")
        .synthesis_concurrency(3)
        .delays_ms(0, 0)
        .build()
        .unwrap();
    let request = PodcastRequest::new(dir.path().join("gone.pdf"), &out).skip_to(Stage::Synthesize);

    let audio = run(&request, &config).await.into_result().unwrap();
    let expected: String = (1..=12).map(|i| format!("[{i}]")).collect();
    assert_eq!(std::fs::read_to_string(audio).unwrap(), expected);
}

#[tokio::test]
async fn failed_stage_can_be_resumed() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let small: Arc<ScriptedGenerator> = Arc::new(ScriptedGenerator::responding(|_: &[Message]| {
        "clean".to_string()
    }));
    let failing_big = Arc::new(ScriptedGenerator::new(Vec::<String>::new()).then_error("HTTP 429"));
    let config = base_config()
        .small_generator(small.clone())
        .big_generator(failing_big)
        .synthesizer(Arc::new(ToneSynthesizer::default()))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let request = two_speaker_request(dir.path());

    let outcome = run(&request, &config).await;
    match &outcome {
        PipelineOutcome::Failed { stage, message, .. } => {
            assert_eq!(*stage, Some(Stage::Script));
            assert!(message.contains("2 (script)"));
            assert!(message.contains("HTTP 429"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(recorder.events().last().unwrap(), "error 2");
    let out = dir.path().join("out");
    assert!(out.join("step1/clean_extracted_text.txt").is_file());
    assert!(!out.join("step3").exists());

    // Resume at stage 2 with a working model; stage 1 is not repeated.
    let config = base_config()
        .small_generator(small.clone())
        .big_generator(Arc::new(big_model()))
        .synthesizer(Arc::new(ToneSynthesizer::default()))
        .build()
        .unwrap();
    let outcome = run(&request.clone().skip_to(Stage::Script), &config).await;
    assert!(outcome.is_success(), "{:?}", outcome.message());
    assert_eq!(small.call_count(), 1);
}

#[tokio::test]
async fn half_cleaned_text_is_not_a_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let small = Arc::new(ScriptedGenerator::new(["A"]).then_error("boom"));
    let config = PodcastConfig::builder()
        .extractor(Arc::new(StaticExtractor::new("aaaa bbbb cccc dddd")))
        .step1(pdf2podcast::config::CleanSettings {
            chunk_size: 5,
            ..Default::default()
        })
        .small_generator(small.clone())
        .big_generator(Arc::new(big_model()))
        .synthesizer(Arc::new(ToneSynthesizer::default()))
        .delays_ms(0, 0)
        .build()
        .unwrap();
    let request = two_speaker_request(dir.path());

    let outcome = run(&request, &config).await;
    assert!(matches!(
        outcome,
        PipelineOutcome::Failed {
            stage: Some(Stage::Extract),
            ..
        }
    ));
    assert_eq!(small.call_count(), 2);
    let step1 = dir.path().join("out/step1");
    assert_eq!(
        std::fs::read_to_string(step1.join("clean_extracted_text.txt.partial")).unwrap(),
        "A\n"
    );

    let outcome = run(&request.clone().skip_to(Stage::Script), &config).await;
    match outcome.into_result() {
        Err(PodcastError::SkipResume { stage, dir: step_dir }) => {
            assert_eq!(stage, 2);
            assert_eq!(step_dir, step1);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!dir.path().join("out/step2").exists());
}

// ── Chunked paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn long_clean_text_is_scripted_in_eight_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir_all(out.join("step1")).unwrap();
    std::fs::write(out.join("step1/clean_extracted_text.txt"), "y".repeat(50_000)).unwrap();

    let big = Arc::new(ScriptedGenerator::responding(|m: &[Message]| {
        if m[0].content.contains("script formatter") {
            TURN_LIST.to_string()
        } else {
            "Speaker 1: part.".to_string()
        }
    }));
    let config = base_config()
        .big_generator(big.clone())
        .synthesizer(Arc::new(ToneSynthesizer::default()))
        .step2(pdf2podcast::config::ScriptSettings {
            chunk_token_limit: 2000,
            ..Default::default()
        })
        .build()
        .unwrap();
    let request = two_speaker_request(dir.path()).skip_to(Stage::Script);

    let outcome = run(&request, &config).await;
    assert!(outcome.is_success(), "{:?}", outcome.message());

    let script = artifact::read_script(&out.join("step2/data.json")).unwrap();
    assert_eq!(script, vec!["Speaker 1: part."; 8].join("\n"));
    // 8 script chunks, then one reformat call for the short script.
    assert_eq!(big.call_count(), 9);
}
