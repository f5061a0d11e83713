//! Stage 4: synthesize one audio segment per turn and assemble the podcast.
//!
//! Segments are written as `step4/segments/podcast_segment_<n>.<ext>` with
//! `n` 1-based in turn order. Assembly always re-sorts by that number, so
//! the output never depends on which synthesis call finished first.
//!
//! Failure semantics are deliberately asymmetric: a synthesis call that
//! fails or leaves no file aborts the stage, while a segment that cannot be
//! read back during assembly is logged and left out.

use super::turns::Turn;
use super::{Stage, StageContext};
use crate::error::PodcastError;
use crate::provider::SpeechSynthesizer;
use futures::stream::{self, StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Sub-directory of `step4` holding the per-turn segments.
pub const SEGMENTS_DIR: &str = "segments";
/// File-name prefix of every segment.
pub const SEGMENT_PREFIX: &str = "podcast_segment_";
/// File stem of the assembled podcast.
pub const PODCAST_STEM: &str = "podcast";

static SEGMENT_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"segment_(\d+)").unwrap());

// ── Audio format ─────────────────────────────────────────────────

/// Supported audio containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    Wav,
    Mp3,
    Ogg,
    Flac,
    Aac,
}

impl Container {
    pub const ALL: [Container; 5] = [Self::Wav, Self::Mp3, Self::Ogg, Self::Flac, Self::Aac];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::Aac => "aac",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }
}

/// A parsed audio format string: `container[_sampleRate[_bitDepth]]`.
///
/// `-` is accepted as a separator as well. For compressed containers the
/// third token is the provider's bitrate rather than a bit depth; it is
/// carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    pub container: Container,
    pub sample_rate: Option<u32>,
    pub bit_depth: Option<u32>,
    raw: String,
}

impl AudioFormat {
    pub fn parse(raw: &str) -> Result<Self, PodcastError> {
        let raw = raw.trim();
        let lower = raw.to_ascii_lowercase();
        let mut parts = lower.split(['_', '-']);
        let name = parts.next().unwrap_or_default();
        let container = Container::from_name(name).ok_or_else(|| {
            PodcastError::InvalidConfig(format!(
                "unsupported audio format '{raw}': expected one of wav, mp3, ogg, flac, aac"
            ))
        })?;

        let mut number = |what: &str| -> Result<Option<u32>, PodcastError> {
            match parts.next() {
                None => Ok(None),
                Some(token) => token.parse().map(Some).map_err(|_| {
                    PodcastError::InvalidConfig(format!(
                        "audio format '{raw}': {what} '{token}' is not a number"
                    ))
                }),
            }
        };
        let sample_rate = number("sample rate")?;
        let bit_depth = number("bit depth")?;
        if let Some(extra) = parts.next() {
            return Err(PodcastError::InvalidConfig(format!(
                "audio format '{raw}': unexpected trailing token '{extra}'"
            )));
        }

        Ok(Self {
            container,
            sample_rate,
            bit_depth,
            raw: lower,
        })
    }

    /// File extension of segments and of the final podcast.
    pub fn extension(&self) -> &'static str {
        self.container.as_str()
    }

    /// Value of the `response_format` field of OpenAI-style speech APIs.
    pub fn openai_response_format(&self) -> &'static str {
        match self.container {
            Container::Ogg => "opus",
            other => other.as_str(),
        }
    }

    /// The format string as configured (lower-cased).
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ── Stage ────────────────────────────────────────────────────────

/// Run stage 4 and return the path of the assembled podcast.
pub async fn run_stage(
    ctx: &StageContext<'_>,
    synthesizer: &dyn SpeechSynthesizer,
    turns: &[Turn],
) -> Result<PathBuf, PodcastError> {
    if turns.is_empty() {
        return Err(PodcastError::AudioGeneration {
            detail: "the turn list is empty".into(),
        });
    }
    let audio_format = AudioFormat::parse(&ctx.config.speech.audio_format)?;
    let dir = ctx.stage_dir(Stage::Synthesize)?;
    let segments_dir = dir.join(SEGMENTS_DIR);
    std::fs::create_dir_all(&segments_dir).map_err(|source| PodcastError::OutputWriteFailed {
        path: segments_dir.clone(),
        source,
    })?;

    let total = turns.len();
    let concurrency = ctx.config.synthesis_concurrency.max(1);
    info!(
        "Synthesizing {} segments with {} (concurrency {})",
        total,
        synthesizer.name(),
        concurrency
    );

    let mut segments: Vec<PathBuf> = stream::iter(turns.iter().enumerate().map(|(i, turn)| {
        let n = i + 1;
        let stem = segments_dir.join(format!("{SEGMENT_PREFIX}{n}"));
        let voice = ctx.config.voice_for(&turn.speaker);
        let audio_format = &audio_format;
        async move {
            ctx.call_delay().await;
            ctx.progress.on_chunk_start(Stage::Synthesize, n, total);
            debug!("Segment {}/{}: {} with voice '{}'", n, total, turn.speaker, voice);
            let path = synthesizer
                .synthesize(&turn.text, voice, audio_format, &stem)
                .await
                .map_err(|e| PodcastError::AudioGeneration {
                    detail: format!("segment {n} ({}): {e}", turn.speaker),
                })?;
            if !path.is_file() {
                return Err(PodcastError::AudioGeneration {
                    detail: format!(
                        "segment {n}: audio file was not generated at '{}'",
                        path.display()
                    ),
                });
            }
            ctx.progress.on_chunk_complete(Stage::Synthesize, n, total);
            Ok::<_, PodcastError>(path)
        }
    }))
    .buffer_unordered(concurrency)
    .try_collect()
    .await?;

    sort_segments(&mut segments);
    let output = dir.join(format!("{PODCAST_STEM}.{}", audio_format.extension()));
    concatenate_segments(&segments, &output, &audio_format)?;
    info!("Podcast saved to: {}", output.display());
    Ok(output)
}

// ── Assembly ─────────────────────────────────────────────────────

/// Number embedded in a segment file name (`..._segment_<n>.<ext>`).
pub fn segment_index(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    SEGMENT_INDEX
        .captures_iter(name)
        .last()
        .and_then(|c| c[1].parse().ok())
}

/// Sort segment paths by their embedded number, not by name.
fn sort_segments(segments: &mut [PathBuf]) {
    segments.sort_by_key(|p| (segment_index(p).unwrap_or(usize::MAX), p.clone()));
}

/// Segment files in `dir`, in numeric order.
pub fn sorted_segments(dir: &Path) -> Result<Vec<PathBuf>, PodcastError> {
    let entries = std::fs::read_dir(dir).map_err(|e| PodcastError::ArtifactUnreadable {
        path: dir.to_path_buf(),
        detail: e.to_string(),
    })?;
    let mut segments: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && segment_index(p).is_some())
        .collect();
    sort_segments(&mut segments);
    Ok(segments)
}

/// Concatenate `segments`, in the order given, into `output`.
///
/// WAV segments are decoded and their samples appended; the first readable
/// segment's sample rate, channel count and sample format are used for the
/// output. Other containers are joined as encoded byte streams. A segment
/// that cannot be read is logged and skipped. Returns how many segments
/// went into the output; zero is an error.
pub fn concatenate_segments(
    segments: &[PathBuf],
    output: &Path,
    format: &AudioFormat,
) -> Result<usize, PodcastError> {
    let tmp_path = output.with_extension(format!("{}.tmp", format.extension()));
    let included = match format.container {
        Container::Wav => concatenate_wav(segments, &tmp_path)?,
        _ => concatenate_bytes(segments, &tmp_path)?,
    };
    if included == 0 {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(PodcastError::AudioGeneration {
            detail: format!("none of the {} segments could be read", segments.len()),
        });
    }
    std::fs::rename(&tmp_path, output).map_err(|source| PodcastError::OutputWriteFailed {
        path: output.to_path_buf(),
        source,
    })?;
    info!("Concatenated {}/{} segments", included, segments.len());
    Ok(included)
}

enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
}

fn read_wav(path: &Path) -> Result<(hound::WavSpec, Samples), hound::Error> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Int => Samples::Int(reader.samples::<i32>().collect::<Result<_, _>>()?),
        hound::SampleFormat::Float => {
            Samples::Float(reader.samples::<f32>().collect::<Result<_, _>>()?)
        }
    };
    Ok((spec, samples))
}

fn concatenate_wav(segments: &[PathBuf], tmp_path: &Path) -> Result<usize, PodcastError> {
    let write_err = |e: hound::Error| PodcastError::AudioGeneration {
        detail: format!("writing '{}': {e}", tmp_path.display()),
    };
    let mut writer: Option<(hound::WavWriter<_>, hound::WavSpec)> = None;
    let mut included = 0usize;

    for path in segments {
        let (spec, samples) = match read_wav(path) {
            Ok(read) => read,
            Err(e) => {
                error!("Skipping unreadable segment {}: {}", path.display(), e);
                continue;
            }
        };
        if writer.is_none() {
            let w = hound::WavWriter::create(tmp_path, spec).map_err(write_err)?;
            writer = Some((w, spec));
        }
        let Some((w, out_spec)) = writer.as_mut() else {
            continue;
        };
        if spec.channels != out_spec.channels
            || spec.bits_per_sample != out_spec.bits_per_sample
            || spec.sample_format != out_spec.sample_format
        {
            error!(
                "Skipping segment {}: sample layout {:?} does not match {:?}",
                path.display(),
                spec,
                out_spec
            );
            continue;
        }
        if spec.sample_rate != out_spec.sample_rate {
            warn!(
                "Segment {} is {} Hz; writing it at {} Hz",
                path.display(),
                spec.sample_rate,
                out_spec.sample_rate
            );
        }
        let written = match samples {
            Samples::Int(s) => s.into_iter().try_for_each(|v| w.write_sample(v)),
            Samples::Float(s) => s.into_iter().try_for_each(|v| w.write_sample(v)),
        };
        written.map_err(write_err)?;
        included += 1;
    }

    if let Some((w, _)) = writer {
        w.finalize().map_err(write_err)?;
    }
    Ok(included)
}

fn concatenate_bytes(segments: &[PathBuf], tmp_path: &Path) -> Result<usize, PodcastError> {
    let write_err = |source| PodcastError::OutputWriteFailed {
        path: tmp_path.to_path_buf(),
        source,
    };
    let mut out = std::io::BufWriter::new(std::fs::File::create(tmp_path).map_err(write_err)?);
    let mut included = 0usize;
    for path in segments {
        match std::fs::read(path) {
            Ok(bytes) => {
                out.write_all(&bytes).map_err(write_err)?;
                included += 1;
            }
            Err(e) => error!("Skipping unreadable segment {}: {}", path.display(), e),
        }
    }
    out.flush().map_err(write_err)?;
    Ok(included)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PodcastConfig, PodcastRequest};
    use crate::provider::mock::ToneSynthesizer;
    use std::fs;

    fn write_wav(path: &Path, rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for s in samples {
            w.write_sample(*s).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn parses_format_strings() {
        let f = AudioFormat::parse("wav").unwrap();
        assert_eq!(f.container, Container::Wav);
        assert_eq!(f.sample_rate, None);
        assert_eq!(f.extension(), "wav");

        let f = AudioFormat::parse("MP3_44100_128").unwrap();
        assert_eq!(f.container, Container::Mp3);
        assert_eq!(f.sample_rate, Some(44_100));
        assert_eq!(f.bit_depth, Some(128));
        assert_eq!(f.raw(), "mp3_44100_128");

        let f = AudioFormat::parse("wav-24000").unwrap();
        assert_eq!(f.sample_rate, Some(24_000));

        assert_eq!(AudioFormat::parse("ogg").unwrap().openai_response_format(), "opus");
    }

    #[test]
    fn rejects_bad_format_strings() {
        for bad in ["m4a", "", "wav_fast", "wav_1_2_3"] {
            assert!(
                matches!(AudioFormat::parse(bad), Err(PodcastError::InvalidConfig(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn segment_two_sorts_before_ten() {
        let dir = tempfile::tempdir().unwrap();
        for n in [10, 2, 1, 11, 3] {
            fs::write(dir.path().join(format!("podcast_segment_{n}.mp3")), b"x").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let names: Vec<String> = sorted_segments(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "podcast_segment_1.mp3",
                "podcast_segment_2.mp3",
                "podcast_segment_3.mp3",
                "podcast_segment_10.mp3",
                "podcast_segment_11.mp3",
            ]
        );
    }

    #[test]
    fn wav_concatenation_uses_first_spec_and_skips_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("podcast_segment_1.wav");
        let b = dir.path().join("podcast_segment_2.wav");
        let broken = dir.path().join("podcast_segment_3.wav");
        let c = dir.path().join("podcast_segment_4.wav");
        write_wav(&a, 24_000, &[1, 2, 3]);
        write_wav(&b, 16_000, &[4, 5]);
        fs::write(&broken, b"not a wav").unwrap();
        write_wav(&c, 24_000, &[6]);

        let out = dir.path().join("podcast.wav");
        let fmt = AudioFormat::parse("wav").unwrap();
        let included = concatenate_segments(&[a, b, broken, c], &out, &fmt).unwrap();
        assert_eq!(included, 3);

        let mut reader = hound::WavReader::open(&out).unwrap();
        assert_eq!(reader.spec().sample_rate, 24_000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn byte_concatenation_for_compressed_containers() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("podcast_segment_1.mp3");
        let b = dir.path().join("podcast_segment_2.mp3");
        fs::write(&a, b"AAA").unwrap();
        fs::write(&b, b"BB").unwrap();
        let out = dir.path().join("podcast.mp3");
        let fmt = AudioFormat::parse("mp3").unwrap();
        concatenate_segments(&[a, dir.path().join("missing.mp3"), b], &out, &fmt).unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"AAABB");
    }

    #[test]
    fn nothing_readable_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("podcast.wav");
        let fmt = AudioFormat::parse("wav").unwrap();
        let err = concatenate_segments(&[dir.path().join("gone.wav")], &out, &fmt).unwrap_err();
        assert!(matches!(err, PodcastError::AudioGeneration { .. }));
        assert!(!out.exists());
    }

    fn two_speaker_turns() -> Vec<Turn> {
        vec![Turn::new("Speaker 1", "Hello."), Turn::new("Speaker 2", "Hi!")]
    }

    #[tokio::test]
    async fn one_segment_per_turn_with_mapped_voices() {
        let dir = tempfile::tempdir().unwrap();
        let config = PodcastConfig::builder()
            .voice("Speaker 1", "v1")
            .voice("Speaker 2", "v2")
            .delays_ms(0, 0)
            .build()
            .unwrap();
        let request = PodcastRequest::new(dir.path().join("in.pdf"), dir.path());
        let ctx = StageContext::new(&config, &request);
        let synth = ToneSynthesizer::default();

        let out = run_stage(&ctx, &synth, &two_speaker_turns()).await.unwrap();
        assert_eq!(out, dir.path().join("step4/podcast.wav"));
        assert_eq!(
            synth.calls(),
            vec![
                ("v1".to_string(), "Hello.".to_string()),
                ("v2".to_string(), "Hi!".to_string()),
            ]
        );
        let segments = sorted_segments(&dir.path().join("step4/segments")).unwrap();
        assert_eq!(segments.len(), 2);
    }

    #[tokio::test]
    async fn unmapped_speaker_gets_co_host_voice() {
        let dir = tempfile::tempdir().unwrap();
        let config = PodcastConfig::builder()
            .voices(Default::default())
            .co_host_voice("shimmer")
            .delays_ms(0, 0)
            .build()
            .unwrap();
        let request = PodcastRequest::new(dir.path().join("in.pdf"), dir.path());
        let ctx = StageContext::new(&config, &request);
        let synth = ToneSynthesizer::default();
        run_stage(&ctx, &synth, &[Turn::new("Speaker 9", "Who am I?")])
            .await
            .unwrap();
        assert_eq!(synth.calls()[0].0, "shimmer");
    }

    #[tokio::test]
    async fn concurrent_synthesis_keeps_turn_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = PodcastConfig::builder()
            .audio_format("mp3")
            .synthesis_concurrency(4)
            .delays_ms(0, 0)
            .build()
            .unwrap();
        let request = PodcastRequest::new(dir.path().join("in.pdf"), dir.path());
        let ctx = StageContext::new(&config, &request);
        let turns: Vec<Turn> = (1..=12)
            .map(|i| Turn::new("Speaker 1", format!("<{i}>")))
            .collect();

        let out = run_stage(&ctx, &ToneSynthesizer::default(), &turns)
            .await
            .unwrap();
        let expected: String = (1..=12).map(|i| format!("<{i}>")).collect();
        assert_eq!(fs::read_to_string(out).unwrap(), expected);
    }

    #[tokio::test]
    async fn synthesis_failures_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = PodcastConfig::builder().delays_ms(0, 0).build().unwrap();
        let request = PodcastRequest::new(dir.path().join("in.pdf"), dir.path());
        let ctx = StageContext::new(&config, &request);

        let failing = ToneSynthesizer::default().failing_on("Hi!");
        let err = run_stage(&ctx, &failing, &two_speaker_turns())
            .await
            .unwrap_err();
        assert!(matches!(err, PodcastError::AudioGeneration { .. }));

        let silent = ToneSynthesizer::default().skipping_writes();
        let err = run_stage(&ctx, &silent, &two_speaker_turns())
            .await
            .unwrap_err();
        assert!(matches!(err, PodcastError::AudioGeneration { .. }));
    }

    #[tokio::test]
    async fn reported_segment_that_does_not_exist_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = PodcastConfig::builder().delays_ms(0, 0).build().unwrap();
        let request = PodcastRequest::new(dir.path().join("in.pdf"), dir.path());
        let ctx = StageContext::new(&config, &request);

        let synth = ToneSynthesizer::default().claiming_unwritten_output();
        let err = run_stage(&ctx, &synth, &two_speaker_turns())
            .await
            .unwrap_err();
        match err {
            PodcastError::AudioGeneration { detail } => {
                assert!(detail.starts_with("segment 1: audio file was not generated"), "{detail}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!dir.path().join("step4/podcast.wav").exists());
    }
}
