//! Error types for the pdf2podcast library.
//!
//! Three error types reflect three distinct failure surfaces:
//!
//! * [`PodcastError`] — **Fatal for a stage**: the stage cannot produce its
//!   checkpoint (unreadable PDF, a chunk's model call failed, the turn list
//!   could not be repaired, a synthesis call produced nothing). The
//!   orchestrator turns it into a [`crate::podcast::PipelineOutcome::Failed`]
//!   tagged with the stage that raised it.
//!
//! * [`ProviderError`] — a single gateway call failed (transport, HTTP
//!   status, timeout). Stage code wraps it into the `PodcastError` variant
//!   that names what the stage was doing at the time.
//!
//! * [`ArtifactLookupError`] — resuming from disk failed. "Nothing there"
//!   and "something there but unreadable" are separate variants so callers
//!   can tell a fresh output directory from a broken one.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2podcast library.
#[derive(Debug, Error)]
pub enum PodcastError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file exists but is neither named `.pdf` nor starts with `%PDF`.
    #[error("File is not a PDF: '{path}'")]
    NotAPdf { path: PathBuf },

    /// The document could not be opened or yielded no text.
    #[error("Text extraction failed for '{path}': {detail}")]
    DocumentExtraction { path: PathBuf, detail: String },

    // ── Stage errors ──────────────────────────────────────────────────────
    /// A model call for one chunk failed: a stage-1 cleaning call or a
    /// stage-3 reformat call.
    #[error("Failed to process chunk {chunk}: {detail}")]
    ChunkProcessing { chunk: usize, detail: String },

    /// A stage-2 script call failed.
    #[error("Failed to generate transcript: {detail}")]
    ScriptGeneration { detail: String },

    /// Stage-3 output is not a well-formed turn list, even after repair.
    #[error("{}", format_validation_message(*chunk, detail, raw_preview))]
    FormatValidation {
        /// 1-indexed chunk that failed, `None` for the whole-output check.
        chunk: Option<usize>,
        detail: String,
        /// First ~300 characters of the offending model output.
        raw_preview: String,
    },

    /// A synthesis call failed or produced no audio file.
    #[error("Failed to generate audio: {detail}")]
    AudioGeneration { detail: String },

    /// A stage was skipped but the checkpoint it should leave behind is missing.
    #[error("Cannot skip stage {stage}: no prior output found in '{dir}'")]
    SkipResume { stage: u8, dir: PathBuf },

    /// A checkpoint exists but could not be read or decoded.
    #[error("Checkpoint '{path}' is unreadable: {detail}")]
    ArtifactUnreadable { path: PathBuf, detail: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("Provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file or directory.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or config-file validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_validation_message(chunk: Option<usize>, detail: &str, raw_preview: &str) -> String {
    match chunk {
        Some(n) => format!(
            "Chunk {n} is not a valid turn list after repair: {detail}\nRaw output starts with: {raw_preview:?}"
        ),
        None => format!(
            "Transcript is not a valid turn list after repair: {detail}\nRaw output starts with: {raw_preview:?}"
        ),
    }
}

/// A failed call through the provider gateway.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("{provider} request failed: {detail}")]
    Transport { provider: String, detail: String },

    /// The provider answered with a non-success HTTP status.
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// The call exceeded the configured timeout.
    #[error("{provider} call timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    /// The provider reported success but the audio file is not on disk.
    #[error("Audio file was not generated at '{path}'")]
    MissingOutput { path: PathBuf },

    /// Writing the streamed response to disk failed.
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The provider could not be constructed.
    #[error("Provider '{provider}' is not configured: {hint}")]
    NotConfigured { provider: String, hint: String },
}

/// Why no checkpoint could be resumed from.
#[derive(Debug, Error)]
pub enum ArtifactLookupError {
    /// The stage directory holds no file matching the checkpoint pattern.
    #[error("no checkpoint matching '{pattern}' in '{dir}'")]
    NotFound { dir: PathBuf, pattern: String },

    /// The directory or a candidate file's metadata could not be read.
    #[error("cannot inspect '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Keep the first `max_chars` characters of model output for diagnostics.
pub(crate) fn preview(raw: &str, max_chars: usize) -> String {
    raw.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_resume_display() {
        let e = PodcastError::SkipResume {
            stage: 2,
            dir: PathBuf::from("out/step2"),
        };
        let msg = e.to_string();
        assert!(msg.contains("Cannot skip stage 2"), "got: {msg}");
        assert!(msg.contains("no prior output found"));
    }

    #[test]
    fn format_validation_display_names_chunk() {
        let e = PodcastError::FormatValidation {
            chunk: Some(3),
            detail: "expected '('".into(),
            raw_preview: "Sure! Here is".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Chunk 3"), "got: {msg}");
        assert!(msg.contains("Sure! Here is"));
    }

    #[test]
    fn format_validation_display_whole_output() {
        let e = PodcastError::FormatValidation {
            chunk: None,
            detail: "unterminated string".into(),
            raw_preview: "[(\"Speaker 1".into(),
        };
        assert!(e.to_string().starts_with("Transcript is not a valid turn list"));
    }

    #[test]
    fn provider_status_display() {
        let e = ProviderError::Status {
            provider: "elevenlabs".into(),
            status: 401,
            body: "invalid key".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("elevenlabs"));
    }

    #[test]
    fn preview_counts_chars_not_bytes() {
        let raw = "é".repeat(400);
        assert_eq!(preview(&raw, 300).chars().count(), 300);
    }
}
