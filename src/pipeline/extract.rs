//! Stage 1: pull the text out of the PDF and clean it chunk by chunk.
//!
//! pdfium is not async-safe, so extraction runs inside
//! `tokio::task::spawn_blocking`. Cleaning is strictly sequential: each
//! chunk's reply is appended to `clean_extracted_text.txt.partial` and
//! flushed before the next call, so a crash leaves the completed prefix on
//! disk. The file only takes its checkpoint name once every chunk is clean.

use super::{artifact, chunker, Stage, StageContext};
use crate::error::PodcastError;
use crate::prompts;
use crate::provider::{GenerationOptions, Message, TextGenerator};
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// File name of the raw extraction.
pub const RAW_TEXT_FILE: &str = "extracted_text.txt";
/// File name of the cleaned checkpoint.
pub const CLEAN_TEXT_FILE: &str = "clean_extracted_text.txt";
/// Cleaned text while the stage is still running. Never matches the
/// checkpoint pattern.
pub const PARTIAL_SUFFIX: &str = "partial";

/// Source of raw document text.
///
/// `extract` is blocking; the stage calls it from `spawn_blocking`.
pub trait DocumentExtractor: Send + Sync {
    /// Text of the document at `path`, at most `max_chars` characters.
    fn extract(&self, path: &Path, max_chars: usize) -> Result<String, PodcastError>;
}

/// Extracts page text with pdfium.
///
/// The library is looked up in `PDFIUM_LIB_PATH` (a directory), then next to
/// the executable's working directory, then on the system search path.
#[derive(Debug, Default, Clone)]
pub struct PdfiumExtractor;

impl PdfiumExtractor {
    fn bind() -> Result<Pdfium, PdfiumError> {
        let local = std::env::var("PDFIUM_LIB_PATH").unwrap_or_else(|_| "./".to_string());
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&local))
            .or_else(|_| Pdfium::bind_to_system_library())?;
        Ok(Pdfium::new(bindings))
    }
}

impl DocumentExtractor for PdfiumExtractor {
    fn extract(&self, path: &Path, max_chars: usize) -> Result<String, PodcastError> {
        let extraction_err = |detail: String| PodcastError::DocumentExtraction {
            path: path.to_path_buf(),
            detail,
        };
        let pdfium = Self::bind().map_err(|e| extraction_err(format!("pdfium unavailable: {e:?}")))?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| extraction_err(format!("invalid or corrupted PDF: {e:?}")))?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("Processing PDF with {} pages", total_pages);

        let mut parts: Vec<String> = Vec::new();
        let mut total_chars = 0usize;
        for (idx, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map(|t| t.all())
                .map_err(|e| extraction_err(format!("page {}: {e:?}", idx + 1)))?;
            let len = text.chars().count();
            if total_chars + len > max_chars {
                parts.push(text.chars().take(max_chars - total_chars).collect());
                info!("Reached {} character limit at page {}", max_chars, idx + 1);
                break;
            }
            total_chars += len;
            parts.push(text);
            debug!("Extracted page {}/{}", idx + 1, total_pages);
        }
        Ok(parts.join("\n"))
    }
}

/// Check that `path` exists and looks like a PDF (`.pdf` name or `%PDF` magic).
pub fn validate_document(path: &Path) -> Result<(), PodcastError> {
    if !path.is_file() {
        return Err(PodcastError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let named_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if named_pdf {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let read = std::fs::File::open(path).and_then(|mut f| f.read_exact(&mut magic));
    if read.is_ok() && &magic == b"%PDF" {
        Ok(())
    } else {
        Err(PodcastError::NotAPdf {
            path: path.to_path_buf(),
        })
    }
}

/// Run stage 1 and return the path of the cleaned text.
pub async fn run_stage(
    ctx: &StageContext<'_>,
    generator: &dyn TextGenerator,
) -> Result<PathBuf, PodcastError> {
    let document = ctx.request.document.clone();
    validate_document(&document)?;
    let dir = ctx.stage_dir(Stage::Extract)?;
    let settings = &ctx.config.step1;

    let extractor: Arc<dyn DocumentExtractor> = ctx
        .config
        .extractor
        .clone()
        .unwrap_or_else(|| Arc::new(PdfiumExtractor));
    let max_chars = settings.max_chars;
    let path = document.clone();
    let raw = tokio::task::spawn_blocking(move || extractor.extract(&path, max_chars))
        .await
        .map_err(|e| PodcastError::Internal(format!("Extraction task panicked: {e}")))??;

    if raw.trim().is_empty() {
        return Err(PodcastError::DocumentExtraction {
            path: document,
            detail: "no text extracted from PDF".into(),
        });
    }
    info!("Extraction complete. Total characters: {}", raw.chars().count());
    artifact::write_atomic(&dir.join(RAW_TEXT_FILE), raw.as_bytes())?;

    let chunks = chunker::word_bounded_chunks(&raw, settings.chunk_size);
    let total = chunks.len();
    info!("Cleaning {} chunks", total);

    let out_path = dir.join(CLEAN_TEXT_FILE);
    let partial_path = dir.join(format!("{CLEAN_TEXT_FILE}.{PARTIAL_SUFFIX}"));
    let write_err = |source| PodcastError::OutputWriteFailed {
        path: partial_path.clone(),
        source,
    };
    // A checkpoint from an earlier run no longer matches the new raw text.
    match tokio::fs::remove_file(&out_path).await {
        Ok(()) => debug!("Removed stale checkpoint {}", out_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(PodcastError::OutputWriteFailed {
                path: out_path,
                source,
            })
        }
    }
    let mut out = tokio::fs::File::create(&partial_path).await.map_err(write_err)?;
    let options = GenerationOptions {
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
    };
    let override_prompt = ctx.config.system_prompt_for(Stage::Extract);

    for (i, chunk) in chunks.iter().enumerate() {
        let n = i + 1;
        ctx.progress.on_chunk_start(Stage::Extract, n, total);
        let messages = match override_prompt {
            Some(system) => vec![
                Message::system(system),
                Message::user(prompts::clean_override_user_message(chunk)),
            ],
            None => vec![Message::user(prompts::clean_prompt(ctx.request.format, chunk))],
        };

        ctx.call_delay().await;
        let cleaned = generator
            .generate(&messages, &options)
            .await
            .map_err(|e| PodcastError::ChunkProcessing {
                chunk: n,
                detail: e.to_string(),
            })?;

        out.write_all(cleaned.as_bytes()).await.map_err(write_err)?;
        out.write_all(b"\n").await.map_err(write_err)?;
        out.flush().await.map_err(write_err)?;
        debug!("Chunk {}/{} cleaned ({} chars)", n, total, cleaned.chars().count());
        ctx.progress.on_chunk_complete(Stage::Extract, n, total);
    }

    drop(out);
    tokio::fs::rename(&partial_path, &out_path)
        .await
        .map_err(|source| PodcastError::OutputWriteFailed {
            path: out_path.clone(),
            source,
        })?;
    info!("Cleaned text saved to: {}", out_path.display());
    Ok(out_path)
}
