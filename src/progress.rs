//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PodcastConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages and chunks.
//!
//! # Example
//!
//! ```rust
//! use pdf2podcast::{PipelineProgressCallback, PodcastConfig, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl PipelineProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: Stage) {
//!         eprintln!("stage {stage} started");
//!     }
//! }
//!
//! let config = PodcastConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::Stage;
use std::sync::Arc;

/// Called by the pipeline as it processes each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. With `synthesis_concurrency > 1` the chunk methods
/// of stage 4 may be called from several tasks at once.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called when a stage begins executing (not when it is skipped).
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage is skipped in favour of an on-disk checkpoint.
    fn on_stage_skipped(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called just before a chunk (or segment, in stage 4) is sent out.
    ///
    /// # Arguments
    /// * `index` — 1-indexed chunk number
    /// * `total` — number of chunks in this stage
    fn on_chunk_start(&self, stage: Stage, index: usize, total: usize) {
        let _ = (stage, index, total);
    }

    /// Called when a chunk finished successfully.
    fn on_chunk_complete(&self, stage: Stage, index: usize, total: usize) {
        let _ = (stage, index, total);
    }

    /// Called once a stage has written its checkpoint.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage fails; the pipeline stops afterwards.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PodcastConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
