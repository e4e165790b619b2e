//! Error taxonomy for the fetch → enrich → render pipeline.
//!
//! Errors local to one section are absorbed by the fetcher and only logged.
//! Errors that would corrupt the enrichment join or the row-attribute
//! alignment propagate up to [`crate::pipeline::Pipeline::render`].

use std::path::PathBuf;
use thiserror::Error;

/// Failures reading or writing snapshot files.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {path} is not a valid snapshot document: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures talking to the news source.
#[derive(Debug, Error)]
pub enum NewsError {
    /// Missing credential. Fatal to the fetch, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("fetch failed for section {section}: {message}")]
    Fetch { section: String, message: String },

    #[error("fetch timed out for section {section}")]
    FetchTimeout { section: String },

    #[error("malformed response for section {section}: {message}")]
    Malformed { section: String, message: String },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Failures while enriching the newest snapshot.
///
/// Any of these leaves the snapshot in its pre-enrichment state so the next
/// cycle can try again.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("enrichment call failed: {0}")]
    Call(String),

    #[error("enrichment call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("enrichment response is not a valid record list: {message} (response: {preview})")]
    Parse { message: String, preview: String },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Failures while rendering the annotated table.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The rendered row count and the metadata list disagree. Never recoverable.
    #[error("row alignment broken: {rows} rendered rows but {metadata} metadata entries")]
    RowAlignment { rows: usize, metadata: usize },

    #[error("rendered markup has no table body")]
    MissingTableBody,

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Top-level error surfaced by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}
