//! News source collaborators.
//!
//! A [`NewsSource`] answers one request per configured section with the raw
//! items for that section. Normalization and filtering happen in
//! [`crate::fetcher`], so sources stay thin wrappers around their HTTP API.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | New York Times | [`nyt`] | Top Stories API | Requires API key |

use crate::error::NewsError;
use crate::models::RawStory;

pub mod nyt;

/// A provider of raw news items, queried once per section.
pub trait NewsSource {
    /// Label stored in each article's `source` field.
    fn label(&self) -> &str;

    /// Fail fast when a credential is missing. No network traffic.
    fn ensure_configured(&self) -> Result<(), NewsError> {
        Ok(())
    }

    /// Fetch the raw items for one section.
    async fn top_stories(&self, section: &str) -> Result<Vec<RawStory>, NewsError>;
}
