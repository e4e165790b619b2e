//! New York Times Top Stories API client.
//!
//! Each section is a separate endpoint:
//! `https://api.nytimes.com/svc/topstories/v2/{section}.json?api-key=...`.
//! The response wraps the stories in a `results` array; anything else is
//! treated as a malformed response for that section.

use super::NewsSource;
use crate::error::NewsError;
use crate::models::{RawStory, TopStoriesResponse};
use crate::utils::truncate_for_log;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use url::Url;

pub const SOURCE_LABEL: &str = "New York Times";

/// Top Stories client. Holds the credential and a client with a hard timeout.
#[derive(Debug, Clone)]
pub struct NytTopStories {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl NytTopStories {
    /// Build a client against `base_url` with every request bounded by `timeout`.
    ///
    /// A missing `api_key` is accepted here and reported by
    /// [`NewsSource::ensure_configured`], so the freshness gate can still
    /// skip the fetch without a credential.
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, NewsError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| NewsError::Configuration(format!("invalid Top Stories base URL {base}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NewsError::Configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Endpoint URL for one section, without the credential.
    pub fn section_url(&self, section: &str) -> Result<Url, NewsError> {
        self.base_url
            .join(&format!("{section}.json"))
            .map_err(|e| NewsError::Fetch {
                section: section.to_string(),
                message: format!("invalid section URL: {e}"),
            })
    }
}

impl NewsSource for NytTopStories {
    fn label(&self) -> &str {
        SOURCE_LABEL
    }

    fn ensure_configured(&self) -> Result<(), NewsError> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(NewsError::Configuration(
                "New York Times API key is not set (use --nyt-api-key or NYT_API_KEY)".to_string(),
            )),
        }
    }

    #[instrument(level = "info", skip(self))]
    async fn top_stories(&self, section: &str) -> Result<Vec<RawStory>, NewsError> {
        self.ensure_configured()?;
        let api_key = self.api_key.as_deref().unwrap_or_default();
        let url = self.section_url(section)?;

        let transport_err = |e: reqwest::Error| {
            if e.is_timeout() {
                NewsError::FetchTimeout {
                    section: section.to_string(),
                }
            } else {
                NewsError::Fetch {
                    section: section.to_string(),
                    message: e.without_url().to_string(),
                }
            }
        };

        let response = self
            .client
            .get(url)
            .query(&[("api-key", api_key)])
            .send()
            .await
            .map_err(transport_err)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_err)?;
        if !status.is_success() {
            return Err(NewsError::Fetch {
                section: section.to_string(),
                message: format!("HTTP {status}: {}", truncate_for_log(&body, 200)),
            });
        }

        let stories = parse_top_stories(section, &body)?;
        info!(count = stories.len(), "Fetched Top Stories section");
        Ok(stories)
    }
}

/// Decode a Top Stories body into raw stories.
///
/// Items that do not decode as a story object are logged and skipped.
pub fn parse_top_stories(section: &str, body: &str) -> Result<Vec<RawStory>, NewsError> {
    let response: TopStoriesResponse = serde_json::from_str(body).map_err(|e| NewsError::Malformed {
        section: section.to_string(),
        message: e.to_string(),
    })?;

    let Some(results) = response.results else {
        return Err(NewsError::Malformed {
            section: section.to_string(),
            message: format!(
                "no results array (status: {})",
                response.status.as_deref().unwrap_or("unknown")
            ),
        });
    };

    let stories = results
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawStory>(value.clone()) {
            Ok(story) => Some(story),
            Err(e) => {
                error!(%section, error = %e, item = %truncate_for_log(&value.to_string(), 200), "Unexpected article format");
                None
            }
        })
        .collect::<Vec<_>>();
    debug!(%section, count = stories.len(), "Decoded Top Stories items");
    Ok(stories)
}
