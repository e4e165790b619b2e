//! Data models for articles, snapshots, and enrichment batches.
//!
//! - [`Article`]: one normalized news item, optionally carrying geolocation
//! - [`SnapshotDoc`]: the on-disk document for one fetch cycle
//! - [`RawStory`]: an item as returned by the Top Stories API
//! - [`EnrichmentRequest`] / [`EnrichmentRecord`]: the two halves of an
//!   enrichment batch exchanged with the model
//!
//! Article and enrichment fields use camelCase on the wire so that the
//! snapshot files and the model prompt share one schema.

use serde::{Deserialize, Serialize};

/// A normalized news article.
///
/// The geolocation fields stay `None` until enrichment has run and the
/// model returned a row for this article's `id`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Source-provided unique identifier, used as the join key.
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    /// Publication timestamp exactly as the source formatted it.
    pub published_at: String,
    /// Provider label, e.g. "New York Times".
    pub source: String,
    /// Raw place name supplied by the source.
    pub location_hint: String,
    #[serde(default)]
    pub city: Option<String>,
    /// Standardized short English country name.
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Article {
    /// Project the fields the model needs to geolocate this article.
    pub fn to_enrichment_request(&self) -> EnrichmentRequest {
        EnrichmentRequest {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            location_hint: self.location_hint.clone(),
        }
    }

    /// Copy the geolocation fields of `record` onto this article.
    pub fn apply_enrichment(&mut self, record: &EnrichmentRecord) {
        self.city = record.city.clone();
        self.country = record.country.clone();
        self.latitude = record.latitude;
        self.longitude = record.longitude;
    }
}

/// The content of one snapshot file.
///
/// `enriched_at` is the marker for "geolocation columns present": it is
/// `None` when the Fetcher writes the file and set exactly once by the
/// Enricher.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SnapshotDoc {
    /// RFC 3339 time the enrichment join was written.
    #[serde(default)]
    pub enriched_at: Option<String>,
    pub articles: Vec<Article>,
}

impl SnapshotDoc {
    pub fn new(articles: Vec<Article>) -> Self {
        Self {
            enriched_at: None,
            articles,
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.enriched_at.is_some()
    }
}

/// Top Stories response envelope. `results` is absent on error payloads.
#[derive(Debug, Deserialize)]
pub struct TopStoriesResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<serde_json::Value>>,
}

/// One item from the Top Stories API.
///
/// `geo_facet` is normally a list of strings but the API has been seen to
/// send an empty string instead, so it is kept as a raw value.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStory {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "abstract")]
    pub summary: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub published_date: String,
    #[serde(default)]
    pub geo_facet: serde_json::Value,
}

impl RawStory {
    pub fn is_article(&self) -> bool {
        self.item_type.as_deref() == Some("Article")
    }

    /// First non-empty geographic facet, if any.
    pub fn first_geo_facet(&self) -> Option<String> {
        match &self.geo_facet {
            serde_json::Value::Array(items) => items
                .first()
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// Normalize into an [`Article`]; `None` when the item is not an article
    /// or carries no location hint.
    pub fn into_article(self, source: &str) -> Option<Article> {
        if !self.is_article() {
            return None;
        }
        let location_hint = self.first_geo_facet()?;
        Some(Article {
            id: self.uri,
            title: self.title.unwrap_or_default(),
            description: self.summary.filter(|s| !s.is_empty()),
            url: self.url,
            published_at: self.published_date,
            source: source.to_string(),
            location_hint,
            city: None,
            country: None,
            latitude: None,
            longitude: None,
        })
    }
}

/// Request half of an enrichment batch.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRequest {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location_hint: String,
}

/// Response half of an enrichment batch.
///
/// Models prompted with older schemas answer with `uri` rather than `id`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnrichmentRecord {
    #[serde(alias = "uri")]
    pub id: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}
