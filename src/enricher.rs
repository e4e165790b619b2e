//! Geolocation enrichment of the newest snapshot.
//!
//! The enricher sends every article of the newest snapshot to the model as
//! one batch, parses the answer, left-joins it back onto the articles by
//! `id`, and rewrites the snapshot in place. A snapshot is enriched at most
//! once: its `enriched_at` marker short-circuits every later call.

use crate::api::{AskAsync, Asked, ask_with_timeout};
use crate::config::Config;
use crate::error::EnrichError;
use crate::models::{Article, EnrichmentRecord, EnrichmentRequest};
use crate::snapshots::SnapshotStore;
use crate::utils::{looks_truncated, truncate_for_log};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)\r?\n?[ \t]*```").unwrap());
static OPEN_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```[A-Za-z]*[ \t]*(\r?\n|$)").unwrap());
static CLOSE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|\r?\n)[ \t]*```$").unwrap());

/// What [`Enricher::enrich_if_needed`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// There is no snapshot to enrich.
    NoSnapshot,
    /// The newest snapshot already carries geolocation; no model call made.
    Skipped { snapshot: String },
    /// The newest snapshot was joined with the model's answer and rewritten.
    Enriched {
        snapshot: String,
        matched: usize,
        total: usize,
    },
}

/// Joins model-inferred geolocation onto the newest snapshot.
#[derive(Debug)]
pub struct Enricher<A> {
    pub(crate) client: A,
    store: SnapshotStore,
    timeout: Duration,
}

impl<A: AskAsync<Response = String>> Enricher<A> {
    pub fn new(client: A, store: SnapshotStore, config: &Config) -> Self {
        Self {
            client,
            store,
            timeout: config.settings.enrich_timeout(),
        }
    }

    /// Enrich the newest snapshot unless it is already enriched.
    ///
    /// On any error the snapshot is left untouched.
    #[instrument(level = "info", skip_all)]
    pub async fn enrich_if_needed(&self) -> Result<EnrichOutcome, EnrichError> {
        let Some(snapshot) = self.store.newest().await? else {
            return Ok(EnrichOutcome::NoSnapshot);
        };

        let mut doc = self.store.read(&snapshot).await?;
        if doc.is_enriched() {
            info!(name = %snapshot.name, "Snapshot already enriched; skipping");
            return Ok(EnrichOutcome::Skipped {
                snapshot: snapshot.name,
            });
        }

        let total = doc.articles.len();
        let records = if total == 0 {
            debug!("Snapshot has no articles; nothing to ask");
            Vec::new()
        } else {
            let requests: Vec<EnrichmentRequest> =
                doc.articles.iter().map(Article::to_enrichment_request).collect();
            let prompt = build_prompt(&requests)?;

            let response = match ask_with_timeout(&self.client, &prompt, self.timeout).await {
                Asked::Answered(r) => r,
                Asked::Failed(message) => return Err(EnrichError::Call(message)),
                Asked::TimedOut => return Err(EnrichError::Timeout(self.timeout)),
            };
            parse_enrichment(&response)?
        };

        let matched = left_join(&mut doc.articles, &records);
        if matched < total {
            warn!(matched, total, "Model answered for only part of the batch");
        }
        doc.enriched_at = Some(Utc::now().to_rfc3339());
        self.store.rewrite(&snapshot, &doc).await?;
        info!(name = %snapshot.name, matched, total, "Enriched snapshot");

        Ok(EnrichOutcome::Enriched {
            snapshot: snapshot.name,
            matched,
            total,
        })
    }
}

/// Render the user message for one enrichment batch.
pub fn build_prompt(requests: &[EnrichmentRequest]) -> Result<String, EnrichError> {
    let batch = serde_json::to_string_pretty(requests)
        .map_err(|e| EnrichError::Call(format!("cannot encode enrichment batch: {e}")))?;

    Ok(format!(
        "Below is a JSON array of news stories. Each record has the fields 'id', 'title', \
'description' and 'locationHint', where 'locationHint' is an unstructured place name \
(a country, a city, a region, ...).\n\
For every story, work out the city and the country it is about. If the city is unclear, \
use the capital city of the country. The country must be the short, standard English \
name (e.g. 'United States', 'United Kingdom', 'South Korea').\n\
----\n{batch}\n----\n\
Return a JSON array with exactly one record per input record, in the same order, with \
the fields 'id' (copied unchanged from the input), 'city', 'country', 'latitude' and \
'longitude' (decimal degrees as numbers).\n\
Return only the JSON array, with no text before or after it."
    ))
}

/// Remove a surrounding Markdown code fence, if the model added one.
///
/// A fence whose opening or closing marker is missing (a cut-off answer)
/// loses whichever marker is present.
pub fn strip_code_fences(response: &str) -> &str {
    if let Some(inner) = CODE_FENCE.captures(response).and_then(|c| c.get(1)) {
        return inner.as_str().trim();
    }

    let mut body = response.trim();
    if let Some(open) = OPEN_FENCE.find(body) {
        body = &body[open.end()..];
    }
    if let Some(close) = CLOSE_FENCE.find(body) {
        body = &body[..close.start()];
    }
    body.trim()
}

/// Parse a (possibly fenced) model answer into enrichment records.
pub fn parse_enrichment(response: &str) -> Result<Vec<EnrichmentRecord>, EnrichError> {
    let body = strip_code_fences(response);
    serde_json::from_str::<Vec<EnrichmentRecord>>(body).map_err(|e| {
        if looks_truncated(&e) {
            warn!(error = %e, "Model answer looks truncated");
        }
        let preview = truncate_for_log(body, 300);
        warn!(error = %e, response_preview = %preview, "Model returned non-conforming JSON");
        EnrichError::Parse {
            message: e.to_string(),
            preview,
        }
    })
}

/// Left-join `records` onto `articles` by id, in place.
///
/// Article order is preserved; articles without a matching record keep
/// their (null) geolocation. When the model repeats an id, the first answer
/// wins. Returns how many articles matched.
pub fn left_join(articles: &mut [Article], records: &[EnrichmentRecord]) -> usize {
    let mut by_id: HashMap<&str, &EnrichmentRecord> = HashMap::with_capacity(records.len());
    for record in records {
        by_id.entry(record.id.as_str()).or_insert(record);
    }

    let mut matched = 0;
    for article in articles.iter_mut() {
        if let Some(record) = by_id.get(article.id.as_str()) {
            article.apply_enrichment(record);
            matched += 1;
        }
    }
    matched
}
