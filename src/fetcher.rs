//! Freshness-gated fetching of new snapshots.
//!
//! [`Fetcher::fetch_if_stale`] is the only place that talks to the news
//! source. When the newest snapshot is younger than the freshness threshold
//! it returns [`FetchOutcome::Skipped`] without a single network call, so
//! repeated page loads do not hammer the API.

use crate::config::Config;
use crate::error::NewsError;
use crate::models::{Article, RawStory, SnapshotDoc};
use crate::snapshots::SnapshotStore;
use crate::sources::NewsSource;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// What [`Fetcher::fetch_if_stale`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The newest snapshot is still fresh; nothing was fetched.
    Skipped { snapshot: String, age: Duration },
    /// A new snapshot was written.
    Fetched {
        snapshot: String,
        articles: usize,
        failed_sections: Vec<String>,
    },
    /// Every section failed; no snapshot was written.
    Failed { failed_sections: Vec<String> },
}

/// Fetches all configured sections into a new snapshot when the current one is stale.
#[derive(Debug)]
pub struct Fetcher<S> {
    pub(crate) source: S,
    store: SnapshotStore,
    sections: Vec<String>,
    max_articles: usize,
    freshness: Duration,
}

impl<S: NewsSource> Fetcher<S> {
    pub fn new(source: S, store: SnapshotStore, config: &Config) -> Self {
        Self {
            source,
            store,
            sections: config.settings.sections.clone(),
            max_articles: config.settings.max_articles,
            freshness: config.settings.freshness(),
        }
    }

    /// Fetch every section into a brand-new snapshot unless the newest one
    /// is still fresh.
    ///
    /// A failing section is logged and skipped. A missing credential aborts
    /// the whole fetch with [`NewsError::Configuration`].
    #[instrument(level = "info", skip_all, fields(sections = self.sections.len(), max_articles = self.max_articles))]
    pub async fn fetch_if_stale(&self) -> Result<FetchOutcome, NewsError> {
        match self.store.newest().await? {
            Some(newest) if newest.is_fresh(self.freshness) => {
                let age = newest.age_at(std::time::SystemTime::now());
                info!(name = %newest.name, ?age, "Newest snapshot is fresh; skipping fetch");
                return Ok(FetchOutcome::Skipped {
                    snapshot: newest.name,
                    age,
                });
            }
            Some(newest) => info!(name = %newest.name, "Newest snapshot is stale; fetching"),
            None => info!("No snapshots found; fetching immediately"),
        }

        if let Err(e) = self.source.ensure_configured() {
            error!(error = %e, "News source is not configured; aborting fetch");
            return Err(e);
        }

        let results: Vec<(String, Result<Vec<RawStory>, NewsError>)> = stream::iter(self.sections.iter())
            .then(|section| async move { (section.clone(), self.source.top_stories(section).await) })
            .collect()
            .await;

        let mut raw = Vec::new();
        let mut failed_sections = Vec::new();
        for (section, result) in results {
            match result {
                Ok(stories) => {
                    debug!(%section, count = stories.len(), "Section fetched");
                    raw.extend(stories);
                }
                Err(e @ NewsError::FetchTimeout { .. }) => {
                    warn!(%section, error = %e, "Section timed out; skipping");
                    failed_sections.push(section);
                }
                Err(e) => {
                    error!(%section, error = %e, "Section failed; skipping");
                    failed_sections.push(section);
                }
            }
        }

        if !self.sections.is_empty() && failed_sections.len() == self.sections.len() {
            error!("Every section failed; keeping the existing snapshots");
            return Ok(FetchOutcome::Failed { failed_sections });
        }

        let articles = normalize(raw, self.max_articles, self.source.label());
        let count = articles.len();
        let snapshot = self.store.create(&SnapshotDoc::new(articles)).await?;
        info!(name = %snapshot.name, articles = count, "Fetched new snapshot");

        Ok(FetchOutcome::Fetched {
            snapshot: snapshot.name,
            articles: count,
            failed_sections,
        })
    }
}

/// Truncate to `max_articles`, drop non-articles and items without a
/// location hint, and keep the first occurrence of every id.
pub fn normalize(raw: Vec<RawStory>, max_articles: usize, source: &str) -> Vec<Article> {
    raw.into_iter()
        .take(max_articles)
        .filter_map(|story| {
            let id = story.uri.clone();
            let article = story.into_article(source);
            if article.is_none() {
                debug!(%id, "Skipping non-article or item without location");
            }
            article
        })
        .unique_by(|a| a.id.clone())
        .collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::{MockSource, story};
    use super::*;
    use crate::config::{Config, Settings};
    use crate::snapshots::test_support::{names, set_age};

    fn config(sections: &[&str], max_articles: usize) -> Config {
        Config::for_tests(Settings {
            sections: sections.iter().map(|s| s.to_string()).collect(),
            max_articles,
            freshness_minutes: 30,
            ..Settings::default()
        })
    }

    #[test]
    fn test_normalize_truncates_then_filters_and_dedups() {
        let raw = vec![
            story("a", Some("Paris")),
            story("b", None),
            story("a", Some("Paris")),
            story("c", Some("Kyiv")),
            story("d", Some("Lima")),
        ];
        let articles = normalize(raw, 4, "NYT");
        let ids: Vec<_> = articles.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(articles.iter().all(|a| a.source == "NYT"));
    }

    #[tokio::test]
    async fn test_fetch_writes_new_snapshot_when_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let source = MockSource::with(&[
            ("world", vec![story("w1", Some("Paris")), story("w2", None)]),
            ("science", vec![story("s1", Some("Houston")), story("w1", Some("Paris"))]),
        ]);
        let fetcher = Fetcher::new(source, store.clone(), &config(&["world", "science"], 60));

        let outcome = fetcher.fetch_if_stale().await.unwrap();
        let FetchOutcome::Fetched { snapshot, articles, failed_sections } = outcome else {
            panic!("expected a fetch, got {outcome:?}");
        };
        assert_eq!(articles, 2);
        assert!(failed_sections.is_empty());
        assert_eq!(names(tmp.path()), vec![snapshot]);

        let doc = store.read(&store.newest().await.unwrap().unwrap()).await.unwrap();
        assert!(!doc.is_enriched());
        let ids: Vec<_> = doc.articles.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "s1"]);
    }

    #[tokio::test]
    async fn test_fresh_snapshot_skips_network() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        store.create(&SnapshotDoc::new(vec![])).await.unwrap();
        let before = names(tmp.path());

        let source = MockSource::with(&[("world", vec![story("w1", Some("Paris"))])]);
        let fetcher = Fetcher::new(source, store, &config(&["world"], 60));

        for _ in 0..3 {
            let outcome = fetcher.fetch_if_stale().await.unwrap();
            assert!(matches!(outcome, FetchOutcome::Skipped { .. }));
        }
        assert_eq!(fetcher.source.call_count(), 0);
        assert_eq!(names(tmp.path()), before);
    }

    #[tokio::test]
    async fn test_stale_snapshot_triggers_new_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let old = store.create(&SnapshotDoc::new(vec![])).await.unwrap();
        set_age(&old.path, Duration::from_secs(45 * 60));
        let old_content = std::fs::read(&old.path).unwrap();

        let source = MockSource::with(&[("world", vec![story("w1", Some("Paris"))])]);
        let fetcher = Fetcher::new(source, store.clone(), &config(&["world"], 60));

        let outcome = fetcher.fetch_if_stale().await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Fetched { articles: 1, .. }));
        assert_eq!(names(tmp.path()).len(), 2);
        assert_eq!(std::fs::read(&old.path).unwrap(), old_content);
        assert_ne!(store.newest().await.unwrap().unwrap().path, old.path);
    }

    #[tokio::test]
    async fn test_failed_section_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let source = MockSource::with(&[("world", vec![story("w1", Some("Paris"))])]);
        let fetcher = Fetcher::new(source, store, &config(&["broken", "timeout", "world"], 60));

        let outcome = fetcher.fetch_if_stale().await.unwrap();
        assert_eq!(
            outcome,
            FetchOutcome::Fetched {
                snapshot: names(tmp.path()).remove(0),
                articles: 1,
                failed_sections: vec!["broken".to_string(), "timeout".to_string()],
            }
        );
        assert_eq!(fetcher.source.call_count(), 3);
    }

    #[tokio::test]
    async fn test_all_sections_failing_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let fetcher = Fetcher::new(MockSource::with(&[]), store, &config(&["world", "us"], 60));

        let outcome = fetcher.fetch_if_stale().await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Failed { .. }));
        assert!(names(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_aborts_before_network() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let mut source = MockSource::with(&[("world", vec![story("w1", Some("Paris"))])]);
        source.configured = false;
        let fetcher = Fetcher::new(source, store, &config(&["world"], 60));

        let result = fetcher.fetch_if_stale().await;
        assert!(matches!(result, Err(NewsError::Configuration(_))));
        assert_eq!(fetcher.source.call_count(), 0);
    }
}
