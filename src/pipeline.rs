//! The per-request pipeline: cull → fetch → enrich → render.
//!
//! [`Pipeline::render`] runs every stage sequentially under one lock so two
//! callers sharing a pipeline never interleave their fetch-then-enrich
//! read-modify-write on the same snapshot. Fetch and enrichment failures
//! degrade the result instead of failing it; only a broken row alignment or
//! an unreadable snapshot directory is returned as an error.

use crate::api::AskAsync;
use crate::config::Config;
use crate::enricher::{EnrichOutcome, Enricher};
use crate::error::PipelineError;
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::models::SnapshotDoc;
use crate::outputs::TableAnnotator;
use crate::outputs::table::{TableRenderer, TableTheme};
use crate::snapshots::{CullReport, SnapshotStore};
use crate::sources::NewsSource;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// What one [`Pipeline::render`] call did, plus the markup it produced.
#[derive(Debug)]
pub struct Rendered {
    pub html: String,
    pub culled: CullReport,
    /// `None` when the fetch errored (see logs).
    pub fetch: Option<FetchOutcome>,
    /// `None` when enrichment errored (see logs).
    pub enrich: Option<EnrichOutcome>,
    /// Snapshot the table was rendered from, if any.
    pub rendered_from: Option<String>,
}

#[derive(Debug)]
pub struct Pipeline<S, A, R> {
    store: SnapshotStore,
    fetcher: Fetcher<S>,
    enricher: Enricher<A>,
    annotator: TableAnnotator<R>,
    max_snapshots: usize,
    max_age: Duration,
    lock: Mutex<()>,
}

impl<S, A, R> Pipeline<S, A, R>
where
    S: NewsSource,
    A: AskAsync<Response = String>,
    R: TableRenderer,
{
    pub fn new(source: S, client: A, renderer: R, config: &Config) -> Self {
        let store = SnapshotStore::new(&config.snapshot_dir);
        Self {
            fetcher: Fetcher::new(source, store.clone(), config),
            enricher: Enricher::new(client, store.clone(), config),
            annotator: TableAnnotator::new(renderer, TableTheme::default()),
            store,
            max_snapshots: config.settings.max_snapshots,
            max_age: config.settings.max_age(),
            lock: Mutex::new(()),
        }
    }

    /// Produce the current table markup.
    #[instrument(level = "info", skip_all)]
    pub async fn render(&self) -> Result<Rendered, PipelineError> {
        let _guard = self.lock.lock().await;

        let culled = self.store.cull(self.max_snapshots, self.max_age).await;
        if culled.removed() > 0 || !culled.failed.is_empty() {
            info!(removed = culled.removed(), failed = culled.failed.len(), "Culled snapshots");
        }

        let fetch = match self.fetcher.fetch_if_stale().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(error = %e, "Fetch failed; using existing snapshots");
                None
            }
        };

        let enrich = match self.enricher.enrich_if_needed().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(error = %e, "Enrichment unavailable this cycle");
                None
            }
        };

        let current = self.newest_enriched().await?;
        let rendered_from = current.as_ref().map(|(name, _)| name.clone());
        let html = self.annotator.render(current.as_ref().map(|(_, doc)| doc))?;

        Ok(Rendered {
            html,
            culled,
            fetch,
            enrich,
            rendered_from,
        })
    }

    /// The newest snapshot that carries geolocation.
    ///
    /// Normally this is simply the newest snapshot; when the latest
    /// enrichment failed it is the previous enriched one.
    async fn newest_enriched(&self) -> Result<Option<(String, SnapshotDoc)>, PipelineError> {
        for (i, snapshot) in self.store.list().await?.into_iter().enumerate() {
            match self.store.read(&snapshot).await {
                Ok(doc) if doc.is_enriched() => {
                    if i > 0 {
                        warn!(name = %snapshot.name, "Rendering an older snapshot; newest is not enriched yet");
                    }
                    return Ok(Some((snapshot.name, doc)));
                }
                Ok(_) => {}
                Err(e) => warn!(name = %snapshot.name, error = %e, "Skipping unreadable snapshot"),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::enricher::test_support::MockModel;
    use crate::error::RenderError;
    use crate::fetcher::test_support::{MockSource, story};
    use crate::outputs::table::{DisplayTable, HtmlTableRenderer};
    use crate::snapshots::test_support::set_age;

    const ANSWER: &str = r#"```json
[
  {"id": "w1", "city": "Paris", "country": "France", "latitude": 48.85, "longitude": 2.35},
  {"id": "s1", "city": "Houston", "country": "United States", "latitude": 29.76, "longitude": -95.37}
]
```"#;

    fn config(dir: &std::path::Path) -> Config {
        let mut config = Config::for_tests(Settings {
            sections: vec!["world".to_string(), "science".to_string()],
            ..Settings::default()
        });
        config.snapshot_dir = dir.to_path_buf();
        config
    }

    fn source() -> MockSource {
        MockSource::with(&[
            ("world", vec![story("w1", Some("France")), story("w2", Some("Atlantis"))]),
            ("science", vec![story("s1", Some("Texas"))]),
        ])
    }

    #[tokio::test]
    async fn test_empty_dir_and_failing_fetch_renders_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            MockSource::with(&[]),
            MockModel::answering(ANSWER),
            HtmlTableRenderer,
            &config(tmp.path()),
        );

        let rendered = pipeline.render().await.unwrap();
        assert!(rendered.html.contains("No data available"));
        assert!(matches!(rendered.fetch, Some(FetchOutcome::Failed { .. })));
        assert_eq!(rendered.enrich, Some(EnrichOutcome::NoSnapshot));
        assert_eq!(rendered.rendered_from, None);
    }

    #[test]
    fn test_pipeline_debug_output() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(source(), MockModel::answering(ANSWER), HtmlTableRenderer, &config(tmp.path()));

        let dump = format!("{pipeline:?}");
        assert!(dump.starts_with("Pipeline"));
        assert!(dump.contains("max_snapshots: 5"));
    }

    #[tokio::test]
    async fn test_full_cycle_then_cached_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(source(), MockModel::answering(ANSWER), HtmlTableRenderer, &config(tmp.path()));

        let first = pipeline.render().await.unwrap();
        assert!(matches!(first.fetch, Some(FetchOutcome::Fetched { articles: 3, .. })));
        assert!(matches!(first.enrich, Some(EnrichOutcome::Enriched { matched: 2, total: 3, .. })));
        assert_eq!(first.html.matches("data-lat=").count(), 2);
        assert!(first.html.contains("data-lat=\"48.85\" data-lng=\"2.35\""));
        assert!(first.html.contains("data-lat=\"29.76\" data-lng=\"-95.37\""));
        assert!(!first.html.contains("Story w2"));

        let second = pipeline.render().await.unwrap();
        assert!(matches!(second.fetch, Some(FetchOutcome::Skipped { .. })));
        assert!(matches!(second.enrich, Some(EnrichOutcome::Skipped { .. })));
        assert_eq!(second.html, first.html);
        assert_eq!(pipeline.fetcher.source.call_count(), 2);
        assert_eq!(pipeline.enricher.client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_enrichment_failure_falls_back_to_previous_enriched_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());

        let good = Pipeline::new(source(), MockModel::answering(ANSWER), HtmlTableRenderer, &cfg);
        let first = good.render().await.unwrap();
        let first_name = first.rendered_from.clone().unwrap();
        let newest = good.store.newest().await.unwrap().unwrap();
        set_age(&newest.path, Duration::from_secs(45 * 60));

        let flaky = Pipeline::new(source(), MockModel::failing("model overloaded"), HtmlTableRenderer, &cfg);
        let second = flaky.render().await.unwrap();
        assert!(matches!(second.fetch, Some(FetchOutcome::Fetched { .. })));
        assert_eq!(second.enrich, None);
        assert_eq!(second.rendered_from, Some(first_name));
        assert_eq!(second.html, first.html);
        assert_eq!(good.store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_model_still_fetches_and_renders_previous_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path());

        let good = Pipeline::new(source(), MockModel::answering(ANSWER), HtmlTableRenderer, &cfg);
        let first = good.render().await.unwrap();
        let newest = good.store.newest().await.unwrap().unwrap();
        set_age(&newest.path, Duration::from_secs(45 * 60));

        let unconfigured = Pipeline::new(source(), None::<MockModel>, HtmlTableRenderer, &cfg);
        let second = unconfigured.render().await.unwrap();
        assert!(matches!(second.fetch, Some(FetchOutcome::Fetched { articles: 3, .. })));
        assert_eq!(second.enrich, None);
        assert_eq!(second.rendered_from, first.rendered_from);
        assert_eq!(second.html, first.html);

        let newest = unconfigured.store.newest().await.unwrap().unwrap();
        assert!(!unconfigured.store.read(&newest).await.unwrap().is_enriched());
    }

    #[tokio::test]
    async fn test_timed_out_fetch_still_renders_previous_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let good = Pipeline::new(source(), MockModel::answering(ANSWER), HtmlTableRenderer, &config(tmp.path()));
        let first = good.render().await.unwrap();
        let newest = good.store.newest().await.unwrap().unwrap();
        set_age(&newest.path, Duration::from_secs(45 * 60));

        let mut stalled_cfg = config(tmp.path());
        stalled_cfg.settings.sections = vec!["timeout".to_string()];
        let stalled = Pipeline::new(MockSource::with(&[]), MockModel::answering(ANSWER), HtmlTableRenderer, &stalled_cfg);

        let second = stalled.render().await.unwrap();
        assert_eq!(
            second.fetch,
            Some(FetchOutcome::Failed {
                failed_sections: vec!["timeout".to_string()]
            })
        );
        assert!(matches!(second.enrich, Some(EnrichOutcome::Skipped { .. })));
        assert_eq!(second.rendered_from, first.rendered_from);
        assert_eq!(second.html, first.html);
        assert_eq!(stalled.enricher.client.call_count(), 0);
        assert_eq!(stalled.store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_renders_fetch_once() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(source(), MockModel::answering(ANSWER), HtmlTableRenderer, &config(tmp.path()));

        let (a, b) = tokio::join!(pipeline.render(), pipeline.render());
        assert_eq!(a.unwrap().html, b.unwrap().html);
        assert_eq!(pipeline.fetcher.source.call_count(), 2);
        assert_eq!(pipeline.enricher.client.call_count(), 1);
        assert_eq!(pipeline.store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_row_alignment_error_propagates() {
        struct DroppingRenderer;

        impl TableRenderer for DroppingRenderer {
            fn render(&self, table: &DisplayTable, theme: &TableTheme) -> String {
                let mut t = table.clone();
                t.rows.truncate(1);
                HtmlTableRenderer.render(&t, theme)
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(source(), MockModel::answering(ANSWER), DroppingRenderer, &config(tmp.path()));

        let err = pipeline.render().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Render(RenderError::RowAlignment { rows: 1, metadata: 2 })
        ));
    }
}
