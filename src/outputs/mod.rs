//! Output generation: table shaping, row annotation and the HTML page.
//!
//! # Submodules
//!
//! - [`table`]: projects articles into display columns and renders HTML
//! - [`annotate`]: injects per-row metadata into the rendered markup
//! - [`page`]: wraps the table in the full page and writes it to disk
//!
//! [`TableAnnotator`] ties the first two together.

pub mod annotate;
pub mod page;
pub mod table;

use crate::error::RenderError;
use crate::models::SnapshotDoc;
use annotate::{RowMetadata, annotate_rows};
use table::{TableRenderer, TableTheme, displayable, project};
use tracing::{info, instrument};

/// Markup returned when there is no snapshot to show.
pub const PLACEHOLDER: &str = "<div class=\"no-data\"><p>No data available</p></div>\n";

/// Renders a snapshot into annotated table markup.
#[derive(Debug, Default)]
pub struct TableAnnotator<R> {
    renderer: R,
    theme: TableTheme,
}

impl<R: TableRenderer> TableAnnotator<R> {
    pub fn new(renderer: R, theme: TableTheme) -> Self {
        Self { renderer, theme }
    }

    /// Render `doc`, or [`PLACEHOLDER`] when there is none.
    ///
    /// Fails with [`RenderError::RowAlignment`] if the renderer's row count
    /// differs from the number of surviving articles.
    #[instrument(level = "info", skip_all, fields(has_snapshot = doc.is_some()))]
    pub fn render(&self, doc: Option<&SnapshotDoc>) -> Result<String, RenderError> {
        let Some(doc) = doc else {
            info!("No snapshot available; returning placeholder");
            return Ok(PLACEHOLDER.to_string());
        };

        let articles = displayable(doc.articles.clone());
        let metadata: Vec<RowMetadata> = articles.iter().map(RowMetadata::from).collect();
        let table = project(&articles);
        let html = self.renderer.render(&table, &self.theme);

        let annotated = annotate_rows(&html, &metadata)?;
        info!(
            rows = metadata.len(),
            dropped = doc.articles.len() - metadata.len(),
            "Rendered annotated table"
        );
        Ok(annotated)
    }
}

#[cfg(test)]
mod tests {
    use super::table::{DisplayTable, HtmlTableRenderer};
    use super::*;
    use crate::models::fixtures;
    use scraper::{Html, Selector};

    /// Renderer that silently drops the last row, like a renderer doing its
    /// own deduplication would.
    struct LossyRenderer;

    impl TableRenderer for LossyRenderer {
        fn render(&self, table: &DisplayTable, theme: &TableTheme) -> String {
            let mut trimmed = table.clone();
            trimmed.rows.pop();
            HtmlTableRenderer.render(&trimmed, theme)
        }
    }

    fn doc() -> SnapshotDoc {
        let paris = fixtures::enriched("a", "Paris", "France", 48.85, 2.35);
        let mut lima = fixtures::enriched("b", "Lima", "Peru", -12.05, -77.04);
        lima.published_at = "2025-05-07T01:00:00-04:00".to_string();
        let unplaced = fixtures::article("c");
        let kyiv = fixtures::enriched("d", "Kyiv", "Ukraine", 50.45, 30.52);
        SnapshotDoc {
            enriched_at: Some("2025-05-07T02:00:00Z".to_string()),
            articles: vec![paris.clone(), lima, unplaced, paris, kyiv],
        }
    }

    #[test]
    fn test_no_snapshot_returns_placeholder() {
        let annotator = TableAnnotator::new(HtmlTableRenderer, TableTheme::default());
        let html = annotator.render(None).unwrap();
        assert!(html.contains("No data available"));
    }

    #[test]
    fn test_rows_carry_metadata_of_filtered_articles_in_order() {
        let annotator = TableAnnotator::new(HtmlTableRenderer, TableTheme::default());
        let html = annotator.render(Some(&doc())).unwrap();

        let document = Html::parse_fragment(&html);
        let rows = Selector::parse("tbody tr").unwrap();
        let got: Vec<(String, String, String)> = document
            .select(&rows)
            .map(|r| {
                let v = r.value();
                (
                    v.attr("title").unwrap().to_string(),
                    v.attr("data-lat").unwrap().to_string(),
                    v.attr("data-lng").unwrap().to_string(),
                )
            })
            .collect();

        assert_eq!(
            got,
            vec![
                ("2025-05-06T14:30:00-04:00".into(), "48.85".into(), "2.35".into()),
                ("2025-05-07T01:00:00-04:00".into(), "-12.05".into(), "-77.04".into()),
                ("2025-05-06T14:30:00-04:00".into(), "50.45".into(), "30.52".into()),
            ]
        );
    }

    #[test]
    fn test_renderer_row_loss_fails_loudly() {
        let annotator = TableAnnotator::new(LossyRenderer, TableTheme::default());
        let err = annotator.render(Some(&doc())).unwrap_err();
        assert!(matches!(err, RenderError::RowAlignment { rows: 2, metadata: 3 }));
    }
}
