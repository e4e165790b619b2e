//! Per-row metadata injection into rendered table markup.
//!
//! The renderer cannot attach arbitrary attributes to rows, so after
//! rendering the markup is split into [`RowFragments`]: everything before the
//! first body row, one fragment per `<tr>` inside `<tbody>`, and everything
//! after the body. Row N receives the Nth [`RowMetadata`] entry as
//! `title`, `data-lat` and `data-lng` attributes.
//!
//! A row/metadata count mismatch is an error, never a partial annotation.

use crate::error::RenderError;
use crate::models::Article;
use html_escape::encode_double_quoted_attribute;
use once_cell::sync::Lazy;
use regex::Regex;

static TBODY_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<tbody\b[^>]*>").unwrap());
static TBODY_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</tbody\s*>").unwrap());
static ROW_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<tr\b[^>]*>").unwrap());

/// Values attached to one rendered row, taken from the pre-projection article.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMetadata {
    pub published_at: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<&Article> for RowMetadata {
    fn from(article: &Article) -> Self {
        Self {
            published_at: article.published_at.clone(),
            latitude: article.latitude,
            longitude: article.longitude,
        }
    }
}

impl RowMetadata {
    fn attributes(&self) -> String {
        let coord = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        format!(
            " title=\"{}\" data-lat=\"{}\" data-lng=\"{}\"",
            encode_double_quoted_attribute(&self.published_at),
            coord(self.latitude),
            coord(self.longitude)
        )
    }
}

/// One body row: its opening tag and everything up to the next row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFragment<'a> {
    pub open_tag: &'a str,
    pub rest: &'a str,
}

impl RowFragment<'_> {
    fn annotated_open_tag(&self, metadata: &RowMetadata) -> String {
        let (head, close) = match self.open_tag.strip_suffix("/>") {
            Some(head) => (head, "/>"),
            None => (self.open_tag.strip_suffix('>').unwrap_or(self.open_tag), ">"),
        };
        format!("{}{}{}", head.trim_end(), metadata.attributes(), close)
    }
}

/// Rendered table markup split around its body rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFragments<'a> {
    pub head: &'a str,
    pub rows: Vec<RowFragment<'a>>,
    pub tail: &'a str,
}

impl<'a> RowFragments<'a> {
    /// Split `html` into head, body rows and tail. Rows outside `<tbody>`
    /// (the header row) stay in `head`.
    pub fn parse(html: &'a str) -> Result<Self, RenderError> {
        let body_start = TBODY_OPEN
            .find(html)
            .map(|m| m.end())
            .ok_or(RenderError::MissingTableBody)?;
        let body_end = TBODY_CLOSE
            .find_at(html, body_start)
            .map(|m| m.start())
            .ok_or(RenderError::MissingTableBody)?;
        let body = &html[body_start..body_end];

        let starts: Vec<(usize, usize)> = ROW_OPEN
            .find_iter(body)
            .map(|m| (body_start + m.start(), body_start + m.end()))
            .collect();

        let head_end = starts.first().map(|(s, _)| *s).unwrap_or(body_end);
        let rows = starts
            .iter()
            .enumerate()
            .map(|(i, &(start, end))| {
                let next = starts.get(i + 1).map(|(s, _)| *s).unwrap_or(body_end);
                RowFragment {
                    open_tag: &html[start..end],
                    rest: &html[end..next],
                }
            })
            .collect();

        Ok(Self {
            head: &html[..head_end],
            rows,
            tail: &html[body_end..],
        })
    }

    /// Reassemble the markup with row N carrying `metadata[N]`.
    pub fn annotate(&self, metadata: &[RowMetadata]) -> Result<String, RenderError> {
        if self.rows.len() != metadata.len() {
            return Err(RenderError::RowAlignment {
                rows: self.rows.len(),
                metadata: metadata.len(),
            });
        }

        let mut out = String::with_capacity(self.head.len() + self.tail.len() + self.rows.len() * 256);
        out.push_str(self.head);
        for (row, meta) in self.rows.iter().zip(metadata) {
            out.push_str(&row.annotated_open_tag(meta));
            out.push_str(row.rest);
        }
        out.push_str(self.tail);
        Ok(out)
    }
}

/// Parse `html` and inject `metadata` into its body rows.
pub fn annotate_rows(html: &str, metadata: &[RowMetadata]) -> Result<String, RenderError> {
    RowFragments::parse(html)?.annotate(metadata)
}
