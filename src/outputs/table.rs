//! Table shaping and HTML rendering.
//!
//! Articles are projected into three display columns, in this order:
//!
//! | Column  | Content                                  |
//! |---------|------------------------------------------|
//! | `story` | title over description                   |
//! | `place` | city over country                        |
//! | `link`  | external-link icon pointing at the `url` |
//!
//! Cells are pre-escaped HTML fragments with inline styling. The
//! [`TableRenderer`] turns the projected table into markup with exactly one
//! `<tr>` per data row, in input order; the annotation pass relies on that.

use crate::models::Article;
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;

/// Horizontal alignment of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    fn as_css(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub width: &'static str,
    pub align: Align,
}

/// Column set shared with the page's client-side script.
pub const COLUMNS: [ColumnSpec; 3] = [
    ColumnSpec {
        name: "story",
        label: "Story",
        width: "72%",
        align: Align::Left,
    },
    ColumnSpec {
        name: "place",
        label: "Location",
        width: "20%",
        align: Align::Left,
    },
    ColumnSpec {
        name: "link",
        label: "Link",
        width: "8%",
        align: Align::Center,
    },
];

/// A projected table: column specs plus rows of HTML cell fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTable {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<String>>,
}

/// Table-wide presentation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTheme {
    pub background: String,
    pub font_family: String,
    pub font_size: String,
    pub font_color: String,
    pub hide_headers: bool,
}

impl Default for TableTheme {
    fn default() -> Self {
        Self {
            background: "#0b1d2a".to_string(),
            font_family: "'Helvetica Neue', Helvetica, Arial, sans-serif".to_string(),
            font_size: "14px".to_string(),
            font_color: "#e6edf3".to_string(),
            hide_headers: true,
        }
    }
}

/// Turns a [`DisplayTable`] into HTML.
///
/// Implementations must emit one row-opening tag per data row, in input
/// order, inside a `<tbody>`.
pub trait TableRenderer {
    fn render(&self, table: &DisplayTable, theme: &TableTheme) -> String;
}

/// Plain HTML renderer, one element per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlTableRenderer;

impl TableRenderer for HtmlTableRenderer {
    fn render(&self, table: &DisplayTable, theme: &TableTheme) -> String {
        let mut html = String::new();
        let _ = writeln!(
            html,
            "<table class=\"news-table\" style=\"width:100%;border-collapse:collapse;background-color:{};font-family:{};font-size:{};color:{}\">",
            encode_double_quoted_attribute(&theme.background),
            encode_double_quoted_attribute(&theme.font_family),
            encode_double_quoted_attribute(&theme.font_size),
            encode_double_quoted_attribute(&theme.font_color),
        );

        html.push_str("<colgroup>\n");
        for column in &table.columns {
            let _ = writeln!(html, "<col style=\"width:{}\"/>", column.width);
        }
        html.push_str("</colgroup>\n");

        if theme.hide_headers {
            html.push_str("<thead style=\"display:none\">\n");
        } else {
            html.push_str("<thead>\n");
        }
        html.push_str("<tr>\n");
        for column in &table.columns {
            let _ = writeln!(
                html,
                "<th style=\"text-align:{}\">{}</th>",
                column.align.as_css(),
                encode_text(column.label)
            );
        }
        html.push_str("</tr>\n</thead>\n<tbody>\n");

        for row in &table.rows {
            html.push_str("<tr>\n");
            for (column, cell) in table.columns.iter().zip(row) {
                let _ = writeln!(
                    html,
                    "<td style=\"text-align:{};vertical-align:top;padding:6px 8px;border-bottom:1px solid rgba(255,255,255,0.08)\">{}</td>",
                    column.align.as_css(),
                    cell
                );
            }
            html.push_str("</tr>\n");
        }

        html.push_str("</tbody>\n</table>\n");
        html
    }
}

/// Drop articles the model could not place and collapse identical rows,
/// keeping the first occurrence.
pub fn displayable(articles: Vec<Article>) -> Vec<Article> {
    let mut kept: Vec<Article> = Vec::with_capacity(articles.len());
    for article in articles {
        if article.country.is_none() || kept.contains(&article) {
            continue;
        }
        kept.push(article);
    }
    kept
}

/// Project articles into the display columns.
pub fn project(articles: &[Article]) -> DisplayTable {
    DisplayTable {
        columns: COLUMNS.to_vec(),
        rows: articles
            .iter()
            .map(|a| vec![story_cell(a), place_cell(a), link_cell(a)])
            .collect(),
    }
}

fn story_cell(article: &Article) -> String {
    let mut cell = format!(
        "<div style=\"font-size:15px;font-weight:600;color:#ffffff\">{}</div>",
        encode_text(&article.title)
    );
    if let Some(description) = article.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = write!(
            cell,
            "<div style=\"font-size:12px;color:#9fb3c8;margin-top:2px\">{}</div>",
            encode_text(description)
        );
    }
    cell
}

fn place_cell(article: &Article) -> String {
    format!(
        "<div style=\"font-size:13px;color:#ffffff\">{}</div><div style=\"font-size:11px;color:#9fb3c8\">{}</div>",
        encode_text(article.city.as_deref().unwrap_or_default()),
        encode_text(article.country.as_deref().unwrap_or_default())
    )
}

fn link_cell(article: &Article) -> String {
    format!(
        "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\" title=\"Read on {}\" style=\"font-size:18px;color:#58a6ff;text-decoration:none\">&#8599;</a>",
        encode_double_quoted_attribute(&article.url),
        encode_double_quoted_attribute(&article.source)
    )
}
