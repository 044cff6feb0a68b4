//! Markdown rendering of archive content blocks.
//!
//! Gazette pages encode structure through paragraph classes rather than
//! heading tags. [`BlockRenderer`] maps those classes to Markdown headings and
//! emphasis, converts tables to pipe tables, and turns inline markup (links,
//! emphasis) into Markdown via `htmd`, followed by a small cleanup pipeline.

mod cleanup;

use scraper::{ElementRef, Selector};
use tracing::debug;
use url::Url;

// ---------------------------------------------------------------------------
// Paragraph styles
// ---------------------------------------------------------------------------

/// Presentation role of a paragraph, derived from its CSS classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    /// Diploma title (`# `).
    Title,
    /// Chapter or section heading (`## `).
    Section,
    /// Article heading (`### `).
    ArticleHeading,
    /// Article epigraph or sub-heading (`#### `).
    Subheading,
    /// Consolidated-text epigraph (`**bold**`).
    Epigraph,
    /// Right-aligned italic line, usually approval dates and signatures.
    Signature,
    /// Ordinary body text.
    Body,
}

/// Classify a paragraph by its `class` attribute and text.
pub fn paragraph_style(class_attr: &str, text: &str) -> BlockStyle {
    let has = |name: &str| class_attr.split_whitespace().any(|c| c == name);

    if has("paragraph-title-bold-center-18px") {
        BlockStyle::Title
    } else if has("paragraph-bold-center-14px") {
        BlockStyle::Subheading
    } else if has("paragraph-bold-center") {
        BlockStyle::Section
    } else if has("Fragmento_Titulo") || (has("paragraph-center") && text.starts_with("Artigo"))
    {
        BlockStyle::ArticleHeading
    } else if has("Fragmento_Epigrafe") {
        BlockStyle::Epigraph
    } else if has("paragraph-italic-right") {
        BlockStyle::Signature
    } else {
        BlockStyle::Body
    }
}

/// Collapse runs of whitespace (including newlines from source indentation)
/// into single spaces and trim.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders single content blocks to Markdown.
pub struct BlockRenderer {
    converter: htmd::HtmlToMarkdown,
    base_url: Option<Url>,
}

impl BlockRenderer {
    /// `base_url` resolves relative links found in body paragraphs.
    pub fn new(base_url: Option<Url>) -> Self {
        let converter = htmd::HtmlToMarkdown::builder()
            .skip_tags(vec!["script", "style", "noscript", "svg", "img"])
            .build();
        Self {
            converter,
            base_url,
        }
    }

    /// Render one block element. Returns `None` for blocks without text.
    pub fn render(&self, el: &ElementRef) -> Option<String> {
        let name = el.value().name();
        if name == "table" {
            let table = html_table_to_markdown(el);
            let table = table.trim();
            return (!table.is_empty()).then(|| table.to_string());
        }

        let text = normalize_text(&el.text().collect::<String>());
        if text.is_empty() {
            return None;
        }

        if let Some(level) = heading_level(name) {
            return Some(format!("{} {text}", "#".repeat(level)));
        }

        let class_attr = el.value().attr("class").unwrap_or_default();
        let rendered = match paragraph_style(class_attr, &text) {
            BlockStyle::Title => format!("# {text}"),
            BlockStyle::Section => format!("## {text}"),
            BlockStyle::ArticleHeading => format!("### {text}"),
            BlockStyle::Subheading => format!("#### {text}"),
            BlockStyle::Epigraph => format!("**{text}**"),
            BlockStyle::Signature => format!("*{text}*"),
            BlockStyle::Body => self.render_inline(el, &text),
        };
        Some(rendered)
    }

    /// Body text: plain text unless the element carries inline markup.
    fn render_inline(&self, el: &ElementRef, text: &str) -> String {
        let has_markup = el.children().any(|child| child.value().is_element());
        if !has_markup {
            return text.to_string();
        }

        match self.converter.convert(&el.inner_html()) {
            Ok(md) => {
                let cleaned = cleanup::run_pipeline(&md, self.base_url.as_ref());
                if cleaned.is_empty() {
                    text.to_string()
                } else {
                    cleaned
                }
            }
            Err(e) => {
                debug!(error = %e, "inline conversion failed, keeping plain text");
                text.to_string()
            }
        }
    }
}

fn heading_level(tag: &str) -> Option<usize> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Convert a single HTML table element to a markdown table string.
///
/// Gazette tables rarely use `<th>`; without one the first row becomes the
/// header.
pub fn html_table_to_markdown(table: &ElementRef) -> String {
    let (Ok(tr_sel), Ok(cell_sel)) = (Selector::parse("tr"), Selector::parse("th, td")) else {
        return String::new();
    };

    let rows: Vec<Vec<String>> = table
        .select(&tr_sel)
        .map(|tr| {
            tr.select(&cell_sel)
                .map(|cell| {
                    normalize_text(&cell.text().collect::<String>()).replace('|', "\\|")
                })
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();

    if rows.is_empty() {
        return String::new();
    }

    // Determine column count from the widest row
    let col_count = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }

    let format_row = |row: &[String]| {
        let mut cells = row.to_vec();
        cells.resize(col_count, String::new());
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format_row(&rows[0]));
    lines.push(format!(
        "| {} |",
        (0..col_count).map(|_| "---").collect::<Vec<_>>().join(" | ")
    ));
    for row in &rows[1..] {
        lines.push(format_row(row));
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
