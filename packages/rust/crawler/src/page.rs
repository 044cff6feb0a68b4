//! Loaded pages and the query capabilities extraction is defined on.
//!
//! A [`LoadedPage`] is the owned, `Send` result of a fetch. Extraction parses
//! it into a [`RawPage`] (a DOM that stays on the extracting thread) and talks
//! to it only through the [`PageQuery`] trait: counting matches, reading the
//! first match's text, and snapshotting a matched region into blocks.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

use lexcrawl_markdown::{BlockRenderer, normalize_text};

/// Tags whose subtrees never contribute content.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "button", "nav", "form",
];

/// Tags that start a new block when nested inside another element.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "table", "blockquote",
    "pre", "section", "article", "header", "footer", "dl", "dt", "dd",
];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A fetched page: final URL plus its markup.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub url: Url,
    pub html: String,
    pub status_code: Option<u16>,
}

impl LoadedPage {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
            status_code: None,
        }
    }
}

/// How many of a probe's matches make up the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    /// Only the first match.
    First,
    /// Every match, in document order.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Table,
}

/// One leaf unit of a structured region, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Plain text, whitespace collapsed.
    pub text: String,
    /// Markdown rendering of the block.
    pub markdown: String,
}

impl Block {
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind: BlockKind::Text,
            markdown: text.clone(),
            text,
        }
    }

    pub fn with_markdown(mut self, markdown: impl Into<String>) -> Self {
        self.markdown = markdown.into();
        self
    }
}

/// Snapshot of a matched region, detached from the DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSnapshot {
    /// Text content of the region.
    pub text: String,
    /// Whether any matched element has child elements.
    pub has_children: bool,
    /// Leaf blocks, empty when `has_children` is false.
    pub blocks: Vec<Block>,
}

/// The page capabilities the cascade resolver and metadata extractor need.
pub trait PageQuery {
    /// Number of elements matching `selector`.
    fn count(&self, selector: &str) -> usize;

    /// Whitespace-normalized text of the first match, if any.
    fn first_text(&self, selector: &str) -> Option<String>;

    /// Snapshot of the region formed by the first (or every) match.
    fn region(&self, selector: &str, span: Span) -> Option<RegionSnapshot>;
}

// ---------------------------------------------------------------------------
// RawPage
// ---------------------------------------------------------------------------

/// A parsed page, owned by a single extraction call.
pub struct RawPage {
    url: Url,
    doc: Html,
    renderer: BlockRenderer,
}

impl RawPage {
    pub fn parse(loaded: &LoadedPage) -> Self {
        Self::from_html(loaded.url.clone(), &loaded.html)
    }

    pub fn from_html(url: Url, html: &str) -> Self {
        let renderer = BlockRenderer::new(Some(url.clone()));
        Self {
            doc: Html::parse_document(html),
            url,
            renderer,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn matches(&self, selector: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(selector) {
            Ok(sel) => self.doc.select(&sel).collect(),
            Err(e) => {
                warn!(selector, error = %e, "invalid probe selector");
                Vec::new()
            }
        }
    }
}

impl PageQuery for RawPage {
    fn count(&self, selector: &str) -> usize {
        self.matches(selector).len()
    }

    fn first_text(&self, selector: &str) -> Option<String> {
        self.matches(selector)
            .first()
            .map(|el| normalize_text(&el.text().collect::<String>()))
    }

    fn region(&self, selector: &str, span: Span) -> Option<RegionSnapshot> {
        let mut roots = self.matches(selector);
        if span == Span::First {
            roots.truncate(1);
        }
        if roots.is_empty() {
            return None;
        }

        let has_children = roots
            .iter()
            .any(|root| root.children().any(|c| c.value().is_element()));

        if !has_children {
            let text = roots
                .iter()
                .map(|root| root.text().collect::<String>())
                .collect::<Vec<_>>()
                .join("\n");
            return Some(RegionSnapshot {
                text,
                has_children,
                blocks: Vec::new(),
            });
        }

        let text = roots
            .iter()
            .map(|root| tidy_text(root))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let mut blocks = Vec::new();
        for root in &roots {
            collect_children(root, &self.renderer, &mut blocks);
        }

        Some(RegionSnapshot {
            text,
            has_children,
            blocks,
        })
    }
}

// ---------------------------------------------------------------------------
// Block collection
// ---------------------------------------------------------------------------

fn collect_children(parent: &ElementRef, renderer: &BlockRenderer, out: &mut Vec<Block>) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => {
                let text = normalize_text(text);
                if !text.is_empty() {
                    out.push(Block::plain(text));
                }
            }
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    visit(&el, renderer, out);
                }
            }
            _ => {}
        }
    }
}

fn visit(el: &ElementRef, renderer: &BlockRenderer, out: &mut Vec<Block>) {
    let name = el.value().name();
    if SKIP_TAGS.contains(&name) {
        return;
    }

    if name == "table" {
        if let Some(markdown) = renderer.render(el) {
            out.push(Block {
                kind: BlockKind::Table,
                text: normalize_text(&el.text().collect::<Vec<_>>().join(" ")),
                markdown,
            });
        }
        return;
    }

    if has_block_descendant(el) {
        collect_children(el, renderer, out);
        return;
    }

    let text = normalize_text(&el.text().collect::<String>());
    if text.is_empty() {
        return;
    }
    let markdown = renderer.render(el).unwrap_or_else(|| text.clone());
    out.push(Block::plain(text).with_markdown(markdown));
}

fn has_block_descendant(el: &ElementRef) -> bool {
    el.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|d| BLOCK_TAGS.contains(&d.value().name()))
}

/// Text content outside skipped subtrees.
fn visible_text(el: &ElementRef) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node
                .ancestors()
                .take_while(|a| a.id() != el.id())
                .filter_map(ElementRef::wrap)
                .any(|a| SKIP_TAGS.contains(&a.value().name()));
            if !hidden {
                out.push_str(text);
            }
        }
    }
    out
}

/// Visible text with each line trimmed and blank lines dropped.
fn tidy_text(el: &ElementRef) -> String {
    visible_text(el)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
