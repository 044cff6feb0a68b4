//! Article segmentation.
//!
//! Walks the leaf blocks of a content region in reading order and starts a
//! new chunk at every article heading. Text before the first heading becomes
//! a preamble chunk; a region without headings becomes one document chunk.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use lexcrawl_shared::{ArticleKind, ChunkMetadata, DocumentChunk, LexcrawlError, Result};

use crate::cascade::{ContentWrapper, WrapperBody};
use crate::page::Block;

/// `Artigo 12.º`, `Artigo 5.º-A`, `ARTIGO 3`, `Artigo único`.
const HEADING_PREFIX: &str =
    r"^(?i:artigo)\s+(?:(\d+)\s*\.?\s*[ºo°]?(?:\s*-\s*([A-Z]))?|(?i:(único|unico)))";

static HEADING_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"{HEADING_PREFIX}\s*\.?$")).expect("valid regex"));

static HEADING_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"{HEADING_PREFIX}\b")).expect("valid regex"));

/// Parsed article heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArticleHeading {
    pub number: u32,
    /// Letter of an inserted article, e.g. `A` in `Artigo 5.º-A`.
    pub suffix: Option<char>,
}

/// Parse a block's text as an article heading.
///
/// Accepts the whole text being a heading. `Artigo único` parses as number 1.
pub fn parse_article_heading(text: &str) -> Option<ArticleHeading> {
    heading_from(&HEADING_LINE_RE, text.trim())
}

fn heading_from(re: &Regex, text: &str) -> Option<ArticleHeading> {
    let caps = re.captures(text)?;
    if caps.get(3).is_some() {
        return Some(ArticleHeading {
            number: 1,
            suffix: None,
        });
    }
    let number = caps.get(1)?.as_str().parse().ok()?;
    let suffix = caps.get(2).and_then(|m| m.as_str().chars().next());
    Some(ArticleHeading { number, suffix })
}

/// A heading either stands alone in its block, or opens a block that is
/// rendered as a markdown heading (`### Artigo 1.º Objeto`).
fn block_heading(block: &Block) -> Option<ArticleHeading> {
    let text = block.text.trim();
    parse_article_heading(text).or_else(|| {
        if block.markdown.trim_start().starts_with('#') {
            heading_from(&HEADING_START_RE, text)
        } else {
            None
        }
    })
}

// ---------------------------------------------------------------------------
// Segmentation
// ---------------------------------------------------------------------------

struct Pending {
    kind: ArticleKind,
    number: u32,
    heading: Option<String>,
    parts: Vec<String>,
}

impl Pending {
    fn into_chunk(self, chunk_index: u32) -> Option<DocumentChunk> {
        let content = self
            .parts
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if content.is_empty() {
            return None;
        }
        Some(DocumentChunk {
            chunk_index,
            content,
            metadata: ChunkMetadata {
                article_number: self.number,
                article_type: self.kind,
                heading: self.heading,
            },
        })
    }
}

/// Segment a content region into ordered chunks.
///
/// Fails when the region yields no chunk at all.
pub fn segment(wrapper: &ContentWrapper) -> Result<Vec<DocumentChunk>> {
    let chunks = match &wrapper.body {
        WrapperBody::Structured { blocks, .. } => {
            let chunks = segment_blocks(blocks);
            if chunks.is_empty() {
                whole_document(wrapper.text())
            } else {
                chunks
            }
        }
        WrapperBody::Unstructured(text) => whole_document(text),
    };

    if chunks.is_empty() {
        return Err(LexcrawlError::extraction("no extractable content"));
    }
    debug!(chunks = chunks.len(), "segmented content");
    Ok(chunks)
}

/// Article chunks from structured blocks; empty if no heading occurs.
fn segment_blocks(blocks: &[Block]) -> Vec<DocumentChunk> {
    let mut pending = Vec::new();
    let mut current = Pending {
        kind: ArticleKind::Preamble,
        number: 0,
        heading: None,
        parts: Vec::new(),
    };
    let mut saw_heading = false;

    for block in blocks {
        if let Some(heading) = block_heading(block) {
            saw_heading = true;
            let next = Pending {
                kind: ArticleKind::Article,
                number: heading.number,
                heading: Some(block.text.trim().to_string()),
                parts: vec![block.markdown.clone()],
            };
            pending.push(std::mem::replace(&mut current, next));
        } else {
            current.parts.push(block.markdown.clone());
        }
    }
    pending.push(current);

    if !saw_heading {
        return Vec::new();
    }

    let mut chunks = Vec::with_capacity(pending.len());
    for p in pending {
        let index = chunks.len() as u32;
        if let Some(chunk) = p.into_chunk(index) {
            chunks.push(chunk);
        }
    }
    chunks
}

fn whole_document(text: &str) -> Vec<DocumentChunk> {
    Pending {
        kind: ArticleKind::Document,
        number: 0,
        heading: None,
        parts: vec![text.to_string()],
    }
    .into_chunk(0)
    .into_iter()
    .collect()
}
