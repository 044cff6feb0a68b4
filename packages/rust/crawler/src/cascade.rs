//! Selector cascade resolution.
//!
//! A single routine walks an ordered probe table and commits to the first
//! probe that yields a hit. Content location and every metadata field go
//! through it.

use tracing::debug;

use lexcrawl_shared::{LexcrawlError, Result};

use crate::layout::LayoutVariant;
use crate::page::{Block, PageQuery};
use crate::probes::{Field, Probe, content_probes, field_probes};

/// Walk `table` in order and return the first probe whose attempt hits.
pub fn cascade<'t, P, R>(
    table: &'t [P],
    mut attempt: impl FnMut(&'t P) -> Option<R>,
) -> Option<(&'t P, R)> {
    table
        .iter()
        .find_map(|probe| attempt(probe).map(|hit| (probe, hit)))
}

// ---------------------------------------------------------------------------
// Content wrapper
// ---------------------------------------------------------------------------

/// Payload of a located content region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrapperBody {
    /// The region has child elements; segmentation runs over its blocks.
    Structured { blocks: Vec<Block>, text: String },
    /// The region is bare text.
    Unstructured(String),
}

/// The located content region of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentWrapper {
    /// Selector of the probe that matched.
    pub probe: &'static str,
    pub body: WrapperBody,
}

impl ContentWrapper {
    pub fn is_structured(&self) -> bool {
        matches!(self.body, WrapperBody::Structured { .. })
    }

    /// Full text of the region.
    pub fn text(&self) -> &str {
        match &self.body {
            WrapperBody::Structured { text, .. } => text,
            WrapperBody::Unstructured(text) => text,
        }
    }
}

/// Locate the document body on `page`.
///
/// Commits to the first probe matching at least one element, even if that
/// region later turns out to hold no text.
pub fn resolve_content<P: PageQuery>(page: &P, variant: LayoutVariant) -> Result<ContentWrapper> {
    let table = content_probes(variant);
    let (probe, region) = cascade(table, |probe: &Probe| {
        if page.count(probe.selector) == 0 {
            return None;
        }
        page.region(probe.selector, probe.span)
    })
    .ok_or_else(|| LexcrawlError::extraction("no content wrapper"))?;

    debug!(
        probe = probe.selector,
        structured = region.has_children,
        blocks = region.blocks.len(),
        "content wrapper resolved"
    );

    let body = if region.has_children {
        WrapperBody::Structured {
            blocks: region.blocks,
            text: region.text,
        }
    } else {
        WrapperBody::Unstructured(region.text)
    };

    Ok(ContentWrapper {
        probe: probe.selector,
        body,
    })
}

/// First non-empty text among a field's probes.
pub fn resolve_field<P: PageQuery>(
    page: &P,
    variant: LayoutVariant,
    field: Field,
) -> Option<String> {
    cascade(field_probes(variant, field), |selector: &&'static str| {
        page.first_text(selector).filter(|text| !text.is_empty())
    })
    .map(|(selector, text)| {
        debug!(field = field.as_str(), probe = *selector, "field resolved");
        text
    })
}
