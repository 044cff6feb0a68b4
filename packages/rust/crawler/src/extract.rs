//! Single-document extraction: classify, load, locate, read metadata, segment.

use tracing::{debug, info, instrument};
use url::Url;

use lexcrawl_shared::{DocumentChunk, LexcrawlError, Result};

use crate::cascade::resolve_content;
use crate::fetch::PageFetcher;
use crate::layout::{LayoutVariant, classify};
use crate::metadata::{DocumentMetadata, extract_metadata};
use crate::page::{LoadedPage, RawPage};
use crate::probes::ready_selectors;
use crate::segment::segment;

/// Everything extracted from one document page.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub url: Url,
    pub variant: LayoutVariant,
    pub metadata: DocumentMetadata,
    pub chunks: Vec<DocumentChunk>,
    /// Selector of the content probe that matched.
    pub content_probe: &'static str,
}

/// Extract a page that is already loaded, for a known variant.
///
/// Runs synchronously: the parsed DOM never leaves this call.
pub fn extract_loaded(page: &LoadedPage, variant: LayoutVariant) -> Result<ExtractedDocument> {
    let raw = RawPage::parse(page);
    let metadata = extract_metadata(&raw, variant)?;
    let wrapper = resolve_content(&raw, variant)?;
    let chunks = segment(&wrapper)?;

    debug!(
        url = %page.url,
        probe = wrapper.probe,
        chunks = chunks.len(),
        "document extracted"
    );

    Ok(ExtractedDocument {
        url: page.url.clone(),
        variant,
        metadata,
        chunks,
        content_probe: wrapper.probe,
    })
}

/// Load and extract one document URL.
///
/// Classification runs before any network access, so unrecognized URLs never
/// reach the fetcher. The fragment is dropped: the loaded page and the
/// returned document carry the same URL discovery would store.
#[instrument(skip_all, fields(url = %url))]
pub async fn extract_one<F: PageFetcher>(fetcher: &F, url: &str) -> Result<ExtractedDocument> {
    let variant = classify(url)?;
    let mut parsed = Url::parse(url.trim()).map_err(|_| LexcrawlError::classification(url))?;
    parsed.set_fragment(None);

    let page = fetcher.load(&parsed, ready_selectors(variant)).await?;
    let doc = extract_loaded(&page, variant)?;

    info!(
        variant = %variant,
        title = %doc.metadata.title,
        chunks = doc.chunks.len(),
        "extracted document"
    );
    Ok(doc)
}
