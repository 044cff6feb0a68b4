//! Page loading and document extraction for the Diário da República archive.
//!
//! This crate provides:
//! - [`layout`]: URL classification into page layout variants
//! - [`fetch`]: the [`PageFetcher`] seam and its HTTP implementation
//! - [`page`]: loaded pages and the query capabilities extraction relies on
//! - [`probes`] and [`cascade`]: ordered selector tables and their resolver
//! - [`metadata`]: header metadata extraction
//! - [`segment`]: article segmentation into chunks
//! - [`extract`]: the single-document extraction entry points

pub mod cascade;
pub mod extract;
pub mod fetch;
pub mod layout;
pub mod metadata;
pub mod page;
pub mod probes;
pub mod segment;

pub use cascade::{ContentWrapper, WrapperBody, cascade, resolve_content, resolve_field};
pub use extract::{ExtractedDocument, extract_loaded, extract_one};
pub use fetch::{HttpFetcher, PageFetcher, is_ssrf_target};
pub use layout::{LayoutVariant, classify};
pub use metadata::{
    DocumentMetadata, document_type_from_title, extract_metadata, official_number_from_title,
    parse_publication_date,
};
pub use page::{Block, BlockKind, LoadedPage, PageQuery, RawPage, RegionSnapshot, Span};
pub use probes::{Field, Probe, content_probes, field_probes, ready_selectors};
pub use segment::{ArticleHeading, parse_article_heading, segment};
