//! Probe tables: ordered structural selectors per layout variant and field.
//!
//! Order encodes observed prevalence across eras of the archive: modern
//! layout ids first, legacy ids next, attribute-suffix matches after that,
//! class-based fallbacks last.

use crate::layout::LayoutVariant;
use crate::page::Span;

/// One structural probe for the content region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub selector: &'static str,
    pub span: Span,
}

impl Probe {
    const fn first(selector: &'static str) -> Self {
        Self {
            selector,
            span: Span::First,
        }
    }

    const fn all(selector: &'static str) -> Self {
        Self {
            selector,
            span: Span::All,
        }
    }
}

/// Metadata fields resolved by cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    OfficialNumber,
    PublicationDate,
    DocumentType,
    Author,
    Summary,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::OfficialNumber => "official_number",
            Self::PublicationDate => "publication_date",
            Self::DocumentType => "document_type",
            Self::Author => "author",
            Self::Summary => "summary",
        }
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

const DETAIL_CONTENT: &[Probe] = &[
    Probe::first("div#b7-b11-InjectHTMLWrapper"),
    Probe::first("div#b7-b7-InjectHTMLWrapper"),
    Probe::first("div[id$=\"-InjectHTMLWrapper\"]"),
    Probe::first("div.texto_sumario"),
    Probe::first(".content-wrapper"),
    Probe::first(".law-content"),
    Probe::first("#content"),
    Probe::first("main"),
];

const CONSOLIDATED_CONTENT: &[Probe] = &[
    Probe::all("div[data-block=\"LegislacaoConsolidada.FragmentoDetailTextoCompleto\"]"),
    Probe::first("div[id$=\"-TextoCompleto\"]"),
    Probe::first("div[id$=\"-InjectHTMLWrapper\"]"),
    Probe::all("div.Fragmento_Texto"),
    Probe::first("main"),
];

/// Ordered content probes for a variant.
pub fn content_probes(variant: LayoutVariant) -> &'static [Probe] {
    match variant {
        LayoutVariant::Detail => DETAIL_CONTENT,
        LayoutVariant::ConsolidatedLegislation => CONSOLIDATED_CONTENT,
    }
}

// ---------------------------------------------------------------------------
// Metadata fields
// ---------------------------------------------------------------------------

const DETAIL_TITLE: &[&str] = &[
    "h1[data-advancedhtml] span[data-expression]",
    "h1.document-title",
    "h1",
    ".document-title",
];
const DETAIL_NUMBER: &[&str] = &["div#b7-Numero2 span[data-expression]", ".document-number"];
const DETAIL_DATE: &[&str] = &[
    "div#b7-DataPublicacao2 span[data-expression]",
    ".publication-date",
    ".date",
];
const DETAIL_TYPE: &[&str] = &["div#b7-TipoDiploma2 span[data-expression]", ".document-type"];
const DETAIL_AUTHOR: &[&str] = &[
    "div#b7-Emissor2 span[data-expression]",
    ".emitting-entity",
    ".entity",
];
const DETAIL_SUMMARY: &[&str] = &[
    "div#b7-Sumario_Conteudo4 div[data-container]",
    ".summary",
    ".sumario",
];

const CONSOLIDATED_TITLE: &[&str] = &[
    "div#Designacao h1 span[data-expression]",
    "h1 span.heading1",
    "h1",
];
const CONSOLIDATED_NUMBER: &[&str] = &["div#Numero span[data-expression]"];
const CONSOLIDATED_DATE: &[&str] = &[
    "div#Modificado span[data-expression]",
    ".publication-info",
];
const CONSOLIDATED_TYPE: &[&str] = &[
    "div#ConteudoTitle span[data-expression]",
    "div.document-type",
];
const CONSOLIDATED_AUTHOR: &[&str] = &["div#Emissor span[data-expression]"];
const CONSOLIDATED_SUMMARY: &[&str] = &["div#Sumario span[data-expression]"];

/// Ordered selectors for one metadata field of a variant.
pub fn field_probes(variant: LayoutVariant, field: Field) -> &'static [&'static str] {
    use Field::*;
    use LayoutVariant::*;

    match (variant, field) {
        (Detail, Title) => DETAIL_TITLE,
        (Detail, OfficialNumber) => DETAIL_NUMBER,
        (Detail, PublicationDate) => DETAIL_DATE,
        (Detail, DocumentType) => DETAIL_TYPE,
        (Detail, Author) => DETAIL_AUTHOR,
        (Detail, Summary) => DETAIL_SUMMARY,
        (ConsolidatedLegislation, Title) => CONSOLIDATED_TITLE,
        (ConsolidatedLegislation, OfficialNumber) => CONSOLIDATED_NUMBER,
        (ConsolidatedLegislation, PublicationDate) => CONSOLIDATED_DATE,
        (ConsolidatedLegislation, DocumentType) => CONSOLIDATED_TYPE,
        (ConsolidatedLegislation, Author) => CONSOLIDATED_AUTHOR,
        (ConsolidatedLegislation, Summary) => CONSOLIDATED_SUMMARY,
    }
}

/// Selectors that signal the page has rendered far enough to extract.
pub fn ready_selectors(variant: LayoutVariant) -> &'static [&'static str] {
    match variant {
        LayoutVariant::Detail => &["h1", "div[id$=\"-InjectHTMLWrapper\"]"],
        LayoutVariant::ConsolidatedLegislation => &["h1", "div.Fragmento_Texto"],
    }
}
