//! Metadata extraction from page header regions.
//!
//! Each field is resolved through its own probe cascade. Only the title is
//! mandatory; other fields fall back to values derived from the title or to
//! `None`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::warn;

use lexcrawl_shared::{LexcrawlError, Result};

use crate::cascade::resolve_field;
use crate::layout::LayoutVariant;
use crate::page::PageQuery;
use crate::probes::Field;

/// Header metadata of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: String,
    /// E.g. `2/2025` from "Lei n.º 2/2025".
    pub official_number: Option<String>,
    pub published_at: Option<NaiveDate>,
    pub document_type: Option<String>,
    /// Emitting entity.
    pub author: Option<String>,
    pub summary: Option<String>,
}

/// Extract header metadata. Fails only when no title can be found.
pub fn extract_metadata<P: PageQuery>(page: &P, variant: LayoutVariant) -> Result<DocumentMetadata> {
    let title = resolve_field(page, variant, Field::Title)
        .ok_or_else(|| LexcrawlError::extraction("no metadata title"))?;

    let official_number = resolve_field(page, variant, Field::OfficialNumber)
        .and_then(|raw| official_number_from_title(&raw).or(Some(raw)))
        .or_else(|| official_number_from_title(&title));

    let published_at = resolve_field(page, variant, Field::PublicationDate).and_then(|raw| {
        let parsed = parse_publication_date(&raw);
        if parsed.is_none() {
            warn!(raw = %raw, "unparseable publication date");
        }
        parsed
    });

    let probed_type = resolve_field(page, variant, Field::DocumentType);
    let document_type = match variant {
        LayoutVariant::ConsolidatedLegislation => {
            document_type_from_title(&title, variant).or(probed_type)
        }
        LayoutVariant::Detail => probed_type.or_else(|| document_type_from_title(&title, variant)),
    };

    Ok(DocumentMetadata {
        official_number,
        published_at,
        document_type,
        author: resolve_field(page, variant, Field::Author),
        summary: resolve_field(page, variant, Field::Summary),
        title,
    })
}

// ---------------------------------------------------------------------------
// Title-derived fields
// ---------------------------------------------------------------------------

/// Official number as written after `n.º`, e.g. `"2/2025"` or `"10-A/2024"`.
pub fn official_number_from_title(title: &str) -> Option<String> {
    static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)n\.?\s*[ºo°]\s*([\d]+(?:-[A-Z])?(?:/\d+)?(?:-[A-Z])?)")
            .expect("valid regex")
    });

    NUMBER_RE.captures(title).map(|c| c[1].to_string())
}

/// Document type from keywords in the title.
pub fn document_type_from_title(title: &str, variant: LayoutVariant) -> Option<String> {
    if variant == LayoutVariant::ConsolidatedLegislation {
        if title.contains("Decreto") && title.contains("Aprovação") {
            return Some("Decreto de Aprovação da Constituição".into());
        }
        if title.contains("Constituição") {
            return Some("Constituição".into());
        }
    }

    // `Decreto-Lei` before `Lei` and `Decreto`; `Decreto Legislativo Regional`
    // before `Decreto`.
    const KEYWORDS: &[&str] = &[
        "Decreto-Lei",
        "Decreto Legislativo Regional",
        "Decreto Regulamentar",
        "Lei Orgânica",
        "Lei",
        "Portaria",
        "Despacho",
        "Resolução",
        "Decreto",
        "Aviso",
        "Declaração de Retificação",
        "Acórdão",
    ];

    KEYWORDS
        .iter()
        .find(|kw| starts_with_word(title, kw))
        .or_else(|| KEYWORDS.iter().find(|kw| contains_word(title, kw)))
        .map(|kw| kw.to_string())
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.strip_prefix(word)
        .is_some_and(|rest| rest.chars().next().is_none_or(|c| !c.is_alphanumeric() && c != '-'))
}

fn contains_word(text: &str, word: &str) -> bool {
    text.match_indices(word).any(|(i, _)| {
        let before_ok = text[..i]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric() && c != '-');
        let after_ok = text[i + word.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric() && c != '-');
        before_ok && after_ok
    })
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

const MONTHS: &[(&str, u32)] = &[
    ("janeiro", 1),
    ("fevereiro", 2),
    ("março", 3),
    ("marco", 3),
    ("abril", 4),
    ("maio", 5),
    ("junho", 6),
    ("julho", 7),
    ("agosto", 8),
    ("setembro", 9),
    ("outubro", 10),
    ("novembro", 11),
    ("dezembro", 12),
];

/// Parse a publication date found anywhere in `raw`.
///
/// Accepts `YYYY-MM-DD`, `DD-MM-YYYY`, `DD/MM/YYYY`, `DD.MM.YYYY` and
/// `D de <mês> de YYYY`. Impossible dates yield `None`.
pub fn parse_publication_date(raw: &str) -> Option<NaiveDate> {
    static ISO_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid regex"));
    static DMY_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\b(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})\b").expect("valid regex")
    });
    static LONG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)\b(\d{1,2})\s*(?:\.?\s*º)?\s+de\s+([a-zç]+)\s+de\s+(\d{4})\b")
            .expect("valid regex")
    });

    if let Some(c) = ISO_RE.captures(raw) {
        return ymd(&c[1], &c[2], &c[3]);
    }
    if let Some(c) = DMY_RE.captures(raw) {
        return ymd(&c[3], &c[2], &c[1]);
    }
    if let Some(c) = LONG_RE.captures(raw) {
        let month_name = c[2].to_lowercase();
        let month = MONTHS.iter().find(|(name, _)| *name == month_name)?.1;
        let year = c[3].parse().ok()?;
        let day = c[1].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    None
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}
