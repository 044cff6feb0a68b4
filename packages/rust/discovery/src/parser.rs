//! Search results page parser.
//!
//! A results page lists one publication per table row:
//! - a link to the document (`/detalhe/` or `/legislacao-consolidada/`)
//! - the title, usually inside `span[data-expression]`
//! - publication date, emitting entity and a short description as loose text
//!
//! Older result pages have no table; every document link is then a row.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use lexcrawl_crawler::metadata::{document_type_from_title, official_number_from_title};
use lexcrawl_crawler::{LayoutVariant, classify, parse_publication_date};
use lexcrawl_markdown::normalize_text;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One publication listed on a results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Absolute document URL, fragment stripped.
    pub url: String,
    pub variant: LayoutVariant,
    pub title: String,
    pub description: Option<String>,
    /// Emitting entity.
    pub author: Option<String>,
    pub published_at: Option<NaiveDate>,
    pub official_number: Option<String>,
    pub document_type: Option<String>,
}

/// Everything read from one results page.
#[derive(Debug, Clone, Default)]
pub struct ResultsPage {
    pub listings: Vec<Listing>,
    /// Document links whose URL could not be classified.
    pub rejected: usize,
    pub next_page: Option<Url>,
    /// Total announced by the page ("N resultado(s) encontrado(s)").
    pub declared_total: Option<u32>,
}

// ---------------------------------------------------------------------------
// Selectors and patterns
// ---------------------------------------------------------------------------

const ROW_SELECTOR: &str = "table tbody tr";
const LINK_SELECTOR: &str = "a[href*=\"/detalhe/\"], a[href*=\"/legislacao-consolidada/\"]";
const TITLE_SELECTOR: &str = "span[data-expression]";

const NEXT_PAGE_SELECTORS: &[&str] = &[
    "a[title*=\"seguinte\"]",
    "a[title*=\"Seguinte\"]",
    "a[title*=\"Next\"]",
    ".pagination a.next",
    ".pagination li.next a",
    "a[aria-label*=\"next\"]",
];

const ENTITY_KEYWORDS: &[&str] = &[
    "Assembleia",
    "Governo",
    "Presidência",
    "Ministério",
    "Região Autónoma",
];

/// Row texts shorter than this are never taken as a description.
const MIN_DESCRIPTION_CHARS: usize = 20;

static TOTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:\.\d{3})+|\d+)\s*resultado(?:\(s\)|s)?\s+encontrado")
        .expect("total regex")
});

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse one results page. `page_url` resolves relative links.
pub fn parse_results_page(html: &str, page_url: &Url) -> ResultsPage {
    let doc = Html::parse_document(html);
    let (Some(row_sel), Some(link_sel), Some(title_sel)) = (
        selector(ROW_SELECTOR),
        selector(LINK_SELECTOR),
        selector(TITLE_SELECTOR),
    ) else {
        return ResultsPage::default();
    };

    let mut rows: Vec<ElementRef> = doc
        .select(&row_sel)
        .filter(|row| row.select(&link_sel).next().is_some())
        .collect();
    if rows.is_empty() {
        rows = doc.select(&link_sel).collect();
    }

    let mut page = ResultsPage::default();
    let mut seen = HashSet::new();

    for row in rows {
        let link = if is_link(&row) {
            Some(row)
        } else {
            row.select(&link_sel).next()
        };
        let Some(link) = link else { continue };
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let Some(url) = resolve(page_url, href) else {
            page.rejected += 1;
            continue;
        };
        let variant = match classify(&url) {
            Ok(variant) => variant,
            Err(_) => {
                debug!(%url, "skipping unclassifiable result link");
                page.rejected += 1;
                continue;
            }
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        page.listings
            .push(read_listing(&row, &link, &title_sel, url, variant));
    }

    page.next_page = next_page(&doc, page_url);
    page.declared_total = declared_total(&doc);
    page
}

fn is_link(el: &ElementRef) -> bool {
    el.value().name() == "a"
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
        return None;
    }
    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    Some(url.to_string())
}

fn read_listing(
    row: &ElementRef,
    link: &ElementRef,
    title_sel: &Selector,
    url: String,
    variant: LayoutVariant,
) -> Listing {
    let link_text = normalize_text(&link.text().collect::<String>());
    let title = row
        .select(title_sel)
        .map(|el| normalize_text(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
        .or_else(|| (!link_text.is_empty()).then(|| link_text.clone()))
        .unwrap_or_else(|| url.clone());

    let pieces: Vec<String> = row
        .text()
        .map(normalize_text)
        .filter(|t| !t.is_empty())
        .collect();

    let published_at = pieces.iter().find_map(|p| parse_publication_date(p));

    let author = pieces
        .iter()
        .find(|p| ENTITY_KEYWORDS.iter().any(|kw| p.contains(kw)) && **p != title)
        .cloned();

    let description = pieces
        .iter()
        .filter(|p| **p != title && Some(*p) != author.as_ref())
        .map(|p| p.strip_prefix(title.as_str()).unwrap_or(p.as_str()).trim())
        .find(|p| p.chars().count() > MIN_DESCRIPTION_CHARS)
        .map(|p| p.trim_start_matches(['-', '–', ':', ' ']).to_string());

    Listing {
        official_number: official_number_from_title(&title),
        document_type: document_type_from_title(&title, variant),
        url,
        variant,
        title,
        description,
        author,
        published_at,
    }
}

fn next_page(doc: &Html, page_url: &Url) -> Option<Url> {
    NEXT_PAGE_SELECTORS
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| {
            doc.select(&sel)
                .filter_map(|a| a.value().attr("href"))
                .find_map(|href| resolve(page_url, href))
        })
        .and_then(|href| Url::parse(&href).ok())
        .filter(|next| next != page_url)
}

fn declared_total(doc: &Html) -> Option<u32> {
    let text = doc.root_element().text().collect::<String>();
    let caps = TOTAL_RE.captures(&text)?;
    caps[1]
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()
}
