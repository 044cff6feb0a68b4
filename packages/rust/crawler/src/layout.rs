//! Layout classification of document URLs.
//!
//! The archive serves two structurally incompatible page templates. Which one
//! a URL uses is decided from its path alone, before anything is fetched.

use url::Url;

use lexcrawl_shared::{LexcrawlError, Result};

/// Path segment of consolidated-legislation pages.
const CONSOLIDATED_SEGMENT: &str = "/legislacao-consolidada/";

/// Path segment of single-publication detail pages.
const DETAIL_SEGMENT: &str = "/detalhe/";

/// Page template a document URL resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutVariant {
    /// One publication of the gazette (`/dr/detalhe/...`).
    Detail,
    /// A consolidated text with all amendments applied
    /// (`/dr/legislacao-consolidada/...`).
    ConsolidatedLegislation,
}

impl LayoutVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::ConsolidatedLegislation => "consolidated-legislation",
        }
    }
}

impl std::fmt::Display for LayoutVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a document URL by its path.
///
/// Consolidated pages are checked first: their paths may also carry a detail
/// segment further down.
pub fn classify(url: &str) -> Result<LayoutVariant> {
    let parsed = Url::parse(url.trim()).map_err(|_| LexcrawlError::classification(url))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LexcrawlError::classification(url));
    }

    let path = parsed.path().to_lowercase();
    if path.contains(CONSOLIDATED_SEGMENT) {
        Ok(LayoutVariant::ConsolidatedLegislation)
    } else if path.contains(DETAIL_SEGMENT) {
        Ok(LayoutVariant::Detail)
    } else {
        Err(LexcrawlError::classification(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_urls() {
        for url in [
            "https://diariodarepublica.pt/dr/detalhe/lei/2-2025-902120309",
            "https://diariodarepublica.pt/dr/detalhe/decreto-lei/10-2024-835422841",
            "https://diariodarepublica.pt/dr/detalhe/despacho/1234-2023-207312",
        ] {
            assert_eq!(classify(url).unwrap(), LayoutVariant::Detail, "{url}");
        }
    }

    #[test]
    fn consolidated_urls() {
        for url in [
            "https://diariodarepublica.pt/dr/legislacao-consolidada/decreto-aprovacao-constituicao/1976-34520775",
            "https://diariodarepublica.pt/dr/legislacao-consolidada/lei/2009-34546475",
            "https://diariodarepublica.pt/dr/legislacao-consolidada/lei/2009-34546475/detalhe/artigo-1",
        ] {
            assert_eq!(
                classify(url).unwrap(),
                LayoutVariant::ConsolidatedLegislation,
                "{url}"
            );
        }
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        for url in [
            "https://diariodarepublica.pt/dr/pesquisa-avancada",
            "https://diariodarepublica.pt/",
            "not a url",
            "ftp://diariodarepublica.pt/dr/detalhe/lei/1",
        ] {
            let err = classify(url).unwrap_err();
            assert!(
                matches!(err, LexcrawlError::Classification { .. }),
                "{url}: {err}"
            );
        }
    }

    #[test]
    fn segment_must_be_in_path_not_query() {
        let err = classify("https://diariodarepublica.pt/dr/pesquisa?next=/dr/detalhe/lei/1");
        assert!(err.is_err());
    }
}
