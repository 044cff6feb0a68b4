//! Post-conversion cleanup for inline Markdown.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Run the cleanup pipeline on one converted paragraph.
pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let mut result = md.to_string();

    result = strip_leftover_html(&result);
    result = resolve_links(&result, base_url);
    result = normalize_whitespace(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Strip leftover HTML tags
// ---------------------------------------------------------------------------

/// Remove wrapper tags htmd passes through, keeping their text.
fn strip_leftover_html(md: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?(?:div|span|font|section|article|sup|sub|u)(?:\s[^>]*)?>")
            .expect("valid regex")
    });

    HTML_TAG_RE.replace_all(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Resolve relative links
// ---------------------------------------------------------------------------

/// Resolve relative URLs in Markdown links against a base URL, keeping an
/// optional `"title"` part.
fn resolve_links(md: &str, base_url: Option<&Url>) -> String {
    let Some(base) = base_url else {
        return md.to_string();
    };

    static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(!?)\[([^\]]*)\]\((\S+?)((?:\s+"[^"]*")?)\)"#).expect("valid regex")
    });

    LINK_RE
        .replace_all(md, |caps: &regex::Captures| {
            let bang = &caps[1];
            let text = &caps[2];
            let href = &caps[3];
            let title = &caps[4];

            if !bang.is_empty()
                || href.starts_with("http://")
                || href.starts_with("https://")
                || href.starts_with('#')
                || href.starts_with("mailto:")
            {
                return caps[0].to_string();
            }

            match base.join(href) {
                Ok(resolved) => format!("[{text}]({resolved}{title})"),
                Err(_) => caps[0].to_string(),
            }
        })
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Normalize whitespace
// ---------------------------------------------------------------------------

/// Trim every line, drop blank runs, and trim the whole block.
fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
