//! Date-range discovery of publications through the archive search.
//!
//! For every day of the range one search query is issued for the requested
//! document type. Each query is followed page by page through its next-page
//! link, up to a bounded page count. Listings are classified, deduplicated by
//! URL and returned to the caller; nothing is extracted or persisted here.

mod parser;
mod query;

use std::collections::HashSet;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};
use url::Url;

use lexcrawl_crawler::PageFetcher;
use lexcrawl_shared::{DocumentType, ErrorKind, HarvestConfig, Result};

pub use parser::{Listing, ResultsPage, parse_results_page};
pub use query::{days_in_range, render_search_url, search_urls};

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

/// Configuration for one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub search_url_template: String,
    /// Upper bound on result pages followed per query.
    pub max_result_pages: u32,
    /// Delay before each results page load in ms.
    pub rate_limit_ms: u64,
}

impl From<&HarvestConfig> for DiscoveryOptions {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            search_url_template: config.search_url_template.clone(),
            max_result_pages: config.max_result_pages.max(1),
            rate_limit_ms: config.rate_limit_ms,
        }
    }
}

/// Outcome of a discovery run.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Unique listings in discovery order.
    pub listings: Vec<Listing>,
    pub queries_run: usize,
    /// Queries whose first page could not be loaded.
    pub failed_queries: Vec<FailedQuery>,
    pub pages_visited: usize,
    /// Result links skipped because their URL shape is unknown.
    pub rejected_links: usize,
    /// Listings dropped because an earlier page already listed the URL.
    pub duplicates: usize,
}

impl DiscoveryReport {
    /// Queries that loaded at least their first page.
    pub fn queries_completed(&self) -> usize {
        self.queries_run - self.failed_queries.len()
    }
}

/// A search query that produced no results page.
#[derive(Debug, Clone)]
pub struct FailedQuery {
    pub day: NaiveDate,
    pub url: Url,
    pub kind: ErrorKind,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Enumerate publications of `doc_type` published between `start` and `end`.
///
/// A query that fails is logged and counted; the run continues with the next
/// day. Errors are returned only for invalid input.
#[instrument(skip_all, fields(%start, %end, doc_type = %doc_type))]
pub async fn discover<F: PageFetcher>(
    fetcher: &F,
    start: NaiveDate,
    end: NaiveDate,
    doc_type: DocumentType,
    opts: &DiscoveryOptions,
) -> Result<DiscoveryReport> {
    let queries = search_urls(&opts.search_url_template, start, end, doc_type)?;
    info!(queries = queries.len(), "starting discovery");

    let mut report = DiscoveryReport::default();
    let mut seen = HashSet::new();

    for (day, first_page) in queries {
        report.queries_run += 1;
        match run_query(fetcher, &first_page, opts, &mut report).await {
            Ok(found) => {
                for mut listing in found {
                    if !seen.insert(listing.url.clone()) {
                        report.duplicates += 1;
                        continue;
                    }
                    if listing.document_type.is_none() {
                        listing.document_type = Some(doc_type.label().to_string());
                    }
                    report.listings.push(listing);
                }
            }
            Err(e) => {
                warn!(%day, error = %e, "search query failed");
                report.failed_queries.push(FailedQuery {
                    day,
                    url: first_page,
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        listings = report.listings.len(),
        queries = report.queries_run,
        failed = report.failed_queries.len(),
        pages = report.pages_visited,
        rejected = report.rejected_links,
        "discovery completed"
    );
    Ok(report)
}

/// Follow one query through its result pages.
///
/// Fails only if the first page cannot be loaded; a later page failure ends
/// pagination with what was gathered so far.
async fn run_query<F: PageFetcher>(
    fetcher: &F,
    first_page: &Url,
    opts: &DiscoveryOptions,
    report: &mut DiscoveryReport,
) -> Result<Vec<Listing>> {
    let mut listings = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(first_page.clone());
    let mut declared = None;

    while let Some(page_url) = next.take() {
        if visited.len() >= opts.max_result_pages as usize {
            debug!(url = %page_url, "result page limit reached");
            break;
        }
        if !visited.insert(page_url.to_string()) {
            break;
        }

        if opts.rate_limit_ms > 0 {
            tokio::time::sleep(Duration::from_millis(opts.rate_limit_ms)).await;
        }

        let loaded = match fetcher.load(&page_url, &[]).await {
            Ok(loaded) => loaded,
            Err(e) if visited.len() == 1 => return Err(e),
            Err(e) => {
                warn!(url = %page_url, error = %e, "result page failed, stopping pagination");
                break;
            }
        };
        report.pages_visited += 1;

        let page = parse_results_page(&loaded.html, &loaded.url);
        debug!(
            url = %page_url,
            listings = page.listings.len(),
            has_next = page.next_page.is_some(),
            "parsed results page"
        );
        report.rejected_links += page.rejected;
        declared = declared.or(page.declared_total);
        listings.extend(page.listings);
        next = page.next_page;
    }

    if let Some(total) = declared.filter(|t| *t as usize != listings.len()) {
        warn!(
            url = %first_page,
            declared = total,
            parsed = listings.len(),
            "declared result count differs from parsed listings"
        );
    }

    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexcrawl_crawler::HttpFetcher;
    use lexcrawl_shared::{AppConfig, LexcrawlError};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn setup(server: &MockServer) -> (HttpFetcher, DiscoveryOptions) {
        let config = HarvestConfig::from(&AppConfig::default());
        let fetcher = HttpFetcher::new(&config).unwrap().allow_localhost();
        let opts = DiscoveryOptions {
            search_url_template: format!(
                "{}/dr/pesquisa?tipo={{type}}&data={{date}}&pagina={{page}}",
                server.uri()
            ),
            max_result_pages: 5,
            rate_limit_ms: 0,
        };
        (fetcher, opts)
    }

    fn row(href: &str, title: &str) -> String {
        format!(
            r#"<tr><td><a href="{href}"><span data-expression="">{title}</span></a></td>
               <td>Assembleia da República</td></tr>"#
        )
    }

    #[tokio::test]
    async fn follows_pages_and_dedupes() {
        let server = MockServer::start().await;
        let (fetcher, opts) = setup(&server);

        let page1 = format!(
            r#"<table><tbody>{}{}</tbody></table>
               <a title="Página seguinte" href="/dr/pesquisa?tipo=Lei&data=2025-04-01&pagina=2">»</a>"#,
            row("/dr/detalhe/lei/1-2025-1", "Lei n.º 1/2025"),
            row("/dr/detalhe/lei/2-2025-2", "Lei n.º 2/2025"),
        );
        let page2 = format!(
            "<table><tbody>{}{}</tbody></table>",
            row("/dr/detalhe/lei/2-2025-2", "Lei n.º 2/2025"),
            row("/dr/detalhe/lei/3-2025-3", "Lei n.º 3/2025"),
        );

        Mock::given(method("GET"))
            .and(path("/dr/pesquisa"))
            .and(query_param("data", "2025-04-01"))
            .and(query_param("pagina", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page1))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dr/pesquisa"))
            .and(query_param("pagina", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page2))
            .mount(&server)
            .await;

        let report = discover(&fetcher, day(1), day(1), DocumentType::Lei, &opts)
            .await
            .unwrap();

        assert_eq!(report.queries_run, 1);
        assert_eq!(report.pages_visited, 2);
        let titles: Vec<&str> = report.listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Lei n.º 1/2025", "Lei n.º 2/2025", "Lei n.º 3/2025"]);
        assert!(report.listings[0].url.ends_with("/dr/detalhe/lei/1-2025-1"));
        assert_eq!(report.listings[0].author.as_deref(), Some("Assembleia da República"));
    }

    #[tokio::test]
    async fn failed_day_does_not_stop_the_range() {
        let server = MockServer::start().await;
        let (fetcher, opts) = setup(&server);

        Mock::given(method("GET"))
            .and(query_param("data", "2025-04-01"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("data", "2025-04-02"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<table><tbody>{}</tbody></table>",
                row("/dr/detalhe/portaria/9-2025-9", "Portaria n.º 9/2025")
            )))
            .mount(&server)
            .await;

        let report = discover(&fetcher, day(1), day(2), DocumentType::Portaria, &opts)
            .await
            .unwrap();

        assert_eq!(report.queries_run, 2);
        assert_eq!(report.failed_queries.len(), 1);
        assert_eq!(report.failed_queries[0].day, day(1));
        assert_eq!(report.queries_completed(), 1);
        assert_eq!(report.listings.len(), 1);
        assert_eq!(report.listings[0].document_type.as_deref(), Some("Portaria"));
    }

    #[tokio::test]
    async fn page_limit_bounds_pagination() {
        let server = MockServer::start().await;
        let (fetcher, mut opts) = setup(&server);
        opts.max_result_pages = 1;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<table><tbody>{}</tbody></table>
                   <ul class="pagination"><li class="next"><a href="/dr/pesquisa?pagina=99">»</a></li></ul>"#,
                row("/dr/detalhe/lei/1-2025-1", "Lei n.º 1/2025")
            )))
            .expect(1)
            .mount(&server)
            .await;

        let report = discover(&fetcher, day(1), day(1), DocumentType::Lei, &opts)
            .await
            .unwrap();
        assert_eq!(report.pages_visited, 1);
    }

    #[tokio::test]
    async fn inverted_range_is_a_validation_error() {
        let server = MockServer::start().await;
        let (fetcher, opts) = setup(&server);
        let err = discover(&fetcher, day(2), day(1), DocumentType::Lei, &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, LexcrawlError::Validation { .. }));
    }
}
