//! Workflow orchestration: direct extraction, date-range discovery and the
//! targeted retry. The backlog sweep lives in [`crate::sweep`].
//!
//! Each workflow returns a [`WorkflowReport`]. Per-document failures are
//! tallied into the report and turn it into a soft `FAILED`; only storage,
//! configuration and input errors are returned as `Err`.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use lexcrawl_crawler::{DocumentMetadata, PageFetcher, extract_one};
use lexcrawl_discovery::{DiscoveryOptions, Listing, discover};
use lexcrawl_shared::{
    DocumentType, ErrorKind, HarvestConfig, LexcrawlError, Result, SourceDraft, SourceId,
};
use lexcrawl_storage::Storage;

use crate::persistence::{AppendOutcome, PersistenceCoordinator, UpsertReport};

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

/// The four invocable workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workflow {
    ExtractUrl,
    DiscoverSources,
    ProcessUnchunked,
    RetryExtraction,
}

impl Workflow {
    pub const ALL: [Workflow; 4] = [
        Self::ExtractUrl,
        Self::DiscoverSources,
        Self::ProcessUnchunked,
        Self::RetryExtraction,
    ];

    /// Stable identifier, also the CLI subcommand name.
    pub fn id(&self) -> &'static str {
        match self {
            Self::ExtractUrl => "extract-url",
            Self::DiscoverSources => "discover-sources",
            Self::ProcessUnchunked => "process-unchunked",
            Self::RetryExtraction => "retry-extraction",
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Self::ExtractUrl => 1,
            Self::DiscoverSources => 2,
            Self::ProcessUnchunked => 3,
            Self::RetryExtraction => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ExtractUrl => "Direct extraction",
            Self::DiscoverSources => "Discovery",
            Self::ProcessUnchunked => "Backlog sweep",
            Self::RetryExtraction => "Targeted retry",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ExtractUrl => {
                "Extract one publication by URL and persist its source and article chunks."
            }
            Self::DiscoverSources => {
                "Search the archive day by day for one document type and store a source stub per result."
            }
            Self::ProcessUnchunked => {
                "Extract and chunk up to N stored sources that have no chunks yet."
            }
            Self::RetryExtraction => {
                "Re-extract an existing source by id and append chunks if it has none."
            }
        }
    }
}

impl std::fmt::Display for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// A document that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    /// URL, source id or query the failure concerns.
    pub target: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Per-document outcome counts for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    pub attempted: usize,
    /// Documents whose unit of work completed.
    pub processed: usize,
    pub failures: Vec<DocumentFailure>,
    pub sources_created: usize,
    pub sources_updated: usize,
    pub chunks_inserted: usize,
    /// Chunks not written because their index was already taken.
    pub chunks_skipped: usize,
}

impl OutcomeTally {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub(crate) fn record_upsert(&mut self, report: &UpsertReport) {
        if report.created {
            self.sources_created += 1;
        } else {
            self.sources_updated += 1;
        }
        self.chunks_inserted += report.inserted;
        self.chunks_skipped += report.skipped.len();
    }

    pub(crate) fn record_failure(&mut self, target: impl Into<String>, error: &LexcrawlError) {
        self.failures.push(DocumentFailure {
            target: target.into(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    /// One-line summary for logs and job messages.
    pub fn summary(&self) -> String {
        format!(
            "{} processed, {} failed; sources: {} created, {} updated; chunks: {} inserted, {} skipped",
            self.processed,
            self.failed(),
            self.sources_created,
            self.sources_updated,
            self.chunks_inserted,
            self.chunks_skipped
        )
    }
}

/// Outcome of one workflow invocation.
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub workflow: Workflow,
    /// Whether the workflow's defining unit of work completed.
    pub succeeded: bool,
    /// Message recorded as the job's result.
    pub message: String,
    pub tally: OutcomeTally,
}

impl WorkflowReport {
    pub(crate) fn new(workflow: Workflow, succeeded: bool, message: String, tally: OutcomeTally) -> Self {
        Self {
            workflow,
            succeeded,
            message,
            tally,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting workflow status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when one document has been handled.
    fn document_done(&self, target: &str, ok: bool, current: usize, total: usize);
    /// Called once the workflow has a report.
    fn done(&self, report: &WorkflowReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_done(&self, _target: &str, _ok: bool, _current: usize, _total: usize) {}
    fn done(&self, _report: &WorkflowReport) {}
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a workflow needs: storage, a page fetcher and the runtime config.
pub struct WorkflowContext<F: PageFetcher> {
    pub storage: Arc<Storage>,
    pub fetcher: Arc<F>,
    pub coordinator: PersistenceCoordinator,
    pub config: HarvestConfig,
}

impl<F: PageFetcher> WorkflowContext<F> {
    pub fn new(storage: Arc<Storage>, fetcher: F, config: HarvestConfig) -> Self {
        Self {
            coordinator: PersistenceCoordinator::new(Arc::clone(&storage)),
            storage,
            fetcher: Arc::new(fetcher),
            config,
        }
    }
}

/// Source data for an extracted document stored under `main_url`.
pub fn source_draft_from(metadata: &DocumentMetadata, main_url: &str) -> SourceDraft {
    let mut draft = SourceDraft::official(main_url, metadata.title.clone());
    if let Some(summary) = &metadata.summary {
        draft = draft.with_description(summary.clone());
    }
    draft.author = metadata.author.clone();
    draft.published_at = metadata.published_at;
    draft.official_number = metadata.official_number.clone();
    draft.document_type = metadata.document_type.clone();
    draft
}

/// Source stub for a discovery listing.
pub fn draft_from_listing(listing: &Listing) -> SourceDraft {
    let mut draft = SourceDraft::official(listing.url.clone(), listing.title.clone());
    if let Some(description) = &listing.description {
        draft = draft.with_description(description.clone());
    }
    draft.author = listing.author.clone();
    draft.published_at = listing.published_at;
    draft.official_number = listing.official_number.clone();
    draft.document_type = listing.document_type.clone();
    draft.listing_title = true;
    draft
}

// ---------------------------------------------------------------------------
// Workflow 1: direct extraction
// ---------------------------------------------------------------------------

/// Extract one URL and create or update its source with every chunk.
///
/// The source is keyed by the fragment-free URL, as discovery stores it.
#[instrument(skip_all, fields(url = %url))]
pub async fn extract_url<F: PageFetcher>(
    ctx: &WorkflowContext<F>,
    url: &str,
    progress: &dyn ProgressReporter,
) -> Result<WorkflowReport> {
    let workflow = Workflow::ExtractUrl;
    let mut tally = OutcomeTally {
        attempted: 1,
        ..OutcomeTally::default()
    };

    progress.phase("Extracting document");
    let doc = match extract_one(ctx.fetcher.as_ref(), url).await {
        Ok(doc) => doc,
        Err(e) if e.is_document_scoped() => {
            warn!(error = %e, "extraction failed");
            tally.record_failure(url, &e);
            progress.document_done(url, false, 1, 1);
            let report = WorkflowReport::new(workflow, false, format!("{url}: {e}"), tally);
            progress.done(&report);
            return Ok(report);
        }
        Err(e) => return Err(e),
    };

    progress.phase("Persisting");
    let draft = source_draft_from(&doc.metadata, doc.url.as_str());
    let upsert = ctx
        .coordinator
        .upsert_source_and_chunks(&draft, &doc.chunks)
        .await?;
    tally.record_upsert(&upsert);
    tally.processed = 1;
    progress.document_done(url, true, 1, 1);

    let report = WorkflowReport::new(
        workflow,
        true,
        format!(
            "source {} {}: {} chunks inserted, {} already present",
            upsert.source_id,
            if upsert.created { "created" } else { "updated" },
            upsert.inserted,
            upsert.skipped.len()
        ),
        tally,
    );
    info!(source_id = %upsert.source_id, "direct extraction complete");
    progress.done(&report);
    Ok(report)
}

// ---------------------------------------------------------------------------
// Workflow 2: discovery
// ---------------------------------------------------------------------------

/// Discover publications between two dates and store one stub per listing.
///
/// Nothing is extracted. Succeeds when at least one search query completed.
#[instrument(skip_all, fields(%start, %end, doc_type = %doc_type))]
pub async fn discover_sources<F: PageFetcher>(
    ctx: &WorkflowContext<F>,
    start: NaiveDate,
    end: NaiveDate,
    doc_type: DocumentType,
    progress: &dyn ProgressReporter,
) -> Result<WorkflowReport> {
    let workflow = Workflow::DiscoverSources;
    let opts = DiscoveryOptions::from(&ctx.config);

    progress.phase("Searching archive");
    let found = discover(ctx.fetcher.as_ref(), start, end, doc_type, &opts).await?;

    let mut tally = OutcomeTally {
        attempted: found.listings.len(),
        ..OutcomeTally::default()
    };
    for failed in &found.failed_queries {
        tally.failures.push(DocumentFailure {
            target: failed.url.to_string(),
            kind: failed.kind,
            message: failed.message.clone(),
        });
    }

    progress.phase("Storing sources");
    let total = found.listings.len();
    for (i, listing) in found.listings.iter().enumerate() {
        let upsert = ctx
            .coordinator
            .upsert_source_and_chunks(&draft_from_listing(listing), &[])
            .await?;
        tally.record_upsert(&upsert);
        tally.processed += 1;
        progress.document_done(&listing.url, true, i + 1, total);
    }

    let completed = found.queries_completed();
    let report = WorkflowReport::new(
        workflow,
        completed > 0,
        format!(
            "{completed} of {} queries completed; {} listings ({} new sources, {} updated)",
            found.queries_run, total, tally.sources_created, tally.sources_updated
        ),
        tally,
    );
    info!(
        listings = total,
        queries = found.queries_run,
        completed,
        "discovery workflow complete"
    );
    progress.done(&report);
    Ok(report)
}

// ---------------------------------------------------------------------------
// Workflow 4: targeted retry
// ---------------------------------------------------------------------------

/// Re-extract an existing source and append its chunks.
///
/// Never creates a source. A source that already has chunks is refused
/// before anything is fetched.
#[instrument(skip_all, fields(source_id = %source_id))]
pub async fn retry_extraction<F: PageFetcher>(
    ctx: &WorkflowContext<F>,
    source_id: SourceId,
    progress: &dyn ProgressReporter,
) -> Result<WorkflowReport> {
    let workflow = Workflow::RetryExtraction;
    let source = ctx
        .storage
        .get_source(&source_id)
        .await?
        .ok_or_else(|| LexcrawlError::validation(format!("source {source_id} not found")))?;
    let mut tally = OutcomeTally {
        attempted: 1,
        ..OutcomeTally::default()
    };

    let existing = ctx.storage.count_chunks(&source_id).await?;
    if existing > 0 {
        let e = LexcrawlError::conflict(format!(
            "source {source_id} already has {existing} chunks"
        ));
        warn!(error = %e, "nothing to retry");
        tally.record_failure(&source.main_url, &e);
        let report = WorkflowReport::new(workflow, false, e.to_string(), tally);
        progress.done(&report);
        return Ok(report);
    }

    progress.phase("Extracting document");
    let doc = match extract_one(ctx.fetcher.as_ref(), &source.main_url).await {
        Ok(doc) => doc,
        Err(e) if e.is_document_scoped() => {
            warn!(url = %source.main_url, error = %e, "retry extraction failed");
            tally.record_failure(&source.main_url, &e);
            progress.document_done(&source.main_url, false, 1, 1);
            let report =
                WorkflowReport::new(workflow, false, format!("{}: {e}", source.main_url), tally);
            progress.done(&report);
            return Ok(report);
        }
        Err(e) => return Err(e),
    };

    progress.phase("Appending chunks");
    let report = match ctx
        .coordinator
        .append_chunks_for_existing_source(&source_id, &doc.chunks)
        .await?
    {
        AppendOutcome::Appended { inserted } => {
            tally.chunks_inserted = inserted;
            tally.processed = usize::from(inserted > 0);
            progress.document_done(&source.main_url, inserted > 0, 1, 1);
            WorkflowReport::new(
                workflow,
                inserted > 0,
                format!("{inserted} chunks appended to source {source_id}"),
                tally,
            )
        }
        AppendOutcome::Refused { existing } => {
            let e = LexcrawlError::conflict(format!(
                "source {source_id} gained {existing} chunks concurrently; nothing appended"
            ));
            warn!(error = %e, "append refused");
            tally.chunks_skipped = doc.chunks.len();
            tally.record_failure(&source.main_url, &e);
            progress.document_done(&source.main_url, false, 1, 1);
            WorkflowReport::new(workflow, false, e.to_string(), tally)
        }
    };
    progress.done(&report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StaticFetcher, workflow_context as context};
    use lexcrawl_discovery::render_search_url;
    use lexcrawl_shared::AppConfig;

    const ARTICLES_URL: &str = "https://diariodarepublica.pt/dr/detalhe/lei/2-2025-902120309";
    const PLAIN_URL: &str = "https://diariodarepublica.pt/dr/detalhe/decreto/45-1976-301234";
    const CONSOLIDATED_URL: &str =
        "https://diariodarepublica.pt/dr/legislacao-consolidada/lei/2009-34546475";

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    #[test]
    fn workflow_ids_are_unique_and_numbered() {
        let ids: Vec<&str> = Workflow::ALL.iter().map(|w| w.id()).collect();
        assert_eq!(
            ids,
            vec!["extract-url", "discover-sources", "process-unchunked", "retry-extraction"]
        );
        let numbers: Vec<u8> = Workflow::ALL.iter().map(|w| w.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn direct_extraction_persists_every_article() {
        let ctx = context(StaticFetcher::default().with_fixture(ARTICLES_URL, "detail_articles.html"))
            .await;

        let report = extract_url(&ctx, ARTICLES_URL, &SilentProgress).await.unwrap();
        assert!(report.succeeded, "{}", report.message);
        assert_eq!(report.tally.chunks_inserted, 4);
        assert_eq!(report.tally.sources_created, 1);

        let source = ctx
            .storage
            .get_source_by_url(ARTICLES_URL)
            .await
            .unwrap()
            .expect("source stored");
        assert_eq!(source.title(), Some("Lei n.º 2/2025, de 3 de abril"));
        assert_eq!(source.official_number.as_deref(), Some("2/2025"));
        assert_eq!(source.published_at, Some(day(3)));
        assert_eq!(ctx.storage.count_sources().await.unwrap(), 1);

        let chunks = ctx.storage.list_chunks(&source.id).await.unwrap();
        let numbers: Vec<u32> = chunks.iter().map(|c| c.chunk_metadata.article_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn repeated_extraction_is_idempotent() {
        let ctx = context(StaticFetcher::default().with_fixture(ARTICLES_URL, "detail_articles.html"))
            .await;

        extract_url(&ctx, ARTICLES_URL, &SilentProgress).await.unwrap();
        let second = extract_url(&ctx, ARTICLES_URL, &SilentProgress).await.unwrap();
        assert!(second.succeeded);
        assert_eq!(second.tally.sources_updated, 1);
        assert_eq!(second.tally.chunks_inserted, 0);
        assert_eq!(second.tally.chunks_skipped, 4);
        assert_eq!(ctx.storage.count_sources().await.unwrap(), 1);
        assert_eq!(ctx.storage.count_all_chunks().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn consolidated_page_is_extracted_end_to_end() {
        let ctx = context(
            StaticFetcher::default().with_fixture(CONSOLIDATED_URL, "consolidated.html"),
        )
        .await;

        let report = extract_url(&ctx, CONSOLIDATED_URL, &SilentProgress).await.unwrap();
        assert!(report.succeeded, "{}", report.message);
        assert_eq!(report.tally.chunks_inserted, 3);

        let source = ctx
            .storage
            .get_source_by_url(CONSOLIDATED_URL)
            .await
            .unwrap()
            .expect("source stored");
        assert_eq!(source.title(), Some("Código do Trabalho"));
        assert_eq!(source.official_number.as_deref(), Some("7/2009"));
        assert_eq!(source.document_type.as_deref(), Some("Lei"));
        assert_eq!(source.author.as_deref(), Some("Assembleia da República"));
        assert_eq!(source.published_at, NaiveDate::from_ymd_opt(2005, 8, 12));

        let chunks = ctx.storage.list_chunks(&source.id).await.unwrap();
        let numbers: Vec<u32> = chunks.iter().map(|c| c.chunk_metadata.article_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(chunks[0].content.contains("Fontes específicas"));
    }

    #[tokio::test]
    async fn fragment_urls_share_the_discovered_source() {
        let ctx = context(StaticFetcher::default().with_fixture(ARTICLES_URL, "detail_articles.html"))
            .await;

        let with_fragment = format!("{ARTICLES_URL}#artigo-3");
        let report = extract_url(&ctx, &with_fragment, &SilentProgress).await.unwrap();
        assert!(report.succeeded, "{}", report.message);
        assert_eq!(ctx.fetcher.loads(), vec![ARTICLES_URL.to_string()]);
        assert!(ctx.storage.get_source_by_url(ARTICLES_URL).await.unwrap().is_some());

        extract_url(&ctx, ARTICLES_URL, &SilentProgress).await.unwrap();
        assert_eq!(ctx.storage.count_sources().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unclassifiable_url_is_a_soft_failure() {
        let fetcher = StaticFetcher::default();
        let ctx = context(fetcher).await;

        let report = extract_url(&ctx, "https://diariodarepublica.pt/dr/home", &SilentProgress)
            .await
            .unwrap();
        assert!(!report.succeeded);
        assert_eq!(report.tally.failures[0].kind, ErrorKind::Classification);
        assert!(ctx.fetcher.loads().is_empty());
        assert_eq!(ctx.storage.count_sources().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unreachable_page_is_a_soft_failure() {
        let ctx = context(StaticFetcher::default()).await;
        let report = extract_url(&ctx, ARTICLES_URL, &SilentProgress).await.unwrap();
        assert!(!report.succeeded);
        assert_eq!(report.tally.failures[0].kind, ErrorKind::Transient);
        assert_eq!(ctx.storage.count_sources().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn discovery_stores_stubs_without_chunks() {
        let template = HarvestConfig::from(&AppConfig::default()).search_url_template;
        let search = render_search_url(&template, day(3), DocumentType::Lei, 1).unwrap();
        let ctx = context(
            StaticFetcher::default().with_fixture(search.as_str(), "search_results.html"),
        )
        .await;

        let report = discover_sources(&ctx, day(3), day(3), DocumentType::Lei, &SilentProgress)
            .await
            .unwrap();
        assert!(report.succeeded, "{}", report.message);
        assert_eq!(report.tally.sources_created, 3);
        assert_eq!(ctx.storage.count_sources().await.unwrap(), 3);
        assert_eq!(ctx.storage.count_all_chunks().await.unwrap(), 0);

        let stub = ctx
            .storage
            .get_source_by_url("https://diariodarepublica.pt/dr/detalhe/lei/4-2025-902120311")
            .await
            .unwrap()
            .expect("fragment stripped before upsert");
        assert_eq!(stub.author.as_deref(), Some("Assembleia da República"));
        assert_eq!(stub.document_type.as_deref(), Some("Lei"));
    }

    #[tokio::test]
    async fn discovery_with_no_completed_query_fails() {
        let ctx = context(StaticFetcher::default()).await;
        let report = discover_sources(&ctx, day(1), day(2), DocumentType::Lei, &SilentProgress)
            .await
            .unwrap();
        assert!(!report.succeeded);
        assert_eq!(report.tally.failures.len(), 2);
        assert_eq!(ctx.storage.count_sources().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn discovery_keeps_extracted_metadata() {
        let template = HarvestConfig::from(&AppConfig::default()).search_url_template;
        let search = render_search_url(&template, day(3), DocumentType::Lei, 1).unwrap();
        let ctx = context(
            StaticFetcher::default()
                .with_fixture(ARTICLES_URL, "detail_articles.html")
                .with_fixture(search.as_str(), "search_results.html"),
        )
        .await;

        extract_url(&ctx, ARTICLES_URL, &SilentProgress).await.unwrap();
        let report = discover_sources(&ctx, day(3), day(3), DocumentType::Lei, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.tally.sources_updated, 1);
        assert_eq!(report.tally.sources_created, 2);
        assert_eq!(ctx.storage.count_all_chunks().await.unwrap(), 4);

        let source = ctx
            .storage
            .get_source_by_url(ARTICLES_URL)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(source.title(), Some("Lei n.º 2/2025, de 3 de abril"));
    }

    #[tokio::test]
    async fn retry_appends_plain_text_as_one_chunk() {
        let ctx = context(StaticFetcher::default().with_fixture(PLAIN_URL, "detail_plain.html"))
            .await;
        let stub = ctx
            .coordinator
            .upsert_source_and_chunks(&SourceDraft::official(PLAIN_URL, "Decreto n.º 45/76"), &[])
            .await
            .unwrap();

        let report = retry_extraction(&ctx, stub.source_id, &SilentProgress)
            .await
            .unwrap();
        assert!(report.succeeded, "{}", report.message);
        assert_eq!(report.tally.chunks_inserted, 1);
        assert_eq!(ctx.storage.count_sources().await.unwrap(), 1);

        let chunks = ctx.storage.list_chunks(&stub.source_id).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].chunk_metadata.article_number, 0);
    }

    #[tokio::test]
    async fn retry_is_refused_when_chunks_exist() {
        let ctx = context(StaticFetcher::default().with_fixture(ARTICLES_URL, "detail_articles.html"))
            .await;
        extract_url(&ctx, ARTICLES_URL, &SilentProgress).await.unwrap();
        let source = ctx
            .storage
            .get_source_by_url(ARTICLES_URL)
            .await
            .unwrap()
            .unwrap();

        let report = retry_extraction(&ctx, source.id, &SilentProgress)
            .await
            .unwrap();
        assert!(!report.succeeded);
        assert_eq!(report.tally.failures[0].kind, ErrorKind::Conflict);
        assert!(report.message.contains("already has 4 chunks"), "{}", report.message);
        assert_eq!(ctx.fetcher.loads().len(), 1);
        assert_eq!(ctx.storage.count_chunks(&source.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn retry_of_unknown_source_is_an_error() {
        let ctx = context(StaticFetcher::default()).await;
        let err = retry_extraction(&ctx, SourceId::new(), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, LexcrawlError::Validation { .. }));
        assert_eq!(ctx.storage.count_sources().await.unwrap(), 0);
    }
}
