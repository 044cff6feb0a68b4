//! Workflow 3: the backlog sweep over sources that have no chunks.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use lexcrawl_crawler::{PageFetcher, extract_one};
use lexcrawl_shared::{ErrorKind, Result};

use crate::pipeline::{
    DocumentFailure, OutcomeTally, ProgressReporter, Workflow, WorkflowContext, WorkflowReport,
    source_draft_from,
};

/// Extract and chunk up to `limit` sources that have no chunks yet.
///
/// Fetch-and-extract runs on at most `concurrency` tasks; results are
/// persisted here one document at a time, as workers finish. A fatal error
/// aborts the workers still running. Succeeds when there was nothing to do
/// or at least one target was persisted.
#[instrument(skip_all, fields(limit = limit))]
pub async fn process_unchunked<F: PageFetcher + 'static>(
    ctx: &WorkflowContext<F>,
    limit: u32,
    progress: &dyn ProgressReporter,
) -> Result<WorkflowReport> {
    let workflow = Workflow::ProcessUnchunked;
    let start_time = Instant::now();

    progress.phase("Selecting unchunked sources");
    let mut seen = HashSet::new();
    let targets: Vec<_> = ctx
        .storage
        .list_unchunked_sources(&ctx.config.source_url_filter, limit)
        .await?
        .into_iter()
        .filter(|source| seen.insert(source.id))
        .collect();

    if targets.is_empty() {
        info!("no unchunked sources");
        let report = WorkflowReport::new(
            workflow,
            true,
            "no unchunked sources".into(),
            OutcomeTally::default(),
        );
        progress.done(&report);
        return Ok(report);
    }

    let total = targets.len();
    let concurrency = ctx.config.concurrency.max(1);
    info!(
        targets = total,
        concurrency,
        rate_limit_ms = ctx.config.rate_limit_ms,
        "starting sweep"
    );

    progress.phase("Extracting documents");
    let semaphore = Arc::new(Semaphore::new(concurrency as usize));
    let mut workers = JoinSet::new();
    let mut in_flight = HashMap::with_capacity(total);
    for source in targets {
        let fetcher = Arc::clone(&ctx.fetcher);
        let sem = Arc::clone(&semaphore);
        let rate_limit = ctx.config.rate_limit_ms;
        let url = source.main_url.clone();

        let handle = workers.spawn(async move {
            // Held until the extraction finishes; the pool is never closed.
            let _permit = sem.acquire().await;
            if rate_limit > 0 {
                tokio::time::sleep(Duration::from_millis(rate_limit)).await;
            }
            extract_one(fetcher.as_ref(), &url).await
        });
        in_flight.insert(handle.id(), source);
    }

    let mut tally = OutcomeTally {
        attempted: total,
        ..OutcomeTally::default()
    };
    let mut finished = 0;
    while let Some(joined) = workers.join_next_with_id().await {
        let (task_id, outcome) = match joined {
            Ok((id, extracted)) => (id, Ok(extracted)),
            Err(e) => (e.id(), Err(e)),
        };
        let Some(source) = in_flight.remove(&task_id) else {
            continue;
        };
        finished += 1;

        let ok = match outcome {
            Ok(Ok(doc)) => {
                let draft = source_draft_from(&doc.metadata, &source.main_url);
                let upsert = ctx
                    .coordinator
                    .upsert_source_and_chunks(&draft, &doc.chunks)
                    .await?;
                tally.record_upsert(&upsert);
                tally.processed += 1;
                true
            }
            Ok(Err(e)) if e.is_document_scoped() => {
                warn!(url = %source.main_url, error = %e, "sweep target failed");
                tally.record_failure(&source.main_url, &e);
                false
            }
            Ok(Err(e)) => return Err(e),
            Err(e) => {
                warn!(url = %source.main_url, error = %e, "sweep worker panicked");
                tally.failures.push(DocumentFailure {
                    target: source.main_url.clone(),
                    kind: ErrorKind::Other,
                    message: e.to_string(),
                });
                false
            }
        };
        progress.document_done(&source.main_url, ok, finished, total);
    }

    info!(
        processed = tally.processed,
        failed = tally.failed(),
        chunks = tally.chunks_inserted,
        duration_ms = start_time.elapsed().as_millis(),
        "sweep completed"
    );

    let report = WorkflowReport::new(
        workflow,
        tally.processed > 0,
        format!("{} of {total} sources chunked; {}", tally.processed, tally.summary()),
        tally,
    );
    progress.done(&report);
    Ok(report)
}
