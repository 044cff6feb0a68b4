//! Job status reporting.
//!
//! A workflow invoked with a job id reports exactly one terminal status for
//! it. [`PendingJob`] is created as soon as the job store is reachable and is
//! settled with the outcome of setup, the workflow or an interruption; if it
//! is dropped unsettled (early return, panic) it reports `FAILED` on a
//! background task.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, warn};
use uuid::Uuid;

use lexcrawl_shared::{JobStatus, LexcrawlError, Result};
use lexcrawl_storage::Storage;

use crate::pipeline::WorkflowReport;

/// Message recorded when a job ends without being settled.
const ABORTED_MESSAGE: &str = "workflow aborted before reporting a result";

/// Receives terminal job statuses.
pub trait JobSink: Send + Sync {
    fn report_status(
        &self,
        job_id: &str,
        status: JobStatus,
        message: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Writes job statuses to the `background_jobs` table.
pub struct StorageJobSink {
    storage: Arc<Storage>,
}

impl StorageJobSink {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl JobSink for StorageJobSink {
    async fn report_status(&self, job_id: &str, status: JobStatus, message: &str) -> Result<()> {
        self.storage.upsert_job_status(job_id, status, message).await
    }
}

// ---------------------------------------------------------------------------
// PendingJob
// ---------------------------------------------------------------------------

/// Guard for one tracked invocation.
#[derive(Debug)]
pub struct PendingJob<S: JobSink + 'static> {
    sink: Arc<S>,
    job_id: Option<String>,
    settled: bool,
}

impl<S: JobSink + 'static> PendingJob<S> {
    /// Start tracking. Without a job id nothing is ever reported.
    pub fn new(sink: Arc<S>, job_id: Option<Uuid>) -> Self {
        Self {
            sink,
            job_id: job_id.map(|id| id.to_string()),
            settled: false,
        }
    }

    /// Pass a setup step's value through; its error settles the job as
    /// `FAILED` and is returned unchanged.
    pub async fn setup<T>(self, step: Result<T>) -> Result<(Self, T)> {
        match step {
            Ok(value) => Ok((self, value)),
            Err(e) => {
                self.settle(JobStatus::Failed, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Settle from a workflow outcome.
    ///
    /// An `Ok` report settles the job as `SUCCESS` or `FAILED` according to
    /// the report; an `Err` settles it as `FAILED` and is returned unchanged.
    pub async fn finish(self, outcome: Result<WorkflowReport>) -> Result<WorkflowReport> {
        match outcome {
            Ok(report) => {
                let status = if report.succeeded {
                    JobStatus::Success
                } else {
                    JobStatus::Failed
                };
                self.settle(status, &report.message).await;
                Ok(report)
            }
            Err(e) => {
                self.settle(JobStatus::Failed, &e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Report the terminal status. Sink failures are logged only.
    pub async fn settle(mut self, status: JobStatus, message: &str) {
        self.settled = true;
        let Some(job_id) = self.job_id.as_deref() else {
            return;
        };
        match self.sink.report_status(job_id, status, message).await {
            Ok(()) => debug!(job_id, %status, "job status reported"),
            Err(e) => warn!(job_id, %status, error = %e, "failed to report job status"),
        }
    }
}

impl<S: JobSink + 'static> Drop for PendingJob<S> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Some(job_id) = self.job_id.take() else {
            return;
        };

        warn!(job_id = %job_id, "job dropped unsettled, reporting FAILED");
        let Ok(handle) = Handle::try_current() else {
            warn!(job_id = %job_id, "no runtime available to report job status");
            return;
        };
        let sink = Arc::clone(&self.sink);
        handle.spawn(async move {
            if let Err(e) = sink
                .report_status(&job_id, JobStatus::Failed, ABORTED_MESSAGE)
                .await
            {
                warn!(job_id = %job_id, error = %e, "failed to report job status");
            }
        });
    }
}

/// Run a workflow until it finishes or `interrupt` fires.
///
/// An interruption drops the workflow, settles the job as `FAILED` and
/// returns [`LexcrawlError::Interrupted`].
pub async fn run_interruptible<S, Fut, I>(
    job: PendingJob<S>,
    workflow: Fut,
    interrupt: I,
) -> Result<WorkflowReport>
where
    S: JobSink + 'static,
    Fut: Future<Output = Result<WorkflowReport>>,
    I: Future<Output = ()>,
{
    tokio::select! {
        outcome = workflow => job.finish(outcome).await,
        () = interrupt => {
            let e = LexcrawlError::Interrupted;
            warn!("workflow interrupted, reporting FAILED");
            job.settle(JobStatus::Failed, &e.to_string()).await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{OutcomeTally, Workflow};
    use crate::testing::RecordingSink;
    use lexcrawl_crawler::HttpFetcher;
    use lexcrawl_shared::{AppConfig, HarvestConfig};
    use std::time::Duration;

    async fn tracked<Fut>(
        sink: Arc<RecordingSink>,
        job_id: Option<Uuid>,
        workflow: Fut,
    ) -> Result<WorkflowReport>
    where
        Fut: Future<Output = Result<WorkflowReport>>,
    {
        PendingJob::new(sink, job_id).finish(workflow.await).await
    }

    fn report(succeeded: bool) -> WorkflowReport {
        WorkflowReport {
            workflow: Workflow::ExtractUrl,
            succeeded,
            message: "feito".into(),
            tally: OutcomeTally::default(),
        }
    }

    #[tokio::test]
    async fn success_is_reported_once() {
        let sink = Arc::new(RecordingSink::default());
        let id = Uuid::now_v7();
        tracked(sink.clone(), Some(id), async { Ok(report(true)) })
            .await
            .unwrap();

        assert_eq!(
            sink.reports(),
            vec![(id.to_string(), JobStatus::Success, "feito".to_string())]
        );
    }

    #[tokio::test]
    async fn soft_failure_reports_failed() {
        let sink = Arc::new(RecordingSink::default());
        let id = Uuid::now_v7();
        let out = tracked(sink.clone(), Some(id), async { Ok(report(false)) })
            .await
            .unwrap();
        assert!(!out.succeeded);
        assert_eq!(sink.reports()[0].1, JobStatus::Failed);
    }

    #[tokio::test]
    async fn error_reports_failed_with_message() {
        let sink = Arc::new(RecordingSink::default());
        let id = Uuid::now_v7();
        let err = tracked(sink.clone(), Some(id), async {
            Err(LexcrawlError::classification("https://example.com/x"))
        })
        .await
        .unwrap_err();

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].1, JobStatus::Failed);
        assert_eq!(reports[0].2, err.to_string());
    }

    #[tokio::test]
    async fn no_job_id_means_no_report() {
        let sink = Arc::new(RecordingSink::default());
        tracked(sink.clone(), None, async { Ok(report(true)) })
            .await
            .unwrap();
        assert!(sink.reports().is_empty());
    }

    #[tokio::test]
    async fn sink_failure_does_not_change_outcome() {
        let sink = Arc::new(RecordingSink::failing());
        let out = tracked(sink.clone(), Some(Uuid::now_v7()), async { Ok(report(true)) })
            .await
            .unwrap();
        assert!(out.succeeded);
    }

    #[tokio::test]
    async fn fetcher_construction_error_reports_failed() {
        let sink = Arc::new(RecordingSink::default());
        let id = Uuid::now_v7();
        let mut config = HarvestConfig::from(&AppConfig::default());
        config.render_endpoint = Some("not a url".into());

        let job = PendingJob::new(sink.clone(), Some(id));
        let err = job.setup(HttpFetcher::new(&config)).await.unwrap_err();
        assert!(matches!(err, LexcrawlError::Config { .. }));

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, id.to_string());
        assert_eq!(reports[0].1, JobStatus::Failed);
        assert!(reports[0].2.contains("invalid render endpoint"), "{}", reports[0].2);
    }

    #[tokio::test]
    async fn successful_setup_leaves_job_pending() {
        let sink = Arc::new(RecordingSink::default());
        let job = PendingJob::new(sink.clone(), Some(Uuid::now_v7()));
        let (job, value) = job.setup(Ok(7)).await.unwrap();
        assert_eq!(value, 7);
        assert!(sink.reports().is_empty());

        job.finish(Ok(report(true))).await.unwrap();
        assert_eq!(sink.reports()[0].1, JobStatus::Success);
    }

    #[tokio::test]
    async fn interruption_reports_failed_once() {
        let sink = Arc::new(RecordingSink::default());
        let id = Uuid::now_v7();
        let job = PendingJob::new(sink.clone(), Some(id));

        let err = run_interruptible(job, std::future::pending(), async {})
            .await
            .unwrap_err();
        assert!(matches!(err, LexcrawlError::Interrupted));

        // Give a stray drop report the chance to show up.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            sink.reports(),
            vec![(id.to_string(), JobStatus::Failed, err.to_string())]
        );
    }

    #[tokio::test]
    async fn finished_workflow_wins_over_idle_interrupt() {
        let sink = Arc::new(RecordingSink::default());
        let job = PendingJob::new(sink.clone(), Some(Uuid::now_v7()));
        let out = run_interruptible(job, async { Ok(report(true)) }, std::future::pending())
            .await
            .unwrap();
        assert!(out.succeeded);
        assert_eq!(sink.reports()[0].1, JobStatus::Success);
    }

    #[tokio::test]
    async fn dropped_guard_reports_failed() {
        let sink = Arc::new(RecordingSink::default());
        let id = Uuid::now_v7();
        drop(PendingJob::new(sink.clone(), Some(id)));

        for _ in 0..50 {
            if !sink.reports().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].1, JobStatus::Failed);
        assert_eq!(reports[0].2, ABORTED_MESSAGE);
    }

    #[tokio::test]
    async fn panicking_workflow_still_reports() {
        let sink = Arc::new(RecordingSink::default());
        let id = Uuid::now_v7();
        let task_sink = sink.clone();
        let joined = tokio::spawn(async move {
            tracked(task_sink, Some(id), async {
                if true {
                    panic!("boom");
                }
                Ok(report(true))
            })
            .await
        })
        .await;
        assert!(joined.is_err());

        for _ in 0..50 {
            if !sink.reports().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.reports()[0].1, JobStatus::Failed);
    }
}
