//! In-memory fakes for workflow tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use url::Url;
use uuid::Uuid;

use lexcrawl_crawler::{LoadedPage, PageFetcher};
use lexcrawl_shared::{AppConfig, HarvestConfig, JobStatus, LexcrawlError, Result};
use lexcrawl_storage::Storage;

use crate::jobs::JobSink;
use crate::pipeline::WorkflowContext;

/// Read an HTML fixture from the workspace `fixtures/html` directory.
pub fn fixture(name: &str) -> String {
    let path = format!("{}/../../../fixtures/html/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
}

/// Context over a fresh temporary database, with no request delay.
pub async fn workflow_context<F: PageFetcher>(fetcher: F) -> WorkflowContext<F> {
    let tmp = std::env::temp_dir().join(format!("lexcrawl_wf_{}.db", Uuid::now_v7()));
    let storage = Storage::open(&tmp).await.expect("open test db");
    let mut config = HarvestConfig::from(&AppConfig::default());
    config.rate_limit_ms = 0;
    config.database_path = tmp;
    WorkflowContext::new(Arc::new(storage), fetcher, config)
}

/// Serves fixed markup per URL; unknown URLs fail like an HTTP 404.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    loads: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    pub fn with_fixture(self, url: &str, name: &str) -> Self {
        self.with_page(url, fixture(name))
    }

    /// URLs loaded so far, in order.
    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().expect("loads lock").clone()
    }
}

impl PageFetcher for StaticFetcher {
    async fn load(&self, url: &Url, _ready: &'static [&'static str]) -> Result<LoadedPage> {
        self.loads.lock().expect("loads lock").push(url.to_string());
        match self.pages.get(url.as_str()) {
            Some(html) => Ok(LoadedPage::new(url.clone(), html.clone())),
            None => Err(LexcrawlError::Fetch(format!("{url}: HTTP 404 Not Found"))),
        }
    }
}

/// Records every reported status; optionally fails each report.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<(String, JobStatus, String)>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<(String, JobStatus, String)> {
        self.reports.lock().expect("reports lock").clone()
    }
}

impl JobSink for RecordingSink {
    async fn report_status(&self, job_id: &str, status: JobStatus, message: &str) -> Result<()> {
        if self.fail {
            return Err(LexcrawlError::Storage("sink unavailable".into()));
        }
        self.reports
            .lock()
            .expect("reports lock")
            .push((job_id.to_string(), status, message.to_string()));
        Ok(())
    }
}
