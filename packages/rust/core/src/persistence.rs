//! Persistence coordinator: the only writer of sources and chunks.
//!
//! Two entry points cover the two source policies. Direct extraction,
//! discovery and the backlog sweep create or update a source by URL; the
//! targeted retry appends chunks to an existing source and has no way to
//! create one. Each call runs as one transaction.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use lexcrawl_shared::{DocumentChunk, LexcrawlError, Result, SourceDraft, SourceId};
use lexcrawl_storage::{ChunkInsert, Storage};

/// A chunk that was not written because its index was already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConflict {
    pub chunk_index: u32,
    /// Whether the stored chunk has the same content.
    pub identical: bool,
}

/// Result of [`PersistenceCoordinator::upsert_source_and_chunks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertReport {
    pub source_id: SourceId,
    /// `false` when the source already existed and was updated.
    pub created: bool,
    pub inserted: usize,
    pub skipped: Vec<ChunkConflict>,
}

/// Result of [`PersistenceCoordinator::append_chunks_for_existing_source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended { inserted: usize },
    /// The source already had chunks; nothing was written.
    Refused { existing: u64 },
}

/// Serializes document writes over a shared [`Storage`].
pub struct PersistenceCoordinator {
    storage: Arc<Storage>,
    /// Held for the duration of each transaction.
    write_gate: Mutex<()>,
}

impl PersistenceCoordinator {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            write_gate: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Create or update the source keyed by `draft.main_url`, then insert
    /// every chunk. Index collisions are skipped and reported.
    #[instrument(skip_all, fields(url = %draft.main_url, chunks = chunks.len()))]
    pub async fn upsert_source_and_chunks(
        &self,
        draft: &SourceDraft,
        chunks: &[DocumentChunk],
    ) -> Result<UpsertReport> {
        self.in_transaction(async {
            let upserted = self.storage.upsert_source(draft).await?;
            let mut report = UpsertReport {
                source_id: upserted.id,
                created: upserted.created,
                inserted: 0,
                skipped: Vec::new(),
            };

            for chunk in chunks {
                match self.storage.insert_chunk(&upserted.id, chunk).await? {
                    ChunkInsert::Inserted => report.inserted += 1,
                    ChunkInsert::AlreadyPresent { identical } => {
                        debug!(
                            chunk_index = chunk.chunk_index,
                            identical, "chunk already present, skipping"
                        );
                        report.skipped.push(ChunkConflict {
                            chunk_index: chunk.chunk_index,
                            identical,
                        });
                    }
                }
            }
            Ok(report)
        })
        .await
        .inspect(|report| {
            info!(
                source_id = %report.source_id,
                created = report.created,
                inserted = report.inserted,
                skipped = report.skipped.len(),
                "source persisted"
            );
        })
    }

    /// Insert `chunks` for a source that has none yet, numbered from 0.
    ///
    /// Never writes the source row. A source that already has chunks is
    /// refused without error; an unknown source id is a validation error.
    #[instrument(skip_all, fields(source_id = %source_id, chunks = chunks.len()))]
    pub async fn append_chunks_for_existing_source(
        &self,
        source_id: &SourceId,
        chunks: &[DocumentChunk],
    ) -> Result<AppendOutcome> {
        self.in_transaction(async {
            if self.storage.get_source(source_id).await?.is_none() {
                return Err(LexcrawlError::validation(format!(
                    "source {source_id} not found"
                )));
            }

            let existing = self.storage.count_chunks(source_id).await?;
            if existing > 0 {
                warn!(existing, "source already has chunks, refusing to append");
                return Ok(AppendOutcome::Refused { existing });
            }

            let mut inserted = 0;
            for (index, chunk) in chunks.iter().enumerate() {
                let mut chunk = chunk.clone();
                chunk.chunk_index = index as u32;
                if self.storage.insert_chunk(source_id, &chunk).await? == ChunkInsert::Inserted {
                    inserted += 1;
                }
            }
            info!(inserted, "chunks appended");
            Ok(AppendOutcome::Appended { inserted })
        })
        .await
    }

    async fn in_transaction<T>(&self, work: impl Future<Output = Result<T>>) -> Result<T> {
        let _gate = self.write_gate.lock().await;
        self.storage.begin().await?;
        match work.await {
            Ok(value) => {
                self.storage.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.storage.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}
