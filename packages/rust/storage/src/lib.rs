//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding catalogued sources,
//! their ordered chunks, background job statuses, and a full-text index over
//! chunk content.
//!
//! **Access rules:**
//! - Workflows: read-write via [`Storage::open`]
//! - `search`: read-only via [`Storage::open_readonly`]
//!
//! Uniqueness is enforced here: one source per `main_url`, one chunk per
//! `(source_id, chunk_index)`. A colliding chunk insert is reported as
//! [`ChunkInsert::AlreadyPresent`] rather than as an error.

mod migrations;

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use lexcrawl_shared::{
    ChunkMetadata, ChunkRecord, DocumentChunk, JobStatus, LexcrawlError, Result, SourceDraft,
    SourceId, SourceRecord, Translations,
};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// Date format of the `published_at` column.
const DATE_FORMAT: &str = "%Y-%m-%d";

const SOURCE_COLUMNS: &str = "id, main_url, type_id, author, is_official_document, \
    translations_json, source_entity_id, published_at, official_number, document_type, \
    credibility_score, is_active, created_at, updated_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Result of a source upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertedSource {
    /// Id of the inserted or pre-existing row.
    pub id: SourceId,
    /// `false` when a row with the same `main_url` already existed.
    pub created: bool,
}

/// Result of a single chunk insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkInsert {
    Inserted,
    /// `(source_id, chunk_index)` was taken. `identical` tells whether the
    /// stored content hashes the same as the rejected one.
    AlreadyPresent { identical: bool },
}

/// Terminal (or pending) state of a tracked job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub status: JobStatus,
    pub message: Option<String>,
}

/// A full-text search hit over chunk content.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub source_id: SourceId,
    pub main_url: String,
    pub chunk_index: u32,
    /// Content excerpt with matches wrapped in `[` `]`.
    pub snippet: String,
    /// FTS5 rank score (lower is better).
    pub score: f64,
}

fn db_err(e: libsql::Error) -> LexcrawlError {
    LexcrawlError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LexcrawlError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage
            .conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .await
            .map_err(db_err)?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LexcrawlError::Storage(format!(
                "database {} does not exist",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;

        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        LexcrawlError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(LexcrawlError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Start a write transaction on the shared connection.
    pub async fn begin(&self) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("BEGIN IMMEDIATE", params![])
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn commit(&self) -> Result<()> {
        self.conn.execute("COMMIT", params![]).await.map_err(db_err)?;
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        self.conn
            .execute("ROLLBACK", params![])
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Source operations
    // -----------------------------------------------------------------------

    /// Insert a source, or update the metadata of the source with the same
    /// `main_url`. The id of an existing row never changes; incoming `None`
    /// fields and empty descriptions keep the stored values.
    pub async fn upsert_source(&self, draft: &SourceDraft) -> Result<UpsertedSource> {
        self.check_writable()?;

        let translations = match self.get_source_by_url(&draft.main_url).await? {
            Some(existing) => merge_translations(
                &existing.translations,
                &draft.translations,
                draft.listing_title,
            ),
            None => draft.translations.clone(),
        };
        let translations_json = serde_json::to_string(&translations)
            .map_err(|e| LexcrawlError::Storage(format!("serialize translations: {e}")))?;

        let new_id = SourceId::new();
        let now = Utc::now().to_rfc3339();
        let published_at = draft
            .published_at
            .map(|d| d.format(DATE_FORMAT).to_string());

        let mut rows = self
            .conn
            .query(
                "INSERT INTO sources (id, main_url, type_id, author, is_official_document,
                    translations_json, source_entity_id, published_at, official_number,
                    document_type, credibility_score, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1.0, 1, ?11, ?12)
                 ON CONFLICT(main_url) DO UPDATE SET
                   type_id = excluded.type_id,
                   author = COALESCE(excluded.author, sources.author),
                   is_official_document = excluded.is_official_document,
                   translations_json = excluded.translations_json,
                   source_entity_id = COALESCE(excluded.source_entity_id, sources.source_entity_id),
                   published_at = COALESCE(excluded.published_at, sources.published_at),
                   official_number = COALESCE(excluded.official_number, sources.official_number),
                   document_type = COALESCE(excluded.document_type, sources.document_type),
                   updated_at = excluded.updated_at
                 RETURNING id",
                params![
                    new_id.to_string(),
                    draft.main_url.as_str(),
                    draft.type_id.as_str(),
                    draft.author.as_deref(),
                    i64::from(draft.is_official_document),
                    translations_json,
                    draft.source_entity_id.as_deref(),
                    published_at.as_deref(),
                    draft.official_number.as_deref(),
                    draft.document_type.as_deref(),
                    now.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;

        let row = rows
            .next()
            .await
            .map_err(db_err)?
            .ok_or_else(|| LexcrawlError::Storage("upsert returned no row".into()))?;
        let id = parse_source_id(&row.get::<String>(0).map_err(db_err)?)?;
        let created = id == new_id;

        tracing::debug!(source_id = %id, created, url = %draft.main_url, "source upserted");
        Ok(UpsertedSource { id, created })
    }

    /// Point lookup by id.
    pub async fn get_source(&self, id: &SourceId) -> Result<Option<SourceRecord>> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1");
        let mut rows = self
            .conn
            .query(&sql, params![id.to_string()])
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_source(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Lookup by the upsert identity key.
    pub async fn get_source_by_url(&self, main_url: &str) -> Result<Option<SourceRecord>> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE main_url = ?1");
        let mut rows = self
            .conn
            .query(&sql, params![main_url])
            .await
            .map_err(db_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_source(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Sources without a single chunk whose URL matches the `LIKE` pattern,
    /// oldest first.
    pub async fn list_unchunked_sources(
        &self,
        url_pattern: &str,
        limit: u32,
    ) -> Result<Vec<SourceRecord>> {
        let sql = format!(
            "SELECT {SOURCE_COLUMNS} FROM sources s
             WHERE s.main_url LIKE ?1
               AND NOT EXISTS (SELECT 1 FROM document_chunks c WHERE c.source_id = s.id)
             ORDER BY s.created_at, s.id
             LIMIT ?2"
        );
        let mut rows = self
            .conn
            .query(&sql, params![url_pattern, limit])
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_source(&row)?);
        }
        Ok(results)
    }

    pub async fn count_sources(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM sources", None).await
    }

    // -----------------------------------------------------------------------
    // Chunk operations
    // -----------------------------------------------------------------------

    /// Insert one chunk. A taken `(source_id, chunk_index)` is not an error.
    pub async fn insert_chunk(
        &self,
        source_id: &SourceId,
        chunk: &DocumentChunk,
    ) -> Result<ChunkInsert> {
        self.check_writable()?;
        let metadata = serde_json::to_string(&chunk.metadata)
            .map_err(|e| LexcrawlError::Storage(format!("serialize chunk metadata: {e}")))?;
        let hash = chunk.content_hash();
        let now = Utc::now().to_rfc3339();

        let inserted = self
            .conn
            .execute(
                "INSERT INTO document_chunks (id, source_id, chunk_index, content, chunk_metadata, content_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(source_id, chunk_index) DO NOTHING",
                params![
                    Uuid::now_v7().to_string(),
                    source_id.to_string(),
                    chunk.chunk_index,
                    chunk.content.as_str(),
                    metadata,
                    hash.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;

        if inserted > 0 {
            return Ok(ChunkInsert::Inserted);
        }

        let mut rows = self
            .conn
            .query(
                "SELECT content_hash FROM document_chunks WHERE source_id = ?1 AND chunk_index = ?2",
                params![source_id.to_string(), chunk.chunk_index],
            )
            .await
            .map_err(db_err)?;
        let stored: Option<String> = match rows.next().await.map_err(db_err)? {
            Some(row) => row.get::<String>(0).ok(),
            None => None,
        };
        Ok(ChunkInsert::AlreadyPresent {
            identical: stored.as_deref() == Some(hash.as_str()),
        })
    }

    pub async fn count_chunks(&self, source_id: &SourceId) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM document_chunks WHERE source_id = ?1",
            Some(source_id),
        )
        .await
    }

    pub async fn count_all_chunks(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM document_chunks", None).await
    }

    /// All chunks of a source in `chunk_index` order.
    pub async fn list_chunks(&self, source_id: &SourceId) -> Result<Vec<ChunkRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, source_id, chunk_index, content, chunk_metadata, content_hash
                 FROM document_chunks WHERE source_id = ?1 ORDER BY chunk_index",
                params![source_id.to_string()],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_chunk(&row)?);
        }
        Ok(results)
    }

    /// Full-text search across all chunk content.
    pub async fn search_chunks(&self, query: &str, limit: u32) -> Result<Vec<ChunkHit>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.source_id, s.main_url, c.chunk_index,
                        snippet(document_chunks_fts, 0, '[', ']', '…', 16), rank
                 FROM document_chunks_fts fts
                 JOIN document_chunks c ON c.rowid = fts.rowid
                 JOIN sources s ON s.id = c.source_id
                 WHERE document_chunks_fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
                params![query, limit],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(ChunkHit {
                source_id: parse_source_id(&row.get::<String>(0).map_err(db_err)?)?,
                main_url: row.get::<String>(1).map_err(db_err)?,
                chunk_index: row.get::<u32>(2).map_err(db_err)?,
                snippet: row.get::<String>(3).unwrap_or_default(),
                score: row.get::<f64>(4).unwrap_or(0.0),
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Job operations
    // -----------------------------------------------------------------------

    /// Record the status of a tracked job, creating the row if needed.
    pub async fn upsert_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        message: &str,
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO background_jobs (id, status, result_message, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                   status = excluded.status,
                   result_message = excluded.result_message,
                   updated_at = excluded.updated_at",
                params![job_id, status.as_str(), message, now.as_str(), now.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT status, result_message FROM background_jobs WHERE id = ?1",
                params![job_id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => {
                let status: String = row.get(0).map_err(db_err)?;
                Ok(Some(JobRow {
                    status: status.parse().map_err(LexcrawlError::Storage)?,
                    message: row.get::<String>(1).ok(),
                }))
            }
            None => Ok(None),
        }
    }

    async fn count(&self, sql: &str, source_id: Option<&SourceId>) -> Result<u64> {
        let mut rows = match source_id {
            Some(id) => self.conn.query(sql, params![id.to_string()]).await,
            None => self.conn.query(sql, params![]).await,
        }
        .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)?.max(0) as u64),
            None => Ok(0),
        }
    }
}

/// Keep stored descriptions when the incoming translation has none. A
/// listing title only fills an empty stored title.
fn merge_translations(
    stored: &Translations,
    incoming: &Translations,
    listing_title: bool,
) -> Translations {
    let mut merged = stored.clone();
    for (locale, translation) in incoming {
        let entry = merged.entry(locale.clone()).or_default();
        if !translation.title.is_empty() && (entry.title.is_empty() || !listing_title) {
            entry.title = translation.title.clone();
        }
        if !translation.description.is_empty() {
            entry.description = translation.description.clone();
        }
    }
    merged
}

fn parse_source_id(raw: &str) -> Result<SourceId> {
    raw.parse()
        .map_err(|e| LexcrawlError::Storage(format!("invalid source id '{raw}': {e}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LexcrawlError::Storage(format!("invalid timestamp: {e}")))
}

/// Convert a database row (in [`SOURCE_COLUMNS`] order) to a [`SourceRecord`].
fn row_to_source(row: &libsql::Row) -> Result<SourceRecord> {
    let translations_json: String = row.get(5).map_err(db_err)?;
    let translations: Translations = serde_json::from_str(&translations_json)
        .map_err(|e| LexcrawlError::Storage(format!("invalid translations: {e}")))?;

    Ok(SourceRecord {
        id: parse_source_id(&row.get::<String>(0).map_err(db_err)?)?,
        main_url: row.get::<String>(1).map_err(db_err)?,
        type_id: row.get::<String>(2).map_err(db_err)?,
        author: row.get::<String>(3).ok(),
        is_official_document: row.get::<i64>(4).map_err(db_err)? != 0,
        translations,
        source_entity_id: row.get::<String>(6).ok(),
        published_at: row
            .get::<String>(7)
            .ok()
            .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
        official_number: row.get::<String>(8).ok(),
        document_type: row.get::<String>(9).ok(),
        credibility_score: row.get::<f64>(10).unwrap_or(1.0),
        is_active: row.get::<i64>(11).map_err(db_err)? != 0,
        created_at: parse_timestamp(&row.get::<String>(12).map_err(db_err)?)?,
        updated_at: parse_timestamp(&row.get::<String>(13).map_err(db_err)?)?,
    })
}

fn row_to_chunk(row: &libsql::Row) -> Result<ChunkRecord> {
    let id: String = row.get(0).map_err(db_err)?;
    let metadata_json: String = row.get(4).map_err(db_err)?;
    let chunk_metadata: ChunkMetadata = serde_json::from_str(&metadata_json)
        .map_err(|e| LexcrawlError::Storage(format!("invalid chunk metadata: {e}")))?;

    Ok(ChunkRecord {
        id: Uuid::parse_str(&id)
            .map_err(|e| LexcrawlError::Storage(format!("invalid chunk id: {e}")))?,
        source_id: parse_source_id(&row.get::<String>(1).map_err(db_err)?)?,
        chunk_index: row.get::<u32>(2).map_err(db_err)?,
        content: row.get::<String>(3).map_err(db_err)?,
        chunk_metadata,
        content_hash: row.get::<String>(5).map_err(db_err)?,
    })
}
