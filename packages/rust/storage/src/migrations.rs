//! SQL migration definitions for the lexcrawl database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: sources, document_chunks, background_jobs",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Catalogued documents, one per distinct main_url
CREATE TABLE IF NOT EXISTS sources (
    id                   TEXT PRIMARY KEY,
    main_url             TEXT NOT NULL UNIQUE,
    type_id              TEXT NOT NULL,
    author               TEXT,
    is_official_document INTEGER NOT NULL DEFAULT 1,
    translations_json    TEXT NOT NULL,
    source_entity_id     TEXT,
    published_at         TEXT,
    official_number      TEXT,
    document_type        TEXT,
    credibility_score    REAL NOT NULL DEFAULT 1.0,
    is_active            INTEGER NOT NULL DEFAULT 1,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sources_published_at ON sources(published_at);

-- Ordered article chunks of each source
CREATE TABLE IF NOT EXISTS document_chunks (
    id             TEXT PRIMARY KEY,
    source_id      TEXT NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
    chunk_index    INTEGER NOT NULL CHECK (chunk_index >= 0),
    content        TEXT NOT NULL CHECK (length(content) > 0),
    chunk_metadata TEXT NOT NULL,
    content_hash   TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    UNIQUE(source_id, chunk_index)
);

CREATE INDEX IF NOT EXISTS idx_document_chunks_source ON document_chunks(source_id);

-- Terminal status of tracked workflow invocations
CREATE TABLE IF NOT EXISTS background_jobs (
    id             TEXT PRIMARY KEY,
    status         TEXT NOT NULL CHECK (status IN ('PENDING', 'SUCCESS', 'FAILED')),
    result_message TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Full-text search over chunk content",
            sql: r#"
CREATE VIRTUAL TABLE IF NOT EXISTS document_chunks_fts USING fts5(
    content,
    content=document_chunks,
    content_rowid=rowid
);

-- Chunks are never updated in place, so insert/delete triggers suffice
CREATE TRIGGER IF NOT EXISTS document_chunks_fts_insert AFTER INSERT ON document_chunks BEGIN
    INSERT INTO document_chunks_fts(rowid, content) VALUES (new.rowid, new.content);
END;

CREATE TRIGGER IF NOT EXISTS document_chunks_fts_delete AFTER DELETE ON document_chunks BEGIN
    INSERT INTO document_chunks_fts(document_chunks_fts, rowid, content)
    VALUES ('delete', old.rowid, old.content);
END;

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
