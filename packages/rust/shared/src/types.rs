//! Core domain types for lexcrawl sources and chunks.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// `type_id` given to every source harvested from the official gazette.
pub const OFFICIAL_PUBLICATION: &str = "OFFICIAL_PUBLICATION";

/// The only locale sources are catalogued in.
pub const SOURCE_LOCALE: &str = "pt";

// ---------------------------------------------------------------------------
// SourceId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for source identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub Uuid);

impl SourceId {
    /// Generate a new time-sortable source identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SourceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Localized title and description of a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Locale code → translation.
pub type Translations = BTreeMap<String, Translation>;

/// Source data as produced by extraction or discovery, before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDraft {
    pub main_url: String,
    pub type_id: String,
    /// Emitting entity, e.g. "Assembleia da República".
    pub author: Option<String>,
    pub is_official_document: bool,
    pub translations: Translations,
    pub source_entity_id: Option<String>,
    pub published_at: Option<NaiveDate>,
    pub official_number: Option<String>,
    pub document_type: Option<String>,
    /// Title read from a results listing; a stored title takes precedence.
    pub listing_title: bool,
}

impl SourceDraft {
    /// Draft for an official publication with a `pt` title and description.
    pub fn official(main_url: impl Into<String>, title: impl Into<String>) -> Self {
        let mut translations = Translations::new();
        translations.insert(
            SOURCE_LOCALE.to_string(),
            Translation {
                title: title.into(),
                description: String::new(),
            },
        );
        Self {
            main_url: main_url.into(),
            type_id: OFFICIAL_PUBLICATION.to_string(),
            author: None,
            is_official_document: true,
            translations,
            source_entity_id: None,
            published_at: None,
            official_number: None,
            document_type: None,
            listing_title: false,
        }
    }

    /// Set the `pt` description, keeping the title.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        if let Some(t) = self.translations.get_mut(SOURCE_LOCALE) {
            t.description = description.into();
        }
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.translations
            .get(SOURCE_LOCALE)
            .map(|t| t.title.as_str())
    }
}

/// A persisted source, as stored in the `sources` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: SourceId,
    pub main_url: String,
    pub type_id: String,
    pub author: Option<String>,
    pub is_official_document: bool,
    pub translations: Translations,
    pub source_entity_id: Option<String>,
    pub published_at: Option<NaiveDate>,
    pub official_number: Option<String>,
    pub document_type: Option<String>,
    pub credibility_score: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceRecord {
    pub fn title(&self) -> Option<&str> {
        self.translations
            .get(SOURCE_LOCALE)
            .map(|t| t.title.as_str())
    }
}

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

/// What part of a document a chunk holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleKind {
    /// Text before the first article heading.
    Preamble,
    /// One numbered article.
    Article,
    /// The whole document, when no article structure exists.
    Document,
}

/// Structured metadata stored alongside each chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub article_number: u32,
    pub article_type: ArticleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}

/// One ordered unit of document content, produced by segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub chunk_index: u32,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    pub fn article_number(&self) -> u32 {
        self.metadata.article_number
    }

    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }
}

/// A persisted chunk, as stored in the `document_chunks` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: Uuid,
    pub source_id: SourceId,
    pub chunk_index: u32,
    pub content: String,
    pub chunk_metadata: ChunkMetadata,
    pub content_hash: String,
}

/// Hex-encoded SHA-256 of chunk content.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Status of a tracked background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentType
// ---------------------------------------------------------------------------

/// Document types the archive search can be filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    Lei,
    DecretoLei,
    Portaria,
    Despacho,
    Resolucao,
    Decreto,
}

impl DocumentType {
    pub const ALL: [DocumentType; 6] = [
        Self::Lei,
        Self::DecretoLei,
        Self::Portaria,
        Self::Despacho,
        Self::Resolucao,
        Self::Decreto,
    ];

    /// Label as written in the archive.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Lei => "Lei",
            Self::DecretoLei => "Decreto-Lei",
            Self::Portaria => "Portaria",
            Self::Despacho => "Despacho",
            Self::Resolucao => "Resolução",
            Self::Decreto => "Decreto",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        if wanted == "resolucao" {
            return Ok(Self::Resolucao);
        }
        Self::ALL
            .into_iter()
            .find(|t| t.label().to_lowercase() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|t| t.label()).collect();
                format!("unknown document type '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_id_roundtrip() {
        let id = SourceId::new();
        let s = id.to_string();
        let parsed: SourceId = s.parse().expect("parse SourceId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn chunk_metadata_uses_camel_case() {
        let meta = ChunkMetadata {
            article_number: 3,
            article_type: ArticleKind::Article,
            heading: Some("Artigo 3.º".into()),
        };
        let json = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(json["articleNumber"], 3);
        assert_eq!(json["articleType"], "article");
        assert_eq!(json["heading"], "Artigo 3.º");

        let preamble = ChunkMetadata {
            article_number: 0,
            article_type: ArticleKind::Preamble,
            heading: None,
        };
        let json = serde_json::to_string(&preamble).expect("serialize");
        assert!(!json.contains("heading"));
    }

    #[test]
    fn document_type_parses_labels() {
        assert_eq!("Decreto-Lei".parse::<DocumentType>(), Ok(DocumentType::DecretoLei));
        assert_eq!("lei".parse::<DocumentType>(), Ok(DocumentType::Lei));
        assert_eq!("Resolução".parse::<DocumentType>(), Ok(DocumentType::Resolucao));
        assert_eq!("resolucao".parse::<DocumentType>(), Ok(DocumentType::Resolucao));
        assert!("Acórdão".parse::<DocumentType>().is_err());
    }

    #[test]
    fn official_draft_has_pt_translation() {
        let draft = SourceDraft::official("https://diariodarepublica.pt/dr/detalhe/lei/1-2025", "Lei n.º 1/2025")
            .with_description("Aprova o orçamento");
        assert_eq!(draft.type_id, OFFICIAL_PUBLICATION);
        assert_eq!(draft.title(), Some("Lei n.º 1/2025"));
        assert_eq!(draft.translations["pt"].description, "Aprova o orçamento");
    }

    #[test]
    fn content_hash_is_stable_hex() {
        let a = content_hash("Artigo 1.º");
        assert_eq!(a.len(), 64);
        assert_eq!(a, content_hash("Artigo 1.º"));
        assert_ne!(a, content_hash("Artigo 2.º"));
    }

    #[test]
    fn job_status_strings() {
        assert_eq!(JobStatus::Success.to_string(), "SUCCESS");
        assert_eq!("FAILED".parse::<JobStatus>(), Ok(JobStatus::Failed));
        assert!(!JobStatus::Pending.is_terminal());
    }
}
