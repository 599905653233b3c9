// Schema management for the pgvector store

use crate::ai::rag::{RAGError, RAGResult, SimilarityIndexStatus};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

pub const CHUNK_TABLE: &str = "document_chunks";
pub const EMBEDDING_INDEX: &str = "document_chunks_embedding_idx";

/// Approximate nearest-neighbour index built over the embedding column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnIndexKind {
    /// Inverted-file index; needs rows to train its `lists` centroids
    IvfFlat { lists: u32 },
    /// Graph-based index
    Hnsw { m: u32, ef_construction: u32 },
    /// No approximate index, every query scans
    Disabled,
}

impl Default for AnnIndexKind {
    fn default() -> Self {
        AnnIndexKind::IvfFlat { lists: 100 }
    }
}

impl AnnIndexKind {
    /// `CREATE INDEX` statement for this index kind, cosine-distance ordered
    pub fn create_statement(&self) -> Option<String> {
        let method = match self {
            AnnIndexKind::IvfFlat { lists } => format!("ivfflat (embedding vector_cosine_ops) WITH (lists = {})", lists),
            AnnIndexKind::Hnsw { m, ef_construction } => format!(
                "hnsw (embedding vector_cosine_ops) WITH (m = {}, ef_construction = {})",
                m, ef_construction
            ),
            AnnIndexKind::Disabled => return None,
        };
        Some(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING {}",
            EMBEDDING_INDEX, CHUNK_TABLE, method
        ))
    }
}

/// Statements that must succeed for the store to be usable
pub fn base_statements(dimension: usize) -> Vec<String> {
    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                chunk_index INT NOT NULL,
                content TEXT NOT NULL,
                embedding vector({dimension}) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            table = CHUNK_TABLE,
            dimension = dimension
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS document_chunks_conversation_idx ON {} (conversation_id)",
            CHUNK_TABLE
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS document_chunks_document_idx ON {} (document_id)",
            CHUNK_TABLE
        ),
    ]
}

/// SQLSTATE classes the engine reports when it cannot (yet) build the approximate index:
/// feature_not_supported, invalid_parameter_value, undefined_object (missing access
/// method or operator class), out_of_memory, program_limit_exceeded.
const DEFERRABLE_INDEX_STATES: &[&str] = &["0A000", "22023", "42704", "53200", "54000"];

/// Whether an index creation failure only degrades query latency
pub fn is_deferrable_index_error(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error
            .code()
            .is_some_and(|code| DEFERRABLE_INDEX_STATES.contains(&&*code)),
        _ => false,
    }
}

/// Create the chunk table and its secondary indexes. Any failure is fatal.
pub async fn ensure_base_schema(pool: &PgPool, dimension: usize) -> RAGResult<()> {
    for statement in base_statements(dimension) {
        sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(RAGError::database("create vector schema"))?;
    }
    Ok(())
}

/// Best-effort creation of the approximate similarity index
pub async fn ensure_similarity_index(
    pool: &PgPool,
    kind: AnnIndexKind,
) -> RAGResult<SimilarityIndexStatus> {
    let Some(statement) = kind.create_statement() else {
        return Ok(SimilarityIndexStatus::ExactScan);
    };

    let result = sqlx::query(&statement).execute(pool).await.map(|_| ());
    index_creation_outcome(result)
}

/// Map the result of `CREATE INDEX` to the store's index status
pub(crate) fn index_creation_outcome(
    result: Result<(), sqlx::Error>,
) -> RAGResult<SimilarityIndexStatus> {
    match result {
        Ok(()) => Ok(SimilarityIndexStatus::Ready),
        Err(e) if is_deferrable_index_error(&e) => {
            tracing::warn!(
                "Approximate similarity index not created, falling back to full scan: {}",
                e
            );
            Ok(SimilarityIndexStatus::Deferred {
                reason: e.to_string(),
            })
        }
        Err(e) => Err(RAGError::Database {
            context: "create similarity index",
            source: e,
        }),
    }
}
