// Database queries for the pgvector store

use super::schema::CHUNK_TABLE;
use crate::ai::rag::{EmbeddingVector, RAGError, RAGResult, RetrievedChunk};
use pgvector::Vector;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Serialize writers of one document for the rest of the transaction.
///
/// Without it two concurrent replacements under READ COMMITTED could each
/// miss the other's freshly inserted rows and leave a mixed chunk set.
pub async fn lock_document(
    tx: &mut Transaction<'_, Postgres>,
    conversation_id: &str,
    document_id: &str,
) -> RAGResult<()> {
    let key = format!("{}\u{1f}{}", conversation_id, document_id);
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(key)
        .execute(&mut **tx)
        .await
        .map_err(RAGError::database("lock document"))?;
    Ok(())
}

/// Delete every chunk of a document inside the transaction
pub async fn delete_document_chunks(
    tx: &mut Transaction<'_, Postgres>,
    conversation_id: &str,
    document_id: &str,
) -> RAGResult<u64> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE conversation_id = $1 AND document_id = $2",
        CHUNK_TABLE
    ))
    .bind(conversation_id)
    .bind(document_id)
    .execute(&mut **tx)
    .await
    .map_err(RAGError::database("delete existing chunks"))?;

    Ok(result.rows_affected())
}

/// Insert one chunk row with a fresh id and the current timestamp
pub async fn insert_chunk(
    tx: &mut Transaction<'_, Postgres>,
    conversation_id: &str,
    document_id: &str,
    chunk_index: i32,
    content: &str,
    embedding: &EmbeddingVector,
) -> RAGResult<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(&format!(
        r#"
        INSERT INTO {} (id, conversation_id, document_id, chunk_index, content, embedding, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
        CHUNK_TABLE
    ))
    .bind(id)
    .bind(conversation_id)
    .bind(document_id)
    .bind(chunk_index)
    .bind(content)
    .bind(Vector::from(embedding.clone()))
    .bind(chrono::Utc::now())
    .execute(&mut **tx)
    .await
    .map_err(RAGError::database("insert chunk"))?;

    Ok(id)
}

/// Most similar chunks of a conversation by cosine distance
pub async fn similarity_search(
    pool: &PgPool,
    conversation_id: &str,
    query: &[f32],
    limit: usize,
) -> RAGResult<Vec<RetrievedChunk>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    sqlx::query_as::<_, RetrievedChunk>(&format!(
        r#"
        SELECT id, conversation_id, document_id, chunk_index, content,
               (1 - (embedding <=> $1))::real AS score
        FROM {}
        WHERE conversation_id = $2
        ORDER BY embedding <=> $1
        LIMIT $3
        "#,
        CHUNK_TABLE
    ))
    .bind(Vector::from(query.to_vec()))
    .bind(conversation_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(RAGError::database("query similar chunks"))
}

/// Delete every chunk of a conversation
pub async fn delete_conversation_chunks(pool: &PgPool, conversation_id: &str) -> RAGResult<u64> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE conversation_id = $1", CHUNK_TABLE))
        .bind(conversation_id)
        .execute(pool)
        .await
        .map_err(RAGError::database("delete conversation chunks"))?;

    Ok(result.rows_affected())
}
