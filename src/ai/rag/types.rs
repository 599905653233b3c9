// Core data types shared by the vector stores and the retrieval path

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed-length embedding produced by an embedding provider
pub type EmbeddingVector = Vec<f32>;

/// A retrieved document snippet along with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RetrievedChunk {
    pub id: Uuid,
    pub conversation_id: String,
    pub document_id: String,
    pub chunk_index: i32,
    pub content: String,
    /// `1 - cosine distance`, higher is more relevant
    pub score: f32,
}

/// Cosine similarity of two equal-length vectors.
///
/// Zero-length vectors have no direction; they are treated as unrelated (0.0).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
