//! Deterministic offline embedder.

use async_trait::async_trait;

use rag_core::{Embedder, RagError, Result};

/// Hashing-trick embedder: each lowercase word is hashed into a bucket.
///
/// No network, no model files. Texts sharing words get a positive cosine
/// similarity, which is enough for offline use and tests.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create a hash embedder with the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let hash = fnv1a(word.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        // L2 normalize
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        } else {
            embedding[0] = 1.0;
        }
        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(768)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325u64, |acc, b| {
        (acc ^ *b as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_documents(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding("no embedding produced"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_hash_embedder() {
        let embedder = HashEmbedder::new(64);
        assert_eq!(embedder.dimension(), 64);

        let texts = ["Hello world", "Rust is great"];
        let embeddings = embedder.embed_documents(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 64);

        // Check L2 normalization
        let norm: f32 = embeddings[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_deterministic_and_case_insensitive() {
        let embedder = HashEmbedder::new(128);
        let a = embedder.embed_query("Quarterly Report").await.unwrap();
        let b = embedder.embed_query("quarterly report").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_identical_text_is_nearest() {
        let embedder = HashEmbedder::new(256);
        let query = embedder.embed_query("vpn setup for contractors").await.unwrap();
        let same = embedder.embed_query("vpn setup for contractors").await.unwrap();
        assert!((cosine(&query, &same) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_text_still_unit_length() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed_query("  ...  ").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
