//! Persistent chunk index with cosine top-k retrieval.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::embeddings::Embeddings;

/// One embedded corpus chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub source: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Vector store seam: the pipeline only needs upsert and top-k.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&mut self, chunks: Vec<IndexedChunk>) -> Result<()>;
    async fn top_k(&self, query: &str, k: usize) -> Result<Vec<String>>;
}

/// Cosine similarity between two vectors; 0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// File-backed index: all chunks (with embeddings) serialized as JSON under
/// the corpus' persist directory. Small corpora make an in-memory scan with
/// cosine ranking entirely adequate.
pub struct PersistentIndex {
    path: PathBuf,
    chunks: Vec<IndexedChunk>,
    embeddings: Arc<dyn Embeddings>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    chunks: Vec<IndexedChunk>,
}

impl PersistentIndex {
    pub fn empty(path: &Path, embeddings: Arc<dyn Embeddings>) -> Self {
        Self {
            path: path.to_path_buf(),
            chunks: Vec::new(),
            embeddings,
        }
    }

    /// Load a previously persisted index.
    pub fn load(path: &Path, embeddings: Arc<dyn Embeddings>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read index at {}", path.display()))?;
        let file: IndexFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse index at {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            chunks: file.chunks,
            embeddings,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn persist(&self) -> Result<()> {
        let file = IndexFile {
            chunks: self.chunks.clone(),
        };
        let raw = serde_json::to_string(&file).context("Failed to serialize index")?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write index at {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for PersistentIndex {
    async fn upsert(&mut self, chunks: Vec<IndexedChunk>) -> Result<()> {
        self.chunks.extend(chunks);
        self.persist()
    }

    async fn top_k(&self, query: &str, k: usize) -> Result<Vec<String>> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = self
            .embeddings
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .context("Embedding service returned no vector for the query")?;

        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .chunks
            .iter()
            .map(|chunk| (cosine_similarity(&query_embedding, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, chunk)| chunk.text.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbeddings(Vec<f32>);

    #[async_trait]
    impl Embeddings for FixedEmbeddings {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }
    }

    fn chunk(text: &str, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            source: "test.md".to_string(),
            text: text.to_string(),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_top_k_ranks_by_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let mut index = PersistentIndex::empty(&path, Arc::new(FixedEmbeddings(vec![1.0, 0.0])));
        index
            .upsert(vec![
                chunk("aligned", vec![1.0, 0.0]),
                chunk("orthogonal", vec![0.0, 1.0]),
                chunk("close", vec![0.9, 0.1]),
            ])
            .await
            .unwrap();

        let hits = index.top_k("query", 2).await.unwrap();
        assert_eq!(hits, vec!["aligned".to_string(), "close".to_string()]);
    }

    #[tokio::test]
    async fn test_persist_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let embeddings: Arc<dyn Embeddings> = Arc::new(FixedEmbeddings(vec![1.0]));
        let mut index = PersistentIndex::empty(&path, embeddings.clone());
        index.upsert(vec![chunk("persisted", vec![1.0])]).await.unwrap();

        let reloaded = PersistentIndex::load(&path, embeddings).unwrap();
        assert_eq!(reloaded.len(), 1);
        let hits = reloaded.top_k("q", 3).await.unwrap();
        assert_eq!(hits, vec!["persisted".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = PersistentIndex::empty(&path, Arc::new(FixedEmbeddings(vec![1.0])));
        assert!(index.top_k("q", 3).await.unwrap().is_empty());
    }
}
