//! Retrieval-augmented context over a markdown knowledge corpus.
//!
//! The index is built at most once per process (lazily, behind a
//! `OnceCell`) and persisted under `<corpus>/chroma_db/` so restarts reuse
//! it. A missing corpus disables retrieval; every failure degrades to an
//! empty context rather than surfacing an error into the pipeline.

pub mod chunk;
pub mod embeddings;
pub mod index;

pub use chunk::split_text;
pub use embeddings::{Embeddings, GeminiEmbeddings};
pub use index::{cosine_similarity, IndexedChunk, PersistentIndex, VectorIndex};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::Settings;

/// Subdirectory of the corpus holding the persisted index.
pub const PERSIST_SUBDIR: &str = "chroma_db";
const INDEX_FILE: &str = "index.json";

/// Process-level retrieval service.
pub struct RagService {
    corpus_path: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
    embeddings: Arc<dyn Embeddings>,
    index: OnceCell<Option<PersistentIndex>>,
}

impl RagService {
    pub fn new(settings: &Settings) -> Self {
        Self::with_embeddings(settings, Arc::new(GeminiEmbeddings::new(settings)))
    }

    pub fn with_embeddings(settings: &Settings, embeddings: Arc<dyn Embeddings>) -> Self {
        Self {
            corpus_path: settings.knowledge_base_path.clone(),
            chunk_size: settings.rag_chunk_size,
            chunk_overlap: settings.rag_chunk_overlap,
            embeddings,
            index: OnceCell::new(),
        }
    }

    /// Top-k chunks for a query. Degrades to empty on any failure.
    pub async fn query(&self, text: &str, k: usize) -> Vec<String> {
        let Some(index) = self.retriever().await else {
            return Vec::new();
        };
        match index.top_k(text, k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("RAG retrieval failed: {}", e);
                Vec::new()
            }
        }
    }

    /// The lazily built index; `None` when retrieval is disabled.
    async fn retriever(&self) -> Option<&PersistentIndex> {
        self.index
            .get_or_init(|| async { self.load_or_build().await })
            .await
            .as_ref()
    }

    async fn load_or_build(&self) -> Option<PersistentIndex> {
        if !self.corpus_path.exists() {
            warn!(
                "Knowledge base path not found ({}). Running without RAG.",
                self.corpus_path.display()
            );
            return None;
        }
        let persist_dir = self.corpus_path.join(PERSIST_SUBDIR);
        let index_file = persist_dir.join(INDEX_FILE);

        if index_file.exists() {
            match PersistentIndex::load(&index_file, self.embeddings.clone()) {
                Ok(index) => {
                    info!("Loaded retrieval index from {}", index_file.display());
                    return Some(index);
                }
                Err(e) => {
                    warn!("Index load from disk failed, rebuilding: {}", e);
                }
            }
        }

        match self.build(&persist_dir, &index_file).await {
            Ok(index) => index,
            Err(e) => {
                warn!("RAG setup failed: {}", e);
                None
            }
        }
    }

    async fn build(
        &self,
        persist_dir: &Path,
        index_file: &Path,
    ) -> anyhow::Result<Option<PersistentIndex>> {
        let files = gather_markdown_files(&self.corpus_path, persist_dir);
        if files.is_empty() {
            warn!(
                "No markdown files under {}; retrieval disabled",
                self.corpus_path.display()
            );
            return Ok(None);
        }

        let mut texts = Vec::new();
        let mut sources = Vec::new();
        for file in &files {
            let content = match std::fs::read_to_string(file) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Failed to load {}: {}", file.display(), e);
                    continue;
                }
            };
            for piece in split_text(&content, self.chunk_size, self.chunk_overlap) {
                texts.push(piece);
                sources.push(file.display().to_string());
            }
        }
        if texts.is_empty() {
            return Ok(None);
        }

        info!(
            "Building retrieval index: {} chunks from {} files",
            texts.len(),
            files.len()
        );
        let vectors = self.embeddings.embed(&texts).await?;
        let chunks = texts
            .into_iter()
            .zip(sources)
            .zip(vectors)
            .map(|((text, source), embedding)| IndexedChunk {
                source,
                text,
                embedding,
            })
            .collect();

        std::fs::create_dir_all(persist_dir)?;
        let mut index = PersistentIndex::empty(index_file, self.embeddings.clone());
        index.upsert(chunks).await?;
        Ok(Some(index))
    }
}

/// All `.md` files under the corpus, skipping the persisted index directory.
fn gather_markdown_files(root: &Path, persist_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if dir == persist_dir {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|ext| ext == "md") {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Deterministic embedder: one dimension per known keyword.
    struct KeywordEmbeddings;

    #[async_trait]
    impl Embeddings for KeywordEmbeddings {
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let lowered = t.to_lowercase();
                    vec![
                        lowered.matches("spoofing").count() as f32,
                        lowered.matches("tampering").count() as f32,
                        1.0,
                    ]
                })
                .collect())
        }
    }

    fn settings_with_corpus(path: &Path) -> Settings {
        let mut settings = Settings::for_tests();
        settings.knowledge_base_path = path.to_path_buf();
        settings.rag_chunk_size = 200;
        settings.rag_chunk_overlap = 20;
        settings
    }

    #[tokio::test]
    async fn test_missing_corpus_disables_retrieval() {
        let settings = settings_with_corpus(Path::new("/nonexistent/kb"));
        let rag = RagService::with_embeddings(&settings, Arc::new(KeywordEmbeddings));
        assert!(rag.query("anything", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_build_query_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("stride.md"),
            "Spoofing threats target authentication.",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("other.md"),
            "Tampering threats target integrity.",
        )
        .unwrap();

        let settings = settings_with_corpus(dir.path());
        let rag = RagService::with_embeddings(&settings, Arc::new(KeywordEmbeddings));

        let hits = rag.query("spoofing", 1).await;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("Spoofing"));

        // The index must be persisted under <corpus>/chroma_db/.
        assert!(dir.path().join(PERSIST_SUBDIR).join("index.json").exists());

        // A second service instance loads the persisted index.
        let rag2 = RagService::with_embeddings(&settings, Arc::new(KeywordEmbeddings));
        let hits2 = rag2.query("tampering", 1).await;
        assert_eq!(hits2.len(), 1);
        assert!(hits2[0].contains("Tampering"));
    }

    #[tokio::test]
    async fn test_empty_corpus_yields_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_with_corpus(dir.path());
        let rag = RagService::with_embeddings(&settings, Arc::new(KeywordEmbeddings));
        assert!(rag.query("anything", 3).await.is_empty());
    }

    #[test]
    fn test_gather_excludes_persist_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.md"), "x").unwrap();
        let persist = dir.path().join(PERSIST_SUBDIR);
        std::fs::create_dir_all(&persist).unwrap();
        std::fs::write(persist.join("stale.md"), "y").unwrap();

        let files = gather_markdown_files(dir.path(), &persist);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("doc.md"));
    }
}
