use crate::chunk_text::chunk_text;
use crate::config::Config;
use crate::embed_chunks::Embedder;
use crate::error::{RagError, Result};
use crate::retrieve_chunks::{retrieve_top, Hit};
use crate::scan_files::Document;

/// One embedded chunk of a source document.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: u64,
    pub doc_path: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Flat vector index over document chunks.
#[derive(Clone, Debug)]
pub struct VectorIndex {
    pub(crate) embed_model: String,
    pub(crate) dimension: usize,
    pub(crate) nodes: Vec<Node>,
}

impl VectorIndex {
    pub fn from_documents(docs: &[Document], cfg: &Config, embedder: &dyn Embedder) -> Result<Self> {
        let mut index = Self {
            embed_model: embedder.model_name().to_string(),
            dimension: 0,
            nodes: Vec::new(),
        };
        let mut next_id: u64 = 1;

        for doc in docs {
            let chunks = chunk_text(&doc.text, cfg);
            if chunks.is_empty() {
                continue;
            }
            let vectors = embedder.embed(&chunks)?;
            if vectors.len() != chunks.len() {
                return Err(RagError::Decode(format!(
                    "{}: {} chunks but {} embeddings",
                    doc.path,
                    chunks.len(),
                    vectors.len()
                )));
            }

            for (idx, (chunk, vector)) in chunks.into_iter().zip(vectors).enumerate() {
                index.check_dimension(&vector)?;
                index.nodes.push(Node {
                    id: next_id,
                    doc_path: doc.path.clone(),
                    chunk_index: idx,
                    text: chunk,
                    embedding: vector,
                });
                next_id += 1;
            }
            tracing::debug!(path = %doc.path, nodes = index.nodes.len(), "indexed document");
        }

        tracing::info!(
            documents = docs.len(),
            nodes = index.nodes.len(),
            model = %index.embed_model,
            "built vector index"
        );
        Ok(index)
    }

    fn check_dimension(&mut self, vector: &[f32]) -> Result<()> {
        if vector.is_empty() {
            return Err(RagError::Decode("empty embedding vector".to_string()));
        }
        if self.dimension == 0 {
            self.dimension = vector.len();
        } else if self.dimension != vector.len() {
            return Err(RagError::Decode(format!(
                "embedding dimension changed from {} to {}",
                self.dimension,
                vector.len()
            )));
        }
        Ok(())
    }

    pub fn retrieve(&self, query: &[f32], top_k: usize) -> Vec<Hit> {
        retrieve_top(&self.nodes, query, top_k)
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEmbedder;
    use crate::test_support::test_config;
    use std::path::Path;

    fn doc(path: &str, text: &str) -> Document {
        Document {
            path: path.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn builds_nodes_with_sequential_ids() {
        let mut cfg = test_config(Path::new("."));
        cfg.chunk_size = 0;
        let docs = vec![
            doc("a.md", "Feature X requires configuration Y"),
            doc("b.md", "Offline sync uses a local database"),
        ];
        let index = VectorIndex::from_documents(&docs, &cfg, &MockEmbedder::default()).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.nodes()[0].id, 1);
        assert_eq!(index.nodes()[1].id, 2);
        assert_eq!(index.nodes()[1].doc_path, "b.md");
        assert_eq!(index.dimension(), MockEmbedder::DIMENSION);
        assert_eq!(index.embed_model(), "mock-embed");
    }

    #[test]
    fn retrieves_the_closest_chunk() {
        let mut cfg = test_config(Path::new("."));
        cfg.chunk_size = 0;
        let embedder = MockEmbedder::default();
        let docs = vec![
            doc("sync.md", "Offline sync uses a local database"),
            doc("x.md", "Feature X requires configuration Y"),
        ];
        let index = VectorIndex::from_documents(&docs, &cfg, &embedder).unwrap();

        let query = embedder.embed_query("what does feature x require").unwrap();
        let hits = index.retrieve(&query, 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "x.md");
    }

    #[test]
    fn mismatched_embedding_count_is_an_error() {
        struct Short;
        impl Embedder for Short {
            fn model_name(&self) -> &str {
                "short"
            }
            fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(vec![])
            }
        }
        let cfg = test_config(Path::new("."));
        let err = VectorIndex::from_documents(&[doc("a.md", "text")], &cfg, &Short).unwrap_err();
        assert!(matches!(err, RagError::Decode(_)));
    }
}
