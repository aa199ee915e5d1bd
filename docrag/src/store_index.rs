use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::index::{Node, VectorIndex};

pub const DOCSTORE_FILE: &str = "docstore.json";
pub const VECTOR_STORE_FILE: &str = "vector_store.json";
pub const INDEX_STORE_FILE: &str = "index_store.json";

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct DocstoreEntry {
    doc_path: String,
    chunk_index: usize,
    text: String,
}

#[derive(Serialize, Deserialize)]
struct Docstore {
    nodes: BTreeMap<u64, DocstoreEntry>,
}

#[derive(Serialize, Deserialize)]
struct VectorStore {
    embedding_dict: BTreeMap<u64, Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct IndexStore {
    version: u32,
    embed_model: String,
    dimension: usize,
    node_ids: Vec<u64>,
}

impl VectorIndex {
    /// Writes the index into `dir`, creating it if needed.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| RagError::io(dir, e))?;

        let docstore = Docstore {
            nodes: self
                .nodes
                .iter()
                .map(|n| {
                    (
                        n.id,
                        DocstoreEntry {
                            doc_path: n.doc_path.clone(),
                            chunk_index: n.chunk_index,
                            text: n.text.clone(),
                        },
                    )
                })
                .collect(),
        };
        let vectors = VectorStore {
            embedding_dict: self.nodes.iter().map(|n| (n.id, n.embedding.clone())).collect(),
        };
        let meta = IndexStore {
            version: FORMAT_VERSION,
            embed_model: self.embed_model.clone(),
            dimension: self.dimension,
            node_ids: self.nodes.iter().map(|n| n.id).collect(),
        };

        write_json(&dir.join(DOCSTORE_FILE), &docstore)?;
        write_json(&dir.join(VECTOR_STORE_FILE), &vectors)?;
        // Written last: a directory without it is an incomplete persist.
        write_json(&dir.join(INDEX_STORE_FILE), &meta)?;
        tracing::info!(dir = %dir.display(), nodes = self.nodes.len(), "persisted index");
        Ok(())
    }

    /// Rebuilds an index from a directory written by [`VectorIndex::persist`].
    pub fn load(dir: &Path) -> Result<Self> {
        let meta: IndexStore = read_json(&dir.join(INDEX_STORE_FILE))?;
        if meta.version != FORMAT_VERSION {
            return Err(RagError::Persist(format!(
                "unsupported index format version {}",
                meta.version
            )));
        }
        let mut docstore: Docstore = read_json(&dir.join(DOCSTORE_FILE))?;
        let mut vectors: VectorStore = read_json(&dir.join(VECTOR_STORE_FILE))?;

        let mut nodes = Vec::with_capacity(meta.node_ids.len());
        for id in meta.node_ids {
            let entry = docstore
                .nodes
                .remove(&id)
                .ok_or_else(|| RagError::Persist(format!("node {} missing from docstore", id)))?;
            let embedding = vectors
                .embedding_dict
                .remove(&id)
                .ok_or_else(|| RagError::Persist(format!("node {} missing from vector store", id)))?;
            if embedding.len() != meta.dimension {
                return Err(RagError::Persist(format!(
                    "node {} has dimension {}, expected {}",
                    id,
                    embedding.len(),
                    meta.dimension
                )));
            }
            nodes.push(Node {
                id,
                doc_path: entry.doc_path,
                chunk_index: entry.chunk_index,
                text: entry.text,
                embedding,
            });
        }

        tracing::info!(dir = %dir.display(), nodes = nodes.len(), "loaded index from storage");
        Ok(Self {
            embed_model: meta.embed_model,
            dimension: meta.dimension,
            nodes,
        })
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let raw = serde_json::to_vec(value)
        .map_err(|e| RagError::Persist(format!("{}: {}", path.display(), e)))?;
    fs::write(path, raw).map_err(|e| RagError::io(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).map_err(|e| RagError::Persist(format!("{}: {}", path.display(), e)))?;
    serde_json::from_slice(&raw).map_err(|e| RagError::Persist(format!("{}: {}", path.display(), e)))
}
