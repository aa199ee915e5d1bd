use std::sync::{Arc, Mutex, PoisonError};

use crate::config::Config;
use crate::embed_chunks::Embedder;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::scan_files::scan_files;
use crate::store_index::INDEX_STORE_FILE;

/// How the cached index came to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexSource {
    Built,
    Loaded,
}

/// Builds or loads the vector index once and hands out the same `Arc` afterwards.
///
/// Without `persist_dir` the index is rebuilt from the documents on every
/// process start. With it, a directory holding `index_store.json` is loaded
/// as-is; a missing, empty or half-written one is filled from a fresh build.
pub struct IndexProvider {
    cfg: Config,
    cached: Mutex<Option<(Arc<VectorIndex>, IndexSource)>>,
}

impl IndexProvider {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            cached: Mutex::new(None),
        }
    }

    pub fn get(&self, embedder: &dyn Embedder) -> Result<Arc<VectorIndex>> {
        self.get_with_source(embedder).map(|(index, _)| index)
    }

    /// Failures are not cached; the next call tries again.
    pub fn get_with_source(&self, embedder: &dyn Embedder) -> Result<(Arc<VectorIndex>, IndexSource)> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((index, source)) = cached.as_ref() {
            return Ok((Arc::clone(index), *source));
        }
        let (index, source) = self.load_or_build(embedder)?;
        let index = Arc::new(index);
        *cached = Some((Arc::clone(&index), source));
        Ok((index, source))
    }

    pub fn source(&self) -> Option<IndexSource> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, source)| *source)
    }

    fn load_or_build(&self, embedder: &dyn Embedder) -> Result<(VectorIndex, IndexSource)> {
        let Some(dir) = self.cfg.persist_dir.as_deref() else {
            tracing::info!(docs = %self.cfg.docs_dir.display(), "Creating index");
            return Ok((build_from_docs(&self.cfg, embedder)?, IndexSource::Built));
        };

        if dir.join(INDEX_STORE_FILE).is_file() {
            tracing::info!(dir = %dir.display(), "Loading index from storage");
            let index = VectorIndex::load(dir)?;
            if index.embed_model() != embedder.model_name() {
                tracing::warn!(
                    stored = index.embed_model(),
                    current = embedder.model_name(),
                    "persisted index was embedded with a different model"
                );
            }
            return Ok((index, IndexSource::Loaded));
        }

        tracing::info!(docs = %self.cfg.docs_dir.display(), dir = %dir.display(), "Creating index");
        let index = build_from_docs(&self.cfg, embedder)?;
        index.persist(dir)?;
        Ok((index, IndexSource::Built))
    }
}

/// Reads every document under `cfg.docs_dir` and embeds it.
pub fn build_from_docs(cfg: &Config, embedder: &dyn Embedder) -> Result<VectorIndex> {
    let docs = scan_files(cfg)?;
    if docs.is_empty() {
        return Err(RagError::EmptyCorpus(cfg.docs_dir.clone()));
    }
    VectorIndex::from_documents(&docs, cfg, embedder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEmbedder;
    use crate::test_support::test_config;
    use std::fs;

    #[test]
    fn in_memory_variant_builds_once_per_provider() {
        let docs = tempfile::tempdir().unwrap();
        fs::write(docs.path().join("x.md"), "Feature X requires configuration Y").unwrap();
        let provider = IndexProvider::new(test_config(docs.path()));
        let embedder = MockEmbedder::default();

        let first = provider.get(&embedder).unwrap();
        let second = provider.get(&embedder).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(embedder.calls(), 1);
        assert_eq!(provider.source(), Some(IndexSource::Built));
    }

    #[test]
    fn empty_corpus_is_an_error_and_not_cached() {
        let docs = tempfile::tempdir().unwrap();
        let provider = IndexProvider::new(test_config(docs.path()));
        let embedder = MockEmbedder::default();

        assert!(matches!(provider.get(&embedder), Err(RagError::EmptyCorpus(_))));
        assert!(provider.source().is_none());

        fs::write(docs.path().join("late.md"), "Added after the first attempt").unwrap();
        assert!(provider.get(&embedder).is_ok());
    }

    #[test]
    fn missing_docs_dir_propagates() {
        let root = tempfile::tempdir().unwrap();
        let provider = IndexProvider::new(test_config(&root.path().join("absent")));
        let err = provider.get(&MockEmbedder::default()).unwrap_err();
        assert!(matches!(err, RagError::MissingDocsDir(_)));
    }
}
