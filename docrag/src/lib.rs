mod build_prompt;
mod chat_engine;
mod chunk_text;
mod config;
mod embed_chunks;
mod error;
mod generate;
mod http;
mod index;
pub mod mock;
mod provider;
mod retrieve_chunks;
mod scan_files;
mod session;
mod store_index;
mod transcript;

pub use build_prompt::{build_condense_prompt, build_prompt_with_context, Message, Role};
pub use chat_engine::{ChatResponse, CondenseQuestionEngine};
pub use chunk_text::chunk_text;
pub use config::{Config, LlmSettings, Secrets, DEFAULT_GREETING, DEFAULT_SYSTEM_PROMPT};
pub use embed_chunks::{Embedder, OpenAiEmbedder};
pub use error::{RagError, Result};
pub use generate::{ChatModel, OpenAiChat};
pub use http::ApiClient;
pub use index::{Node, VectorIndex};
pub use provider::{build_from_docs, IndexProvider, IndexSource};
pub use retrieve_chunks::Hit;
pub use scan_files::{scan_files, Document};
pub use session::{respond, Dispatch, Interaction, Session, SharedEngine, TurnState};
pub use store_index::{DOCSTORE_FILE, INDEX_STORE_FILE, VECTOR_STORE_FILE};
pub use transcript::Transcript;

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    use crate::config::{Config, LlmSettings};

    pub(crate) fn test_config(docs: &Path) -> Config {
        Config {
            docs_dir: docs.to_path_buf(),
            persist_dir: None,
            recursive: true,
            include_exts: vec![".md".to_string(), ".txt".to_string()],
            exclude_dirs: vec![".git".to_string()],
            max_file_bytes: 1_000,
            chunk_size: 64,
            chunk_overlap: 8,
            top_k: 2,
            embed_batch: 4,
            api_key: "sk-test".to_string(),
            base_url: "http://localhost".to_string(),
            embed_model: "mock-embed".to_string(),
            llm: LlmSettings::default(),
            greeting: "hi".to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }
}
