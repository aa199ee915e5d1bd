use std::path::PathBuf;

/// Errors raised while loading, indexing or chatting over the corpus.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("config error: {0}")]
    Config(String),
    #[error("documents directory not found: {}", .0.display())]
    MissingDocsDir(PathBuf),
    #[error("no documents found under {}", .0.display())]
    EmptyCorpus(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Http(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("index storage error: {0}")]
    Persist(String),
}

impl RagError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RagError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_paths() {
        let err = RagError::MissingDocsDir(PathBuf::from("../mdc-docs/docs"));
        assert_eq!(
            err.to_string(),
            "documents directory not found: ../mdc-docs/docs"
        );

        let err = RagError::io(
            "docs/a.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "failed to read docs/a.md: denied");
    }

    #[test]
    fn display_prefixes_kind() {
        assert_eq!(
            RagError::Config("missing openai_key".to_string()).to_string(),
            "config error: missing openai_key"
        );
        assert_eq!(
            RagError::Persist("bad json".to_string()).to_string(),
            "index storage error: bad json"
        );
    }
}
