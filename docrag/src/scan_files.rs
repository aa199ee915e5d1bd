use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{RagError, Result};

/// One text file read from the documents directory.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub path: String,
    pub text: String,
}

pub fn scan_files(cfg: &Config) -> Result<Vec<Document>> {
    let base = cfg.docs_dir.as_path();
    if !base.is_dir() {
        return Err(RagError::MissingDocsDir(base.to_path_buf()));
    }

    let mut walker = WalkDir::new(base).follow_links(true);
    if !cfg.recursive {
        walker = walker.max_depth(1);
    }
    let walker = walker.into_iter().filter_entry(|e| {
        if e.depth() == 0 || !e.file_type().is_dir() {
            return true;
        }
        let name = e.file_name().to_string_lossy();
        !cfg.exclude_dirs.iter().any(|d| d == &name)
    });

    let mut results = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.to_path_buf());
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            RagError::io(path, io)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !has_included_ext(path, &cfg.include_exts) {
            continue;
        }
        let meta = entry.metadata().map_err(|e| {
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("metadata unavailable"));
            RagError::io(path, io)
        })?;
        if meta.len() > cfg.max_file_bytes {
            tracing::debug!(path = %path.display(), size = meta.len(), "skipping oversized file");
            continue;
        }
        let bytes = fs::read(path).map_err(|e| RagError::io(path, e))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        if text.trim().is_empty() {
            continue;
        }
        results.push(Document {
            path: path.to_string_lossy().to_string(),
            text,
        });
    }

    results.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::info!(dir = %base.display(), files = results.len(), "loaded documents");
    Ok(results)
}

fn has_included_ext(path: &Path, exts: &[String]) -> bool {
    let lower = path.to_string_lossy().to_lowercase();
    exts.iter().any(|ext| lower.ends_with(&ext.to_lowercase()))
}
