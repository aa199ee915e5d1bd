use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RagError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_GREETING: &str = "Ask me a question about SuccessFactors MDC document!";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert on the SAP SuccessFactors Mobile MDC \
(Metadata driven control) and your job is to answer technical questions. Assume that all \
questions are related to the MDC. Keep your answers technical and based on facts - do not \
hallucinate features.";

/// Model settings handed to the chat model and chat engine.
#[derive(Clone, Debug, PartialEq)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub docs_dir: PathBuf,
    /// When set the index is persisted here and reloaded on later starts.
    pub persist_dir: Option<PathBuf>,
    pub recursive: bool,
    pub include_exts: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub max_file_bytes: u64,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub embed_batch: usize,
    pub api_key: String,
    pub base_url: String,
    pub embed_model: String,
    pub llm: LlmSettings,
    pub greeting: String,
    pub log_dir: PathBuf,
}

/// Values normally kept out of the environment, read from a TOML file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Secrets {
    pub openai_key: Option<String>,
    pub base_url: Option<String>,
}

impl Secrets {
    /// Reads the secrets file. A missing file yields empty secrets.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(RagError::io(path, err)),
        };
        toml::from_str(&raw)
            .map_err(|e| RagError::Config(format!("invalid secrets file {}: {}", path.display(), e)))
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env if present so keys and paths work without manual `source .env`.
        let _ = dotenvy::dotenv();
        let secrets_path = env::var("DOCRAG_SECRETS_FILE").unwrap_or_else(|_| "secrets.toml".to_string());
        let secrets = Secrets::load(Path::new(&secrets_path))?;
        Self::from_lookup(|key| env::var(key).ok(), secrets)
    }

    pub fn from_lookup<F>(var: F, secrets: Secrets) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = var("OPENAI_API_KEY")
            .or(secrets.openai_key)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                RagError::Config("openai_key is not set (secrets file or OPENAI_API_KEY)".to_string())
            })?;
        let base_url = var("OPENAI_BASE_URL")
            .or(secrets.base_url)
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let defaults = LlmSettings::default();
        let parse_usize = |key: &str, default: usize| {
            var(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        };

        Ok(Self {
            docs_dir: PathBuf::from(var("DOCRAG_DOCS_DIR").unwrap_or_else(|| "../mdc-docs/docs/".to_string())),
            persist_dir: var("DOCRAG_PERSIST_DIR")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            recursive: var("DOCRAG_RECURSIVE")
                .map(|v| parse_bool(&v))
                .unwrap_or(true),
            include_exts: split_list(
                &var("DOCRAG_INCLUDE_EXTS")
                    .unwrap_or_else(|| ".md,.mdx,.txt,.rst,.html,.json,.yaml,.yml".to_string()),
            ),
            exclude_dirs: split_list(
                &var("DOCRAG_EXCLUDE_DIRS")
                    .unwrap_or_else(|| ".git,node_modules,target,.vscode,.idea".to_string()),
            ),
            max_file_bytes: var("DOCRAG_MAX_FILE_BYTES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(1_000_000),
            chunk_size: parse_usize("DOCRAG_CHUNK_SIZE", 1024),
            chunk_overlap: parse_usize("DOCRAG_CHUNK_OVERLAP", 200),
            top_k: parse_usize("DOCRAG_TOP_K", 2).max(1),
            embed_batch: parse_usize("DOCRAG_EMBED_BATCH", 10).max(1),
            api_key,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            embed_model: var("DOCRAG_EMBED_MODEL").unwrap_or_else(|| "text-embedding-ada-002".to_string()),
            llm: LlmSettings {
                model: var("DOCRAG_CHAT_MODEL").unwrap_or(defaults.model),
                temperature: var("DOCRAG_TEMPERATURE")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(defaults.temperature),
                system_prompt: var("DOCRAG_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            },
            greeting: var("DOCRAG_GREETING").unwrap_or_else(|| DEFAULT_GREETING.to_string()),
            log_dir: PathBuf::from(var("DOCRAG_LOG_DIR").unwrap_or_else(|| "logs".to_string())),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> bool {
    !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}
