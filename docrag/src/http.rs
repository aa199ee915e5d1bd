use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::from_str;
use std::time::Duration;

use crate::config::Config;
use crate::error::{RagError, Result};

/// Endpoint and credentials for an OpenAI-compatible API.
///
/// A blocking client is built per request; callers must not be on an async
/// runtime thread.
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            base_url: cfg.base_url.clone(),
            api_key: cfg.api_key.clone(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn post_json<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        let resp = self.send(&url, body, "application/json")?;
        let text = resp.text().map_err(|e| RagError::Http(format!("POST {} read failed: {}", url, e)))?;
        from_str::<T>(&text).map_err(|e| RagError::Decode(format!("POST {}: {} | {}", url, e, text)))
    }

    /// Sends the request and hands back the open response for line-by-line reads.
    pub fn post_stream<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        let url = self.url(path);
        self.send(&url, body, "text/event-stream")
    }

    fn send<B: Serialize>(&self, url: &str, body: &B, accept: &str) -> Result<Response> {
        tracing::debug!(%url, "POST");
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| RagError::Http(e.to_string()))?;
        let resp = client
            .post(url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, accept)
            .json(body)
            .send()
            .map_err(|e| RagError::Http(format!("POST {} failed: {}", url, e)))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(RagError::Http(format!("POST {} failed: {} {}", url, status, text)));
        }
        Ok(resp)
    }
}
