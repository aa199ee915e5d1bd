use std::io::BufRead;
use std::io::BufReader;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::build_prompt::Message;
use crate::config::{Config, LlmSettings};
use crate::error::{RagError, Result};
use crate::http::ApiClient;

/// A chat-completion backend.
pub trait ChatModel: Send + Sync {
    fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Calls `on_token` for every text delta and returns the full answer.
    fn stream(&self, messages: &[Message], on_token: &mut dyn FnMut(&str)) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// `/chat/completions` on an OpenAI-compatible endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiChat {
    api: ApiClient,
    settings: LlmSettings,
}

impl OpenAiChat {
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(ApiClient::from_config(cfg), cfg.llm.clone())
    }

    pub fn new(api: ApiClient, settings: LlmSettings) -> Self {
        Self { api, settings }
    }

    fn request<'a>(&'a self, messages: &'a [Message], stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            stream,
        }
    }
}

impl ChatModel for OpenAiChat {
    fn complete(&self, messages: &[Message]) -> Result<String> {
        let req = self.request(messages, false);
        let res = self.api.post_json::<ChatResponse, _>("chat/completions", &req)?;
        Ok(res
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default())
    }

    fn stream(&self, messages: &[Message], on_token: &mut dyn FnMut(&str)) -> Result<String> {
        let req = self.request(messages, true);
        let resp = self.api.post_stream("chat/completions", &req)?;
        read_event_stream(BufReader::new(resp), on_token)
    }
}

#[derive(Debug, PartialEq)]
enum SseLine<'a> {
    Data(&'a str),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine<'_> {
    let line = line.trim_end_matches('\r');
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        SseLine::Skip
    } else if data == "[DONE]" {
        SseLine::Done
    } else {
        SseLine::Data(data)
    }
}

/// Reads server-sent events until `[DONE]` or end of body.
pub(crate) fn read_event_stream<R: BufRead>(reader: R, on_token: &mut dyn FnMut(&str)) -> Result<String> {
    let mut full = String::new();
    for line in reader.lines() {
        let line = line.map_err(|e| RagError::Http(format!("stream read failed: {}", e)))?;
        let data = match parse_sse_line(&line) {
            SseLine::Data(data) => data,
            SseLine::Done => break,
            SseLine::Skip => continue,
        };
        let chunk: StreamChunk = serde_json::from_str(data)
            .map_err(|e| RagError::Decode(format!("stream chunk: {} | {}", e, data)))?;
        if let Some(err) = chunk.error {
            return Err(RagError::Http(format!("stream error: {}", err)));
        }
        for choice in chunk.choices {
            if let Some(token) = choice.delta.and_then(|d| d.content) {
                if token.is_empty() {
                    continue;
                }
                on_token(&token);
                full.push_str(&token);
            }
        }
    }
    Ok(full)
}
