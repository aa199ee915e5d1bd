//! Offline stand-ins for the embedding and chat endpoints.
//!
//! [`MockEmbedder`] hashes words into buckets so texts sharing vocabulary land
//! close together; [`MockChat`] answers by quoting the retrieved context.
//! Both count their calls so tests can assert what was (not) re-done.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::build_prompt::{Message, Role};
use crate::embed_chunks::Embedder;
use crate::error::{RagError, Result};
use crate::generate::ChatModel;

#[derive(Debug, Default)]
pub struct MockEmbedder {
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub const DIMENSION: usize = 256;

    /// Number of `embed` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; Self::DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) as usize % Self::DIMENSION;
            v[bucket] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        } else {
            v[0] = 1.0;
        }
        v
    }
}

impl Embedder for MockEmbedder {
    fn model_name(&self) -> &str {
        "mock-embed"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[derive(Debug, Default)]
pub struct MockChat {
    condensed: Option<String>,
    fail_stream: bool,
    complete_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    last_prompt: Mutex<Vec<Message>>,
}

impl MockChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed reply for every non-streaming completion.
    pub fn with_condensed(mut self, question: impl Into<String>) -> Self {
        self.condensed = Some(question.into());
        self
    }

    /// Makes every streaming call fail.
    pub fn failing(mut self) -> Self {
        self.fail_stream = true;
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    /// Messages sent with the most recent streaming call.
    pub fn last_prompt(&self) -> Vec<Message> {
        self.last_prompt
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ChatModel for MockChat {
    fn complete(&self, messages: &[Message]) -> Result<String> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(q) = &self.condensed {
            return Ok(q.clone());
        }
        let body = last_user(messages);
        let follow_up = body
            .split("<Follow Up Message>\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\n").next())
            .unwrap_or(body);
        Ok(follow_up.trim().to_string())
    }

    fn stream(&self, messages: &[Message], on_token: &mut dyn FnMut(&str)) -> Result<String> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap_or_else(|e| e.into_inner()) = messages.to_vec();
        if self.fail_stream {
            return Err(RagError::Http("mock stream failure".to_string()));
        }
        let context = last_user(messages)
            .split("---------------------\n")
            .nth(1)
            .unwrap_or("")
            .trim();
        let answer = format!("Based on the docs: {}", context.replace('\n', " "));
        for token in answer.split_inclusive(' ') {
            on_token(token);
        }
        Ok(answer)
    }
}

fn last_user(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}
