use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::http::ApiClient;

/// Turns text into vectors.
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    /// Returns one vector per input, in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vecs = self.embed(&[text.to_string()])?;
        vecs.into_iter()
            .next()
            .ok_or_else(|| RagError::Decode("no embedding returned for query".to_string()))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// `/embeddings` on an OpenAI-compatible endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiEmbedder {
    api: ApiClient,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            api: ApiClient::from_config(cfg),
            model: cfg.embed_model.clone(),
            batch_size: cfg.embed_batch.max(1),
        }
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let req = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let res = self.api.post_json::<EmbedResponse, _>("embeddings", &req)?;
        order_embeddings(res.data, texts.len())
    }
}

impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_batch(batch)?);
        }
        Ok(out)
    }
}

fn order_embeddings(data: Vec<EmbedDatum>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(RagError::Decode(format!(
            "expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (pos, datum) in data.into_iter().enumerate() {
        let idx = datum.index.unwrap_or(pos);
        let slot = slots
            .get_mut(idx)
            .ok_or_else(|| RagError::Decode(format!("embedding index {} out of range", idx)))?;
        *slot = Some(datum.embedding);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| RagError::Decode(format!("missing embedding {}", i))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Vec<EmbedDatum> {
        serde_json::from_str::<EmbedResponse>(raw).unwrap().data
    }

    #[test]
    fn reorders_by_index() {
        let data = parse(
            r#"{"object":"list","data":[
                {"object":"embedding","index":1,"embedding":[0.0,1.0]},
                {"object":"embedding","index":0,"embedding":[1.0,0.0]}
            ],"model":"text-embedding-ada-002"}"#,
        );
        let out = order_embeddings(data, 2).unwrap();
        assert_eq!(out, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn falls_back_to_position_without_index() {
        let data = parse(r#"{"data":[{"embedding":[0.5]},{"embedding":[0.25]}]}"#);
        let out = order_embeddings(data, 2).unwrap();
        assert_eq!(out, vec![vec![0.5], vec![0.25]]);
    }

    #[test]
    fn rejects_short_or_misindexed_responses() {
        let short = parse(r#"{"data":[{"embedding":[0.5],"index":0}]}"#);
        assert!(matches!(order_embeddings(short, 2), Err(RagError::Decode(_))));

        let dup = parse(r#"{"data":[{"embedding":[0.5],"index":0},{"embedding":[0.1],"index":0}]}"#);
        assert!(matches!(order_embeddings(dup, 2), Err(RagError::Decode(_))));
    }
}
