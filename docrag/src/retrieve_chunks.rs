use std::cmp::Ordering;

use crate::index::Node;

/// A retrieved chunk with its similarity to the query.
#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub path: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// Top `limit` nodes by cosine similarity, best first. Equal scores keep index order.
pub fn retrieve_top(nodes: &[Node], vector: &[f32], limit: usize) -> Vec<Hit> {
    if vector.is_empty() || limit == 0 {
        return vec![];
    }
    let mut scored: Vec<(usize, f32)> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (i, cosine_similarity(vector, &node.embedding)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(i, score)| {
            let node = &nodes[i];
            Hit {
                path: node.doc_path.clone(),
                chunk_index: node.chunk_index,
                text: node.text.clone(),
                score,
            }
        })
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}
