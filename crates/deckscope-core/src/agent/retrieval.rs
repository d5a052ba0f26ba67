//! In-process retriever over plain-text decks.
//!
//! Each document is split into paragraphs (blank-line separated). A query is
//! scored against every paragraph as the fraction of its distinct terms the
//! paragraph contains; the best `top_k` non-zero matches are returned.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use super::collaborators::{RetrievalResponse, RetrievedChunk, Retriever};

#[derive(Debug)]
pub struct TextRetriever {
    documents: RwLock<HashMap<String, Vec<String>>>,
    top_k: usize,
}

impl Default for TextRetriever {
    fn default() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            top_k: 5,
        }
    }
}

impl TextRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_document(self, document_id: impl Into<String>, text: &str) -> Self {
        self.add_document(document_id, text);
        self
    }

    pub fn add_document(&self, document_id: impl Into<String>, text: &str) {
        let paragraphs = split_paragraphs(text);
        if let Ok(mut docs) = self.documents.write() {
            docs.insert(document_id.into(), paragraphs);
        }
    }
}

fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Retriever for TextRetriever {
    async fn retrieve(&self, query: &str, document_id: &str) -> RetrievalResponse {
        let docs = match self.documents.read() {
            Ok(docs) => docs,
            Err(_) => return RetrievalResponse::failed("document index lock poisoned"),
        };
        let Some(paragraphs) = docs.get(document_id) else {
            return RetrievalResponse::failed(format!("unknown document {document_id}"));
        };

        let query_terms = terms(query);
        if query_terms.is_empty() {
            return RetrievalResponse::ok(Vec::new());
        }

        let mut scored: Vec<RetrievedChunk> = paragraphs
            .iter()
            .filter_map(|p| {
                let para_terms = terms(p);
                let hits = query_terms.intersection(&para_terms).count();
                (hits > 0).then(|| RetrievedChunk {
                    content: p.clone(),
                    score: hits as f64 / query_terms.len() as f64,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.top_k);
        RetrievalResponse::ok(scored)
    }
}
