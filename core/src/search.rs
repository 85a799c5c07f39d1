use crate::config::EngineConfig;
use crate::index::{DocId, Document, IndexSnapshot};
use crate::tokenizer::tokenize;
use regex::RegexBuilder;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub document: Arc<Document>,
    pub score: f64,
    pub matched_terms: Vec<String>,
    pub highlights: Vec<String>,
}

/// TF-IDF scoring over an [`IndexSnapshot`] with a boost for title matches.
pub struct Ranker<'a> {
    config: &'a EngineConfig,
}

impl<'a> Ranker<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Every document scoring at least `min_score`, best first.
    /// Equal scores keep ascending document id order.
    pub fn rank(&self, snapshot: &IndexSnapshot, query: &str) -> Vec<SearchResult> {
        let q_tokens = tokenize(query);
        // Edge case: nothing left after tokenizing
        if q_tokens.is_empty() {
            return Vec::new();
        }

        let total_docs = snapshot.documents.len();
        let mut title_tokens: HashMap<DocId, Vec<String>> = HashMap::new();
        let mut scores: BTreeMap<DocId, (f64, Vec<String>)> = BTreeMap::new();
        for term in &q_tokens {
            let Some(postings) = snapshot.postings(term) else { continue };
            let idf = self.config.idf.idf(total_docs, postings.len());
            for p in postings {
                let Some(doc) = snapshot.document(p.doc_id) else { continue };
                let in_title = title_tokens
                    .entry(p.doc_id)
                    .or_insert_with(|| tokenize(&doc.title))
                    .contains(term);
                let position_weight = if in_title { self.config.title_boost } else { 1.0 };
                let entry = scores.entry(p.doc_id).or_insert_with(|| (0.0, Vec::new()));
                entry.0 += f64::from(p.frequency) * idf * position_weight;
                entry.1.push(term.clone());
            }
        }

        let mut results: Vec<SearchResult> = scores
            .into_iter()
            .filter(|(_, (score, _))| *score >= self.config.min_score)
            .filter_map(|(doc_id, (score, matched_terms))| {
                let document = snapshot.document(doc_id)?.clone();
                Some(SearchResult { document, score, matched_terms, highlights: Vec::new() })
            })
            .collect();
        sort_by_score(&mut results);
        tracing::debug!(query, hits = results.len(), "ranked");
        results
    }
}

/// Stable descending sort on score.
pub(crate) fn sort_by_score(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

fn back_chars(text: &str, idx: usize, n: usize) -> usize {
    text[..idx].char_indices().rev().take(n).last().map(|(i, _)| i).unwrap_or(idx)
}

fn forward_chars(text: &str, idx: usize, n: usize) -> usize {
    text[idx..].char_indices().nth(n).map(|(i, _)| idx + i).unwrap_or(text.len())
}

/// Windowed snippets around the first occurrence of each term in `text`,
/// with the term wrapped in `**`. At most `max` snippets.
pub fn highlight_text(text: &str, terms: &[String], window: usize, max: usize) -> Vec<String> {
    let mut out = Vec::new();
    for term in terms {
        if out.len() >= max {
            break;
        }
        if term.trim().is_empty() {
            continue;
        }
        let Ok(pat) = RegexBuilder::new(&regex::escape(term)).case_insensitive(true).build() else { continue };
        let Some(m) = pat.find(text) else { continue };
        let start = back_chars(text, m.start(), window);
        let end = forward_chars(text, m.end(), window);
        let snippet = text[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
        let marked = pat.replace_all(&snippet, |caps: &regex::Captures| format!("**{}**", &caps[0]));
        let prefix = if start > 0 { "..." } else { "" };
        let suffix = if end < text.len() { "..." } else { "" };
        out.push(format!("{prefix}{marked}{suffix}"));
    }
    out
}

/// Re-read the source file and highlight it. Read failures give no highlights.
pub fn highlights_for(path: &Path, terms: &[String], window: usize, max: usize) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => highlight_text(&text, terms, window, max),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "no highlights");
            Vec::new()
        }
    }
}
