use crate::config::EngineConfig;
use crate::metadata::extract_metadata;
use crate::tokenizer::{token_stream, tokenize};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;

pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Position in the snapshot's document list.
    pub id: DocId,
    pub path: String,
    pub title: String,
    pub category: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: String,
    /// Deduplicated token set.
    pub tokens: Vec<String>,
    pub term_freq: BTreeMap<String, u32>,
    pub content_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Posting {
    pub doc_id: DocId,
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub total_docs: usize,
    pub total_terms: usize,
    /// Unix milliseconds.
    pub last_updated: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    pub documents: Vec<Arc<Document>>,
    /// term -> document frequency
    pub terms: BTreeMap<String, u32>,
    pub inverted_index: BTreeMap<String, Vec<Posting>>,
    pub metadata: IndexMetadata,
    pub timestamp: String,
}

impl IndexSnapshot {
    pub fn document(&self, id: DocId) -> Option<&Arc<Document>> {
        self.documents.get(id as usize).filter(|d| d.id == id)
    }

    pub fn postings(&self, term: &str) -> Option<&[Posting]> {
        self.inverted_index.get(term).map(Vec::as_slice)
    }

    pub fn is_stale(&self, now_ms: u64, interval: Duration) -> bool {
        now_ms.saturating_sub(self.metadata.last_updated) > interval.as_millis() as u64
    }
}

pub(crate) fn now_millis() -> u64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as u64
}

pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// SHA-1 hex digest of file content, used for change detection.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Builds a complete [`IndexSnapshot`] from a list of files.
pub struct IndexBuilder<'a> {
    config: &'a EngineConfig,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    fn term_freq(&self, text: &str, tokens: &[String]) -> BTreeMap<String, u32> {
        let mut tf = BTreeMap::new();
        if self.config.count_before_dedup {
            for t in token_stream(text) {
                *tf.entry(t).or_insert(0) += 1;
            }
        } else {
            for t in tokens {
                *tf.entry(t.clone()).or_insert(0) += 1;
            }
        }
        tf
    }

    fn document(&self, id: DocId, path: &Path, text: &str) -> Document {
        let tokens = tokenize(text);
        let term_freq = self.term_freq(text, &tokens);
        let meta = extract_metadata(text, path);
        Document {
            id,
            path: path.to_string_lossy().into_owned(),
            title: meta.title,
            category: meta.category,
            tags: meta.tags,
            summary: meta.summary,
            tokens,
            term_freq,
            content_hash: content_hash(text),
        }
    }

    /// Read, tokenize and index every file. Unreadable files are logged and skipped;
    /// surviving documents get dense ids in input order.
    pub fn build(&self, paths: &[PathBuf]) -> IndexSnapshot {
        let mut documents: Vec<Arc<Document>> = Vec::with_capacity(paths.len());
        for path in paths {
            let text = match std::fs::read_to_string(path) {
                Ok(t) => t,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
                    continue;
                }
            };
            let id = documents.len() as DocId;
            documents.push(Arc::new(self.document(id, path, &text)));
        }

        let mut inverted_index: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
        for doc in &documents {
            for token in &doc.tokens {
                let frequency = doc.term_freq.get(token).copied().unwrap_or(1);
                inverted_index.entry(token.clone()).or_default().push(Posting { doc_id: doc.id, frequency });
            }
        }
        let terms = inverted_index.iter().map(|(t, p)| (t.clone(), p.len() as u32)).collect();

        let metadata = IndexMetadata {
            total_docs: documents.len(),
            total_terms: inverted_index.len(),
            last_updated: now_millis(),
        };
        tracing::info!(num_docs = metadata.total_docs, num_terms = metadata.total_terms, "index built");
        IndexSnapshot { documents, terms, inverted_index, metadata, timestamp: now_rfc3339() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_corpus(dir: &Path, docs: &[(&str, &str)]) -> Vec<PathBuf> {
        docs.iter()
            .map(|(name, body)| {
                let p = dir.join(name);
                fs::write(&p, body).unwrap();
                p
            })
            .collect()
    }

    #[test]
    fn unreadable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_corpus(dir.path(), &[("a.md", "# Alpha\nrust tokio"), ("b.md", "serde json")]);
        paths.insert(1, dir.path().join("missing.md"));
        let cfg = EngineConfig::default();
        let snap = IndexBuilder::new(&cfg).build(&paths);
        assert_eq!(snap.metadata.total_docs, 2);
        assert_eq!(snap.documents[1].path, paths[2].to_string_lossy());
        assert_eq!(snap.documents[1].id, 1);
        assert_eq!(snap.metadata.total_terms, snap.inverted_index.len());
        assert_eq!(snap.terms["rust"], 1);
    }

    #[test]
    fn frequency_follows_dedup_flag() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_corpus(dir.path(), &[("a.md", "cache cache cache miss")]);
        let mut cfg = EngineConfig::default();
        let snap = IndexBuilder::new(&cfg).build(&paths);
        assert_eq!(snap.postings("cache").unwrap()[0].frequency, 1);

        cfg.count_before_dedup = true;
        let snap = IndexBuilder::new(&cfg).build(&paths);
        assert_eq!(snap.postings("cache").unwrap()[0].frequency, 3);
        assert_eq!(snap.postings("miss").unwrap()[0].frequency, 1);
    }

    #[test]
    fn one_posting_per_term_and_document() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_corpus(dir.path(), &[("a.md", "x1 data data"), ("b.md", "data")]);
        let cfg = EngineConfig { count_before_dedup: true, ..EngineConfig::default() };
        let snap = IndexBuilder::new(&cfg).build(&paths);
        let postings = snap.postings("data").unwrap();
        assert_eq!(postings, &[Posting { doc_id: 0, frequency: 2 }, Posting { doc_id: 1, frequency: 1 }]);
    }

    #[test]
    fn staleness_window() {
        let snap = IndexSnapshot {
            documents: vec![],
            terms: BTreeMap::new(),
            inverted_index: BTreeMap::new(),
            metadata: IndexMetadata { total_docs: 0, total_terms: 0, last_updated: 1_000 },
            timestamp: String::new(),
        };
        let hour = Duration::from_secs(3600);
        assert!(!snap.is_stale(1_000 + 3_600_000, hour));
        assert!(snap.is_stale(1_000 + 3_600_001, hour));
    }

    #[test]
    fn hash_tracks_content() {
        assert_eq!(content_hash("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }
}
