use crate::config::EngineConfig;
use crate::index::{now_millis, DocId, Document};
use crate::persist::ProfileRepository;
use crate::search::SearchResult;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// Result ids kept per history entry.
const HISTORY_RESULT_IDS: usize = 10;
const BASE_WEIGHT: f64 = 1.0;

pub type ProfileMap = BTreeMap<String, UserProfile>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub query: String,
    pub result_ids: Vec<DocId>,
    /// Unix milliseconds.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    /// Newest first.
    #[serde(default)]
    pub search_history: VecDeque<HistoryEntry>,
    #[serde(default)]
    pub category_preferences: BTreeMap<String, f64>,
    #[serde(default)]
    pub tag_preferences: BTreeMap<String, f64>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            search_history: VecDeque::new(),
            category_preferences: BTreeMap::new(),
            tag_preferences: BTreeMap::new(),
        }
    }

    pub fn category_weight(&self, category: &str) -> f64 {
        self.category_preferences.get(category).copied().unwrap_or(BASE_WEIGHT)
    }

    pub fn tag_weight(&self, tag: &str) -> f64 {
        self.tag_preferences.get(tag).copied().unwrap_or(BASE_WEIGHT)
    }

    /// Every document id that appeared in any history entry.
    pub fn viewed_ids(&self) -> BTreeSet<DocId> {
        self.search_history.iter().flat_map(|e| e.result_ids.iter().copied()).collect()
    }

    fn decay(&mut self, factor: f64) {
        if factor >= 1.0 {
            return;
        }
        let factor = factor.max(0.0);
        for w in self.category_preferences.values_mut().chain(self.tag_preferences.values_mut()) {
            *w = BASE_WEIGHT + (*w - BASE_WEIGHT) * factor;
        }
    }

    fn learn(&mut self, doc: &Document, rate: f64) {
        *self.category_preferences.entry(doc.category.clone()).or_insert(BASE_WEIGHT) += rate;
        for tag in &doc.tags {
            *self.tag_preferences.entry(tag.clone()).or_insert(BASE_WEIGHT) += rate;
        }
    }
}

/// Owns every user profile and writes them back after each recorded search.
pub struct ProfileStore {
    profiles: ProfileMap,
    repo: Arc<dyn ProfileRepository>,
    max_history: usize,
    learning_rate: f64,
    decay: f64,
}

impl ProfileStore {
    /// Load profiles from `repo`. A failed load starts from an empty map.
    pub fn open(repo: Arc<dyn ProfileRepository>, config: &EngineConfig) -> Self {
        let profiles = repo.load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "could not load user profiles, starting empty");
            ProfileMap::new()
        });
        tracing::info!(users = profiles.len(), "profiles loaded");
        Self {
            profiles,
            repo,
            max_history: config.max_history,
            learning_rate: config.learning_rate,
            decay: config.preference_decay,
        }
    }

    pub fn get(&self, user_id: &str) -> Option<&UserProfile> {
        self.profiles.get(user_id)
    }

    pub fn profiles(&self) -> &ProfileMap {
        &self.profiles
    }

    pub fn user_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn total_searches(&self) -> usize {
        self.profiles.values().map(|p| p.search_history.len()).sum()
    }

    /// Append a history entry, learn from the result documents, persist.
    /// Repeated identical searches are all recorded.
    pub fn record_search(&mut self, user_id: &str, query: &str, results: &[SearchResult]) -> Result<()> {
        let profile = self
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id));

        profile.search_history.push_front(HistoryEntry {
            query: query.to_string(),
            result_ids: results.iter().take(HISTORY_RESULT_IDS).map(|r| r.document.id).collect(),
            timestamp: now_millis(),
        });
        profile.search_history.truncate(self.max_history);

        profile.decay(self.decay);
        for r in results {
            profile.learn(&r.document, self.learning_rate);
        }

        self.repo.save(&self.profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryRepository;

    fn doc(id: DocId, category: &str, tags: &[&str]) -> Arc<Document> {
        Arc::new(Document {
            id,
            path: format!("{id}.md"),
            title: format!("Doc {id}"),
            category: category.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            summary: String::new(),
            tokens: vec![],
            term_freq: BTreeMap::new(),
            content_hash: String::new(),
        })
    }

    fn result(d: Arc<Document>) -> SearchResult {
        SearchResult { document: d, score: 1.0, matched_terms: vec![], highlights: vec![] }
    }

    fn store(cfg: &EngineConfig) -> ProfileStore {
        ProfileStore::open(Arc::new(MemoryRepository::new()), cfg)
    }

    #[test]
    fn history_is_capped_and_newest_first() {
        let cfg = EngineConfig::default();
        let mut s = store(&cfg);
        for i in 0..101 {
            s.record_search("ann", &format!("q{i}"), &[]).unwrap();
        }
        let h = &s.get("ann").unwrap().search_history;
        assert_eq!(h.len(), 100);
        assert_eq!(h.front().unwrap().query, "q100");
        assert_eq!(h.back().unwrap().query, "q1");
        assert!(h.iter().all(|e| e.query != "q0"));
    }

    #[test]
    fn identical_searches_each_append() {
        let cfg = EngineConfig::default();
        let mut s = store(&cfg);
        let results = vec![result(doc(3, "api", &["rest"]))];
        s.record_search("ann", "rest api", &results).unwrap();
        s.record_search("ann", "rest api", &results).unwrap();
        let p = s.get("ann").unwrap();
        assert_eq!(p.search_history.len(), 2);
        assert!(p.search_history.iter().all(|e| e.query == "rest api" && e.result_ids == vec![3]));
        assert!((p.tag_weight("rest") - 1.2).abs() < 1e-9);
    }

    #[test]
    fn keeps_first_ten_result_ids() {
        let cfg = EngineConfig::default();
        let mut s = store(&cfg);
        let results: Vec<_> = (0..15).map(|i| result(doc(i, "general", &[]))).collect();
        s.record_search("ann", "many", &results).unwrap();
        let entry = &s.get("ann").unwrap().search_history[0];
        assert_eq!(entry.result_ids, (0..10u32).collect::<Vec<_>>());
    }

    #[test]
    fn preferences_grow_additively() {
        let cfg = EngineConfig::default();
        let mut s = store(&cfg);
        let results = vec![result(doc(0, "api", &["rest", "http"])), result(doc(1, "api", &["rest"]))];
        s.record_search("ann", "api", &results).unwrap();
        let p = s.get("ann").unwrap();
        assert!((p.category_weight("api") - 1.2).abs() < 1e-9);
        assert!((p.tag_weight("rest") - 1.2).abs() < 1e-9);
        assert!((p.tag_weight("http") - 1.1).abs() < 1e-9);
        assert_eq!(p.tag_weight("unseen"), 1.0);
    }

    #[test]
    fn decay_pulls_toward_baseline() {
        let cfg = EngineConfig { preference_decay: 0.5, ..EngineConfig::default() };
        let mut s = store(&cfg);
        let results = vec![result(doc(0, "api", &[]))];
        s.record_search("ann", "a", &results).unwrap();
        s.record_search("ann", "b", &[]).unwrap();
        let w = s.get("ann").unwrap().category_weight("api");
        assert!((w - 1.05).abs() < 1e-9);
    }

    #[test]
    fn persists_after_every_search() {
        let cfg = EngineConfig::default();
        let repo = Arc::new(MemoryRepository::new());
        let mut s = ProfileStore::open(repo.clone(), &cfg);
        s.record_search("ann", "first", &[]).unwrap();
        assert_eq!(ProfileRepository::load(repo.as_ref()).unwrap()["ann"].search_history.len(), 1);
        s.record_search("bob", "second", &[]).unwrap();
        assert_eq!(ProfileRepository::load(repo.as_ref()).unwrap().len(), 2);
        assert_eq!(s.total_searches(), 2);
    }
}
