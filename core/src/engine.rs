use crate::config::EngineConfig;
use crate::corpus::{CorpusProvider, GlobCorpus, PathMatcher};
use crate::index::{now_millis, IndexBuilder, IndexSnapshot};
use crate::persist::{JsonProfileRepository, JsonSnapshotRepository, ProfileRepository, SnapshotRepository};
use crate::personalize::personalize;
use crate::profile::{ProfileStore, UserProfile};
use crate::recommend::{Recommendation, Recommender};
use crate::search::{highlights_for, Ranker, SearchResult};
use crate::tokenizer::tokenize;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    pub user_id: Option<String>,
    /// Falls back to `maxResults` from the config.
    pub limit: Option<usize>,
    pub personalized: bool,
    pub include_recommendations: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { user_id: None, limit: None, personalized: true, include_recommendations: true }
    }
}

impl SearchOptions {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()), ..Self::default() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub recommendations: Vec<Recommendation>,
    /// Hits above the score threshold before truncation to the limit.
    pub total_found: usize,
}

impl SearchResponse {
    fn empty(query: &str) -> Self {
        Self { query: query.to_string(), results: Vec::new(), recommendations: Vec::new(), total_found: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub documents: usize,
    pub terms: usize,
    pub users: usize,
    pub total_searches: usize,
    pub avg_searches_per_user: f64,
    pub last_updated: u64,
}

/// Owns the index snapshot and the profile store and runs the full search pipeline:
/// rank, personalize, truncate, highlight, recommend, record.
///
/// Single caller at a time; services wrap it in a lock.
pub struct SearchEngine {
    config: EngineConfig,
    corpus: Box<dyn CorpusProvider>,
    snapshots: Arc<dyn SnapshotRepository>,
    profiles: ProfileStore,
    index: Option<IndexSnapshot>,
}

impl SearchEngine {
    pub fn new(
        config: EngineConfig,
        corpus: Box<dyn CorpusProvider>,
        snapshots: Arc<dyn SnapshotRepository>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        let profiles = ProfileStore::open(profiles, &config);
        Self { config, corpus, snapshots, profiles, index: None }
    }

    /// Glob-filtered directory corpus with JSON files at the configured paths.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let matcher = PathMatcher::new(&config.include, &config.exclude)?;
        let corpus = GlobCorpus::new(&config.docs_root, matcher);
        let snapshots = Arc::new(JsonSnapshotRepository::new(&config.index_path));
        let profiles = Arc::new(JsonProfileRepository::new(&config.profiles_path));
        Ok(Self::new(config, Box::new(corpus), snapshots, profiles))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn profile(&self, user_id: &str) -> Option<&UserProfile> {
        self.profiles.get(user_id)
    }

    /// The in-memory snapshot, if one has been loaded or built.
    pub fn index(&self) -> Option<&IndexSnapshot> {
        self.index.as_ref()
    }

    /// Load the stored snapshot on first use and rebuild when it is missing,
    /// unreadable or older than the update interval.
    pub fn ensure_index(&mut self) -> Result<&IndexSnapshot> {
        if self.index.is_none() {
            match self.snapshots.load() {
                Ok(Some(snapshot)) => {
                    tracing::info!(num_docs = snapshot.metadata.total_docs, "index loaded");
                    self.index = Some(snapshot);
                }
                Ok(None) => tracing::info!("no stored index"),
                Err(err) => tracing::warn!(error = %err, "could not load index, rebuilding"),
            }
        }
        let interval = self.config.update_interval();
        let needs_build = match &self.index {
            Some(snapshot) => snapshot.is_stale(now_millis(), interval),
            None => true,
        };
        if needs_build {
            let snapshot = self.build_snapshot()?;
            if let Err(err) = self.snapshots.save(&snapshot) {
                tracing::warn!(error = %err, "could not save index snapshot, keeping it in memory");
            }
            let snapshot: &IndexSnapshot = self.index.insert(snapshot);
            return Ok(snapshot);
        }
        self.index.as_ref().context("index unavailable")
    }

    /// Unconditional full rebuild from the corpus, persisted before it is used.
    pub fn rebuild(&mut self) -> Result<&IndexSnapshot> {
        let snapshot = self.build_snapshot()?;
        self.snapshots.save(&snapshot).context("saving index snapshot")?;
        let snapshot: &IndexSnapshot = self.index.insert(snapshot);
        Ok(snapshot)
    }

    fn build_snapshot(&self) -> Result<IndexSnapshot> {
        let files = self.corpus.files().context("enumerating corpus")?;
        tracing::info!(files = files.len(), "rebuilding index");
        Ok(IndexBuilder::new(&self.config).build(&files))
    }

    pub fn search(&mut self, query: &str, opts: &SearchOptions) -> Result<SearchResponse> {
        if tokenize(query).is_empty() {
            return Ok(SearchResponse::empty(query));
        }
        if let Err(err) = self.ensure_index() {
            tracing::warn!(error = %err, "index unavailable, returning no results");
            return Ok(SearchResponse::empty(query));
        }
        let snapshot = self.index.as_ref().context("index unavailable")?;
        let config = &self.config;
        let user_id = opts.user_id.as_deref();

        let ranked = Ranker::new(config).rank(snapshot, query);
        let total_found = ranked.len();
        let mut results = if opts.personalized {
            personalize(ranked, user_id.and_then(|u| self.profiles.get(u)))
        } else {
            ranked
        };
        results.truncate(opts.limit.unwrap_or(config.max_results));
        for r in &mut results {
            r.highlights =
                highlights_for(Path::new(&r.document.path), &r.matched_terms, config.highlight_window, config.max_highlights);
        }

        let recommendations = if opts.include_recommendations {
            Recommender::new(snapshot, self.profiles.profiles(), config.recommendation_limit)
                .recommend(query, &results, user_id)
        } else {
            Vec::new()
        };

        if let Some(user) = user_id {
            if let Err(err) = self.profiles.record_search(user, query, &results) {
                tracing::warn!(user, error = %err, "could not save user profiles");
            }
        }
        Ok(SearchResponse { query: query.to_string(), results, recommendations, total_found })
    }

    pub fn stats(&mut self) -> Result<EngineStats> {
        let meta = self.ensure_index()?.metadata.clone();
        let users = self.profiles.user_count();
        let total_searches = self.profiles.total_searches();
        let avg_searches_per_user = if users == 0 { 0.0 } else { total_searches as f64 / users as f64 };
        Ok(EngineStats {
            documents: meta.total_docs,
            terms: meta.total_terms,
            users,
            total_searches,
            avg_searches_per_user,
            last_updated: meta.last_updated,
        })
    }

    /// Completions for a partial query: past queries (most frequent first), then
    /// matching document titles, then vocabulary terms with the prefix.
    pub fn suggest(&mut self, partial: &str) -> Result<Vec<String>> {
        let prefix = partial.trim().to_lowercase();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_index()?;
        let snapshot = self.index.as_ref().context("index unavailable")?;

        let mut query_counts: HashMap<&str, usize> = HashMap::new();
        for profile in self.profiles.profiles().values() {
            for entry in &profile.search_history {
                let q = entry.query.trim();
                if q.to_lowercase().starts_with(&prefix) {
                    *query_counts.entry(q).or_insert(0) += 1;
                }
            }
        }
        let mut queries: Vec<(&str, usize)> = query_counts.into_iter().collect();
        queries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let titles = snapshot
            .documents
            .iter()
            .filter(|d| d.title.to_lowercase().contains(&prefix))
            .map(|d| d.title.as_str());
        let terms = snapshot
            .inverted_index
            .range(prefix.clone()..)
            .take_while(|(t, _)| t.starts_with(&prefix))
            .map(|(t, _)| t.as_str());

        let mut seen = HashSet::new();
        Ok(queries
            .into_iter()
            .map(|(q, _)| q)
            .chain(titles)
            .chain(terms)
            .filter(|s| seen.insert(s.to_lowercase()))
            .take(self.config.suggest_limit)
            .map(str::to_string)
            .collect())
    }
}
