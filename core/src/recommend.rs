use crate::index::{DocId, Document, IndexSnapshot};
use crate::profile::ProfileMap;
use crate::search::SearchResult;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

const CATEGORY_SIMILARITY: f64 = 0.3;
const TAG_SIMILARITY: f64 = 0.4;
const MIN_CONTENT_SIMILARITY: f64 = 0.2;
const POPULAR_TOP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Content,
    Collaborative,
    Popular,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub document: Arc<Document>,
    pub score: f64,
    pub reason: String,
    pub strategy: Strategy,
}

fn sort_desc(recs: &mut [Recommendation]) {
    recs.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

/// Suggests documents outside the current result set from three independent signals:
/// category/tag similarity, overlap with other users' histories, and global popularity.
pub struct Recommender<'a> {
    snapshot: &'a IndexSnapshot,
    profiles: &'a ProfileMap,
    limit: usize,
}

impl<'a> Recommender<'a> {
    pub fn new(snapshot: &'a IndexSnapshot, profiles: &'a ProfileMap, limit: usize) -> Self {
        Self { snapshot, profiles, limit }
    }

    /// Merge all strategies in order content, collaborative, popular; the first
    /// occurrence of a document wins and the list is capped at `limit`.
    pub fn recommend(&self, query: &str, results: &[SearchResult], user_id: Option<&str>) -> Vec<Recommendation> {
        let shown: HashSet<DocId> = results.iter().map(|r| r.document.id).collect();
        let mut content = self.content_based(query, results, &shown);
        let mut collaborative = user_id.map(|u| self.collaborative(u, &shown)).unwrap_or_default();
        let popular = self.popular(&shown);
        sort_desc(&mut content);
        sort_desc(&mut collaborative);

        let mut seen = HashSet::new();
        content
            .into_iter()
            .chain(collaborative)
            .chain(popular)
            .filter(|r| seen.insert(r.document.id))
            .take(self.limit)
            .collect()
    }

    pub fn content_based(&self, query: &str, results: &[SearchResult], shown: &HashSet<DocId>) -> Vec<Recommendation> {
        if results.is_empty() {
            return Vec::new();
        }
        let categories: HashSet<&str> = results.iter().map(|r| r.document.category.as_str()).collect();
        let tags: HashSet<&str> = results.iter().flat_map(|r| r.document.tags.iter().map(String::as_str)).collect();

        let mut out = Vec::new();
        for doc in &self.snapshot.documents {
            if shown.contains(&doc.id) {
                continue;
            }
            let mut similarity = 0.0;
            if categories.contains(doc.category.as_str()) {
                similarity += CATEGORY_SIMILARITY;
            }
            if !doc.tags.is_empty() {
                let overlap = doc.tags.iter().filter(|t| tags.contains(t.as_str())).count();
                similarity += TAG_SIMILARITY * overlap as f64 / doc.tags.len() as f64;
            }
            if similarity > MIN_CONTENT_SIMILARITY {
                out.push(Recommendation {
                    document: doc.clone(),
                    score: similarity,
                    reason: format!("similar topic to results for \"{query}\""),
                    strategy: Strategy::Content,
                });
            }
        }
        out
    }

    pub fn collaborative(&self, user_id: &str, shown: &HashSet<DocId>) -> Vec<Recommendation> {
        let Some(me) = self.profiles.get(user_id) else { return Vec::new() };
        let viewed = me.viewed_ids();
        if viewed.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::new();
        for (other_id, other) in self.profiles {
            if other_id == user_id {
                continue;
            }
            let theirs = other.viewed_ids();
            let overlap = viewed.intersection(&theirs).count();
            if overlap == 0 {
                continue;
            }
            let score = overlap as f64 / viewed.len() as f64;
            for id in theirs.difference(&viewed) {
                if shown.contains(id) {
                    continue;
                }
                let Some(doc) = self.snapshot.document(*id) else { continue };
                out.push(Recommendation {
                    document: doc.clone(),
                    score,
                    reason: format!("viewed by a user with {overlap} documents in common"),
                    strategy: Strategy::Collaborative,
                });
            }
        }
        out
    }

    pub fn popular(&self, shown: &HashSet<DocId>) -> Vec<Recommendation> {
        let mut counts: BTreeMap<DocId, usize> = BTreeMap::new();
        for profile in self.profiles.values() {
            for entry in &profile.search_history {
                for id in &entry.result_ids {
                    *counts.entry(*id).or_insert(0) += 1;
                }
            }
        }
        let Some(max) = counts.values().copied().max() else { return Vec::new() };

        let mut ranked: Vec<(DocId, usize)> = counts.into_iter().filter(|(id, _)| !shown.contains(id)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
            .into_iter()
            .filter_map(|(id, count)| {
                let doc = self.snapshot.document(id)?;
                Some(Recommendation {
                    document: doc.clone(),
                    score: count as f64 / max as f64,
                    reason: format!("appeared in {count} past searches"),
                    strategy: Strategy::Popular,
                })
            })
            .take(POPULAR_TOP)
            .collect()
    }
}
