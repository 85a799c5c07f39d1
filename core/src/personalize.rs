use crate::profile::UserProfile;
use crate::search::{sort_by_score, SearchResult};

/// Re-weight results by the user's learned category and tag preferences.
///
/// `score * w(category) * product(w(tag))`, unseen keys weigh 1.0. Documents carrying
/// several preferred tags are therefore boosted multiplicatively. Without a profile the
/// results come back untouched.
pub fn personalize(mut results: Vec<SearchResult>, profile: Option<&UserProfile>) -> Vec<SearchResult> {
    let Some(profile) = profile else { return results };
    for r in &mut results {
        let doc = &r.document;
        let tag_factor: f64 = doc.tags.iter().map(|t| profile.tag_weight(t)).product();
        r.score *= profile.category_weight(&doc.category) * tag_factor;
    }
    sort_by_score(&mut results);
    results
}
