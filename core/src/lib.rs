//! Document search over a markdown corpus: an in-memory inverted index with TF-IDF
//! ranking, per-user personalization and recommendations.

pub mod config;
pub mod corpus;
pub mod engine;
pub mod index;
pub mod metadata;
pub mod persist;
pub mod personalize;
pub mod profile;
pub mod recommend;
pub mod search;
pub mod tokenizer;

pub use config::{EngineConfig, IdfMode};
pub use engine::{EngineStats, SearchEngine, SearchOptions, SearchResponse};
pub use index::{DocId, Document, IndexMetadata, IndexSnapshot, Posting};
pub use profile::{ProfileMap, UserProfile};
pub use recommend::{Recommendation, Strategy};
pub use search::SearchResult;
