use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Inverse document frequency variant used by the ranker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdfMode {
    /// ln(N / df). A term present in every document contributes nothing.
    Raw,
    /// ln(1 + N / df)
    #[default]
    Smoothed,
}

impl IdfMode {
    pub fn idf(self, total_docs: usize, df: usize) -> f64 {
        let n = total_docs.max(1) as f64;
        let df = df.max(1) as f64;
        match self {
            IdfMode::Raw => (n / df).ln(),
            IdfMode::Smoothed => (1.0 + n / df).ln(),
        }
    }
}

/// Engine configuration. Built once, then shared read-only with every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub docs_root: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub index_path: PathBuf,
    pub profiles_path: PathBuf,
    pub update_interval_secs: u64,
    pub min_score: f64,
    pub max_results: usize,
    /// Multiplier for query terms that also occur in the document title.
    pub title_boost: f64,
    pub idf: IdfMode,
    /// Count term frequency over the raw token stream instead of the deduplicated set.
    /// Off by default, which makes every posting frequency 1.
    pub count_before_dedup: bool,
    pub max_history: usize,
    pub learning_rate: f64,
    /// Applied to the learned excess over 1.0 before each update. 1.0 never decays.
    pub preference_decay: f64,
    pub highlight_window: usize,
    pub max_highlights: usize,
    pub recommendation_limit: usize,
    pub suggest_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            docs_root: PathBuf::from("."),
            include: vec!["**/*.md".into()],
            exclude: vec!["**/node_modules/**".into(), "**/.git/**".into(), "**/target/**".into()],
            index_path: PathBuf::from(".docsearch/index.json"),
            profiles_path: PathBuf::from(".docsearch/profiles.json"),
            update_interval_secs: 3600,
            min_score: 0.1,
            max_results: 20,
            title_boost: 2.0,
            idf: IdfMode::default(),
            count_before_dedup: false,
            max_history: 100,
            learning_rate: 0.1,
            preference_decay: 1.0,
            highlight_window: 50,
            max_highlights: 3,
            recommendation_limit: 5,
            suggest_limit: 10,
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Same config with every storage path placed under `root`.
    pub fn rooted_at<P: AsRef<Path>>(mut self, root: P) -> Self {
        let root = root.as_ref();
        self.index_path = root.join(".docsearch/index.json");
        self.profiles_path = root.join(".docsearch/profiles.json");
        self.docs_root = root.to_path_buf();
        self
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}
