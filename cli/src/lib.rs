use anyhow::Result;
use clap::{Parser, Subcommand};
use docsearch_core::{EngineConfig, EngineStats, SearchEngine, SearchOptions, SearchResponse};
use std::fmt::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docsearch")]
#[command(about = "Search, rank and recommend documents in a markdown corpus", long_about = None)]
pub struct Cli {
    /// JSON config file; defaults apply when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Corpus root; index and profiles are stored under <root>/.docsearch
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
    /// Print JSON instead of text
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the corpus
    Search {
        /// Query text
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// User id for personalization and history
        #[arg(long)]
        user: Option<String>,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
        /// Skip personalization
        #[arg(long, default_value_t = false)]
        no_personalize: bool,
        /// Skip recommendations
        #[arg(long, default_value_t = false)]
        no_recommend: bool,
    },
    /// Rebuild the index from scratch
    Rebuild,
    /// Show index and user statistics
    Stats,
    /// Complete a partial query
    Suggest {
        partial: String,
    },
}

impl Cli {
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let config = match &self.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };
        Ok(match &self.root {
            Some(root) => config.rooted_at(root),
            None => config,
        })
    }
}

/// Execute a parsed command and render its output.
pub fn run(cli: &Cli) -> Result<String> {
    tracing::debug!(command = ?cli.command, "running command");
    let mut engine = SearchEngine::from_config(cli.engine_config()?)?;
    match &cli.command {
        Commands::Search { query, user, limit, no_personalize, no_recommend } => {
            let opts = SearchOptions {
                user_id: user.clone(),
                limit: *limit,
                personalized: !no_personalize,
                include_recommendations: !no_recommend,
            };
            let resp = engine.search(&query.join(" "), &opts)?;
            if cli.json {
                Ok(serde_json::to_string_pretty(&resp)?)
            } else {
                Ok(render_search(&resp))
            }
        }
        Commands::Rebuild => {
            let meta = engine.rebuild()?.metadata.clone();
            if cli.json {
                Ok(serde_json::to_string_pretty(&meta)?)
            } else {
                Ok(format!("indexed {} documents, {} terms", meta.total_docs, meta.total_terms))
            }
        }
        Commands::Stats => {
            let stats = engine.stats()?;
            if cli.json {
                Ok(serde_json::to_string_pretty(&stats)?)
            } else {
                Ok(render_stats(&stats))
            }
        }
        Commands::Suggest { partial } => {
            let suggestions = engine.suggest(partial)?;
            if cli.json {
                Ok(serde_json::to_string_pretty(&suggestions)?)
            } else {
                Ok(suggestions.join("\n"))
            }
        }
    }
}

fn render_search(resp: &SearchResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} results for \"{}\"", resp.total_found, resp.query);
    for (rank, r) in resp.results.iter().enumerate() {
        let doc = &r.document;
        let _ = writeln!(out, "{:>2}. {} ({:.3})", rank + 1, doc.title, r.score);
        let _ = writeln!(out, "    {} [{}]", doc.path, doc.category);
        for h in &r.highlights {
            let _ = writeln!(out, "    > {h}");
        }
    }
    if !resp.recommendations.is_empty() {
        let _ = writeln!(out, "\nrecommended:");
        for rec in &resp.recommendations {
            let _ = writeln!(out, "  - {} ({:?}: {})", rec.document.title, rec.strategy, rec.reason);
        }
    }
    out.trim_end().to_string()
}

fn render_stats(stats: &EngineStats) -> String {
    format!(
        "documents: {}\nterms: {}\nusers: {}\nsearches: {}\navg searches per user: {:.2}",
        stats.documents, stats.terms, stats.users, stats.total_searches, stats.avg_searches_per_user
    )
}
