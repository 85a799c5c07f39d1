use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Include/exclude glob filter over paths relative to the corpus root.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    include: GlobSet,
    exclude: GlobSet,
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern {pattern:?}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

impl PathMatcher {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self { include: build_set(include)?, exclude: build_set(exclude)? })
    }

    pub fn is_match<P: AsRef<Path>>(&self, relative: P) -> bool {
        let relative = relative.as_ref();
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }
}

/// Source of the file list an index is built from.
pub trait CorpusProvider: Send + Sync {
    /// Paths in a stable order; document ids follow this order.
    fn files(&self) -> Result<Vec<PathBuf>>;
}

/// Walks a directory and keeps the files accepted by a [`PathMatcher`].
#[derive(Debug, Clone)]
pub struct GlobCorpus {
    root: PathBuf,
    matcher: PathMatcher,
}

impl GlobCorpus {
    pub fn new<P: AsRef<Path>>(root: P, matcher: PathMatcher) -> Self {
        Self { root: root.as_ref().to_path_buf(), matcher }
    }
}

impl CorpusProvider for GlobCorpus {
    fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            tracing::warn!(root = %self.root.display(), "corpus root missing, indexing nothing");
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let p = entry.path();
            let rel = p.strip_prefix(&self.root).unwrap_or(p);
            if self.matcher.is_match(rel) {
                files.push(p.to_path_buf());
            }
        }
        Ok(files)
    }
}

/// A fixed list of files, used as-is.
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus(pub Vec<PathBuf>);

impl CorpusProvider for StaticCorpus {
    fn files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.0.clone())
    }
}
