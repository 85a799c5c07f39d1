use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

const TITLE_SCAN_LINES: usize = 10;
const SUMMARY_CHARS: usize = 200;
pub const DEFAULT_CATEGORY: &str = "general";

lazy_static! {
    static ref H1: Regex = Regex::new(r"^#\s+(.+?)(?:\s+#+)?\s*$").expect("valid regex");
    static ref CATEGORY: Regex =
        Regex::new(r"(?i)(?:分类|类别|category)\**\s*[:：]\s*\**\s*([^\n\r]{1,80})").expect("valid regex");
    static ref TAGS: Regex =
        Regex::new(r"(?i)(?:标签|tags)\**\s*[:：]\s*\**\s*([^\n\r]{1,200})").expect("valid regex");
    static ref SUMMARY_HEADING: Regex =
        Regex::new(r"(?im)^#{1,6}\s*(?:overview|introduction|summary|概述|简介|摘要)\s*$").expect("valid regex");
    static ref HEADING_LINE: Regex = Regex::new(r"(?m)^#{1,6}[^\n]*$").expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetadata {
    pub title: String,
    pub category: String,
    pub tags: Vec<String>,
    pub summary: String,
}

fn clean(value: &str) -> &str {
    value.trim().trim_matches(|c: char| c == '*' || c == '`' || c.is_whitespace())
}

fn title_of(text: &str, path: &Path) -> String {
    text.lines()
        .take(TITLE_SCAN_LINES)
        .find_map(|line| H1.captures(line.trim_end()).map(|c| c[1].trim().to_string()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
}

fn category_of(text: &str) -> String {
    CATEGORY
        .captures(text)
        .map(|c| clean(&c[1]).to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

fn tags_of(text: &str) -> Vec<String> {
    let Some(caps) = TAGS.captures(text) else { return Vec::new() };
    caps[1]
        .split([',', '，', '、'])
        .map(|t| clean(t).trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn summary_of(text: &str) -> String {
    let Some(heading) = SUMMARY_HEADING.find(text) else { return String::new() };
    let body = HEADING_LINE.replace_all(&text[heading.end()..], " ");
    let flat = WHITESPACE.replace_all(body.trim(), " ");
    flat.chars().take(SUMMARY_CHARS).collect::<String>().trim_end().to_string()
}

/// Pull title, category, tags and summary out of a markdown document.
/// Every field falls back to its default when its marker is missing.
pub fn extract_metadata(text: &str, path: &Path) -> DocMetadata {
    DocMetadata {
        title: title_of(text, path),
        category: category_of(text),
        tags: tags_of(text),
        summary: summary_of(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_all_markers() {
        let text = "# API Guide\n\n**Category**: Reference\nTags: rest, http， auth\n\n## Overview\nThe API lets you do things.\n## Details\nMore.";
        let meta = extract_metadata(text, Path::new("docs/api.md"));
        assert_eq!(meta.title, "API Guide");
        assert_eq!(meta.category, "Reference");
        assert_eq!(meta.tags, vec!["rest", "http", "auth"]);
        assert_eq!(meta.summary, "The API lets you do things. More.");
    }

    #[test]
    fn chinese_markers() {
        let text = "# 部署指南\n分类：运维\n标签：docker、k8s\n";
        let meta = extract_metadata(text, Path::new("deploy.md"));
        assert_eq!(meta.title, "部署指南");
        assert_eq!(meta.category, "运维");
        assert_eq!(meta.tags, vec!["docker", "k8s"]);
    }

    #[test]
    fn defaults_when_nothing_matches() {
        let meta = extract_metadata("plain text\n## Not a title", Path::new("notes/setup.md"));
        assert_eq!(meta.title, "setup");
        assert_eq!(meta.category, DEFAULT_CATEGORY);
        assert!(meta.tags.is_empty());
        assert_eq!(meta.summary, "");
    }

    #[test]
    fn closing_hashes_need_a_space() {
        assert_eq!(extract_metadata("# Intro to C#\nbody", Path::new("c.md")).title, "Intro to C#");
        assert_eq!(extract_metadata("# Closed Title ##\nbody", Path::new("c.md")).title, "Closed Title");
    }

    #[test]
    fn title_must_be_in_first_lines() {
        let mut text = "line\n".repeat(10);
        text.push_str("# Late Title\n");
        assert_eq!(extract_metadata(&text, Path::new("late.md")).title, "late");
    }

    #[test]
    fn summary_is_bounded() {
        let text = format!("# T\n## Summary\n{}", "word ".repeat(100));
        let meta = extract_metadata(&text, Path::new("t.md"));
        assert!(meta.summary.chars().count() <= SUMMARY_CHARS);
        assert!(meta.summary.starts_with("word word"));
    }
}
