use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref FENCED_CODE: Regex = Regex::new(r"(?s)```.*?```").expect("valid regex");
    static ref INLINE_CODE: Regex = Regex::new(r"`[^`\n]*`").expect("valid regex");
    static ref MARKDOWN: Regex = Regex::new(r"[#*`\[\]]").expect("valid regex");
    // \p{P} covers CJK punctuation such as 。，、「」 as well as ASCII punctuation.
    static ref SEPARATOR: Regex = Regex::new(r"[\s\p{P}\p{S}]+").expect("valid regex");
}

fn keep(token: &str) -> bool {
    let mut chars = token.chars();
    if chars.next().is_none() || chars.next().is_none() {
        return false;
    }
    !token.chars().all(char::is_numeric)
}

/// Normalize text into its raw token stream, duplicates included, in reading order.
///
/// NFKC + lowercase, code blocks and inline code removed, markdown control characters
/// dropped, split on whitespace and punctuation. Tokens of one character or made only of
/// digits are discarded.
pub fn token_stream(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let without_blocks = FENCED_CODE.replace_all(&normalized, " ");
    let without_code = INLINE_CODE.replace_all(&without_blocks, " ");
    let plain = MARKDOWN.replace_all(&without_code, " ");
    SEPARATOR
        .split(&plain)
        .filter(|t| keep(t))
        .map(str::to_string)
        .collect()
}

/// Tokenize text into a deduplicated token set, preserving first-occurrence order.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    token_stream(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Running, runner's run!");
        assert_eq!(t, vec!["running", "runner", "run"]);
    }

    #[test]
    fn stream_keeps_duplicates() {
        let s = token_stream("api API Api docs");
        assert_eq!(s, vec!["api", "api", "api", "docs"]);
        assert_eq!(tokenize("api API Api docs"), vec!["api", "docs"]);
    }

    #[test]
    fn empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t").is_empty());
    }
}
