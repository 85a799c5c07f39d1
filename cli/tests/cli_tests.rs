use clap::Parser;
use docsearch_cli::{run, Cli};
use std::fs;
use tempfile::tempdir;

fn corpus() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("api.md"), "# API Guide\nCategory: api\nThis is the api reference.").unwrap();
    fs::write(dir.path().join("setup.md"), "# Setup\nNo api mention here.").unwrap();
    fs::write(dir.path().join("notes.txt"), "api api api").unwrap();
    dir
}

fn exec(args: &[&str]) -> String {
    let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
    run(&cli).unwrap()
}

#[test]
fn search_outputs_ranked_json() {
    let dir = corpus();
    let root = dir.path().to_str().unwrap();
    let out = exec(&["docsearch", "--root", root, "--json", "search", "api", "--user", "ann"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    let results = json["results"].as_array().unwrap();
    assert_eq!(json["totalFound"], 2);
    assert_eq!(results[0]["document"]["title"], "API Guide");
    assert!(dir.path().join(".docsearch/profiles.json").exists());
}

#[test]
fn rebuild_and_stats() {
    let dir = corpus();
    let root = dir.path().to_str().unwrap();
    let out = exec(&["docsearch", "--root", root, "rebuild"]);
    assert!(out.starts_with("indexed 2 documents"));
    exec(&["docsearch", "--root", root, "search", "reference", "--user", "ann"]);
    let stats: serde_json::Value = serde_json::from_str(&exec(&["docsearch", "--root", root, "--json", "stats"])).unwrap();
    assert_eq!(stats["documents"], 2);
    assert_eq!(stats["users"], 1);
    assert_eq!(stats["avgSearchesPerUser"], 1.0);
}

#[test]
fn suggest_lists_terms() {
    let dir = corpus();
    let root = dir.path().to_str().unwrap();
    let out = exec(&["docsearch", "--root", root, "suggest", "ref"]);
    assert_eq!(out, "reference");
}

#[test]
fn config_file_is_honored() {
    let dir = corpus();
    let cfg = dir.path().join("docsearch.json");
    fs::write(&cfg, r#"{ "include": ["**/*.txt"], "minScore": 0.0 }"#).unwrap();
    let root = dir.path().to_str().unwrap();
    let out = exec(&["docsearch", "--config", cfg.to_str().unwrap(), "--root", root, "--json", "rebuild"]);
    let meta: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(meta["totalDocs"], 1);
}

#[test]
fn malformed_arguments_are_rejected() {
    assert!(Cli::try_parse_from(["docsearch", "search"]).is_err());
    assert!(Cli::try_parse_from(["docsearch", "search", "q", "--limit", "many"]).is_err());
    assert!(Cli::try_parse_from(["docsearch", "frobnicate"]).is_err());
}
