use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn memh_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_memh"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let kb_dir = root.join("kb");
    fs::create_dir_all(kb_dir.join("guides")).unwrap();
    fs::write(
        kb_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt covers cargo and crates.",
    )
    .unwrap();
    fs::write(
        kb_dir.join("guides/beta.md"),
        "# Beta Guide\n\nDeployment runs through the release pipeline.",
    )
    .unwrap();
    fs::write(kb_dir.join("notes.txt"), "Not markdown, never indexed.").unwrap();

    fs::write(
        root.join("history.jsonl"),
        "{\"display\":\"rotate the staging certificates\",\"timestamp\":1700000000000,\"sessionId\":\"sess-1\"}\nnot json\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/memory.sqlite"

[retrieval]
default_limit = 5
max_limit = 20

[knowledge]
root = "{root}/kb"
include_globs = ["**/*.md"]

[history]
path = "{root}/history.jsonl"

[log]
level = "warn"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("memh.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_memh(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = memh_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run memh binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn stored_id(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|l| {
            l.strip_prefix("Stored: ")
                .or_else(|| l.strip_prefix("Already stored: "))
        })
        .unwrap_or_else(|| panic!("no id in output: {}", stdout))
        .trim()
        .to_string()
}

fn search_json(config_path: &Path, args: &[&str]) -> Vec<serde_json::Value> {
    let mut full = vec!["search"];
    full.extend_from_slice(args);
    full.push("--json");
    let (stdout, stderr, success) = run_memh(config_path, &full);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    parsed["results"].as_array().unwrap().clone()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_memh(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/memory.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_memh(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_memh(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_store_dedup_returns_same_id() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout1, _, success1) =
        run_memh(&config_path, &["store", "buy milk", "--category", "fact"]);
    assert!(success1);
    let (stdout2, _, success2) =
        run_memh(&config_path, &["store", "buy milk", "--category", "fact"]);
    assert!(success2);

    assert!(stdout2.contains("Already stored"));
    assert_eq!(stored_id(&stdout1), stored_id(&stdout2));
}

#[test]
fn test_store_rejects_empty_and_unknown_category() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_memh(&config_path, &["store", "   "]);
    assert!(!success);
    assert!(stderr.contains("text must not be empty"), "stderr: {}", stderr);

    let (_, stderr, success) = run_memh(&config_path, &["store", "x", "--category", "gossip"]);
    assert!(!success);
    assert!(stderr.contains("unknown category"), "stderr: {}", stderr);
}

#[test]
fn test_search_ranks_dark_mode_first() {
    let (_tmp, config_path) = setup_test_env();

    run_memh(
        &config_path,
        &["store", "I prefer dark mode", "--category", "preference"],
    );
    run_memh(&config_path, &["store", "dark chocolate is great"]);

    let results = search_json(&config_path, &["dark mode"]);
    assert!(results.len() >= 2);
    assert_eq!(results[0]["text"], "I prefer dark mode");
    assert_eq!(results[0]["category"], "preference");
}

#[test]
fn test_search_includes_knowledge_and_history() {
    let (_tmp, config_path) = setup_test_env();

    let knowledge = search_json(&config_path, &["deployment"]);
    assert_eq!(knowledge.len(), 1);
    assert_eq!(knowledge[0]["category"], "knowledge");
    assert!(knowledge[0]["text"]
        .as_str()
        .unwrap()
        .starts_with("guides/beta.md#L1-L3"));

    let history = search_json(&config_path, &["staging"]);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["id"], "sess-1");
    assert_eq!(history[0]["category"], "other");
}

#[test]
fn test_search_limit_validation() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_memh(&config_path, &["search", "rust", "--limit", "0"]);
    assert!(!success);
    assert!(stderr.contains("limit"), "stderr: {}", stderr);

    let (_, _, success) = run_memh(&config_path, &["search", "rust", "--limit", "21"]);
    assert!(!success);
}

#[test]
fn test_forget_then_search() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, _) = run_memh(&config_path, &["store", "ship on fridays"]);
    let id = stored_id(&stdout);

    let (stdout, _, success) = run_memh(&config_path, &["forget", &id]);
    assert!(success);
    assert!(stdout.contains("Forgot"));

    assert!(search_json(&config_path, &["fridays"]).is_empty());

    let (stdout, _, success) = run_memh(&config_path, &["forget", &id]);
    assert!(success);
    assert!(stdout.contains("Not found"));
}

#[test]
fn test_sync_incremental() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_memh(&config_path, &["sync"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("scanned: 2"));
    assert!(stdout.contains("updated: 2"));
    assert!(stdout.contains("ok"));

    let (stdout, _, _) = run_memh(&config_path, &["sync"]);
    assert!(stdout.contains("updated: 0"), "got: {}", stdout);
    assert!(stdout.contains("chunks written: 0"), "got: {}", stdout);

    fs::write(
        tmp.path().join("kb/alpha.md"),
        "# Alpha Document Updated\n\nThis file was modified.",
    )
    .unwrap();
    fs::remove_file(tmp.path().join("kb/guides/beta.md")).unwrap();

    let (stdout, _, _) = run_memh(&config_path, &["sync"]);
    assert!(stdout.contains("updated: 1"), "got: {}", stdout);
    assert!(stdout.contains("removed: 1"), "got: {}", stdout);
}

#[test]
fn test_stats() {
    let (_tmp, config_path) = setup_test_env();

    run_memh(&config_path, &["store", "buy milk", "--category", "fact"]);
    run_memh(&config_path, &["sync"]);

    let (stdout, stderr, success) = run_memh(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Memories:    1"));
    assert!(stdout.contains("files:     2"));
    assert!(stdout.contains("History:     1 entries"));
    assert!(stdout.contains("fact"));
}
