use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docchat_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docchat"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[documents]
new_dir = "{root}/data/new"
processed_dir = "{root}/data/processed"

[vector_store]
path = "{root}/data/vectors.sqlite"
collection = "documents"

[embedding]
provider = "disabled"

[sql]
path = "{root}/data/sqlite_data.db"

[logging]
level = "warn"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("docchat.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docchat(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(docchat_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run docchat");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_directories_and_store() {
    let (tmp, config) = setup_test_env();
    let root = tmp.path();

    let (stdout, stderr, success) = run_docchat(&config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("documents created"), "stdout: {}", stdout);
    assert!(root.join("data/new").is_dir());
    assert!(root.join("data/processed").is_dir());
    assert!(root.join("data/vectors.sqlite").exists());

    // Idempotent
    let (stdout, stderr, success) = run_docchat(&config, &["init"]);
    assert!(success, "second init failed: {}", stderr);
    assert!(stdout.contains("exists (empty)"), "stdout: {}", stdout);
}

#[test]
fn test_pending_lists_new_files() {
    let (tmp, config) = setup_test_env();
    let new_dir = tmp.path().join("data/new");

    let (stdout, _, success) = run_docchat(&config, &["pending"]);
    assert!(success);
    assert!(stdout.contains("No new documents."));

    fs::write(new_dir.join("b.txt"), "beta").unwrap();
    fs::write(new_dir.join("a.txt"), "alpha").unwrap();
    fs::create_dir_all(new_dir.join("nested")).unwrap();

    let (stdout, _, success) = run_docchat(&config, &["pending"]);
    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["a.txt", "b.txt"]);
}

#[test]
fn test_ingest_without_new_files() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_docchat(&config, &["ingest"]);
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("No new documents."));
}

#[test]
fn test_ingest_fails_when_embedding_disabled() {
    let (tmp, config) = setup_test_env();
    let new_dir = tmp.path().join("data/new");
    fs::create_dir_all(&new_dir).unwrap();
    fs::write(new_dir.join("sky.txt"), "The sky is blue.").unwrap();

    let (_, stderr, success) = run_docchat(&config, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
    // The file stays put for the next attempt.
    assert!(new_dir.join("sky.txt").exists());
}

#[test]
fn test_seed_db_and_tables() {
    let (_tmp, config) = setup_test_env();

    let (stdout, stderr, success) = run_docchat(&config, &["seed-db"]);
    assert!(success, "seed-db failed: {}", stderr);
    assert!(stdout.contains("Tables created successfully"));

    // Seeding again is harmless.
    let (_, _, success) = run_docchat(&config, &["seed-db"]);
    assert!(success);

    let (stdout, stderr, success) = run_docchat(&config, &["tables"]);
    assert!(success, "tables failed: {}", stderr);
    assert!(stdout.contains("products"));
    assert!(stdout.contains("staff"));
    assert!(stdout.contains("orders"));
    assert!(stdout.contains("  product_name VARCHAR(255)"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(&bad, "[chunking]\nmax_chars = 100\noverlap_chars = 200\n").unwrap();

    let (_, stderr, success) = run_docchat(&bad, &["pending"]);
    assert!(!success);
    assert!(stderr.contains("overlap_chars"), "stderr: {}", stderr);
}
