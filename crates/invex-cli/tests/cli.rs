use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `invex` isolated from the caller's `.env`, config dir and credentials.
fn invex(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("invex").unwrap();
    cmd.current_dir(dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .env_remove("RUST_LOG")
        .env_remove("OPENAI_API_KEY")
        .env_remove("DOCUMENT_AI_ACCESS_TOKEN");
    cmd
}

/// Only the path and extension matter for these tests; nothing gets decoded.
fn write_png(dir: &TempDir, name: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"\x89PNG\r\n\x1a\n").unwrap();
    path
}

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().unwrap();
    invex(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn process_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    invex(&dir)
        .args(["process", "no-such-invoice.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn process_rejects_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("invoice.docx");
    std::fs::write(&path, b"not an invoice").unwrap();

    invex(&dir)
        .arg("process")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported file type: .docx"));
}

#[test]
fn process_vision_without_api_key_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let image = write_png(&dir, "invoice.png");

    invex(&dir)
        .args(["process", "--strategy", "vision-llm"])
        .arg(&image)
        .assert()
        .failure()
        .stderr(predicate::str::contains("vision.api_key is not set"));
}

#[test]
fn unknown_strategy_is_rejected() {
    let dir = TempDir::new().unwrap();
    let image = write_png(&dir, "invoice.png");

    invex(&dir)
        .args(["process", "--strategy", "telepathy"])
        .arg(&image)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown strategy"));
}

#[test]
fn config_init_then_show() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("invex.json");

    invex(&dir)
        .args(["config", "init", "--output"])
        .arg(&config_path)
        .assert()
        .success();

    let written = std::fs::read_to_string(&config_path).unwrap();
    assert!(written.contains("\"strategy\": \"local_ocr\""));

    invex(&dir)
        .args(["config", "init", "--output"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    std::fs::write(&config_path, r#"{"strategy": "document_ai"}"#).unwrap();
    invex(&dir)
        .arg("-c")
        .arg(&config_path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"strategy\": \"document_ai\""))
        .stdout(predicate::str::contains("\"render_dpi\": 200"));
}

#[test]
fn config_show_masks_secrets() {
    let dir = TempDir::new().unwrap();
    invex(&dir)
        .env("OPENAI_API_KEY", "sk-very-secret")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<set>"))
        .stdout(predicate::str::contains("sk-very-secret").not());
}

#[test]
fn log_level_follows_rust_log_then_verbosity() {
    let dir = TempDir::new().unwrap();
    let config_dir = dir.path().join("invex");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.json"), "{}").unwrap();

    invex(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Using config file").not());

    invex(&dir)
        .env("RUST_LOG", "debug")
        .args(["config", "show"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Using config file"));

    invex(&dir)
        .args(["-vv", "config", "show"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Using config file"));
}

#[test]
fn batch_without_matches_fails() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("invex.json");
    std::fs::write(&config_path, r#"{"strategy": "vision_llm"}"#).unwrap();

    let pattern = dir.path().join("*.pdf");
    invex(&dir)
        .env("OPENAI_API_KEY", "sk-test")
        .arg("-c")
        .arg(&config_path)
        .arg("batch")
        .arg(pattern.to_str().unwrap())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}
