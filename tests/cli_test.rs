use std::process::Command;
use tempfile::tempdir;

fn bin() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_fairing-replicator"));
    command.env_remove("FAIRING_SECRET_TOKEN").env_remove("RUST_LOG");
    command
}

#[test]
fn test_sync_missing_config_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("missing.json");

    let output = bin()
        .arg("sync")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);
    println!("stderr: {}", stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Failed to read config file"));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_sync_requires_secret_token() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.json");
    std::fs::write(&config_path, r#"{"start_date": "2021-01-01T00:00:00Z"}"#).unwrap();

    let output = bin()
        .arg("sync")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--state")
        .arg(temp_dir.path().join("state.json").to_str().unwrap())
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);
    println!("stderr: {}", stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("secret_token is required"));
    assert!(!temp_dir.path().join("state.json").exists());
}

#[test]
fn test_sync_saves_state_when_upstream_unreachable() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("tap.toml");
    let state_path = temp_dir.path().join("state").join("state.json");
    std::fs::write(
        &config_path,
        concat!(
            "start_date = \"2021-01-01T00:00:00Z\"\n",
            "api_url = \"http://127.0.0.1:1/api\"\n",
            "request_timeout_secs = 5\n",
        ),
    )
    .unwrap();

    let output = bin()
        .arg("sync")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--state")
        .arg(state_path.to_str().unwrap())
        .arg("--secret-token")
        .arg("test-token")
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);
    println!("stderr: {}", stderr);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(!stderr.contains("test-token"));

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    // nothing was emitted, so no checkpoint and no start date is recorded
    let stream = &saved["streams"]["responses"];
    assert!(stream.is_object());
    assert!(stream["starting_replication_value"].is_null());
    assert!(!saved.to_string().contains("2021-01-01"));
}
