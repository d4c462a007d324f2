use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use clip_publisher::load_config::{load_config, Secrets, MAX_PUBLISH_DELAY_HOURS};

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// Only the bucket is required; every other section falls back to defaults.
#[test]
fn test_load_config_minimal_uses_defaults() {
    let file = config_file("storage:\n  bucket: my-clips\n");

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.storage.bucket, "my-clips");
    assert_eq!(config.storage.extensions, vec![".mp4", ".mov", ".avi"]);
    assert!(config.storage.prefix.is_none());
    assert_eq!(config.ledger.path, PathBuf::from("state.json"));
    assert_eq!(config.run.budget, 1);
    assert!(!config.run.backfill_failures);
    assert_eq!(config.metadata.hashtag.as_deref(), Some("#Shorts"));
    assert_eq!(config.publish.privacy_status, "public");
    assert_eq!(config.publish.category_id, "22");
    assert!(config.publish.publish_delay_hours.is_none());
    assert_eq!(config.http.timeout_secs, 120);

    let run = config.run_config();
    assert_eq!(run.budget, 1);
    assert_eq!(run.metadata.fallback_tags.len(), 5);
}

#[test]
fn test_load_config_full_schema() {
    let yaml = r##"
storage:
  bucket: my-clips
  prefix: shorts/
  extensions: [".mp4"]
  work_dir: ./tmp/clips
ledger:
  path: ./var/state.json
run:
  budget: 3
  backfill_failures: true
metadata:
  model: gpt-4o-mini
  link_url: https://shop.example
  calls_to_action: ["tap the link"]
  hashtag: "#Clips"
  fallback_tags: [otters]
publish:
  privacy_status: unlisted
  category_id: "15"
  made_for_kids: true
  publish_delay_hours: 24
http:
  timeout_secs: 30
"##;
    let file = config_file(yaml);

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.storage.prefix.as_deref(), Some("shorts/"));
    assert_eq!(config.storage.work_dir(), PathBuf::from("./tmp/clips"));
    assert_eq!(config.ledger.path, PathBuf::from("./var/state.json"));
    assert_eq!(config.metadata.model, "gpt-4o-mini");
    assert!(config.publish.made_for_kids);
    assert_eq!(config.publish.publish_delay_hours, Some(24));
    assert_eq!(config.http.timeout_secs, 30);

    let run = config.run_config();
    assert_eq!(run.budget, 3);
    assert!(run.backfill_failures);
    assert_eq!(run.metadata.link_url.as_deref(), Some("https://shop.example"));
    assert_eq!(run.metadata.calls_to_action, vec!["tap the link"]);
    assert_eq!(run.metadata.hashtag.as_deref(), Some("#Clips"));
    assert_eq!(run.metadata.fallback_tags, vec!["otters"]);
}

#[test]
fn test_load_config_errors_on_invalid_yaml() {
    let file = config_file("storage: [unclosed\n");

    let err = load_config(file.path()).expect_err("Invalid YAML must fail");
    let msg = err.to_string();
    assert!(msg.contains("parse") && msg.contains("YAML"), "unexpected error: {msg}");
}

#[test]
fn test_load_config_errors_on_missing_storage() {
    let file = config_file("run:\n  budget: 2\n");
    assert!(load_config(file.path()).is_err());
}

#[test]
fn test_load_config_rejects_bad_values() {
    for yaml in [
        "storage:\n  bucket: \"  \"\n",
        "storage:\n  bucket: b\n  extensions: []\n",
        "storage:\n  bucket: b\npublish:\n  privacy_status: secret\n",
        "storage:\n  bucket: b\npublish:\n  publish_delay_hours: 0\n",
        "storage:\n  bucket: b\npublish:\n  publish_delay_hours: 100000000000\n",
        "storage:\n  bucket: b\nhttp:\n  timeout_secs: 0\n",
    ] {
        let file = config_file(yaml);
        let err = load_config(file.path()).expect_err("Config should be rejected");
        assert!(
            format!("{err:#}").contains("Invalid config"),
            "unexpected error for {yaml:?}: {err:#}"
        );
    }
}

#[test]
fn test_load_config_accepts_longest_publish_delay() {
    let yaml = format!(
        "storage:\n  bucket: b\npublish:\n  publish_delay_hours: {MAX_PUBLISH_DELAY_HOURS}\n"
    );
    let file = config_file(&yaml);
    let config = load_config(file.path()).expect("Config should load");
    assert_eq!(config.publish.publish_delay_hours, Some(MAX_PUBLISH_DELAY_HOURS));
}

#[test]
fn test_load_config_errors_on_missing_file() {
    let err = load_config("/nonexistent/clip-publisher.yaml").expect_err("Missing file");
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
#[serial]
fn test_secrets_from_env() {
    env::set_var("GCS_ACCESS_TOKEN", "gcs");
    env::set_var("OPENAI_API_KEY", "sk-test");
    env::set_var("YOUTUBE_ACCESS_TOKEN", "yt");

    let secrets = Secrets::from_env().expect("All secrets set");
    assert_eq!(secrets.gcs_access_token, "gcs");
    assert_eq!(secrets.openai_api_key, "sk-test");
    assert_eq!(secrets.youtube_access_token, "yt");
    assert!(!format!("{secrets:?}").contains("sk-test"));
}

#[test]
#[serial]
fn test_secrets_missing_or_empty_fail() {
    env::set_var("GCS_ACCESS_TOKEN", "gcs");
    env::set_var("OPENAI_API_KEY", "");
    env::set_var("YOUTUBE_ACCESS_TOKEN", "yt");
    let err = Secrets::from_env().expect_err("Empty key must fail");
    assert!(err.to_string().contains("OPENAI_API_KEY"));

    env::remove_var("YOUTUBE_ACCESS_TOKEN");
    env::set_var("OPENAI_API_KEY", "sk-test");
    let err = Secrets::from_env().expect_err("Missing token must fail");
    assert!(err.to_string().contains("YOUTUBE_ACCESS_TOKEN"));
}
