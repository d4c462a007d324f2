//! `load_config`: parses the static YAML config and reads secrets from the environment.
//!
//! The YAML file never holds credentials. Access tokens and API keys come from
//! the environment (optionally via a `.env` file loaded in `main`).
//!
//! # Accepted schema
//!
//! ```yaml
//! storage:
//!   bucket: my-clips            # required
//!   prefix: shorts/             # optional object name prefix
//!   extensions: [".mp4", ".mov", ".avi"]
//!   work_dir: /var/tmp/clips    # default: <system temp>/clip-publisher
//! ledger:
//!   path: state.json
//! run:
//!   budget: 1
//!   backfill_failures: false
//! metadata:
//!   model: gpt-4.1
//!   link_url: https://shop.example
//!   calls_to_action: ["click to explore the shop"]
//!   hashtag: "#Shorts"
//! publish:
//!   privacy_status: public      # public | unlisted | private
//!   category_id: "22"
//!   publish_delay_hours: 24     # optional, schedules a private upload
//! http:
//!   timeout_secs: 120
//! ```
//!
//! # Errors
//! Every failure is an `anyhow::Error` with the offending path or key, and is
//! fatal at the CLI boundary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clip_publisher_core::metadata::MetadataDefaults;
use clip_publisher_core::selector::DEFAULT_MEDIA_EXTENSIONS;
use clip_publisher_core::RunConfig;
use serde::Deserialize;
use tracing::{error, info};

pub const GCS_ACCESS_TOKEN_VAR: &str = "GCS_ACCESS_TOKEN";
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const YOUTUBE_ACCESS_TOKEN_VAR: &str = "YOUTUBE_ACCESS_TOKEN";

/// Ten years; the platform rejects schedules much further out anyway.
pub const MAX_PUBLISH_DELAY_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub storage: StorageSection,
    #[serde(default)]
    pub ledger: LedgerSection,
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub metadata: MetadataSection,
    #[serde(default)]
    pub publish: PublishSection,
    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Deserialize)]
pub struct StorageSection {
    pub bucket: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default = "default_storage_url")]
    pub base_url: String,
}

impl StorageSection {
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("clip-publisher"))
    }
}

#[derive(Debug, Deserialize)]
pub struct LedgerSection {
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_budget")]
    pub budget: usize,
    #[serde(default)]
    pub backfill_failures: bool,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            backfill_failures: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MetadataSection {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub calls_to_action: Vec<String>,
    #[serde(default = "default_hashtag")]
    pub hashtag: Option<String>,
    #[serde(default)]
    pub fallback_description: Option<String>,
    #[serde(default)]
    pub fallback_tags: Option<Vec<String>>,
}

impl Default for MetadataSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_openai_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            link_url: None,
            calls_to_action: Vec::new(),
            hashtag: default_hashtag(),
            fallback_description: None,
            fallback_tags: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PublishSection {
    #[serde(default = "default_youtube_url")]
    pub base_url: String,
    #[serde(default = "default_privacy_status")]
    pub privacy_status: String,
    #[serde(default = "default_category_id")]
    pub category_id: String,
    #[serde(default)]
    pub made_for_kids: bool,
    #[serde(default)]
    pub publish_delay_hours: Option<i64>,
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            base_url: default_youtube_url(),
            privacy_status: default_privacy_status(),
            category_id: default_category_id(),
            made_for_kids: false,
            publish_delay_hours: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HttpSection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    DEFAULT_MEDIA_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}
fn default_storage_url() -> String {
    "https://storage.googleapis.com".to_string()
}
fn default_ledger_path() -> PathBuf {
    PathBuf::from("state.json")
}
fn default_budget() -> usize {
    1
}
fn default_model() -> String {
    "gpt-4.1".to_string()
}
fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    300
}
fn default_hashtag() -> Option<String> {
    Some("#Shorts".to_string())
}
fn default_youtube_url() -> String {
    "https://www.googleapis.com".to_string()
}
fn default_privacy_status() -> String {
    "public".to_string()
}
fn default_category_id() -> String {
    "22".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}

impl CliConfig {
    /// Core run settings derived from the `run` and `metadata` sections.
    pub fn run_config(&self) -> RunConfig {
        let mut metadata = MetadataDefaults {
            link_url: self.metadata.link_url.clone(),
            fallback_description: self.metadata.fallback_description.clone(),
            calls_to_action: self.metadata.calls_to_action.clone(),
            hashtag: self.metadata.hashtag.clone(),
            ..MetadataDefaults::default()
        };
        if let Some(tags) = &self.metadata.fallback_tags {
            metadata.fallback_tags = tags.clone();
        }
        RunConfig {
            budget: self.run.budget,
            backfill_failures: self.run.backfill_failures,
            metadata,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.storage.bucket.trim().is_empty() {
            bail!("storage.bucket must not be empty");
        }
        if self.storage.extensions.is_empty() {
            bail!("storage.extensions must list at least one extension");
        }
        match self.publish.privacy_status.as_str() {
            "public" | "unlisted" | "private" => {}
            other => bail!("Unsupported publish.privacy_status: {other}"),
        }
        if let Some(hours) = self.publish.publish_delay_hours {
            if hours <= 0 || hours > MAX_PUBLISH_DELAY_HOURS {
                bail!(
                    "publish.publish_delay_hours must be between 1 and {MAX_PUBLISH_DELAY_HOURS}, got {hours}"
                );
            }
        }
        if self.http.timeout_secs == 0 {
            bail!("http.timeout_secs must be positive");
        }
        Ok(())
    }
}

/// Loads and validates the YAML config at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    config
        .validate()
        .with_context(|| format!("Invalid config {:?}", path_ref))?;

    info!(
        bucket = %config.storage.bucket,
        ledger = %config.ledger.path.display(),
        budget = config.run.budget,
        "Config loaded and validated"
    );
    Ok(config)
}

/// Credentials read from the environment. Never logged.
pub struct Secrets {
    pub gcs_access_token: String,
    pub openai_api_key: String,
    pub youtube_access_token: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets").finish_non_exhaustive()
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            gcs_access_token: required_env(GCS_ACCESS_TOKEN_VAR)?,
            openai_api_key: required_env(OPENAI_API_KEY_VAR)?,
            youtube_access_token: required_env(YOUTUBE_ACCESS_TOKEN_VAR)?,
        })
    }
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            info!(var = name, "Secret found in env");
            Ok(value)
        }
        Ok(_) => {
            error!(var = name, "Secret environment variable is empty");
            bail!("{name} environment variable is empty")
        }
        Err(e) => {
            error!(error = ?e, var = name, "Secret environment variable not set");
            bail!("{name} environment variable not set: {e}")
        }
    }
}
