//! Application configuration for csv2md.
//!
//! The config lives at `./csv2md.toml` next to the repository being updated.
//! CLI flags override config file values, which override defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Csv2MdError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "csv2md.toml";

// ---------------------------------------------------------------------------
// Config structs (matching csv2md.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Ordered metadata keys expected at the top of every CSV.
    #[serde(default)]
    pub metadata: Vec<MetadataField>,

    /// Dataset block settings.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Index document and page output settings.
    #[serde(default)]
    pub markdown: MarkdownConfig,

    /// GitHub issue intake settings.
    #[serde(default)]
    pub github: GithubConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let field = |key: &str, column: Option<&str>| MetadataField {
            key: key.into(),
            table_column: column.map(String::from),
        };

        Self {
            defaults: DefaultsConfig::default(),
            metadata: vec![
                field("name", Some("Dataset")),
                field("description", Some("Description")),
                field("author", Some("Author")),
                field("license", Some("License")),
                field("version", None),
            ],
            dataset: DatasetConfig {
                columns: vec!["timestamp".into(), "value".into()],
            },
            markdown: MarkdownConfig::default(),
            github: GithubConfig::default(),
        }
    }
}

/// What to do when a single file fails to decode or publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log the failure and continue with the remaining files.
    #[default]
    Skip,
    /// Stop the run before anything is written.
    Abort,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Maximum number of files decoded or downloaded in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Per-file failure handling.
    #[serde(default)]
    pub on_error: ErrorPolicy,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            on_error: ErrorPolicy::default(),
        }
    }
}

fn default_concurrency() -> u32 {
    4
}

/// `[[metadata]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataField {
    /// Key as written in the first column of the metadata block.
    pub key: String,
    /// Index table column receiving this value. Unmapped keys stay on the page only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_column: Option<String>,
}

/// `[dataset]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Column names expected in the dataset header row.
    #[serde(default)]
    pub columns: Vec<String>,
}

/// `[markdown]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Index document that receives one row per dataset.
    #[serde(default = "default_index")]
    pub index: PathBuf,

    /// Which table of the index document to append to (0-based).
    #[serde(default)]
    pub table_ordinal: usize,

    /// Directory for generated dataset pages.
    #[serde(default = "default_pages_dir")]
    pub pages_dir: PathBuf,

    /// Metadata key used as the page title (falls back to the file stem).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_key: Option<String>,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            index: default_index(),
            table_ordinal: 0,
            pages_dir: default_pages_dir(),
            title_key: Some("name".into()),
        }
    }
}

fn default_index() -> PathBuf {
    PathBuf::from("README.md")
}
fn default_pages_dir() -> PathBuf {
    PathBuf::from("datasets")
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// REST API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Name of the env var holding the API token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Directory where CSV attachments are downloaded.
    #[serde(default = "default_csv_dir")]
    pub csv_dir: PathBuf,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token_env: default_token_env(),
            csv_dir: default_csv_dir(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_csv_dir() -> PathBuf {
    PathBuf::from("tmp/csv")
}

impl AppConfig {
    /// Ordered metadata keys.
    pub fn metadata_keys(&self) -> Vec<String> {
        self.metadata.iter().map(|f| f.key.clone()).collect()
    }

    /// Check the config for values that would make every file fail.
    ///
    /// Key lists and table columns must be free of duplicates.
    pub fn validate(&self) -> Result<()> {
        if self.metadata.is_empty() {
            return Err(Csv2MdError::config("at least one [[metadata]] key is required"));
        }
        if self.dataset.columns.is_empty() {
            return Err(Csv2MdError::config("[dataset] columns must not be empty"));
        }
        if self.defaults.concurrency == 0 {
            return Err(Csv2MdError::config("[defaults] concurrency must be at least 1"));
        }

        let keys = self.metadata_keys();
        ensure_unique("metadata key", &keys)?;
        ensure_unique("dataset column", &self.dataset.columns)?;

        let columns: Vec<String> = self
            .metadata
            .iter()
            .filter_map(|f| f.table_column.clone())
            .collect();
        ensure_unique("table_column", &columns)?;

        if let Some(title_key) = &self.markdown.title_key {
            if !keys.contains(title_key) {
                return Err(Csv2MdError::config(format!(
                    "[markdown] title_key '{title_key}' is not a metadata key"
                )));
            }
        }

        Ok(())
    }
}

fn ensure_unique(what: &str, values: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value.as_str()) {
            return Err(Csv2MdError::config(format!("duplicate {what} '{value}'")));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Path of the config file in the current working directory.
pub fn config_file_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Load the application config from the working directory. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path();

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| Csv2MdError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        Csv2MdError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;

    tracing::debug!(
        ?path,
        metadata_keys = config.metadata.len(),
        dataset_columns = config.dataset.columns.len(),
        "config loaded"
    );
    Ok(config)
}

/// Write a default config file at `path`. Refuses to overwrite an existing file.
pub fn init_config(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Err(Csv2MdError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Csv2MdError::io(parent, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| Csv2MdError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| Csv2MdError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("csv2md-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().expect("default config validates");
        assert_eq!(config.metadata_keys()[0], "name");
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.concurrency, 4);
        assert_eq!(parsed.defaults.on_error, ErrorPolicy::Skip);
        assert_eq!(parsed.metadata.len(), config.metadata.len());
        assert_eq!(parsed.metadata[4].table_column, None);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[defaults]
concurrency = 2
on_error = "abort"

[[metadata]]
key = "name"
table_column = "Dataset"

[[metadata]]
key = "version"

[dataset]
columns = ["colX", "colY"]

[markdown]
index = "docs/index.md"
table_ordinal = 1
pages_dir = "docs/datasets"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        config.validate().expect("valid");
        assert_eq!(config.defaults.on_error, ErrorPolicy::Abort);
        assert_eq!(config.metadata_keys(), vec!["name", "version"]);
        assert_eq!(config.markdown.table_ordinal, 1);
        assert_eq!(config.markdown.title_key, None);
        assert_eq!(config.github.token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn duplicate_metadata_key_rejected() {
        let mut config = AppConfig::default();
        config.metadata.push(MetadataField {
            key: "name".into(),
            table_column: None,
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate metadata key 'name'"));
    }

    #[test]
    fn duplicate_dataset_column_rejected() {
        let mut config = AppConfig::default();
        config.dataset.columns = vec!["a".into(), "b".into(), "a".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_title_key_rejected() {
        let mut config = AppConfig::default();
        config.markdown.title_key = Some("missing".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("title_key"));
    }

    #[test]
    fn init_then_load() {
        let dir = temp_dir();
        let path = dir.join("nested").join(CONFIG_FILE_NAME);

        init_config(&path).expect("init");
        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded.dataset.columns, vec!["timestamp", "value"]);

        // Second init must not clobber the file.
        assert!(init_config(&path).is_err());
    }

    #[test]
    fn load_invalid_toml_is_config_error() {
        let dir = temp_dir();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[defaults\nconcurrency = ").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, Csv2MdError::Config { .. }));
    }
}
