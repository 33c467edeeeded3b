//! Configuration parsing and validation.
//!
//! ChatDB is configured through a TOML file (default `./config/chatdb.toml`):
//!
//! ```toml
//! [relational]
//! data_dir = "./data/sql"
//!
//! [document]
//! data_dir = "./data/docs"
//!
//! [generation]
//! provider = "openai"       # disabled | openai | gemini
//! model = "gpt-4o-mini"
//! timeout_secs = 60
//! temperature = 0.0
//! # base_url = "http://localhost:8080"
//! ```
//!
//! Every section is optional. Credentials are never read from this file;
//! network providers take their API key from the environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use chatdb_core::StoreKind;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub relational: StoreConfig,
    #[serde(default = "default_document_store")]
    pub document: StoreConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relational: StoreConfig::default(),
            document: default_document_store(),
            generation: GenerationConfig::default(),
        }
    }
}

/// Where the databases of one store kind live.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/sql"),
        }
    }
}

fn default_document_store() -> StoreConfig {
    StoreConfig {
        data_dir: PathBuf::from("./data/docs"),
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            timeout_secs: 60,
            base_url: None,
            temperature: 0.0,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// A configuration rooted at `dir`: `dir/sql` and `dir/docs`, generation disabled.
    pub fn minimal(dir: &Path) -> Self {
        Self {
            relational: StoreConfig {
                data_dir: dir.join("sql"),
            },
            document: StoreConfig {
                data_dir: dir.join("docs"),
            },
            generation: GenerationConfig::default(),
        }
    }

    pub fn store(&self, kind: StoreKind) -> &StoreConfig {
        match kind {
            StoreKind::Relational => &self.relational,
            StoreKind::Document => &self.document,
        }
    }

    /// File backing database `name` of the given store kind.
    pub fn database_path(&self, kind: StoreKind, name: &str) -> PathBuf {
        self.store(kind).data_dir.join(format!("{}.sqlite", name))
    }
}

/// Database names become file names, so keep them to a safe alphabet.
pub fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!("database name must not be empty");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        anyhow::bail!(
            "invalid database name '{}': use letters, digits, '_' or '-'",
            name
        );
    }
    Ok(())
}

pub fn validate_config(config: &Config) -> Result<()> {
    match config.generation.provider.as_str() {
        "disabled" | "openai" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, or gemini.",
            other
        ),
    }

    if config.generation.is_enabled() && config.generation.model.is_none() {
        anyhow::bail!(
            "generation.model must be specified when provider is '{}'",
            config.generation.provider
        );
    }

    if config.generation.timeout_secs == 0 {
        anyhow::bail!("generation.timeout_secs must be > 0");
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text)?;
        validate_config(&config)?;
        Ok(config)
    }

    #[test]
    fn test_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.relational.data_dir, PathBuf::from("./data/sql"));
        assert_eq!(config.document.data_dir, PathBuf::from("./data/docs"));
        assert!(!config.generation.is_enabled());
        assert_eq!(config.generation.timeout_secs, 60);
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            [relational]
            data_dir = "/tmp/sql"

            [document]
            data_dir = "/tmp/docs"

            [generation]
            provider = "gemini"
            model = "gemini-1.5-flash"
            timeout_secs = 10
            temperature = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(
            config.database_path(StoreKind::Document, "clinic"),
            PathBuf::from("/tmp/docs/clinic.sqlite")
        );
        assert_eq!(config.generation.model.as_deref(), Some("gemini-1.5-flash"));
    }

    #[test]
    fn test_rejections() {
        for text in [
            "[generation]\nprovider = \"claude-local\"\n",
            "[generation]\nprovider = \"openai\"\n",
            "[generation]\ntimeout_secs = 0\n",
            "[generation]\ntemperature = 3.5\n",
        ] {
            assert!(parse(text).is_err(), "accepted: {}", text);
        }
    }

    #[test]
    fn test_database_names() {
        assert!(validate_database_name("clinic_2024").is_ok());
        assert!(validate_database_name("").is_err());
        assert!(validate_database_name("../etc").is_err());
        assert!(validate_database_name("a b").is_err());
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Path::new("/nonexistent/chatdb.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/chatdb.toml"));
    }
}
