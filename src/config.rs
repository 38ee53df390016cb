//! Configuration file handling for goalcrest.
//!
//! The configuration file is stored at `$GOALCREST_HOME/config.json` and contains the URL of the
//! goalcrest API server along with the location of the persisted session file.

use crate::error::{ErrorType, IntoResult, Res, Result};
use crate::utils;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const APP_NAME: &str = "goalcrest";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const SESSION_JSON: &str = "session.json";
const CONFIG_JSON: &str = "config.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$GOALCREST_HOME` and from there it loads `$GOALCREST_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    api_url: Url,
}

impl Config {
    /// Creates the home directory, its subdirectories and an initial `config.json` pointing at
    /// `api_url`. An existing `config.json` is overwritten.
    ///
    /// # Errors
    /// - Returns an error if `api_url` is not a valid URL or if any file operation fails.
    pub async fn create(dir: impl Into<PathBuf>, api_url: &str) -> Result<Self> {
        Self::create_inner(dir.into(), api_url)
            .await
            .context("Unable to create the data directory and configs")
            .pub_result(ErrorType::Config)
    }

    async fn create_inner(dir: PathBuf, api_url: &str) -> Res<Self> {
        let api_url = parse_api_url(api_url)?;

        let maybe_relative = dir;
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the goalcrest home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            api_url: api_url.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            api_url,
        })
    }

    /// This will
    /// - validate that `goalcrest_home` and its config file exist
    /// - load and validate the config file
    /// - validate that the secrets directory exists
    pub async fn load(goalcrest_home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(goalcrest_home.into())
            .await
            .pub_result(ErrorType::Config)
    }

    async fn load_inner(goalcrest_home: PathBuf) -> Res<Self> {
        let maybe_relative = goalcrest_home;
        if !maybe_relative.is_dir() {
            bail!(
                "The goalcrest home directory '{}' is missing, run 'goalcrest init' first",
                maybe_relative.display()
            )
        }
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let api_url = parse_api_url(&config_file.api_url)
            .with_context(|| format!("Bad api_url in {}", config_path.display()))?;

        let config = Self {
            secrets: root.join(SECRETS),
            root,
            config_path,
            config_file,
            api_url,
        };
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    /// The base URL of the API server.
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Returns the stored `session_path` if it is absolute, otherwise resolves the relative path.
    pub fn session_path(&self) -> PathBuf {
        let p = self.config_file.session_path();
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "goalcrest",
///   "config_version": 1,
///   "api_url": "http://localhost:8000/",
///   "session_path": ".secrets/session.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "goalcrest"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Base URL of the goalcrest API server
    api_url: String,

    /// Path to the persisted session (optional, relative to `$GOALCREST_HOME` or absolute)
    /// Defaults to $GOALCREST_HOME/.secrets/session.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    session_path: Option<PathBuf>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            api_url: String::new(),
            session_path: None,
        }
    }
}

impl ConfigFile {
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version == CONFIG_VERSION,
            "Unsupported config_version {}, is a newer version of goalcrest available?",
            config.config_version
        );

        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    fn session_path(&self) -> PathBuf {
        self.session_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(SESSION_JSON))
    }
}

/// Parses the API base URL. Only http and https are accepted.
fn parse_api_url(s: &str) -> Res<Url> {
    let url = Url::parse(s).with_context(|| format!("Invalid API URL '{s}'"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("Unsupported URL scheme '{other}' in API URL '{s}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create_and_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("goalcrest_home");
        let created = Config::create(&home, "http://localhost:8000").await.unwrap();
        assert!(created.secrets().is_dir());
        assert!(created.config_path().is_file());

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(loaded.api_url().as_str(), "http://localhost:8000/");
        assert_eq!(
            loaded.session_path(),
            loaded.root().join(SECRETS).join(SESSION_JSON)
        );
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path().join("nope")).await.unwrap_err();
        assert!(err.to_string().contains("goalcrest init"));
    }

    #[tokio::test]
    async fn test_config_create_bad_url() {
        let dir = TempDir::new().unwrap();
        assert!(Config::create(dir.path(), "not a url").await.is_err());
        assert!(Config::create(dir.path(), "ftp://example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.json");
        let json = r#"{
            "app_name": "ledger",
            "config_version": 1,
            "api_url": "http://localhost:8000"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let result = ConfigFile::load(&config_path).await;
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_custom_session_path() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        Config::create(&home, "https://api.example.com").await.unwrap();
        let json = r#"{
            "app_name": "goalcrest",
            "config_version": 1,
            "api_url": "https://api.example.com",
            "session_path": "/tmp/elsewhere/session.json"
        }"#;
        utils::write(home.join(CONFIG_JSON), json).await.unwrap();
        let config = Config::load(&home).await.unwrap();
        assert_eq!(
            config.session_path(),
            PathBuf::from("/tmp/elsewhere/session.json")
        );
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let config = ConfigFile {
            api_url: "http://localhost:8000".to_string(),
            ..ConfigFile::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("session_path"));
        assert!(json.contains("\"app_name\":\"goalcrest\""));
    }
}
