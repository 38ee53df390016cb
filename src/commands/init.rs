use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the data directory, its subdirectories and an initial `config.json` file pointing at
/// `api_url`.
///
/// # Arguments
/// - `goalcrest_home` - The directory that will be the root of the data directory, e.g.
///   `$HOME/goalcrest`
/// - `api_url` - The base URL of the goalcrest API server, e.g. `http://localhost:8000/`
///
/// # Errors
/// - Returns an error if `api_url` is not an http(s) URL or if any file operations fail.
pub async fn init(goalcrest_home: &Path, api_url: &str) -> Result<Out<()>> {
    let config = Config::create(goalcrest_home, api_url).await?;
    Ok(format!(
        "Successfully created the goalcrest directory at {} for {}",
        config.root().display(),
        config.api_url()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorType;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("goalcrest");
        let out = init(&home, "https://goalcrest.example.com/api/").await.unwrap();
        assert!(out.message().contains("Successfully created"));
        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.api_url().as_str(), "https://goalcrest.example.com/api/");
    }

    #[tokio::test]
    async fn test_init_bad_url() {
        let dir = TempDir::new().unwrap();
        let err = init(dir.path(), "localhost").await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }
}
