//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::TestServer;
use crate::model::Credentials;
use crate::{App, Config, Mode};
use tempfile::TempDir;

/// Test environment that sets up a goalcrest home directory with a Config. Apps created from it
/// talk to an in-memory server whose data is kept in the home directory, so every app created
/// from the same environment sees the same records and the same saved session.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("goalcrest");
        let config = Config::create(&root, "http://localhost:8000/")
            .await
            .unwrap();
        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// A new app, as if the program had been started again.
    pub async fn app(&self) -> App {
        App::new(&self.config, Mode::Testing).await.unwrap()
    }

    /// Logs in as the demo user and saves the session.
    pub async fn login(&self) {
        self.app()
            .await
            .login(&Credentials::new(
                TestServer::DEMO_EMAIL,
                TestServer::DEMO_PASSWORD,
            ))
            .await
            .unwrap();
    }
}
