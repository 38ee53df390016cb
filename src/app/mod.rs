//! Operations that the view layer dispatches.
//!
//! Each operation follows the same shape: dispatch a `Pending` action, call the server through
//! the `ApiClient`, then dispatch either the matching success action or a `Rejected` action that
//! carries the server's error payload. The caller gets the same error back.

mod auth;
mod finance;

pub use finance::DayView;

use crate::api::{self, ApiClient, Mode};
use crate::error::{ApiError, ErrorType, IntoResult, Res, Result};
use crate::store::{Action, AppState, Store};
use crate::Config;
use serde_json::Value;
use tracing::debug;

/// The client application: the state container plus the API client that feeds it.
#[derive(Clone)]
pub struct App {
    client: ApiClient,
}

impl App {
    /// Restores the session saved for `config` and connects to the server selected by `mode`.
    pub async fn new(config: &Config, mode: Mode) -> Result<Self> {
        Self::new_inner(config, mode).await.pub_result(ErrorType::Config)
    }

    async fn new_inner(config: &Config, mode: Mode) -> Res<Self> {
        let store = Store::load(config.session_path()).await?;
        let transport = api::transport(config, mode).await?;
        debug!("Using {mode:?} transport");
        Ok(Self::with_client(ApiClient::new(transport, store)))
    }

    pub fn with_client(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn store(&self) -> &Store {
        self.client.store()
    }

    /// A snapshot of the application state.
    pub async fn state(&self) -> AppState {
        self.store().state().await
    }

    /// Dispatches `rejected` with the error payload if `result` is an error, then hands `result`
    /// back.
    async fn settle<T, A>(&self, result: Res<T>, rejected: impl FnOnce(Value) -> A) -> Res<T>
    where
        A: Into<Action>,
    {
        if let Err(e) = &result {
            debug!("Operation failed: {e:#}");
            self.store().dispatch(rejected(rejection(e))).await?;
        }
        result
    }
}

/// The payload stored in the state when an operation fails: the server's error body when there
/// is one, otherwise the error message.
fn rejection(e: &anyhow::Error) -> Value {
    match e.chain().find_map(|cause| cause.downcast_ref::<ApiError>()) {
        Some(api) => api.payload().clone(),
        None => Value::String(format!("{e:#}")),
    }
}
