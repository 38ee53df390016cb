//! Talking to the goalcrest API server.
//!
//! A `Transport` moves one `ApiRequest` to the server and brings back one `ApiResponse`. There
//! are two transports: `HttpTransport`, which uses `reqwest`, and `TestServer`, an in-memory
//! stand-in for the real server. On top of a transport, `ApiClient` attaches credentials and
//! handles credential refresh.

mod auth;
mod client;
mod finance;
mod http;
mod test_server;

pub use client::{ApiClient, CookieRefresher, CredentialRefresher};
pub use http::HttpTransport;
pub use test_server::TestServer;

use crate::error::{ApiError, Res};
use crate::store::Token;
use crate::Config;
use anyhow::Context;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub(crate) const LOGIN: &str = "auth/jwt/create/";
pub(crate) const REFRESH: &str = "auth/jwt/refresh/";
pub(crate) const USERS: &str = "auth/users/";
pub(crate) const ME: &str = "auth/users/me/";
pub(crate) const RESET_PASSWORD: &str = "auth/users/reset_password/";
pub(crate) const CATEGORIES: &str = "categories/";

/// The name of the cookie that carries the refresh credential.
pub(crate) const REFRESH_COOKIE: &str = "refresh";

/// The environment variable that switches the program to the in-memory server.
const TEST_MODE_ENV: &str = "GOALCREST_IN_TEST_MODE";

/// Whether to talk to a real server or the in-memory one.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Http,
    Testing,
}

impl Mode {
    /// `Mode::Testing` when `GOALCREST_IN_TEST_MODE` is set and non-empty, `Mode::Http`
    /// otherwise.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(v) if !v.is_empty() => Mode::Testing,
            _ => Mode::Http,
        }
    }
}

/// Creates the transport for `mode`. In testing mode the in-memory server keeps its data in a
/// file next to the config so that consecutive runs of the program see the same data.
pub async fn transport(config: &Config, mode: Mode) -> Res<Arc<dyn Transport>> {
    Ok(match mode {
        Mode::Http => Arc::new(HttpTransport::new(config.api_url().clone())?),
        Mode::Testing => {
            let path = config.root().join(".test_server.json");
            Arc::new(TestServer::persistent(path).await?)
        }
    })
}

/// Sends requests to the server.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request`. An `Err` means the exchange itself failed (e.g. the server could not be
    /// reached). Error statuses are returned as `Ok` responses.
    async fn send(&self, request: ApiRequest) -> Res<ApiResponse>;
}

/// A request, relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    bearer: Option<Token>,
    cookies: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
            cookies: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: &impl Serialize) -> Res<Self> {
        self.body = Some(serde_json::to_value(body).context("Unable to serialize request body")?);
        Ok(self)
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Returns the request with `token` as its bearer credential, replacing any previous one.
    pub fn with_bearer(mut self, token: Option<Token>) -> Self {
        self.bearer = token;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn bearer(&self) -> Option<&Token> {
        self.bearer.as_ref()
    }

    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn cookie_value(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A response. The body is `Value::Null` when the server sent none.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    status: StatusCode,
    body: Value,
    cookies: Vec<(String, String)>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            cookies: Vec::new(),
        }
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Turns an error status into an `ApiError` carrying the body.
    pub fn error_for_status(self) -> Res<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ApiError::new(self.status, self.body).into())
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Res<T> {
        serde_json::from_value(self.body.clone())
            .with_context(|| format!("Unexpected response body from the server: {}", self.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_for_status_keeps_payload() {
        let response = ApiResponse::new(StatusCode::BAD_REQUEST, json!({"amount": ["required"]}));
        let err = response.error_for_status().unwrap_err();
        let api = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.payload(), &json!({"amount": ["required"]}));
    }

    #[test]
    fn test_request_builders() {
        let request = ApiRequest::get("incomes/")
            .query("date", "2024-05-01")
            .cookie(REFRESH_COOKIE, "r1")
            .with_bearer(Some(Token::new("a1")));
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.query_value("date"), Some("2024-05-01"));
        assert_eq!(request.cookie_value(REFRESH_COOKIE), Some("r1"));
        assert_eq!(request.bearer().unwrap().as_str(), "a1");
        assert!(request.body().is_none());
    }

    #[test]
    fn test_mode_default() {
        assert_eq!(Mode::default(), Mode::Http);
    }
}
