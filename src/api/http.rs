//! Implements the `Transport` trait with `reqwest`.

use crate::api::{ApiRequest, ApiResponse, Transport};
use crate::error::Res;
use anyhow::Context;
use reqwest::header::{HeaderValue, COOKIE, SET_COOKIE};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

const TIMEOUT: Duration = Duration::from_secs(30);

/// Sends requests to the server at `base` over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base: Url) -> Res<Self> {
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .user_agent(concat!("goalcrest/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Unable to create the HTTP client")?;
        Ok(Self {
            base: with_trailing_slash(base),
            client,
        })
    }

    fn url(&self, request: &ApiRequest) -> Res<Url> {
        let mut url = self
            .base
            .join(request.path().trim_start_matches('/'))
            .with_context(|| format!("Bad request path '{}'", request.path()))?;
        if !request.query_pairs().is_empty() {
            url.query_pairs_mut().extend_pairs(request.query_pairs());
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Res<ApiResponse> {
        let url = self.url(&request)?;
        debug!("{} {url}", request.method());

        let mut builder = self.client.request(request.method().clone(), url.clone());
        if let Some(token) = request.bearer() {
            builder = builder.bearer_auth(token.as_str());
        }
        if !request.cookies().is_empty() {
            let cookie = request
                .cookies()
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Unable to reach the server at {url}"))?;

        let status = response.status();
        let cookies: Vec<(String, String)> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(parse_set_cookie)
            .collect();
        let text = response
            .text()
            .await
            .with_context(|| format!("Unable to read the response body from {url}"))?;
        trace!("{status} {text}");

        let mut api_response = ApiResponse::new(status, parse_body(&text));
        for (name, value) in cookies {
            api_response = api_response.with_cookie(name, value);
        }
        Ok(api_response)
    }
}

/// `Url::join` replaces the last path segment unless the base ends with a slash.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Bodies that are not JSON, such as an HTML error page, are kept as a JSON string.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Takes the `name=value` pair from a `Set-Cookie` header, dropping its attributes. The refresh
/// cookie is kept in the session file between runs, so reqwest's in-memory cookie store is not
/// used.
fn parse_set_cookie(header: &HeaderValue) -> Option<(String, String)> {
    let s = header.to_str().ok()?;
    let pair = s.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    Some((name.trim().to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiRequest;
    use serde_json::json;

    #[test]
    fn test_url_building() {
        let transport = HttpTransport::new(Url::parse("http://localhost:8000/api").unwrap()).unwrap();
        let request = ApiRequest::get("/incomes/").query("date", "2024-05-01");
        assert_eq!(
            transport.url(&request).unwrap().as_str(),
            "http://localhost:8000/api/incomes/?date=2024-05-01"
        );
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body(r#"{"detail": "x"}"#), json!({"detail": "x"}));
        assert_eq!(parse_body("<h1>Server Error</h1>"), json!("<h1>Server Error</h1>"));
    }

    #[test]
    fn test_parse_set_cookie() {
        let header = HeaderValue::from_static("refresh=abc.def; HttpOnly; Path=/; SameSite=Lax");
        assert_eq!(
            parse_set_cookie(&header),
            Some(("refresh".to_string(), "abc.def".to_string()))
        );
        assert_eq!(parse_set_cookie(&HeaderValue::from_static("garbage")), None);
    }
}
