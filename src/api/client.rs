//! The authenticated API client.
//!
//! Requests made with `ApiClient::send` carry the store's current access credential. When the
//! server answers `401 Unauthorized` the client:
//! 1. dispatches `RefreshStarted`, moving the session to `ExpiredPendingRefresh`
//! 2. asks its `CredentialRefresher` for a new access credential, exactly once
//! 3. on success dispatches `TokenReceived`, so every later request uses the new credential,
//!    and retries the original request once with it
//! 4. on failure dispatches `RefreshFailed`, moving the session to `Anonymous`, and returns the
//!    original error
//!
//! The retried request is never refreshed again; its failure goes straight to the caller. A
//! `403 Forbidden` means the credential is valid but lacks permission, so it is not refreshed.
//! When another request refreshed the credential while this one was in flight, the new
//! credential is used for the retry without refreshing again.

use crate::api::{ApiRequest, ApiResponse, Transport, REFRESH, REFRESH_COOKIE};
use crate::error::Res;
use crate::store::{AuthAction, Store, Token};
use anyhow::{bail, Context};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Exchanges the refresh credential for a new access credential.
#[async_trait::async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self, refresh: Option<Token>) -> Res<Token>;
}

/// Refreshes by posting to the refresh endpoint with the refresh credential in a cookie.
pub struct CookieRefresher {
    transport: Arc<dyn Transport>,
}

impl CookieRefresher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: Token,
}

#[async_trait::async_trait]
impl CredentialRefresher for CookieRefresher {
    async fn refresh(&self, refresh: Option<Token>) -> Res<Token> {
        let Some(refresh) = refresh else {
            bail!("There is no refresh credential, please log in again")
        };
        let request = ApiRequest::post(REFRESH)
            .cookie(REFRESH_COOKIE, refresh.as_str())
            .json(&serde_json::json!({ "refresh": refresh }))?;
        let response = self
            .transport
            .send(request)
            .await?
            .error_for_status()
            .context("The server refused to refresh the credential")?;
        let body: RefreshResponse = response.json()?;
        Ok(body.access)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    refresher: Arc<dyn CredentialRefresher>,
    store: Store,
}

impl ApiClient {
    /// Creates a client that refreshes with a `CookieRefresher` over the same transport.
    pub fn new(transport: Arc<dyn Transport>, store: Store) -> Self {
        let refresher = Arc::new(CookieRefresher::new(transport.clone()));
        Self::with_refresher(transport, refresher, store)
    }

    pub fn with_refresher(
        transport: Arc<dyn Transport>,
        refresher: Arc<dyn CredentialRefresher>,
        store: Store,
    ) -> Self {
        Self {
            transport,
            refresher,
            store,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Exchanges the refresh credential for a new access credential and stores it. On failure
    /// the session becomes anonymous.
    pub async fn refresh_credential(&self) -> Res<Token> {
        self.store.dispatch(AuthAction::RefreshStarted).await?;
        let refresh = self.store.refresh_token().await;
        match self.refresher.refresh(refresh).await {
            Ok(access) => {
                self.store
                    .dispatch(AuthAction::TokenReceived(access.clone()))
                    .await?;
                Ok(access)
            }
            Err(e) => {
                warn!("Unable to refresh the credential: {e:#}");
                self.store.dispatch(AuthAction::RefreshFailed).await?;
                Err(e)
            }
        }
    }

    /// Sends `request` without credentials and without refresh handling. Error statuses become
    /// `ApiError`s.
    pub async fn send_public(&self, request: ApiRequest) -> Res<ApiResponse> {
        self.transport.send(request).await?.error_for_status()
    }

    /// Sends `request` with the current access credential, refreshing once if the server says
    /// the credential is not valid. Error statuses become `ApiError`s.
    pub async fn send(&self, request: ApiRequest) -> Res<ApiResponse> {
        let access = self.store.access_token().await;
        let first = self
            .transport
            .send(request.clone().with_bearer(access.clone()))
            .await?;
        if first.status() != StatusCode::UNAUTHORIZED {
            return first.error_for_status();
        }

        let current = self.store.access_token().await;
        if current.is_some() && current != access {
            debug!(
                "{} {} was unauthorized, retrying with the credential refreshed meanwhile",
                request.method(),
                request.path()
            );
            return self
                .transport
                .send(request.with_bearer(current))
                .await?
                .error_for_status();
        }

        debug!(
            "{} {} was unauthorized, refreshing the credential",
            request.method(),
            request.path()
        );
        let Ok(access) = self.refresh_credential().await else {
            return first.error_for_status();
        };

        self.transport
            .send(request.with_bearer(Some(access)))
            .await?
            .error_for_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestServer;
    use crate::error::ApiError;
    use crate::model::Credentials;
    use crate::store::{AppState, AuthPhase};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Hands out fixed tokens and counts how often it was asked.
    struct CountingRefresher {
        calls: AtomicUsize,
        result: Option<Token>,
    }

    impl CountingRefresher {
        fn new(result: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result: result.map(Token::new),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CredentialRefresher for CountingRefresher {
        async fn refresh(&self, _refresh: Option<Token>) -> Res<Token> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Some(token) => Ok(token.clone()),
                None => bail!("refresh refused"),
            }
        }
    }

    /// Logs in the demo user against `server` and returns a client using `server`'s refresher.
    async fn logged_in(server: &Arc<TestServer>) -> ApiClient {
        let store = Store::new(AppState::default());
        let client = ApiClient::new(server.clone(), store);
        let pair = client
            .login(&Credentials::new(TestServer::DEMO_EMAIL, TestServer::DEMO_PASSWORD))
            .await
            .unwrap();
        client
            .store()
            .dispatch(AuthAction::LoggedIn {
                access: pair.access,
                refresh: pair.refresh,
            })
            .await
            .unwrap();
        client
    }

    fn status_of(e: &anyhow::Error) -> StatusCode {
        e.downcast_ref::<ApiError>().unwrap().status()
    }

    #[tokio::test]
    async fn test_valid_credential_no_refresh() {
        let server = Arc::new(TestServer::new());
        let client = logged_in(&server).await;
        let _ = client.send(ApiRequest::get("incomes/")).await.unwrap();
        assert_eq!(server.refresh_count(), 0);
        assert_eq!(server.request_count("GET", "incomes/"), 1);
    }

    #[tokio::test]
    async fn test_expired_credential_refreshes_once_and_retries_once() {
        let server = Arc::new(TestServer::new());
        let client = logged_in(&server).await;
        let old = client.store().access_token().await.unwrap();
        server.expire_access_tokens();

        let response = client.send(ApiRequest::get("incomes/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(server.refresh_count(), 1);
        assert_eq!(server.request_count("GET", "incomes/"), 2);

        // the shared session now holds the new credential
        let new = client.store().access_token().await.unwrap();
        assert_ne!(old, new);
        let state = client.store().state().await;
        assert_eq!(state.session().phase(), AuthPhase::Authenticated);

        // and later requests use it without refreshing
        let _ = client.send(ApiRequest::get("categories/")).await.unwrap();
        assert_eq!(server.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_not_refreshed() {
        let server = Arc::new(TestServer::new());
        let store = Store::new(AppState::default());
        // hands out a credential that the server does not know
        let refresher = CountingRefresher::new(Some("bogus"));
        let client = ApiClient::with_refresher(server.clone(), refresher.clone(), store);

        let err = client.send(ApiRequest::get("incomes/")).await.unwrap_err();
        assert_eq!(status_of(&err), StatusCode::UNAUTHORIZED);
        assert_eq!(refresher.calls(), 1);
        assert_eq!(server.request_count("GET", "incomes/"), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_goes_anonymous() {
        let server = Arc::new(TestServer::new());
        let client = logged_in(&server).await;
        server.expire_access_tokens();
        server.revoke_refresh_tokens();

        let err = client.send(ApiRequest::get("incomes/")).await.unwrap_err();
        assert_eq!(status_of(&err), StatusCode::UNAUTHORIZED);
        assert_eq!(server.refresh_count(), 1);
        assert_eq!(server.request_count("GET", "incomes/"), 1);

        let state = client.store().state().await;
        assert_eq!(state.session().phase(), AuthPhase::Anonymous);
        assert!(!state.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_other_errors_are_not_refreshed() {
        let server = Arc::new(TestServer::new());
        let refresher = CountingRefresher::new(Some("unused"));
        let client = logged_in(&server).await;
        let client = ApiClient::with_refresher(server.clone(), refresher.clone(), client.store().clone());
        let err = client
            .send(ApiRequest::get("incomes/999/"))
            .await
            .unwrap_err();
        assert_eq!(status_of(&err), StatusCode::NOT_FOUND);
        assert_eq!(refresher.calls(), 0);
    }

    /// Answers every request with `status` and remembers the bearer it was sent.
    struct FixedStatus {
        status: StatusCode,
        bearers: Mutex<Vec<Option<Token>>>,
    }

    #[async_trait::async_trait]
    impl Transport for FixedStatus {
        async fn send(&self, request: ApiRequest) -> Res<ApiResponse> {
            self.bearers.lock().unwrap().push(request.bearer().cloned());
            Ok(ApiResponse::new(
                self.status,
                json!({"detail": "You do not have permission to perform this action."}),
            ))
        }
    }

    #[tokio::test]
    async fn test_forbidden_is_not_refreshed() {
        let transport = Arc::new(FixedStatus {
            status: StatusCode::FORBIDDEN,
            bearers: Mutex::new(Vec::new()),
        });
        let store = Store::new(AppState::default());
        store
            .dispatch(AuthAction::LoggedIn {
                access: Token::new("access"),
                refresh: Some(Token::new("refresh")),
            })
            .await
            .unwrap();
        let refresher = CountingRefresher::new(None);
        let client = ApiClient::with_refresher(transport.clone(), refresher.clone(), store);

        let err = client.send(ApiRequest::get("incomes/")).await.unwrap_err();
        assert_eq!(status_of(&err), StatusCode::FORBIDDEN);
        assert_eq!(refresher.calls(), 0);
        assert_eq!(transport.bearers.lock().unwrap().len(), 1);

        let state = client.store().state().await;
        assert_eq!(state.session().phase(), AuthPhase::Authenticated);
        assert!(state.session().is_authenticated());
    }

    /// Rejects `stale` and, while doing so, stores `fresh` as if a concurrent request had just
    /// refreshed. Any other credential is accepted.
    struct RefreshedMeanwhile {
        store: Store,
        stale: Token,
        fresh: Token,
        bearers: Mutex<Vec<Option<Token>>>,
    }

    #[async_trait::async_trait]
    impl Transport for RefreshedMeanwhile {
        async fn send(&self, request: ApiRequest) -> Res<ApiResponse> {
            let bearer = request.bearer().cloned();
            self.bearers.lock().unwrap().push(bearer.clone());
            if bearer.as_ref() == Some(&self.stale) {
                self.store
                    .dispatch(AuthAction::TokenReceived(self.fresh.clone()))
                    .await?;
                return Ok(ApiResponse::new(
                    StatusCode::UNAUTHORIZED,
                    json!({"detail": "Given token not valid for any token type"}),
                ));
            }
            Ok(ApiResponse::new(StatusCode::OK, json!([])))
        }
    }

    #[tokio::test]
    async fn test_credential_refreshed_meanwhile_is_reused() {
        let store = Store::new(AppState::default());
        store
            .dispatch(AuthAction::LoggedIn {
                access: Token::new("stale"),
                refresh: Some(Token::new("refresh")),
            })
            .await
            .unwrap();
        let transport = Arc::new(RefreshedMeanwhile {
            store: store.clone(),
            stale: Token::new("stale"),
            fresh: Token::new("fresh"),
            bearers: Mutex::new(Vec::new()),
        });
        let refresher = CountingRefresher::new(Some("unused"));
        let client = ApiClient::with_refresher(transport.clone(), refresher.clone(), store);

        let response = client.send(ApiRequest::get("incomes/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(refresher.calls(), 0);
        assert_eq!(
            *transport.bearers.lock().unwrap(),
            vec![Some(Token::new("stale")), Some(Token::new("fresh"))]
        );
    }

    #[tokio::test]
    async fn test_cookie_refresher_without_refresh_credential() {
        let server: Arc<dyn Transport> = Arc::new(TestServer::new());
        let refresher = CookieRefresher::new(server);
        assert!(refresher.refresh(None).await.is_err());
    }
}
