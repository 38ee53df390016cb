use crate::api::{
    ApiClient, ApiRequest, ApiResponse, LOGIN, ME, REFRESH_COOKIE, RESET_PASSWORD, USERS,
};
use crate::error::Res;
use crate::model::{Credentials, Registration, User};
use crate::store::Token;
use anyhow::Context;
use serde::Deserialize;
use serde_json::json;

/// The credentials issued by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: Token,
    /// Servers that keep the refresh credential in an http-only cookie may not include it in
    /// the body.
    pub refresh: Option<Token>,
}

#[derive(Deserialize)]
struct TokenPairBody {
    access: Token,
    #[serde(default)]
    refresh: Option<Token>,
}

impl TokenPair {
    fn from_response(response: &ApiResponse) -> Res<Self> {
        let body: TokenPairBody = response.json()?;
        let refresh = body
            .refresh
            .or_else(|| response.cookie(REFRESH_COOKIE).map(Token::new));
        Ok(Self {
            access: body.access,
            refresh,
        })
    }
}

impl ApiClient {
    /// Exchanges `credentials` for a token pair. Does not touch the store.
    pub async fn login(&self, credentials: &Credentials) -> Res<TokenPair> {
        let request = ApiRequest::post(LOGIN).json(credentials)?;
        let response = self
            .send_public(request)
            .await
            .context("Login failed")?;
        TokenPair::from_response(&response)
    }

    /// Creates a new account and returns the created user.
    pub async fn register(&self, registration: &Registration) -> Res<User> {
        let request = ApiRequest::post(USERS).json(registration)?;
        let response = self
            .send_public(request)
            .await
            .context("Registration failed")?;
        response.json()
    }

    /// Fetches the signed-in user.
    pub async fn me(&self) -> Res<User> {
        let response = self
            .send(ApiRequest::get(ME))
            .await
            .context("Unable to fetch the current user")?;
        response.json()
    }

    /// Asks the server to email a password reset link to `email`.
    pub async fn reset_password(&self, email: &str) -> Res<()> {
        let request = ApiRequest::post(RESET_PASSWORD).json(&json!({ "email": email }))?;
        let _ = self
            .send_public(request)
            .await
            .context("Password reset request failed")?;
        Ok(())
    }
}
