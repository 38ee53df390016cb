use crate::app::App;
use crate::error::{ErrorType, IntoResult, Res, Result};
use crate::model::{Credentials, Registration, User};
use crate::store::{AuthAction, FinanceAction};
use tracing::{debug, info};

impl App {
    /// Exchanges `credentials` for a credential pair and stores it in the session.
    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        self.login_inner(credentials)
            .await
            .pub_result(ErrorType::Auth)
    }

    async fn login_inner(&self, credentials: &Credentials) -> Res<()> {
        self.store().dispatch(AuthAction::Pending).await?;
        let result = self.client().login(credentials).await;
        let pair = self.settle(result, AuthAction::Rejected).await?;
        self.store()
            .dispatch(AuthAction::LoggedIn {
                access: pair.access,
                refresh: pair.refresh,
            })
            .await?;
        info!("Logged in as {}", credentials.email);
        Ok(())
    }

    /// Creates an account and then logs in with it.
    pub async fn register(&self, registration: &Registration) -> Result<User> {
        self.register_inner(registration)
            .await
            .pub_result(ErrorType::Auth)
    }

    async fn register_inner(&self, registration: &Registration) -> Res<User> {
        self.store().dispatch(AuthAction::Pending).await?;
        let result = self.client().register(registration).await;
        let user = self.settle(result, AuthAction::Rejected).await?;
        self.store()
            .dispatch(AuthAction::Registered(user.clone()))
            .await?;
        debug!("Registered user {}", user.id);
        self.login_inner(&registration.credentials()).await?;
        Ok(user)
    }

    /// Forgets the session and everything cached for it.
    pub async fn logout(&self) -> Result<()> {
        self.logout_inner().await.pub_result(ErrorType::Internal)
    }

    async fn logout_inner(&self) -> Res<()> {
        self.store().dispatch(AuthAction::LoggedOut).await?;
        self.store().dispatch(FinanceAction::Reset).await?;
        Ok(())
    }

    /// Fetches the signed-in user and stores the profile in the session.
    pub async fn fetch_user_profile(&self) -> Result<User> {
        self.fetch_user_profile_inner()
            .await
            .pub_result(ErrorType::Request)
    }

    async fn fetch_user_profile_inner(&self) -> Res<User> {
        self.store().dispatch(AuthAction::Pending).await?;
        let result = self.client().me().await;
        let user = self.settle(result, AuthAction::Rejected).await?;
        self.store()
            .dispatch(AuthAction::ProfileLoaded(user.clone()))
            .await?;
        Ok(user)
    }

    /// Asks the server to send a password reset email to `email`.
    pub async fn reset_password(&self, email: &str) -> Result<()> {
        self.reset_password_inner(email)
            .await
            .pub_result(ErrorType::Request)
    }

    async fn reset_password_inner(&self, email: &str) -> Res<()> {
        self.store().dispatch(AuthAction::Pending).await?;
        let result = self.client().reset_password(email).await;
        self.settle(result, AuthAction::Rejected).await?;
        self.store()
            .dispatch(AuthAction::PasswordResetRequested)
            .await
    }

    /// Replaces the access credential using the refresh credential.
    pub async fn refresh(&self) -> Result<()> {
        self.client()
            .refresh_credential()
            .await
            .map(|_| ())
            .pub_result(ErrorType::Auth)
    }
}
