//! Session command handlers.
//!
//! This module implements the CLI commands for:
//! - `goalcrest login` and `goalcrest register`, which start a session
//! - `goalcrest logout`, which forgets it
//! - `goalcrest whoami` and `goalcrest refresh`, which use it

use crate::app::App;
use crate::args::{LoginArgs, RegisterArgs, ResetPasswordArgs};
use crate::commands::Out;
use crate::model::{Credentials, Registration, User};
use crate::{Config, Mode, Result};

/// Handles `goalcrest login`.
pub async fn login(config: Config, mode: Mode, args: &LoginArgs) -> Result<Out<User>> {
    let app = App::new(&config, mode).await?;
    app.login(&Credentials::new(args.email(), args.password()))
        .await?;
    let user = app.fetch_user_profile().await?;
    Ok(Out::new(greeting("Logged in as", &user), user))
}

/// Handles `goalcrest register`. The new account is logged in right away.
pub async fn register(config: Config, mode: Mode, args: &RegisterArgs) -> Result<Out<User>> {
    let app = App::new(&config, mode).await?;
    let registration = Registration::new(
        args.first_name(),
        args.last_name(),
        args.email(),
        args.password(),
    );
    let user = app.register(&registration).await?;
    Ok(Out::new(greeting("Registered and logged in as", &user), user))
}

/// Handles `goalcrest logout`.
pub async fn logout(config: Config, mode: Mode) -> Result<Out<()>> {
    let app = App::new(&config, mode).await?;
    app.logout().await?;
    Ok("Logged out".into())
}

/// Handles `goalcrest whoami`. Not being logged in is not an error.
pub async fn whoami(config: Config, mode: Mode) -> Result<Out<User>> {
    let app = App::new(&config, mode).await?;
    if !app.state().await.session().is_authenticated() {
        return Ok("You are not logged in, run 'goalcrest login'".into());
    }
    let user = app.fetch_user_profile().await?;
    Ok(Out::new(greeting("Logged in as", &user), user))
}

/// Handles `goalcrest reset-password`.
pub async fn reset_password(
    config: Config,
    mode: Mode,
    args: &ResetPasswordArgs,
) -> Result<Out<()>> {
    let app = App::new(&config, mode).await?;
    app.reset_password(args.email()).await?;
    Ok(format!(
        "If {} belongs to an account, a password reset email is on its way",
        args.email()
    )
    .into())
}

/// Handles `goalcrest refresh`.
pub async fn refresh(config: Config, mode: Mode) -> Result<Out<()>> {
    let app = App::new(&config, mode).await?;
    app.refresh().await?;
    Ok("The session was refreshed".into())
}

fn greeting(prefix: &str, user: &User) -> String {
    let name = user.full_name();
    if name.is_empty() {
        format!("{prefix} {}", user.email)
    } else {
        format!("{prefix} {name} <{}>", user.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestServer;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_login_whoami_logout() {
        let env = TestEnv::new().await;
        let out = whoami(env.config(), Mode::Testing).await.unwrap();
        assert!(out.message().contains("not logged in"));
        assert!(out.structure().is_none());

        let args = LoginArgs::new(TestServer::DEMO_EMAIL, TestServer::DEMO_PASSWORD);
        let out = login(env.config(), Mode::Testing, &args).await.unwrap();
        assert_eq!(
            out.message(),
            "Logged in as Demo User <demo@goalcrest.app>"
        );

        let out = whoami(env.config(), Mode::Testing).await.unwrap();
        assert_eq!(out.structure().unwrap().email, TestServer::DEMO_EMAIL);

        let _ = refresh(env.config(), Mode::Testing).await.unwrap();
        let _ = logout(env.config(), Mode::Testing).await.unwrap();
        let out = whoami(env.config(), Mode::Testing).await.unwrap();
        assert!(out.message().contains("not logged in"));
    }

    #[tokio::test]
    async fn test_register() {
        let env = TestEnv::new().await;
        let args = RegisterArgs::new("Ada", "Lovelace", "ada@example.com", "analytical");
        let out = register(env.config(), Mode::Testing, &args).await.unwrap();
        assert!(out.message().starts_with("Registered and logged in as Ada Lovelace"));
        let out = whoami(env.config(), Mode::Testing).await.unwrap();
        assert_eq!(out.structure().unwrap().email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let env = TestEnv::new().await;
        let args = LoginArgs::new(TestServer::DEMO_EMAIL, "wrong-password");
        let err = login(env.config(), Mode::Testing, &args).await.unwrap_err();
        assert_eq!(err.error_type(), crate::ErrorType::Auth);
    }
}
