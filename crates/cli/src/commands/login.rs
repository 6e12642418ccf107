//! Sign in and resolve the session.
//!
//! Wires a [`BackendClient`] to a [`SessionResolver`] the same way a UI
//! shell would, with a navigator that logs redirects instead of rendering.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clubhub_client::{
    AuthBackend, BackendClient, BackendError, ClientConfig, Navigator, SessionResolver,
};
use clubhub_core::{Email, EmailError, Route};
use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, warn};

/// Login command errors.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("password required (pass --password or set CLUBHUB_PASSWORD)")]
    MissingPassword,

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("session did not resolve within {0:?}")]
    Timeout(Duration),

    #[error("signed in, but no session could be resolved")]
    Unresolved,
}

/// How the login command behaves after resolution.
#[derive(Debug, Clone, Copy)]
pub struct LoginOptions {
    /// Revoke the session remotely instead of only dropping it locally.
    pub revoke: bool,
    /// Upper bound on waiting for the resolver to settle.
    pub wait: Duration,
}

/// Navigator for a terminal: remembers the last route and logs redirects.
#[derive(Debug, Default)]
struct ConsoleNavigator {
    current: Mutex<Option<Route>>,
}

impl ConsoleNavigator {
    fn current(&self) -> Option<Route> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for ConsoleNavigator {
    fn current_path(&self) -> Option<String> {
        self.current().map(|route| route.path().to_owned())
    }

    fn navigate(&self, route: Route) {
        info!(path = route.path(), "Navigated");
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(route);
    }
}

/// Sign in as `email`, wait for the resolver to settle and report the
/// resolved role and landing route.
///
/// # Errors
///
/// Returns `LoginError` if the input is invalid, sign-in fails, or the
/// session does not resolve in time.
pub async fn run(
    config: &ClientConfig,
    email: &str,
    password: Option<String>,
    options: LoginOptions,
) -> Result<(), LoginError> {
    let email = Email::parse(email)?;
    let password = SecretString::from(password.ok_or(LoginError::MissingPassword)?);

    let client = BackendClient::new(&config.backend)?;
    let navigator = Arc::new(ConsoleNavigator::default());
    let resolver = SessionResolver::new(
        Arc::new(client.clone()),
        navigator.clone(),
        config.role_retry_policy(),
    );

    let mut view = resolver.subscribe();
    let listener = resolver.start();

    client.sign_in_with_password(&email, &password).await?;

    let settled = tokio::time::timeout(options.wait, view.wait_for(|v| !v.loading)).await;
    let user = match settled {
        Ok(Ok(current)) => current.user.clone(),
        Ok(Err(_)) => None,
        Err(_) => {
            listener.abort();
            return Err(LoginError::Timeout(options.wait));
        }
    };

    let result = user.map_or(Err(LoginError::Unresolved), |user| {
        info!(
            user_id = %user.user_id,
            role = %user.role,
            landing = %user.landing_route(),
            navigated = navigator.current().is_some(),
            "Session resolved"
        );
        Ok(())
    });

    if options.revoke {
        if let Err(e) = client.sign_out().await {
            warn!(error = %e, "Session revoke failed, local session cleared");
        }
    } else {
        client.sign_out_local().await;
    }
    listener.abort();

    result
}
