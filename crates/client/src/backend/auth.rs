//! Backend auth endpoints.
//!
//! Handles email/password sign-in, refresh-token exchange and remote
//! sign-out against the hosted auth subsystem.

use clubhub_core::{Email, UserId};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::client::Gateway;
use super::{BackendError, message_is_invalid_refresh};

const TOKEN_PATH: &str = "auth/v1/token";
const LOGOUT_PATH: &str = "auth/v1/logout";

/// Seconds before expiry at which a token is treated as expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// Tokens for an authenticated session.
#[derive(Debug, Clone)]
pub struct AuthToken {
    /// Access token for REST calls.
    pub access_token: SecretString,
    /// Refresh token for obtaining new access tokens.
    pub refresh_token: SecretString,
    /// Unix timestamp when the access token expires.
    pub expires_at: i64,
    /// User the tokens were issued to.
    pub user_id: UserId,
}

impl AuthToken {
    /// Check if the access token has expired (with a 60 second buffer).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_within(EXPIRY_BUFFER_SECS)
    }

    /// Check if the access token will expire within the given number of seconds.
    #[must_use]
    pub fn expires_within(&self, seconds: i64) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at - seconds
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
}

/// Error body of the auth subsystem. Older deployments use
/// `error`/`error_description`, newer ones `error_code`/`msg`.
#[derive(Deserialize, Default)]
struct AuthErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl AuthErrorResponse {
    fn message(self) -> String {
        self.msg
            .or(self.error_description)
            .or(self.error_code)
            .or(self.error)
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

impl TokenResponse {
    fn into_token(self, issued_at: i64) -> AuthToken {
        AuthToken {
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            expires_at: issued_at + self.expires_in,
            user_id: UserId::new(self.user.id),
        }
    }
}

/// Sign in with email and password.
///
/// # Errors
///
/// Returns `BackendError::AuthenticationFailed` if the credentials are
/// rejected, or a transport error.
#[instrument(skip(gateway, password), fields(email = %email))]
pub(crate) async fn sign_in_with_password(
    gateway: &Gateway,
    email: &Email,
    password: &SecretString,
) -> Result<AuthToken, BackendError> {
    let now = chrono::Utc::now().timestamp();

    let response = gateway
        .post(TOKEN_PATH)?
        .query(&[("grant_type", "password")])
        .json(&PasswordGrant {
            email: email.as_str(),
            password: password.expose_secret(),
        })
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        let body: TokenResponse = response.json().await?;
        return Ok(body.into_token(now));
    }

    let message = error_message(response).await;
    if status.is_client_error() {
        Err(BackendError::AuthenticationFailed(message))
    } else {
        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Exchange a refresh token for a fresh access token.
///
/// # Errors
///
/// Returns `BackendError::InvalidRefreshToken` if the refresh token was
/// rejected, or a transport error.
#[instrument(skip(gateway, refresh_token))]
pub(crate) async fn refresh_access_token(
    gateway: &Gateway,
    refresh_token: &SecretString,
) -> Result<AuthToken, BackendError> {
    let now = chrono::Utc::now().timestamp();

    let response = gateway
        .post(TOKEN_PATH)?
        .query(&[("grant_type", "refresh_token")])
        .json(&RefreshGrant {
            refresh_token: refresh_token.expose_secret(),
        })
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        let body: TokenResponse = response.json().await?;
        return Ok(body.into_token(now));
    }

    let message = error_message(response).await;
    if status.is_client_error() || message_is_invalid_refresh(&message) {
        Err(BackendError::InvalidRefreshToken(message))
    } else {
        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Revoke the session on the backend.
///
/// # Errors
///
/// Returns `BackendError::Api` if the backend rejects the request, or a
/// transport error.
#[instrument(skip(gateway, access_token))]
pub(crate) async fn logout(
    gateway: &Gateway,
    access_token: &SecretString,
) -> Result<(), BackendError> {
    let response = gateway
        .post(LOGOUT_PATH)?
        .bearer_auth(access_token.expose_secret())
        .send()
        .await?;

    let status = response.status();
    // 401/404 mean the session is already gone, which is what we wanted.
    if status.is_success()
        || status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::NOT_FOUND
    {
        return Ok(());
    }

    Err(BackendError::Api {
        status: status.as_u16(),
        message: error_message(response).await,
    })
}

async fn error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<AuthErrorResponse>(&text)
        .map(AuthErrorResponse::message)
        .unwrap_or_else(|_| {
            if text.is_empty() {
                "Unknown error".to_string()
            } else {
                text
            }
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::BackendConfig;

    fn gateway(server: &MockServer) -> Gateway {
        Gateway::new(&BackendConfig {
            url: Url::parse(&format!("{}/", server.uri())).unwrap(),
            anon_key: SecretString::from("anon-key"),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    async fn mount_grant(server: &MockServer, grant: &str, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", grant))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_refresh_rejected_with_client_error() {
        let server = MockServer::start().await;
        mount_grant(
            &server,
            "refresh_token",
            ResponseTemplate::new(400).set_body_json(json!({
                "error_code": "refresh_token_not_found",
                "msg": "Invalid Refresh Token: Refresh Token Not Found"
            })),
        )
        .await;

        let err = refresh_access_token(&gateway(&server), &SecretString::from("stale"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidRefreshToken(_)));
    }

    #[tokio::test]
    async fn test_refresh_server_error_is_api_error() {
        let server = MockServer::start().await;
        mount_grant(
            &server,
            "refresh_token",
            ResponseTemplate::new(503).set_body_string("upstream unavailable"),
        )
        .await;

        let err = refresh_access_token(&gateway(&server), &SecretString::from("r"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Api { status: 503, .. }));
        assert!(!err.is_invalid_refresh_token());
    }

    #[tokio::test]
    async fn test_password_grant_rejected() {
        let server = MockServer::start().await;
        mount_grant(
            &server,
            "password",
            ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })),
        )
        .await;

        let err = sign_in_with_password(
            &gateway(&server),
            &Email::parse("ada@campus.edu").unwrap(),
            &SecretString::from("wrong"),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            BackendError::AuthenticationFailed(ref m) if m == "Invalid login credentials"
        ));
    }

    #[tokio::test]
    async fn test_logout_tolerates_missing_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        logout(&gateway(&server), &SecretString::from("access"))
            .await
            .unwrap();
    }

    fn token(expires_at: i64) -> AuthToken {
        AuthToken {
            access_token: SecretString::from("access"),
            refresh_token: SecretString::from("refresh"),
            expires_at,
            user_id: UserId::new("u1"),
        }
    }

    #[test]
    fn test_token_is_expired() {
        let now = chrono::Utc::now().timestamp();

        assert!(token(now - 3600).is_expired());
        assert!(!token(now + 3600).is_expired());
        // Inside the 60 second buffer
        assert!(token(now + 30).is_expired());
    }

    #[test]
    fn test_token_response_into_token() {
        let body: TokenResponse = serde_json::from_str(
            r#"{
                "access_token": "a",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "r",
                "user": {"id": "u1", "email": "ada@campus.edu"}
            }"#,
        )
        .unwrap();

        let token = body.into_token(1_000);
        assert_eq!(token.expires_at, 4_600);
        assert_eq!(token.user_id, UserId::new("u1"));
        assert_eq!(token.refresh_token.expose_secret(), "r");
    }

    #[test]
    fn test_error_message_prefers_msg() {
        let body: AuthErrorResponse = serde_json::from_str(
            r#"{
                "code": 400,
                "error_code": "refresh_token_not_found",
                "msg": "Invalid Refresh Token: Refresh Token Not Found"
            }"#,
        )
        .unwrap();
        assert_eq!(
            body.message(),
            "Invalid Refresh Token: Refresh Token Not Found"
        );
    }

    #[test]
    fn test_error_message_legacy_shape() {
        let body: AuthErrorResponse = serde_json::from_str(
            r#"{"error": "invalid_grant", "error_description": "Invalid login credentials"}"#,
        )
        .unwrap();
        assert_eq!(body.message(), "Invalid login credentials");
        assert_eq!(AuthErrorResponse::default().message(), "Unknown error");
    }
}
