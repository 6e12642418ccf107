//! Profile and role relations.
//!
//! A user's role is stored indirectly: `profiles.role_id` references
//! `roles.id`, and `roles.name` carries the role text. Both reads go through
//! the REST layer under the caller's access token, so row-level security
//! applies.

use clubhub_core::{RoleId, UserId};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::BackendError;
use super::client::Gateway;

const PROFILES_PATH: &str = "rest/v1/profiles";
const ROLES_PATH: &str = "rest/v1/roles";

/// Outcome of a role lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleLookup {
    /// Role name as stored in the role relation.
    Found(String),
    /// Profile exists but its role reference is null or dangling.
    Unassigned,
    /// Profile row is not visible (yet).
    ///
    /// Common right after sign-up, while backend-side triggers are still
    /// provisioning the profile.
    NotFound,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    role_id: Option<RoleId>,
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    name: Option<String>,
}

/// Look up a user's role name.
///
/// # Errors
///
/// Returns `BackendError` on transport failures, non-success statuses or
/// undecodable rows.
#[instrument(skip(gateway, access_token), fields(user_id = %user_id))]
pub(crate) async fn lookup_role(
    gateway: &Gateway,
    access_token: &SecretString,
    user_id: &UserId,
) -> Result<RoleLookup, BackendError> {
    let profiles: Vec<ProfileRow> = select(
        gateway,
        access_token,
        PROFILES_PATH,
        "role_id",
        user_id.as_str(),
    )
    .await?;

    let Some(profile) = profiles.into_iter().next() else {
        return Ok(RoleLookup::NotFound);
    };
    let Some(role_id) = profile.role_id else {
        return Ok(RoleLookup::Unassigned);
    };

    let roles: Vec<RoleRow> =
        select(gateway, access_token, ROLES_PATH, "name", role_id.as_str()).await?;

    Ok(roles
        .into_iter()
        .next()
        .and_then(|row| row.name)
        .map_or(RoleLookup::Unassigned, RoleLookup::Found))
}

/// `GET {path}?select={columns}&id=eq.{id}`
async fn select<T: DeserializeOwned>(
    gateway: &Gateway,
    access_token: &SecretString,
    path: &str,
    columns: &str,
    id: &str,
) -> Result<Vec<T>, BackendError> {
    let filter = format!("eq.{id}");
    let response = gateway
        .get(path)?
        .bearer_auth(access_token.expose_secret())
        .query(&[("select", columns), ("id", filter.as_str())])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(BackendError::Api {
            status: status.as_u16(),
            message: rest_error_message(&body),
        });
    }

    Ok(serde_json::from_str(&body)?)
}

/// Extract `message` from a REST error body, falling back to the raw text.
fn rest_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct RestError {
        message: String,
    }

    serde_json::from_str::<RestError>(body).map_or_else(|_| body.to_string(), |e| e.message)
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

    async fn mount_profiles(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("select", "role_id"))
            .and(query_param("id", "eq.u1"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    async fn mount_roles(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/roles"))
            .and(query_param("select", "name"))
            .and(query_param("id", "eq.r9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn lookup(server: &MockServer) -> Result<RoleLookup, BackendError> {
        lookup_role(
            &gateway(server),
            &SecretString::from("access"),
            &UserId::new("u1"),
        )
        .await
    }

    #[tokio::test]
    async fn test_lookup_found() {
        let server = MockServer::start().await;
        mount_profiles(
            &server,
            ResponseTemplate::new(200).set_body_json(json!([{ "role_id": "r9" }])),
        )
        .await;
        mount_roles(&server, json!([{ "name": "faculty" }])).await;

        assert_eq!(
            lookup(&server).await.unwrap(),
            RoleLookup::Found("faculty".to_string())
        );
    }

    #[tokio::test]
    async fn test_lookup_missing_profile_is_not_found() {
        let server = MockServer::start().await;
        mount_profiles(
            &server,
            ResponseTemplate::new(200).set_body_json(json!([])),
        )
        .await;

        assert_eq!(lookup(&server).await.unwrap(), RoleLookup::NotFound);
    }

    #[tokio::test]
    async fn test_lookup_null_role_is_unassigned() {
        let server = MockServer::start().await;
        mount_profiles(
            &server,
            ResponseTemplate::new(200).set_body_json(json!([{ "role_id": null }])),
        )
        .await;

        assert_eq!(lookup(&server).await.unwrap(), RoleLookup::Unassigned);
    }

    #[tokio::test]
    async fn test_lookup_dangling_role_is_unassigned() {
        let server = MockServer::start().await;
        mount_profiles(
            &server,
            ResponseTemplate::new(200).set_body_json(json!([{ "role_id": "r9" }])),
        )
        .await;
        mount_roles(&server, json!([])).await;

        assert_eq!(lookup(&server).await.unwrap(), RoleLookup::Unassigned);
    }

    #[tokio::test]
    async fn test_lookup_error_status_is_api_error() {
        let server = MockServer::start().await;
        mount_profiles(
            &server,
            ResponseTemplate::new(403).set_body_json(json!({
                "code": "42501",
                "message": "permission denied for table profiles"
            })),
        )
        .await;

        let err = lookup(&server).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Api { status: 403, ref message }
                if message == "permission denied for table profiles"
        ));
        assert!(!err.is_invalid_refresh_token());
    }

    #[test]
    fn test_profile_row_with_null_role() {
        let rows: Vec<ProfileRow> = serde_json::from_str(r#"[{"role_id": null}]"#).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].role_id.is_none());
    }

    #[test]
    fn test_profile_row_with_role() {
        let rows: Vec<ProfileRow> = serde_json::from_str(r#"[{"role_id": "r9"}]"#).unwrap();
        assert_eq!(rows[0].role_id, Some(RoleId::new("r9")));
    }

    #[test]
    fn test_rest_error_message() {
        assert_eq!(
            rest_error_message(
                r#"{"code":"42501","message":"permission denied for table profiles"}"#
            ),
            "permission denied for table profiles"
        );
        assert_eq!(rest_error_message("bad gateway"), "bad gateway");
    }
}
