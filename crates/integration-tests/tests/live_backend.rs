//! Sign-in and role lookup against a real backend project.
//!
//! Ignored by default. Set `CLUBHUB_BACKEND_URL`, `CLUBHUB_ANON_KEY`,
//! `CLUBHUB_TEST_EMAIL` and `CLUBHUB_TEST_PASSWORD`, then run with
//! `--ignored`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use clubhub_client::session::NoopNavigator;
use clubhub_client::{AuthBackend, BackendClient, ClientConfig, SessionResolver};
use clubhub_core::Email;
use secrecy::SecretString;

struct LiveAccount {
    client: BackendClient,
    config: ClientConfig,
    email: Email,
    password: SecretString,
}

fn live_account() -> LiveAccount {
    let config = ClientConfig::from_env().expect("backend configuration");
    let email = std::env::var("CLUBHUB_TEST_EMAIL").expect("CLUBHUB_TEST_EMAIL not set");
    let password =
        std::env::var("CLUBHUB_TEST_PASSWORD").expect("CLUBHUB_TEST_PASSWORD not set");

    LiveAccount {
        client: BackendClient::new(&config.backend).expect("client"),
        email: Email::parse(&email).expect("valid test email"),
        password: SecretString::from(password),
        config,
    }
}

#[tokio::test]
#[ignore = "requires a live backend"]
async fn test_sign_in_and_lookup_role() {
    let account = live_account();

    let session = account
        .client
        .sign_in_with_password(&account.email, &account.password)
        .await
        .unwrap();

    let current = account.client.current_session().await.unwrap();
    assert_eq!(current.map(|s| s.user_id), Some(session.user_id.clone()));

    // Any well-formed answer is fine; the account may not be provisioned.
    account.client.lookup_role(&session.user_id).await.unwrap();

    account.client.sign_out().await.unwrap();
    assert!(account.client.current_session().await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a live backend"]
async fn test_refresh_keeps_user() {
    let account = live_account();

    let session = account
        .client
        .sign_in_with_password(&account.email, &account.password)
        .await
        .unwrap();
    let refreshed = account.client.refresh_session().await.unwrap();

    assert_eq!(refreshed.user_id, session.user_id);
    account.client.sign_out().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a live backend"]
async fn test_resolver_settles_after_sign_in() {
    let account = live_account();
    let resolver = SessionResolver::new(
        Arc::new(account.client.clone()),
        Arc::new(NoopNavigator),
        account.config.role_retry_policy(),
    );
    let mut view = resolver.subscribe();
    let listener = resolver.start();

    let session = account
        .client
        .sign_in_with_password(&account.email, &account.password)
        .await
        .unwrap();

    let settled = tokio::time::timeout(Duration::from_secs(30), view.wait_for(|v| !v.loading))
        .await
        .expect("resolver settled")
        .unwrap()
        .clone();
    assert_eq!(settled.user.map(|u| u.user_id), Some(session.user_id));

    account.client.sign_out_local().await;
    listener.abort();
}
