#![cfg(feature = "reqwest")]

//! End-to-end refresh flows against a mock token endpoint.

// crates.io
use httpmock::prelude::*;
// self
use oauth2_custodian::{
	_preludet::*,
	auth::{CredentialRecord, CredentialRole, Provider, RecordId},
	custody::CustodySettings,
	error::ConfigError,
	provider::{ClientAuthMethod, OAuthApp, ProviderRegistry},
	store::{CredentialStore, MemoryStore},
};

const CLIENT_ID: &str = "client-custody";
const CLIENT_SECRET: &str = "secret-custody";

fn record_id(value: &str) -> RecordId {
	value.parse().expect("Record identifier fixture should parse.")
}

fn registry_for(server: &MockServer) -> ProviderRegistry {
	let app = OAuthApp::builder(Provider::GitHub)
		.token_endpoint(Url::parse(&server.url("/token")).expect("Mock endpoint should parse."))
		.client_id(CLIENT_ID)
		.client_secret(CLIENT_SECRET)
		.auth_method(ClientAuthMethod::ClientSecretPost)
		.build()
		.expect("OAuth app fixture should build.");

	ProviderRegistry::new().with_app(app)
}

async fn seed_record(
	store: &MemoryStore,
	id: &RecordId,
	access: &str,
	refresh: &str,
	expires_in: Duration,
) {
	let record = CredentialRecord::builder(id.clone(), Provider::GitHub, CredentialRole::Owner)
		.username("alice")
		.provider_user_id("1001")
		.access_token(access)
		.refresh_token(refresh)
		.expires_at(OffsetDateTime::now_utc() + expires_in)
		.build()
		.expect("Credential record fixture should build.");

	store.save(record).await.expect("Seeding the record should succeed.");
}

#[tokio::test]
async fn expired_record_is_refreshed_rotated_and_unlocked() {
	let server = MockServer::start_async().await;
	let (custodian, store) =
		build_reqwest_test_custodian(registry_for(&server), CustodySettings::default());
	let id = record_id("github:alice");

	seed_record(&store, &id, "token-a1", "token-r1", Duration::minutes(-2)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"token-a2\",\"refresh_token\":\"token-r2\",\"token_type\":\"bearer\",\"expires_in\":7200}",
			);
		})
		.await;

	let credential = custodian
		.ensure_fresh_credential(&id)
		.await
		.expect("Refreshing an expired credential should succeed.");

	mock.assert_async().await;

	assert_eq!(credential.access_token.expose(), "token-a2");
	assert!(credential.expires_at > OffsetDateTime::now_utc() + Duration::minutes(60));

	let stored = store
		.fetch(&id)
		.await
		.expect("Fetch should succeed.")
		.expect("Record should remain present after the refresh.");

	assert_eq!(stored.access_token.expose(), "token-a2");
	assert_eq!(stored.refresh_token.expose(), "token-r2");
	assert!(stored.lock.is_none());
	assert_eq!(custodian.metrics.refreshes(), 1);
}

#[tokio::test]
async fn fresh_tokens_are_reused_without_a_provider_call() {
	let server = MockServer::start_async().await;
	let (custodian, store) =
		build_reqwest_test_custodian(registry_for(&server), CustodySettings::default());
	let id = record_id("github:fresh");

	seed_record(&store, &id, "token-a1", "token-r1", Duration::hours(1)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"token-a2\",\"token_type\":\"bearer\",\"expires_in\":7200}",
			);
		})
		.await;

	let credential = custodian
		.ensure_fresh_credential(&id)
		.await
		.expect("A fresh credential should be served from the store.");

	mock.assert_calls_async(0).await;

	assert_eq!(credential.access_token.expose(), "token-a1");
	assert_eq!(credential.bearer(), "Bearer token-a1");
	assert_eq!(custodian.metrics.reuses(), 1);
	assert_eq!(custodian.metrics.refreshes(), 0);

	let stored = store
		.fetch(&id)
		.await
		.expect("Fetch should succeed.")
		.expect("Record should remain present.");

	assert!(stored.lock.is_none());
}

#[tokio::test]
async fn a_token_inside_the_refresh_window_is_renewed_early() {
	let server = MockServer::start_async().await;
	let (custodian, store) =
		build_reqwest_test_custodian(registry_for(&server), CustodySettings::default());
	let id = record_id("github:early");

	// Still valid for a minute, but already inside the default 5 minute window.
	seed_record(&store, &id, "token-a1", "token-r1", Duration::minutes(1)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"token-a2\",\"token_type\":\"bearer\",\"expires_in\":7200}",
			);
		})
		.await;

	let credential = custodian
		.ensure_fresh_credential(&id)
		.await
		.expect("A token inside the window should be refreshed.");

	mock.assert_async().await;

	assert_eq!(credential.access_token.expose(), "token-a2");
}

#[tokio::test]
async fn refresh_without_rotation_keeps_the_stored_refresh_token() {
	let server = MockServer::start_async().await;
	let (custodian, store) =
		build_reqwest_test_custodian(registry_for(&server), CustodySettings::default());
	let id = record_id("github:norotate");

	seed_record(&store, &id, "token-a1", "token-r1", Duration::minutes(-2)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"token-a2\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;

	custodian
		.ensure_fresh_credential(&id)
		.await
		.expect("Refreshing without rotation should succeed.");

	mock.assert_async().await;

	let stored = store
		.fetch(&id)
		.await
		.expect("Fetch should succeed.")
		.expect("Record should remain present.");

	assert_eq!(stored.access_token.expose(), "token-a2");
	assert_eq!(stored.refresh_token.expose(), "token-r1");
}

#[tokio::test]
async fn refresh_now_exchanges_even_when_fresh() {
	let server = MockServer::start_async().await;
	let (custodian, store) =
		build_reqwest_test_custodian(registry_for(&server), CustodySettings::default());
	let id = record_id("github:forced");

	seed_record(&store, &id, "token-a1", "token-r1", Duration::hours(1)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"token-a2\",\"refresh_token\":\"token-r2\",\"token_type\":\"bearer\",\"expires_in\":7200}",
			);
		})
		.await;

	let credential =
		custodian.refresh_now(&id).await.expect("A forced refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(credential.access_token.expose(), "token-a2");
	assert_eq!(custodian.metrics.reuses(), 0);
	assert_eq!(custodian.metrics.refreshes(), 1);

	let stored = store
		.fetch(&id)
		.await
		.expect("Fetch should succeed.")
		.expect("Record should remain present.");

	assert_eq!(stored.refresh_token.expose(), "token-r2");
}

#[tokio::test]
async fn invalid_grant_is_terminal_and_still_unlocks() {
	let server = MockServer::start_async().await;
	let (custodian, store) =
		build_reqwest_test_custodian(registry_for(&server), CustodySettings::default());
	let id = record_id("github:revoked");

	seed_record(&store, &id, "token-a1", "token-r1", Duration::minutes(-2)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400).header("content-type", "application/json").body(
				"{\"error\":\"invalid_grant\",\"error_description\":\"The refresh token was revoked.\"}",
			);
		})
		.await;

	let error = custodian
		.ensure_fresh_credential(&id)
		.await
		.expect_err("A revoked grant should fail the flow.");

	// A dead grant is never retried against the provider.
	mock.assert_calls_async(1).await;

	assert!(matches!(error, Error::RefreshTokenInvalid { .. }));
	assert!(error.requires_reauthorization());
	assert!(!error.is_transient());
	assert_eq!(custodian.metrics.failures(), 1);

	let stored = store
		.fetch(&id)
		.await
		.expect("Fetch should succeed.")
		.expect("Record should remain present after a failed refresh.");

	assert!(stored.lock.is_none());
	assert_eq!(stored.access_token.expose(), "token-a1");
	assert_eq!(stored.refresh_token.expose(), "token-r1");
}

#[derive(Debug)]
enum AppError {
	Custody(Error),
	MissingRecord,
}
impl From<Error> for AppError {
	fn from(error: Error) -> Self {
		Self::Custody(error)
	}
}

#[tokio::test]
async fn with_fresh_credential_runs_the_operation_after_release() {
	let server = MockServer::start_async().await;
	let (custodian, store) =
		build_reqwest_test_custodian(registry_for(&server), CustodySettings::default());
	let id = record_id("github:callback");

	seed_record(&store, &id, "token-a1", "token-r1", Duration::minutes(-2)).await;

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"token-a2\",\"token_type\":\"bearer\",\"expires_in\":7200}",
			);
		})
		.await;
	let store_probe = store.clone();
	let probe_id = id.clone();
	let header = custodian
		.with_fresh_credential(&id, move |credential| async move {
			let stored = store_probe
				.fetch(&probe_id)
				.await
				.map_err(Error::from)?
				.ok_or(AppError::MissingRecord)?;

			// The lease must already be gone by the time the operation runs.
			assert!(stored.lock.is_none());

			Ok::<_, AppError>(credential.bearer())
		})
		.await
		.expect("Operation should succeed with a fresh credential.");

	mock.assert_async().await;

	assert_eq!(header, "Bearer token-a2");
}

#[tokio::test]
async fn an_unregistered_provider_fails_fast_and_unlocks() {
	let server = MockServer::start_async().await;
	// Registry only knows GitLab; the record belongs to GitHub.
	let app = OAuthApp::builder(Provider::GitLab)
		.token_endpoint(Url::parse(&server.url("/token")).expect("Mock endpoint should parse."))
		.client_id(CLIENT_ID)
		.client_secret(CLIENT_SECRET)
		.build()
		.expect("OAuth app fixture should build.");
	let (custodian, store) = build_reqwest_test_custodian(
		ProviderRegistry::new().with_app(app),
		CustodySettings::default(),
	);
	let id = record_id("github:orphan");

	seed_record(&store, &id, "token-a1", "token-r1", Duration::minutes(-2)).await;

	let error = custodian
		.ensure_fresh_credential(&id)
		.await
		.expect_err("A provider without an app should fail the flow.");

	assert!(matches!(error, Error::Config(ConfigError::ProviderNotRegistered { .. })));

	let stored = store
		.fetch(&id)
		.await
		.expect("Fetch should succeed.")
		.expect("Record should remain present.");

	assert!(stored.lock.is_none());
}
