//! Demonstrates refreshing an expired credential end to end: the custodian leases the
//! record, exchanges the refresh token against a mock provider, persists the rotation,
//! and returns the lease before handing back a usable snapshot.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use oauth2_custodian::{
	auth::{CredentialRecord, CredentialRole, Provider, RecordId},
	custody::{Custodian, CustodySettings},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	provider::{
		ClientAuthMethod, DefaultProviderStrategy, OAuthApp, ProviderRegistry, ProviderStrategy,
	},
	reqwest::Client,
	store::{CredentialStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access-2\",\"refresh_token\":\"demo-refresh-2\",\"token_type\":\"bearer\",\"expires_in\":7200}",
			);
		})
		.await;
	let store_backend = Arc::new(MemoryStore::default());
	let id = RecordId::new("github:octocat")?;
	let record = CredentialRecord::builder(id.clone(), Provider::GitHub, CredentialRole::Owner)
		.username("octocat")
		.provider_user_id("9001")
		.access_token("demo-access-1")
		.refresh_token("demo-refresh-1")
		.expires_at(OffsetDateTime::now_utc() - Duration::minutes(1))
		.build()?;

	store_backend.save(record).await?;

	let app = OAuthApp::builder(Provider::GitHub)
		.token_endpoint(Url::parse(&server.url("/token"))?)
		.client_id("demo-client")
		.client_secret("demo-secret")
		.auth_method(ClientAuthMethod::ClientSecretPost)
		.build()?;
	let registry = ProviderRegistry::new().with_app(app);
	let store: Arc<dyn CredentialStore> = store_backend.clone();
	let strategy: Arc<dyn ProviderStrategy> = Arc::new(DefaultProviderStrategy);
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let mapper = <Arc<ReqwestTransportErrorMapper>>::new(ReqwestTransportErrorMapper);
	let custodian = <Custodian<ReqwestHttpClient, ReqwestTransportErrorMapper>>::with_http_client(
		store,
		registry,
		strategy,
		http_client,
		mapper,
	)
	.with_settings(CustodySettings::default())?;
	let credential = custodian.ensure_fresh_credential(&id).await?;

	println!("Authorization header: {}.", credential.bearer());

	if let Some(stored) = store_backend.fetch(&id).await? {
		println!("Rotated refresh token: {}.", stored.refresh_token.expose());
		println!("Lease returned: {}.", stored.lock.is_none());
	}

	token_mock.assert_async().await;

	Ok(())
}
