//! Demonstrates the single-flight property: four tasks race for the same expiring
//! credential, exactly one performs the provider exchange, and the rest reuse the
//! freshly persisted tokens once the lease is returned.

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
	retry::RetryPolicy,
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
				"{\"access_token\":\"shared-access\",\"token_type\":\"bearer\",\"expires_in\":7200}",
			);
		})
		.await;
	let store_backend = Arc::new(MemoryStore::default());
	let id = RecordId::new("github:octocat")?;
	let record = CredentialRecord::builder(id.clone(), Provider::GitHub, CredentialRole::Owner)
		.username("octocat")
		.provider_user_id("9001")
		.access_token("aging-access")
		.refresh_token("aging-refresh")
		.expires_at(OffsetDateTime::now_utc() + Duration::seconds(30))
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
	let settings = CustodySettings {
		acquire_retry: RetryPolicy::new(50, Duration::milliseconds(100)),
		..Default::default()
	};
	let custodian = <Custodian<ReqwestHttpClient, ReqwestTransportErrorMapper>>::with_http_client(
		store,
		registry,
		strategy,
		http_client,
		mapper,
	)
	.with_settings(settings)?;
	let mut handles = Vec::new();

	for worker in 0..4 {
		let custodian = custodian.clone();
		let id = id.clone();

		handles.push(tokio::spawn(async move {
			let credential = custodian.ensure_fresh_credential(&id).await?;

			println!("Worker {worker} holds {}.", credential.bearer());

			Ok::<_, oauth2_custodian::error::Error>(())
		}));
	}

	for handle in handles {
		handle.await??;
	}

	println!(
		"Exchanges: {}, reuses: {}, contention retries: {}.",
		custodian.metrics.refreshes(),
		custodian.metrics.reuses(),
		custodian.metrics.contention(),
	);

	token_mock.assert_async().await;

	Ok(())
}
