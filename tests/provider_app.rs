//! Validation and classification behavior of provider registrations and strategies.

// std
use std::collections::BTreeMap;
// crates.io
use url::Url;
// self
use oauth2_custodian::{
	auth::Provider,
	provider::{
		ClientAuthMethod, DefaultProviderStrategy, OAuthApp, OAuthAppBuilder, OAuthAppError,
		ProviderErrorContext, ProviderErrorKind, ProviderRegistry, ProviderStrategy,
	},
};

fn url(value: &str) -> Url {
	Url::parse(value).expect("Failed to parse provider app URL.")
}

fn builder(provider: Provider) -> OAuthAppBuilder {
	OAuthApp::builder(provider)
}

#[test]
fn app_builder_rejects_missing_and_insecure_fields() {
	let err = builder(Provider::GitHub)
		.client_id("client-a")
		.build()
		.expect_err("App builder should reject a missing token endpoint.");

	assert_eq!(err, OAuthAppError::MissingTokenEndpoint);

	let err = builder(Provider::GitHub)
		.token_endpoint(url("https://example.com/token"))
		.build()
		.expect_err("App builder should reject a missing client id.");

	assert_eq!(err, OAuthAppError::MissingClientId);

	let err = builder(Provider::GitHub)
		.token_endpoint(url("https://example.com/token"))
		.client_id("")
		.build()
		.expect_err("App builder should reject an empty client id.");

	assert_eq!(err, OAuthAppError::MissingClientId);

	let err = builder(Provider::GitHub)
		.token_endpoint(url("http://example.com/token"))
		.client_id("client-a")
		.build()
		.expect_err("App builder should reject plain HTTP token endpoints.");

	assert!(matches!(err, OAuthAppError::InsecureEndpoint { endpoint: "token", .. }));
}

#[test]
fn app_builder_defaults_cover_public_clients() {
	let app = builder(Provider::GitLab)
		.token_endpoint(url("https://gitlab.example.com/oauth/token"))
		.client_id("client-b")
		.build()
		.expect("App builder should succeed without a secret.");

	assert_eq!(app.provider, Provider::GitLab);
	assert_eq!(app.client_id, "client-b");
	assert!(app.client_secret.is_none());
	assert!(app.redirect_uri.is_none());
	assert_eq!(app.auth_method, ClientAuthMethod::ClientSecretBasic);
}

#[test]
fn registry_resolves_and_replaces_apps() {
	let github = builder(Provider::GitHub)
		.token_endpoint(url("https://github.example.com/token"))
		.client_id("client-gh")
		.build()
		.expect("GitHub app should build.");
	let gitlab = builder(Provider::GitLab)
		.token_endpoint(url("https://gitlab.example.com/token"))
		.client_id("client-gl")
		.build()
		.expect("GitLab app should build.");
	let mut registry = ProviderRegistry::new().with_app(github).with_app(gitlab);

	assert!(!registry.is_empty());
	assert_eq!(
		registry.app(Provider::GitHub).map(|app| app.client_id.as_str()),
		Some("client-gh"),
	);
	assert!(registry.app(Provider::Azure).is_none());

	// Registering the same provider again replaces the previous app.
	let replacement = builder(Provider::GitHub)
		.token_endpoint(url("https://github.example.com/token"))
		.client_id("client-gh2")
		.build()
		.expect("Replacement app should build.");

	registry.register(replacement);

	assert_eq!(
		registry.app(Provider::GitHub).map(|app| app.client_id.as_str()),
		Some("client-gh2"),
	);
}

#[test]
fn default_strategy_prefers_oauth_error_fields() {
	let strategy = DefaultProviderStrategy;
	let ctx = ProviderErrorContext::new(Provider::GitHub)
		.with_http_status(400)
		.with_oauth_error("invalid_grant");

	assert_eq!(strategy.classify_token_error(&ctx), ProviderErrorKind::InvalidGrant);

	let ctx = ProviderErrorContext::new(Provider::GitHub)
		.with_http_status(503)
		.with_oauth_error("access_denied");

	assert_eq!(strategy.classify_token_error(&ctx), ProviderErrorKind::InvalidGrant);

	let ctx = ProviderErrorContext::new(Provider::Azure)
		.with_http_status(400)
		.with_oauth_error("invalid_client");

	assert_eq!(strategy.classify_token_error(&ctx), ProviderErrorKind::InvalidClient);

	let ctx = ProviderErrorContext::new(Provider::GitLab)
		.with_http_status(400)
		.with_oauth_error("temporarily_unavailable");

	assert_eq!(strategy.classify_token_error(&ctx), ProviderErrorKind::Transient);
}

#[test]
fn default_strategy_reads_error_description_when_missing_error_code() {
	let strategy = DefaultProviderStrategy;
	let ctx = ProviderErrorContext::new(Provider::GitLab)
		.with_http_status(500)
		.with_error_description("invalid_grant: refresh token was revoked");

	assert_eq!(strategy.classify_token_error(&ctx), ProviderErrorKind::InvalidGrant);
}

#[test]
fn default_strategy_falls_back_to_body_and_status() {
	let strategy = DefaultProviderStrategy;
	let body_ctx = ProviderErrorContext::new(Provider::GitHub)
		.with_http_status(500)
		.with_body_preview("please retry in a moment");

	assert_eq!(strategy.classify_token_error(&body_ctx), ProviderErrorKind::Transient);

	let revoked_ctx = ProviderErrorContext::new(Provider::GitHub).with_http_status(403);

	assert_eq!(strategy.classify_token_error(&revoked_ctx), ProviderErrorKind::InvalidGrant);

	let auth_ctx = ProviderErrorContext::new(Provider::Azure).with_http_status(401);

	assert_eq!(strategy.classify_token_error(&auth_ctx), ProviderErrorKind::InvalidClient);

	let throttled_ctx = ProviderErrorContext::new(Provider::GitLab).with_http_status(429);

	assert_eq!(strategy.classify_token_error(&throttled_ctx), ProviderErrorKind::Transient);

	let outage_ctx = ProviderErrorContext::new(Provider::GitHub).with_http_status(500);

	assert_eq!(strategy.classify_token_error(&outage_ctx), ProviderErrorKind::Transient);

	let network_ctx = ProviderErrorContext::network_failure(Provider::GitHub);

	assert_eq!(strategy.classify_token_error(&network_ctx), ProviderErrorKind::Transient);
}

#[test]
fn body_previews_are_truncated() {
	let long_body = "x".repeat(1_024);
	let ctx = ProviderErrorContext::new(Provider::GitHub).with_body_preview(long_body);
	let preview = ctx.body_preview.expect("Preview should be populated.");

	assert!(preview.chars().count() <= 257);
	assert!(preview.ends_with('…'));
}

#[test]
fn custom_strategy_can_augment_refresh_requests() {
	struct AudienceStrategy;
	impl ProviderStrategy for AudienceStrategy {
		fn classify_token_error(&self, _ctx: &ProviderErrorContext) -> ProviderErrorKind {
			ProviderErrorKind::Transient
		}

		fn augment_refresh_request(&self, provider: Provider, form: &mut BTreeMap<String, String>) {
			form.insert("audience".into(), format!("for:{provider}"));
		}
	}

	let strategy = AudienceStrategy;
	let mut form = BTreeMap::new();

	form.insert("grant_type".into(), "refresh_token".into());
	strategy.augment_refresh_request(Provider::Azure, &mut form);

	assert_eq!(form.get("audience").map(String::as_str), Some("for:azure"));
}
