//! Validated per-provider OAuth app registrations.

// self
use crate::{_prelude::*, auth::Provider};

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Errors raised while constructing or validating OAuth apps.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum OAuthAppError {
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Client identifier is mandatory.
	#[error("Missing client id.")]
	MissingClientId,
	/// Token endpoint must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Validated OAuth app registration for one provider.
///
/// The refresh flow only ever talks to the token endpoint; authorization endpoints live in
/// whatever system provisions the records.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthApp {
	/// Provider this app authenticates against.
	pub provider: Provider,
	/// Token endpoint used for refresh exchanges.
	pub token_endpoint: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret, absent for public clients.
	pub client_secret: Option<String>,
	/// Redirect URI echoed on refresh for providers that verify it.
	pub redirect_uri: Option<Url>,
	/// Client authentication mechanism for the token endpoint.
	pub auth_method: ClientAuthMethod,
}
impl OAuthApp {
	/// Creates a new builder for the provided provider.
	pub fn builder(provider: Provider) -> OAuthAppBuilder {
		OAuthAppBuilder::new(provider)
	}
}
impl Debug for OAuthApp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthApp")
			.field("provider", &self.provider)
			.field("token_endpoint", &self.token_endpoint.as_str())
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_uri", &self.redirect_uri.as_ref().map(Url::as_str))
			.field("auth_method", &self.auth_method)
			.finish()
	}
}

/// Builder for [`OAuthApp`] values.
#[derive(Debug)]
pub struct OAuthAppBuilder {
	/// Provider the app under construction belongs to.
	pub provider: Provider,
	/// Token endpoint used for refresh exchanges.
	pub token_endpoint: Option<Url>,
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// OAuth client secret for confidential clients.
	pub client_secret: Option<String>,
	/// Redirect URI echoed on refresh.
	pub redirect_uri: Option<Url>,
	/// Client authentication mechanism for the token endpoint.
	pub auth_method: ClientAuthMethod,
}
impl OAuthAppBuilder {
	/// Creates a new builder seeded with the provided provider.
	pub fn new(provider: Provider) -> Self {
		Self {
			provider,
			token_endpoint: None,
			client_id: None,
			client_secret: None,
			redirect_uri: None,
			auth_method: ClientAuthMethod::default(),
		}
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the client identifier.
	pub fn client_id(mut self, value: impl Into<String>) -> Self {
		self.client_id = Some(value.into());

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, value: impl Into<String>) -> Self {
		self.client_secret = Some(value.into());

		self
	}

	/// Sets the redirect URI echoed on refresh requests.
	pub fn redirect_uri(mut self, url: Url) -> Self {
		self.redirect_uri = Some(url);

		self
	}

	/// Overrides the client authentication method.
	pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting app.
	pub fn build(self) -> Result<OAuthApp, OAuthAppError> {
		let token_endpoint = self.token_endpoint.ok_or(OAuthAppError::MissingTokenEndpoint)?;
		let client_id =
			self.client_id.filter(|id| !id.is_empty()).ok_or(OAuthAppError::MissingClientId)?;

		validate_endpoint("token", &token_endpoint)?;

		Ok(OAuthApp {
			provider: self.provider,
			token_endpoint,
			client_id,
			client_secret: self.client_secret,
			redirect_uri: self.redirect_uri,
			auth_method: self.auth_method,
		})
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), OAuthAppError> {
	if url.scheme() != "https" {
		Err(OAuthAppError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}

/// Provider-to-app map the custodian resolves credential records against.
#[derive(Clone, Debug, Default)]
pub struct ProviderRegistry {
	apps: HashMap<Provider, OAuthApp>,
}
impl ProviderRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an app, replacing any previous registration for its provider.
	pub fn register(&mut self, app: OAuthApp) {
		self.apps.insert(app.provider, app);
	}

	/// Builder-style registration.
	pub fn with_app(mut self, app: OAuthApp) -> Self {
		self.register(app);

		self
	}

	/// Looks up the app registered for `provider`.
	pub fn app(&self, provider: Provider) -> Option<&OAuthApp> {
		self.apps.get(&provider)
	}

	/// Returns `true` when no apps are registered.
	pub fn is_empty(&self) -> bool {
		self.apps.is_empty()
	}
}
