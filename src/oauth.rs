//! Internal facade over the `oauth2` crate for refresh-grant exchanges.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{Provider, RecordId, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	http::{ExchangeHttpClient, ResponseTrace, ResponseTraceSlot},
	provider::{
		ClientAuthMethod, OAuthApp, ProviderErrorContext, ProviderErrorKind, ProviderStrategy,
	},
};

type ConfiguredRefreshClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Maps HTTP transport failures into custodian [`Error`] values.
///
/// Implement this alongside [`ExchangeHttpClient`] when plugging in a transport other than
/// reqwest, so the custodian can tell configuration mistakes, timeouts, and network outages
/// apart without knowing the transport's concrete error type.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a custodian error.
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		provider: Provider,
		trace: Option<&ResponseTrace>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		_strategy: &dyn ProviderStrategy,
		_provider: Provider,
		trace: Option<&ResponseTrace>,
		error: HttpClientError<ReqwestError>,
	) -> Error {
		match error {
			HttpClientError::Reqwest(inner) => map_reqwest_error(trace, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => transport_fallback(trace, Some(message)),
			_ => transport_fallback(trace, None),
		}
	}
}

/// Tokens minted by a successful refresh exchange.
#[derive(Clone, Debug)]
pub(crate) struct IssuedTokens {
	/// Fresh access token.
	pub(crate) access_token: TokenSecret,
	/// Absolute expiration instant derived from the response's `expires_in`.
	pub(crate) expires_at: OffsetDateTime,
	/// Replacement refresh token, present when the provider rotates grants.
	pub(crate) rotated_refresh: Option<TokenSecret>,
}

/// Pre-configured OAuth client bound to one provider's token endpoint.
///
/// Holds the typestate-complete `oauth2` client together with the transport handle factory
/// and the error mapper, so the refresh flow deals in domain types only.
pub(crate) struct RefreshFacade<C, M>
where
	C: ?Sized + ExchangeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredRefreshClient,
	redirect_uri: Option<Url>,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> RefreshFacade<C, M>
where
	C: ?Sized + ExchangeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_app(
		app: &OAuthApp,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(app.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidAppEndpoint { source })?;
		let mut oauth_client =
			BasicClient::new(ClientId::new(app.client_id.clone())).set_token_uri(token_url);

		if let Some(secret) = &app.client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.clone()));
		}
		if matches!(app.auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, redirect_uri: app.redirect_uri.clone(), http_client, error_mapper })
	}

	pub(crate) async fn refresh_token(
		&self,
		strategy: &dyn ProviderStrategy,
		provider: Provider,
		record: &RecordId,
		refresh_secret: &TokenSecret,
	) -> Result<IssuedTokens> {
		let trace = ResponseTraceSlot::default();
		let handle = self.http_client.with_trace(trace.clone());
		let refresh_token = RefreshToken::new(refresh_secret.expose().to_owned());
		let mut form = BTreeMap::new();

		if let Some(redirect) = &self.redirect_uri {
			form.insert("redirect_uri".to_owned(), redirect.to_string());
		}

		strategy.augment_refresh_request(provider, &mut form);

		let mut request = self.oauth_client.exchange_refresh_token(&refresh_token);

		for (key, value) in &form {
			request = request.add_extra_param(key, value);
		}

		let response = request.request_async(&handle).await.map_err(|err| {
			map_request_error(
				strategy,
				provider,
				record,
				trace.take(),
				err,
				self.error_mapper.as_ref(),
			)
		})?;

		map_refresh_response(response)
	}
}

fn map_refresh_response(response: BasicTokenResponse) -> Result<IssuedTokens> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	Ok(IssuedTokens {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		expires_at: OffsetDateTime::now_utc() + Duration::seconds(expires_in),
		rotated_refresh: response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned())),
	})
}

fn map_request_error<E, M>(
	strategy: &dyn ProviderStrategy,
	provider: Provider,
	record: &RecordId,
	trace: Option<ResponseTrace>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let trace_ref = trace.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, provider, record, &response, trace_ref),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(strategy, provider, trace_ref, error),
		RequestTokenError::Parse(error, _body) =>
			TransientError::TokenResponseParse { source: error, status: trace_status(trace_ref) }
				.into(),
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: trace_status(trace_ref),
			retry_after: trace_retry_after(trace_ref),
		}
		.into(),
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	provider: Provider,
	record: &RecordId,
	response: &BasicErrorResponse,
	trace: Option<&ResponseTrace>,
) -> Error {
	let mut ctx = ProviderErrorContext::new(provider)
		.with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = trace_status(trace) {
		ctx = ctx.with_http_status(status);
	}

	let reason = response
		.error_description()
		.cloned()
		.unwrap_or_else(|| response.error().as_ref().to_string());

	match strategy.classify_token_error(&ctx) {
		ProviderErrorKind::InvalidGrant =>
			Error::RefreshTokenInvalid { provider, record: record.clone(), reason },
		ProviderErrorKind::InvalidClient => Error::InvalidClient { provider, reason },
		ProviderErrorKind::Transient => TransientError::TokenEndpoint {
			message: reason,
			status: trace_status(trace),
			retry_after: trace_retry_after(trace),
		}
		.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(trace: Option<&ResponseTrace>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "request timed out while waiting for the token endpoint".into(),
			status: trace_status(trace).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: trace_retry_after(trace),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn transport_fallback(trace: Option<&ResponseTrace>, message: Option<String>) -> Error {
	TransientError::TokenEndpoint {
		message: message
			.unwrap_or_else(|| "HTTP client failed before a response was received".into()),
		status: trace_status(trace),
		retry_after: trace_retry_after(trace),
	}
	.into()
}

fn trace_status(trace: Option<&ResponseTrace>) -> Option<u16> {
	trace.and_then(|value| value.status)
}

fn trace_retry_after(trace: Option<&ResponseTrace>) -> Option<Duration> {
	trace.and_then(|value| value.retry_after)
}
