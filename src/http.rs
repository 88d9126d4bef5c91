//! Transport primitives for OAuth refresh exchanges.
//!
//! The module exposes [`ExchangeHttpClient`] alongside [`ResponseTrace`] and
//! [`ResponseTraceSlot`] so downstream crates can integrate custom HTTP clients
//! without losing the custodian's error-classification hooks. Implementations call
//! [`ResponseTraceSlot::take`] before dispatching a request and
//! [`ResponseTraceSlot::store`] once an HTTP status or retry hint is known, which is
//! what lets the facade classify failures with consistent response data.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// Abstraction over HTTP transports capable of executing OAuth refresh exchanges while
/// publishing response traces to the custodian's classification pipeline.
///
/// The trait is the custodian's only dependency on an HTTP stack. Callers provide an
/// implementation (typically behind `Arc<T>` where `T: ExchangeHttpClient`) and the
/// custodian requests short-lived [`AsyncHttpClient`] handles that each carry a clone of
/// a [`ResponseTraceSlot`]. Implementations must be `Send + Sync + 'static` so they can
/// be shared across custodian instances, and the handles they return must own whatever
/// state is required so their request futures remain `Send` while in flight.
pub trait ExchangeHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseTraceSlot`].
	///
	/// Each handle must satisfy `Send + Sync` so custodian futures can hop executors, and
	/// the request future returned by [`AsyncHttpClient::call`] must be `Send` so the
	/// facade's boxed futures inherit the same guarantee.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Trace Contract
	///
	/// - Call [`ResponseTraceSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across attempts.
	/// - Once an HTTP response (successful or erroneous) provides status headers, save them
	///   with [`ResponseTraceSlot::store`].
	/// - Never retain the slot clone beyond the lifetime of the returned handle.
	fn with_trace(&self, slot: ResponseTraceSlot) -> Self::Handle;
}

/// Captures status data from the most recent HTTP response for downstream error mapping.
///
/// Additional fields may be added in future releases, so downstream code should construct
/// values using field names instead of struct update syntax.
#[derive(Clone, Debug, Default)]
pub struct ResponseTrace {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing a [`ResponseTrace`] between transport and error layers.
///
/// The custodian creates a fresh slot for each refresh exchange and reads the captured
/// trace immediately after `oauth2` resolves. Transport implementations borrow the slot
/// just long enough to call [`store`](ResponseTraceSlot::store).
#[derive(Clone, Debug, Default)]
pub struct ResponseTraceSlot(Arc<Mutex<Option<ResponseTrace>>>);
impl ResponseTraceSlot {
	/// Stores a new trace for the current request.
	pub fn store(&self, trace: ResponseTrace) {
		*self.0.lock() = Some(trace);
	}

	/// Returns the captured trace, if any, consuming it from the slot.
	///
	/// Custom HTTP clients should invoke this helper before performing a request to
	/// ensure traces from prior attempts never leak into the new invocation.
	pub fn take(&self) -> Option<ResponseTrace> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
/// Token requests should not follow redirects, matching OAuth 2.0 guidance that token
/// endpoints return results directly instead of delegating to another URI. Configure
/// any custom [`ReqwestClient`] accordingly, because the custodian passes this client
/// into the `oauth2` crate when it builds the facade layer.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ExchangeHttpClient for ReqwestHttpClient {
	type Handle = MeteredHandle;
	type TransportError = ReqwestError;

	fn with_trace(&self, slot: ResponseTraceSlot) -> Self::Handle {
		MeteredHandle::new(self.0.clone(), slot)
	}
}

#[cfg(feature = "reqwest")]
struct MeteredHttpClient {
	client: ReqwestClient,
	slot: ResponseTraceSlot,
}

/// Trace-recording handle returned by [`ReqwestHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct MeteredHandle(Arc<MeteredHttpClient>);
#[cfg(feature = "reqwest")]
impl MeteredHandle {
	fn new(client: ReqwestClient, slot: ResponseTraceSlot) -> Self {
		Self(Arc::new(MeteredHttpClient { client, slot }))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for MeteredHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let inner = Arc::clone(&self.0);

		Box::pin(async move {
			inner.slot.take();

			let response = inner
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			inner.slot.store(ResponseTrace { status: Some(status.as_u16()), retry_after });

			let mut mapped = HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*mapped.status_mut() = status;
			*mapped.headers_mut() = headers;

			Ok(mapped)
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}

	let moment = OffsetDateTime::parse(raw, &Rfc2822).ok()?;
	let delta = moment - OffsetDateTime::now_utc();

	delta.is_positive().then_some(delta)
}
