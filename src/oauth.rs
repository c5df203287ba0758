//! Authorization-server wire protocol: endpoints, request bodies, and the retrying caller.

pub use oauth2;

// crates.io
use http::{
	Method, Request,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue},
};
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use rand::Rng;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{RevokeAck, TokenSecret},
	error::{ConfigError, RemoteFailure, RemoteRequestError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	obs::FlowKind,
};

const JSON: &str = "application/json";

/// Maps HTTP transport failures into [`RemoteFailure`] values the retry loop can classify.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a per-attempt failure.
	fn map_transport_error(
		&self,
		flow: FlowKind,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> RemoteFailure;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		flow: FlowKind,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> RemoteFailure {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(flow, meta, *inner),
			HttpClientError::Http(inner) => RemoteFailure::Client { message: inner.to_string() },
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransportError::Unclassified { message }.into(),
			_ => TransportError::Unclassified { message: "unknown transport failure".into() }
				.into(),
		}
	}
}

/// Routes exposed by the authorization server, relative to `{base_url}{path}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
	/// `POST /oauth/token` for client-credential and refresh grants.
	Token,
	/// `POST /oauth/revoke`.
	Revoke,
	/// `GET /oauth/tokeninfo` introspection.
	TokenInfo,
}
impl Endpoint {
	/// Route appended to the configured path.
	pub const fn route(self) -> &'static str {
		match self {
			Endpoint::Token => "/oauth/token",
			Endpoint::Revoke => "/oauth/revoke",
			Endpoint::TokenInfo => "/oauth/tokeninfo",
		}
	}
}

/// Grant types sent to the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// `client_credentials`.
	ClientCredentials,
	/// `refresh_token`.
	RefreshToken,
}
impl GrantType {
	/// Returns the wire value of the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::ClientCredentials => "client_credentials",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}

/// JSON body for `POST /oauth/token`.
#[derive(Clone, Debug, Serialize)]
pub struct TokenGrantBody<'a> {
	/// Configured client id.
	pub client_id: &'a str,
	/// Configured client secret.
	pub client_secret: &'a str,
	/// Requested grant.
	pub grant_type: GrantType,
	/// Canonical space-delimited scopes (client-credential grants only).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub scopes: Option<&'a str>,
	/// Refresh token being exchanged (refresh grants only).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<&'a str>,
}

/// JSON body for `POST /oauth/revoke`.
#[derive(Clone, Debug, Serialize)]
pub struct RevokeBody<'a> {
	/// Client the token belongs to.
	pub client_id: &'a str,
	/// Revocation type, e.g. `application`.
	#[serde(rename = "type")]
	pub kind: &'a str,
}

/// Reusable description of one outbound call; rebuilt into an [`HttpRequest`] per attempt.
#[derive(Clone)]
pub struct RequestTemplate {
	method: Method,
	url: Url,
	bearer: Option<TokenSecret>,
	body: Vec<u8>,
}
impl RequestTemplate {
	/// `POST` with a JSON body.
	pub fn post_json(url: Url, body: &impl Serialize) -> Result<Self, ConfigError> {
		let body =
			serde_json::to_vec(body).map_err(|source| ConfigError::RequestBody { source })?;

		Ok(Self { method: Method::POST, url, bearer: None, body })
	}

	/// `GET` without a body.
	pub fn get(url: Url) -> Self {
		Self { method: Method::GET, url, bearer: None, body: Vec::new() }
	}

	/// Adds an `Authorization: Bearer` header.
	pub fn with_bearer(mut self, token: TokenSecret) -> Self {
		self.bearer = Some(token);

		self
	}

	/// Target URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Builds the HTTP request for one attempt.
	pub fn to_http_request(&self) -> Result<HttpRequest, ConfigError> {
		let mut builder = Request::builder()
			.method(self.method.clone())
			.uri(self.url.as_str())
			.header(CONTENT_TYPE, HeaderValue::from_static(JSON))
			.header(ACCEPT, HeaderValue::from_static(JSON));

		if let Some(token) = &self.bearer {
			builder = builder.header(AUTHORIZATION, format!("Bearer {}", token.expose()));
		}

		Ok(builder.body(self.body.clone())?)
	}
}
impl Debug for RequestTemplate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestTemplate")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("bearer_set", &self.bearer.is_some())
			.field("body_len", &self.body.len())
			.finish()
	}
}

/// Attempt budget, backoff, and per-attempt deadline for outbound calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts, at least 1.
	pub attempts: u32,
	/// Base delay; the wait after failed attempt `n` is `n * backoff` plus up to half of
	/// `backoff` in jitter. Zero disables waiting entirely.
	pub backoff: StdDuration,
	/// Deadline applied to each attempt.
	pub timeout: Option<StdDuration>,
}
impl RetryPolicy {
	/// Upper bound applied to server `Retry-After` hints.
	pub const MAX_RETRY_AFTER: StdDuration = StdDuration::from_secs(5);

	/// Delay to wait after failed attempt `attempt` (1-based).
	pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> StdDuration {
		if self.backoff.is_zero() {
			return StdDuration::ZERO;
		}

		let linear = self.backoff.saturating_mul(attempt.max(1));
		let jitter_cap = u64::try_from(self.backoff.as_millis() / 2).unwrap_or(u64::MAX);
		let jitter = StdDuration::from_millis(rand::rng().random_range(0..=jitter_cap));
		let delay = linear.saturating_add(jitter);
		let hint = retry_after
			.and_then(|hint| StdDuration::try_from(hint).ok())
			.map(|hint| hint.min(Self::MAX_RETRY_AFTER))
			.unwrap_or_default();

		delay.max(hint)
	}
}

/// Retrying caller bound to one transport + mapper pair.
pub(crate) struct AuthServer<'a, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: &'a C,
	mapper: &'a M,
	policy: RetryPolicy,
}
impl<'a, C, M> AuthServer<'a, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(http_client: &'a C, mapper: &'a M, policy: RetryPolicy) -> Self {
		Self { http_client, mapper, policy }
	}

	/// Sends `template` until it succeeds, fails non-retryably, or the attempt budget runs out.
	///
	/// `decode` turns a successful response into the caller's type. A body it rejects ends the
	/// loop at once, since [`RemoteFailure::ResponseParse`] is not retryable.
	pub(crate) async fn call<T>(
		&self,
		flow: FlowKind,
		template: &RequestTemplate,
		decode: fn(u16, &[u8]) -> Result<T, RemoteFailure>,
	) -> Result<T> {
		let mut attempt = 0;

		loop {
			attempt += 1;

			let request = template.to_http_request()?;
			let failure = match self.send_once(flow, request).await {
				Ok(response) => match decode(response.status().as_u16(), response.body()) {
					Ok(value) => return Ok(value),
					Err(failure) => failure,
				},
				Err(failure) => failure,
			};

			if attempt >= self.policy.attempts || !failure.is_retryable() {
				#[cfg(feature = "tracing")]
				tracing::debug!(
					flow = flow.as_str(),
					attempt,
					error = %failure,
					"Authorization server call failed."
				);

				return Err(RemoteRequestError { attempts: attempt, source: failure }.into_error());
			}

			let delay = self.policy.delay_for(attempt, failure.retry_after());

			#[cfg(feature = "tracing")]
			tracing::warn!(
				flow = flow.as_str(),
				attempt,
				max_attempts = self.policy.attempts,
				delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
				error = %failure,
				"Retrying authorization server call."
			);

			if !delay.is_zero() {
				tokio::time::sleep(delay).await;
			}
		}
	}

	async fn send_once(
		&self,
		flow: FlowKind,
		request: HttpRequest,
	) -> Result<HttpResponse, RemoteFailure> {
		let slot = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(slot.clone());
		let in_flight = handle.call(request);
		let outcome = match self.policy.timeout {
			Some(timeout) => tokio::time::timeout(timeout, in_flight)
				.await
				.map_err(|_| RemoteFailure::Timeout { timeout: Some(timeout) })?,
			None => in_flight.await,
		};
		let response = outcome
			.map_err(|err| self.mapper.map_transport_error(flow, slot.take().as_ref(), err))?;
		let status = response.status();

		if !status.is_success() {
			return Err(RemoteFailure::Status {
				status: status.as_u16(),
				message: remote_message(response.body()),
				retry_after: slot.take().and_then(|meta| meta.retry_after),
			});
		}

		Ok(response)
	}
}

/// Decodes a JSON success body, reporting the failing path on mismatch.
pub(crate) fn decode_json<T>(status: u16, body: &[u8]) -> Result<T, RemoteFailure>
where
	T: DeserializeOwned,
{
	let de = &mut serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(de)
		.map_err(|source| RemoteFailure::ResponseParse { source, status })
}

/// Accepts any revoke acknowledgement body.
pub(crate) fn decode_ack(_status: u16, body: &[u8]) -> Result<RevokeAck, RemoteFailure> {
	Ok(RevokeAck::from_body(body))
}

/// Extracts the `message` field of a JSON error body.
fn remote_message(body: &[u8]) -> Option<String> {
	let value = serde_json::from_slice::<JsonValue>(body).ok()?;

	value.get("message")?.as_str().map(str::to_owned)
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	flow: FlowKind,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> RemoteFailure {
	// Flow and metadata reserved for transport-specific classification.
	let _ = (flow, meta);

	if err.is_builder() {
		return RemoteFailure::Client { message: err.to_string() };
	}
	if err.is_timeout() {
		return RemoteFailure::Timeout { timeout: None };
	}

	TransportError::from(err).into()
}
