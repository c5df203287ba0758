//! Resource-server guard: validates inbound `access-token` headers against required scopes.
//!
//! Introspection results are cached in the [`Category::Server`] partition under the raw token.
//! A cached result is served until the configured `server_expiry` elapses or its own `exp` claim
//! passes, whichever comes first. A result whose fetch overlapped an eviction (for instance
//! [`Accounts::revoke_token`]) is returned to its caller but not cached.
//!
//! [`RequireScopes`] plugs the guard into `tower-http`:
//!
//! ```no_run
//! use oauth2_accounts::{Config, flows::ReqwestAccounts};
//!
//! # fn build() -> Result<(), Box<dyn std::error::Error>> {
//! let accounts = ReqwestAccounts::new(Config::builder("https://auth.example.com").build()?)?;
//! let layer = accounts.require_scopes::<_, _, String>(["reports.read"]).into_layer();
//! # let _ = layer;
//! # Ok(())
//! # }
//! ```

// std
use std::marker::PhantomData;
// crates.io
use http::{
	HeaderMap, Request, Response, StatusCode,
	header::{CONTENT_TYPE, HeaderValue},
};
use tower_http::auth::{AsyncAuthorizeRequest, AsyncRequireAuthorizationLayer};
// self
use crate::{
	_prelude::*,
	auth::{Payload, TokenInfo, fingerprint},
	cache::Category,
	error::{RemoteFailure, RemoteRequestError},
	flows::{Accounts, common},
	http::TokenHttpClient,
	oauth::{self, Endpoint, RequestTemplate, TransportErrorMapper},
	obs::{FlowKind, FlowSpan},
};

/// Header carrying the bearer token on inbound requests.
pub const ACCESS_TOKEN_HEADER: &str = "access-token";

/// Outcome of a successful guard check; inserted into the request extensions.
///
/// The value lives only as long as the request it is attached to.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthorizedClient {
	/// Client the token was issued to, if introspection reported one.
	pub client_id: Option<String>,
	/// Full introspection result.
	pub token_info: TokenInfo,
}

impl<C, M> Accounts<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Checks that `access_token` grants at least one of `required`.
	///
	/// An empty `required` list never authorizes.
	pub async fn verify_scopes(
		&self,
		access_token: Option<&str>,
		required: &[String],
	) -> Result<AuthorizedClient> {
		const KIND: FlowKind = FlowKind::Introspect;

		let access_token = access_token.map(str::trim).filter(|token| !token.is_empty());
		let mut span = FlowSpan::new(KIND, "verify_scopes");

		if let Some(token) = access_token {
			span = span.with_token_fingerprint(&fingerprint(token));
		}

		common::observe(KIND, span, async move {
			let token = access_token.ok_or(Error::MissingToken)?;
			let info = self.resolve_token_info(token).await?;
			let Some(granted) = info.scopes() else {
				self.cache.forget(Category::Server, token);

				return Err(Error::ScopesMissing);
			};

			if !granted.contains_any(required.iter().map(String::as_str)) {
				return Err(Error::InsufficientScope { required: required.to_vec() });
			}

			Ok(AuthorizedClient { client_id: info.client_id().map(str::to_owned), token_info: info })
		})
		.await
	}

	/// Reads the `access-token` header (case-insensitively) and runs
	/// [`verify_scopes`](Self::verify_scopes).
	pub async fn verify_headers(
		&self,
		headers: &HeaderMap,
		required: &[String],
	) -> Result<AuthorizedClient> {
		let token = headers.get(ACCESS_TOKEN_HEADER).and_then(|value| value.to_str().ok());

		self.verify_scopes(token, required).await
	}

	/// Returns introspection data for `access_token`, from the cache when still valid.
	pub async fn token_info(&self, access_token: &str) -> Result<TokenInfo> {
		const KIND: FlowKind = FlowKind::Introspect;

		let span =
			FlowSpan::new(KIND, "token_info").with_token_fingerprint(&fingerprint(access_token));

		common::observe(KIND, span, self.resolve_token_info(access_token)).await
	}

	/// Builds a `tower-http` authorizer requiring one of `required`.
	pub fn require_scopes<I, S, ResBody>(
		&self,
		required: I,
	) -> RequireScopes<C, M, JsonErrorHandler<ResBody>>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		RequireScopes {
			accounts: self.clone(),
			required: required.into_iter().map(Into::into).collect(),
			on_error: JsonErrorHandler::new(),
		}
	}

	async fn resolve_token_info(&self, token: &str) -> Result<TokenInfo> {
		let generation = self.cache.generation(Category::Server);
		let now = OffsetDateTime::now_utc();
		let cached = self.cache.get_valid(Category::Server, token, |payload| {
			payload.as_token_info().is_some_and(|info| !info.is_expired_at(now))
		});

		if let Some(info) = cached.and_then(Payload::into_token_info) {
			return Ok(info);
		}

		let config = self.config();
		let mut url = config.endpoint(Endpoint::TokenInfo)?;

		url.query_pairs_mut().append_pair("access_token", token);

		let info = self
			.auth_server(&config)
			.call(FlowKind::Introspect, &RequestTemplate::get(url), oauth::decode_json::<TokenInfo>)
			.await
			.map_err(Error::surface_remote_message)?;

		if info.scopes().is_some() {
			let ttl = common::bounded_ttl(
				config.server_ttl(),
				info.expires_at().map(|expires_at| expires_at - now),
			);

			self.cache.set_if_current(
				Category::Server,
				token,
				Payload::TokenInfo(info.clone()),
				ttl,
				generation,
			);
		}

		Ok(info)
	}
}

/// `tower-http` authorizer produced by [`Accounts::require_scopes`].
///
/// On success the request continues with an [`AuthorizedClient`] in its extensions; on failure
/// the [`OnGuardError`] handler builds the response.
pub struct RequireScopes<C, M, H>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	accounts: Accounts<C, M>,
	required: Arc<[String]>,
	on_error: H,
}
impl<C, M, H> RequireScopes<C, M, H>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Scopes accepted by this authorizer.
	pub fn required(&self) -> &[String] {
		&self.required
	}

	/// Replaces the error handler.
	pub fn with_error_handler<H2>(self, on_error: H2) -> RequireScopes<C, M, H2> {
		RequireScopes { accounts: self.accounts, required: self.required, on_error }
	}

	/// Wraps the authorizer in an [`AsyncRequireAuthorizationLayer`].
	pub fn into_layer(self) -> AsyncRequireAuthorizationLayer<Self> {
		AsyncRequireAuthorizationLayer::new(self)
	}
}
impl<C, M, H> Clone for RequireScopes<C, M, H>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
	H: Clone,
{
	fn clone(&self) -> Self {
		Self {
			accounts: self.accounts.clone(),
			required: self.required.clone(),
			on_error: self.on_error.clone(),
		}
	}
}
impl<C, M, H> Debug for RequireScopes<C, M, H>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
	H: Debug,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequireScopes")
			.field("required", &self.required)
			.field("on_error", &self.on_error)
			.finish()
	}
}
impl<B, C, M, H> AsyncAuthorizeRequest<B> for RequireScopes<C, M, H>
where
	B: 'static + Send,
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
	H: 'static + Clone + Send + OnGuardError,
{
	type Future = Pin<
		Box<dyn Future<Output = Result<Request<B>, Response<Self::ResponseBody>>> + Send>,
	>;
	type RequestBody = B;
	type ResponseBody = H::Body;

	fn authorize(&mut self, mut request: Request<B>) -> Self::Future {
		let accounts = self.accounts.clone();
		let required = self.required.clone();
		let on_error = self.on_error.clone();

		Box::pin(async move {
			match accounts.verify_headers(request.headers(), &required).await {
				Ok(client) => {
					request.extensions_mut().insert(client);

					Ok(request)
				},
				Err(err) => Err(on_error.on_error(err)),
			}
		})
	}
}

/// Builds the response returned when the guard rejects a request.
pub trait OnGuardError {
	/// Response body type.
	type Body;

	/// Converts a guard failure into a response.
	fn on_error(&self, error: Error) -> Response<Self::Body>;
}

/// Responds with `{"message": "<error message>"}` and a status derived from the error.
///
/// | Error | Status |
/// |---|---|
/// | [`Error::MissingToken`] | 401 |
/// | [`Error::InsufficientScope`] | 403 |
/// | [`Error::RemoteRejection`] with a 4xx status | 401 |
/// | [`Error::RemoteRequest`] after a timeout | 504 |
/// | other remote failures, [`Error::ScopesMissing`] | 502 |
/// | [`Error::Config`] | 500 |
pub struct JsonErrorHandler<ResBody> {
	_body: PhantomData<fn() -> ResBody>,
}
impl<ResBody> JsonErrorHandler<ResBody> {
	/// Creates a handler producing `ResBody` bodies.
	pub fn new() -> Self {
		Self { _body: PhantomData }
	}

	/// Status code the handler uses for `error`.
	pub fn status_for(error: &Error) -> StatusCode {
		match error {
			Error::MissingToken => StatusCode::UNAUTHORIZED,
			Error::InsufficientScope { .. } => StatusCode::FORBIDDEN,
			Error::ScopesMissing => StatusCode::BAD_GATEWAY,
			Error::RemoteRejection { status: Some(status), .. } if (400..500).contains(status) =>
				StatusCode::UNAUTHORIZED,
			Error::RemoteRejection { .. } => StatusCode::BAD_GATEWAY,
			Error::RemoteRequest(RemoteRequestError {
				source: RemoteFailure::Timeout { .. }, ..
			}) => StatusCode::GATEWAY_TIMEOUT,
			Error::RemoteRequest(_) => StatusCode::BAD_GATEWAY,
			Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}
impl<ResBody> OnGuardError for JsonErrorHandler<ResBody>
where
	ResBody: From<String>,
{
	type Body = ResBody;

	fn on_error(&self, error: Error) -> Response<Self::Body> {
		let status = Self::status_for(&error);
		let body = serde_json::json!({ "message": error.to_string() }).to_string();
		let mut response = Response::new(ResBody::from(body));

		*response.status_mut() = status;
		response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		response
	}
}
impl<ResBody> Clone for JsonErrorHandler<ResBody> {
	fn clone(&self) -> Self {
		Self::new()
	}
}
impl<ResBody> Copy for JsonErrorHandler<ResBody> {}
impl<ResBody> Default for JsonErrorHandler<ResBody> {
	fn default() -> Self {
		Self::new()
	}
}
impl<ResBody> Debug for JsonErrorHandler<ResBody> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("JsonErrorHandler")
	}
}
