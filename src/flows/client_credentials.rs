//! Client Credentials acquisition with caching + singleflight guards.
//!
//! Tokens are cached under the canonical scope string, so any permutation of the same scopes
//! reuses one entry. Concurrent callers asking for the same scopes queue behind a per-key guard
//! and re-check the cache once they acquire it, so only the first one reaches the
//! authorization server.

// self
use crate::{
	_prelude::*,
	auth::{Payload, ScopeSet, TokenResponse},
	cache::Category,
	error::ConfigError,
	flows::{Accounts, common},
	http::TokenHttpClient,
	oauth::{self, Endpoint, GrantType, RequestTemplate, TokenGrantBody, TransportErrorMapper},
	obs::{FlowKind, FlowSpan},
};

/// Parameters for [`Accounts::acquire_token_with`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientTokenRequest {
	/// Canonical scopes to request.
	pub scope: ScopeSet,
	/// Evicts any cached token for the scopes before fetching.
	pub force: bool,
}
impl ClientTokenRequest {
	/// Creates a request for the provided scopes.
	pub fn new<I, S>(scopes: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Ok(Self { scope: ScopeSet::new(scopes)?, force: false })
	}

	/// Forces a network fetch even when a cached token exists.
	pub fn force_refresh(mut self) -> Self {
		self.force = true;

		self
	}

	/// Overrides the force flag.
	pub fn with_force(mut self, force: bool) -> Self {
		self.force = force;

		self
	}
}
impl From<ScopeSet> for ClientTokenRequest {
	fn from(scope: ScopeSet) -> Self {
		Self { scope, force: false }
	}
}

impl<C, M> Accounts<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns a client token for `scopes`, from the cache when possible.
	pub async fn acquire_token<I, S>(&self, scopes: I) -> Result<TokenResponse>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.acquire_token_with(ClientTokenRequest::new(scopes)?).await
	}

	/// Performs the `client_credentials` grant with caching + singleflight guards.
	pub async fn acquire_token_with(&self, request: ClientTokenRequest) -> Result<TokenResponse> {
		const KIND: FlowKind = FlowKind::ClientCredentials;

		let span = FlowSpan::new(KIND, "acquire_token");

		common::observe(KIND, span, async move {
			let config = self.config();
			let (client_id, client_secret) = config.client_credentials()?;
			let key = request.scope.normalized();

			if request.force {
				self.cache.forget(Category::Client, &key);
			} else if let Some(token) = self.cached_token(&key) {
				return Ok(token);
			}

			let guard = common::flow_guard(self, &key);
			let _singleflight = guard.lock().await;

			if !request.force
				&& let Some(token) = self.cached_token(&key)
			{
				return Ok(token);
			}

			let body = TokenGrantBody {
				client_id,
				client_secret,
				grant_type: GrantType::ClientCredentials,
				scopes: Some(key.as_str()),
				refresh_token: None,
			};
			let template = RequestTemplate::post_json(config.endpoint(Endpoint::Token)?, &body)?;
			let token = self
				.auth_server(&config)
				.call(KIND, &template, oauth::decode_json::<TokenResponse>)
				.await?;
			let ttl = common::bounded_ttl(config.client_ttl(), token.expires_in());

			self.cache.set(Category::Client, key, Payload::Token(token.clone()), ttl);

			Ok(token)
		})
		.await
	}

	fn cached_token(&self, key: &str) -> Option<TokenResponse> {
		self.cache.get(Category::Client, key).and_then(Payload::into_token)
	}
}
