//! Refresh token exchange.
//!
//! The cache is searched for a client token carrying the presented refresh token to recover the
//! scope key it was issued for. When found, the refreshed token replaces that entry; a refresh
//! the server rejects evicts it.

// self
use crate::{
	_prelude::*,
	auth::{Payload, TokenResponse, TokenSecret, fingerprint},
	cache::Category,
	flows::{Accounts, common},
	http::TokenHttpClient,
	oauth::{self, Endpoint, GrantType, RequestTemplate, TokenGrantBody, TransportErrorMapper},
	obs::{FlowKind, FlowSpan},
};

impl<C, M> Accounts<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges `refresh_token` for a new token and returns the response verbatim.
	///
	/// If the server omits a new refresh token, the cached copy keeps `refresh_token` so later
	/// refreshes still find their scope key.
	pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span =
			FlowSpan::new(KIND, "refresh_token").with_token_fingerprint(&fingerprint(refresh_token));

		common::observe(KIND, span, async move {
			let config = self.config();
			let (client_id, client_secret) = config.client_credentials()?;
			let holds_refresh = |payload: &Payload| {
				payload
					.as_token()
					.and_then(|token| token.refresh_token.as_ref())
					.is_some_and(|cached| cached.expose() == refresh_token)
			};
			let key = self.cache.find_key_by_value(Category::Client, holds_refresh);
			let body = TokenGrantBody {
				client_id,
				client_secret,
				grant_type: GrantType::RefreshToken,
				scopes: None,
				refresh_token: Some(refresh_token),
			};
			let template = RequestTemplate::post_json(config.endpoint(Endpoint::Token)?, &body)?;
			let token = match self
				.auth_server(&config)
				.call(KIND, &template, oauth::decode_json::<TokenResponse>)
				.await
			{
				Ok(token) => token,
				Err(err) => {
					if matches!(err, Error::RemoteRejection { .. }) {
						self.cache
							.forget_where(Category::Client, |_, payload| holds_refresh(payload));
					}

					return Err(err);
				},
			};

			if let Some(key) = key {
				let mut cached = token.clone();

				if cached.refresh_token.is_none() {
					cached.refresh_token = Some(TokenSecret::new(refresh_token));
				}

				let ttl = common::bounded_ttl(config.client_ttl(), token.expires_in());

				self.cache.set(Category::Client, key, Payload::Token(cached), ttl);
			}

			Ok(token)
		})
		.await
	}
}
