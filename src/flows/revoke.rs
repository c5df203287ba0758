//! Token revocation and cache-only eviction.

// self
use crate::{
	_prelude::*,
	auth::{RevokeAck, TokenSecret},
	cache::Category,
	flows::{Accounts, common},
	http::TokenHttpClient,
	oauth::{self, Endpoint, RequestTemplate, RevokeBody, TransportErrorMapper},
	obs::{FlowKind, FlowSpan},
};

/// Parameters for [`Accounts::revoke_token`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevokeRequest {
	/// Token to revoke; sent as the bearer credential.
	pub token: TokenSecret,
	/// Client the token belongs to; defaults to the configured client id.
	pub client_id: Option<String>,
	/// Revocation type sent as `type`.
	pub kind: String,
}
impl RevokeRequest {
	/// Revocation type used unless overridden.
	pub const DEFAULT_TYPE: &'static str = "application";

	/// Creates a request revoking `token` for the configured client.
	pub fn new(token: impl Into<String>) -> Self {
		Self { token: TokenSecret::new(token), client_id: None, kind: Self::DEFAULT_TYPE.into() }
	}

	/// Revokes on behalf of another client.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Overrides the revocation type.
	pub fn kind(mut self, kind: impl Into<String>) -> Self {
		self.kind = kind.into();

		self
	}
}

impl<C, M> Accounts<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Evicts the token locally, then asks the authorization server to revoke it.
	///
	/// Eviction happens before the network call, so the token is gone from the cache even when
	/// the revoke request fails.
	pub async fn revoke_token(&self, request: RevokeRequest) -> Result<RevokeAck> {
		const KIND: FlowKind = FlowKind::Revoke;

		let span =
			FlowSpan::new(KIND, "revoke_token").with_token_fingerprint(&request.token.fingerprint());

		common::observe(KIND, span, async move {
			let config = self.config();

			self.forget_token(request.token.expose());

			let body = RevokeBody {
				client_id: request.client_id.as_deref().unwrap_or(&config.client_id),
				kind: &request.kind,
			};
			let template = RequestTemplate::post_json(config.endpoint(Endpoint::Revoke)?, &body)?
				.with_bearer(request.token.clone());

			self.auth_server(&config).call(KIND, &template, oauth::decode_ack).await
		})
		.await
	}

	/// Removes `token` from the cache without contacting the authorization server.
	///
	/// Drops every client entry whose access or refresh token equals `token` and the guard's
	/// introspection entry keyed by it. Returns the number of entries removed.
	pub fn forget_token(&self, token: &str) -> usize {
		let client = self.cache.forget_where(Category::Client, |_, payload| {
			payload.as_token().is_some_and(|cached| cached.matches_token(token))
		});
		let server = usize::from(self.cache.forget(Category::Server, token));

		client + server
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn revoke_requests_default_to_application_type() {
		let request = RevokeRequest::new("jrrtoken");

		assert_eq!(request.kind, "application");
		assert_eq!(request.client_id, None);

		let request = request.client_id("other-client").kind("user");

		assert_eq!(request.kind, "user");
		assert_eq!(request.client_id.as_deref(), Some("other-client"));
	}
}
