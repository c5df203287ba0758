//! Payloads exchanged with the authorization server and stored in the shared cache.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
};

/// Token endpoint response.
///
/// Only `access_token` is required. Every other field is preserved so callers receive the
/// response exactly as the server shaped it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
	/// Access token issued to the client.
	pub access_token: TokenSecret,
	/// Refresh token, when the server issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Remaining response fields, kept verbatim.
	#[serde(flatten)]
	pub extra: JsonMap<String, JsonValue>,
}
impl TokenResponse {
	/// Creates a response carrying only an access token.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: None,
			extra: JsonMap::new(),
		}
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(refresh_token));

		self
	}

	/// Lifetime advertised by the server through `expires_in`, if any.
	///
	/// Accepts both numeric and numeric-string encodings; non-positive values are ignored.
	pub fn expires_in(&self) -> Option<Duration> {
		let secs = match self.extra.get("expires_in")? {
			JsonValue::Number(n) => n.as_i64()?,
			JsonValue::String(s) => s.trim().parse().ok()?,
			_ => return None,
		};

		(secs > 0).then(|| Duration::seconds(secs))
	}

	/// Returns `true` if `token` is this response's access or refresh token.
	pub fn matches_token(&self, token: &str) -> bool {
		self.access_token.expose() == token
			|| self.refresh_token.as_ref().is_some_and(|refresh| refresh.expose() == token)
	}
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("extra", &self.extra)
			.finish()
	}
}

/// Introspection (`/oauth/tokeninfo`) response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenInfo(pub JsonMap<String, JsonValue>);
impl TokenInfo {
	/// Scopes granted to the token, or `None` when `scopes` is absent, not a string, or blank.
	pub fn scopes(&self) -> Option<ScopeSet> {
		let scopes = ScopeSet::from_delimited(self.0.get("scopes")?.as_str()?);

		if scopes.is_empty() { None } else { Some(scopes) }
	}

	/// Client the token was issued to, if reported.
	pub fn client_id(&self) -> Option<&str> {
		self.0.get("client_id")?.as_str()
	}

	/// Absolute expiry from the `exp` claim (Unix seconds), if reported.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		let exp = match self.0.get("exp")? {
			JsonValue::Number(n) => n.as_i64()?,
			JsonValue::String(s) => s.trim().parse().ok()?,
			_ => return None,
		};

		OffsetDateTime::from_unix_timestamp(exp).ok()
	}

	/// Returns `true` once the `exp` claim has been reached; tokens without `exp` never expire
	/// on their own.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at().is_some_and(|exp| exp <= now)
	}

	/// Raw field lookup.
	pub fn get(&self, field: &str) -> Option<&JsonValue> {
		self.0.get(field)
	}
}

/// Revoke endpoint acknowledgement.
///
/// JSON bodies are kept as parsed; anything else is kept as a JSON string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevokeAck(pub JsonValue);
impl RevokeAck {
	/// Builds an acknowledgement from a raw response body.
	pub fn from_body(body: &[u8]) -> Self {
		match serde_json::from_slice(body) {
			Ok(value) => Self(value),
			Err(_) => Self(JsonValue::String(String::from_utf8_lossy(body).into_owned())),
		}
	}

	/// The acknowledgement as a string, when the server replied with one.
	pub fn as_str(&self) -> Option<&str> {
		self.0.as_str()
	}
}

/// Value stored in the shared cache.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
	/// Client token stored under its canonical scope string.
	Token(TokenResponse),
	/// Introspection result stored under the raw bearer token.
	TokenInfo(TokenInfo),
}
impl Payload {
	/// Borrows the token response, if this is one.
	pub fn as_token(&self) -> Option<&TokenResponse> {
		match self {
			Self::Token(token) => Some(token),
			Self::TokenInfo(_) => None,
		}
	}

	/// Borrows the introspection result, if this is one.
	pub fn as_token_info(&self) -> Option<&TokenInfo> {
		match self {
			Self::TokenInfo(info) => Some(info),
			Self::Token(_) => None,
		}
	}

	/// Takes the token response, if this is one.
	pub fn into_token(self) -> Option<TokenResponse> {
		match self {
			Self::Token(token) => Some(token),
			Self::TokenInfo(_) => None,
		}
	}

	/// Takes the introspection result, if this is one.
	pub fn into_token_info(self) -> Option<TokenInfo> {
		match self {
			Self::TokenInfo(info) => Some(info),
			Self::Token(_) => None,
		}
	}
}
impl From<TokenResponse> for Payload {
	fn from(value: TokenResponse) -> Self {
		Self::Token(value)
	}
}
impl From<TokenInfo> for Payload {
	fn from(value: TokenInfo) -> Self {
		Self::TokenInfo(value)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_response_keeps_unknown_fields() {
		let raw = r#"{"access_token":"jrrtoken","refresh_token":"jrrrefreshtoken","expires_in":3600,"token_type":"bearer"}"#;
		let token: TokenResponse =
			serde_json::from_str(raw).expect("Token response should deserialize.");

		assert_eq!(token.access_token.expose(), "jrrtoken");
		assert_eq!(token.expires_in(), Some(Duration::hours(1)));
		assert_eq!(token.extra.get("token_type"), Some(&JsonValue::from("bearer")));
		assert!(token.matches_token("jrrrefreshtoken"));
		assert!(!token.matches_token("othertoken"));

		let echoed: JsonValue =
			serde_json::to_value(&token).expect("Token response should serialize.");
		let original: JsonValue = serde_json::from_str(raw).expect("Fixture should parse.");

		assert_eq!(echoed, original);
	}

	#[test]
	fn token_response_requires_access_token() {
		assert!(serde_json::from_str::<TokenResponse>(r#"{"refresh_token":"x"}"#).is_err());
	}

	#[test]
	fn token_info_reads_scopes_client_and_expiry() {
		let info: TokenInfo = serde_json::from_value(serde_json::json!({
			"scopes": "a b",
			"client_id": "client-1",
			"exp": 1_700_000_000,
		}))
		.expect("Token info should deserialize.");
		let exp = OffsetDateTime::from_unix_timestamp(1_700_000_000)
			.expect("Fixture timestamp should be valid.");

		assert_eq!(info.scopes().expect("Scopes should be present.").normalized(), "a b");
		assert_eq!(info.client_id(), Some("client-1"));
		assert_eq!(info.expires_at(), Some(exp));
		assert!(info.is_expired_at(exp));
		assert!(!info.is_expired_at(exp - Duration::seconds(1)));
	}

	#[test]
	fn blank_scopes_count_as_missing() {
		let info: TokenInfo = serde_json::from_value(serde_json::json!({ "scopes": "  " }))
			.expect("Token info should deserialize.");

		assert!(info.scopes().is_none());
		assert!(TokenInfo::default().scopes().is_none());
		assert!(!TokenInfo::default().is_expired_at(OffsetDateTime::now_utc()));
	}

	#[test]
	fn revoke_ack_accepts_plain_text() {
		assert_eq!(RevokeAck::from_body(b"tokenremoved").as_str(), Some("tokenremoved"));
		assert_eq!(RevokeAck::from_body(b"\"tokenremoved\"").as_str(), Some("tokenremoved"));
		assert_eq!(
			RevokeAck::from_body(br#"{"ok":true}"#).0,
			serde_json::json!({ "ok": true })
		);
	}
}
