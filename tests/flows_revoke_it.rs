#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use oauth2_accounts::{
	_preludet::*,
	auth::{Payload, TokenInfo, TokenResponse},
	cache::Category,
	flows::{ReqwestAccounts, RevokeRequest},
};

const REVOKE_ROUTE: &str = "/api/oauth/revoke";
const SCOPE: &str = "https://localhost/scope";

fn seed_cache(accounts: &ReqwestAccounts) {
	let cache = accounts.cache();
	let token = TokenResponse::new("jrrtoken").with_refresh_token("jrrrefreshtoken");

	cache.set(Category::Client, SCOPE, Payload::Token(token), Duration::minutes(5));
	cache.set(
		Category::Client,
		"other",
		Payload::Token(TokenResponse::new("othertoken")),
		Duration::minutes(5),
	);
	cache.set(
		Category::Server,
		"jrrtoken",
		Payload::TokenInfo(TokenInfo::default()),
		Duration::minutes(5),
	);
}

#[tokio::test]
async fn revoke_sends_bearer_token_and_returns_acknowledgement() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(REVOKE_ROUTE)
				.header("authorization", "Bearer jrrtoken")
				.json_body(json!({ "client_id": TEST_CLIENT_ID, "type": "application" }));
			then.status(200).body("tokenremoved");
		})
		.await;

	seed_cache(&accounts);

	let ack = accounts
		.revoke_token(RevokeRequest::new("jrrtoken"))
		.await
		.expect("Revoke request should succeed.");

	assert_eq!(ack.as_str(), Some("tokenremoved"));
	assert!(accounts.cache().get(Category::Client, SCOPE).is_none());
	assert!(accounts.cache().get(Category::Server, "jrrtoken").is_none());
	assert!(accounts.cache().get(Category::Client, "other").is_some());

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn revoke_honors_client_and_type_overrides() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(REVOKE_ROUTE)
				.json_body(json!({ "client_id": "other-client", "type": "user" }));
			then.status(200).json_body(json!("applicationaccessremoved"));
		})
		.await;
	let ack = accounts
		.revoke_token(RevokeRequest::new("jrrtoken").client_id("other-client").kind("user"))
		.await
		.expect("Revoke request should succeed.");

	assert_eq!(ack.as_str(), Some("applicationaccessremoved"));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn revoke_evicts_even_when_server_fails() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REVOKE_ROUTE);
			then.status(500).json_body(json!({ "message": "random server error" }));
		})
		.await;

	seed_cache(&accounts);

	let err = accounts
		.revoke_token(RevokeRequest::new("jrrtoken"))
		.await
		.expect_err("Failing server should fail the revoke.");

	assert!(matches!(err, Error::RemoteRequest(_)));
	assert!(accounts.cache().get(Category::Client, SCOPE).is_none());
	assert!(accounts.cache().get(Category::Server, "jrrtoken").is_none());

	mock.assert_calls_async(3).await;
}

#[test]
fn forget_token_matches_access_and_refresh_tokens() {
	let accounts = build_reqwest_test_accounts("https://auth.example.com");

	seed_cache(&accounts);

	assert_eq!(accounts.forget_token("jrrrefreshtoken"), 1);
	assert!(accounts.cache().get(Category::Client, SCOPE).is_none());
	assert!(accounts.cache().get(Category::Server, "jrrtoken").is_some());

	seed_cache(&accounts);

	assert_eq!(accounts.forget_token("jrrtoken"), 2);
	assert_eq!(accounts.forget_token("jrrtoken"), 0);
	assert_eq!(accounts.cache().len(Category::Client), 1);
}
