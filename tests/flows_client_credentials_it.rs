#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use oauth2_accounts::{
	_preludet::*,
	cache::Category,
	config::{Config, ConfigPatch},
	error::{RemoteFailure, RemoteRequestError},
	flows::ClientTokenRequest,
};

const TOKEN_ROUTE: &str = "/api/oauth/token";
const SCOPE: &str = "https://localhost/scope";

#[tokio::test]
async fn acquire_token_caches_token_after_success() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_ROUTE).json_body(json!({
				"client_id": TEST_CLIENT_ID,
				"client_secret": TEST_CLIENT_SECRET,
				"grant_type": "client_credentials",
				"scopes": SCOPE,
			}));
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "access_token": "jrrtoken", "refresh_token": "jrrrefreshtoken" }));
		})
		.await;
	let first =
		accounts.acquire_token([SCOPE]).await.expect("Initial token request should succeed.");
	let second = accounts.acquire_token([SCOPE]).await.expect("Cached token should be returned.");

	assert_eq!(first.access_token.expose(), "jrrtoken");
	assert_eq!(first, second);
	assert_eq!(
		first.refresh_token.as_ref().map(|token| token.expose()),
		Some("jrrrefreshtoken")
	);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn scope_permutations_share_one_cache_entry() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_ROUTE).json_body(json!({
				"client_id": TEST_CLIENT_ID,
				"client_secret": TEST_CLIENT_SECRET,
				"grant_type": "client_credentials",
				"scopes": "a b",
			}));
			then.status(200).json_body(json!({ "access_token": "jrrtoken" }));
		})
		.await;

	accounts.acquire_token(["b", "a"]).await.expect("First permutation should succeed.");
	accounts.acquire_token(["a", "b", "a"]).await.expect("Second permutation should succeed.");

	mock.assert_calls_async(1).await;

	let cached = accounts.cache().get_category(Category::Client);

	assert_eq!(cached.len(), 1);
	assert!(cached.contains_key("a b"));
}

#[tokio::test]
async fn zero_client_expiry_refetches_every_time() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_ROUTE);
			then.status(200).json_body(json!({ "access_token": "jrrtoken" }));
		})
		.await;

	accounts
		.configure(ConfigPatch { client_expiry: Some(0), ..Default::default() })
		.expect("Zero client expiry should be accepted.");
	accounts.acquire_token([SCOPE]).await.expect("First request should succeed.");
	accounts.acquire_token([SCOPE]).await.expect("Second request should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn advertised_expiry_bounds_cache_lifetime() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_ROUTE);
			then.status(200).json_body(json!({ "access_token": "jrrtoken", "expires_in": 60 }));
		})
		.await;

	accounts.acquire_token([SCOPE]).await.expect("Token request should succeed.");

	let entry = accounts
		.cache()
		.get_category(Category::Client)
		.remove(SCOPE)
		.expect("Token should be cached under its scope key.");

	assert!(entry.remaining_at(OffsetDateTime::now_utc()) <= Duration::seconds(60));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn clear_cache_forces_new_request() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_ROUTE);
			then.status(200).json_body(json!({ "access_token": "jrrtoken" }));
		})
		.await;

	accounts.acquire_token([SCOPE]).await.expect("First request should succeed.");
	accounts.clear_cache(Category::Client);
	accounts.acquire_token([SCOPE]).await.expect("Request after clearing should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn force_refresh_bypasses_cache() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_ROUTE);
			then.status(200).json_body(json!({ "access_token": "freshjrrtoken" }));
		})
		.await;
	let request = ClientTokenRequest::new([SCOPE]).expect("Scope should be valid.");

	accounts.acquire_token_with(request.clone()).await.expect("First request should succeed.");

	let forced = accounts
		.acquire_token_with(request.force_refresh())
		.await
		.expect("Forced request should succeed.");

	assert_eq!(forced.access_token.expose(), "freshjrrtoken");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn disabled_cache_always_fetches() {
	let server = MockServer::start_async().await;
	let config = Config {
		disable_caching: true,
		..test_config(&server.base_url())
	};
	let accounts = build_reqwest_test_accounts_with(config);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_ROUTE);
			then.status(200).json_body(json!({ "access_token": "jrrtoken" }));
		})
		.await;

	accounts.acquire_token([SCOPE]).await.expect("First request should succeed.");
	accounts.acquire_token([SCOPE]).await.expect("Second request should succeed.");

	mock.assert_calls_async(2).await;
	assert!(accounts.cache().get(Category::Client, SCOPE).is_none());
}

#[tokio::test]
async fn concurrent_requests_share_one_fetch() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_ROUTE);
			then.status(200)
				.delay(StdDuration::from_millis(50))
				.json_body(json!({ "access_token": "jrrtoken" }));
		})
		.await;
	let tasks = (0..8)
		.map(|_| {
			let accounts = accounts.clone();

			tokio::spawn(async move { accounts.acquire_token(["b", "a"]).await })
		})
		.collect::<Vec<_>>();

	for task in tasks {
		let token = task
			.await
			.expect("Token task should not panic.")
			.expect("Concurrent request should succeed.");

		assert_eq!(token.access_token.expose(), "jrrtoken");
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn server_errors_exhaust_retry_budget() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_ROUTE);
			then.status(500).json_body(json!({ "message": "random server error" }));
		})
		.await;
	let err = accounts
		.acquire_token([SCOPE])
		.await
		.expect_err("Persistent 500 responses should fail the request.");

	match err {
		Error::RemoteRequest(RemoteRequestError {
			attempts,
			source: RemoteFailure::Status { status, message, .. },
		}) => {
			assert_eq!(attempts, 3);
			assert_eq!(status, 500);
			assert_eq!(message.as_deref(), Some("random server error"));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	mock.assert_calls_async(3).await;
	assert!(accounts.cache().is_empty(Category::Client));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_ROUTE);
			then.status(401).json_body(json!({ "message": "invalid client credentials" }));
		})
		.await;
	let err = accounts
		.acquire_token([SCOPE])
		.await
		.expect_err("Rejected credentials should fail the request.");

	match &err {
		Error::RemoteRejection { message, status } => {
			assert_eq!(message, "invalid client credentials");
			assert_eq!(*status, Some(401));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	assert_eq!(err.to_string(), "invalid client credentials");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn missing_credentials_fail_before_any_request() {
	let server = MockServer::start_async().await;
	let config = Config { client_secret: String::new(), ..test_config(&server.base_url()) };
	let accounts = build_reqwest_test_accounts_with(config);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_ROUTE);
			then.status(200).json_body(json!({ "access_token": "jrrtoken" }));
		})
		.await;
	let err = accounts
		.acquire_token([SCOPE])
		.await
		.expect_err("Missing client secret should fail the request.");

	assert!(matches!(err, Error::Config(_)));

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn malformed_success_body_is_not_retried() {
	let server = MockServer::start_async().await;
	let accounts = build_reqwest_test_accounts(&server.base_url());
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_ROUTE);
			then.status(200).json_body(json!({ "token": "jrrtoken" }));
		})
		.await;
	let err = accounts
		.acquire_token([SCOPE])
		.await
		.expect_err("A body without access_token should fail the request.");

	assert!(matches!(
		err,
		Error::RemoteRequest(RemoteRequestError {
			attempts: 1,
			source: RemoteFailure::ResponseParse { status: 200, .. },
		})
	));

	mock.assert_calls_async(1).await;
}
