//! Demonstrates acquiring, reusing, refreshing, and revoking a service token with the default
//! reqwest transport against a mocked authorization server.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use oauth2_accounts::{
	Config,
	flows::{ReqwestAccounts, RevokeRequest},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/oauth/token").json_body(json!({
				"client_id": "demo-client",
				"client_secret": "super-secret",
				"grant_type": "client_credentials",
				"scopes": "email.read profile.read",
			}));
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"refresh_token\":\"demo-refresh\",\"expires_in\":900}",
			);
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/oauth/token").json_body(json!({
				"client_id": "demo-client",
				"client_secret": "super-secret",
				"grant_type": "refresh_token",
				"refresh_token": "demo-refresh",
			}));
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-access-2\",\"expires_in\":900}");
		})
		.await;
	let revoke_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/oauth/revoke").header("authorization", "Bearer demo-access-2");
			then.status(200).body("tokenremoved");
		})
		.await;
	let config = Config::builder(server.base_url())
		.path("/api")
		.client_credentials("demo-client", "super-secret")
		.client_expiry(600)
		.build()?;
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let accounts =
		ReqwestAccounts::with_http_client(config, http_client, ReqwestTransportErrorMapper);
	let first = accounts.acquire_token(["profile.read", "email.read"]).await?;
	let second = accounts.acquire_token(["email.read", "profile.read"]).await?;

	println!("Reusable access token: {}.", first.access_token.expose());
	assert_eq!(first, second);

	let refreshed = accounts.refresh_token("demo-refresh").await?;

	println!("Refreshed access token: {}.", refreshed.access_token.expose());

	let ack = accounts.revoke_token(RevokeRequest::new("demo-access-2")).await?;

	println!("Revoke acknowledgement: {}.", ack.0);

	token_mock.assert_async().await;
	refresh_mock.assert_async().await;
	revoke_mock.assert_async().await;

	Ok(())
}
