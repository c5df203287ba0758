//! Demonstrates guarding a `tower` service with [`RequireScopes`] so only tokens granting
//! `reports.read` reach the handler.
//!
//! [`RequireScopes`]: oauth2_accounts::RequireScopes

// std
use std::convert::Infallible;
// crates.io
use color_eyre::Result;
use http::{Request, Response};
use httpmock::prelude::*;
use tower::{ServiceBuilder, ServiceExt, service_fn};
// self
use oauth2_accounts::{
	AuthorizedClient, Config, flows::ReqwestAccounts, guard::ACCESS_TOKEN_HEADER,
	http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper, reqwest::Client,
};

async fn reports(request: Request<String>) -> Result<Response<String>, Infallible> {
	let client = request
		.extensions()
		.get::<AuthorizedClient>()
		.and_then(|client| client.client_id.clone())
		.unwrap_or_else(|| "unknown".into());

	Ok(Response::new(format!("Reports for {client}.")))
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let tokeninfo_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth/tokeninfo").query_param("access_token", "demo-access");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"scopes\":\"reports.read reports.write\",\"client_id\":\"dashboard\"}");
		})
		.await;
	let config = Config::builder(server.base_url()).server_expiry(60).build()?;
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let accounts =
		ReqwestAccounts::with_http_client(config, http_client, ReqwestTransportErrorMapper);
	let service = ServiceBuilder::new()
		.layer(accounts.require_scopes::<_, _, String>(["reports.read"]).into_layer())
		.service(service_fn(reports));

	for token in [Some("demo-access"), Some("demo-access"), None] {
		let mut request = Request::builder();

		if let Some(token) = token {
			request = request.header(ACCESS_TOKEN_HEADER, token);
		}

		let response = service.clone().oneshot(request.body(String::new())?).await?;

		println!("{}: {}", response.status(), response.body());
	}

	// The second request is served from the introspection cache.
	tokeninfo_mock.assert_calls_async(1).await;

	Ok(())
}
