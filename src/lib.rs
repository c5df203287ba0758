//! OAuth 2.0 client-credentials helper and scope-guarding middleware.
//!
//! [`Accounts`] issues, caches, refreshes, and revokes service tokens. [`RequireScopes`] gates
//! inbound requests on remotely introspected scopes. Both share one category-partitioned
//! [`TtlCache`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod flows;
pub mod guard;
pub mod http;
pub mod oauth;
pub mod obs;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for unit and integration tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::Config, flows::ReqwestAccounts, http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
	};

	/// Client identifier configured on test accounts.
	pub const TEST_CLIENT_ID: &str = "test_id";
	/// Client secret configured on test accounts.
	pub const TEST_CLIENT_SECRET: &str = "test_secret";
	/// Route prefix configured on test accounts.
	pub const TEST_PATH: &str = "/api";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Returns a validated configuration pointing at `base_url` with test credentials and no
	/// retry backoff, so exhausted-retry tests finish immediately.
	pub fn test_config(base_url: &str) -> Config {
		Config::builder(base_url)
			.path(TEST_PATH)
			.client_credentials(TEST_CLIENT_ID, TEST_CLIENT_SECRET)
			.retry_backoff(StdDuration::ZERO)
			.build()
			.expect("Test configuration should be valid.")
	}

	/// Constructs reqwest-backed [`ReqwestAccounts`] with a fresh cache for `config`.
	pub fn build_reqwest_test_accounts_with(config: Config) -> ReqwestAccounts {
		ReqwestAccounts::with_http_client(
			config,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}

	/// Constructs reqwest-backed [`ReqwestAccounts`] pointing at `base_url` with the default test
	/// configuration.
	pub fn build_reqwest_test_accounts(base_url: &str) -> ReqwestAccounts {
		build_reqwest_test_accounts_with(test_config(base_url))
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeSet, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map as JsonMap, Value as JsonValue};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;

pub use crate::{
	cache::{Category, TtlCache},
	config::{Config, ConfigPatch},
	error::{Error, Result},
	flows::Accounts,
	guard::{AuthorizedClient, RequireScopes},
};

#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _, tower as _};
