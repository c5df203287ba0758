//! Runtime configuration for the authorization-server client and the guard.
//!
//! [`Config`] is deserializable so host processes can load it from any serde format; missing
//! fields fall back to their defaults. [`ConfigPatch`] carries partial updates merged at runtime
//! through [`Accounts::configure`](crate::flows::Accounts::configure).

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	oauth::{Endpoint, RetryPolicy},
};

/// Settings shared by the client-credential flows and the resource-server guard.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Absolute base URL of the authorization server.
	pub base_url: String,
	/// Route prefix placed between `base_url` and the `/oauth/*` routes.
	pub path: String,
	/// OAuth client identifier used by the client-credential flows.
	pub client_id: String,
	/// OAuth client secret used by the client-credential flows.
	pub client_secret: String,
	/// Lifetime of cached client tokens, in seconds.
	pub client_expiry: u64,
	/// Lifetime of cached introspection results, in seconds.
	pub server_expiry: u64,
	/// Suppresses every cache read and write while set.
	pub disable_caching: bool,
	/// Total number of attempts per outbound call (values below 1 behave as 1).
	pub retry_count: u32,
	/// Per-attempt deadline in milliseconds; `0` disables the local deadline.
	pub request_timeout_ms: u64,
	/// Base delay between attempts in milliseconds; `0` retries immediately.
	pub retry_backoff_ms: u64,
}
impl Config {
	/// Default lifetime for cached client tokens, in seconds.
	pub const DEFAULT_CLIENT_EXPIRY: u64 = 300;
	/// Default per-attempt deadline, in milliseconds.
	pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
	/// Default number of attempts per outbound call.
	pub const DEFAULT_RETRY_COUNT: u32 = 3;
	/// Default base delay between attempts, in milliseconds.
	pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;
	/// Default lifetime for cached introspection results, in seconds.
	pub const DEFAULT_SERVER_EXPIRY: u64 = 300;

	/// Starts a builder for the authorization server at `base_url`.
	pub fn builder(base_url: impl Into<String>) -> ConfigBuilder {
		ConfigBuilder::new(base_url)
	}

	/// Checks that `base_url` is present and absolute.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let base_url = self.base_url.trim();

		if base_url.is_empty() {
			return Err(ConfigError::MissingBaseUrl);
		}

		Url::parse(base_url).map_err(|source| ConfigError::InvalidBaseUrl {
			value: self.base_url.clone(),
			source,
		})?;

		Ok(())
	}

	/// Resolves `{base_url}{path}{route}` for the provided endpoint.
	pub fn endpoint(&self, endpoint: Endpoint) -> Result<Url, ConfigError> {
		self.validate()?;

		let value = format!(
			"{}{}{}",
			self.base_url.trim().trim_end_matches('/'),
			normalize_path(&self.path),
			endpoint.route()
		);

		Url::parse(&value).map_err(|source| ConfigError::InvalidEndpoint { value, source })
	}

	/// Returns the client id and secret, failing when either is empty.
	pub fn client_credentials(&self) -> Result<(&str, &str), ConfigError> {
		if self.client_id.is_empty() || self.client_secret.is_empty() {
			return Err(ConfigError::MissingClientCredentials);
		}

		Ok((&self.client_id, &self.client_secret))
	}

	/// Lifetime applied to cached client tokens.
	pub fn client_ttl(&self) -> Duration {
		seconds(self.client_expiry)
	}

	/// Lifetime applied to cached introspection results.
	pub fn server_ttl(&self) -> Duration {
		seconds(self.server_expiry)
	}

	/// Retry policy derived from `retry_count`, `retry_backoff_ms`, and `request_timeout_ms`.
	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy {
			attempts: self.retry_count.max(1),
			backoff: StdDuration::from_millis(self.retry_backoff_ms),
			timeout: (self.request_timeout_ms > 0)
				.then(|| StdDuration::from_millis(self.request_timeout_ms)),
		}
	}

	/// Applies every field present in `patch`.
	pub fn merge(&mut self, patch: ConfigPatch) {
		let ConfigPatch {
			base_url,
			path,
			client_id,
			client_secret,
			client_expiry,
			server_expiry,
			disable_caching,
			retry_count,
			request_timeout_ms,
			retry_backoff_ms,
		} = patch;

		if let Some(v) = base_url {
			self.base_url = v;
		}
		if let Some(v) = path {
			self.path = v;
		}
		if let Some(v) = client_id {
			self.client_id = v;
		}
		if let Some(v) = client_secret {
			self.client_secret = v;
		}
		if let Some(v) = client_expiry {
			self.client_expiry = v;
		}
		if let Some(v) = server_expiry {
			self.server_expiry = v;
		}
		if let Some(v) = disable_caching {
			self.disable_caching = v;
		}
		if let Some(v) = retry_count {
			self.retry_count = v;
		}
		if let Some(v) = request_timeout_ms {
			self.request_timeout_ms = v;
		}
		if let Some(v) = retry_backoff_ms {
			self.retry_backoff_ms = v;
		}
	}
}
impl Default for Config {
	fn default() -> Self {
		Self {
			base_url: String::new(),
			path: String::new(),
			client_id: String::new(),
			client_secret: String::new(),
			client_expiry: Self::DEFAULT_CLIENT_EXPIRY,
			server_expiry: Self::DEFAULT_SERVER_EXPIRY,
			disable_caching: false,
			retry_count: Self::DEFAULT_RETRY_COUNT,
			request_timeout_ms: Self::DEFAULT_REQUEST_TIMEOUT_MS,
			retry_backoff_ms: Self::DEFAULT_RETRY_BACKOFF_MS,
		}
	}
}
impl Debug for Config {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Config")
			.field("base_url", &self.base_url)
			.field("path", &self.path)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &!self.client_secret.is_empty())
			.field("client_expiry", &self.client_expiry)
			.field("server_expiry", &self.server_expiry)
			.field("disable_caching", &self.disable_caching)
			.field("retry_count", &self.retry_count)
			.field("request_timeout_ms", &self.request_timeout_ms)
			.field("retry_backoff_ms", &self.retry_backoff_ms)
			.finish()
	}
}

/// Partial configuration update; `None` fields keep their current value.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
	/// Replacement for [`Config::base_url`].
	pub base_url: Option<String>,
	/// Replacement for [`Config::path`].
	pub path: Option<String>,
	/// Replacement for [`Config::client_id`].
	pub client_id: Option<String>,
	/// Replacement for [`Config::client_secret`].
	pub client_secret: Option<String>,
	/// Replacement for [`Config::client_expiry`].
	pub client_expiry: Option<u64>,
	/// Replacement for [`Config::server_expiry`].
	pub server_expiry: Option<u64>,
	/// Replacement for [`Config::disable_caching`].
	pub disable_caching: Option<bool>,
	/// Replacement for [`Config::retry_count`].
	pub retry_count: Option<u32>,
	/// Replacement for [`Config::request_timeout_ms`].
	pub request_timeout_ms: Option<u64>,
	/// Replacement for [`Config::retry_backoff_ms`].
	pub retry_backoff_ms: Option<u64>,
}
impl Debug for ConfigPatch {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConfigPatch")
			.field("base_url", &self.base_url)
			.field("path", &self.path)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("client_expiry", &self.client_expiry)
			.field("server_expiry", &self.server_expiry)
			.field("disable_caching", &self.disable_caching)
			.field("retry_count", &self.retry_count)
			.field("request_timeout_ms", &self.request_timeout_ms)
			.field("retry_backoff_ms", &self.retry_backoff_ms)
			.finish()
	}
}

/// Builder for [`Config`] values.
#[derive(Debug)]
pub struct ConfigBuilder {
	config: Config,
}
impl ConfigBuilder {
	/// Creates a builder with default settings for `base_url`.
	pub fn new(base_url: impl Into<String>) -> Self {
		Self { config: Config { base_url: base_url.into(), ..Default::default() } }
	}

	/// Sets the route prefix placed before `/oauth/*`.
	pub fn path(mut self, path: impl Into<String>) -> Self {
		self.config.path = path.into();

		self
	}

	/// Sets the client credentials used by the client-credential flows.
	pub fn client_credentials(
		mut self,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		self.config.client_id = client_id.into();
		self.config.client_secret = client_secret.into();

		self
	}

	/// Sets the client token lifetime in seconds.
	pub fn client_expiry(mut self, seconds: u64) -> Self {
		self.config.client_expiry = seconds;

		self
	}

	/// Sets the introspection result lifetime in seconds.
	pub fn server_expiry(mut self, seconds: u64) -> Self {
		self.config.server_expiry = seconds;

		self
	}

	/// Enables or disables the cache.
	pub fn disable_caching(mut self, disabled: bool) -> Self {
		self.config.disable_caching = disabled;

		self
	}

	/// Sets the total number of attempts per outbound call.
	pub fn retry_count(mut self, attempts: u32) -> Self {
		self.config.retry_count = attempts;

		self
	}

	/// Sets the per-attempt deadline; [`StdDuration::ZERO`] disables it.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.config.request_timeout_ms = duration_millis(timeout);

		self
	}

	/// Sets the base delay between attempts; [`StdDuration::ZERO`] retries immediately.
	pub fn retry_backoff(mut self, backoff: StdDuration) -> Self {
		self.config.retry_backoff_ms = duration_millis(backoff);

		self
	}

	/// Validates and returns the configuration.
	pub fn build(self) -> Result<Config, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

fn normalize_path(path: &str) -> String {
	let trimmed = path.trim().trim_matches('/');

	if trimmed.is_empty() { String::new() } else { format!("/{trimmed}") }
}

fn seconds(value: u64) -> Duration {
	Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

fn duration_millis(value: StdDuration) -> u64 {
	u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
}
