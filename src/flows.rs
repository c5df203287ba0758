//! Client-credential flows and cache administration on top of [`Accounts`].

pub mod common;

mod client_credentials;
mod refresh;
mod revoke;

pub use client_credentials::ClientTokenRequest;
pub use revoke::RevokeRequest;

// self
use crate::{
	_prelude::*,
	auth::Payload,
	cache::{Category, TtlCache},
	config::{Config, ConfigPatch},
	error::ConfigError,
	http::TokenHttpClient,
	oauth::{AuthServer, TransportErrorMapper},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Accounts specialized for the crate's default reqwest transport stack.
pub type ReqwestAccounts = Accounts<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Entry point for both roles: OAuth client (token acquisition, refresh, revocation) and
/// resource server (the scope guard in [`crate::guard`]).
///
/// The handle owns the transport, the live configuration, and the shared [`TtlCache`]. Clones
/// share all three, so a single `Accounts` can be handed to every request handler.
pub struct Accounts<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound authorization-server request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before the retry loop classifies them.
	pub transport_mapper: Arc<M>,
	pub(crate) cache: Arc<TtlCache<Payload>>,
	config: Arc<RwLock<Config>>,
	acquire_guards: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}
impl<C, M> Accounts<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates accounts that reuse the caller-provided transport + mapper pair and a fresh cache.
	pub fn with_http_client(
		config: Config,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let cache = Arc::new(TtlCache::new());

		cache.set_enabled(!config.disable_caching);

		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			cache,
			config: Arc::new(RwLock::new(config)),
			acquire_guards: Default::default(),
		}
	}

	/// Replaces the cache with a caller-owned instance.
	///
	/// The cache's enabled flag is aligned with this configuration's `disable_caching`. The flag
	/// lives on the cache, so handles sharing one cache share it too: the last `with_cache` or
	/// [`configure`](Self::configure) call that touched `disable_caching` wins for all of them.
	pub fn with_cache(mut self, cache: Arc<TtlCache<Payload>>) -> Self {
		cache.set_enabled(!self.config.read().disable_caching);

		self.cache = cache;

		self
	}

	/// Snapshot of the current configuration.
	pub fn config(&self) -> Config {
		self.config.read().clone()
	}

	/// Merges `patch` into the live configuration.
	///
	/// The merged configuration is validated before it replaces the current one; on error
	/// nothing changes. In-flight calls keep the snapshot they started with. Changing
	/// `disable_caching` toggles the cache for every handle sharing it.
	pub fn configure(&self, patch: ConfigPatch) -> Result<(), ConfigError> {
		let mut next = self.config();

		next.merge(patch);
		next.validate()?;

		self.cache.set_enabled(!next.disable_caching);

		*self.config.write() = next;

		Ok(())
	}

	/// Shared cache used by the flows and the guard.
	pub fn cache(&self) -> &Arc<TtlCache<Payload>> {
		&self.cache
	}

	/// Empties one category of the shared cache.
	pub fn clear_cache(&self, category: Category) {
		self.cache.clear(category);
	}

	pub(crate) fn auth_server(&self, config: &Config) -> AuthServer<'_, C, M> {
		AuthServer::new(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			config.retry_policy(),
		)
	}
}
#[cfg(feature = "reqwest")]
impl Accounts<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates accounts backed by a reqwest client with redirects disabled.
	pub fn new(config: Config) -> Result<Self, ConfigError> {
		config.validate()?;

		Ok(Self::with_http_client(
			config,
			ReqwestHttpClient::new()?,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}
}
impl<C, M> Clone for Accounts<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			cache: self.cache.clone(),
			config: self.config.clone(),
			acquire_guards: self.acquire_guards.clone(),
		}
	}
}
impl<C, M> Debug for Accounts<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Accounts")
			.field("config", &*self.config.read())
			.field("cache", &self.cache)
			.finish()
	}
}
