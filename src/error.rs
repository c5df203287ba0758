//! Error taxonomy shared by the client-credential flows and the resource-server guard.

// self
use crate::{_prelude::*, auth::ScopeValidationError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// The `Display` output of every variant is the message handed to callers (and to the guard's
/// error handler), so the guard-facing variants carry their exact user-visible wording.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The inbound request carried no `access-token` header.
	#[error("Access token is required.")]
	MissingToken,
	/// Introspection succeeded but returned no scopes.
	#[error("Something went wrong, server did not return scopes, please try again.")]
	ScopesMissing,
	/// The token is valid but grants none of the required scopes.
	#[error(
		"You need at least one of the ff. scopes to access this endpoint: {}",
		.required.join(" ")
	)]
	InsufficientScope {
		/// Acceptable scopes, in the order the guard was configured with.
		required: Vec<String>,
	},
	/// The authorization server answered with a structured error message.
	#[error("{message}")]
	RemoteRejection {
		/// Message taken verbatim from the response body.
		message: String,
		/// HTTP status code of the rejecting response, when available.
		status: Option<u16>,
	},
	/// The authorization server could not be reached or kept failing.
	#[error(transparent)]
	RemoteRequest(#[from] RemoteRequestError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Unwraps the remote `message` carried by a failed request into
	/// [`Error::RemoteRejection`], regardless of whether the failure was retryable.
	///
	/// Other variants pass through untouched.
	pub fn surface_remote_message(self) -> Self {
		match self {
			Self::RemoteRequest(err) => match err.source.remote_message() {
				Some(message) => Self::RemoteRejection {
					message: message.to_owned(),
					status: err.source.status(),
				},
				None => Self::RemoteRequest(err),
			},
			other => other,
		}
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// No base URL was configured.
	#[error("Configuration is missing base_url.")]
	MissingBaseUrl,
	/// The configured base URL cannot be parsed.
	#[error("Configured base_url `{value}` is not a valid URL.")]
	InvalidBaseUrl {
		/// Offending value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// An endpoint URL assembled from base URL and path cannot be parsed.
	#[error("Endpoint URL `{value}` is not a valid URL.")]
	InvalidEndpoint {
		/// Offending value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Client-credential flows need both `client_id` and `client_secret`.
	#[error("Client credentials flows require client_id and client_secret.")]
	MissingClientCredentials,
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] ScopeValidationError),
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// JSON request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody {
		/// Underlying serializer failure.
		#[source]
		source: serde_json::Error,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// A call to the authorization server that failed after the retry budget was spent (or on the
/// first non-retryable failure).
#[derive(Debug, ThisError)]
#[error("Authorization server request failed after {attempts} attempt(s): {source}")]
pub struct RemoteRequestError {
	/// Number of attempts made, including the failing one.
	pub attempts: u32,
	/// Failure observed on the last attempt.
	#[source]
	pub source: RemoteFailure,
}
impl RemoteRequestError {
	/// Converts into the caller-facing [`Error`]: a non-retryable response carrying a structured
	/// message becomes [`Error::RemoteRejection`], everything else stays a
	/// [`Error::RemoteRequest`].
	pub fn into_error(self) -> Error {
		if !self.source.is_retryable()
			&& let Some(message) = self.source.remote_message()
		{
			return Error::RemoteRejection {
				message: message.to_owned(),
				status: self.source.status(),
			};
		}

		Error::RemoteRequest(self)
	}
}

/// Failure observed on a single attempt against the authorization server.
#[derive(Debug, ThisError)]
pub enum RemoteFailure {
	/// The server answered with a non-success status.
	#[error("Authorization server responded with HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// `message` field of the JSON error body, when present.
		message: Option<String>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// The attempt exceeded its deadline.
	#[error("Request to the authorization server timed out.")]
	Timeout {
		/// Deadline that elapsed, when enforced locally.
		timeout: Option<StdDuration>,
	},
	/// The server answered successfully with a body that does not match the expected shape.
	#[error("Authorization server returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
	/// The HTTP client refused to send the request.
	#[error("HTTP client rejected the request: {message}.")]
	Client {
		/// Client-supplied description.
		message: String,
	},
	/// Network-level failure.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl RemoteFailure {
	/// Returns `true` for failures worth another attempt: transport errors, timeouts, 5xx, and
	/// 429 responses.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Status { status, .. } => *status >= 500 || *status == 429,
			Self::Timeout { .. } | Self::Transport(_) => true,
			Self::ResponseParse { .. } | Self::Client { .. } => false,
		}
	}

	/// HTTP status code of the failing response, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status { status, .. } | Self::ResponseParse { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Structured `message` returned by the server, if any.
	pub fn remote_message(&self) -> Option<&str> {
		match self {
			Self::Status { message, .. } => message.as_deref(),
			_ => None,
		}
	}

	/// Retry-After hint returned by the server, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Status { retry_after, .. } => *retry_after,
			_ => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the authorization server.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the authorization server.")]
	Io(#[from] std::io::Error),
	/// The transport reported a failure it could not classify.
	#[error("HTTP client error occurred while calling the authorization server: {message}.")]
	Unclassified {
		/// Transport-supplied description.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
