#![cfg(all(feature = "reqwest", feature = "test"))]

// self
use oauth2_accounts::{
	_preludet::*,
	cache::Category,
	config::Config,
	error::{RemoteFailure, RemoteRequestError, TransportError},
	flows::{Accounts, RevokeRequest},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth::{
		TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	},
	obs::FlowKind,
};

const SCOPE: &str = "https://localhost/scope";

#[derive(Debug)]
enum FakeTransportError {
	Throttled,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for FakeTransportError {}

#[derive(Clone, Copy, Debug)]
enum Behavior {
	Throttle(Duration),
	Hang,
	Disconnect,
	SlowTokenInfo(StdDuration),
}

#[derive(Clone, Copy)]
struct FakeHttpClient {
	behavior: Behavior,
}
impl TokenHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHttpHandle { slot, behavior: self.behavior }
	}
}

struct FakeHttpHandle {
	slot: ResponseMetadataSlot,
	behavior: Behavior,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let behavior = self.behavior;

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);

			match behavior {
				Behavior::Throttle(retry_after) => {
					slot.store(ResponseMetadata { status: Some(429), retry_after: Some(retry_after) });

					Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Throttled)))
				},
				Behavior::Hang => std::future::pending().await,
				Behavior::Disconnect => Err(HttpClientError::Other("connection reset".into())),
				Behavior::SlowTokenInfo(delay) => {
					if !request.uri().path().ends_with("/oauth/tokeninfo") {
						return Ok(HttpResponse::new(b"tokenremoved".to_vec()));
					}

					tokio::time::sleep(delay).await;

					Ok(HttpResponse::new(br#"{"scopes":"a","client_id":"consumer"}"#.to_vec()))
				},
			}
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	metadata: Arc<Mutex<Vec<(FlowKind, Option<ResponseMetadata>)>>>,
}
impl RecordingTransportErrorMapper {
	fn recorded(&self) -> Vec<(FlowKind, Option<ResponseMetadata>)> {
		self.metadata.lock().clone()
	}
}
impl TransportErrorMapper<FakeTransportError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		flow: FlowKind,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<FakeTransportError>,
	) -> RemoteFailure {
		self.metadata.lock().push((flow, meta.cloned()));

		match (err, meta) {
			(
				HttpClientError::Reqwest(_),
				Some(ResponseMetadata { status: Some(status), retry_after }),
			) => RemoteFailure::Status { status: *status, message: None, retry_after: *retry_after },
			(HttpClientError::Reqwest(inner), _) => TransportError::network(*inner).into(),
			(HttpClientError::Io(inner), _) => TransportError::Io(inner).into(),
			(other, _) => TransportError::Unclassified { message: other.to_string() }.into(),
		}
	}
}

fn build_accounts(
	behavior: Behavior,
	config: Config,
) -> (Accounts<FakeHttpClient, RecordingTransportErrorMapper>, RecordingTransportErrorMapper) {
	let mapper = RecordingTransportErrorMapper::default();
	let accounts =
		Accounts::with_http_client(config, FakeHttpClient { behavior }, mapper.clone());

	(accounts, mapper)
}

#[tokio::test]
async fn fake_token_http_client_surfaces_retry_after() {
	let (accounts, mapper) = build_accounts(
		Behavior::Throttle(Duration::seconds(5)),
		test_config("https://auth.example.com"),
	);
	let err = accounts
		.acquire_token([SCOPE])
		.await
		.expect_err("Request should be throttled with HTTP 429.");

	match err {
		Error::RemoteRequest(RemoteRequestError {
			attempts,
			source: RemoteFailure::Status { status, retry_after, .. },
		}) => {
			assert_eq!(attempts, 3);
			assert_eq!(status, 429);
			assert_eq!(retry_after, Some(Duration::seconds(5)));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	let observed = mapper.recorded();

	assert_eq!(observed.len(), 3, "Mapper must see every attempt.");

	for (flow, meta) in observed {
		let meta = meta.expect("Response metadata should be recorded for every attempt.");

		assert_eq!(flow, FlowKind::ClientCredentials);
		assert_eq!(meta.status, Some(429));
		assert_eq!(meta.retry_after, Some(Duration::seconds(5)));
	}
}

#[tokio::test]
async fn hanging_transport_times_out_each_attempt() {
	let config = Config {
		request_timeout_ms: 20,
		retry_count: 2,
		..test_config("https://auth.example.com")
	};
	let (accounts, mapper) = build_accounts(Behavior::Hang, config);
	let err = accounts
		.token_info("jrrtoken")
		.await
		.expect_err("Hanging transport should time out.");

	match err {
		Error::RemoteRequest(RemoteRequestError {
			attempts,
			source: RemoteFailure::Timeout { timeout },
		}) => {
			assert_eq!(attempts, 2);
			assert_eq!(timeout, Some(StdDuration::from_millis(20)));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	assert!(mapper.recorded().is_empty(), "Timeouts never reach the mapper.");
}

#[tokio::test]
async fn unclassified_transport_failures_are_retried() {
	let config = Config { retry_count: 1, ..test_config("https://auth.example.com") };
	let (accounts, mapper) = build_accounts(Behavior::Disconnect, config);
	let err = accounts
		.refresh_token("jrrrefreshtoken")
		.await
		.expect_err("Disconnected transport should fail the refresh.");

	assert!(matches!(
		err,
		Error::RemoteRequest(RemoteRequestError {
			attempts: 1,
			source: RemoteFailure::Transport(TransportError::Unclassified { .. }),
		})
	));

	let observed = mapper.recorded();

	assert_eq!(observed.len(), 1);
	assert_eq!(observed[0].0, FlowKind::Refresh);
	assert!(observed[0].1.is_none(), "No response means no metadata.");
}

#[tokio::test]
async fn revoke_during_introspection_keeps_token_out_of_cache() {
	let (accounts, _) = build_accounts(
		Behavior::SlowTokenInfo(StdDuration::from_millis(300)),
		test_config("https://auth.example.com"),
	);
	let introspection = tokio::spawn({
		let accounts = accounts.clone();

		async move { accounts.verify_scopes(Some("jrrtoken"), &["a".to_owned()]).await }
	});

	tokio::time::sleep(StdDuration::from_millis(100)).await;

	let ack = accounts
		.revoke_token(RevokeRequest::new("jrrtoken"))
		.await
		.expect("Revoke request should succeed.");

	assert_eq!(ack.as_str(), Some("tokenremoved"));

	let client = introspection
		.await
		.expect("Introspection task should not panic.")
		.expect("Introspection started before the revoke should still complete.");

	assert_eq!(client.client_id.as_deref(), Some("consumer"));
	assert!(
		accounts.cache().get(Category::Server, "jrrtoken").is_none(),
		"A revoked token must not be cached by an overlapping introspection."
	);

	let again = accounts
		.token_info("jrrtoken")
		.await
		.expect("Fresh introspection should succeed.");

	assert!(again.scopes().is_some());
	assert!(accounts.cache().get(Category::Server, "jrrtoken").is_some());
}
