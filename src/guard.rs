//! Intercepting transport that surfaces token rotation to the owning session.
//!
//! Every request flows through [`TokenGuard`]: a pre-flight token check, the
//! delegated round trip, then a post-hoc comparison that synchronizes any
//! rotation into shared session state and fires the persistence listener on a
//! detached task. As long as every request passes through here, the session's
//! recorded token never silently drifts from the one the OAuth layer uses.

// self
use crate::{
	_prelude::*,
	http::{ApiRequest, ApiResponse, ApiTransport},
	source::TokenSource,
	token::Token,
};

/// Boxed future returned by token-change listeners.
pub type ListenerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Persistence hook invoked with a by-value snapshot of every rotated token.
pub type TokenListener = Arc<dyn Fn(Token) -> ListenerFuture + Send + Sync>;

/// Session state shared between the session facade and its guards.
#[derive(Default)]
pub(crate) struct SessionShared {
	/// Last token observed by the session; rotation writes take the write lock.
	pub(crate) token: RwLock<Option<Token>>,
	/// Token-change listener; registered at most once, read on every rotation.
	pub(crate) listener: OnceLock<TokenListener>,
}
impl SessionShared {
	/// Replaces the recorded token when `fresh` rotates it, returning whether a
	/// notification should fire. Unchanged tokens never notify.
	pub(crate) fn sync_rotation(&self, fresh: &Token) -> bool {
		let mut recorded = self.token.write();

		if fresh.differs_from(recorded.as_ref()) {
			*recorded = Some(fresh.clone());

			true
		} else {
			false
		}
	}

	/// Fires the listener on a detached task so slow or failing hooks never
	/// block or fail the in-flight response.
	pub(crate) fn notify_detached(&self, token: Token) {
		if let Some(listener) = self.listener.get() {
			let listener = Arc::clone(listener);

			tokio::spawn(listener(token));
		}
	}
}

/// Transport wrapper that checks token validity before every call and detects
/// rotation afterwards.
pub(crate) struct TokenGuard<T>
where
	T: ?Sized + ApiTransport,
{
	source: Arc<dyn TokenSource>,
	transport: Arc<T>,
	shared: Arc<SessionShared>,
}
impl<T> TokenGuard<T>
where
	T: ?Sized + ApiTransport,
{
	pub(crate) fn new(
		source: Arc<dyn TokenSource>,
		transport: Arc<T>,
		shared: Arc<SessionShared>,
	) -> Self {
		Self { source, transport, shared }
	}

	/// Executes one guarded round trip.
	pub(crate) async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
		// Pre-flight: never hit the API without a currently valid token.
		let token = self.source.token().await.map_err(|_| Error::ExpiredToken)?;
		let response = self.transport.execute(request, token.access_token.clone()).await?;

		// A failed post-hoc query is not a request failure; the caller's data is
		// already in hand and the next pre-flight surfaces the problem.
		if let Ok(fresh) = self.source.token().await {
			if self.shared.sync_rotation(&fresh) {
				self.shared.notify_detached(fresh);
			}
		}

		Ok(response)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn request() -> ApiRequest {
		ApiRequest {
			verb: crate::http::Verb::Get,
			url: Url::parse("https://api.example.com/1/user/-/profile.json")
				.expect("Request URL fixture should parse successfully."),
			headers: Vec::new(),
			form: None,
		}
	}

	fn guard_with(
		steps: Vec<Option<Token>>,
		shared: Arc<SessionShared>,
	) -> (TokenGuard<RecordingTransport>, Arc<RecordingTransport>) {
		let transport = Arc::new(RecordingTransport::ok());
		let source = Arc::new(ScriptedTokenSource::new(steps));
		let guard = TokenGuard::new(source, Arc::clone(&transport), shared);

		(guard, transport)
	}

	#[tokio::test]
	async fn expired_pre_flight_skips_the_network() {
		let shared = Arc::new(SessionShared::default());
		let (guard, transport) = guard_with(vec![None], shared);
		let err = guard.execute(request()).await.expect_err("Missing token should abort.");

		assert!(matches!(err, Error::ExpiredToken));
		assert_eq!(transport.calls(), 0);
	}

	#[tokio::test]
	async fn rotation_updates_shared_state_and_notifies_once() {
		let shared = Arc::new(SessionShared::default());
		let observed = observed_tokens(&shared);
		let before = token_fixture("old-access", "old-refresh");
		let after = token_fixture("new-access", "new-refresh");

		*shared.token.write() = Some(before.clone());

		let (guard, transport) =
			guard_with(vec![Some(before), Some(after.clone())], Arc::clone(&shared));

		guard.execute(request()).await.expect("Guarded round trip should succeed.");

		assert_eq!(transport.calls(), 1);
		assert_eq!(shared.token.read().clone(), Some(after.clone()));

		let fired = wait_for_observations(&observed, 1).await;

		assert_eq!(fired, vec![after]);
	}

	#[tokio::test]
	async fn unchanged_token_never_notifies() {
		let shared = Arc::new(SessionShared::default());
		let observed = observed_tokens(&shared);
		let token = token_fixture("stable-access", "stable-refresh");

		*shared.token.write() = Some(token.clone());

		let (guard, _transport) =
			guard_with(vec![Some(token.clone()), Some(token)], Arc::clone(&shared));

		guard.execute(request()).await.expect("Guarded round trip should succeed.");
		tokio::time::sleep(std::time::Duration::from_millis(50)).await;

		assert!(observed.lock().is_empty());
	}

	#[tokio::test]
	async fn failed_post_hoc_query_still_returns_the_response() {
		let shared = Arc::new(SessionShared::default());
		let token = token_fixture("only-access", "only-refresh");
		let (guard, transport) = guard_with(vec![Some(token)], shared);
		let response =
			guard.execute(request()).await.expect("Response should survive a post-hoc failure.");

		assert_eq!(transport.calls(), 1);
		assert_eq!(response.body, b"ok".to_vec());
	}

	fn observed_tokens(shared: &Arc<SessionShared>) -> Arc<Mutex<Vec<Token>>> {
		let observed = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&observed);
		let installed = shared.listener.set(Arc::new(move |token| {
			let sink = Arc::clone(&sink);

			Box::pin(async move {
				sink.lock().push(token);
			})
		}));

		assert!(installed.is_ok(), "Listener fixture should install exactly once.");

		observed
	}

	async fn wait_for_observations(observed: &Arc<Mutex<Vec<Token>>>, count: usize) -> Vec<Token> {
		for _ in 0..100 {
			{
				let seen = observed.lock();

				if seen.len() >= count {
					return seen.clone();
				}
			}

			tokio::time::sleep(std::time::Duration::from_millis(5)).await;
		}

		observed.lock().clone()
	}
}
