//! Token sources that keep a valid access token on hand for the guard.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	http::ApiTransport,
	oauth::OAuthConfig,
	obs::{self, CallKind, CallOutcome, CallSpan},
	token::Token,
};

/// Boxed future returned by [`TokenSource::token`].
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Supplies a currently valid token ahead of every API call.
///
/// The session's default implementation refreshes silently through the
/// provider's refresh grant; tests substitute scripted sources.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Returns a token valid right now, or an error when none can be produced.
	fn token(&self) -> SourceFuture<'_, Token>;
}

/// Thread-safe counters describing silent refresh activity.
#[derive(Debug, Default)]
pub struct RefreshStats {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}
impl RefreshStats {
	/// Total number of refresh-token grants attempted.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Number of refresh grants that produced a token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Number of refresh grants that failed.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}

/// [`TokenSource`] that caches the last issued token and refreshes it through
/// the OAuth facade when it goes stale.
pub(crate) struct RefreshingSource<T>
where
	T: ?Sized + ApiTransport,
{
	oauth: Arc<OAuthConfig>,
	transport: Arc<T>,
	stats: Arc<RefreshStats>,
	current: RwLock<Token>,
	refresh_guard: AsyncMutex<()>,
}
impl<T> RefreshingSource<T>
where
	T: ?Sized + ApiTransport,
{
	pub(crate) fn new(
		oauth: Arc<OAuthConfig>,
		transport: Arc<T>,
		stats: Arc<RefreshStats>,
		seed: Token,
	) -> Self {
		Self {
			oauth,
			transport,
			stats,
			current: RwLock::new(seed),
			refresh_guard: AsyncMutex::new(()),
		}
	}

	async fn refreshed_token(&self) -> Result<Token> {
		{
			let current = self.current.read();

			if !current.is_stale() {
				return Ok(current.clone());
			}
		}

		// Single flight: the first caller performs the grant, the rest reuse it.
		let _guard = self.refresh_guard.lock().await;
		let snapshot = self.current.read().clone();

		if !snapshot.is_stale() {
			return Ok(snapshot);
		}

		const KIND: CallKind = CallKind::Refresh;

		let span = CallSpan::new(KIND, "refreshed_token");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);
		self.stats.record_attempt();

		match span.instrument(self.oauth.refresh(self.transport.as_ref(), &snapshot)).await {
			Ok(token) => {
				obs::record_call_outcome(KIND, CallOutcome::Success);
				self.stats.record_success();

				*self.current.write() = token.clone();

				Ok(token)
			},
			Err(err) => {
				obs::record_call_outcome(KIND, CallOutcome::Failure);
				self.stats.record_failure();

				Err(err)
			},
		}
	}
}
impl<T> TokenSource for RefreshingSource<T>
where
	T: ?Sized + ApiTransport,
{
	fn token(&self) -> SourceFuture<'_, Token> {
		Box::pin(self.refreshed_token())
	}
}
