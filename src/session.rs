//! Session facade: configuration, login, token lifecycle, and verb helpers.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	guard::{ListenerFuture, SessionShared, TokenGuard},
	http::{ApiRequest, ApiTransport, Verb},
	oauth::OAuthConfig,
	obs::{self, CallKind, CallOutcome, CallSpan},
	ratelimit::Ratelimit,
	scope::{Scope, format_scopes},
	source::{RefreshStats, RefreshingSource, TokenSource},
	token::Token,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestApiTransport;

const STATE_LEN: usize = 32;

/// Identification header attached to every API request.
const USER_AGENT: (&str, &str) = ("user-agent", "fitbit-session");
/// Locale hints attached to every API request; the provider localizes units
/// and messages from these.
const ACCEPT_LANGUAGE: (&str, &str) = ("accept-language", "de_DE");
const ACCEPT_LOCALE: (&str, &str) = ("accept-locale", "de_DE");

/// Immutable per-application OAuth configuration.
#[derive(Clone)]
pub struct Config {
	/// OAuth client identifier issued by the developer portal.
	pub client_id: String,
	/// OAuth client secret paired with the identifier.
	pub client_secret: String,
	/// Redirect URL registered for the application.
	pub redirect_url: Url,
	/// Scopes requested during authorization.
	pub scopes: Vec<Scope>,
}
impl Debug for Config {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Config")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("redirect_url", &self.redirect_url)
			.field("scopes", &self.scopes)
			.finish()
	}
}

/// Session specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestSession = Session<ReqwestApiTransport>;

/// Authenticated API session for a single user.
///
/// The session owns the immutable [`Config`], the current [`Token`] behind a
/// read/write lock, the guarded HTTP client, and the last rate-limit snapshot.
/// Tokens arrive either through [`exchange`](Self::exchange) or
/// [`set_token`](Self::set_token); afterwards every verb helper flows through
/// the token guard, which keeps the recorded token in sync with silent
/// refreshes and feeds the registered persistence listener.
pub struct Session<T>
where
	T: ?Sized + ApiTransport,
{
	config: Config,
	oauth: Arc<OAuthConfig>,
	transport: Arc<T>,
	shared: Arc<SessionShared>,
	/// Guarded client slot; rebuilt eagerly by `set_token`, lazily otherwise.
	client: RwLock<Option<Arc<TokenGuard<T>>>>,
	/// Advisory telemetry behind its own light lock, independent of the token lock.
	ratelimit: Mutex<Ratelimit>,
	refresh_stats: Arc<RefreshStats>,
}
#[cfg(feature = "reqwest")]
impl Session<ReqwestApiTransport> {
	/// Creates a session backed by the crate's default reqwest transport.
	pub fn new(config: Config) -> Result<Self> {
		Self::with_transport(config, ReqwestApiTransport::default())
	}
}
impl<T> Session<T>
where
	T: ?Sized + ApiTransport,
{
	/// Creates a session that reuses a caller-provided transport.
	pub fn with_transport(config: Config, transport: impl Into<Arc<T>>) -> Result<Self> {
		let oauth = Arc::new(OAuthConfig::new(&config)?);

		Ok(Self::assemble(config, oauth, transport.into()))
	}

	fn assemble(config: Config, oauth: Arc<OAuthConfig>, transport: Arc<T>) -> Self {
		Self {
			config,
			oauth,
			transport,
			shared: Arc::new(SessionShared::default()),
			client: RwLock::new(None),
			ratelimit: Mutex::new(Ratelimit::default()),
			refresh_stats: Arc::new(RefreshStats::default()),
		}
	}

	/// Builds the authorization redirect URL for a user to grant access.
	///
	/// `state` is opaque and must be round-tripped by the caller for request
	/// forgery protection; it is not validated here. Offline access is always
	/// requested so later silent refresh is possible.
	pub fn login_url(&self, state: &str) -> Url {
		let mut url = self.oauth.authorize_endpoint().clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", &self.config.client_id);
		pairs.append_pair("redirect_uri", self.config.redirect_url.as_str());

		if let Some(scope) = format_scopes(&self.config.scopes) {
			pairs.append_pair("scope", &scope);
		}

		pairs.append_pair("state", state);
		pairs.append_pair("access_type", "offline");

		drop(pairs);

		url
	}

	/// Generates an opaque alphanumeric state value for [`login_url`](Self::login_url).
	pub fn random_state() -> String {
		rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
	}

	/// Redeems a one-time authorization code for the initial token pair.
	///
	/// On success the token is installed through the same path as
	/// [`set_token`](Self::set_token), rebuilding the guarded client; on failure
	/// the exchange error is propagated and session state is left untouched.
	pub async fn exchange(&self, code: &str) -> Result<Token> {
		const KIND: CallKind = CallKind::Exchange;

		let span = CallSpan::new(KIND, "exchange");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		match span.instrument(self.oauth.exchange_code(self.transport.as_ref(), code)).await {
			Ok(token) => {
				obs::record_call_outcome(KIND, CallOutcome::Success);
				self.set_token(token.clone());

				Ok(token)
			},
			Err(err) => {
				obs::record_call_outcome(KIND, CallOutcome::Failure);

				Err(err)
			},
		}
	}

	/// Installs an externally obtained token, e.g. one loaded from persistent
	/// storage at startup, and eagerly rebuilds the guarded client bound to its
	/// refresh source.
	pub fn set_token(&self, token: Token) {
		let mut client = self.client.write();

		*self.shared.token.write() = Some(token.clone());
		*client = Some(self.build_client(token));
	}

	/// Returns a snapshot of the recorded token.
	///
	/// Immediately after a completed verb helper call this reflects any
	/// rotation that call observed.
	pub fn token(&self) -> Option<Token> {
		self.shared.token.read().clone()
	}

	/// Registers the token-change listener invoked with every rotated token.
	///
	/// The first registration wins; later calls return `false` and leave the
	/// existing listener in place. Rotation notifications run on a detached
	/// task, so registering requires a running Tokio runtime at request time.
	pub fn on_token_change(
		&self,
		listener: impl Fn(Token) -> ListenerFuture + Send + Sync + 'static,
	) -> bool {
		self.shared.listener.set(Arc::new(listener)).is_ok()
	}

	/// Manually fires the token-change listener with the current token and
	/// waits for it, for callers who persist on demand rather than relying on
	/// the automatic rotation hook.
	pub async fn save_token(&self) -> Result<()> {
		let Some(listener) = self.shared.listener.get() else {
			return Err(Error::TokenChangeNotDefined);
		};
		let token = self.shared.token.read().clone().ok_or(Error::ExpiredToken)?;

		listener(token).await;

		Ok(())
	}

	/// Returns the rate-limit snapshot observed on the last API request.
	pub fn ratelimit(&self) -> Ratelimit {
		*self.ratelimit.lock()
	}

	/// Counters describing silent refresh activity across the session lifetime.
	pub fn refresh_stats(&self) -> &RefreshStats {
		&self.refresh_stats
	}

	/// Performs an authenticated GET, returning the raw response body.
	///
	/// Non-2xx statuses are not interpreted; callers inspect the body according
	/// to the endpoint they called.
	pub async fn get(&self, url: &str) -> Result<Vec<u8>> {
		self.dispatch(Verb::Get, url, None).await
	}

	/// Performs an authenticated POST with an URL-encoded form body.
	pub async fn post(&self, url: &str, form: &[(&str, &str)]) -> Result<Vec<u8>> {
		let form =
			form.iter().map(|(name, value)| ((*name).to_owned(), (*value).to_owned())).collect();

		self.dispatch(Verb::Post, url, Some(form)).await
	}

	/// Performs an authenticated DELETE, returning the raw response body.
	pub async fn delete(&self, url: &str) -> Result<Vec<u8>> {
		self.dispatch(Verb::Delete, url, None).await
	}

	async fn dispatch(
		&self,
		verb: Verb,
		url: &str,
		form: Option<Vec<(String, String)>>,
	) -> Result<Vec<u8>> {
		let kind = CallKind::from(verb);
		let span = CallSpan::new(kind, "dispatch");

		obs::record_call_outcome(kind, CallOutcome::Attempt);

		match span.instrument(self.dispatch_inner(verb, url, form)).await {
			Ok(body) => {
				obs::record_call_outcome(kind, CallOutcome::Success);

				Ok(body)
			},
			Err(err) => {
				obs::record_call_outcome(kind, CallOutcome::Failure);

				Err(err)
			},
		}
	}

	async fn dispatch_inner(
		&self,
		verb: Verb,
		url: &str,
		form: Option<Vec<(String, String)>>,
	) -> Result<Vec<u8>> {
		let url = Url::parse(url).map_err(|source| ConfigError::InvalidRequestUrl { source })?;
		let client = self.authed_client()?;
		let request = ApiRequest {
			verb,
			url,
			headers: vec![
				(USER_AGENT.0, USER_AGENT.1.to_owned()),
				(ACCEPT_LANGUAGE.0, ACCEPT_LANGUAGE.1.to_owned()),
				(ACCEPT_LOCALE.0, ACCEPT_LOCALE.1.to_owned()),
			],
			form,
		};
		let response = client.execute(request).await?;

		self.ratelimit.lock().absorb(&response.headers);

		Ok(response.body)
	}

	/// Returns the guarded client, lazily building it from the recorded token
	/// when absent.
	///
	/// An explicit [`set_token`](Self::set_token) rebuilds eagerly; a rotation
	/// detected mid-flight does not rebuild, the embedded refresh source
	/// already reflects it.
	fn authed_client(&self) -> Result<Arc<TokenGuard<T>>> {
		{
			let client = self.client.read();

			if let Some(client) = client.as_ref() {
				return Ok(Arc::clone(client));
			}
		}

		let mut slot = self.client.write();

		if let Some(client) = slot.as_ref() {
			return Ok(Arc::clone(client));
		}

		let seed = self.shared.token.read().clone().ok_or(Error::ExpiredToken)?;
		let client = self.build_client(seed);

		*slot = Some(Arc::clone(&client));

		Ok(client)
	}

	fn build_client(&self, seed: Token) -> Arc<TokenGuard<T>> {
		let source: Arc<dyn TokenSource> = Arc::new(RefreshingSource::new(
			Arc::clone(&self.oauth),
			Arc::clone(&self.transport),
			Arc::clone(&self.refresh_stats),
			seed,
		));

		Arc::new(TokenGuard::new(source, Arc::clone(&self.transport), Arc::clone(&self.shared)))
	}
}
impl<T> Debug for Session<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("config", &self.config)
			.field("token_set", &self.shared.token.read().is_some())
			.field("listener_set", &self.shared.listener.get().is_some())
			.field("ratelimit", &self.ratelimit.lock())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::_preludet::*;

	fn config() -> Config {
		Config {
			client_id: "client-id".into(),
			client_secret: "client-secret".into(),
			redirect_url: Url::parse("https://example.com/callback")
				.expect("Redirect URL fixture should parse successfully."),
			scopes: vec![Scope::Activity, Scope::Heartrate],
		}
	}

	fn mock_session(server: &MockServer) -> ReqwestSession {
		let config = config();
		let oauth = OAuthConfig::with_endpoints(
			&config,
			&server.url("/oauth2/authorize"),
			&server.url("/oauth2/token"),
		)
		.expect("Mock endpoints should build an OAuth facade.");

		Session::assemble(config, Arc::new(oauth), Arc::new(ReqwestApiTransport::default()))
	}

	#[tokio::test]
	async fn exchange_installs_token_and_rebuilds_client() {
		let server = MockServer::start_async().await;
		let session = mock_session(&server);
		let mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/oauth2/token");
				then.status(200).header("content-type", "application/json").body(
					"{\"access_token\":\"fresh-access\",\"token_type\":\"bearer\",\
					 \"expires_in\":28800,\"refresh_token\":\"fresh-refresh\"}",
				);
			})
			.await;
		let token = session.exchange("one-time-code").await.expect("Exchange should succeed.");

		mock.assert_async().await;

		assert_eq!(token.access_token.expose(), "fresh-access");

		let recorded = session.token().expect("Exchange should install the session token.");

		assert_eq!(recorded, token);
		assert!(
			session.client.read().is_some(),
			"Exchange should rebuild the guarded client eagerly.",
		);
	}

	#[tokio::test]
	async fn exchange_failure_leaves_session_untouched() {
		let server = MockServer::start_async().await;
		let session = mock_session(&server);

		server
			.mock_async(|when, then| {
				when.method(POST).path("/oauth2/token");
				then.status(400)
					.header("content-type", "application/json")
					.body("{\"error\":\"invalid_grant\"}");
			})
			.await;

		let err = session.exchange("spent-code").await.expect_err("Exchange should fail.");

		assert!(matches!(err, Error::Exchange(_)));
		assert_eq!(session.token(), None);
		assert!(session.client.read().is_none());
	}

	#[tokio::test]
	async fn stale_token_refreshes_once_across_concurrent_calls() {
		let server = MockServer::start_async().await;
		let session = mock_session(&server);
		let refresh_mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/oauth2/token");
				then.status(200).header("content-type", "application/json").body(
					"{\"access_token\":\"rotated-access\",\"token_type\":\"bearer\",\
					 \"expires_in\":28800,\"refresh_token\":\"rotated-refresh\"}",
				);
			})
			.await;
		let api_mock = server
			.mock_async(|when, then| {
				when.method(GET).path("/1/user/-/profile.json");
				then.status(200).body("{}");
			})
			.await;
		let stale = Token::new("stale-access")
			.with_refresh_token("stale-refresh")
			.with_expires_at(OffsetDateTime::now_utc() - Duration::hours(1));

		session.set_token(stale);

		let target = server.url("/1/user/-/profile.json");
		let (first, second) = tokio::join!(session.get(&target), session.get(&target));

		first.expect("First concurrent call should succeed.");
		second.expect("Second concurrent call should succeed.");

		refresh_mock.assert_async().await;
		api_mock.assert_calls_async(2).await;

		let recorded = session.token().expect("Rotation should be recorded on the session.");

		assert_eq!(recorded.access_token.expose(), "rotated-access");
		assert_eq!(session.refresh_stats().attempts(), 1);
		assert_eq!(session.refresh_stats().successes(), 1);
	}

	#[tokio::test]
	async fn mid_flight_rotation_notifies_listener_exactly_once() {
		let server = MockServer::start_async().await;
		let session = mock_session(&server);
		let observed = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&observed);

		assert!(session.on_token_change(move |token| {
			let sink = Arc::clone(&sink);

			Box::pin(async move {
				sink.lock().push(token);
			})
		}));

		server
			.mock_async(|when, then| {
				when.method(POST).path("/oauth2/token");
				then.status(200).header("content-type", "application/json").body(
					"{\"access_token\":\"rotated-access\",\"token_type\":\"bearer\",\
					 \"expires_in\":28800,\"refresh_token\":\"rotated-refresh\"}",
				);
			})
			.await;
		server
			.mock_async(|when, then| {
				when.method(GET).path("/1/user/-/sleep.json");
				then.status(200).body("{}");
			})
			.await;

		let stale = Token::new("stale-access")
			.with_refresh_token("stale-refresh")
			.with_expires_at(OffsetDateTime::now_utc() - Duration::hours(1));

		session.set_token(stale);

		let target = server.url("/1/user/-/sleep.json");

		session.get(&target).await.expect("First call should succeed after refresh.");
		session.get(&target).await.expect("Second call should reuse the rotated token.");

		for _ in 0..100 {
			if !observed.lock().is_empty() {
				break;
			}

			tokio::time::sleep(std::time::Duration::from_millis(5)).await;
		}

		let seen = observed.lock().clone();

		assert_eq!(seen.len(), 1, "Unchanged re-observations must not notify again.");
		assert_eq!(seen[0].access_token.expose(), "rotated-access");
	}

	#[test]
	fn login_url_carries_the_authorization_parameters() {
		let session = ReqwestSession::new(config()).expect("Session should build.");
		let url = session.login_url("opaque-state");
		let pairs: Vec<_> =
			url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();

		assert!(url.as_str().starts_with(crate::oauth::AUTH_URL));
		assert!(pairs.contains(&("response_type".into(), "code".into())));
		assert!(pairs.contains(&("client_id".into(), "client-id".into())));
		assert!(
			pairs.contains(&("redirect_uri".into(), "https://example.com/callback".into()))
		);
		assert!(pairs.contains(&("scope".into(), "activity heartrate".into())));
		assert!(pairs.contains(&("state".into(), "opaque-state".into())));
		assert!(pairs.contains(&("access_type".into(), "offline".into())));
	}

	#[test]
	fn random_state_is_opaque_alphanumeric() {
		let first = ReqwestSession::random_state();
		let second = ReqwestSession::random_state();

		assert_eq!(first.len(), 32);
		assert!(first.chars().all(char::is_alphanumeric));
		assert_ne!(first, second);
	}

	#[tokio::test]
	async fn save_token_requires_listener_and_token() {
		let session = ReqwestSession::new(config()).expect("Session should build.");
		let err = session.save_token().await.expect_err("No listener is registered yet.");

		assert!(matches!(err, Error::TokenChangeNotDefined));

		let observed = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&observed);

		assert!(session.on_token_change(move |token| {
			let sink = Arc::clone(&sink);

			Box::pin(async move {
				sink.lock().push(token);
			})
		}));

		let err = session.save_token().await.expect_err("No token is installed yet.");

		assert!(matches!(err, Error::ExpiredToken));

		let token = token_fixture("saved-access", "saved-refresh");

		session.set_token(token.clone());
		session.save_token().await.expect("Manual save should fire the listener.");

		assert_eq!(observed.lock().clone(), vec![token]);
	}

	#[test]
	fn listener_registration_is_first_wins() {
		let session = ReqwestSession::new(config()).expect("Session should build.");

		assert!(session.on_token_change(|_| Box::pin(async {})));
		assert!(!session.on_token_change(|_| Box::pin(async {})));
	}
}
