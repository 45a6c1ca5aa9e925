//! OAuth client facade bound to the fixed Fitbit endpoints.
//!
//! The facade composes the `oauth2` crate for the two grants this crate needs,
//! authorization-code exchange and refresh, and maps its errors into the
//! session taxonomy. It never retries and never reinterprets provider answers.

pub use oauth2;

// crates.io
use oauth2::{
	AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse, BasicTokenType},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, ExchangeError, TransportError},
	http::ApiTransport,
	session::Config,
	token::{Token, TokenSecret},
};

/// Fitbit authorization endpoint; fixed, not configurable per call.
pub const AUTH_URL: &str = "https://www.fitbit.com/oauth2/authorize";
/// Fitbit token endpoint; fixed, not configurable per call.
pub const TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Configured `oauth2` client plus the parsed authorization endpoint.
pub(crate) struct OAuthConfig {
	client: ConfiguredBasicClient,
	authorize_endpoint: Url,
}
impl OAuthConfig {
	/// Builds the facade against the well-known provider endpoints.
	pub(crate) fn new(config: &Config) -> Result<Self> {
		Self::with_endpoints(config, AUTH_URL, TOKEN_URL)
	}

	pub(crate) fn with_endpoints(
		config: &Config,
		authorize_url: &str,
		token_url: &str,
	) -> Result<Self> {
		let authorize_endpoint =
			Url::parse(authorize_url).map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let auth_url = AuthUrl::new(authorize_url.to_owned())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let token_url = TokenUrl::new(token_url.to_owned())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let redirect_url = RedirectUrl::new(config.redirect_url.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url);

		Ok(Self { client, authorize_endpoint })
	}

	/// Parsed authorization endpoint used for login-URL construction.
	pub(crate) fn authorize_endpoint(&self) -> &Url {
		&self.authorize_endpoint
	}

	/// Redeems a one-time authorization code for the initial token pair.
	pub(crate) async fn exchange_code<T>(&self, transport: &T, code: &str) -> Result<Token>
	where
		T: ?Sized + ApiTransport,
	{
		let handle = transport.oauth_handle();
		let response = self
			.client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.request_async(&handle)
			.await
			.map_err(map_request_error)?;

		Ok(token_from_response(response, None))
	}

	/// Redeems the refresh secret of `current` for a rotated token pair.
	///
	/// Providers may omit the refresh token in the response; the previous
	/// secret is carried forward in that case.
	pub(crate) async fn refresh<T>(&self, transport: &T, current: &Token) -> Result<Token>
	where
		T: ?Sized + ApiTransport,
	{
		let refresh_secret =
			current.refresh_token.as_ref().ok_or(ConfigError::MissingRefreshToken)?;
		let handle = transport.oauth_handle();
		let response = self
			.client
			.exchange_refresh_token(&RefreshToken::new(refresh_secret.expose().to_owned()))
			.request_async(&handle)
			.await
			.map_err(map_request_error)?;

		Ok(token_from_response(response, current.refresh_token.clone()))
	}
}

fn token_from_response(response: BasicTokenResponse, fallback_refresh: Option<TokenSecret>) -> Token {
	let issued_at = OffsetDateTime::now_utc();
	let expires_at = response.expires_in().and_then(|ttl| {
		let secs = i64::try_from(ttl.as_secs()).ok()?;

		Some(issued_at + Duration::seconds(secs))
	});
	let refresh_token =
		response.refresh_token().map(|secret| TokenSecret::new(secret.secret().clone())).or(fallback_refresh);

	Token {
		access_token: TokenSecret::new(response.access_token().secret().clone()),
		refresh_token,
		token_type: token_type_label(response.token_type()),
		expires_at,
	}
}

fn token_type_label(token_type: &BasicTokenType) -> String {
	match token_type {
		BasicTokenType::Bearer => "Bearer".into(),
		BasicTokenType::Mac => "Mac".into(),
		BasicTokenType::Extension(value) => value.clone(),
	}
}

fn map_request_error<E>(err: BasicRequestTokenError<HttpClientError<E>>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		RequestTokenError::ServerResponse(response) => ExchangeError::Rejected {
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
		}
		.into(),
		RequestTokenError::Request(error) => map_transport_error(error),
		RequestTokenError::Parse(source, _body) => ExchangeError::Parse { source }.into(),
		RequestTokenError::Other(message) => ExchangeError::Unexpected(message).into(),
	}
}

fn map_transport_error<E>(err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => ExchangeError::Unexpected(message).into(),
		_ => ExchangeError::Unexpected("Token endpoint transport failed.".into()).into(),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::{AccessToken, EmptyExtraTokenFields, StandardTokenResponse};
	// self
	use super::*;
	use crate::scope::Scope;

	fn config() -> Config {
		Config {
			client_id: "client-id".into(),
			client_secret: "client-secret".into(),
			redirect_url: Url::parse("https://example.com/callback")
				.expect("Redirect URL fixture should parse successfully."),
			scopes: vec![Scope::Activity, Scope::Heartrate],
		}
	}

	fn response(access: &str) -> BasicTokenResponse {
		StandardTokenResponse::new(
			AccessToken::new(access.to_owned()),
			BasicTokenType::Bearer,
			EmptyExtraTokenFields {},
		)
	}

	#[test]
	fn builds_facade_for_well_known_endpoints() {
		assert!(OAuthConfig::new(&config()).is_ok());
	}

	#[test]
	fn response_without_refresh_token_keeps_previous_secret() {
		let previous = Some(TokenSecret::new("kept-refresh"));
		let token = token_from_response(response("rotated-access"), previous);

		assert_eq!(token.access_token.expose(), "rotated-access");
		assert_eq!(
			token.refresh_token.as_ref().map(TokenSecret::expose),
			Some("kept-refresh"),
		);
		assert_eq!(token.token_type, "Bearer");
		assert_eq!(token.expires_at, None);
	}

	#[test]
	fn expires_in_is_anchored_to_the_local_clock() {
		let mut raw = response("access");

		raw.set_expires_in(Some(&std::time::Duration::from_secs(3_600)));

		let before = OffsetDateTime::now_utc();
		let token = token_from_response(raw, None);
		let expires_at = token.expires_at.expect("Expiry should be populated from expires_in.");

		assert!((expires_at - (before + Duration::hours(1))).abs() < Duration::seconds(5));
	}
}
