//! Session-level error types shared across the OAuth facade, transport, and verb helpers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical session error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token endpoint failure during an exchange or refresh grant.
	#[error(transparent)]
	Exchange(#[from] ExchangeError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The session cannot produce a currently valid token; the request was not sent.
	#[error("Session token is expired and cannot be refreshed.")]
	ExpiredToken,
	/// Manual save was requested without a registered token-change listener.
	#[error("No token-change listener is registered on this session.")]
	TokenChangeNotDefined,
}

/// Configuration and validation failures raised by the session.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// OAuth endpoint or redirect URL cannot be parsed.
	#[error("OAuth endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request target passed to a verb helper cannot be parsed.
	#[error("Request URL is invalid.")]
	InvalidRequestUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),

	/// Stored token lacks the refresh secret required for silent renewal.
	#[error("Session token is missing a refresh token.")]
	MissingRefreshToken,
}

/// Token endpoint failures surfaced by exchange and refresh grants.
///
/// Provider-supplied error strings and parse sources are carried through
/// unmodified so callers see exactly what the endpoint reported.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// Token endpoint answered with a structured OAuth error response.
	#[error("Token endpoint rejected the grant: {error}.")]
	Rejected {
		/// OAuth error code returned by the provider.
		error: String,
		/// Human-readable description supplied by the provider, if any.
		description: Option<String>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
	/// Failures the OAuth layer reports as plain text.
	#[error("Token endpoint returned an unexpected response: {0}.")]
	Unexpected(String),
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
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
