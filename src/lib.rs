//! Session-oriented Fitbit Web API client—authorization-code login, transparent token rotation
//! with persistence hooks, and rate-limit telemetry.
//!
//! The crate composes the `oauth2` crate for the protocol itself and adds the
//! two things a long-lived integration actually needs on top: a guarded
//! transport that notices when the OAuth layer silently rotated the token (so
//! the new secrets can be persisted), and a snapshot of the provider's
//! rate-limit headers after every call.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod error;
pub mod guard;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod ratelimit;
pub mod scope;
pub mod session;
pub mod source;
pub mod token;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and test doubles; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// crates.io
	use oauth2::{
		AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
		http::{HeaderMap, StatusCode},
	};
	// self
	use crate::{
		http::{ApiRequest, ApiResponse, ApiTransport, TransportFuture},
		source::{SourceFuture, TokenSource},
		token::{Token, TokenSecret},
	};

	/// Transport error placeholder for doubles that never reach a token endpoint.
	pub type NullOAuthError = std::convert::Infallible;

	/// [`AsyncHttpClient`] double that rejects every token endpoint call.
	#[derive(Clone, Debug, Default)]
	pub struct NullOAuthHandle;
	impl<'c> AsyncHttpClient<'c> for NullOAuthHandle {
		type Error = HttpClientError<NullOAuthError>;
		type Future =
			Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

		fn call(&'c self, _: HttpRequest) -> Self::Future {
			Box::pin(async {
				Err(HttpClientError::Other("No token endpoint is wired into this double.".into()))
			})
		}
	}

	/// [`TokenSource`] double that replays a scripted sequence of outcomes.
	///
	/// Each call pops the next step; `None` steps and an exhausted script
	/// produce an error.
	pub struct ScriptedTokenSource {
		steps: Mutex<VecDeque<Option<Token>>>,
	}
	impl ScriptedTokenSource {
		/// Builds the source from ordered steps.
		pub fn new(steps: impl IntoIterator<Item = Option<Token>>) -> Self {
			Self { steps: Mutex::new(steps.into_iter().collect()) }
		}
	}
	impl TokenSource for ScriptedTokenSource {
		fn token(&self) -> SourceFuture<'_, Token> {
			let next = self.steps.lock().pop_front().flatten();

			Box::pin(async move { next.ok_or(Error::ExpiredToken) })
		}
	}

	/// [`ApiTransport`] double that records requests and replays a canned response.
	pub struct RecordingTransport {
		requests: Mutex<Vec<(ApiRequest, TokenSecret)>>,
		status: StatusCode,
		headers: HeaderMap,
		body: Vec<u8>,
	}
	impl RecordingTransport {
		/// Creates a double answering 200 with an `ok` body and no headers.
		pub fn ok() -> Self {
			Self::new(StatusCode::OK, HeaderMap::new(), *b"ok")
		}

		/// Creates a double answering with the provided canned response.
		pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
			Self { requests: Mutex::new(Vec::new()), status, headers, body: body.into() }
		}

		/// Number of round trips executed.
		pub fn calls(&self) -> usize {
			self.requests.lock().len()
		}

		/// Snapshot of the recorded requests with their bearer secrets.
		pub fn requests(&self) -> Vec<(ApiRequest, TokenSecret)> {
			self.requests.lock().clone()
		}
	}
	impl ApiTransport for RecordingTransport {
		type OAuthError = NullOAuthError;
		type OAuthHandle = NullOAuthHandle;

		fn oauth_handle(&self) -> Self::OAuthHandle {
			NullOAuthHandle
		}

		fn execute(
			&self,
			request: ApiRequest,
			bearer: TokenSecret,
		) -> TransportFuture<'_, ApiResponse> {
			self.requests.lock().push((request, bearer));

			let response = ApiResponse {
				status: self.status,
				headers: self.headers.clone(),
				body: self.body.clone(),
			};

			Box::pin(async move { Ok(response) })
		}
	}

	/// Bearer token fixture carrying both secrets.
	pub fn token_fixture(access: &str, refresh: &str) -> Token {
		Token::new(access).with_refresh_token(refresh)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::{Arc, OnceLock},
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
