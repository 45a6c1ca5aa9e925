//! Transport primitives for authenticated API calls and token exchanges.
//!
//! [`ApiTransport`] is the crate's only dependency on an HTTP stack. It plays
//! two roles: executing bearer-authenticated REST round trips for the session's
//! verb helpers, and handing out [`AsyncHttpClient`] handles the `oauth2` crate
//! drives against the token endpoint. Callers provide an implementation
//! (typically behind `Arc<T>` where `T: ApiTransport`) and the session shares it
//! between both paths so connection pools are reused.

// std
use std::ops::Deref;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{HeaderMap, StatusCode},
};
// self
use crate::{_prelude::*, token::TokenSecret};
#[cfg(feature = "reqwest")] use crate::error::TransportError;

/// Boxed future returned by [`ApiTransport::execute`].
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// HTTP verbs used by the session helpers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
	/// Fetches a resource.
	Get,
	/// Submits an URL-encoded form.
	Post,
	/// Removes a resource.
	Delete,
}
impl Verb {
	/// Returns the HTTP method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Delete => "DELETE",
		}
	}
}
impl Display for Verb {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outbound REST request prepared by the session.
///
/// Authorization material is not part of the request; the guard supplies the
/// bearer secret separately after its pre-flight token check.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// Verb to dispatch.
	pub verb: Verb,
	/// Fully parsed request target.
	pub url: Url,
	/// Fixed headers attached to the request.
	pub headers: Vec<(&'static str, String)>,
	/// URL-encoded form payload (POST only).
	pub form: Option<Vec<(String, String)>>,
}

/// Raw response surfaced to the session.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code; never interpreted by this crate.
	pub status: StatusCode,
	/// Response headers, consumed for rate-limit telemetry.
	pub headers: HeaderMap,
	/// Fully drained response body.
	pub body: Vec<u8>,
}

/// Abstraction over HTTP stacks capable of executing session API calls and
/// OAuth token exchanges.
///
/// Implementations must be `Send + Sync + 'static` so they can be shared across
/// sessions without additional wrappers, and the futures they return must be
/// `Send` so guard and facade callers can box them freely. No timeout or retry
/// policy is layered on top; configure the underlying client for deadlines.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the token-endpoint transport.
	type OAuthError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle used for token endpoint calls.
	type OAuthHandle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::OAuthError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds the handle passed to `oauth2` request futures.
	fn oauth_handle(&self) -> Self::OAuthHandle;

	/// Executes one REST round trip, returning the raw response.
	///
	/// Implementations attach `bearer` as the authorization header plus every
	/// entry of `request.headers`, encode `request.form` as an URL-encoded body
	/// with the matching content type, and must not retry or interpret non-2xx
	/// statuses.
	fn execute(&self, request: ApiRequest, bearer: TokenSecret)
	-> TransportFuture<'_, ApiResponse>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one
/// place. Token requests should not follow redirects, matching OAuth 2.0
/// guidance that token endpoints return results directly; configure any custom
/// [`ReqwestClient`] accordingly.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestApiTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestApiTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestApiTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestApiTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestApiTransport {
	type OAuthError = ReqwestError;
	type OAuthHandle = ReqwestOAuthHandle;

	fn oauth_handle(&self) -> Self::OAuthHandle {
		ReqwestOAuthHandle::new(self.0.clone())
	}

	fn execute(
		&self,
		request: ApiRequest,
		bearer: TokenSecret,
	) -> TransportFuture<'_, ApiResponse> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = match request.verb {
				Verb::Get => reqwest::Method::GET,
				Verb::Post => reqwest::Method::POST,
				Verb::Delete => reqwest::Method::DELETE,
			};
			let mut builder =
				client.request(method, request.url).bearer_auth(bearer.expose());

			for (name, value) in &request.headers {
				builder = builder.header(*name, value);
			}
			if let Some(form) = &request.form {
				builder = builder.form(form);
			}

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}

/// Handle satisfying [`ApiTransport::OAuthHandle`] for reqwest-backed stacks,
/// adapting reqwest responses into the `oauth2` crate's [`HttpResponse`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestOAuthHandle(Arc<ReqwestClient>);
#[cfg(feature = "reqwest")]
impl ReqwestOAuthHandle {
	fn new(client: ReqwestClient) -> Self {
		Self(Arc::new(client))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestOAuthHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			let response = client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
