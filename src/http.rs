//! Transport primitives wrapped by the gateway.
//!
//! The module exposes [`HttpTransport`], the gateway's only dependency on an HTTP stack,
//! together with the [`ApiRequest`] and [`ApiResponse`] values that flow through it.
//! [`ReqwestTransport`] is the default implementation; hosts with their own client (a webview
//! bridge, a recorded fixture) implement the trait directly.

// std
use std::borrow::Cow;
// crates.io
use ::http::{
	HeaderMap, HeaderValue, Method, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderName},
};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, E>> + 'a + Send>>;

/// Abstraction over the HTTP stack that actually performs requests.
///
/// Implementations resolve with an [`ApiResponse`] for every HTTP answer, including 4xx and
/// 5xx statuses, and reject only when no response was obtained (DNS, connect, TLS, body read).
/// Implementations must be `Send + Sync + 'static` because the gateway shares them with the
/// renewal task that concurrent callers await.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Performs `request` and returns the raw response.
	fn send(&self, request: ApiRequest) -> TransportFuture<'_, Self::TransportError>;
}

/// Outbound request descriptor; constructed per call and never persisted.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Caller-supplied headers.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a body-less request.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}

	/// Creates a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Creates a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Appends a header, replacing any previous value for `name`.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Serializes `value` as the JSON body and sets `Content-Type: application/json`.
	pub fn json<T>(mut self, value: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(value).map_err(ConfigError::BodySerialization)?;

		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(body);

		Ok(self)
	}

	/// Returns `true` when the caller already supplied an `Authorization` header.
	pub fn has_authorization(&self) -> bool {
		self.headers.contains_key(AUTHORIZATION)
	}

	/// Returns the bearer token carried by the `Authorization` header, if any.
	pub fn bearer_token(&self) -> Option<&str> {
		self.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
	}

	/// Sets `Authorization: Bearer <token>`, replacing any existing value.
	///
	/// Returns `false` and leaves the headers untouched when the token cannot be encoded as a
	/// header value.
	pub fn authorize(&mut self, token: &TokenSecret) -> bool {
		match HeaderValue::from_str(&token.bearer()) {
			Ok(mut value) => {
				value.set_sensitive(true);
				self.headers.insert(AUTHORIZATION, value);

				true
			},
			Err(_) => false,
		}
	}
}

/// Response produced by an [`HttpTransport`].
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Fully buffered response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates an empty response with `status`.
	pub fn new(status: StatusCode) -> Self {
		Self { status, headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Replaces the body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Returns `true` for HTTP 401.
	pub fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Decodes the body as JSON, reporting the path of the first mismatch.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let de = &mut serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(de)
	}

	/// Body as UTF-8 text, replacing invalid sequences.
	pub fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}
}

/// Returns `true` when `token` can be sent as a bearer `Authorization` header.
pub(crate) fn is_header_safe(token: &TokenSecret) -> bool {
	HeaderValue::from_str(&token.bearer()).is_ok()
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	type TransportError = ReqwestError;

	fn send(&self, request: ApiRequest) -> TransportFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let ApiRequest { method, url, headers, body } = request;
			let mut builder = client.request(method, url).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}
