//! Gateway-level error types shared across the fetch path, renewal, and session flows.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
///
/// Renewal failures never surface through [`Gateway::fetch`](crate::gateway::Gateway::fetch);
/// [`Gateway::renew_credentials`](crate::gateway::Gateway::renew_credentials) reports them as
/// [`RenewalError`].
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Login endpoint refused the supplied credentials.
	#[error("Login was rejected with HTTP {status}.")]
	LoginRejected {
		/// HTTP status returned by the login endpoint.
		status: u16,
		/// Server-provided explanation, when the body carried one.
		message: Option<String>,
	},
	/// An auth endpoint answered with a body the gateway could not interpret.
	#[error("The {endpoint} endpoint returned a malformed response.")]
	MalformedResponse {
		/// Endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

/// Request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A request target could not be resolved against the base URL.
	#[error("Request target `{target}` is not a valid URL.")]
	InvalidTarget {
		/// Offending target string.
		target: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A request body could not be serialized to JSON.
	#[error("Request body could not be serialized to JSON.")]
	BodySerialization(#[source] serde_json::Error),
}
/// Transport-level failures.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Request target that failed.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error raised while calling `url`.
	pub fn network(url: &Url, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { url: url.to_string(), source: Box::new(src) }
	}
}

/// Reasons a credential renewal did not produce a usable access token.
///
/// The type is `Clone` because a single renewal outcome is handed to every caller that waited
/// on it.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RenewalError {
	/// No refresh credential is stored.
	#[error("No refresh token is available.")]
	MissingRefreshToken,
	/// Renewal request could not be constructed.
	#[error("Renewal request could not be constructed: {message}.")]
	Request {
		/// Construction failure summary.
		message: String,
	},
	/// Refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the renewal with HTTP {status}.")]
	Rejected {
		/// HTTP status returned by the refresh endpoint.
		status: u16,
	},
	/// Renewal reported success but no access credential is stored afterwards.
	#[error("Renewal completed without leaving an access token in storage.")]
	MissingAccessToken,
	/// Refresh endpoint returned a body without a usable access token.
	#[error("Refresh endpoint returned a malformed response: {message}.")]
	MalformedResponse {
		/// Parsing failure summary.
		message: String,
	},
	/// Transport failed while calling the refresh endpoint.
	#[error("Transport failed during renewal: {message}.")]
	Transport {
		/// Transport failure summary.
		message: String,
	},
	/// Storage failed while reading or writing credentials.
	#[error(transparent)]
	Storage(#[from] crate::store::StoreError),
}
