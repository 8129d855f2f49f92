//! The authenticated request gateway.
//!
//! [`Gateway::fetch`] is a drop-in replacement for the transport's own `send`: it attaches the
//! stored bearer credential to same-origin API calls, turns a 401 into a single shared
//! renewal, and retries the original request once with the renewed credential. When renewal
//! fails the session is torn down and the browsing context is sent to the login page, while
//! the caller still receives the original 401.

pub mod renewal;
pub mod session;

pub use renewal::*;
pub use session::*;

// crates.io
use ::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{CredentialVault, TokenSecret},
	config::{GatewayConfig, RouteClass},
	context::BrowsingContext,
	error::{ConfigError, TransportError},
	http::{ApiRequest, ApiResponse, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, flow_event},
	store::SessionStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = Gateway<ReqwestTransport>;

/// Terminal state reached by a single [`Gateway::fetch`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Target was excluded from credential handling and forwarded untouched.
	Bypassed,
	/// First response returned as-is (anything but a 401 on a protected route).
	Completed,
	/// Renewal succeeded and the retried request was not rejected as unauthorized.
	RetriedOk,
	/// Renewal succeeded but the retried request was rejected again (or could not be signed).
	RetriedFailed,
	/// Renewal failed; the session was torn down and the original 401 returned.
	LoggedOut,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Bypassed => "bypassed",
			CallOutcome::Completed => "ok",
			CallOutcome::RetriedOk => "retried_ok",
			CallOutcome::RetriedFailed => "retried_failed",
			CallOutcome::LoggedOut => "logged_out",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Wraps an [`HttpTransport`] with bearer injection and coordinated credential renewal.
///
/// Clones share the transport, storage, browsing context, metrics, and the renewal slot, so
/// every clone observes the same in-flight renewal.
pub struct Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Validated routes and storage keys.
	pub config: Arc<GatewayConfig>,
	/// Underlying transport every request is forwarded to.
	pub transport: Arc<T>,
	/// Durable storage holding the credential pair and cached identity.
	pub store: Arc<dyn SessionStore>,
	/// Host location port used for the session-expiry redirect.
	pub context: Arc<dyn BrowsingContext>,
	/// Counters for renewal outcomes.
	pub renewal_metrics: Arc<RenewalMetrics>,
	renewals: Arc<RenewalSlot>,
}
impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a gateway around a caller-provided transport.
	pub fn with_transport(
		config: GatewayConfig,
		transport: impl Into<Arc<T>>,
		store: Arc<dyn SessionStore>,
		context: Arc<dyn BrowsingContext>,
	) -> Self {
		Self {
			config: Arc::new(config),
			transport: transport.into(),
			store,
			context,
			renewal_metrics: Default::default(),
			renewals: Default::default(),
		}
	}

	/// Builds a request for `target`, which may be absolute or relative to the base URL.
	pub fn request(&self, method: Method, target: &str) -> Result<ApiRequest> {
		let url = self.config.resolve(target).map_err(|source| ConfigError::InvalidTarget {
			target: target.to_owned(),
			source,
		})?;

		Ok(ApiRequest::new(method, url))
	}

	/// Convenience wrapper issuing a `GET` for `target` through [`Gateway::fetch`].
	pub async fn get(&self, target: &str) -> Result<ApiResponse> {
		let request = self.request(Method::GET, target)?;

		self.fetch(request).await
	}

	/// Sends `request` with credential handling.
	///
	/// Returns the final response for every HTTP outcome, including the original 401 when the
	/// session could not be renewed. Only transport failures (and storage failures while reading
	/// the access credential) surface as errors.
	pub async fn fetch(&self, request: ApiRequest) -> Result<ApiResponse> {
		self.fetch_with_outcome(request).await.map(|(response, _)| response)
	}

	/// Same as [`Gateway::fetch`], additionally reporting the terminal [`CallOutcome`].
	pub async fn fetch_with_outcome(
		&self,
		request: ApiRequest,
	) -> Result<(ApiResponse, CallOutcome)> {
		const KIND: FlowKind = FlowKind::Fetch;

		let route = self.config.classify(&request.url);

		if matches!(route, RouteClass::Bypass(_)) {
			flow_event!(trace, route = ?route, url = %request.url, "Bypassing gateway.");

			let response = self.send(request).await?;

			obs::record_call_outcome(CallOutcome::Bypassed);

			return Ok((response, CallOutcome::Bypassed));
		}

		let span = FlowSpan::new(KIND, "fetch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.dispatch(request, route)).await;

		match &result {
			Ok((_, outcome)) => {
				obs::record_call_outcome(*outcome);
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Returns `true` while a renewal is in flight.
	pub fn renewal_in_flight(&self) -> bool {
		self.renewals.is_in_flight()
	}

	async fn dispatch(
		&self,
		mut request: ApiRequest,
		route: RouteClass,
	) -> Result<(ApiResponse, CallOutcome)> {
		let injected = if request.has_authorization() {
			None
		} else {
			self.inject_stored_token(&mut request).await?
		};
		let retry = request.clone();
		let response = self.send(request).await?;

		if !response.is_unauthorized() || route == RouteClass::AuthEndpoint {
			return Ok((response, CallOutcome::Completed));
		}

		flow_event!(debug, url = %retry.url, "Protected call was rejected as unauthorized.");

		let renewed = match self.superseded_token(injected.as_ref()).await {
			Some(current) => Ok(current),
			None => self.await_renewal().await,
		};

		match renewed {
			Ok(token) => self.retry_once(retry, &token, response).await,
			Err(_) => Ok((response, CallOutcome::LoggedOut)),
		}
	}

	async fn inject_stored_token(&self, request: &mut ApiRequest) -> Result<Option<TokenSecret>> {
		let Some(token) = self.vault().access_token().await? else {
			return Ok(None);
		};

		if request.authorize(&token) {
			Ok(Some(token))
		} else {
			flow_event!(warn, "Stored access token is not a valid header value; sending without it.");

			Ok(None)
		}
	}

	// A 401 for a token that has since been replaced means another caller already renewed.
	async fn superseded_token(&self, injected: Option<&TokenSecret>) -> Option<TokenSecret> {
		let injected = injected?;
		let current = self.vault().access_token().await.ok()??;

		(current != *injected && crate::http::is_header_safe(&current)).then_some(current)
	}

	async fn retry_once(
		&self,
		mut request: ApiRequest,
		token: &TokenSecret,
		original: ApiResponse,
	) -> Result<(ApiResponse, CallOutcome)> {
		if !request.authorize(token) {
			return Ok((original, CallOutcome::RetriedFailed));
		}

		let response = self.send(request).await?;
		let outcome = if response.is_unauthorized() {
			CallOutcome::RetriedFailed
		} else {
			CallOutcome::RetriedOk
		};

		Ok((response, outcome))
	}

	async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let url = request.url.clone();

		self.transport
			.send(request)
			.await
			.map_err(|e| Error::from(TransportError::network(&url, e)))
	}

	fn vault(&self) -> CredentialVault<'_> {
		CredentialVault::new(self.store.as_ref(), &self.config.storage_keys)
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestTransport> {
	/// Creates a gateway that provisions its own reqwest transport.
	pub fn new(
		config: GatewayConfig,
		store: Arc<dyn SessionStore>,
		context: Arc<dyn BrowsingContext>,
	) -> Self {
		Self::with_transport(config, ReqwestTransport::default(), store, context)
	}
}
impl<T> Clone for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			transport: self.transport.clone(),
			store: self.store.clone(),
			context: self.context.clone(),
			renewal_metrics: self.renewal_metrics.clone(),
			renewals: self.renewals.clone(),
		}
	}
}
impl<T> Debug for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("config", &self.config)
			.field("renewal_in_flight", &self.renewals.is_in_flight())
			.finish()
	}
}
