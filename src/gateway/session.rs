//! Session lifecycle: login, logout, and read access to the cached identity.

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	error::ConfigError,
	gateway::Gateway,
	http::{ApiRequest, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, flow_event},
};

#[derive(Serialize)]
struct LoginRequest<'a> {
	username: &'a str,
	password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
	access_token: TokenSecret,
	refresh_token: TokenSecret,
	#[serde(default)]
	user: Option<serde_json::Value>,
}

#[derive(Default, Deserialize)]
struct ErrorBody {
	error: Option<String>,
	message: Option<String>,
}

/// Result of a successful [`Gateway::login`].
#[derive(Clone, Debug)]
pub struct LoginOutcome {
	/// Credential pair now held in storage.
	pub credentials: CredentialPair,
	/// Identity document returned alongside the credentials, if any.
	pub user: Option<serde_json::Value>,
	/// Moment the session was persisted.
	pub logged_in_at: OffsetDateTime,
}

impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Exchanges `username` and `password` for a credential pair and persists the session.
	///
	/// A non-success answer yields [`Error::LoginRejected`] and leaves storage untouched.
	pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.login_inner(username, password)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Ends the session.
	///
	/// The logout endpoint is notified on a best-effort basis; its failures are logged and
	/// ignored. Stored credentials and the cached identity are always erased. The browsing
	/// context is left where it is.
	pub async fn logout(&self) -> Result<()> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				self.notify_logout().await;

				self.vault().clear().await.map_err(Error::from)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Returns the identity document cached at login.
	pub async fn cached_user(&self) -> Result<Option<serde_json::Value>> {
		Ok(self.vault().cached_user().await?)
	}

	/// Returns `true` when an access credential is stored.
	pub async fn is_authenticated(&self) -> Result<bool> {
		Ok(self.vault().access_token().await?.is_some())
	}

	async fn login_inner(&self, username: &str, password: &str) -> Result<LoginOutcome> {
		let url = self.resolve_route(&self.config.routes.login)?;
		let request = ApiRequest::post(url).json(&LoginRequest { username, password })?;
		let response = self.send(request).await?;

		if !response.is_success() {
			let body = response.json::<ErrorBody>().unwrap_or_default();

			flow_event!(debug, status = response.status.as_u16(), "Login was rejected.");

			return Err(Error::LoginRejected {
				status: response.status.as_u16(),
				message: body.error.or(body.message),
			});
		}

		let payload = response
			.json::<LoginResponse>()
			.map_err(|source| Error::MalformedResponse { endpoint: "login", source })?;
		let credentials =
			CredentialPair { access_token: payload.access_token, refresh_token: payload.refresh_token };

		self.vault().save_session(&credentials, payload.user.as_ref()).await?;

		Ok(LoginOutcome { credentials, user: payload.user, logged_in_at: OffsetDateTime::now_utc() })
	}

	#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
	async fn notify_logout(&self) {
		let url = match self.resolve_route(&self.config.routes.logout) {
			Ok(url) => url,
			Err(e) => {
				flow_event!(warn, error = %e, "Logout endpoint could not be resolved.");

				return;
			},
		};
		let mut request = ApiRequest::post(url);

		match self.vault().access_token().await {
			Ok(Some(token)) => {
				request.authorize(&token);
			},
			Ok(None) => {},
			Err(e) => flow_event!(warn, error = %e, "Failed to read access token for logout."),
		}

		match self.send(request).await {
			Ok(response) if !response.is_success() => {
				flow_event!(
					debug,
					status = response.status.as_u16(),
					"Logout endpoint answered with a non-success status."
				);
			},
			Ok(_) => {},
			Err(e) => flow_event!(warn, error = %e, "Logout endpoint could not be reached."),
		}
	}

	fn resolve_route(&self, path: &str) -> Result<Url, ConfigError> {
		self.config
			.resolve(path)
			.map_err(|source| ConfigError::InvalidTarget { target: path.to_owned(), source })
	}
}
