//! Gateway configuration: the API origin, route layout, and storage key names.
//!
//! [`GatewayConfig`] is assembled through [`GatewayConfigBuilder`] (or deserialized and then
//! validated with [`GatewayConfig::from_json`]) and decides, per request URL, whether the
//! gateway intercepts the call.

/// Builder API and validation for gateway configuration.
pub mod builder;

pub use builder::*;

// self
use crate::_prelude::*;

/// Path layout of the ZEDLY API surface and the login page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutePaths {
	/// Prefix of every intercepted API path.
	pub api_prefix: String,
	/// Prefix of auth endpoints; these receive a bearer credential but never trigger renewal.
	pub auth_prefix: String,
	/// Login endpoint, always bypassed.
	pub login: String,
	/// Refresh endpoint, always bypassed.
	pub refresh: String,
	/// Logout endpoint used by [`Gateway::logout`](crate::gateway::Gateway::logout).
	pub logout: String,
	/// Page the browsing context is sent to when the session expires.
	pub login_page: String,
}
impl Default for RoutePaths {
	fn default() -> Self {
		Self {
			api_prefix: "/api/".into(),
			auth_prefix: "/api/auth/".into(),
			login: "/api/auth/login".into(),
			refresh: "/api/auth/refresh".into(),
			logout: "/api/auth/logout".into(),
			login_page: "/login".into(),
		}
	}
}

/// Storage key names for the session entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
	/// Key holding the access credential.
	pub access_token: String,
	/// Key holding the refresh credential.
	pub refresh_token: String,
	/// Key holding the cached user identity document.
	pub user: String,
}
impl Default for StorageKeys {
	fn default() -> Self {
		Self {
			access_token: "access_token".into(),
			refresh_token: "refresh_token".into(),
			user: "user".into(),
		}
	}
}

/// Why a request was forwarded without credential handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BypassReason {
	/// Target is the login endpoint.
	LoginEndpoint,
	/// Target is the refresh endpoint.
	RefreshEndpoint,
	/// Target lives on another origin or outside the API prefix.
	OutsideApi,
}
impl BypassReason {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			BypassReason::LoginEndpoint => "login_endpoint",
			BypassReason::RefreshEndpoint => "refresh_endpoint",
			BypassReason::OutsideApi => "outside_api",
		}
	}
}

/// Gateway treatment of a request target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteClass {
	/// Forwarded untouched.
	Bypass(BypassReason),
	/// Receives a bearer credential; a 401 is returned as-is.
	AuthEndpoint,
	/// Receives a bearer credential; a 401 triggers renewal and one retry.
	Protected,
}

/// Validated gateway configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
	/// Origin the relative API paths resolve against; must not carry a path.
	pub base_url: Url,
	/// API route layout.
	#[serde(default)]
	pub routes: RoutePaths,
	/// Storage key names.
	#[serde(default)]
	pub storage_keys: StorageKeys,
}
impl GatewayConfig {
	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> GatewayConfigBuilder {
		GatewayConfigBuilder::new(base_url)
	}

	/// Deserializes a JSON document and validates the result.
	pub fn from_json(raw: &str) -> Result<Self, GatewayConfigError> {
		let de = &mut serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(de)
			.map_err(|e| GatewayConfigError::Parse { message: e.to_string() })?;

		config.validate()?;

		Ok(config)
	}

	/// Resolves an absolute URL or a path relative to [`GatewayConfig::base_url`].
	pub fn resolve(&self, target: &str) -> Result<Url, url::ParseError> {
		self.base_url.join(target)
	}

	/// Classifies a request target.
	pub fn classify(&self, url: &Url) -> RouteClass {
		if url.origin() != self.base_url.origin() {
			return RouteClass::Bypass(BypassReason::OutsideApi);
		}

		let path = url.path();

		if same_path(path, &self.routes.login) {
			return RouteClass::Bypass(BypassReason::LoginEndpoint);
		}
		if same_path(path, &self.routes.refresh) {
			return RouteClass::Bypass(BypassReason::RefreshEndpoint);
		}
		if !path.starts_with(&self.routes.api_prefix) {
			return RouteClass::Bypass(BypassReason::OutsideApi);
		}
		if path.starts_with(&self.routes.auth_prefix) {
			return RouteClass::AuthEndpoint;
		}

		RouteClass::Protected
	}

	/// Returns `true` when `path` is the configured login page.
	pub fn is_login_page(&self, path: &str) -> bool {
		same_path(path, &self.routes.login_page)
	}
}

fn same_path(path: &str, route: &str) -> bool {
	path.trim_end_matches('/') == route.trim_end_matches('/')
}
