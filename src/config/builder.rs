// self
use crate::{
	_prelude::*,
	config::{GatewayConfig, RoutePaths, StorageKeys},
};

/// Errors raised while constructing or validating a [`GatewayConfig`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum GatewayConfigError {
	/// Base URL must be a bare HTTP(S) origin: a host and no path, query, or fragment.
	#[error("Base URL must be an http(s) origin without a path: {url}.")]
	UnsupportedBaseUrl {
		/// Base URL that failed validation.
		url: String,
	},
	/// Route paths must be absolute.
	#[error("The {field} route must start with `/`: {value}.")]
	RelativePath {
		/// Which route failed validation.
		field: &'static str,
		/// Offending value.
		value: String,
	},
	/// Endpoint lies outside the API prefix.
	#[error("The {field} endpoint `{value}` is not under the API prefix.")]
	OutsideApiPrefix {
		/// Which endpoint failed validation.
		field: &'static str,
		/// Offending value.
		value: String,
	},
	/// Storage key names must be non-empty and distinct.
	#[error("Storage key `{key}` is empty or used twice.")]
	InvalidStorageKey {
		/// Offending key.
		key: String,
	},
	/// JSON configuration could not be parsed.
	#[error("Gateway configuration could not be parsed: {message}.")]
	Parse {
		/// Parsing failure summary including the failing path.
		message: String,
	},
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug)]
pub struct GatewayConfigBuilder {
	/// Origin the relative API paths resolve against.
	pub base_url: Url,
	/// Route layout.
	pub routes: RoutePaths,
	/// Storage key names.
	pub storage_keys: StorageKeys,
}
impl GatewayConfigBuilder {
	/// Creates a new builder with the default ZEDLY routes and storage keys.
	pub fn new(base_url: Url) -> Self {
		Self { base_url, routes: RoutePaths::default(), storage_keys: StorageKeys::default() }
	}

	/// Overrides the API prefix (defaults to `/api/`).
	pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.routes.api_prefix = prefix.into();

		self
	}

	/// Overrides the auth endpoint prefix (defaults to `/api/auth/`).
	pub fn auth_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.routes.auth_prefix = prefix.into();

		self
	}

	/// Overrides the login endpoint.
	pub fn login_endpoint(mut self, path: impl Into<String>) -> Self {
		self.routes.login = path.into();

		self
	}

	/// Overrides the refresh endpoint.
	pub fn refresh_endpoint(mut self, path: impl Into<String>) -> Self {
		self.routes.refresh = path.into();

		self
	}

	/// Overrides the logout endpoint.
	pub fn logout_endpoint(mut self, path: impl Into<String>) -> Self {
		self.routes.logout = path.into();

		self
	}

	/// Overrides the login page the session-expiry redirect targets.
	pub fn login_page(mut self, path: impl Into<String>) -> Self {
		self.routes.login_page = path.into();

		self
	}

	/// Overrides the storage key names.
	pub fn storage_keys(mut self, keys: StorageKeys) -> Self {
		self.storage_keys = keys;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<GatewayConfig, GatewayConfigError> {
		let config = GatewayConfig {
			base_url: self.base_url,
			routes: self.routes,
			storage_keys: self.storage_keys,
		};

		config.validate()?;

		Ok(config)
	}
}

impl GatewayConfig {
	/// Validates invariants for the configuration.
	pub(crate) fn validate(&self) -> Result<(), GatewayConfigError> {
		let base = &self.base_url;

		if !matches!(base.scheme(), "http" | "https")
			|| base.host().is_none()
			|| base.path() != "/"
			|| base.query().is_some()
			|| base.fragment().is_some()
		{
			return Err(GatewayConfigError::UnsupportedBaseUrl { url: self.base_url.to_string() });
		}

		let routes = &self.routes;

		for (field, value) in [
			("api_prefix", &routes.api_prefix),
			("auth_prefix", &routes.auth_prefix),
			("login", &routes.login),
			("refresh", &routes.refresh),
			("logout", &routes.logout),
			("login_page", &routes.login_page),
		] {
			validate_absolute(field, value)?;
		}
		for (field, value) in [
			("auth_prefix", &routes.auth_prefix),
			("login", &routes.login),
			("refresh", &routes.refresh),
			("logout", &routes.logout),
		] {
			if !value.starts_with(&routes.api_prefix) {
				return Err(GatewayConfigError::OutsideApiPrefix { field, value: value.clone() });
			}
		}

		validate_storage_keys(&self.storage_keys)
	}
}

fn validate_absolute(field: &'static str, value: &str) -> Result<(), GatewayConfigError> {
	if value.starts_with('/') {
		Ok(())
	} else {
		Err(GatewayConfigError::RelativePath { field, value: value.to_owned() })
	}
}

fn validate_storage_keys(keys: &StorageKeys) -> Result<(), GatewayConfigError> {
	let all = [&keys.access_token, &keys.refresh_token, &keys.user];

	for (idx, key) in all.iter().enumerate() {
		if key.trim().is_empty() || all[..idx].contains(key) {
			return Err(GatewayConfigError::InvalidStorageKey { key: key.to_string() });
		}
	}

	Ok(())
}
