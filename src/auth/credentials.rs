//! Credential pair model and the keyed view over a [`SessionStore`] that reads and writes it.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::StorageKeys,
	store::{SessionStore, StoreError},
};

/// Access/refresh credential pair issued at login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Short-lived bearer credential.
	pub access_token: TokenSecret,
	/// Long-lived renewal credential.
	pub refresh_token: TokenSecret,
}
impl CredentialPair {
	/// Creates a pair from raw token strings.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
		}
	}
}

/// Borrowed view that maps credential operations onto the configured storage keys.
///
/// Every session entry (access token, refresh token, cached identity) is written and erased
/// through this type so the three keys always move together.
pub struct CredentialVault<'a> {
	store: &'a dyn SessionStore,
	keys: &'a StorageKeys,
}
impl<'a> CredentialVault<'a> {
	/// Creates a vault over `store` using `keys`.
	pub fn new(store: &'a dyn SessionStore, keys: &'a StorageKeys) -> Self {
		Self { store, keys }
	}

	/// Reads the stored access credential.
	pub async fn access_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.store.get(&self.keys.access_token).await?.map(TokenSecret::new))
	}

	/// Reads the stored refresh credential.
	pub async fn refresh_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.store.get(&self.keys.refresh_token).await?.map(TokenSecret::new))
	}

	/// Replaces the access credential, leaving the refresh credential untouched.
	pub async fn set_access_token(&self, token: &TokenSecret) -> Result<(), StoreError> {
		self.store.set(&self.keys.access_token, token.expose()).await
	}

	/// Persists a freshly issued pair plus the optional identity document.
	pub async fn save_session(
		&self,
		pair: &CredentialPair,
		user: Option<&serde_json::Value>,
	) -> Result<(), StoreError> {
		self.store.set(&self.keys.access_token, pair.access_token.expose()).await?;
		self.store.set(&self.keys.refresh_token, pair.refresh_token.expose()).await?;

		match user {
			Some(user) => {
				let encoded = serde_json::to_string(user).map_err(|e| {
					StoreError::Serialization { message: format!("Failed to encode user: {e}") }
				})?;

				self.store.set(&self.keys.user, &encoded).await
			},
			None => self.store.remove(&self.keys.user).await,
		}
	}

	/// Reads and decodes the cached identity document.
	pub async fn cached_user(&self) -> Result<Option<serde_json::Value>, StoreError> {
		let Some(raw) = self.store.get(&self.keys.user).await? else {
			return Ok(None);
		};

		serde_json::from_str(&raw).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to decode cached user: {e}"),
		})
	}

	/// Erases the access credential, refresh credential, and cached identity.
	///
	/// All three removals are attempted even if one fails; the first failure is reported.
	pub async fn clear(&self) -> Result<(), StoreError> {
		let mut first_err = None;

		for key in [&self.keys.access_token, &self.keys.refresh_token, &self.keys.user] {
			if let Err(e) = self.store.remove(key).await {
				first_err.get_or_insert(e);
			}
		}

		match first_err {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}
}
