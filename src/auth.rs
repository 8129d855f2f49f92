//! Credential models: redacted secrets, the access/refresh pair, and the cached identity.

pub mod credentials;
pub mod secret;

pub use credentials::*;
pub use secret::*;
