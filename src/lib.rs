//! Authenticated request gateway for the ZEDLY platform.
//!
//! Wraps any HTTP transport with bearer injection, singleflight credential renewal, and session
//! teardown.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod http;
pub mod obs;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::config::GatewayConfig;

	/// Builds a [`GatewayConfig`] rooted at the provided base URL with default paths.
	pub fn test_config(base_url: &str) -> GatewayConfig {
		let base = Url::parse(base_url).expect("Failed to parse test base URL.");

		GatewayConfig::builder(base).build().expect("Default gateway config should build.")
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
