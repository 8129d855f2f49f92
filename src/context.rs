//! Browsing-context port used to send the user back to the login page when a session ends.
//!
//! Hosts embedding the gateway (a webview shell, a desktop client, a test harness) implement
//! [`BrowsingContext`] so the gateway never touches the environment directly.

// self
use crate::_prelude::*;

/// Location access the gateway needs from its host.
pub trait BrowsingContext
where
	Self: Send + Sync,
{
	/// Path of the page currently displayed.
	fn current_path(&self) -> String;

	/// Navigates the host to `path`.
	fn navigate(&self, path: &str);
}

/// In-memory context for headless hosts; records every navigation.
#[derive(Debug, Default)]
pub struct DetachedContext {
	current: Mutex<String>,
	history: Mutex<Vec<String>>,
}
impl DetachedContext {
	/// Creates a context positioned on `path`.
	pub fn new(path: impl Into<String>) -> Self {
		Self { current: Mutex::new(path.into()), history: Default::default() }
	}

	/// Paths navigated to, oldest first.
	pub fn navigations(&self) -> Vec<String> {
		self.history.lock().clone()
	}
}
impl BrowsingContext for DetachedContext {
	fn current_path(&self) -> String {
		self.current.lock().clone()
	}

	fn navigate(&self, path: &str) {
		*self.current.lock() = path.to_owned();

		self.history.lock().push(path.to_owned());
	}
}
