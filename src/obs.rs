//! Optional observability helpers for gateway flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `zedly_gateway.flow` with the `flow` and
//!   `stage` (call site) fields, plus debug/warn events at renewal and teardown points.
//! - Enable `metrics` to increment the `zedly_gateway_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and the `zedly_gateway_call_total`
//!   counter labeled by the terminal call state.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

pub(crate) use self::tracing::flow_event;

// self
use crate::_prelude::*;

/// Gateway flow kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Intercepted API call.
	Fetch,
	/// Credential renewal against the refresh endpoint.
	Renewal,
	/// Login exchange.
	Login,
	/// Logout and local teardown.
	Logout,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Fetch => "fetch",
			FlowKind::Renewal => "renewal",
			FlowKind::Login => "login",
			FlowKind::Logout => "logout",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a gateway helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
