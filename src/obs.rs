//! Optional observability helpers for session calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `fitbit_session.call` with the `call` (kind)
//!   and `stage` (call site) fields.
//! - Enable `metrics` to increment the `fitbit_session_call_total` counter for every
//!   attempt/success/failure, labeled by `call` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, http::Verb};

/// API call kinds observed by the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Authorization-code exchange.
	Exchange,
	/// Silent refresh grant.
	Refresh,
	/// Authenticated GET helper.
	Get,
	/// Authenticated POST helper.
	Post,
	/// Authenticated DELETE helper.
	Delete,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Exchange => "exchange",
			CallKind::Refresh => "refresh",
			CallKind::Get => "get",
			CallKind::Post => "post",
			CallKind::Delete => "delete",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl From<Verb> for CallKind {
	fn from(verb: Verb) -> Self {
		match verb {
			Verb::Get => CallKind::Get,
			Verb::Post => CallKind::Post,
			Verb::Delete => CallKind::Delete,
		}
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a session helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
