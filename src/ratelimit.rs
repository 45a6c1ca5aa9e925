//! Rate-limit telemetry parsed from Fitbit response headers.

// crates.io
use oauth2::http::HeaderMap;
// self
use crate::_prelude::*;

/// Header carrying the request count figure for the current window.
pub const HEADER_REMAINING: &str = "fitbit-rate-limit-remaining";
/// Header carrying the total request allowance per window.
pub const HEADER_LIMIT: &str = "fitbit-rate-limit-limit";
/// Header carrying the seconds remaining until the window resets.
pub const HEADER_RESET: &str = "fitbit-rate-limit-reset";

/// Quota snapshot reported by the provider on every response.
///
/// The snapshot is advisory telemetry: it reflects the last request made, not
/// real time, and is overwritten wholesale as responses arrive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ratelimit {
	/// Allowance advertised by the `fitbit-rate-limit-limit` header.
	pub available: u32,
	/// Figure advertised by the `fitbit-rate-limit-remaining` header.
	pub used: u32,
	/// Instant the current window resets, derived from `fitbit-rate-limit-reset`.
	pub reset_at: Option<OffsetDateTime>,
}
impl Ratelimit {
	/// Folds the rate-limit headers of one response into the snapshot.
	///
	/// Missing or malformed values leave the corresponding field untouched; the
	/// reset header counts seconds and is anchored to the local clock at parse
	/// time, an approximation callers must tolerate.
	pub fn absorb(&mut self, headers: &HeaderMap) {
		if let Some(value) = header_u32(headers, HEADER_REMAINING) {
			self.used = value;
		}
		if let Some(value) = header_u32(headers, HEADER_LIMIT) {
			self.available = value;
		}
		if let Some(secs) = header_u32(headers, HEADER_RESET) {
			self.reset_at = Some(OffsetDateTime::now_utc() + Duration::seconds(i64::from(secs)));
		}
	}
}

fn header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
	headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
