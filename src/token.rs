//! Token material shared with persistence hooks, plus the rotation predicate.

// self
use crate::_prelude::*;

/// Leeway subtracted from the recorded expiry when judging staleness, absorbing
/// clock skew between the provider and this host.
const EXPIRY_LEEWAY: Duration = Duration::seconds(10);

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Bearer credentials issued by the token endpoint.
///
/// Snapshots of this struct are handed by value to token-change listeners so
/// callers can persist them; the serde representation is stable for that
/// purpose.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	/// Short-lived bearer secret attached to every API request.
	pub access_token: TokenSecret,
	/// Longer-lived secret used to mint new access tokens without re-prompting.
	pub refresh_token: Option<TokenSecret>,
	/// Token type label reported by the provider (`Bearer` in practice).
	pub token_type: String,
	/// Expiry instant, when the provider reported one.
	pub expires_at: Option<OffsetDateTime>,
}
impl Token {
	/// Creates a bearer token carrying only an access secret.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: None,
			token_type: "Bearer".into(),
			expires_at: None,
		}
	}

	/// Attaches the refresh secret.
	pub fn with_refresh_token(mut self, secret: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(secret));

		self
	}

	/// Overrides the token type label.
	pub fn with_token_type(mut self, label: impl Into<String>) -> Self {
		self.token_type = label.into();

		self
	}

	/// Sets the expiry instant.
	pub fn with_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Returns `true` when the token should no longer be used at `instant`.
	///
	/// Tokens without a recorded expiry never go stale.
	pub fn is_stale_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expiry| expiry - EXPIRY_LEEWAY <= instant)
	}

	/// Staleness relative to the current clock.
	pub fn is_stale(&self) -> bool {
		self.is_stale_at(OffsetDateTime::now_utc())
	}

	/// Rotation predicate: `true` when the access or refresh secret differs
	/// from `previous`. An unrecorded previous token counts as different.
	pub fn differs_from(&self, previous: Option<&Self>) -> bool {
		let Some(previous) = previous else {
			return true;
		};

		self.access_token != previous.access_token || self.refresh_token != previous.refresh_token
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn staleness_honors_leeway_and_absent_expiry() {
		let now = OffsetDateTime::now_utc();
		let fresh = Token::new("a").with_expires_at(now + Duration::hours(1));
		let inside_leeway = Token::new("a").with_expires_at(now + Duration::seconds(5));
		let expired = Token::new("a").with_expires_at(now - Duration::hours(1));
		let everlasting = Token::new("a");

		assert!(!fresh.is_stale_at(now));
		assert!(inside_leeway.is_stale_at(now));
		assert!(expired.is_stale_at(now));
		assert!(!everlasting.is_stale_at(now));
	}

	#[test]
	fn rotation_predicate_compares_both_secrets() {
		let recorded = Token::new("access").with_refresh_token("refresh");
		let unchanged = recorded.clone();
		let new_access = Token::new("access-2").with_refresh_token("refresh");
		let new_refresh = Token::new("access").with_refresh_token("refresh-2");

		assert!(recorded.differs_from(None));
		assert!(!unchanged.differs_from(Some(&recorded)));
		assert!(new_access.differs_from(Some(&recorded)));
		assert!(new_refresh.differs_from(Some(&recorded)));
	}

	#[test]
	fn formatters_redact_secrets() {
		let token = Token::new("super-secret").with_refresh_token("extra-secret");
		let rendered = format!("{token:?}");

		assert!(!rendered.contains("super-secret"));
		assert!(!rendered.contains("extra-secret"));
		assert!(rendered.contains("<redacted>"));
	}

	#[test]
	fn serde_round_trips_for_persistence() {
		let token = Token::new("access")
			.with_refresh_token("refresh")
			.with_expires_at(OffsetDateTime::from_unix_timestamp(1_750_000_000).expect(
				"Fixture timestamp should be in range.",
			));
		let encoded = serde_json::to_string(&token).expect("Token should serialize.");
		let decoded: Token = serde_json::from_str(&encoded).expect("Token should deserialize.");

		assert_eq!(decoded, token);
		assert_eq!(decoded.access_token.expose(), "access");
	}
}
