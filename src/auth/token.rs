//! Token set model, wire-format token responses, and expiry helpers.

// self
use crate::{_prelude::*, auth::{ScopeSet, TokenSecret}};

/// Issued token material for one client configuration.
///
/// A token set is replaced wholesale on every exchange or refresh; individual
/// fields are never mutated in place, so readers always observe a consistent
/// record. `expires_at` is `None` when the server omitted `expires_in`, in
/// which case the token is treated as valid until the server rejects it.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenSet {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the server issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Scopes granted to this token set.
	pub scopes: ScopeSet,
	/// Instant the local clock recorded the issuing response.
	pub issued_at: OffsetDateTime,
	/// Expiry instant derived from `issued_at` plus `expires_in`.
	pub expires_at: Option<OffsetDateTime>,
}
impl TokenSet {
	/// Returns true when the token has exceeded its expiry at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		match self.expires_at {
			Some(expires_at) => instant >= expires_at,
			None => false,
		}
	}

	/// Convenience helper that checks expiry against the current UTC instant.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Returns a copy whose expiry is forced into the past, so the next use refreshes.
	pub(crate) fn force_expired(&self, instant: OffsetDateTime) -> Self {
		let mut forced = self.clone();

		forced.expires_at = Some(instant);

		forced
	}
}
impl Debug for TokenSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSet")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("scopes", &self.scopes)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Token endpoint response body (RFC 6749 §5.1).
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
	/// Issued access token value.
	pub access_token: String,
	/// Token type; bearer is the only type this crate attaches.
	#[serde(default)]
	pub token_type: Option<String>,
	/// Relative expiry in seconds, when supplied.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Rotated or re-issued refresh token, when supplied.
	#[serde(default)]
	pub refresh_token: Option<String>,
	/// Space-delimited granted scopes; absent means "as requested".
	#[serde(default)]
	pub scope: Option<String>,
}
impl TokenResponse {
	/// Converts the wire response into a [`TokenSet`] stamped at `now`.
	///
	/// When the response omits `scope`, the requested set applies (RFC 6749 §5.1).
	/// When it omits `refresh_token`, `previous_refresh` is carried forward so a
	/// non-rotating server does not lose the grant.
	pub fn into_token_set(
		self,
		requested_scopes: &ScopeSet,
		previous_refresh: Option<TokenSecret>,
		now: OffsetDateTime,
	) -> Result<TokenSet, crate::auth::ScopeValidationError> {
		let scopes = match self.scope.as_deref() {
			Some(granted) => granted.parse()?,
			None => requested_scopes.clone(),
		};
		let refresh_token = self.refresh_token.map(TokenSecret::new).or(previous_refresh);

		Ok(TokenSet {
			access_token: TokenSecret::new(self.access_token),
			refresh_token,
			scopes,
			issued_at: now,
			expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn response(json: &str) -> TokenResponse {
		serde_json::from_str(json).expect("Token response fixture should deserialize.")
	}

	#[test]
	fn expiry_is_checked_lazily() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let set = response(r#"{"access_token":"at","token_type":"Bearer","expires_in":3600}"#)
			.into_token_set(&ScopeSet::default(), None, issued)
			.expect("Token set conversion should succeed.");

		assert!(!set.is_expired_at(macros::datetime!(2025-01-01 00:59 UTC)));
		assert!(set.is_expired_at(macros::datetime!(2025-01-01 01:00 UTC)));
	}

	#[test]
	fn missing_expiry_means_not_expired() {
		let set = response(r#"{"access_token":"at"}"#)
			.into_token_set(&ScopeSet::default(), None, OffsetDateTime::now_utc())
			.expect("Token set conversion should succeed.");

		assert!(!set.is_expired());
		assert!(set.expires_at.is_none());
	}

	#[test]
	fn absent_scope_falls_back_to_requested() {
		let requested =
			ScopeSet::new(["email", "profile"]).expect("Requested scope fixture should be valid.");
		let set = response(r#"{"access_token":"at","expires_in":60}"#)
			.into_token_set(&requested, None, OffsetDateTime::now_utc())
			.expect("Token set conversion should succeed.");

		assert_eq!(set.scopes, requested);
	}

	#[test]
	fn omitted_refresh_token_carries_previous_one() {
		let previous = TokenSecret::new("keep-me");
		let set = response(r#"{"access_token":"at","expires_in":60}"#)
			.into_token_set(&ScopeSet::default(), Some(previous), OffsetDateTime::now_utc())
			.expect("Token set conversion should succeed.");

		assert_eq!(set.refresh_token.as_ref().map(TokenSecret::expose), Some("keep-me"));

		let rotated = response(r#"{"access_token":"at","refresh_token":"new","expires_in":60}"#)
			.into_token_set(
				&ScopeSet::default(),
				Some(TokenSecret::new("old")),
				OffsetDateTime::now_utc(),
			)
			.expect("Token set conversion should succeed.");

		assert_eq!(rotated.refresh_token.as_ref().map(TokenSecret::expose), Some("new"));
	}

	#[test]
	fn debug_redacts_secrets() {
		let set = response(r#"{"access_token":"at","refresh_token":"rt","expires_in":60}"#)
			.into_token_set(&ScopeSet::default(), None, OffsetDateTime::now_utc())
			.expect("Token set conversion should succeed.");
		let rendered = format!("{set:?}");

		assert!(!rendered.contains("at\""));
		assert!(!rendered.contains("rt\""));
		assert!(rendered.contains("<redacted>"));
	}
}
