//! Identity produced by successful server-side token verification.

// self
use crate::{_prelude::*, auth::ScopeSet};

/// Result of a successful bearer-token verification.
///
/// Lives only for the duration of one inbound request; never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedIdentity {
	/// Subject the token was issued to.
	pub subject: String,
	/// Scopes the token grants.
	pub scopes: ScopeSet,
	/// Expiry instant reported by the verifier, when known.
	pub expires_at: Option<OffsetDateTime>,
}
