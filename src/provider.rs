//! Authorization-server metadata and the strategy seam for server quirks.

pub mod metadata;
pub mod strategy;

pub use metadata::*;
pub use strategy::*;

// self
use crate::_prelude::*;

/// Grant types the gatekeeper issues against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantType {
	/// Authorization Code + PKCE exchange.
	AuthorizationCode,
	/// Refresh token rotation.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 `grant_type` parameter value.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
