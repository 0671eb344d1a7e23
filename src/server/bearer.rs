//! Request authentication: transport guard first, then bearer verification.

// crates.io
use http::{HeaderMap, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::VerifiedIdentity,
	server::{TokenVerifier, TransportGuard},
};

/// Authenticates inbound requests for a resource server.
///
/// The transport guard runs unconditionally before any token handling; a
/// request from an untrusted origin is rejected even when it carries a valid
/// bearer token, because a rebound browser can replay stolen credentials.
pub struct BearerAuthenticator {
	guard: TransportGuard,
	verifier: Arc<dyn TokenVerifier>,
}
impl BearerAuthenticator {
	/// Pairs a transport guard with a token verifier.
	pub fn new(guard: TransportGuard, verifier: Arc<dyn TokenVerifier>) -> Self {
		Self { guard, verifier }
	}

	/// Authenticates one request from its headers.
	pub async fn authenticate(&self, headers: &HeaderMap) -> Result<VerifiedIdentity, AuthRejection> {
		self.guard.check_headers(headers).map_err(AuthRejection::from_error)?;

		let raw_token = extract_bearer(headers).map_err(AuthRejection::from_error)?;

		self.verifier.verify(raw_token).await.map_err(AuthRejection::from_error)
	}
}
impl Debug for BearerAuthenticator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BearerAuthenticator").field("guard", &self.guard).finish()
	}
}

/// HTTP-shaped rejection carrying the underlying error.
#[derive(Debug)]
pub struct AuthRejection {
	/// Response status to answer with.
	pub status: StatusCode,
	/// Underlying gatekeeper error.
	pub error: Error,
}
impl AuthRejection {
	fn from_error(error: Error) -> Self {
		let status = match &error {
			Error::UntrustedOrigin { .. } | Error::InsufficientScope { .. } =>
				StatusCode::FORBIDDEN,
			Error::TokenExpired | Error::TokenInvalid { .. } => StatusCode::UNAUTHORIZED,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		};

		Self { status, error }
	}

	/// RFC 6750 `WWW-Authenticate` challenge value, when one applies.
	///
	/// Origin rejections deliberately carry no challenge: the request should
	/// never have reached this server, and a challenge would invite a retry.
	pub fn www_authenticate(&self) -> Option<String> {
		match &self.error {
			Error::TokenExpired | Error::TokenInvalid { .. } => Some(format!(
				r#"Bearer error="invalid_token", error_description="{}""#,
				sanitize(&self.error.to_string()),
			)),
			Error::InsufficientScope { .. } => Some(format!(
				r#"Bearer error="insufficient_scope", error_description="{}""#,
				sanitize(&self.error.to_string()),
			)),
			_ => None,
		}
	}
}
impl Display for AuthRejection {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} {}", self.status.as_u16(), self.error)
	}
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str> {
	let value = headers
		.get(AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.ok_or_else(|| Error::TokenInvalid { reason: "request carried no bearer token".into() })?;
	let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));

	if !scheme.eq_ignore_ascii_case("Bearer") || token.is_empty() {
		return Err(Error::TokenInvalid {
			reason: "Authorization header is not a bearer token".into(),
		});
	}

	Ok(token.trim())
}

// Quoted-string parameters must not contain quotes or control characters.
fn sanitize(reason: &str) -> String {
	reason.chars().filter(|c| !c.is_control() && *c != '"' && *c != '\\').collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn bearer_extraction_enforces_the_scheme() {
		let mut headers = HeaderMap::new();

		assert!(extract_bearer(&headers).is_err());

		headers.insert(AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().expect("Header should parse."));

		assert!(extract_bearer(&headers).is_err());

		headers.insert(AUTHORIZATION, "Bearer".parse().expect("Header should parse."));

		assert!(extract_bearer(&headers).is_err());

		headers.insert(AUTHORIZATION, "bearer tok-1".parse().expect("Header should parse."));

		assert_eq!(extract_bearer(&headers).expect("Lowercase scheme should pass."), "tok-1");
	}

	#[test]
	fn rejections_map_to_rfc_6750_challenges() {
		let invalid = AuthRejection::from_error(Error::TokenInvalid { reason: "inactive".into() });

		assert_eq!(invalid.status, StatusCode::UNAUTHORIZED);
		assert!(
			invalid
				.www_authenticate()
				.expect("Invalid token should carry a challenge.")
				.starts_with(r#"Bearer error="invalid_token""#),
		);

		let scope = AuthRejection::from_error(Error::InsufficientScope { reason: "email".into() });

		assert_eq!(scope.status, StatusCode::FORBIDDEN);
		assert!(
			scope
				.www_authenticate()
				.expect("Scope gap should carry a challenge.")
				.contains("insufficient_scope"),
		);

		let origin =
			AuthRejection::from_error(Error::UntrustedOrigin { reason: "evil.example".into() });

		assert_eq!(origin.status, StatusCode::FORBIDDEN);
		assert!(origin.www_authenticate().is_none());
	}

	#[test]
	fn challenge_descriptions_never_break_the_quoted_string() {
		let rejection = AuthRejection::from_error(Error::TokenInvalid {
			reason: "bad \"quote\" and \u{7}".into(),
		});
		let challenge =
			rejection.www_authenticate().expect("Invalid token should carry a challenge.");

		assert!(!challenge.contains('\u{7}'));
		assert_eq!(challenge.matches('"').count(), 4);
	}
}
