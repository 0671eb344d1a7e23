//! Server strategy hooks that absorb authorization-server quirks.
//!
//! Servers differ in where they announce errors and what extra form fields they
//! want; the capability hooks here keep those differences out of the flows.

// self
use crate::{_prelude::*, provider::GrantType};

/// Strategy hook that lets server integrations decorate requests and classify errors.
///
/// Implementors must be `Send + Sync`. The hooks work on crate-owned primitives
/// (string maps, status codes) so implementations stay decoupled from any HTTP
/// client. Override only what a server actually needs.
pub trait ServerStrategy
where
	Self: Send + Sync,
{
	/// Maps a token-endpoint failure into the gatekeeper taxonomy.
	fn classify_token_error(&self, ctx: &TokenErrorContext) -> TokenErrorKind;

	/// Gives integrations a chance to add custom form parameters before dispatch.
	fn augment_token_request(&self, _grant: GrantType, _form: &mut BTreeMap<String, String>) {}
}

/// Canonical token-endpoint error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenErrorKind {
	/// Server rejected the grant (bad code, replayed code, dead refresh token).
	InvalidGrant,
	/// Client authentication failed; unrecoverable without reconfiguration.
	InvalidClient,
	/// Requested scopes exceed what the server will grant.
	InsufficientScope,
	/// Failure is temporary and a later attempt may succeed.
	Transient,
}

/// Context assembled from a failing token-endpoint response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenErrorContext {
	/// Grant type associated with the failing request.
	pub grant: GrantType,
	/// HTTP status code, when a response arrived.
	pub http_status: Option<u16>,
	/// OAuth `error` field from the response body.
	pub oauth_error: Option<String>,
	/// OAuth `error_description` field from the response body.
	pub error_description: Option<String>,
	/// Body preview for servers that return non-JSON payloads.
	pub body_preview: Option<String>,
	/// True when the failure never produced a response at all.
	pub network_error: bool,
}
impl TokenErrorContext {
	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant: GrantType) -> Self {
		Self {
			grant,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Convenience constructor for transport-level failures.
	pub fn network_failure(grant: GrantType) -> Self {
		Self { network_error: true, ..Self::new(grant) }
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for non-JSON error payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(body.into());

		self
	}

	/// Best human-readable reason available in the context.
	pub fn reason(&self) -> String {
		self.error_description
			.clone()
			.or_else(|| self.oauth_error.clone())
			.or_else(|| self.body_preview.clone())
			.unwrap_or_else(|| match self.http_status {
				Some(status) => format!("token endpoint returned status {status}"),
				None => "token endpoint was unreachable".into(),
			})
	}
}

/// Default strategy applying RFC-guided heuristics.
///
/// Structured OAuth fields win, then body text hints, then the HTTP status.
/// Network failures are always transient.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultServerStrategy;
impl ServerStrategy for DefaultServerStrategy {
	fn classify_token_error(&self, ctx: &TokenErrorContext) -> TokenErrorKind {
		if ctx.network_error {
			return TokenErrorKind::Transient;
		}
		if let Some(kind) = ctx
			.oauth_error
			.as_deref()
			.and_then(match_error_code)
			.or_else(|| ctx.error_description.as_deref().and_then(match_error_text))
			.or_else(|| ctx.body_preview.as_deref().and_then(match_error_text))
		{
			return kind;
		}

		match ctx.http_status {
			Some(400 | 404 | 410) => TokenErrorKind::InvalidGrant,
			Some(401) => TokenErrorKind::InvalidClient,
			Some(403) => TokenErrorKind::InsufficientScope,
			_ => TokenErrorKind::Transient,
		}
	}
}

fn match_error_code(value: &str) -> Option<TokenErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(TokenErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(TokenErrorKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("invalid_scope")
		|| value.eq_ignore_ascii_case("insufficient_scope")
	{
		Some(TokenErrorKind::InsufficientScope)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(TokenErrorKind::Transient)
	} else {
		None
	}
}

fn match_error_text(body: &str) -> Option<TokenErrorKind> {
	let lowered = body.to_ascii_lowercase();

	if lowered.contains("invalid_grant") {
		Some(TokenErrorKind::InvalidGrant)
	} else if lowered.contains("invalid_client") {
		Some(TokenErrorKind::InvalidClient)
	} else if lowered.contains("insufficient_scope") || lowered.contains("invalid_scope") {
		Some(TokenErrorKind::InsufficientScope)
	} else if lowered.contains("temporarily_unavailable") {
		Some(TokenErrorKind::Transient)
	} else {
		None
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn oauth_error_fields_take_priority() {
		let strategy = DefaultServerStrategy;
		let ctx = TokenErrorContext::new(GrantType::AuthorizationCode)
			.with_http_status(400)
			.with_oauth_error("invalid_grant");

		assert_eq!(strategy.classify_token_error(&ctx), TokenErrorKind::InvalidGrant);

		let ctx = TokenErrorContext::new(GrantType::RefreshToken)
			.with_http_status(401)
			.with_oauth_error("invalid_client");

		assert_eq!(strategy.classify_token_error(&ctx), TokenErrorKind::InvalidClient);
	}

	#[test]
	fn classification_falls_back_to_body_then_status() {
		let strategy = DefaultServerStrategy;
		let body_ctx = TokenErrorContext::new(GrantType::RefreshToken)
			.with_body_preview("error=insufficient_scope");

		assert_eq!(strategy.classify_token_error(&body_ctx), TokenErrorKind::InsufficientScope);

		let status_ctx = TokenErrorContext::new(GrantType::RefreshToken).with_http_status(401);

		assert_eq!(strategy.classify_token_error(&status_ctx), TokenErrorKind::InvalidClient);

		let network_ctx = TokenErrorContext::network_failure(GrantType::RefreshToken);

		assert_eq!(strategy.classify_token_error(&network_ctx), TokenErrorKind::Transient);
	}

	#[test]
	fn custom_strategies_can_augment_token_requests() {
		struct AudienceStrategy;
		impl ServerStrategy for AudienceStrategy {
			fn classify_token_error(&self, _ctx: &TokenErrorContext) -> TokenErrorKind {
				TokenErrorKind::InvalidGrant
			}

			fn augment_token_request(
				&self,
				grant: GrantType,
				form: &mut BTreeMap<String, String>,
			) {
				form.insert("audience".into(), format!("for:{grant}"));
			}
		}

		let mut form = BTreeMap::new();

		AudienceStrategy.augment_token_request(GrantType::AuthorizationCode, &mut form);

		assert_eq!(form.get("audience").map(String::as_str), Some("for:authorization_code"));
	}

	#[test]
	fn reason_prefers_the_most_specific_field() {
		let ctx = TokenErrorContext::new(GrantType::AuthorizationCode)
			.with_oauth_error("invalid_grant")
			.with_error_description("code already used");

		assert_eq!(ctx.reason(), "code already used");
		assert_eq!(
			TokenErrorContext::new(GrantType::RefreshToken).with_http_status(502).reason(),
			"token endpoint returned status 502",
		);
	}
}
