//! Token verification behind the [`TokenVerifier`] seam.
//!
//! The built-in trust mechanism is RFC 7662 introspection; anything else
//! (JWT signature validation, a sidecar, a cache) plugs in behind the same
//! trait. Verifiers are side-effect-free and safe to call concurrently.

// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, ScopeSet, VerifiedIdentity},
	error::TransientError,
	http::{self, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ServerMetadata,
};

/// Boxed future returned by [`TokenVerifier::verify`].
pub type VerifyFuture<'a> = Pin<Box<dyn Future<Output = Result<VerifiedIdentity>> + 'a + Send>>;

/// What the resource server requires of every accepted token.
///
/// Read-only after startup; share it freely across request handlers.
#[derive(Clone, Debug, Default)]
pub struct TrustMaterial {
	/// Expected token issuer; unchecked when `None`.
	pub issuer: Option<String>,
	/// Expected audience; unchecked when `None`.
	pub audience: Option<String>,
	/// Scopes every accepted token must carry.
	pub required_scopes: ScopeSet,
}
impl TrustMaterial {
	/// Requires tokens to assert this issuer.
	pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
		self.issuer = Some(issuer.into());

		self
	}

	/// Requires tokens to be addressed to this audience.
	pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
		self.audience = Some(audience.into());

		self
	}

	/// Requires tokens to carry these scopes.
	pub fn with_required_scopes(mut self, scopes: ScopeSet) -> Self {
		self.required_scopes = scopes;

		self
	}
}

/// Maps a raw bearer token to a verified identity.
pub trait TokenVerifier
where
	Self: Send + Sync,
{
	/// Verifies the token, distinguishing expiry, invalidity, and scope gaps.
	fn verify<'a>(&'a self, raw_token: &'a str) -> VerifyFuture<'a>;
}

/// RFC 7662 introspection against the authorization server.
pub struct IntrospectionVerifier {
	endpoint: Url,
	credentials: ClientCredentials,
	trust: TrustMaterial,
	transport: Arc<dyn HttpTransport>,
}
impl IntrospectionVerifier {
	/// Creates a verifier targeting an explicit introspection endpoint.
	pub fn new(
		endpoint: Url,
		credentials: ClientCredentials,
		trust: TrustMaterial,
		transport: Arc<dyn HttpTransport>,
	) -> Self {
		Self { endpoint, credentials, trust, transport }
	}

	/// Creates a verifier from discovered server metadata.
	pub fn from_metadata(
		metadata: &ServerMetadata,
		credentials: ClientCredentials,
		trust: TrustMaterial,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self, ConfigError> {
		let endpoint = metadata
			.introspection_endpoint
			.clone()
			.ok_or(ConfigError::MissingIntrospectionEndpoint)?;

		Ok(Self::new(endpoint, credentials, trust, transport))
	}

	async fn introspect(&self, raw_token: &str) -> Result<VerifiedIdentity> {
		let mut form = BTreeMap::from_iter([
			("token".to_string(), raw_token.to_string()),
			("client_id".to_string(), self.credentials.client_id.clone()),
		]);

		if let Some(secret) = &self.credentials.client_secret {
			form.insert("client_secret".into(), secret.expose().into());
		}

		let response = self.transport.send(http::form_post(&self.endpoint, &form)?).await?;
		let status = response.status();

		if !status.is_success() {
			return Err(TransientError::EndpointResponse {
				message: format!("introspection endpoint returned {}", status.as_u16()),
				status: Some(status.as_u16()),
			}
			.into());
		}

		let body = http::parse_json::<IntrospectionResponse>(&response)?;

		apply_trust_checks(body, &self.trust, OffsetDateTime::now_utc())
	}
}
impl TokenVerifier for IntrospectionVerifier {
	fn verify<'a>(&'a self, raw_token: &'a str) -> VerifyFuture<'a> {
		const KIND: FlowKind = FlowKind::Introspection;

		Box::pin(async move {
			let span = FlowSpan::new(KIND, "verify");

			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result = span.instrument(self.introspect(raw_token)).await;

			match &result {
				Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
				Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
			}

			result
		})
	}
}
impl Debug for IntrospectionVerifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IntrospectionVerifier")
			.field("endpoint", &self.endpoint.as_str())
			.field("trust", &self.trust)
			.finish()
	}
}

/// In-process token table applying the same trust checks; for tests and dev.
#[derive(Debug, Default)]
pub struct LocalVerifier {
	trust: TrustMaterial,
	tokens: RwLock<BTreeMap<String, VerifiedIdentity>>,
}
impl LocalVerifier {
	/// Creates an empty table enforcing the provided trust material.
	pub fn new(trust: TrustMaterial) -> Self {
		Self { trust, tokens: RwLock::new(BTreeMap::new()) }
	}

	/// Registers a token value and the identity it proves.
	pub fn insert(&self, raw_token: impl Into<String>, identity: VerifiedIdentity) {
		self.tokens.write().insert(raw_token.into(), identity);
	}

	/// Removes a token value from the table.
	pub fn revoke(&self, raw_token: &str) {
		self.tokens.write().remove(raw_token);
	}
}
impl TokenVerifier for LocalVerifier {
	fn verify<'a>(&'a self, raw_token: &'a str) -> VerifyFuture<'a> {
		Box::pin(async move {
			let identity =
				self.tokens.read().get(raw_token).cloned().ok_or_else(|| Error::TokenInvalid {
					reason: "token is not known to this verifier".into(),
				})?;
			let now = OffsetDateTime::now_utc();

			if identity.expires_at.is_some_and(|exp| now >= exp) {
				return Err(Error::TokenExpired);
			}
			if !identity.scopes.contains_all(&self.trust.required_scopes) {
				return Err(Error::InsufficientScope {
					reason: format!(
						"missing {}",
						identity.scopes.missing_from(&self.trust.required_scopes).join(" "),
					),
				});
			}

			Ok(identity)
		})
	}
}

// Introspection response body (RFC 7662 §2.2); unknown members are ignored.
#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
	active: bool,
	#[serde(default)]
	scope: Option<String>,
	#[serde(default)]
	sub: Option<String>,
	#[serde(default)]
	client_id: Option<String>,
	#[serde(default)]
	exp: Option<i64>,
	#[serde(default)]
	iss: Option<String>,
	#[serde(default)]
	aud: Option<Audience>,
}

// `aud` is a string or an array of strings depending on the server.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
	One(String),
	Many(Vec<String>),
}
impl Audience {
	fn contains(&self, expected: &str) -> bool {
		match self {
			Audience::One(aud) => aud == expected,
			Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
		}
	}
}

fn apply_trust_checks(
	body: IntrospectionResponse,
	trust: &TrustMaterial,
	now: OffsetDateTime,
) -> Result<VerifiedIdentity> {
	if !body.active {
		return Err(Error::TokenInvalid { reason: "introspection reported the token inactive".into() });
	}
	if let Some(exp) = body.exp
		&& now.unix_timestamp() >= exp
	{
		return Err(Error::TokenExpired);
	}
	if let Some(expected) = &trust.issuer
		&& body.iss.as_deref() != Some(expected.as_str())
	{
		return Err(Error::TokenInvalid { reason: "issuer mismatch".into() });
	}
	if let Some(expected) = &trust.audience
		&& !body.aud.as_ref().is_some_and(|aud| aud.contains(expected))
	{
		return Err(Error::TokenInvalid { reason: "audience mismatch".into() });
	}

	let scopes: ScopeSet =
		body.scope.as_deref().unwrap_or_default().parse().map_err(ConfigError::from)?;

	if !scopes.contains_all(&trust.required_scopes) {
		return Err(Error::InsufficientScope {
			reason: format!("missing {}", scopes.missing_from(&trust.required_scopes).join(" ")),
		});
	}

	Ok(VerifiedIdentity {
		subject: body.sub.or(body.client_id).unwrap_or_default(),
		scopes,
		expires_at: body
			.exp
			.and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok()),
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn body(json: &str) -> IntrospectionResponse {
		serde_json::from_str(json).expect("Introspection fixture should deserialize.")
	}

	fn now() -> OffsetDateTime {
		macros::datetime!(2025-01-01 00:00 UTC)
	}

	#[test]
	fn inactive_tokens_are_invalid() {
		let err = apply_trust_checks(body(r#"{"active": false}"#), &TrustMaterial::default(), now())
			.expect_err("Inactive token must be rejected.");

		assert!(matches!(err, Error::TokenInvalid { .. }));
	}

	#[test]
	fn past_expiry_is_reported_as_expired() {
		let json = format!(r#"{{"active": true, "exp": {}}}"#, now().unix_timestamp() - 1);
		let err = apply_trust_checks(body(&json), &TrustMaterial::default(), now())
			.expect_err("Expired token must be rejected.");

		assert!(matches!(err, Error::TokenExpired));
	}

	#[test]
	fn issuer_and_audience_must_match_when_required() {
		let trust = TrustMaterial::default()
			.with_issuer("https://as.example.com")
			.with_audience("resource-1");
		let good = r#"{
			"active": true,
			"iss": "https://as.example.com",
			"aud": ["resource-0", "resource-1"],
			"sub": "user-7",
			"scope": "email"
		}"#;
		let identity = apply_trust_checks(body(good), &trust, now())
			.expect("Matching issuer and audience should verify.");

		assert_eq!(identity.subject, "user-7");

		let wrong_issuer = r#"{"active": true, "iss": "https://other.example", "aud": "resource-1"}"#;

		assert!(matches!(
			apply_trust_checks(body(wrong_issuer), &trust, now()),
			Err(Error::TokenInvalid { .. }),
		));

		let wrong_audience = r#"{"active": true, "iss": "https://as.example.com", "aud": "other"}"#;

		assert!(matches!(
			apply_trust_checks(body(wrong_audience), &trust, now()),
			Err(Error::TokenInvalid { .. }),
		));
	}

	#[test]
	fn missing_required_scopes_are_named() {
		let trust = TrustMaterial::default().with_required_scopes(
			ScopeSet::new(["email", "profile"]).expect("Scope fixture should be valid."),
		);
		let err = apply_trust_checks(
			body(r#"{"active": true, "scope": "email"}"#),
			&trust,
			now(),
		)
		.expect_err("Missing scope must be rejected.");

		match err {
			Error::InsufficientScope { reason } => assert!(reason.contains("profile")),
			other => panic!("Unexpected error variant: {other:?}"),
		}
	}

	#[tokio::test]
	async fn local_verifier_applies_expiry_and_scope_checks() {
		let trust = TrustMaterial::default()
			.with_required_scopes(ScopeSet::new(["email"]).expect("Scope fixture should be valid."));
		let verifier = LocalVerifier::new(trust);

		verifier.insert("live", VerifiedIdentity {
			subject: "user-1".into(),
			scopes: ScopeSet::new(["email", "profile"]).expect("Scope fixture should be valid."),
			expires_at: Some(OffsetDateTime::now_utc() + Duration::hours(1)),
		});
		verifier.insert("stale", VerifiedIdentity {
			subject: "user-2".into(),
			scopes: ScopeSet::new(["email"]).expect("Scope fixture should be valid."),
			expires_at: Some(OffsetDateTime::now_utc() - Duration::hours(1)),
		});

		assert_eq!(
			verifier.verify("live").await.expect("Live token should verify.").subject,
			"user-1",
		);
		assert!(matches!(verifier.verify("stale").await, Err(Error::TokenExpired)));
		assert!(matches!(verifier.verify("unknown").await, Err(Error::TokenInvalid { .. })));

		verifier.revoke("live");

		assert!(matches!(verifier.verify("live").await, Err(Error::TokenInvalid { .. })));
	}
}
