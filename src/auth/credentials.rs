//! RFC 7591 client metadata and the credentials an authorization server issues.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Client metadata submitted during dynamic client registration (RFC 7591 §2).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
	/// Redirect URIs the client will use for authorization callbacks.
	pub redirect_uris: Vec<Url>,
	/// Human-readable client name shown on consent screens.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_name: Option<String>,
	/// Token endpoint auth method; `none` for public PKCE clients.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_endpoint_auth_method: Option<String>,
	/// Grant types the client intends to use.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub grant_types: Option<Vec<String>>,
	/// Response types the client intends to use.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub response_types: Option<Vec<String>>,
	/// Space-delimited scope string requested at registration time.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
}
impl ClientMetadata {
	/// Builds metadata for a public authorization-code + PKCE client using `redirect_uri`.
	pub fn for_redirect(redirect_uri: Url) -> Self {
		Self {
			redirect_uris: vec![redirect_uri],
			client_name: None,
			token_endpoint_auth_method: Some("none".into()),
			grant_types: Some(vec!["authorization_code".into(), "refresh_token".into()]),
			response_types: Some(vec!["code".into()]),
			scope: None,
		}
	}

	/// Sets the human-readable client name.
	pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
		self.client_name = Some(name.into());

		self
	}

	/// Sets the scope string advertised at registration time.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}
}

/// Credentials issued by an authorization server (RFC 7591 §3.2.1).
///
/// Immutable once issued. The registration response echoes the submitted
/// metadata alongside these fields; only the credential fields are retained.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
	/// OAuth 2.1 client identifier.
	pub client_id: String,
	/// Client secret for confidential clients; absent for public PKCE clients.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<TokenSecret>,
	/// Unix timestamp the identifier was issued at, when reported.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_id_issued_at: Option<i64>,
	/// Unix timestamp the secret expires at; `0` means never.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret_expires_at: Option<i64>,
}
impl ClientCredentials {
	/// Builds pre-provisioned (static) credentials for a public client.
	pub fn public(client_id: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: None,
			client_id_issued_at: None,
			client_secret_expires_at: None,
		}
	}

	/// Attaches a client secret, making the client confidential.
	pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}
}
impl Debug for ClientCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
			.field("client_id_issued_at", &self.client_id_issued_at)
			.field("client_secret_expires_at", &self.client_secret_expires_at)
			.finish()
	}
}
