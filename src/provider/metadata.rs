//! RFC 8414 authorization-server metadata with protocol-default fallbacks.

// self
use crate::_prelude::*;

/// Well-known discovery path mandated by RFC 8414.
pub const WELL_KNOWN_PATH: &str = "/.well-known/oauth-authorization-server";

/// Authorization-server metadata document (RFC 8414 subset).
///
/// Unknown fields are ignored so servers can advertise extensions freely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMetadata {
	/// Issuer identifier the server asserts.
	pub issuer: Url,
	/// Authorization endpoint used by the redirect-based flow.
	pub authorization_endpoint: Url,
	/// Token endpoint used for exchanges and refreshes.
	pub token_endpoint: Url,
	/// Dynamic client registration endpoint, when offered.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub registration_endpoint: Option<Url>,
	/// Token introspection endpoint, when offered.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub introspection_endpoint: Option<Url>,
	/// Token revocation endpoint, when offered.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub revocation_endpoint: Option<Url>,
	/// Scopes the server advertises.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scopes_supported: Option<Vec<String>>,
	/// Response types the server supports.
	#[serde(default)]
	pub response_types_supported: Vec<String>,
	/// Grant types the server supports; absent means the RFC 8414 default pair.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub grant_types_supported: Option<Vec<String>>,
	/// Client auth methods the token endpoint accepts.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_endpoint_auth_methods_supported: Option<Vec<String>>,
	/// PKCE challenge methods the server supports.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code_challenge_methods_supported: Option<Vec<String>>,
}
impl ServerMetadata {
	/// Derives the RFC 8414 discovery URL for a protocol server.
	///
	/// HTTPS is required by the RFC regardless of the scheme the server URL
	/// itself uses.
	pub fn discovery_url(server_url: &Url) -> Result<Url, ConfigError> {
		let authority = server_url
			.host_str()
			.filter(|host| !host.is_empty())
			.map(|host| match server_url.port() {
				Some(port) => format!("{host}:{port}"),
				None => host.to_owned(),
			})
			.ok_or_else(|| ConfigError::MissingAuthority { url: server_url.to_string() })?;

		Url::parse(&format!("https://{authority}{WELL_KNOWN_PATH}"))
			.map_err(|source| ConfigError::InvalidEndpoint { source })
	}

	/// Protocol-default endpoints used when the server publishes no metadata.
	///
	/// `/authorize`, `/token`, and `/register` are resolved against the server
	/// base URL, matching the draft protocol authorization profile.
	pub fn default_for(server_url: &Url) -> Result<Self, ConfigError> {
		let join = |path: &str| {
			server_url.join(path).map_err(|source| ConfigError::InvalidEndpoint { source })
		};

		Ok(Self {
			issuer: server_url.clone(),
			authorization_endpoint: join("authorize")?,
			token_endpoint: join("token")?,
			registration_endpoint: Some(join("register")?),
			introspection_endpoint: None,
			revocation_endpoint: None,
			scopes_supported: None,
			response_types_supported: vec!["code".into()],
			grant_types_supported: Some(vec![
				"authorization_code".into(),
				"refresh_token".into(),
			]),
			token_endpoint_auth_methods_supported: Some(vec!["client_secret_post".into()]),
			code_challenge_methods_supported: Some(vec!["S256".into()]),
		})
	}

	/// Checks whether the server advertises support for a grant.
	///
	/// Absent `grant_types_supported` implies the RFC 8414 default of
	/// `authorization_code` + `implicit`; refresh support is assumed alongside
	/// it because OAuth 2.1 servers routinely omit the field.
	pub fn supports_grant(&self, grant: crate::provider::GrantType) -> bool {
		match &self.grant_types_supported {
			Some(grants) => grants.iter().any(|g| g == grant.as_str()),
			None => true,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::provider::GrantType;

	#[test]
	fn discovery_url_forces_https_and_keeps_the_port() {
		let server = Url::parse("http://localhost:8321/mcp").expect("Server URL should parse.");
		let discovery =
			ServerMetadata::discovery_url(&server).expect("Discovery URL should derive.");

		assert_eq!(
			discovery.as_str(),
			"https://localhost:8321/.well-known/oauth-authorization-server",
		);
	}

	#[test]
	fn discovery_url_requires_a_host() {
		let server = Url::parse("unix:/run/server.sock").expect("Opaque URL should parse.");

		assert!(matches!(
			ServerMetadata::discovery_url(&server),
			Err(ConfigError::MissingAuthority { .. }),
		));
	}

	#[test]
	fn default_endpoints_resolve_against_the_server_base() {
		let server = Url::parse("https://api.example.com/").expect("Server URL should parse.");
		let metadata =
			ServerMetadata::default_for(&server).expect("Default metadata should build.");

		assert_eq!(metadata.authorization_endpoint.as_str(), "https://api.example.com/authorize");
		assert_eq!(metadata.token_endpoint.as_str(), "https://api.example.com/token");
		assert_eq!(
			metadata.registration_endpoint.as_ref().map(Url::as_str),
			Some("https://api.example.com/register"),
		);
		assert!(metadata.supports_grant(GrantType::RefreshToken));
	}

	#[test]
	fn metadata_document_parses_with_unknown_fields() {
		let body = r#"{
			"issuer": "https://as.example.com",
			"authorization_endpoint": "https://as.example.com/authorize",
			"token_endpoint": "https://as.example.com/token",
			"registration_endpoint": "https://as.example.com/register",
			"response_types_supported": ["code"],
			"grant_types_supported": ["authorization_code", "refresh_token"],
			"code_challenge_methods_supported": ["S256"],
			"vendor_extension": {"anything": true}
		}"#;
		let metadata: ServerMetadata =
			serde_json::from_str(body).expect("Metadata document should deserialize.");

		assert!(metadata.supports_grant(GrantType::AuthorizationCode));
		assert!(metadata.introspection_endpoint.is_none());
	}
}
