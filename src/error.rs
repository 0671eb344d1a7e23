//! Gatekeeper error types shared across client flows, the token manager, and server guards.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gatekeeper error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Dynamic client registration was rejected or returned garbage; never auto-retried.
	#[error("Client registration failed: {reason}.")]
	RegistrationFailed {
		/// HTTP status returned by the registration endpoint, when one arrived.
		status: Option<u16>,
		/// Human-readable failure summary.
		reason: String,
	},
	/// Authorization callback carried a state nonce that does not match the pending attempt.
	#[error("Authorization callback state does not match the pending attempt.")]
	CsrfSuspected,
	/// No authorization callback arrived within the configured window.
	#[error("Authorization attempt timed out waiting for the callback.")]
	AuthorizationTimedOut,
	/// The upstream kept rejecting the request after the single permitted retry.
	#[error("Request was denied with status {status} after a retry.")]
	AuthorizationDenied {
		/// HTTP status of the final rejection (401 or 403).
		status: u16,
	},
	/// Token exceeded its expiry instant.
	#[error("Token has expired.")]
	TokenExpired,
	/// Token failed verification or the grant backing it was rejected.
	#[error("Token is invalid: {reason}.")]
	TokenInvalid {
		/// Verifier- or provider-supplied reason string.
		reason: String,
	},
	/// Token lacks scopes the caller requires.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Verifier- or provider-supplied reason string.
		reason: String,
	},
	/// Inbound request carried a Host or Origin the server does not trust.
	#[error("Untrusted request origin: {reason}.")]
	UntrustedOrigin {
		/// Which header failed and why.
		reason: String,
	},
	/// Terminal authorization failure; no automatic attempts occur until reconfigured.
	#[error("Authorization failed: {reason}.")]
	AuthFailed {
		/// Why the manager gave up.
		reason: String,
	},
	/// A single-use PKCE pair or authorization attempt was touched twice.
	#[error("Invalid authorization state: {reason}.")]
	InvalidState {
		/// What was reused or missing.
		reason: String,
	},
}

/// Configuration and validation failures raised by the gatekeeper.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// A configured or discovered URL cannot be parsed.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The protocol server URL has no usable authority for discovery.
	#[error("Server URL `{url}` has no host to derive discovery endpoints from.")]
	MissingAuthority {
		/// Offending URL string.
		url: String,
	},
	/// Server metadata omits the introspection endpoint the verifier needs.
	#[error("Server metadata does not declare an introspection endpoint.")]
	MissingIntrospectionEndpoint,
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Trusted origin entry cannot be parsed as an absolute URL.
	#[error("Trusted origin `{origin}` is not an absolute URL.")]
	InvalidTrustedOrigin {
		/// Offending origin string.
		origin: String,
	},
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Endpoint returned an unexpected but non-fatal response.
	#[error("Authorization server returned an unexpected response: {message}.")]
	EndpointResponse {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Endpoint responded with malformed JSON that could not be parsed.
	#[error("Authorization server returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the authorization server.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the authorization server.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
