//! Host/Origin validation guarding loopback servers against DNS rebinding.
//!
//! A browser script on `evil.example` can point its requests at
//! `127.0.0.1:<port>` once DNS rebinds, but it cannot forge the `Host` and
//! `Origin` headers the browser attaches. Validating both against the bound
//! address and an allowlist closes the hole; the guard runs before any token
//! handling so a stolen bearer token never rescues a rebound request.

// std
use std::net::SocketAddr;
// crates.io
use http::{
	HeaderMap,
	header::{HOST, ORIGIN},
};
// self
use crate::_prelude::*;

/// Immutable allowlist of trusted web origins.
///
/// Entries are normalized through [`Url::origin`] at construction, so
/// `HTTP://Example.COM:80/` and `http://example.com` compare equal. The set is
/// never mutated after startup and needs no locking.
#[derive(Clone, Debug, Default)]
pub struct TrustedOriginSet {
	origins: Arc<[String]>,
}
impl TrustedOriginSet {
	/// Normalizes and collects the provided origins.
	pub fn new<I, S>(origins: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut normalized = Vec::new();

		for origin in origins {
			let origin = origin.as_ref();
			let parsed = Url::parse(origin)
				.map_err(|_| ConfigError::InvalidTrustedOrigin { origin: origin.into() })?;
			let serialized = parsed.origin();

			// Opaque origins (data:, file:) can never match a header value.
			if !serialized.is_tuple() {
				return Err(ConfigError::InvalidTrustedOrigin { origin: origin.into() });
			}

			normalized.push(serialized.ascii_serialization());
		}

		normalized.sort();
		normalized.dedup();

		Ok(Self { origins: normalized.into() })
	}

	/// Checks an `Origin` header value against the allowlist.
	pub fn contains(&self, origin: &str) -> bool {
		let Ok(parsed) = Url::parse(origin) else {
			return false;
		};
		let serialized = parsed.origin();

		serialized.is_tuple()
			&& self.origins.binary_search(&serialized.ascii_serialization()).is_ok()
	}

	/// True when no origins are trusted.
	pub fn is_empty(&self) -> bool {
		self.origins.is_empty()
	}
}

/// Per-listener guard validating `Host` and `Origin` on every inbound request.
#[derive(Clone, Debug)]
pub struct TransportGuard {
	allowed_hosts: Vec<String>,
	origins: TrustedOriginSet,
}
impl TransportGuard {
	/// Builds a guard for a server bound to `addr`.
	///
	/// Loopback and unspecified binds accept the three spellings a local
	/// client can reach them under (`127.0.0.1:port`, `localhost:port`,
	/// `[::1]:port`); any other bind accepts only its own address literal.
	pub fn for_local_addr(addr: SocketAddr, origins: TrustedOriginSet) -> Self {
		let port = addr.port();
		let allowed_hosts = if addr.ip().is_loopback() || addr.ip().is_unspecified() {
			vec![
				format!("127.0.0.1:{port}"),
				format!("localhost:{port}"),
				format!("[::1]:{port}"),
			]
		} else {
			vec![addr.to_string()]
		};

		Self { allowed_hosts, origins }
	}

	/// Validates header values extracted by the caller.
	///
	/// A missing or foreign `Host` is rejected; a missing `Origin` is allowed
	/// because non-browser clients never send one, but a present `Origin` must
	/// be on the allowlist.
	pub fn check(&self, host: Option<&str>, origin: Option<&str>) -> Result<()> {
		let host = host.ok_or_else(|| Error::UntrustedOrigin {
			reason: "request carried no Host header".into(),
		})?;

		if !self.allowed_hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host)) {
			return Err(Error::UntrustedOrigin {
				reason: format!("Host `{host}` does not match the bound address"),
			});
		}
		if let Some(origin) = origin
			&& !self.origins.contains(origin)
		{
			return Err(Error::UntrustedOrigin {
				reason: format!("Origin `{origin}` is not trusted"),
			});
		}

		Ok(())
	}

	/// Validates the request headers directly.
	pub fn check_headers(&self, headers: &HeaderMap) -> Result<()> {
		let host = headers.get(HOST).and_then(|v| v.to_str().ok());
		let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());

		// An unreadable Origin header is a present-but-hostile value, not an
		// absent one.
		if headers.contains_key(ORIGIN) && origin.is_none() {
			return Err(Error::UntrustedOrigin {
				reason: "Origin header is not valid ASCII".into(),
			});
		}

		self.check(host, origin)
	}
}
