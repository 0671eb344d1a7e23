//! OAuth 2.1 gatekeeping for protocol SDKs: PKCE authorization and refresh on the client side,
//! bearer verification and DNS-rebinding guards on the server side, in one runtime-agnostic crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod manager;
pub mod obs;
pub mod pkce;
pub mod provider;
pub mod registrar;
pub mod server;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		http::{HttpTransport, ReqwestHttpClient},
		manager::{AuthConfig, TokenManager},
		store::{CredentialStore, MemoryStore},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Configuration fixture pointing at a mock server base URL.
	pub fn test_config(server_url: &str) -> AuthConfig {
		AuthConfig::new(
			Url::parse(server_url).expect("Failed to parse mock server URL."),
			Url::parse("http://127.0.0.1:6274/callback")
				.expect("Failed to parse test redirect URI."),
		)
	}

	/// Constructs a [`TokenManager`] backed by an in-memory store and the insecure reqwest
	/// transport used across integration tests.
	pub fn build_test_manager(config: AuthConfig) -> (Arc<TokenManager>, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let transport: Arc<dyn HttpTransport> = Arc::new(test_reqwest_http_client());

		(Arc::new(TokenManager::new(config, transport, store)), store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::{Mutex as AsyncMutex, OnceCell};
	pub use http::StatusCode;
	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{ConfigError, Error, Result, TransportError};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use httpmock as _;
