//! Persistence contracts and built-in credential store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, TokenSet},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Everything one client configuration persists across process lifetimes.
///
/// Saved and loaded as a single unit so readers never observe a credentials/
/// tokens pair from two different authorization attempts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CredentialRecord {
	/// Client credentials issued statically or by dynamic registration.
	pub credentials: Option<ClientCredentials>,
	/// Most recently issued token set.
	pub tokens: Option<TokenSet>,
}

/// Storage backend contract for credential records.
///
/// Implementations may be in-memory, file-backed, or OS-keychain-backed; the
/// only requirement is that `save` replaces the whole record atomically with
/// respect to concurrent `load` calls.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Fetches the persisted record, if any.
	fn load(&self) -> StoreFuture<'_, Option<CredentialRecord>>;

	/// Persists or replaces the record wholesale.
	fn save(&self, record: CredentialRecord) -> StoreFuture<'_, ()>;

	/// Removes any persisted record.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
