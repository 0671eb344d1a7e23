//! Thread-safe in-memory [`CredentialStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{CredentialRecord, CredentialStore, StoreFuture},
};

type Slot = Arc<RwLock<Option<CredentialRecord>>>;

/// Keeps the credential record in-process; nothing survives a restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Slot);
impl CredentialStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<CredentialRecord>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn save(&self, record: CredentialRecord) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = Some(record);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = None;

			Ok(())
		})
	}
}
