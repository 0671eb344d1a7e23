//! Auth-domain types: scope sets, token material, client credentials, verified identities.

pub mod credentials;
pub mod identity;
pub mod scope;
pub mod secret;
pub mod token;

pub use credentials::*;
pub use identity::*;
pub use scope::*;
pub use secret::*;
pub use token::*;
