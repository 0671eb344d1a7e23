//! Server-side protections: transport-origin guarding and bearer verification.

pub mod bearer;
pub mod origin;
pub mod verify;

pub use bearer::*;
pub use origin::*;
pub use verify::*;
