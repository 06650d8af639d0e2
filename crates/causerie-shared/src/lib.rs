//! # causerie-shared
//!
//! Types shared by every layer of the causerie chat stack: identity
//! (Ed25519 keypairs), the id newtypes used to address nodes and peers,
//! protocol constants, and common error enums.

pub mod constants;
pub mod error;
pub mod identity;
pub mod types;

pub use error::IdentityError;
pub use identity::{verify_signature, Identity, IdentityExport};
pub use types::{NodeId, PublicKey};
