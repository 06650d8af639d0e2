//! # causerie-node
//!
//! The seam between the chat thread layer and the CRDT-backed storage and
//! sync stack it sits on. This crate defines the immutable [`DataNode`]
//! record and its accessors, the [`ThreadApi`] trait through which writes
//! reach storage, the [`AnnotationResolver`] trait through which merged
//! annotation state is read back, and the bounded [`ThreadView`] window that
//! keeps projections in step with add/update/purge notifications.
//!
//! [`MemoryHub`] is an in-process implementation of that whole external
//! surface (storage, merge, view feed) so the thread layer can be exercised
//! end to end without a network.

pub mod annotations;
pub mod error;
pub mod memory;
pub mod node;
pub mod thread;
pub mod view;

pub use annotations::{AnnotationResolver, BincodeResolver, MergedAnnotations, ReactionEntry};
pub use error::NodeError;
pub use memory::{MemoryHub, MemoryThread, PresenceEntry};
pub use node::{DataNode, NodeFields};
pub use thread::{PostDefaults, PostParams, ThreadApi, ThreadParams};
pub use view::{ThreadView, ViewEvent, ViewItem};
