//! Merged annotation state read back from the storage layer.
//!
//! Concurrent edits and reactions against one message are resolved by the
//! external CRDT merge engine; what the thread layer sees is an opaque blob
//! on the target node. [`AnnotationResolver`] is the seam for decoding that
//! blob, [`MergedAnnotations`] the resolved shape.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::node::DataNode;

/// One reaction's current endorsers, as hex-encoded public keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionEntry {
    pub public_keys: BTreeSet<String>,
}

/// The deterministic outcome of merging every edit and reaction annotation
/// recorded against a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MergedAnnotations {
    /// The node holding the winning edit, when the message has been edited.
    pub edit_node: Option<DataNode>,
    /// Reaction name to current endorser set.
    pub reactions: BTreeMap<String, ReactionEntry>,
}

impl MergedAnnotations {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(raw)?)
    }
}

/// Decodes a raw annotation blob into [`MergedAnnotations`].
///
/// Injected into the thread controller so the core stays testable with a
/// fake resolver; decode failures are recoverable by contract.
pub trait AnnotationResolver: Send + Sync {
    fn resolve(&self, raw: &[u8]) -> Result<MergedAnnotations>;
}

/// Default resolver for blobs written by [`crate::MemoryHub`]: plain bincode.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeResolver;

impl AnnotationResolver for BincodeResolver {
    fn resolve(&self, raw: &[u8]) -> Result<MergedAnnotations> {
        MergedAnnotations::from_bytes(raw)
    }
}
