//! The immutable node record handed out by the storage layer.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use causerie_shared::{NodeId, PublicKey};

/// A single record in the append-only log: a channel, a message, or an
/// annotation (edit/reaction) pointing at another node.
///
/// Nodes are never mutated after creation; the one exception is the
/// `annotations` blob, which the storage layer rewrites whenever its merge
/// engine resolves a new annotation state for the node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataNode {
    owner: PublicKey,
    id1: NodeId,
    id2: Uuid,
    creation_time: DateTime<Utc>,
    data: Bytes,
    ref_id: Option<Bytes>,
    parent_id: Option<NodeId>,
    annotations: Option<Bytes>,
    blob_length: Option<u64>,
    licensed: bool,
    license_min_distance: u32,
}

/// Everything needed to mint a new [`DataNode`].
#[derive(Debug, Clone)]
pub struct NodeFields {
    pub owner: PublicKey,
    pub data: Bytes,
    pub ref_id: Option<Bytes>,
    pub parent_id: Option<NodeId>,
    pub blob_length: Option<u64>,
    pub licensed: bool,
    pub creation_time: DateTime<Utc>,
}

impl DataNode {
    /// Mint a new node. The primary id commits to every immutable field via
    /// BLAKE3, so two distinct posts never collide on `id1`.
    pub fn create(fields: NodeFields) -> Self {
        let id2 = Uuid::new_v4();

        let mut hasher = blake3::Hasher::new();
        hasher.update(fields.owner.as_bytes());
        hasher.update(id2.as_bytes());
        hasher.update(&fields.creation_time.timestamp_millis().to_be_bytes());
        hasher.update(&fields.data);
        if let Some(ref r) = fields.ref_id {
            hasher.update(r);
        }
        if let Some(ref p) = fields.parent_id {
            hasher.update(p.as_bytes());
        }
        if let Some(len) = fields.blob_length {
            hasher.update(&len.to_be_bytes());
        }
        hasher.update(&[fields.licensed as u8]);

        let id1 = NodeId(*hasher.finalize().as_bytes());

        Self {
            owner: fields.owner,
            id1,
            id2,
            creation_time: fields.creation_time,
            data: fields.data,
            ref_id: fields.ref_id,
            parent_id: fields.parent_id,
            annotations: None,
            blob_length: fields.blob_length,
            licensed: fields.licensed,
            license_min_distance: 0,
        }
    }

    pub fn owner(&self) -> &PublicKey {
        &self.owner
    }

    pub fn id1(&self) -> &NodeId {
        &self.id1
    }

    pub fn id2(&self) -> &Uuid {
        &self.id2
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn ref_id(&self) -> Option<&[u8]> {
        self.ref_id.as_deref()
    }

    pub fn parent_id(&self) -> Option<&NodeId> {
        self.parent_id.as_ref()
    }

    pub fn annotations(&self) -> Option<&[u8]> {
        self.annotations.as_deref()
    }

    pub fn has_blob(&self) -> bool {
        self.blob_length.is_some()
    }

    pub fn blob_length(&self) -> Option<u64> {
        self.blob_length
    }

    /// Whether this node needs a license record before peers will sync it.
    pub fn is_licensed(&self) -> bool {
        self.licensed
    }

    /// Minimum distance a license must cover for this node. Zero means the
    /// node itself must be directly licensed.
    pub fn license_min_distance(&self) -> u32 {
        self.license_min_distance
    }

    /// Attach a raw annotation blob. Only the storage layer's merge engine
    /// writes this; everyone else treats the bytes as opaque.
    pub fn with_annotations(mut self, raw: Bytes) -> Self {
        self.annotations = Some(raw);
        self
    }

    pub(crate) fn set_annotations(&mut self, raw: Bytes) {
        self.annotations = Some(raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> NodeFields {
        NodeFields {
            owner: PublicKey([1u8; 32]),
            data: Bytes::from_static(b"hello"),
            ref_id: None,
            parent_id: None,
            blob_length: None,
            licensed: false,
            creation_time: Utc::now(),
        }
    }

    #[test]
    fn test_id1_commits_to_content() {
        let a = DataNode::create(fields());
        let mut f = fields();
        f.data = Bytes::from_static(b"other");
        let b = DataNode::create(f);
        assert_ne!(a.id1(), b.id1());
    }

    #[test]
    fn test_distinct_posts_get_distinct_ids() {
        // Same fields, but id2 is fresh per mint.
        let a = DataNode::create(fields());
        let b = DataNode::create(fields());
        assert_ne!(a.id1(), b.id1());
    }

    #[test]
    fn test_blob_flags() {
        let mut f = fields();
        f.blob_length = Some(42);
        let node = DataNode::create(f);
        assert!(node.has_blob());
        assert_eq!(node.blob_length(), Some(42));

        let bare = DataNode::create(fields());
        assert!(!bare.has_blob());
        assert_eq!(bare.blob_length(), None);
    }
}
