//! The write-side trait through which a thread controller reaches storage.

use std::future::Future;

use bytes::Bytes;

use causerie_shared::constants::DEFAULT_TAIL;
use causerie_shared::{NodeId, PublicKey};

use crate::error::Result;
use crate::node::DataNode;

/// Parameters for creating a node under a thread.
#[derive(Debug, Clone, Default)]
pub struct PostParams {
    /// Causal-order input: id of the previously last known message.
    pub ref_id: Option<Bytes>,
    /// Node content.
    pub data: Bytes,
    /// Parent node (normally filled in from [`PostDefaults`]).
    pub parent_id: Option<NodeId>,
    /// Length of an attached blob, when one exists.
    pub blob_length: Option<u64>,
}

/// Defaults merged into every post issued through a thread binding.
#[derive(Debug, Clone, Default)]
pub struct PostDefaults {
    pub parent_id: Option<NodeId>,
}

/// Thread binding parameters.
#[derive(Debug, Clone)]
pub struct ThreadParams {
    pub defaults: PostDefaults,
    /// Initial view window size.
    pub tail: usize,
}

impl Default for ThreadParams {
    fn default() -> Self {
        Self {
            defaults: PostDefaults::default(),
            tail: DEFAULT_TAIL,
        }
    }
}

/// Async surface of the external storage/sync layer, as consumed by the
/// thread controller. Every operation may suspend and every failure is the
/// storage layer's own error, passed through unchanged.
///
/// Futures are `Send` so callers can drive writes from spawned tasks (the
/// deferred half of a delete runs on one).
pub trait ThreadApi: Clone + Send + Sync + 'static {
    /// Create a new node of `kind` under the thread.
    fn post(&self, kind: &str, params: PostParams)
        -> impl Future<Output = Result<DataNode>> + Send;

    /// Create an edit annotation bound to `target`.
    fn post_edit(
        &self,
        kind: &str,
        target: &DataNode,
        params: PostParams,
    ) -> impl Future<Output = Result<DataNode>> + Send;

    /// Create a reaction annotation bound to `target`.
    fn post_reaction(
        &self,
        kind: &str,
        target: &DataNode,
        params: PostParams,
    ) -> impl Future<Output = Result<DataNode>> + Send;

    /// Destroy a node. Returns every node removed as a consequence,
    /// dependent annotations included.
    fn destroy(&self, node: &DataNode) -> impl Future<Output = Result<Vec<DataNode>>> + Send;

    /// Issue a license record of `kind` for `node` to the given targets.
    fn post_license(
        &self,
        kind: &str,
        node: &DataNode,
        targets: &[PublicKey],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Ask the view feed for `parent` to widen its window to `tail` items.
    fn update_stream(
        &self,
        parent: &NodeId,
        tail: usize,
    ) -> impl Future<Output = Result<()>> + Send;
}
