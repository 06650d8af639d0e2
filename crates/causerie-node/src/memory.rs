//! In-process implementation of the external storage/merge/view stack.
//!
//! [`MemoryHub`] plays the role of the CRDT-backed sync layer: it ingests
//! signed nodes, resolves a deterministic causal order from each message's
//! ref chain, folds edit and reaction annotations into a merged blob on the
//! target node, and feeds per-subscriber add/update/purge diffs over
//! `tokio::sync::mpsc`, the same command/notification shape the rest of the
//! workspace uses. Tests and the CLI run the thread layer against it without
//! a network.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use causerie_shared::constants::{PRESENCE_ACTIVE_WINDOW, REACTION_SEPARATOR};
use causerie_shared::{verify_signature, Identity, NodeId, PublicKey};

use crate::annotations::{MergedAnnotations, ReactionEntry};
use crate::error::{NodeError, Result};
use crate::node::{DataNode, NodeFields};
use crate::thread::{PostParams, ThreadApi};
use crate::view::ViewEvent;

#[derive(Debug, Clone)]
struct StoredNode {
    node: DataNode,
    version: u64,
}

struct Subscriber {
    parent: NodeId,
    tail: usize,
    tx: mpsc::UnboundedSender<ViewEvent>,
    /// id -> last version emitted to this subscriber.
    sent: HashMap<NodeId, u64>,
    closed: bool,
}

#[derive(Default)]
struct HubInner {
    /// Channel and message nodes.
    nodes: HashMap<NodeId, StoredNode>,
    /// Channel ids in creation order.
    channel_ids: Vec<NodeId>,
    /// Channel id -> message ids (insertion order; causal order is derived).
    children: HashMap<NodeId, Vec<NodeId>>,
    /// Edit/reaction nodes, kept out of the message view.
    annotation_nodes: HashMap<NodeId, StoredNode>,
    /// Target message id -> edit annotation ids.
    edits: HashMap<NodeId, Vec<NodeId>>,
    /// Target message id -> reaction annotation ids.
    reactions: HashMap<NodeId, Vec<NodeId>>,
    /// Node id -> target sets of every license granted for it.
    licenses: HashMap<NodeId, Vec<Vec<PublicKey>>>,
    /// Identity -> time of its most recent write.
    last_seen: HashMap<PublicKey, DateTime<Utc>>,
    subs: Vec<Subscriber>,
    version_counter: u64,
}

impl HubInner {
    fn bump(&mut self) -> u64 {
        self.version_counter += 1;
        self.version_counter
    }

    fn channel_is_private(&self, channel: &NodeId) -> bool {
        self.nodes
            .get(channel)
            .map_or(false, |s| s.node.ref_id().map_or(false, |r| !r.is_empty()))
    }

    fn touch(&mut self, writer: PublicKey, at: DateTime<Utc>) {
        self.last_seen.insert(writer, at);
    }
}

/// One identity's presence state, derived from its write activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceEntry {
    pub public_key: PublicKey,
    /// Whether the identity wrote within [`PRESENCE_ACTIVE_WINDOW`].
    pub active: bool,
}

/// Handle to the shared in-memory storage.
#[derive(Clone)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner::default())),
        }
    }

    /// Per-identity write handle, analogous to a storage session.
    pub fn thread(&self, identity: Identity) -> MemoryThread {
        MemoryThread {
            inner: self.inner.clone(),
            identity,
        }
    }

    /// Create a channel node. `peer` set makes it a private channel between
    /// the creator and that peer (the peer key lands in `ref_id`).
    pub fn create_channel(
        &self,
        identity: &Identity,
        name: &[u8],
        peer: Option<PublicKey>,
    ) -> Result<DataNode> {
        let node = mint_signed(
            identity,
            NodeFields {
                owner: identity.public_key(),
                data: Bytes::copy_from_slice(name),
                ref_id: peer.map(|p| Bytes::copy_from_slice(p.as_bytes())),
                parent_id: None,
                blob_length: None,
                licensed: peer.is_some(),
                creation_time: Utc::now(),
            },
        )?;

        let mut guard = lock(&self.inner)?;
        let version = guard.bump();
        guard.nodes.insert(
            *node.id1(),
            StoredNode {
                node: node.clone(),
                version,
            },
        );
        guard.channel_ids.push(*node.id1());
        guard.touch(*node.owner(), node.creation_time());

        debug!(id1 = %node.id1(), private = peer.is_some(), "channel created");
        Ok(node)
    }

    /// All channel nodes, in creation order.
    pub fn channels(&self) -> Result<Vec<DataNode>> {
        let guard = lock(&self.inner)?;
        Ok(guard
            .channel_ids
            .iter()
            .filter_map(|id| guard.nodes.get(id).map(|s| s.node.clone()))
            .collect())
    }

    /// Fetch a node by primary id, when it still exists.
    pub fn node(&self, id1: &NodeId) -> Result<Option<DataNode>> {
        let guard = lock(&self.inner)?;
        Ok(guard
            .nodes
            .get(id1)
            .or_else(|| guard.annotation_nodes.get(id1))
            .map(|s| s.node.clone()))
    }

    /// Every license target set granted for a node, in grant order.
    pub fn licenses_for(&self, id1: &NodeId) -> Result<Vec<Vec<PublicKey>>> {
        let guard = lock(&self.inner)?;
        Ok(guard.licenses.get(id1).cloned().unwrap_or_default())
    }

    /// Every identity that has written at least one node, with an active
    /// flag for recent writers. Ordered by key, so indices are stable
    /// between calls.
    pub fn presence(&self) -> Result<Vec<PresenceEntry>> {
        let guard = lock(&self.inner)?;
        let now = Utc::now();
        let sorted: BTreeMap<PublicKey, DateTime<Utc>> =
            guard.last_seen.iter().map(|(k, t)| (*k, *t)).collect();
        Ok(sorted
            .into_iter()
            .map(|(public_key, seen)| PresenceEntry {
                public_key,
                active: now
                    .signed_duration_since(seen)
                    .to_std()
                    .map_or(false, |age| age <= PRESENCE_ACTIVE_WINDOW),
            })
            .collect())
    }
}

/// A per-identity write handle bound to the hub.
#[derive(Clone)]
pub struct MemoryThread {
    inner: Arc<Mutex<HubInner>>,
    identity: Identity,
}

enum AnnotationSlot {
    Edit,
    Reaction,
}

impl MemoryThread {
    pub fn public_key(&self) -> PublicKey {
        self.identity.public_key()
    }

    /// Open a view feed over `parent`'s messages. The current window is
    /// replayed as an initial burst of `Added` events.
    pub fn open_view(
        &self,
        parent: &NodeId,
        tail: usize,
    ) -> Result<mpsc::UnboundedReceiver<ViewEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = lock(&self.inner)?;
        guard.subs.push(Subscriber {
            parent: *parent,
            tail,
            tx,
            sent: HashMap::new(),
            closed: false,
        });
        refresh_parent(&mut guard, parent);
        Ok(rx)
    }

    fn annotate(
        &self,
        kind: &str,
        target: &DataNode,
        params: PostParams,
        slot: AnnotationSlot,
    ) -> Result<DataNode> {
        let mut guard = lock(&self.inner)?;
        let target_id = *target.id1();
        let stored = guard.nodes.get(&target_id).ok_or(NodeError::NotFound)?;
        let parent = stored.node.parent_id().copied();
        let licensed = parent.map_or(false, |p| guard.channel_is_private(&p));

        let node = mint_signed(
            &self.identity,
            NodeFields {
                owner: self.identity.public_key(),
                data: params.data,
                ref_id: Some(Bytes::copy_from_slice(target_id.as_bytes())),
                parent_id: parent,
                blob_length: None,
                licensed,
                creation_time: Utc::now(),
            },
        )?;

        let version = guard.bump();
        guard.annotation_nodes.insert(
            *node.id1(),
            StoredNode {
                node: node.clone(),
                version,
            },
        );
        match slot {
            AnnotationSlot::Edit => guard.edits.entry(target_id).or_default().push(*node.id1()),
            AnnotationSlot::Reaction => guard
                .reactions
                .entry(target_id)
                .or_default()
                .push(*node.id1()),
        }

        guard.touch(*node.owner(), node.creation_time());
        refresh_annotations(&mut guard, target_id)?;
        if let Some(p) = parent {
            refresh_parent(&mut guard, &p);
        }

        debug!(kind, target = %target_id, id1 = %node.id1(), "annotation posted");
        Ok(node)
    }
}

impl ThreadApi for MemoryThread {
    async fn post(&self, kind: &str, params: PostParams) -> Result<DataNode> {
        let parent = params
            .parent_id
            .ok_or_else(|| NodeError::Storage("post without a parent channel".to_string()))?;

        let mut guard = lock(&self.inner)?;
        if !guard.nodes.contains_key(&parent) {
            return Err(NodeError::NotFound);
        }
        let licensed = guard.channel_is_private(&parent);

        let node = mint_signed(
            &self.identity,
            NodeFields {
                owner: self.identity.public_key(),
                data: params.data,
                ref_id: params.ref_id,
                parent_id: Some(parent),
                blob_length: params.blob_length,
                licensed,
                creation_time: Utc::now(),
            },
        )?;

        let version = guard.bump();
        guard.nodes.insert(
            *node.id1(),
            StoredNode {
                node: node.clone(),
                version,
            },
        );
        guard.children.entry(parent).or_default().push(*node.id1());
        guard.touch(*node.owner(), node.creation_time());
        refresh_parent(&mut guard, &parent);

        debug!(kind, id1 = %node.id1(), "node posted");
        Ok(node)
    }

    async fn post_edit(
        &self,
        kind: &str,
        target: &DataNode,
        params: PostParams,
    ) -> Result<DataNode> {
        self.annotate(kind, target, params, AnnotationSlot::Edit)
    }

    async fn post_reaction(
        &self,
        kind: &str,
        target: &DataNode,
        params: PostParams,
    ) -> Result<DataNode> {
        self.annotate(kind, target, params, AnnotationSlot::Reaction)
    }

    async fn destroy(&self, node: &DataNode) -> Result<Vec<DataNode>> {
        let mut guard = lock(&self.inner)?;
        let id = *node.id1();
        let stored = guard.nodes.remove(&id).ok_or(NodeError::NotFound)?;
        let parent = stored.node.parent_id().copied();

        if let Some(p) = parent {
            if let Some(kids) = guard.children.get_mut(&p) {
                kids.retain(|k| k != &id);
            }
        }

        let mut destroyed = vec![stored.node];
        let edit_ids = guard.edits.remove(&id).unwrap_or_default();
        let reaction_ids = guard.reactions.remove(&id).unwrap_or_default();
        for aid in edit_ids.into_iter().chain(reaction_ids) {
            if let Some(s) = guard.annotation_nodes.remove(&aid) {
                destroyed.push(s.node);
            }
        }

        if let Some(p) = parent {
            refresh_parent(&mut guard, &p);
        }

        debug!(id1 = %id, count = destroyed.len(), "nodes destroyed");
        Ok(destroyed)
    }

    async fn post_license(
        &self,
        kind: &str,
        node: &DataNode,
        targets: &[PublicKey],
    ) -> Result<()> {
        let mut guard = lock(&self.inner)?;
        guard
            .licenses
            .entry(*node.id1())
            .or_default()
            .push(targets.to_vec());
        debug!(kind, id1 = %node.id1(), targets = targets.len(), "license granted");
        Ok(())
    }

    async fn update_stream(&self, parent: &NodeId, tail: usize) -> Result<()> {
        let mut guard = lock(&self.inner)?;
        for sub in guard.subs.iter_mut() {
            if &sub.parent == parent {
                sub.tail = sub.tail.max(tail);
            }
        }
        refresh_parent(&mut guard, parent);
        Ok(())
    }
}

fn lock(inner: &Arc<Mutex<HubInner>>) -> Result<MutexGuard<'_, HubInner>> {
    inner.lock().map_err(|_| NodeError::LockPoisoned)
}

fn mint_signed(identity: &Identity, fields: NodeFields) -> Result<DataNode> {
    let node = DataNode::create(fields);
    // Ingest check: the id must carry a valid signature from the owner.
    let signature = identity.sign(node.id1().as_bytes());
    verify_signature(node.owner(), node.id1().as_bytes(), &signature)?;
    Ok(node)
}

/// Deterministic causal order for one channel: follow each message's ref
/// chain, breaking ties (concurrent successors of the same message, or
/// chain roots) by creation time then id.
///
/// Ref ids are arbitrary writer-supplied bytes, so the walk guards against
/// unresolvable chains: any node left over once the chains are exhausted
/// (a ref cycle) is reseeded as a root rather than dropped. The full order
/// is recomputed per refresh; a late arrival that sorts before an already
/// delivered node surfaces as an `Added` at the earlier index, not as a
/// reorder of the delivered one.
fn causal_order(inner: &HubInner, parent: &NodeId) -> Vec<NodeId> {
    let ids = inner.children.get(parent).cloned().unwrap_or_default();
    let present: HashSet<NodeId> = ids.iter().copied().collect();

    let mut followers: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut ready: BTreeSet<(DateTime<Utc>, NodeId)> = BTreeSet::new();

    for id in &ids {
        let Some(stored) = inner.nodes.get(id) else {
            continue;
        };
        let prior = stored
            .node
            .ref_id()
            .and_then(NodeId::from_bytes)
            .filter(|r| present.contains(r) && r != id);
        match prior {
            Some(r) => followers.entry(r).or_default().push(*id),
            // Missing or destroyed predecessors make a node a chain root.
            None => {
                ready.insert((stored.node.creation_time(), *id));
            }
        }
    }

    let mut order = Vec::with_capacity(ids.len());
    let mut emitted: HashSet<NodeId> = HashSet::new();
    loop {
        while let Some((_, id)) = ready.pop_first() {
            if !emitted.insert(id) {
                continue;
            }
            order.push(id);
            if let Some(next) = followers.remove(&id) {
                for f in next {
                    if let Some(s) = inner.nodes.get(&f) {
                        ready.insert((s.node.creation_time(), f));
                    }
                }
            }
        }

        // Leftovers mean a ref cycle; reseed its earliest member as a root.
        let stray = ids
            .iter()
            .filter(|id| !emitted.contains(*id))
            .filter_map(|id| inner.nodes.get(id).map(|s| (s.node.creation_time(), *id)))
            .min();
        match stray {
            Some((time, id)) => {
                warn!(id1 = %id, "unresolvable ref chain, treating as root");
                ready.insert((time, id));
            }
            None => break,
        }
    }
    order
}

/// Re-resolve the merged annotation state of `target` and rewrite its blob.
fn refresh_annotations(inner: &mut HubInner, target: NodeId) -> Result<()> {
    let edit_node = {
        let mut ids = inner.edits.get(&target).cloned().unwrap_or_default();
        sort_by_time(inner, &mut ids);
        ids.last()
            .and_then(|id| inner.annotation_nodes.get(id))
            .map(|s| s.node.clone())
    };

    let mut reactions: BTreeMap<String, ReactionEntry> = BTreeMap::new();
    let mut ids = inner.reactions.get(&target).cloned().unwrap_or_default();
    sort_by_time(inner, &mut ids);
    for id in ids {
        let Some(stored) = inner.annotation_nodes.get(&id) else {
            continue;
        };
        let text = String::from_utf8_lossy(stored.node.data()).into_owned();
        let Some((verb, name)) = text.split_once(REACTION_SEPARATOR) else {
            warn!(id1 = %id, "malformed reaction payload");
            continue;
        };
        let endorser = stored.node.owner().to_hex();
        match verb {
            "react" => {
                reactions
                    .entry(name.to_string())
                    .or_default()
                    .public_keys
                    .insert(endorser);
            }
            "unreact" => {
                let emptied = reactions
                    .get_mut(name)
                    .map(|entry| {
                        entry.public_keys.remove(&endorser);
                        entry.public_keys.is_empty()
                    })
                    .unwrap_or(false);
                if emptied {
                    reactions.remove(name);
                }
            }
            other => warn!(verb = other, "unknown reaction verb"),
        }
    }

    let raw = MergedAnnotations {
        edit_node,
        reactions,
    }
    .to_bytes()?;

    let version = inner.bump();
    if let Some(stored) = inner.nodes.get_mut(&target) {
        stored.node.set_annotations(Bytes::from(raw));
        stored.version = version;
    }
    Ok(())
}

fn sort_by_time(inner: &HubInner, ids: &mut [NodeId]) {
    ids.sort_by_key(|id| {
        inner
            .annotation_nodes
            .get(id)
            .map(|s| (s.node.creation_time(), *id))
    });
}

/// Diff the current window of `parent` against what each subscriber has
/// seen and emit purge/add/update events accordingly.
fn refresh_parent(inner: &mut HubInner, parent: &NodeId) {
    if inner.subs.iter().all(|s| &s.parent != parent) {
        return;
    }
    let order = causal_order(inner, parent);

    let mut subs = std::mem::take(&mut inner.subs);
    for sub in subs.iter_mut() {
        if &sub.parent != parent || sub.closed {
            continue;
        }
        let start = order.len().saturating_sub(sub.tail);
        let window = &order[start..];
        let window_set: HashSet<NodeId> = window.iter().copied().collect();

        let stale: Vec<NodeId> = sub
            .sent
            .keys()
            .filter(|id| !window_set.contains(id))
            .copied()
            .collect();
        for id in stale {
            sub.sent.remove(&id);
            if sub.tx.send(ViewEvent::Purged { id1: id }).is_err() {
                sub.closed = true;
            }
        }

        for (index, id) in window.iter().enumerate() {
            let Some(stored) = inner.nodes.get(id) else {
                continue;
            };
            let event = match sub.sent.get(id) {
                None => Some(ViewEvent::Added {
                    index,
                    node: stored.node.clone(),
                }),
                Some(v) if *v != stored.version => Some(ViewEvent::Updated {
                    node: stored.node.clone(),
                }),
                _ => None,
            };
            if let Some(event) = event {
                sub.sent.insert(*id, stored.version);
                if sub.tx.send(event).is_err() {
                    sub.closed = true;
                }
            }
        }
    }
    subs.retain(|s| !s.closed);
    inner.subs = subs;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_params(parent: &DataNode, ref_id: Option<&NodeId>, text: &str) -> PostParams {
        PostParams {
            parent_id: Some(*parent.id1()),
            ref_id: ref_id.map(|id| Bytes::copy_from_slice(id.as_bytes())),
            data: Bytes::copy_from_slice(text.as_bytes()),
            blob_length: None,
        }
    }

    fn setup() -> (MemoryHub, Identity, DataNode, MemoryThread) {
        let hub = MemoryHub::new();
        let identity = Identity::generate();
        let channel = hub.create_channel(&identity, b"general", None).unwrap();
        let thread = hub.thread(identity.clone());
        (hub, identity, channel, thread)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ViewEvent>) -> Vec<ViewEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn test_sequential_posts_follow_ref_chain() {
        let (_, _, channel, thread) = setup();

        let mut last: Option<NodeId> = None;
        let mut posted = Vec::new();
        for text in ["one", "two", "three"] {
            let node = thread
                .post("message", post_params(&channel, last.as_ref(), text))
                .await
                .unwrap();
            last = Some(*node.id1());
            posted.push(node);
        }

        let mut rx = thread.open_view(channel.id1(), 30).unwrap();
        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        for (i, ev) in events.iter().enumerate() {
            match ev {
                ViewEvent::Added { index, node } => {
                    assert_eq!(*index, i);
                    assert_eq!(node.id1(), posted[i].id1());
                }
                other => panic!("expected Added, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_posts_order_deterministically() {
        let (hub, _, channel, thread) = setup();

        let root = thread
            .post("message", post_params(&channel, None, "root"))
            .await
            .unwrap();

        // Two writers both capture `root` as their ref: a concurrent fork.
        let other = hub.thread(Identity::generate());
        let a = thread
            .post("message", post_params(&channel, Some(root.id1()), "a"))
            .await
            .unwrap();
        let b = other
            .post("message", post_params(&channel, Some(root.id1()), "b"))
            .await
            .unwrap();

        let mut rx = thread.open_view(channel.id1(), 30).unwrap();
        let order: Vec<NodeId> = drain(&mut rx)
            .into_iter()
            .map(|ev| match ev {
                ViewEvent::Added { node, .. } => *node.id1(),
                other => panic!("expected Added, got {other:?}"),
            })
            .collect();

        assert_eq!(order[0], *root.id1());
        // Tie broken by (creation time, id); both arrivals are present.
        assert_eq!(order.len(), 3);
        assert!(order.contains(a.id1()));
        assert!(order.contains(b.id1()));
    }

    #[tokio::test]
    async fn test_edit_folds_into_annotation_blob() {
        let (hub, _, channel, thread) = setup();
        let msg = thread
            .post("message", post_params(&channel, None, "hello"))
            .await
            .unwrap();

        thread
            .post_edit("message", &msg, post_params(&channel, None, "hello, world"))
            .await
            .unwrap();

        let stored = hub.node(msg.id1()).unwrap().unwrap();
        let merged = MergedAnnotations::from_bytes(stored.annotations().unwrap()).unwrap();
        let edit = merged.edit_node.unwrap();
        assert_eq!(edit.data(), b"hello, world");
        assert!(merged.reactions.is_empty());
    }

    #[tokio::test]
    async fn test_last_edit_wins() {
        let (hub, _, channel, thread) = setup();
        let msg = thread
            .post("message", post_params(&channel, None, "v1"))
            .await
            .unwrap();
        thread
            .post_edit("message", &msg, post_params(&channel, None, "v2"))
            .await
            .unwrap();
        thread
            .post_edit("message", &msg, post_params(&channel, None, "v3"))
            .await
            .unwrap();

        let stored = hub.node(msg.id1()).unwrap().unwrap();
        let merged = MergedAnnotations::from_bytes(stored.annotations().unwrap()).unwrap();
        assert_eq!(merged.edit_node.unwrap().data(), b"v3");
    }

    #[tokio::test]
    async fn test_react_then_unreact_clears_entry() {
        let (hub, identity, channel, thread) = setup();
        let msg = thread
            .post("message", post_params(&channel, None, "hi"))
            .await
            .unwrap();

        thread
            .post_reaction("message", &msg, post_params(&channel, None, "react/thumbsup"))
            .await
            .unwrap();

        let stored = hub.node(msg.id1()).unwrap().unwrap();
        let merged = MergedAnnotations::from_bytes(stored.annotations().unwrap()).unwrap();
        assert!(merged.reactions["thumbsup"]
            .public_keys
            .contains(&identity.public_key().to_hex()));

        thread
            .post_reaction(
                "message",
                &msg,
                post_params(&channel, None, "unreact/thumbsup"),
            )
            .await
            .unwrap();

        let stored = hub.node(msg.id1()).unwrap().unwrap();
        let merged = MergedAnnotations::from_bytes(stored.annotations().unwrap()).unwrap();
        assert!(merged.reactions.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_takes_annotations_along() {
        let (hub, _, channel, thread) = setup();
        let msg = thread
            .post("message", post_params(&channel, None, "doomed"))
            .await
            .unwrap();
        thread
            .post_edit("message", &msg, post_params(&channel, None, ""))
            .await
            .unwrap();
        thread
            .post_reaction("message", &msg, post_params(&channel, None, "react/wave"))
            .await
            .unwrap();

        let destroyed = thread.destroy(&msg).await.unwrap();
        assert_eq!(destroyed.len(), 3);
        assert_eq!(destroyed[0].id1(), msg.id1());
        assert!(hub.node(msg.id1()).unwrap().is_none());

        // A second destroy is an error: the node is gone.
        assert!(matches!(
            thread.destroy(&msg).await,
            Err(NodeError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_private_channel_posts_are_licensed() {
        let hub = MemoryHub::new();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let channel = hub
            .create_channel(&alice, b"", Some(bob.public_key()))
            .unwrap();
        let thread = hub.thread(alice.clone());

        let node = thread
            .post("message", post_params(&channel, None, "psst"))
            .await
            .unwrap();
        assert!(node.is_licensed());
        assert_eq!(node.license_min_distance(), 0);

        let targets = vec![alice.public_key(), bob.public_key()];
        thread.post_license("default", &node, &targets).await.unwrap();
        assert_eq!(hub.licenses_for(node.id1()).unwrap(), vec![targets]);
    }

    #[tokio::test]
    async fn test_public_channel_posts_are_not_licensed() {
        let (_, _, channel, thread) = setup();
        let node = thread
            .post("message", post_params(&channel, None, "hi"))
            .await
            .unwrap();
        assert!(!node.is_licensed());
    }

    #[tokio::test]
    async fn test_window_purges_and_history_reload() {
        let (_, _, channel, thread) = setup();

        let mut rx = thread.open_view(channel.id1(), 2).unwrap();

        let mut last: Option<NodeId> = None;
        for text in ["one", "two", "three"] {
            let node = thread
                .post("message", post_params(&channel, last.as_ref(), text))
                .await
                .unwrap();
            last = Some(*node.id1());
        }

        let events = drain(&mut rx);
        // "one" was announced, then purged once the window slid past it.
        assert!(events
            .iter()
            .any(|ev| matches!(ev, ViewEvent::Purged { .. })));

        thread.update_stream(channel.id1(), 12).await.unwrap();
        let added: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|ev| match ev {
                ViewEvent::Added { node, .. } => {
                    Some(String::from_utf8_lossy(node.data()).into_owned())
                }
                _ => None,
            })
            .collect();
        assert_eq!(added, vec!["one".to_string()]);
    }

    #[tokio::test]
    async fn test_presence_marks_recent_writers_active() {
        let (hub, identity, channel, thread) = setup();
        thread
            .post("message", post_params(&channel, None, "hi"))
            .await
            .unwrap();

        let entries = hub.presence().unwrap();
        assert_eq!(
            entries,
            vec![PresenceEntry {
                public_key: identity.public_key(),
                active: true,
            }]
        );

        // A second writer shows up once it writes, and indices stay in
        // key order.
        let other = Identity::generate();
        hub.thread(other.clone())
            .post("message", post_params(&channel, None, "yo"))
            .await
            .unwrap();

        let entries = hub.presence().unwrap();
        let mut expected = vec![identity.public_key(), other.public_key()];
        expected.sort();
        let keys: Vec<PublicKey> = entries.iter().map(|e| e.public_key).collect();
        assert_eq!(keys, expected);
        assert!(entries.iter().all(|e| e.active));
    }

    #[tokio::test]
    async fn test_destroyed_predecessor_leaves_chain_intact() {
        let (_, _, channel, thread) = setup();

        let mut last: Option<NodeId> = None;
        let mut posted = Vec::new();
        for text in ["one", "two", "three"] {
            let node = thread
                .post("message", post_params(&channel, last.as_ref(), text))
                .await
                .unwrap();
            last = Some(*node.id1());
            posted.push(node);
        }

        // "two" now dangles on a destroyed ref and becomes a chain root.
        thread.destroy(&posted[0]).await.unwrap();

        let mut rx = thread.open_view(channel.id1(), 30).unwrap();
        let order: Vec<NodeId> = drain(&mut rx)
            .into_iter()
            .filter_map(|ev| match ev {
                ViewEvent::Added { node, .. } => Some(*node.id1()),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![*posted[1].id1(), *posted[2].id1()]);
    }
}
