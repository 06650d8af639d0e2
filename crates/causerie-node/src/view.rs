//! Bounded, incrementally updated view window over a thread's nodes.
//!
//! The external view feed decides membership and order; this structure just
//! tracks the window and keeps one projection object per live node,
//! recomputed in place on every add/update and dropped on purge.

use std::collections::HashMap;

use causerie_shared::NodeId;

use crate::node::DataNode;

/// A change notification from the view feed.
#[derive(Debug, Clone)]
pub enum ViewEvent {
    /// A node entered the window at `index` (in resolved order).
    Added { index: usize, node: DataNode },
    /// A node already in the window changed (annotation state, usually).
    Updated { node: DataNode },
    /// A node left the window; its projection is released.
    Purged { id1: NodeId },
}

/// A live node paired with its projection.
#[derive(Debug)]
pub struct ViewItem<D> {
    pub node: DataNode,
    pub data: D,
}

/// Ordered window of [`ViewItem`]s, indexed by primary id.
#[derive(Debug)]
pub struct ThreadView<D> {
    items: Vec<ViewItem<D>>,
    index: HashMap<NodeId, usize>,
    tail: usize,
}

impl<D: Default> ThreadView<D> {
    pub fn new(tail: usize) -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
            tail,
        }
    }

    /// Current window size request.
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Grow the window request by `n`, returning the new size.
    pub fn extend_tail(&mut self, n: usize) -> usize {
        self.tail += n;
        self.tail
    }

    pub fn items(&self) -> &[ViewItem<D>] {
        &self.items
    }

    pub fn last_item(&self) -> Option<&ViewItem<D>> {
        self.items.last()
    }

    pub fn find(&self, id1: &NodeId) -> Option<&ViewItem<D>> {
        self.index.get(id1).map(|&i| &self.items[i])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply one feed event, recomputing the affected projection through
    /// `make_data`. Returns whether anything changed.
    pub fn apply<F>(&mut self, event: ViewEvent, mut make_data: F) -> bool
    where
        F: FnMut(&DataNode, &mut D),
    {
        match event {
            ViewEvent::Added { index, node } => {
                if let Some(&i) = self.index.get(node.id1()) {
                    // Feed re-announced a known node; treat as update.
                    make_data(&node, &mut self.items[i].data);
                    self.items[i].node = node;
                    return true;
                }
                let mut data = D::default();
                make_data(&node, &mut data);
                let at = index.min(self.items.len());
                self.items.insert(at, ViewItem { node, data });
                self.reindex(at);
                true
            }
            ViewEvent::Updated { node } => match self.index.get(node.id1()) {
                Some(&i) => {
                    make_data(&node, &mut self.items[i].data);
                    self.items[i].node = node;
                    true
                }
                None => false,
            },
            ViewEvent::Purged { id1 } => match self.index.remove(&id1) {
                Some(i) => {
                    // Dropping the item releases the projection; nothing
                    // else to clean up.
                    self.items.remove(i);
                    self.reindex(i);
                    true
                }
                None => false,
            },
        }
    }

    fn reindex(&mut self, from: usize) {
        for (i, item) in self.items.iter().enumerate().skip(from) {
            self.index.insert(*item.node.id1(), i);
        }
    }
}
