//! Tree Nodes
//!
//! The node registry used to resolve providers for consumers.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use tracing::trace;

use crate::context::{BroadcastRef, ContextKey};

/// Unique identifier for a node in the host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// A node's position and the broadcasters it provides.
#[derive(Default)]
struct TreeNode {
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
    /// Each value is a `BroadcastRef<T>` for the `T` of its context.
    provided: HashMap<ContextKey, Box<dyn Any>>,
}

/// Registry of host tree nodes and the contexts provided at each.
#[derive(Default)]
pub struct ContextTree {
    nodes: HashMap<NodeId, TreeNode>,
}

impl ContextTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root node.
    pub fn add_root(&mut self) -> NodeId {
        let id = NodeId::new();
        self.nodes.insert(id, TreeNode::default());
        id
    }

    /// Add a child under `parent`. Returns `None` if `parent` is unknown.
    pub fn add_child(&mut self, parent: NodeId) -> Option<NodeId> {
        let id = NodeId::new();
        self.nodes.get_mut(&parent)?.children.push(id);
        self.nodes.insert(
            id,
            TreeNode {
                parent: Some(parent),
                ..TreeNode::default()
            },
        );
        Some(id)
    }

    /// Remove a node and its whole subtree.
    ///
    /// Returns the number of nodes removed.
    pub fn remove_node(&mut self, node_id: NodeId) -> usize {
        let Some(node) = self.nodes.remove(&node_id) else {
            return 0;
        };

        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|child| *child != node_id);
        }

        let mut removed = 1;
        let mut stack: Vec<NodeId> = node.children.into_vec();
        while let Some(id) = stack.pop() {
            if let Some(child) = self.nodes.remove(&id) {
                removed += 1;
                stack.extend(child.children);
            }
        }
        removed
    }

    /// Whether `node_id` is in the tree.
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Parent of `node_id`, if any.
    pub fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(&node_id)?.parent
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Record that `node_id` provides `broadcast` for context `key`.
    ///
    /// Returns false if the node is unknown.
    pub fn provide<T: 'static>(
        &mut self,
        node_id: NodeId,
        key: ContextKey,
        broadcast: BroadcastRef<T>,
    ) -> bool {
        match self.nodes.get_mut(&node_id) {
            Some(node) => {
                node.provided.insert(key, Box::new(broadcast));
                trace!(node = node_id.raw(), key = key.raw(), "context provided");
                true
            }
            None => false,
        }
    }

    /// Stop providing context `key` at `node_id`.
    pub fn revoke(&mut self, node_id: NodeId, key: ContextKey) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            if node.provided.remove(&key).is_some() {
                trace!(node = node_id.raw(), key = key.raw(), "context revoked");
            }
        }
    }

    /// Find the nearest live broadcaster for `key` at or above `node_id`.
    pub fn lookup<T: 'static>(&self, node_id: NodeId, key: ContextKey) -> Option<BroadcastRef<T>> {
        let mut current = Some(node_id);
        while let Some(id) = current {
            let node = self.nodes.get(&id)?;
            let found = node
                .provided
                .get(&key)
                .and_then(|entry| entry.downcast_ref::<BroadcastRef<T>>())
                .filter(|broadcast| broadcast.is_alive());
            if let Some(broadcast) = found {
                return Some(broadcast.clone());
            }
            current = node.parent;
        }
        None
    }
}

impl std::fmt::Debug for ContextTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextTree")
            .field("node_count", &self.nodes.len())
            .finish()
    }
}
