//! Render queue shared between consumers and the host.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexSet;

use super::NodeId;

/// Insertion-ordered, de-duplicated set of nodes awaiting re-render.
///
/// Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct RenderQueue {
    pending: Rc<RefCell<IndexSet<NodeId>>>,
}

impl RenderQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a node for re-render. Marking twice keeps the first position.
    pub fn mark(&self, node_id: NodeId) {
        self.pending.borrow_mut().insert(node_id);
    }

    /// Take every pending node, in the order they were first marked.
    pub fn drain(&self) -> Vec<NodeId> {
        self.pending.borrow_mut().drain(..).collect()
    }

    /// Whether `node_id` is waiting to re-render.
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.pending.borrow().contains(&node_id)
    }

    /// Number of pending nodes.
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}
