//! Explicit Context Propagation
//!
//! Providers and consumers never find each other through ambient state.
//! Instead, the host keeps a [`ContextTree`] that mirrors the shape of its
//! UI tree and records which broadcasters each node provides. A consumer
//! resolves its provider by walking from its own node toward the root.
//!
//! # Overview
//!
//! - [`NodeId`] identifies a node in the host tree.
//! - [`ContextTree`] maps nodes to parents and to the broadcasters provided
//!   there, keyed by [`ContextKey`](crate::ContextKey). Independently
//!   created contexts never collide because each has its own key, and an
//!   inner provider shadows an outer provider of the same context.
//! - [`RenderQueue`] collects the nodes that consumers marked for
//!   re-render during a broadcast, so the host can drain and re-render them
//!   in order.

mod node;
mod queue;

pub use node::{ContextTree, NodeId};
pub use queue::RenderQueue;
