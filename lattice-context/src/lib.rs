//! Lattice Context
//!
//! This crate provides context propagation for the Lattice reactive UI
//! framework. A context carries one value from a provider node to any
//! number of consumer nodes below it, without threading the value through
//! every node in between.
//!
//! It implements:
//!
//! - A per-provider broadcaster with a re-entrancy-safe listener registry
//! - Bit-masked change notification, so consumers re-render only for the
//!   aspects of a value they observe
//! - An explicit tree registry that resolves the nearest provider for a
//!   consumer, in place of ambient framework state
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `context`: the context factory, providers, consumers and broadcaster
//! - `tree`: node identity, provider lookup and the render queue
//! - `config`: per-context configuration
//! - `error`: error types
//!
//! Everything runs on one thread. Providers, consumers and broadcasters are
//! built on `Rc` and `RefCell` and are not `Send`.
//!
//! # Example
//!
//! ```rust
//! use lattice_context::{create_context, ContextTree, RenderChildren};
//!
//! let locale = create_context("en".to_string());
//!
//! let mut tree = ContextTree::new();
//! let root = tree.add_root();
//! let label = tree.add_child(root).unwrap();
//!
//! let mut provider = locale.provider("fr".to_string());
//! provider.on_attach(&mut tree, root);
//!
//! let mut consumer = locale.consumer_in(&tree, label);
//! consumer.on_attach();
//!
//! provider.on_config_change("de".to_string());
//! assert!(consumer.take_render_request());
//!
//! let text = consumer
//!     .render(RenderChildren::Single(|lang: String| format!("lang={lang}")))
//!     .unwrap();
//! assert_eq!(text, "lang=de");
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod tree;

#[cfg(test)]
mod test_support;

pub use config::ContextConfig;
pub use context::{
    create_context, create_context_with, Broadcast, BroadcastRef, ChangedBits, Comparator,
    Consumer, Context, ContextKey, Lifecycle, Listener, ObservedBits, Provider, RenderChildren,
    SameValue, SubscriptionId, UpdateOutcome, MAX_SIGNED_31_BIT_INT,
};
pub use error::{ContextError, Result};
pub use tree::{ContextTree, NodeId, RenderQueue};
