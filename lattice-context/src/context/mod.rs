//! Context Providers and Consumers
//!
//! A context carries one value down a UI tree without threading it through
//! every intermediate node. [`create_context`] returns a [`Context`] handle
//! from which the host builds paired nodes:
//!
//! - a [`Provider`] owns a [`Broadcast`] seeded with its value and
//!   re-broadcasts whenever that value changes;
//! - a [`Consumer`] subscribes to the nearest provider above it, or falls
//!   back to the context's default value when there is none.
//!
//! # Selective updates
//!
//! Not every consumer cares about every change. A context may be created
//! with a comparator that describes a change as a bitmask (the
//! *changed bits*). Each consumer declares the bits it *observes*, and only
//! consumers whose observed bits intersect the changed bits re-render.
//!
//! ```rust
//! use lattice_context::create_context_with;
//!
//! #[derive(Clone, PartialEq)]
//! struct Theme { color: u8, font: u8 }
//!
//! impl lattice_context::SameValue for Theme {
//!     fn same_value(&self, other: &Self) -> bool { self == other }
//! }
//!
//! const COLOR: i64 = 0b01;
//! const FONT: i64 = 0b10;
//!
//! let theme = create_context_with(Theme { color: 0, font: 0 }, |prev: &Theme, next: &Theme| {
//!     let mut bits = 0;
//!     if prev.color != next.color { bits |= COLOR; }
//!     if prev.font != next.font { bits |= FONT; }
//!     bits
//! });
//!
//! let mut provider = theme.provider(Theme { color: 1, font: 1 });
//! let mut font_reader = theme.consumer(Some(provider.broadcaster())).with_observed_bits(Some(FONT));
//! font_reader.on_attach();
//!
//! provider.on_config_change(Theme { color: 2, font: 1 });
//! assert!(!font_reader.needs_render());
//!
//! provider.on_config_change(Theme { color: 2, font: 3 });
//! assert!(font_reader.take_render_request());
//! assert_eq!(font_reader.value().font, 3);
//! ```
//!
//! # Lifecycle
//!
//! Nodes have no framework base class. The host drives them explicitly
//! through `on_attach`, `on_config_change` and `on_detach`, and calls
//! `render` when it wants output.

mod bits;
mod broadcast;
mod consumer;
mod provider;
mod same_value;

pub use bits::{
    coerce, fits, intersects, observed_or_all, ChangedBits, ObservedBits, MAX_SIGNED_31_BIT_INT,
};
pub use broadcast::{Broadcast, BroadcastRef, Listener, SubscriptionId};
pub use consumer::{Consumer, RenderChildren};
pub use provider::{Provider, UpdateOutcome};
pub use same_value::SameValue;

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::config::ContextConfig;
use crate::tree::{ContextTree, NodeId};

/// Describes what changed between two values as a bitmask.
///
/// The result is truncated to [`MAX_SIGNED_31_BIT_INT`]; a value that does
/// not fit is reported as an advisory warning when diagnostics are on.
pub type Comparator<T> = Rc<dyn Fn(&T, &T) -> i64>;

/// Opaque identity of one context.
///
/// Every call to [`create_context`] mints a fresh key, so contexts created
/// independently never see each other's providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey(u64);

impl ContextKey {
    /// Generate a new unique key.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw key value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ContextKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a provider or consumer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Built but not yet attached to the host tree.
    Constructed,

    /// Attached and live.
    Mounted,

    /// Detached. Terminal.
    Unmounted,
}

struct ContextInner<T> {
    key: ContextKey,
    default_value: T,
    comparator: Option<Comparator<T>>,
    config: ContextConfig,
}

impl<T: Clone> Clone for ContextInner<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            default_value: self.default_value.clone(),
            comparator: self.comparator.clone(),
            config: self.config.clone(),
        }
    }
}

/// Handle to one context: its key, default value, comparator and config.
///
/// Cloning is cheap and clones refer to the same context.
pub struct Context<T>
where
    T: Clone + 'static,
{
    inner: Rc<ContextInner<T>>,
}

/// Create a context whose consumers fall back to `default_value`.
///
/// Any value change is reported with every bit set.
pub fn create_context<T>(default_value: T) -> Context<T>
where
    T: Clone + SameValue + 'static,
{
    Context::new(default_value, None, ContextConfig::default())
}

/// Create a context with a comparator that describes changes as bits.
pub fn create_context_with<T, F>(default_value: T, comparator: F) -> Context<T>
where
    T: Clone + SameValue + 'static,
    F: Fn(&T, &T) -> i64 + 'static,
{
    Context::new(
        default_value,
        Some(Rc::new(comparator)),
        ContextConfig::default(),
    )
}

impl<T> Context<T>
where
    T: Clone + SameValue + 'static,
{
    /// Create a context from its parts.
    pub fn new(default_value: T, comparator: Option<Comparator<T>>, config: ContextConfig) -> Self {
        let key = ContextKey::new();
        debug!(
            context = config.name(),
            key = key.raw(),
            has_comparator = comparator.is_some(),
            "context created"
        );
        Self {
            inner: Rc::new(ContextInner {
                key,
                default_value,
                comparator,
                config,
            }),
        }
    }

    /// Replace the configuration.
    ///
    /// Clones made before this call keep the old configuration but share
    /// the same key.
    pub fn with_config(mut self, config: ContextConfig) -> Self {
        Rc::make_mut(&mut self.inner).config = config;
        self
    }

    /// This context's key.
    pub fn key(&self) -> ContextKey {
        self.inner.key
    }

    /// The value consumers see when no provider is above them.
    pub fn default_value(&self) -> &T {
        &self.inner.default_value
    }

    /// The configuration.
    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    pub(crate) fn comparator(&self) -> Option<&Comparator<T>> {
        self.inner.comparator.as_ref()
    }

    pub(crate) fn name(&self) -> &str {
        self.inner.config.name()
    }

    /// Build a provider seeded with `value`.
    pub fn provider(&self, value: T) -> Provider<T> {
        Provider::new(self.clone(), value)
    }

    /// Build a consumer reading from `ambient`, the broadcaster passed down
    /// by the host, or from the default value when there is none.
    pub fn consumer(&self, ambient: Option<BroadcastRef<T>>) -> Consumer<T> {
        Consumer::new(self.clone(), ambient)
    }

    /// Build a consumer at `node_id`, resolving its provider through `tree`.
    pub fn consumer_in(&self, tree: &ContextTree, node_id: NodeId) -> Consumer<T> {
        self.consumer(tree.lookup(node_id, self.key()))
    }
}

impl<T> Clone for Context<T>
where
    T: Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Context<T>
where
    T: Clone + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("key", &self.inner.key)
            .field("default_value", &self.inner.default_value)
            .field("has_comparator", &self.inner.comparator.is_some())
            .field("config", &self.inner.config)
            .finish()
    }
}
