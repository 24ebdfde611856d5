//! Provider Implementation
//!
//! A provider owns exactly one [`Broadcast`] for its whole lifetime and
//! exposes it to the subtree below it. The broadcaster is never replaced;
//! only its value and listeners change.
//!
//! # Update algorithm
//!
//! When the host hands a provider a new value:
//!
//! 1. If the new value is the [same value](SameValue) as the old one,
//!    nothing happens.
//! 2. Otherwise the comparator (or the all-bits sentinel when there is
//!    none) describes the change as raw changed bits.
//! 3. With diagnostics on, raw bits that do not fit the mask are reported.
//! 4. The raw bits are truncated to the mask.
//! 5. Non-zero bits are broadcast. Zero bits mean the comparator saw no
//!    observable change, and the broadcast is suppressed.

use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::bits::{self, ChangedBits, MAX_SIGNED_31_BIT_INT};
use super::broadcast::{Broadcast, BroadcastRef};
use super::same_value::SameValue;
use super::{Context, Lifecycle};
use crate::tree::{ContextTree, NodeId};

/// What a value update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The value was the same value as before. Nothing was compared or sent.
    Unchanged,

    /// The value changed but the changed bits were zero after truncation.
    Suppressed {
        /// The comparator's raw result did not fit the mask.
        truncated: bool,
    },

    /// Listeners were notified.
    Broadcast {
        /// The mask delivered to listeners.
        changed_bits: ChangedBits,
        /// The comparator's raw result did not fit the mask.
        truncated: bool,
    },
}

impl UpdateOutcome {
    /// Whether listeners were notified.
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast { .. })
    }

    /// The delivered mask, or zero if nothing was sent.
    pub fn changed_bits(&self) -> ChangedBits {
        match self {
            Self::Broadcast { changed_bits, .. } => *changed_bits,
            _ => 0,
        }
    }

    /// Whether the comparator's result had to be truncated.
    pub fn truncated(&self) -> bool {
        match self {
            Self::Unchanged => false,
            Self::Suppressed { truncated } | Self::Broadcast { truncated, .. } => *truncated,
        }
    }
}

/// The producing side of a context.
pub struct Provider<T>
where
    T: Clone + 'static,
{
    context: Context<T>,

    /// Mirrors the value most recently supplied by the host.
    value: T,

    /// Owned for the provider's lifetime; consumers only hold weak refs.
    broadcast: Rc<Broadcast<T>>,

    /// Where this provider is registered, while mounted in a tree.
    node: Option<NodeId>,

    lifecycle: Lifecycle,
}

impl<T> Provider<T>
where
    T: Clone + SameValue + 'static,
{
    pub(crate) fn new(context: Context<T>, value: T) -> Self {
        let broadcast = Rc::new(Broadcast::named(value.clone(), context.name()));
        Self {
            context,
            value,
            broadcast,
            node: None,
            lifecycle: Lifecycle::Constructed,
        }
    }

    /// The current value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Non-owning handle to pass down to consumers.
    pub fn broadcaster(&self) -> BroadcastRef<T> {
        BroadcastRef::new(&self.broadcast)
    }

    /// Number of consumers currently subscribed.
    pub fn listener_count(&self) -> usize {
        self.broadcast.listener_count()
    }

    /// Where the provider is in its lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Mark the provider as mounted without registering it in a tree.
    ///
    /// Hosts that thread [`broadcaster`](Self::broadcaster) down explicitly
    /// use this instead of [`on_attach`](Self::on_attach).
    pub fn mount(&mut self) {
        if self.lifecycle == Lifecycle::Constructed {
            self.lifecycle = Lifecycle::Mounted;
        }
    }

    /// Mount at `node_id`, making the broadcaster visible to the subtree.
    ///
    /// Returns `false` and stays unmounted if `node_id` is not in `tree`, or
    /// if the provider was already attached or detached.
    pub fn on_attach(&mut self, tree: &mut ContextTree, node_id: NodeId) -> bool {
        if self.lifecycle != Lifecycle::Constructed {
            return false;
        }
        if !tree.provide(node_id, self.context.key(), self.broadcaster()) {
            warn!(
                context = self.context.name(),
                node = node_id.raw(),
                "provider attached to a node outside the tree; staying unmounted"
            );
            return false;
        }
        self.node = Some(node_id);
        self.lifecycle = Lifecycle::Mounted;
        debug!(context = self.context.name(), node = node_id.raw(), "provider attached");
        true
    }

    /// Unmount. The broadcaster stays alive until the provider is dropped,
    /// but is no longer visible to consumers resolved through `tree`.
    pub fn on_detach(&mut self, tree: &mut ContextTree) {
        if self.lifecycle == Lifecycle::Unmounted {
            return;
        }
        if let Some(node_id) = self.node.take() {
            tree.revoke(node_id, self.context.key());
        }
        self.lifecycle = Lifecycle::Unmounted;
        debug!(context = self.context.name(), "provider detached");
    }

    /// Accept a new value from the host and broadcast it if it changed.
    ///
    /// Ignored once the provider is unmounted.
    pub fn on_config_change(&mut self, next: T) -> UpdateOutcome {
        if self.lifecycle == Lifecycle::Unmounted {
            return UpdateOutcome::Unchanged;
        }
        if next.same_value(&self.value) {
            return UpdateOutcome::Unchanged;
        }

        let raw = match self.context.comparator() {
            Some(comparator) => comparator(&self.value, &next),
            None => i64::from(MAX_SIGNED_31_BIT_INT),
        };

        let truncated = !bits::fits(raw);
        if truncated && self.context.config().diagnostics {
            warn!(
                context = self.context.name(),
                raw,
                "comparator must return a non-negative integer below 2^30, got {raw}; truncating"
            );
        }
        let changed_bits = bits::coerce(raw);

        self.value = next;
        if changed_bits == 0 {
            trace!(context = self.context.name(), "change reported no bits; not broadcasting");
            return UpdateOutcome::Suppressed { truncated };
        }

        self.broadcast.set_state(self.value.clone(), changed_bits);
        UpdateOutcome::Broadcast {
            changed_bits,
            truncated,
        }
    }

    /// Providers render their children unchanged.
    pub fn render<C>(&self, children: C) -> C {
        children
    }
}

impl<T> std::fmt::Debug for Provider<T>
where
    T: Clone + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("key", &self.context.inner.key)
            .field("value", &self.value)
            .field("listener_count", &self.broadcast.listener_count())
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
