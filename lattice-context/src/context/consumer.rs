//! Consumer Implementation
//!
//! A consumer reads the value of the nearest provider above it and
//! re-renders when that value changes in a way it cares about.
//!
//! # How Consumers Work
//!
//! 1. On construction, the consumer snapshots the provider's current value,
//!    or the context default when there is no provider.
//!
//! 2. On attach, it subscribes an update callback to the provider's
//!    broadcaster.
//!
//! 3. When the provider broadcasts, the callback intersects the changed
//!    bits with the consumer's observed bits. On a hit it re-reads the
//!    broadcaster, refreshes the snapshot and requests a re-render. On a
//!    miss it does nothing.
//!
//! 4. On detach, it unsubscribes.
//!
//! A consumer without a provider is a constant reader of the default value.
//! It never subscribes and never requests a re-render.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace};

use super::bits::{self, ChangedBits, ObservedBits, MAX_SIGNED_31_BIT_INT};
use super::broadcast::{BroadcastRef, SubscriptionId};
use super::same_value::SameValue;
use super::{Context, Lifecycle};
use crate::error::{ContextError, Result};
use crate::tree::{NodeId, RenderQueue};

/// The children a consumer renders with.
///
/// Only the first render function of a collection is used; the rest are
/// ignored.
pub enum RenderChildren<F> {
    /// A single render function.
    Single(F),

    /// A collection of render functions.
    Many(Vec<F>),
}

/// State shared between a consumer and its update callback.
struct ConsumerShared<T> {
    /// Last value seen, used for rendering.
    snapshot: RefCell<T>,

    /// Already truncated to the mask.
    observed_bits: Cell<ObservedBits>,

    /// Set by the update callback, cleared by the host.
    needs_render: Cell<bool>,

    /// Where to report re-render requests, if the host wants them queued.
    render_target: RefCell<Option<(RenderQueue, NodeId)>>,
}

/// The consuming side of a context.
pub struct Consumer<T>
where
    T: Clone + 'static,
{
    context: Context<T>,

    /// The provider's broadcaster, if one was found above this node.
    ambient: Option<BroadcastRef<T>>,

    shared: Rc<ConsumerShared<T>>,

    /// Present while subscribed to a live provider.
    subscription: Option<SubscriptionId>,

    /// Observed bits as configured by the host, before truncation.
    configured_bits: Option<i64>,

    lifecycle: Lifecycle,
}

impl<T> Consumer<T>
where
    T: Clone + SameValue + 'static,
{
    pub(crate) fn new(context: Context<T>, ambient: Option<BroadcastRef<T>>) -> Self {
        let snapshot = ambient
            .as_ref()
            .and_then(BroadcastRef::upgrade)
            .map(|broadcast| broadcast.get_state())
            .unwrap_or_else(|| context.default_value().clone());

        Self {
            context,
            ambient,
            shared: Rc::new(ConsumerShared {
                snapshot: RefCell::new(snapshot),
                observed_bits: Cell::new(MAX_SIGNED_31_BIT_INT),
                needs_render: Cell::new(false),
                render_target: RefCell::new(None),
            }),
            subscription: None,
            configured_bits: None,
            lifecycle: Lifecycle::Constructed,
        }
    }

    /// Set the observed bits applied on attach. `None` observes everything.
    pub fn with_observed_bits(mut self, observed_bits: Option<i64>) -> Self {
        self.configured_bits = observed_bits;
        self.shared
            .observed_bits
            .set(bits::observed_or_all(observed_bits));
        self
    }

    /// Report re-render requests for `node_id` to `queue`.
    pub fn with_render_queue(self, queue: RenderQueue, node_id: NodeId) -> Self {
        *self.shared.render_target.borrow_mut() = Some((queue, node_id));
        self
    }

    /// The value this consumer renders with.
    pub fn value(&self) -> T {
        self.shared.snapshot.borrow().clone()
    }

    /// The effective observed bits.
    pub fn observed_bits(&self) -> ObservedBits {
        self.shared.observed_bits.get()
    }

    /// Whether a live provider is above this consumer.
    pub fn has_provider(&self) -> bool {
        self.ambient.as_ref().is_some_and(BroadcastRef::is_alive)
    }

    /// Whether the consumer is subscribed to a provider.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Where the consumer is in its lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Whether a broadcast asked for a re-render that has not been taken.
    pub fn needs_render(&self) -> bool {
        self.shared.needs_render.get()
    }

    /// Clear and return the pending re-render request.
    pub fn take_render_request(&self) -> bool {
        self.shared.needs_render.replace(false)
    }

    /// Mount: subscribe to the provider, if there is a live one.
    pub fn on_attach(&mut self) {
        if self.lifecycle != Lifecycle::Constructed {
            return;
        }
        self.lifecycle = Lifecycle::Mounted;
        self.shared
            .observed_bits
            .set(bits::observed_or_all(self.configured_bits));

        let Some(broadcast) = self.ambient.as_ref().and_then(BroadcastRef::upgrade) else {
            trace!(context = self.context.name(), "no provider; reading default value");
            return;
        };

        let shared = Rc::downgrade(&self.shared);
        let source = self.ambient.clone();
        let id = broadcast.subscribe(move |value: &T, changed_bits| {
            on_update(&shared, source.as_ref(), value, changed_bits);
        });
        self.subscription = Some(id);
        debug!(context = self.context.name(), id = id.raw(), "consumer attached");
    }

    /// The host changed this consumer's observed bits. Ignored once
    /// unmounted.
    pub fn on_config_change(&mut self, observed_bits: Option<i64>) {
        if self.lifecycle == Lifecycle::Unmounted {
            return;
        }
        self.configured_bits = observed_bits;
        self.shared
            .observed_bits
            .set(bits::observed_or_all(observed_bits));
    }

    /// Unmount: unsubscribe. Safe to call more than once.
    pub fn on_detach(&mut self) {
        self.unsubscribe();
        if self.lifecycle != Lifecycle::Unmounted {
            self.lifecycle = Lifecycle::Unmounted;
            debug!(context = self.context.name(), "consumer detached");
        }
    }

    /// Render with the current snapshot.
    ///
    /// A collection uses its first function. An empty collection is an
    /// error.
    pub fn render<R, F>(&self, children: RenderChildren<F>) -> Result<R>
    where
        F: FnOnce(T) -> R,
    {
        let render = match children {
            RenderChildren::Single(render) => render,
            RenderChildren::Many(renders) => match renders.into_iter().next() {
                Some(render) => render,
                None => {
                    let err = ContextError::MissingRenderFunction;
                    error!(context = self.context.name(), "{err}");
                    return Err(err);
                }
            },
        };
        // Clone first: rendering may trigger a broadcast back into this consumer.
        Ok(render(self.value()))
    }

    /// Render with a single function.
    pub fn render_with<R>(&self, render: impl FnOnce(T) -> R) -> R {
        render(self.value())
    }

    fn unsubscribe(&mut self) {
        let Some(id) = self.subscription.take() else {
            return;
        };
        if let Some(broadcast) = self.ambient.as_ref().and_then(BroadcastRef::upgrade) {
            broadcast.unsubscribe(id);
        }
    }
}

/// The callback a consumer subscribes with.
fn on_update<T>(
    shared: &Weak<ConsumerShared<T>>,
    source: Option<&BroadcastRef<T>>,
    value: &T,
    changed_bits: ChangedBits,
) where
    T: Clone + 'static,
{
    let Some(shared) = shared.upgrade() else {
        return;
    };
    if !bits::intersects(shared.observed_bits.get(), changed_bits) {
        return;
    }

    // Re-read rather than trusting `value`, in case a listener earlier in
    // this pass already pushed a newer value.
    let latest = source
        .and_then(BroadcastRef::upgrade)
        .map(|broadcast| broadcast.get_state())
        .unwrap_or_else(|| value.clone());
    *shared.snapshot.borrow_mut() = latest;
    shared.needs_render.set(true);

    let target = shared.render_target.borrow();
    if let Some((queue, node_id)) = target.as_ref() {
        queue.mark(*node_id);
    }
}

impl<T> Drop for Consumer<T>
where
    T: Clone + 'static,
{
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            if let Some(broadcast) = self.ambient.as_ref().and_then(BroadcastRef::upgrade) {
                broadcast.unsubscribe(id);
            }
        }
    }
}

impl<T> std::fmt::Debug for Consumer<T>
where
    T: Clone + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("key", &self.context.inner.key)
            .field("value", &self.shared.snapshot.borrow())
            .field("observed_bits", &self.shared.observed_bits.get())
            .field("subscription", &self.subscription)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
