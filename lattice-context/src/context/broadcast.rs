//! Broadcaster
//!
//! A `Broadcast` holds the current value of one provider and the listeners
//! that want to hear about changes to it. The provider owns it; consumers
//! reach it through a non-owning [`BroadcastRef`].
//!
//! # Re-entrancy
//!
//! Listeners run synchronously inside [`Broadcast::set_state`] and are
//! allowed to call back into the broadcaster: read the state, subscribe, or
//! unsubscribe themselves or others. To keep a pass well-defined:
//!
//! 1. The set of subscription ids is snapshotted when the pass starts, so
//!    listeners added during the pass are not invoked until the next one.
//! 2. Each listener is looked up again right before it runs, so a listener
//!    removed earlier in the pass is skipped.
//! 3. No `RefCell` borrow is held while a listener runs.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, error, trace};

use super::bits::ChangedBits;
use crate::error::{ContextError, Result};

/// Identifier handed out by [`Broadcast::subscribe`].
///
/// Ids start at 1 and increase monotonically for the lifetime of a
/// broadcaster. An id is never reissued, even after it is unsubscribed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A change listener: receives the new value and the changed-bits mask.
pub type Listener<T> = Rc<dyn Fn(&T, ChangedBits)>;

/// Most trees have a handful of consumers per provider.
type IdSnapshot = SmallVec<[SubscriptionId; 8]>;

/// Current value plus listener registry for one provider.
pub struct Broadcast<T> {
    /// Name used in log events.
    name: Rc<str>,

    /// The current value. Replaced, never merged.
    value: RefCell<T>,

    /// Registered listeners, in subscription order.
    listeners: RefCell<IndexMap<SubscriptionId, Listener<T>>>,

    /// Next id to hand out.
    next_id: Cell<u64>,
}

impl<T> Broadcast<T>
where
    T: Clone + 'static,
{
    /// Create a broadcaster seeded with `value`.
    pub fn new(value: T) -> Self {
        Self::named(value, "Context")
    }

    /// Create a broadcaster whose log events carry `name`.
    pub fn named(value: T, name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            value: RefCell::new(value),
            listeners: RefCell::new(IndexMap::new()),
            next_id: Cell::new(1),
        }
    }

    /// Get the current value.
    pub fn get_state(&self) -> T {
        self.value.borrow().clone()
    }

    /// Replace the value and notify every listener registered when the
    /// call began.
    pub fn set_state(&self, value: T, changed_bits: ChangedBits) {
        *self.value.borrow_mut() = value.clone();

        let ids: IdSnapshot = self.listeners.borrow().keys().copied().collect();
        trace!(
            context = %self.name,
            changed_bits,
            listeners = ids.len(),
            "broadcasting context change"
        );

        for id in ids {
            // Re-check membership: an earlier listener may have removed this one.
            let listener = self.listeners.borrow().get(&id).cloned();
            if let Some(listener) = listener {
                listener(&value, changed_bits);
            }
        }
    }

    /// Register a listener and return its subscription id.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&T, ChangedBits) + 'static,
    {
        self.register(Rc::new(listener))
    }

    /// Register a listener that may be missing.
    ///
    /// Returns [`ContextError::InvalidListener`] and registers nothing when
    /// `listener` is `None`.
    pub fn try_subscribe(&self, listener: Option<Listener<T>>) -> Result<SubscriptionId> {
        listener
            .map(|listener| self.register(listener))
            .ok_or(ContextError::InvalidListener)
    }

    /// Non-fatal variant of [`try_subscribe`](Self::try_subscribe): an
    /// invalid listener is logged and `None` is returned.
    pub fn subscribe_listener(&self, listener: Option<Listener<T>>) -> Option<SubscriptionId> {
        match self.try_subscribe(listener) {
            Ok(id) => Some(id),
            Err(err) => {
                error!(context = %self.name, "{err}");
                None
            }
        }
    }

    /// Remove a listener. Unknown or already-removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.listeners.borrow_mut().shift_remove(&id).is_some() {
            debug!(context = %self.name, id = id.raw(), "listener unsubscribed");
        }
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.listeners.borrow().contains_key(&id)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn register(&self, listener: Listener<T>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().insert(id, listener);
        debug!(context = %self.name, id = id.raw(), "listener subscribed");
        id
    }
}

impl<T> Debug for Broadcast<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcast")
            .field("name", &self.name)
            .field("value", &self.value.borrow())
            .field("listener_count", &self.listeners.borrow().len())
            .field("next_id", &self.next_id.get())
            .finish()
    }
}

/// Non-owning, read-and-subscribe view of a provider's broadcaster.
///
/// Only the owning provider can change the value. Every method degrades to
/// a no-op (or `None`) once the provider has been dropped.
pub struct BroadcastRef<T> {
    inner: Weak<Broadcast<T>>,
}

impl<T> BroadcastRef<T> {
    pub(crate) fn new(broadcast: &Rc<Broadcast<T>>) -> Self {
        Self {
            inner: Rc::downgrade(broadcast),
        }
    }

    pub(crate) fn upgrade(&self) -> Option<Rc<Broadcast<T>>> {
        self.inner.upgrade()
    }

    /// Whether the owning provider is still alive.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Whether both handles point at the same broadcaster.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> BroadcastRef<T>
where
    T: Clone + 'static,
{
    /// The provider's current value, if it is still alive.
    pub fn get_state(&self) -> Option<T> {
        self.upgrade().map(|broadcast| broadcast.get_state())
    }

    /// Subscribe to the provider's changes. `None` if it is gone.
    pub fn subscribe<F>(&self, listener: F) -> Option<SubscriptionId>
    where
        F: Fn(&T, ChangedBits) + 'static,
    {
        self.upgrade().map(|broadcast| broadcast.subscribe(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(broadcast) = self.upgrade() {
            broadcast.unsubscribe(id);
        }
    }

    /// Listeners on the provider, zero once it is gone.
    pub fn listener_count(&self) -> usize {
        self.upgrade().map_or(0, |broadcast| broadcast.listener_count())
    }
}

impl<T> Clone for BroadcastRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> Debug for BroadcastRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastRef")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
