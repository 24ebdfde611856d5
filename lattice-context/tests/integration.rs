//! Integration Tests for Context Propagation
//!
//! These tests verify that providers, consumers and the tree registry work
//! together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lattice_context::{
    create_context, create_context_with, Broadcast, ContextConfig, ContextTree, Lifecycle,
    RenderChildren, RenderQueue, SameValue, UpdateOutcome, MAX_SIGNED_31_BIT_INT,
};

#[derive(Debug, Clone, PartialEq)]
struct Theme {
    color: u32,
    font: u32,
}

impl SameValue for Theme {
    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

const COLOR: i64 = 0b01;
const FONT: i64 = 0b10;

fn theme_bits(prev: &Theme, next: &Theme) -> i64 {
    let mut bits = 0;
    if prev.color != next.color {
        bits |= COLOR;
    }
    if prev.font != next.font {
        bits |= FONT;
    }
    bits
}

/// Updating to the same value never reaches a consumer.
#[test]
fn identical_update_triggers_no_broadcast() {
    let ctx = create_context(f64::NAN);
    let mut provider = ctx.provider(f64::NAN);
    let mut consumer = ctx.consumer(Some(provider.broadcaster()));
    consumer.on_attach();

    for _ in 0..3 {
        assert_eq!(provider.on_config_change(f64::NAN), UpdateOutcome::Unchanged);
    }
    assert!(!consumer.needs_render());
}

/// Without a comparator, every consumer with any observed bit updates.
#[test]
fn default_comparator_updates_every_observer() {
    let ctx = create_context(0u32);
    let mut provider = ctx.provider(0);

    let mut consumers: Vec<_> = [None, Some(0b1), Some(1 << 29)]
        .into_iter()
        .map(|bits| {
            let mut consumer = ctx
                .consumer(Some(provider.broadcaster()))
                .with_observed_bits(bits);
            consumer.on_attach();
            consumer
        })
        .collect();

    let outcome = provider.on_config_change(1);
    assert_eq!(outcome.changed_bits(), MAX_SIGNED_31_BIT_INT);

    for consumer in &mut consumers {
        assert!(consumer.take_render_request());
        assert_eq!(consumer.value(), 1);
    }
}

/// Consumers only see changes to the aspects they observe.
#[test]
fn consumers_filter_by_observed_bits() {
    let ctx = create_context_with(Theme { color: 0, font: 0 }, theme_bits);
    let mut provider = ctx.provider(Theme { color: 0, font: 0 });

    let mut color = ctx
        .consumer(Some(provider.broadcaster()))
        .with_observed_bits(Some(COLOR));
    let mut font = ctx
        .consumer(Some(provider.broadcaster()))
        .with_observed_bits(Some(FONT));
    color.on_attach();
    font.on_attach();

    provider.on_config_change(Theme { color: 1, font: 0 });
    assert!(color.take_render_request());
    assert!(!font.needs_render());
    assert_eq!(font.value(), Theme { color: 0, font: 0 });

    provider.on_config_change(Theme { color: 1, font: 4 });
    assert!(!color.needs_render());
    assert!(font.take_render_request());
    assert_eq!(font.value(), Theme { color: 1, font: 4 });
}

/// Out-of-range comparator results are masked, not rejected.
#[test]
fn truncated_bits_are_masked() {
    let ctx = create_context_with(0i32, |_: &i32, _: &i32| 1i64 << 31)
        .with_config(ContextConfig::default().with_diagnostics(true));
    let mut provider = ctx.provider(0);
    let mut consumer = ctx.consumer(Some(provider.broadcaster()));
    consumer.on_attach();

    let outcome = provider.on_config_change(1);
    assert!(outcome.truncated());
    assert_eq!(
        outcome.changed_bits(),
        ((1i64 << 31) & i64::from(MAX_SIGNED_31_BIT_INT)) as u32
    );
    assert!(!consumer.needs_render());
    assert_eq!(*provider.value(), 1);
}

/// A consumer with no provider above it reads the default forever.
#[test]
fn orphan_consumer_reads_default() {
    let ctx = create_context("default".to_string());
    let other = create_context("other".to_string());

    let mut tree = ContextTree::new();
    let root = tree.add_root();
    let leaf = tree.add_child(root).unwrap();

    let mut unrelated = other.provider("provided".to_string());
    unrelated.on_attach(&mut tree, root);

    let mut consumer = ctx.consumer_in(&tree, leaf);
    consumer.on_attach();

    assert!(!consumer.has_provider());
    assert!(!consumer.is_subscribed());
    assert_eq!(unrelated.listener_count(), 0);
    assert_eq!(consumer.render_with(|v| v), "default");
}

/// After detach, provider updates no longer reach the consumer.
#[test]
fn detached_consumer_stops_updating() {
    let ctx = create_context(0);
    let mut provider = ctx.provider(0);
    let mut consumer = ctx.consumer(Some(provider.broadcaster()));
    consumer.on_attach();

    let renders = Rc::new(Cell::new(0));

    provider.on_config_change(1);
    if consumer.take_render_request() {
        renders.set(renders.get() + 1);
    }

    consumer.on_detach();
    provider.on_config_change(2);
    provider.on_config_change(3);
    if consumer.take_render_request() {
        renders.set(renders.get() + 1);
    }

    assert_eq!(renders.get(), 1);
    assert_eq!(consumer.value(), 1);
    assert_eq!(provider.listener_count(), 0);
}

/// A listener that unsubscribes a later listener mid-pass skips it.
#[test]
fn reentrant_unsubscribe_is_safe() {
    let broadcast = Rc::new(Broadcast::new(0));
    let calls = Rc::new(RefCell::new(Vec::new()));
    let victim = Rc::new(Cell::new(None));

    let broadcast_clone = broadcast.clone();
    let victim_clone = victim.clone();
    let calls_clone = calls.clone();
    broadcast.subscribe(move |_: &i32, _| {
        calls_clone.borrow_mut().push("first");
        if let Some(id) = victim_clone.take() {
            broadcast_clone.unsubscribe(id);
        }
    });

    let calls_clone = calls.clone();
    let id = broadcast.subscribe(move |_: &i32, _| calls_clone.borrow_mut().push("second"));
    victim.set(Some(id));

    let calls_clone = calls.clone();
    broadcast.subscribe(move |_: &i32, _| calls_clone.borrow_mut().push("third"));

    broadcast.set_state(1, 1);
    assert_eq!(*calls.borrow(), vec!["first", "third"]);
}

/// Subscription ids keep increasing across unsubscribes.
#[test]
fn subscription_ids_are_monotonic() {
    let broadcast = Broadcast::new(0);
    let mut last = 0;

    for _ in 0..5 {
        let id = broadcast.subscribe(|_: &i32, _| {});
        assert!(id.raw() > last);
        last = id.raw();
        broadcast.unsubscribe(id);
    }
}

/// Nested providers of one context shadow each other; the render queue
/// collects exactly the consumers that need work.
#[test]
fn nested_providers_and_render_queue() {
    let ctx = create_context(0);
    let queue = RenderQueue::new();

    let mut tree = ContextTree::new();
    let root = tree.add_root();
    let outer_leaf = tree.add_child(root).unwrap();
    let inner = tree.add_child(root).unwrap();
    let inner_leaf = tree.add_child(inner).unwrap();

    let mut outer_provider = ctx.provider(1);
    outer_provider.on_attach(&mut tree, root);
    let mut inner_provider = ctx.provider(100);
    inner_provider.on_attach(&mut tree, inner);

    let mut outer_consumer = ctx
        .consumer_in(&tree, outer_leaf)
        .with_render_queue(queue.clone(), outer_leaf);
    let mut inner_consumer = ctx
        .consumer_in(&tree, inner_leaf)
        .with_render_queue(queue.clone(), inner_leaf);
    outer_consumer.on_attach();
    inner_consumer.on_attach();

    assert_eq!(outer_consumer.value(), 1);
    assert_eq!(inner_consumer.value(), 100);

    outer_provider.on_config_change(2);
    assert_eq!(queue.drain(), vec![outer_leaf]);

    inner_provider.on_config_change(200);
    outer_provider.on_config_change(3);
    assert_eq!(queue.drain(), vec![inner_leaf, outer_leaf]);

    let rendered = inner_consumer
        .render(RenderChildren::Single(|v: i32| v.to_string()))
        .unwrap();
    assert_eq!(rendered, "200");
}

/// Hosts can read and listen through a provider's handle, and the handle
/// goes quiet once the provider is gone.
#[test]
fn broadcaster_handle_is_read_only() {
    let ctx = create_context(0);
    let mut provider = ctx.provider(0);
    let handle = provider.broadcaster();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    let id = handle
        .subscribe(move |value: &i32, bits| seen_clone.borrow_mut().push((*value, bits)))
        .unwrap();

    provider.on_config_change(5);
    assert_eq!(handle.get_state(), Some(5));
    assert_eq!(*seen.borrow(), vec![(5, MAX_SIGNED_31_BIT_INT)]);

    handle.unsubscribe(id);
    assert_eq!(provider.listener_count(), 0);

    drop(provider);
    assert_eq!(handle.get_state(), None);
    assert!(handle.subscribe(|_: &i32, _| {}).is_none());
}

/// Attaching to a node that is not in the tree leaves the provider
/// invisible and unmounted.
#[test]
fn provider_attach_requires_known_node() {
    let ctx = create_context(0);
    let mut tree = ContextTree::new();
    let root = tree.add_root();
    let leaf = tree.add_child(root).unwrap();
    tree.remove_node(leaf);

    let mut provider = ctx.provider(3);
    assert!(!provider.on_attach(&mut tree, leaf));
    assert_eq!(provider.lifecycle(), Lifecycle::Constructed);
    assert!(!ctx.consumer_in(&tree, root).has_provider());
}
