//! Remember / forget bookkeeping through the public tracker API.

use resowner::{
    Buffer, CatCacheListRef, CatCacheTupleRef, RelationRef, ResourceKind, ResourceTracker,
    TrackerConfig, TrackerError,
};
use resowner_tests::{open_relation, pin, search_catcache, search_catcache_list};

#[test]
fn remember_then_forget_round_trips() {
    let mut tracker = ResourceTracker::default();
    let owner = tracker.create_owner(None, "Portal");
    let held = [pin(&mut tracker, owner, 1), pin(&mut tracker, owner, 2), pin(&mut tracker, owner, 3)];
    let before = tracker.counts(owner);

    let extra = pin(&mut tracker, owner, 99);
    assert_eq!(tracker.counts(owner)[ResourceKind::Buffer], 4);
    tracker.forget_buffer(Some(owner), extra);

    assert_eq!(tracker.counts(owner), before);
    let mut remaining = tracker.held::<Buffer>(owner).to_vec();
    remaining.sort();
    assert_eq!(remaining, held);
}

#[test]
fn forgetting_one_of_two_keeps_the_other() {
    for (first, second) in [(1, 2), (2, 1)] {
        let mut tracker = ResourceTracker::default();
        let owner = tracker.create_owner(None, "Portal");
        let h1 = open_relation(&mut tracker, owner, first);
        let h2 = open_relation(&mut tracker, owner, second);

        tracker.forget(owner, h1);
        assert_eq!(tracker.held::<RelationRef>(owner), &[h2]);
    }
}

#[test]
fn reverse_order_forget_only_pops_the_tail() {
    let mut tracker = ResourceTracker::default();
    let owner = tracker.create_owner(None, "Portal");
    let tuples: Vec<CatCacheTupleRef> =
        (0..50).map(|i| search_catcache(&mut tracker, owner, 11, i)).collect();

    for (i, tuple) in tuples.iter().enumerate().rev() {
        assert_eq!(tracker.held::<CatCacheTupleRef>(owner).last(), Some(tuple));
        tracker.forget(owner, *tuple);
        // nothing below the removed entry moved
        assert_eq!(tracker.held::<CatCacheTupleRef>(owner), &tuples[..i]);
    }
}

#[test]
fn forget_from_the_middle_compacts() {
    let mut tracker = ResourceTracker::default();
    let owner = tracker.create_owner(None, "Portal");
    let lists: Vec<CatCacheListRef> =
        (0..5).map(|i| search_catcache_list(&mut tracker, owner, 3, i)).collect();

    tracker.forget(owner, lists[0]);
    tracker.forget(owner, lists[3]);
    assert_eq!(tracker.held::<CatCacheListRef>(owner), &[lists[1], lists[2], lists[4]]);
}

#[test]
fn registries_are_independent_per_kind_and_owner() {
    let mut tracker = ResourceTracker::default();
    let a = tracker.create_owner(None, "a");
    let b = tracker.create_owner(None, "b");
    pin(&mut tracker, a, 1);
    open_relation(&mut tracker, a, 1);
    search_catcache(&mut tracker, b, 1, 1);

    let counts_a = tracker.counts(a);
    assert_eq!(counts_a[ResourceKind::Buffer], 1);
    assert_eq!(counts_a[ResourceKind::Relation], 1);
    assert_eq!(counts_a[ResourceKind::CatCacheTuple], 0);
    assert_eq!(tracker.counts(b)[ResourceKind::CatCacheTuple], 1);
    assert_eq!(tracker.counts(b)[ResourceKind::Buffer], 0);
}

#[test]
fn capacity_starts_at_sixteen_and_doubles() {
    let mut tracker = ResourceTracker::default();
    let owner = tracker.create_owner(None, "Portal");
    assert_eq!(tracker.capacity::<Buffer>(owner), 0);

    for i in 0..16 {
        pin(&mut tracker, owner, i);
    }
    assert_eq!(tracker.capacity::<Buffer>(owner), 16);

    pin(&mut tracker, owner, 16);
    assert_eq!(tracker.capacity::<Buffer>(owner), 32);
    assert!(tracker.counts(owner)[ResourceKind::Buffer] <= tracker.capacity::<Buffer>(owner));
}

#[test]
fn enlarge_failure_is_reported_before_anything_is_recorded() {
    let config = TrackerConfig { initial_capacity: usize::MAX, ..TrackerConfig::default() };
    let mut tracker = ResourceTracker::new(config);
    let owner = tracker.create_owner(None, "Portal");

    let err = tracker.enlarge_buffers(Some(owner)).unwrap_err();
    match err {
        TrackerError::OutOfMemory { kind, requested, .. } => {
            assert_eq!(kind, ResourceKind::Buffer);
            assert_eq!(requested, usize::MAX);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(tracker.capacity::<Buffer>(owner), 0);
    assert_eq!(tracker.counts(owner)[ResourceKind::Buffer], 0);
}

#[test]
fn buffers_outside_any_owner_are_untracked() {
    let mut tracker = ResourceTracker::default();
    let owner = tracker.create_owner(None, "Portal");

    tracker.enlarge_buffers(None).unwrap();
    tracker.remember_buffer(None, Buffer(5));
    tracker.forget_buffer(None, Buffer(5));
    assert_eq!(tracker.counts(owner)[ResourceKind::Buffer], 0);
}

#[test]
#[should_panic(expected = "relcache reference relation 42 is not owned by resource owner \"Portal\"")]
fn double_forget_is_fatal() {
    let mut tracker = ResourceTracker::default();
    let owner = tracker.create_owner(None, "Portal");
    let rel = open_relation(&mut tracker, owner, 42);
    tracker.forget(owner, rel);
    tracker.forget(owner, rel);
}
