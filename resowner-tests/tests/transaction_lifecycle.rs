//! Whole transaction flows, driven the way a transaction manager would.

use eyre::Result;
use resowner::{Buffer, ReleasePhase, ResourceKind, ResourceTracker};
use resowner_tests::{capture_logs, open_relation, pin, search_catcache, Event, MockBackend};

#[test]
fn committed_subtransaction_hands_live_portal_to_parent() -> Result<()> {
    let mut tracker = ResourceTracker::default();
    let mut backend = MockBackend::new();

    let top = tracker.create_owner(None, "TopTransaction");
    tracker.set_top_transaction_owner(Some(top));
    tracker.set_cur_transaction_owner(Some(top));

    let sub = tracker.create_owner(Some(top), "SubTransaction");
    tracker.set_cur_transaction_owner(Some(sub));
    let portal = tracker.create_owner(Some(sub), "Portal");
    let cursor_pin = pin(&mut tracker, portal, 12);

    // work done directly in the subtransaction, cleaned up properly
    tracker.set_current_owner(Some(sub));
    let rel = open_relation(&mut tracker, sub, 16384);
    tracker.forget(sub, rel);

    // subtransaction commit: the open cursor survives into the parent
    tracker.reparent(portal, Some(top));
    let (result, logs) = capture_logs(|| {
        for phase in ReleasePhase::ALL {
            tracker.release(sub, phase, true, false, &mut backend.collaborators())?;
        }
        Ok::<_, resowner::TrackerError>(())
    });
    result?;
    assert!(logs.warnings().is_empty());
    assert!(backend.journal.events().contains(&Event::ReassignLocks { owner: sub, parent: top }));

    tracker.set_current_owner(Some(top));
    tracker.set_cur_transaction_owner(Some(top));
    tracker.delete_owner(sub);
    assert!(tracker.exists(portal));
    assert_eq!(tracker.held::<Buffer>(portal), &[cursor_pin]);

    // top-level commit with the cursor still open: warned about, then released
    backend.journal.take();
    tracker.set_current_owner(None);
    let (result, logs) =
        capture_logs(|| tracker.release_all_phases(top, true, true, &mut backend.collaborators()));
    result?;
    assert_eq!(logs.count("buffer refcount leak: [012]"), 1);
    assert_eq!(
        backend.journal.count(|e| matches!(e, Event::ReleaseAllLocks { is_commit: true })),
        1
    );

    tracker.delete_owner(top);
    assert_eq!(tracker.owner_count(), 0);
    assert_eq!(tracker.top_transaction_owner(), None);
    Ok(())
}

#[test]
fn aborted_subtransaction_cleans_up_quietly() -> Result<()> {
    let mut tracker = ResourceTracker::default();
    let mut backend = MockBackend::new();

    let top = tracker.create_owner(None, "TopTransaction");
    tracker.set_top_transaction_owner(Some(top));
    let top_tuple = search_catcache(&mut tracker, top, 5, 1);

    let sub = tracker.create_owner(Some(top), "SubTransaction");
    tracker.set_current_owner(Some(sub));
    pin(&mut tracker, sub, 1);
    pin(&mut tracker, sub, 2);
    open_relation(&mut tracker, sub, 2619);
    search_catcache(&mut tracker, sub, 5, 2);

    // error raised; abort the subtransaction
    let (result, logs) = capture_logs(|| {
        tracker.release_all_phases(sub, false, false, &mut backend.collaborators())
    });
    result?;

    assert!(logs.warnings().is_empty());
    assert!(tracker.counts(sub).values().all(|&n| n == 0));
    assert!(backend.journal.events().contains(&Event::ReleaseLocks { owner: sub }));
    assert_eq!(tracker.current_owner(), Some(sub));

    tracker.set_current_owner(Some(top));
    tracker.delete_owner(sub);

    // the parent's own references were never touched
    assert_eq!(tracker.counts(top)[ResourceKind::CatCacheTuple], 1);
    tracker.forget(top, top_tuple);
    tracker.set_current_owner(None);
    tracker.release_all_phases(top, true, true, &mut backend.collaborators())?;
    tracker.delete_owner(top);
    Ok(())
}
