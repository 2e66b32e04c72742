//! Test support for `resowner`.
//!
//! Provides recording stand-ins for every subsystem the tracker releases
//! resources into, plus a way to capture what the tracker logs. Each mock
//! appends to a shared [`Journal`], so a test can check not just *what* got
//! released but in which order, and on behalf of which owner.

use resowner::{
    Buffer, BufferManager, CatCacheListRef, CatCacheTupleRef, CatalogCache, CollabResult,
    Collaborators, IndexScanCleanup, LockManager, OwnerId, RelationCache, RelationRef,
    ReleaseInfo, ResourceTracker,
};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Something a mock collaborator was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    ReleaseBuffer { owner: OwnerId, buffer: Buffer },
    CloseRelation { owner: OwnerId, relation: RelationRef },
    ReleaseTuple { owner: OwnerId, tuple: CatCacheTupleRef },
    ReleaseList { owner: OwnerId, list: CatCacheListRef },
    ReleaseAllLocks { is_commit: bool },
    ReassignLocks { owner: OwnerId, parent: OwnerId },
    ReleaseLocks { owner: OwnerId },
    IndexScanCleanup { access_method: &'static str },
    Callback(ReleaseInfo),
}

#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("injected failure: {0}")]
    Injected(String),
}

/// Ordered record of everything the mocks were asked to do.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Event>>>);

impl Journal {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn take(&self) -> Vec<Event> {
        core::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.0.borrow().iter().filter(|e| pred(e)).count()
    }
}

#[derive(Debug, Default)]
pub struct MockBufferPool {
    journal: Journal,
    /// Releasing this buffer fails.
    pub fail_on: Option<Buffer>,
}

impl BufferManager for MockBufferPool {
    fn release_buffer(&mut self, owner: OwnerId, buffer: Buffer) -> CollabResult {
        if self.fail_on == Some(buffer) {
            return Err(MockError::Injected(format!("buffer {buffer} is corrupted")).into());
        }
        self.journal.push(Event::ReleaseBuffer { owner, buffer });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockRelationCache {
    journal: Journal,
    pub fail_on: Option<RelationRef>,
}

impl RelationCache for MockRelationCache {
    fn close_relation(&mut self, owner: OwnerId, relation: RelationRef) -> CollabResult {
        if self.fail_on == Some(relation) {
            return Err(MockError::Injected(format!("{relation} is corrupted")).into());
        }
        self.journal.push(Event::CloseRelation { owner, relation });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockCatalogCache {
    journal: Journal,
    pub fail_on_tuple: Option<CatCacheTupleRef>,
}

impl CatalogCache for MockCatalogCache {
    fn release_tuple(&mut self, owner: OwnerId, tuple: CatCacheTupleRef) -> CollabResult {
        if self.fail_on_tuple == Some(tuple) {
            return Err(MockError::Injected(format!("{tuple} is corrupted")).into());
        }
        self.journal.push(Event::ReleaseTuple { owner, tuple });
        Ok(())
    }

    fn release_list(&mut self, owner: OwnerId, list: CatCacheListRef) -> CollabResult {
        self.journal.push(Event::ReleaseList { owner, list });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockLockManager {
    journal: Journal,
    pub fail: bool,
}

impl MockLockManager {
    fn check(&self) -> CollabResult {
        if self.fail {
            return Err(MockError::Injected("lock table is corrupted".into()).into());
        }
        Ok(())
    }
}

impl LockManager for MockLockManager {
    fn release_all(&mut self, is_commit: bool) -> CollabResult {
        self.check()?;
        self.journal.push(Event::ReleaseAllLocks { is_commit });
        Ok(())
    }

    fn reassign_to_parent(&mut self, owner: OwnerId, parent: OwnerId) -> CollabResult {
        self.check()?;
        self.journal.push(Event::ReassignLocks { owner, parent });
        Ok(())
    }

    fn release_current(&mut self, owner: OwnerId) -> CollabResult {
        self.check()?;
        self.journal.push(Event::ReleaseLocks { owner });
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockIndexScan {
    journal: Journal,
    access_method: &'static str,
}

impl IndexScanCleanup for MockIndexScan {
    fn release_resources(&mut self) -> CollabResult {
        self.journal.push(Event::IndexScanCleanup { access_method: self.access_method });
        Ok(())
    }
}

/// All the mock collaborators, sharing one journal.
#[derive(Debug)]
pub struct MockBackend {
    pub journal: Journal,
    pub buffers: MockBufferPool,
    pub relations: MockRelationCache,
    pub catalog: MockCatalogCache,
    pub locks: MockLockManager,
    pub gist: MockIndexScan,
    pub hash: MockIndexScan,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        let journal = Journal::default();
        Self {
            buffers: MockBufferPool { journal: journal.clone(), fail_on: None },
            relations: MockRelationCache { journal: journal.clone(), fail_on: None },
            catalog: MockCatalogCache { journal: journal.clone(), fail_on_tuple: None },
            locks: MockLockManager { journal: journal.clone(), fail: false },
            gist: MockIndexScan { journal: journal.clone(), access_method: "gist" },
            hash: MockIndexScan { journal: journal.clone(), access_method: "hash" },
            journal,
        }
    }

    pub fn collaborators(&mut self) -> Collaborators<'_> {
        Collaborators {
            buffers: &mut self.buffers,
            relations: &mut self.relations,
            catalog: &mut self.catalog,
            locks: &mut self.locks,
            index_scans: vec![&mut self.gist, &mut self.hash],
        }
    }

    /// Register a callback on `tracker` that records every invocation in the
    /// journal.
    pub fn record_callbacks(&self, tracker: &mut ResourceTracker) -> resowner::CallbackId {
        let journal = self.journal.clone();
        tracker.register_callback(move |info| {
            journal.push(Event::Callback(*info));
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Acquisition helpers, following the enlarge / acquire / remember protocol
// ---------------------------------------------------------------------------

pub fn pin(tracker: &mut ResourceTracker, owner: OwnerId, buffer: i32) -> Buffer {
    tracker.enlarge_buffers(Some(owner)).expect("enlarge buffer array");
    let buffer = Buffer(buffer);
    tracker.remember_buffer(Some(owner), buffer);
    buffer
}

pub fn open_relation(tracker: &mut ResourceTracker, owner: OwnerId, oid: u32) -> RelationRef {
    tracker.enlarge::<RelationRef>(owner).expect("enlarge relcache array");
    let relation = RelationRef(oid);
    tracker.remember(owner, relation);
    relation
}

pub fn search_catcache(
    tracker: &mut ResourceTracker,
    owner: OwnerId,
    cache_id: u32,
    tuple: u64,
) -> CatCacheTupleRef {
    tracker.enlarge::<CatCacheTupleRef>(owner).expect("enlarge catcache array");
    let tuple = CatCacheTupleRef { cache_id, tuple };
    tracker.remember(owner, tuple);
    tuple
}

pub fn search_catcache_list(
    tracker: &mut ResourceTracker,
    owner: OwnerId,
    cache_id: u32,
    list: u64,
) -> CatCacheListRef {
    tracker.enlarge::<CatCacheListRef>(owner).expect("enlarge catcache list array");
    let list = CatCacheListRef { cache_id, list };
    tracker.remember(owner, list);
    list
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Number of lines containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.contents().lines().filter(|line| line.contains(needle)).count()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.contents().lines().filter(|line| line.contains("WARN")).map(str::to_owned).collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with everything `resowner` logs captured, and span traces enabled
/// for errors.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, CapturedLogs) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new("resowner=trace"))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(move || writer.clone()),
        )
        .with(ErrorLayer::default());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs)
}
