//! Session registration, thread binding and store lifecycle.

use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread;
use transidb_core::{ChangeFeed, CoreError, SessionStatus, StoreConfig};
use transidb_storage::{PersistentStore, PropertyValue};
use transidb_testkit::prelude::*;

#[test]
fn one_session_per_thread() {
    let ts = TestStore::new();
    let main = ts.begin_session().unwrap();
    assert!(Arc::ptr_eq(&main, &ts.begin_session().unwrap()));

    let store = ts.store.clone();
    let other = thread::spawn(move || store.begin_session().unwrap().id())
        .join()
        .unwrap();

    assert_ne!(main.id(), other);
    assert_eq!(ts.sessions_count(), 2);
}

#[test]
fn suspended_session_resumes_on_another_thread() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    create_project(&session, "moved").unwrap();

    let suspended = ts.suspend_thread_session().unwrap().unwrap();
    assert!(Arc::ptr_eq(&session, &suspended));
    assert!(ts.thread_session().is_none());
    assert_eq!(ts.sessions_count(), 1);

    let store = ts.store.clone();
    thread::spawn(move || {
        store.resume_session(Some(&suspended)).unwrap();
        assert_eq!(store.thread_session().unwrap().id(), suspended.id());
        suspended.commit().unwrap();
        assert!(store.thread_session().is_none());
    })
    .join()
    .unwrap();

    assert_eq!(ts.sessions_count(), 0);
    assert_eq!(ts.memory.entity_count(), 1);
    assert_eq!(session.status(), SessionStatus::Committed);
}

#[test]
fn suspend_without_session_returns_none() {
    let ts = TestStore::new();
    assert!(ts.suspend_thread_session().unwrap().is_none());
}

/// Collects formatted log output.
#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn close_warns_with_leaked_session_backtraces() {
    let ts = TestStore::with_config(StoreConfig::new().track_session_creation(true));
    let live = ts.begin_session().unwrap();

    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || ts.close());

    let output = String::from_utf8(log.0.lock().clone()).unwrap();
    assert!(output
        .lines()
        .any(|line| line.contains("WARN") && line.contains("leaked session created at:")));
    assert!(!output
        .lines()
        .any(|line| line.contains("DEBUG") && line.contains("leaked session")));
    live.abort().unwrap();
}

#[test]
fn close_leaves_live_sessions_usable() {
    init_test_logging();
    let ts = TestStore::with_config(StoreConfig::new().track_session_creation(true));
    let live = ts.begin_session().unwrap();
    assert!(live.creation_backtrace().is_some());
    create_project(&live, "late").unwrap();

    ts.close();
    assert!(!ts.is_open());
    assert!(matches!(ts.begin_session(), Err(CoreError::StoreClosed)));
    assert!(matches!(
        ts.resume_session(Some(&live)),
        Err(CoreError::StoreClosed)
    ));

    assert_eq!(ts.sessions_count(), 1);
    live.commit().unwrap();
    assert_eq!(ts.sessions_count(), 0);
    assert_eq!(ts.memory.entity_count(), 1);
}

#[test]
fn close_disconnects_change_feed() {
    let ts = TestStore::new();
    let feed = Arc::new(ChangeFeed::new());
    ts.set_events_multiplexer(Some(feed.clone()));
    let receiver = feed.subscribe();

    ts.close();
    assert_eq!(feed.subscriber_count(), 0);
    assert!(receiver.recv().is_err());
}

#[test]
fn readonly_session_rejects_mutations() {
    let ts = TestStore::new();
    let session = ts.begin_readonly_transaction().unwrap();
    assert!(matches!(
        session.new_entity("Project"),
        Err(CoreError::ReadonlySession { .. })
    ));
    session.commit().unwrap();
    assert_eq!(ts.sessions_count(), 0);
    assert_eq!(ts.stats().flushes(), 0);
}

#[test]
fn finished_session_is_inactive() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    let project = create_project(&session, "core").unwrap();
    session.commit().unwrap();

    assert!(matches!(
        session.get_property(&project, "name"),
        Err(CoreError::SessionNotActive { .. })
    ));
    assert!(matches!(
        session.commit(),
        Err(CoreError::SessionNotActive { .. })
    ));
    assert!(matches!(
        session.abort(),
        Err(CoreError::SessionNotActive { .. })
    ));
}

#[test]
fn reads_see_pending_changes() {
    let ts = TestStore::new();
    let session = ts.begin_session().unwrap();
    let project = create_project(&session, "core").unwrap();
    session.commit().unwrap();
    let id = project.persistent_id().unwrap();

    let session = ts.begin_session().unwrap();
    let project = session.entity(id).unwrap();
    session
        .set_property(&project, "name", Some(PropertyValue::from("renamed")))
        .unwrap();

    assert_eq!(
        string_property(&session, &project, "name").unwrap().as_deref(),
        Some("renamed")
    );
    assert_eq!(
        ts.memory.get_property(id, "name").unwrap(),
        Some(PropertyValue::from("core"))
    );

    session.abort().unwrap();
    assert_eq!(
        ts.memory.get_property(id, "name").unwrap(),
        Some(PropertyValue::from("core"))
    );
}

#[test]
fn unsaved_entity_of_another_session_cannot_be_attached() {
    let ts = TestStore::new();
    let writer = ts.begin_session().unwrap();
    let project = create_project(&writer, "draft").unwrap();

    let reader = ts.begin_readonly_transaction().unwrap();
    assert!(matches!(
        reader.get_property(&project, "name"),
        Err(CoreError::ForeignSessionEntity { .. })
    ));
    reader.commit().unwrap();

    ts.resume_session(Some(&writer)).unwrap();
    writer.commit().unwrap();

    let reader = ts.begin_readonly_transaction().unwrap();
    let attached = reader.reattach(&project).unwrap();
    assert_eq!(attached.session_id(), reader.id());
    assert_eq!(attached, project);
    reader.commit().unwrap();
}

#[test]
fn stats_follow_session_lifecycle() {
    let ts = TestStore::new();

    let session = ts.begin_session().unwrap();
    create_project(&session, "one").unwrap();
    session.commit().unwrap();

    let session = ts.begin_session().unwrap();
    create_project(&session, "two").unwrap();
    session.abort().unwrap();

    let stats = ts.stats().snapshot();
    assert_eq!(stats.sessions_begun, 2);
    assert_eq!(stats.sessions_committed, 1);
    assert_eq!(stats.sessions_aborted, 1);
    assert_eq!(stats.flushes, 1);
    assert_eq!(ts.memory.entity_count(), 1);
}

#[test]
fn transactional_reuses_the_thread_session() {
    let ts = TestStore::new();
    let outer = ts.begin_session().unwrap();

    ts.transactional(false, |session| {
        assert_eq!(session.id(), outer.id());
        create_project(session, "nested").map(|_| ())
    })
    .unwrap();

    assert!(outer.is_open());
    assert!(outer.has_changes());
    assert_eq!(ts.memory.entity_count(), 0);

    ts.transactional(true, |session| {
        assert!(session.is_readonly());
        Ok(())
    })
    .unwrap();
    assert_eq!(ts.thread_session().unwrap().id(), outer.id());

    outer.commit().unwrap();
    assert_eq!(ts.memory.entity_count(), 1);
}

#[test]
fn writable_transactional_does_not_reuse_a_readonly_session() {
    let ts = TestStore::new();
    let reader = ts.begin_readonly_transaction().unwrap();

    ts.transactional(false, |session| {
        assert!(!session.is_readonly());
        assert_ne!(session.id(), reader.id());
        create_project(session, "written").map(|_| ())
    })
    .unwrap();

    assert_eq!(ts.memory.entity_count(), 1);
    assert_eq!(ts.thread_session().unwrap().id(), reader.id());
    reader.commit().unwrap();
}
