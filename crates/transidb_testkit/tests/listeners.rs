//! Listener dispatch and the change feed.

use parking_lot::Mutex;
use std::sync::Arc;
use transidb_core::{
    ChangeEvent, ChangeFeed, ChangeType, EventsMultiplexer, SessionListener, TransientEntityStore,
    TransientSession,
};
use transidb_storage::PropertyValue;
use transidb_testkit::prelude::*;

fn commit_project(ts: &TestStore, name: &str) {
    let session = ts.begin_session().unwrap();
    create_project(&session, name).unwrap();
    session.commit().unwrap();
}

#[test]
fn higher_priorities_fire_first() {
    let ts = TestStore::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    for (tag, priority) in [("5a", 5), ("1", 1), ("5b", 5), ("0", 0)] {
        let listener = Arc::new(RecordingListener::with_log(tag, log.clone()));
        ts.add_listener_with_priority(listener, priority);
    }
    assert_eq!(ts.listener_count(), 4);

    commit_project(&ts, "core");

    let probe = RecordingListener::with_log("probe", log);
    assert_eq!(probe.flushed_tags(), vec!["5a", "5b", "1", "0"]);
}

#[test]
fn removed_listener_is_not_notified() {
    let ts = TestStore::new();
    let recording = Arc::new(RecordingListener::new("gone"));
    let listener: Arc<dyn SessionListener> = recording.clone();
    ts.add_listener(listener.clone());

    commit_project(&ts, "first");
    assert!(ts.remove_listener(&listener));
    assert!(!ts.remove_listener(&listener));
    commit_project(&ts, "second");

    assert_eq!(recording.flushed_tags(), vec!["gone"]);
    assert_eq!(ts.listener_count(), 0);
}

#[test]
fn change_feed_describes_each_flush() {
    let ts = TestStore::new();
    let feed = Arc::new(ChangeFeed::new());
    ts.set_events_multiplexer(Some(feed.clone()));
    let receiver = feed.subscribe();

    let session = ts.begin_session().unwrap();
    let project = create_project(&session, "core").unwrap();
    let issue = create_issue(&session, &ts.links, &project, "bug").unwrap();
    session.commit().unwrap();

    let first = receiver.recv().unwrap();
    assert_eq!(first.changes.len(), 2);
    assert_eq!(first.changes[0].entity, project);
    assert_eq!(first.changes[0].change_type, ChangeType::Insert);
    assert!(first.changes[0].has_property_changed("name"));
    assert!(first.changes[0].has_link_changed("issues"));
    assert_eq!(first.changes[1].entity, issue);
    assert!(first.changes[1].has_link_changed("project"));

    let session = ts.begin_session().unwrap();
    session
        .set_property(&project, "name", Some(PropertyValue::from("renamed")))
        .unwrap();
    session.delete_entity(&issue).unwrap();
    session.commit().unwrap();

    let second = receiver.recv().unwrap();
    assert!(second.sequence > first.sequence);
    let types: Vec<ChangeType> = second.changes.iter().map(|c| c.change_type).collect();
    assert_eq!(types, vec![ChangeType::Update, ChangeType::Delete]);
    assert!(!second.changes[0].has_property_changed("summary"));
    assert_eq!(feed.latest_sequence(), second.sequence);
}

/// Reads every changed entity back through the session.
struct Reader {
    names: Mutex<Vec<Option<String>>>,
}

impl SessionListener for Reader {
    fn before_flush(&self, session: &TransientSession, changes: &[ChangeEvent]) {
        for change in changes {
            let name = string_property(session, &change.entity, "name").unwrap();
            self.names.lock().push(name);
        }
    }

    fn flushed(&self, session: &TransientSession, _changes: &[ChangeEvent]) {
        assert!(!session.has_changes());
    }
}

#[test]
fn listeners_can_read_the_flushing_session() {
    let ts = TestStore::new();
    let reader = Arc::new(Reader {
        names: Mutex::new(Vec::new()),
    });
    ts.add_listener(reader.clone());

    commit_project(&ts, "core");
    assert_eq!(*reader.names.lock(), vec![Some("core".to_string())]);
}

/// Registers another listener the first time it is told about a flush.
struct Spawner {
    late: Arc<RecordingListener>,
    spawned: Mutex<bool>,
}

impl SessionListener for Spawner {
    fn flushed(&self, session: &TransientSession, _changes: &[ChangeEvent]) {
        let mut spawned = self.spawned.lock();
        if !*spawned {
            session.store().add_listener(self.late.clone());
            *spawned = true;
        }
    }
}

#[test]
fn listener_added_during_dispatch_sees_later_flushes() {
    let ts = TestStore::new();
    let late = Arc::new(RecordingListener::new("late"));
    ts.add_listener_with_priority(
        Arc::new(Spawner {
            late: late.clone(),
            spawned: Mutex::new(false),
        }),
        10,
    );

    commit_project(&ts, "first");
    assert!(late.recorded().is_empty());

    commit_project(&ts, "second");
    assert_eq!(late.flushed_tags(), vec!["late"]);
}

/// Records what the store told it, in order, into a shared log.
struct Multiplexer {
    log: Arc<Mutex<Vec<Recorded>>>,
    closed: Mutex<bool>,
}

impl EventsMultiplexer for Multiplexer {
    fn on_close(&self, _store: &TransientEntityStore) {
        *self.closed.lock() = true;
    }

    fn flushed(&self, _session: &TransientSession, changes: &[ChangeEvent]) {
        self.log
            .lock()
            .push(Recorded::Flushed("multiplexer".to_string(), changes.len()));
    }
}

#[test]
fn multiplexer_runs_after_listeners() {
    let ts = TestStore::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    ts.add_listener(Arc::new(RecordingListener::with_log("listener", log.clone())));
    let multiplexer = Arc::new(Multiplexer {
        log: log.clone(),
        closed: Mutex::new(false),
    });
    ts.set_events_multiplexer(Some(multiplexer.clone()));

    commit_project(&ts, "core");
    ts.close();

    let probe = RecordingListener::with_log("probe", log);
    assert_eq!(probe.flushed_tags(), vec!["listener", "multiplexer"]);
    assert!(*multiplexer.closed.lock());
}

#[test]
fn readonly_and_empty_sessions_do_not_notify() {
    let ts = TestStore::new();
    let listener = Arc::new(RecordingListener::new("quiet"));
    ts.add_listener(listener.clone());

    let session = ts.begin_readonly_transaction().unwrap();
    session.commit().unwrap();
    let session = ts.begin_session().unwrap();
    session.commit().unwrap();

    assert!(listener.recorded().is_empty());
}
