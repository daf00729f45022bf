//! The flush lock admits waiting flushes in arrival order.

use parking_lot::Mutex;
use std::thread;
use std::time::Duration;
use transidb_testkit::prelude::*;

#[test]
fn waiters_enter_in_arrival_order() {
    let ts = TestStore::new();
    let order = Mutex::new(Vec::new());

    let gate = ts.flush_lock().lock();
    thread::scope(|scope| {
        for i in 0..4 {
            let (store, order) = (&ts.store, &order);
            scope.spawn(move || {
                let _gate = store.flush_lock().lock();
                order.lock().push(i);
            });
            thread::sleep(Duration::from_millis(50));
        }
        drop(gate);
    });

    assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
}

#[test]
fn concurrent_flushes_serialize() {
    init_test_logging();
    let ts = TestStore::new();
    let config = StressConfig {
        threads: 8,
        sessions_per_thread: 25,
        entities_per_session: 2,
    };

    let result = stress_concurrent_sessions(&ts, &config);
    assert_eq!(result.failed_ops, 0);
    assert_eq!(result.successful_ops, 200);
    assert_eq!(ts.memory.entity_count(), 400);
    assert_eq!(ts.memory.commit_count(), 200);
    assert_eq!(ts.sessions_count(), 0);

    assert_eq!(stress_flush_gate(&ts, &config), 1);
}

#[test]
fn waiting_session_flushes_after_the_holder() {
    let ts = TestStore::new();
    let gate = ts.flush_lock().lock();

    thread::scope(|scope| {
        let store = &ts.store;
        let waiter = scope.spawn(move || {
            let session = store.begin_session().unwrap();
            create_project(&session, "queued").unwrap();
            session.commit().unwrap();
        });
        thread::sleep(Duration::from_millis(50));
        assert_eq!(ts.memory.entity_count(), 0);
        drop(gate);
        waiter.join().unwrap();
    });

    assert_eq!(ts.memory.entity_count(), 1);
}
