//! Writer exclusion, snapshot isolation and cross-handle identities.

use objdb_core::{Config, CoreError, Store};
use objdb_testkit::prelude::*;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn identity_from_another_handle_must_be_resolved() {
    let store = TestStore::memory();
    let a = store.handle();
    let b = store.handle();
    let person = populate_people(&a, &[30]).unwrap()[0];

    let err = b.get(person, "age").unwrap_err();
    assert!(matches!(err, CoreError::ForeignHandle { .. }), "{err}");

    let local = b.resolve(person).unwrap().expect("person is committed");
    assert_eq!(b.get_int(local, "age").unwrap(), 30);
    assert_eq!(local.key(), person.key());
}

#[test]
fn uncommitted_object_does_not_resolve_elsewhere() {
    let store = TestStore::memory();
    let a = store.handle();
    let b = store.handle();

    a.begin_write().unwrap();
    let person = add_person(&a, "Pending", 1, None).unwrap();
    assert_eq!(b.resolve(person).unwrap(), None);
    a.commit().unwrap();
    assert!(b.resolve(person).unwrap().is_some());
}

#[test]
fn second_writer_times_out_while_slot_is_held() {
    let store = TestStore::memory();
    let a = store.handle();
    let b = store.handle();

    a.begin_write().unwrap();
    let started = Instant::now();
    let err = b.begin_write_timeout(Duration::from_millis(50)).unwrap_err();
    assert!(err.is_transaction());
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(store.is_write_active());

    a.rollback().unwrap();
    b.begin_write_timeout(Duration::from_millis(50)).unwrap();
    b.rollback().unwrap();
}

#[test]
fn configured_timeout_applies_to_begin_write() {
    let config = Config::default().write_timeout(Some(Duration::from_millis(20)));
    let store = Store::open_with_backend(sample_schema(), config, Box::new(objdb_storage::InMemoryBackend::new()))
        .unwrap();
    let a = store.handle();
    let b = store.handle();

    a.begin_write().unwrap();
    assert!(b.begin_write().unwrap_err().is_transaction());
}

#[test]
fn blocked_writer_proceeds_after_commit() {
    let store = TestStore::memory();
    let a = store.handle();
    a.begin_write().unwrap();
    add_person(&a, "First", 1, None).unwrap();

    let (ready_tx, ready_rx) = mpsc::channel();
    let other = store.store.clone();
    let waiter = thread::spawn(move || {
        let h = other.handle();
        ready_tx.send(()).unwrap();
        h.write(|h| {
            // the first commit is visible once the slot is ours
            let seen = h.count("Person")?;
            add_person(h, "Second", 2, None)?;
            Ok(seen)
        })
        .unwrap()
    });

    ready_rx.recv().unwrap();
    thread::sleep(Duration::from_millis(20));
    a.commit().unwrap();

    assert_eq!(waiter.join().unwrap(), 1);
    assert_eq!(a.count("Person").unwrap(), 2);
}

#[test]
fn readers_keep_their_snapshot_until_next_read() {
    let store = TestStore::memory();
    let writer = store.handle();
    let reader = store.handle();
    populate_people(&writer, &[10, 20]).unwrap();

    let before = reader.query("Person").unwrap().find_all().unwrap();
    populate_people(&writer, &[30]).unwrap();

    assert_eq!(before.len(), 2);
    assert_eq!(reader.count("Person").unwrap(), 3);
}

#[test]
fn nested_begin_on_same_handle_is_rejected() {
    let store = TestStore::memory();
    let h = store.handle();
    h.begin_write().unwrap();
    assert!(h.begin_write().unwrap_err().is_transaction());
    h.rollback().unwrap();
    assert!(h.rollback().unwrap_err().is_transaction());
}

#[test]
fn closed_handle_releases_the_writer_slot() {
    let store = TestStore::memory();
    let a = store.handle();
    let b = store.handle();

    a.begin_write().unwrap();
    add_person(&a, "Abandoned", 1, None).unwrap();
    a.close();

    assert!(matches!(a.count("Person"), Err(CoreError::StoreClosed)));
    b.begin_write_timeout(Duration::from_millis(50)).unwrap();
    assert_eq!(b.count("Person").unwrap(), 0);
    b.rollback().unwrap();
}

#[test]
fn concurrent_writers_and_readers_never_see_partial_commits() {
    let store = TestStore::memory();
    let config = StressConfig {
        writers: 3,
        readers: 3,
        writes_per_thread: 40,
    };

    let result = stress_writers_and_readers(&store, &config);
    result.print_summary("writers_and_readers");

    assert_eq!(result.commits, 120);
    assert_eq!(result.failed_ops, 0);
    assert_eq!(result.torn_reads, 0);
    assert_eq!(store.handle().count("Person").unwrap(), 120);

    let store = store.reopen().unwrap();
    assert_eq!(store.committed_seq(), objdb_core::SequenceNumber(120));
    assert_eq!(store.handle().count("Dog").unwrap(), 120);
}
