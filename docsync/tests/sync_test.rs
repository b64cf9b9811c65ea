mod common;

use std::sync::{Arc, Mutex};

use docsync::{
    bson::{Bson, doc},
    prelude::*,
};
use futures::{channel::oneshot, executor::block_on, join};

use common::{EventLog, builder, ids, values};

fn reject(_: SyncTarget) -> futures::future::Ready<Result<bool, BoxError>> {
    futures::future::ready(Ok(false))
}

fn fail(_: SyncTarget) -> futures::future::Ready<Result<bool, BoxError>> {
    futures::future::ready(Err(std::io::Error::other("backend down").into()))
}

fn seeded(builder: CollectionBuilder) -> Collection {
    let users = builder.index("city").build().unwrap();
    users
        .populate(vec![
            doc! { "id": "doc-a", "name": "Alice", "city": "Oslo" },
            doc! { "id": "doc-b", "name": "Bob", "city": "Rome" },
            doc! { "id": "doc-c", "name": "Carol", "city": "Oslo" },
        ])
        .unwrap();
    users
}

fn snapshot(users: &Collection) -> Vec<Record> {
    users.query(&Where::new(), &QueryOptions::new())
}

#[test]
fn test_rejected_create_leaves_store_unchanged() {
    let users = seeded(builder("users").synchronizer(WriteOp::Create, reject));
    let log = EventLog::default();
    users.on(EventKind::Create, log.handler());
    users.on(EventKind::SyncError, log.handler());
    let before = snapshot(&users);

    let err = block_on(users.create(doc! { "name": "Dave", "city": "Oslo" })).unwrap_err();

    assert!(err.is_sync());
    assert_eq!(err.as_sync().map(|err| err.op), Some(WriteOp::Create));
    assert_eq!(snapshot(&users), before);
    assert_eq!(users.count(Some(&Filter::eq("city", "Oslo"))), 2);
    assert_eq!(log.kinds(), vec![EventKind::SyncError]);

    match &log.events()[0] {
        CollectionEvent::SyncFailed { op, id, error } => {
            assert_eq!(*op, WriteOp::Create);
            assert_eq!(id, "doc-0");
            assert_eq!(error.to_string(), "synchronizer rejected the create operation");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_failed_update_keeps_cause_and_reverts() {
    let users = seeded(builder("users").synchronizer(WriteOp::Update, fail));
    let log = EventLog::default();
    users.on(EventKind::Update, log.handler());
    users.listen("doc-a", log.handler());
    let before = snapshot(&users);

    let err = block_on(users.update("doc-a", doc! { "city": "Rome" })).unwrap_err();
    let sync = err.as_sync().unwrap();

    assert_eq!(sync.op, WriteOp::Update);
    assert_eq!(sync.id, "doc-a");
    assert_eq!(sync.cause.to_string(), "backend down");
    assert_eq!(snapshot(&users), before);
    assert_eq!(users.count(Some(&Filter::eq("city", "Rome"))), 1);
    assert!(log.events().is_empty());
}

#[test]
fn test_rejected_remove_restores_position() {
    let users = seeded(builder("users").synchronizer(WriteOp::Remove, reject));
    let before = snapshot(&users);

    let err = block_on(users.remove("doc-b")).unwrap_err();

    assert_eq!(err.as_sync().map(|err| err.op), Some(WriteOp::Remove));
    assert_eq!(snapshot(&users), before);
    assert_eq!(ids(&snapshot(&users)), vec!["doc-a", "doc-b", "doc-c"]);
    assert_eq!(users.count(Some(&Filter::eq("city", "Rome"))), 1);
}

#[test]
fn test_revert_happens_before_sync_error_event() {
    let users = builder("users").synchronizer(WriteOp::Create, reject).build().unwrap();
    let observed = Arc::new(Mutex::new(None));

    let probe = users.clone();
    let seen = observed.clone();
    users.on(EventKind::SyncError, move |event| {
        if let CollectionEvent::SyncFailed { op, id, .. } = event {
            *seen.lock().unwrap() = Some((*op, probe.exists(id), probe.count(None)));
        }
    });

    assert!(block_on(users.create(doc! { "name": "Alice" })).is_err());
    assert_eq!(*observed.lock().unwrap(), Some((WriteOp::Create, false, 0)));
}

#[test]
fn test_synchronizer_receives_mutated_state() {
    let targets = Arc::new(Mutex::new(Vec::new()));
    let record_target = |targets: Arc<Mutex<Vec<SyncTarget>>>| {
        move |target: SyncTarget| {
            targets.lock().unwrap().push(target);
            futures::future::ready(Ok::<_, BoxError>(true))
        }
    };
    let users = builder("users")
        .synchronizer(WriteOp::Create, record_target(targets.clone()))
        .synchronizer(WriteOp::Update, record_target(targets.clone()))
        .synchronizer(WriteOp::Remove, record_target(targets.clone()))
        .build()
        .unwrap();

    let id = block_on(users.create(doc! { "n": 1 })).unwrap();
    block_on(users.update(&id, doc! { "n": 2 })).unwrap();
    block_on(users.remove(&id)).unwrap();

    let targets = targets.lock().unwrap();
    assert_eq!(targets.len(), 3);
    assert_eq!(targets[0].document().map(|r| r.fields().clone()), Some(doc! { "n": 1 }));
    assert_eq!(targets[1].document().map(|r| r.fields().clone()), Some(doc! { "n": 2 }));
    assert_eq!(targets[2], SyncTarget::Id(id));
}

#[test]
fn test_bulk_update_commits_each_target_independently() {
    let not_bob = |target: SyncTarget| {
        let ok = target
            .document()
            .map(|record| record.fields().get_str("name").map(|name| name != "Bob").unwrap_or(true))
            .unwrap_or(true);
        futures::future::ready(Ok::<_, BoxError>(ok))
    };
    let users = seeded(builder("users").synchronizer(WriteOp::Update, not_bob));

    let result = block_on(users.update_many(&Where::new(), doc! { "city": "Lima" })).unwrap();

    assert_eq!(ids(&result.committed), vec!["doc-a", "doc-c"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].0, "doc-b");
    assert!(result.failed[0].1.is_sync());
    assert_eq!(users.read("doc-b").unwrap().fields().get_str("city").unwrap(), "Rome");
    assert_eq!(users.count(Some(&Filter::eq("city", "Lima"))), 2);
}

/// A synchronizer that waits for the test to decide its verdict the first time it is
/// called, and confirms every later call immediately.
fn gated() -> (oneshot::Sender<bool>, impl Synchronizer + 'static) {
    let (tx, rx) = oneshot::channel::<bool>();
    let gate = Arc::new(Mutex::new(Some(rx)));

    let synchronizer = move |_: SyncTarget| {
        let rx = gate.lock().unwrap().take();
        async move {
            match rx {
                Some(rx) => Ok::<_, BoxError>(rx.await.unwrap_or(false)),
                None => Ok(true),
            }
        }
    };
    (tx, synchronizer)
}

#[test]
fn test_optimistic_state_is_visible_while_pending() {
    let (verdict, synchronizer) = gated();
    let users = builder("users").synchronizer(WriteOp::Create, synchronizer).build().unwrap();

    block_on(async {
        let pending = users.create(doc! { "name": "Alice" });
        let observer = async {
            assert!(users.exists("doc-0"));
            assert_eq!(users.count(None), 1);
            verdict.send(false).unwrap();
        };

        let (result, ()) = join!(pending, observer);
        assert!(result.unwrap_err().is_sync());
    });

    assert!(!users.exists("doc-0"));
    assert_eq!(users.count(None), 0);
}

#[test]
fn test_interleaved_writes_last_revert_wins() {
    let (verdict, synchronizer) = gated();
    let users = builder("users").synchronizer(WriteOp::Update, synchronizer).build().unwrap();
    users.populate(vec![doc! { "id": "x", "n": 0 }]).unwrap();

    block_on(async {
        let first = users.update("x", doc! { "n": 1 });
        let second = async {
            let committed = users.update("x", doc! { "n": 2 }).await.unwrap();
            assert_eq!(committed.fields().get_i32("n").unwrap(), 2);
            verdict.send(false).unwrap();
        };

        let (result, ()) = join!(first, second);
        assert!(result.is_err());
    });

    // The first update reverted after the second committed, restoring its own prior value.
    assert_eq!(values(&snapshot(&users), "n"), vec![Bson::Int32(0)]);
}
