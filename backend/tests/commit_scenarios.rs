//! End-to-end commit behaviour against the in-memory store.
//!
//! Each scenario drives real units of work through [`CommitInterceptor`] and
//! reads the rows back from [`InMemoryCommitStore`], so audit stamping,
//! version bumps, and the store's concurrency check are observed together.

use std::sync::Arc;

use rstest::{fixture, rstest};
use service_backend::domain::ports::{CommitStore, CommitStoreError};
use service_backend::domain::{
    ChangeState, CommitError, CommitInterceptor, EntityKey, Note, Record, UnitOfWork,
};
use service_backend::outbound::InMemoryCommitStore;
use service_backend::test_support::{MutableClock, fixture_timestamp};

struct World {
    clock: Arc<MutableClock>,
    store: Arc<InMemoryCommitStore>,
    interceptor: CommitInterceptor<InMemoryCommitStore>,
}

impl World {
    async fn insert(&self, title: &str) -> Note {
        let mut unit_of_work = UnitOfWork::new();
        let note = unit_of_work
            .add(Note::new(title, ""))
            .expect("fresh note")
            .clone();
        let committed = self
            .interceptor
            .commit(unit_of_work)
            .await
            .expect("insert commits");
        committed
            .unit_of_work()
            .get::<Note>(&note.id())
            .expect("note stays tracked")
            .clone()
    }

    async fn retitle_committed(&self, id: &str, title: &str) {
        let mut unit_of_work = self.load(id).await;
        retitle(&mut unit_of_work, id, title);
        self.interceptor
            .commit(unit_of_work)
            .await
            .expect("update commits");
    }

    async fn load(&self, id: &str) -> UnitOfWork {
        let mut unit_of_work = UnitOfWork::new();
        unit_of_work
            .load::<Note, _>(self.store.as_ref(), id)
            .await
            .expect("load succeeds")
            .expect("note exists");
        unit_of_work
    }

    async fn stored(&self, id: &str) -> Note {
        let row = self
            .store
            .find(&EntityKey::new(Note::ENTITY_TYPE, id))
            .await
            .expect("lookup succeeds")
            .expect("row exists");
        serde_json::from_value(serde_json::Value::Object(row)).expect("row maps to a note")
    }
}

#[fixture]
fn world() -> World {
    let clock = Arc::new(MutableClock::new(fixture_timestamp()));
    let store = Arc::new(InMemoryCommitStore::new());
    let interceptor = CommitInterceptor::new(Arc::clone(&store), clock.clone());
    World {
        clock,
        store,
        interceptor,
    }
}

fn retitle(unit_of_work: &mut UnitOfWork, id: &str, title: &str) {
    unit_of_work
        .get_mut::<Note>(id)
        .expect("note is tracked")
        .title = title.to_owned();
}

#[rstest]
#[tokio::test]
async fn insert_then_update_keeps_creation_instant(world: World) {
    let created = world.insert("draft").await;
    let id = created.id();
    assert_eq!(created.created_at, fixture_timestamp());
    assert_eq!(created.updated_at, fixture_timestamp());
    assert_eq!(created.version, 1);

    world.clock.advance_seconds(90);
    let mut unit_of_work = world.load(&id).await;
    retitle(&mut unit_of_work, &id, "final");
    world
        .interceptor
        .commit(unit_of_work)
        .await
        .expect("update commits");

    let stored = world.stored(&id).await;
    assert_eq!(stored.title, "final");
    assert_eq!(stored.created_at, fixture_timestamp());
    assert_eq!((stored.updated_at - fixture_timestamp()).num_seconds(), 90);
    assert_eq!(stored.version, 2);
}

#[rstest]
#[tokio::test]
async fn sequential_commits_move_version_and_updated_at_forward(world: World) {
    let id = world.insert("counter").await.id();
    let mut previous = world.stored(&id).await;

    for round in 1..=3 {
        world.clock.advance_seconds(1);
        world.retitle_committed(&id, &format!("round {round}")).await;

        let current = world.stored(&id).await;
        assert!(current.version > previous.version);
        assert!(current.updated_at > previous.updated_at);
        assert_eq!(current.created_at, previous.created_at);
        previous = current;
    }
    assert_eq!(previous.version, 4);
}

#[rstest]
#[tokio::test]
async fn stale_writer_gets_a_version_conflict(world: World) {
    let id = world.insert("shared").await.id();
    world.retitle_committed(&id, "shared v2").await;
    world.retitle_committed(&id, "shared v3").await;
    assert_eq!(world.stored(&id).await.version, 3);

    let mut first = world.load(&id).await;
    let mut second = world.load(&id).await;

    retitle(&mut first, &id, "first wins");
    world
        .interceptor
        .commit(first)
        .await
        .expect("first writer commits");

    retitle(&mut second, &id, "second loses");
    let error = world
        .interceptor
        .commit(second)
        .await
        .expect_err("second writer is stale");

    assert!(error.is_conflict());
    assert_eq!(
        error,
        CommitError::Store(CommitStoreError::VersionMismatch {
            entity: format!("note/{id}"),
            expected: 3,
            actual: 4,
        })
    );
    let stored = world.stored(&id).await;
    assert_eq!(stored.title, "first wins");
    assert_eq!(stored.version, 4);
}

#[rstest]
#[tokio::test]
async fn deleting_a_removed_row_is_a_conflict(world: World) {
    let id = world.insert("ephemeral").await.id();
    let key = EntityKey::new(Note::ENTITY_TYPE, id.clone());
    let mut first = world.load(&id).await;
    let mut second = world.load(&id).await;

    first.remove(&key).expect("tracked");
    world
        .interceptor
        .commit(first)
        .await
        .expect("delete commits");
    assert!(world.store.is_empty().expect("store lock"));

    second.remove(&key).expect("tracked");
    let error = world
        .interceptor
        .commit(second)
        .await
        .expect_err("row already gone");
    assert!(error.is_conflict());
}

#[rstest]
#[tokio::test]
async fn unchanged_entities_are_not_rewritten(world: World) {
    let id = world.insert("steady").await.id();
    world.clock.advance_seconds(30);

    let unit_of_work = world.load(&id).await;
    let committed = world
        .interceptor
        .commit(unit_of_work)
        .await
        .expect("nothing to write");

    assert_eq!(committed.affected(), 0);
    assert_eq!(
        committed.unit_of_work().state_of::<Note>(&id),
        Some(ChangeState::Unchanged)
    );
    let stored = world.stored(&id).await;
    assert_eq!(stored.updated_at, fixture_timestamp());
    assert_eq!(stored.version, 1);
}

#[rstest]
#[tokio::test]
async fn committed_unit_of_work_can_be_reused(world: World) {
    let id = world.insert("reused").await.id();
    let unit_of_work = world.load(&id).await;
    let mut unit_of_work = world
        .interceptor
        .commit(unit_of_work)
        .await
        .expect("first commit")
        .into_unit_of_work();

    world.clock.advance_seconds(5);
    retitle(&mut unit_of_work, &id, "again");
    let committed = world
        .interceptor
        .commit(unit_of_work)
        .await
        .expect("second commit");

    assert_eq!(committed.affected(), 1);
    assert_eq!(
        committed
            .unit_of_work()
            .get::<Note>(&id)
            .expect("tracked")
            .version,
        2
    );
}

#[rstest]
#[tokio::test]
async fn blocking_commit_leaves_the_store_untouched(world: World) {
    let mut unit_of_work = UnitOfWork::new();
    unit_of_work.add(Note::new("never", "")).expect("fresh note");

    let result = world.interceptor.commit_blocking(&unit_of_work);

    assert_eq!(result, Err(CommitError::SynchronousCommitUnsupported));
    assert_eq!(world.clock.reads(), 0);
    assert!(world.store.is_empty().expect("store lock"));
    assert_eq!(unit_of_work.len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_race_for_one_version(world: World) {
    let id = world.insert("contended").await.id();
    let mut handles = Vec::new();
    for writer in 0..4 {
        let mut unit_of_work = world.load(&id).await;
        retitle(&mut unit_of_work, &id, &format!("writer {writer}"));
        let interceptor = world.interceptor.clone();
        handles.push(tokio::spawn(
            async move { interceptor.commit(unit_of_work).await },
        ));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.expect("task completes") {
            Ok(_) => successes += 1,
            Err(error) => assert!(error.is_conflict(), "unexpected failure: {error}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(world.stored(&id).await.version, 2);
}
