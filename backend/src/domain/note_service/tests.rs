//! Regression coverage for the note service.

use std::sync::Arc;

use mockable::Clock;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::ports::MockCommitStore;
use crate::outbound::memory_store::InMemoryCommitStore;
use crate::test_support::{MutableClock, fixture_timestamp};

struct Harness {
    clock: Arc<MutableClock>,
    service: NoteService<InMemoryCommitStore>,
}

#[fixture]
fn harness() -> Harness {
    let clock = Arc::new(MutableClock::new(fixture_timestamp()));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let interceptor = CommitInterceptor::new(Arc::new(InMemoryCommitStore::new()), dyn_clock);
    Harness {
        clock,
        service: NoteService::new(interceptor),
    }
}

fn create_request(title: &str) -> CreateNoteRequest {
    CreateNoteRequest {
        title: title.to_owned(),
        body: "body".to_owned(),
    }
}

fn update_request(note: &Note, title: &str, expected_version: u32) -> UpdateNoteRequest {
    UpdateNoteRequest {
        id: note.id,
        title: title.to_owned(),
        body: note.body.clone(),
        expected_version,
    }
}

#[rstest]
#[tokio::test]
async fn create_stamps_and_versions_the_note(harness: Harness) {
    let note = harness
        .service
        .create(create_request("groceries"))
        .await
        .expect("create succeeds");

    assert_eq!(note.version, 1);
    assert_eq!(note.created_at, fixture_timestamp());
    assert_eq!(note.updated_at, fixture_timestamp());

    let fetched = harness.service.fetch(note.id).await.expect("fetch");
    assert_eq!(fetched, note);
}

#[rstest]
#[tokio::test]
async fn update_advances_version_and_updated_at(harness: Harness) {
    let created = harness
        .service
        .create(create_request("groceries"))
        .await
        .expect("create succeeds");
    harness.clock.advance_seconds(60);

    let updated = harness
        .service
        .update(update_request(&created, "errands", 1))
        .await
        .expect("update succeeds");

    assert_eq!(updated.version, 2);
    assert_eq!(updated.title, "errands");
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!((updated.updated_at - created.updated_at).num_seconds(), 60);
    assert_eq!(harness.service.fetch(created.id).await.expect("fetch"), updated);
}

#[rstest]
#[tokio::test]
async fn stale_expected_version_is_a_conflict(harness: Harness) {
    let created = harness
        .service
        .create(create_request("groceries"))
        .await
        .expect("create succeeds");
    harness
        .service
        .update(update_request(&created, "errands", 1))
        .await
        .expect("first update");

    let error = harness
        .service
        .update(update_request(&created, "late", 1))
        .await
        .expect_err("stale update");

    assert_eq!(error.code(), ErrorCode::Conflict);
    let details = error.details().expect("conflict details");
    assert_eq!(details["expectedVersion"], 1);
    assert_eq!(details["actualVersion"], 2);
}

#[rstest]
#[case("")]
#[case("   ")]
#[tokio::test]
async fn blank_titles_are_rejected(harness: Harness, #[case] title: &str) {
    let error = harness
        .service
        .create(create_request(title))
        .await
        .expect_err("blank title");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
    assert_eq!(harness.clock.reads(), 0);
}

#[rstest]
#[tokio::test]
async fn unknown_notes_are_not_found(harness: Harness) {
    let ghost = Note::new("ghost", "");

    let fetch = harness.service.fetch(ghost.id).await.expect_err("missing");
    let update = harness
        .service
        .update(update_request(&ghost, "boo", 1))
        .await
        .expect_err("missing");

    assert_eq!(fetch.code(), ErrorCode::NotFound);
    assert_eq!(update.code(), ErrorCode::NotFound);
}

fn service_over(store: MockCommitStore) -> NoteService<MockCommitStore> {
    let clock: Arc<dyn Clock> = Arc::new(MutableClock::new(fixture_timestamp()));
    NoteService::new(CommitInterceptor::new(Arc::new(store), clock))
}

#[rstest]
#[case(CommitStoreError::connection("refused"), ErrorCode::ServiceUnavailable)]
#[case(CommitStoreError::constraint("duplicate"), ErrorCode::Conflict)]
#[case(CommitStoreError::version_mismatch("note/x", 1_u32, 2_u32), ErrorCode::Conflict)]
#[case(CommitStoreError::missing("note/x"), ErrorCode::Conflict)]
#[tokio::test]
async fn store_failures_map_to_error_codes(
    #[case] failure: CommitStoreError,
    #[case] expected: ErrorCode,
) {
    let mut store = MockCommitStore::new();
    store
        .expect_commit()
        .times(1)
        .returning(move |_| Err(failure.clone()));

    let error = service_over(store)
        .create(create_request("groceries"))
        .await
        .expect_err("store failure");

    assert_eq!(error.code(), expected);
}

#[rstest]
#[tokio::test]
async fn lookup_failures_are_service_unavailable() {
    let mut store = MockCommitStore::new();
    store
        .expect_find()
        .returning(|_| Err(CommitStoreError::connection("refused")));
    store.expect_commit().never();

    let error = service_over(store)
        .fetch(Note::new("x", "").id)
        .await
        .expect_err("lookup failure");

    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
}
