//! Integration tests for the parent status lifecycle guards.
//!
//! This test suite validates:
//! - Documents move out of `processing` exactly once; terminal states
//!   are immutable
//! - Handwriting notes get the same guard
//! - Typed-note upsert is stable per frame and lands in `ready`
//!
//! **IMPORTANT**: These tests require a fully migrated PostgreSQL
//! database. Run with `cargo test -- --ignored`.

use uuid::Uuid;

use easel_core::{DocumentRepository, HandwritingRepository, ParentStatus, TypedNoteRepository};
use easel_db::test_fixtures::setup_test_db;

#[tokio::test]
#[ignore]
async fn test_document_terminal_status_is_immutable() {
    let db = setup_test_db().await;

    let id = db
        .documents
        .insert("status-guard.pdf", 2, 1024)
        .await
        .expect("Failed to insert document");

    // processing -> processed is the one allowed transition here
    assert!(db
        .documents
        .set_status(id, ParentStatus::Processed)
        .await
        .expect("Failed to update status"));

    // terminal state: further updates are rejected by the guard
    assert!(!db
        .documents
        .set_status(id, ParentStatus::Failed)
        .await
        .expect("Guarded update should not error"));
    assert!(!db
        .documents
        .set_status(id, ParentStatus::NoText)
        .await
        .expect("Guarded update should not error"));

    let doc = db
        .documents
        .get(id)
        .await
        .expect("Failed to fetch document")
        .expect("Document row missing");
    assert_eq!(doc.status, "processed");
}

#[tokio::test]
#[ignore]
async fn test_handwriting_terminal_status_is_immutable() {
    let db = setup_test_db().await;
    let frame_id = format!("guard-frame-{}", Uuid::now_v7());

    let id = db
        .handwriting
        .insert(&frame_id)
        .await
        .expect("Failed to insert handwriting note");

    assert!(db
        .handwriting
        .set_status(id, ParentStatus::NoText)
        .await
        .expect("Failed to update status"));
    assert!(!db
        .handwriting
        .set_status(id, ParentStatus::Processed)
        .await
        .expect("Guarded update should not error"));

    let notes = db
        .handwriting
        .find_by_frame_ids(&[frame_id])
        .await
        .expect("Failed to fetch note");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].status, "no_text");
}

#[tokio::test]
#[ignore]
async fn test_typed_note_upsert_is_stable_and_ready() {
    let db = setup_test_db().await;
    let frame_id = format!("guard-typed-{}", Uuid::now_v7());

    let first = db
        .typed_notes
        .upsert(&frame_id, "draft text")
        .await
        .expect("Failed to upsert typed note");
    let second = db
        .typed_notes
        .upsert(&frame_id, "revised text")
        .await
        .expect("Failed to re-upsert typed note");
    assert_eq!(first, second);

    let notes = db
        .typed_notes
        .find_by_frame_ids(&[frame_id])
        .await
        .expect("Failed to fetch typed note");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].status, "ready");
    assert_eq!(notes[0].full_text, "revised text");
}
