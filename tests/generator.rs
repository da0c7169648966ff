mod support;

use std::sync::atomic::Ordering;

use missive::application::documents::GenerateError;
use missive::application::verification::VerificationService;

use support::{Harness, page_labels, subject};

#[tokio::test]
async fn unchanged_input_reuses_the_stored_document() {
    let harness = Harness::new(&["m1:o1"]);
    let key = subject("m1:o1");

    let first = harness.generator.generate(&key).await.expect("first");
    assert!(!first.cached);
    assert_eq!(first.record.sequence_number, 1);
    assert_eq!(
        first.record.storage_path.as_deref(),
        Some("documents/00000001.pdf")
    );

    let second = harness.generator.generate(&key).await.expect("second");
    assert!(second.cached);
    assert_eq!(second.record.id, first.record.id);
    assert_eq!(second.bytes, first.bytes);
    assert_eq!(harness.renderer.renders.load(Ordering::SeqCst), 1);
    assert_eq!(harness.documents.all().await.len(), 1);
}

#[tokio::test]
async fn changed_input_allocates_a_new_version() {
    let harness = Harness::new(&["m1:o1"]);
    let key = subject("m1:o1");

    let first = harness.generator.generate(&key).await.expect("first");
    harness
        .sources
        .rename_official("m1:o1", "Official Renamed")
        .await;
    let second = harness.generator.generate(&key).await.expect("second");

    assert!(!second.cached);
    assert_eq!(second.record.sequence_number, 2);
    assert_ne!(second.record.data_hash, first.record.data_hash);
    assert_ne!(second.record.id, first.record.id);
    assert!(page_labels(&second.bytes)[0].contains("m1:o1#2"));

    // The superseded version stays resolvable.
    let verification = VerificationService::new(harness.documents.clone());
    let old = verification
        .lookup(first.record.id)
        .await
        .expect("lookup")
        .expect("old version");
    assert_eq!(old.official_name, "Official o1");
    let new = verification
        .lookup(second.record.id)
        .await
        .expect("lookup")
        .expect("new version");
    assert_eq!(new.official_name, "Official Renamed");
    assert_eq!(new.order_number, "0002/LRF/2026");
    assert_eq!(new.fixture, "Home FC - Away SC");
}

#[tokio::test]
async fn missing_stored_object_forces_a_render() {
    let harness = Harness::new(&["m1:o1"]);
    let key = subject("m1:o1");

    let first = harness.generator.generate(&key).await.expect("first");
    let path = first.record.storage_path.clone().expect("stored");
    std::fs::remove_file(harness.storage_root().join(&path)).expect("remove stored object");

    let second = harness.generator.generate(&key).await.expect("second");
    assert!(!second.cached);
    assert_eq!(second.record.sequence_number, 2);
    assert_eq!(harness.renderer.renders.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_subject_is_reported_as_unavailable() {
    let harness = Harness::new(&[]);

    let err = harness
        .generator
        .generate(&subject("m9:o9"))
        .await
        .expect_err("no mission");
    assert!(matches!(err, GenerateError::SourceDataUnavailable { .. }));
    assert!(harness.documents.all().await.is_empty());
}

#[tokio::test]
async fn verification_of_unknown_id_is_empty() {
    let harness = Harness::new(&[]);
    let verification = VerificationService::new(harness.documents.clone());

    let view = verification
        .lookup(uuid::Uuid::new_v4())
        .await
        .expect("lookup");
    assert!(view.is_none());
}
