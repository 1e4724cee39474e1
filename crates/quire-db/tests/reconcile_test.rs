//! Association reconciliation against PostgreSQL.

use std::collections::HashSet;
use std::sync::Arc;

use quire_db::test_fixtures::TestDatabase;
use quire_db::{
    AssociationReconciler, CreateNoteRequest, EntityKind, EntityStore, Error, LinkStore,
    TagResolver, TagStore,
};
use uuid::Uuid;

async fn note_with_tags(test_db: &TestDatabase, names: &[&str]) -> (Uuid, HashSet<Uuid>) {
    let note = test_db
        .db
        .notes
        .insert(
            test_db.owner,
            &CreateNoteRequest {
                title: "Reconcile".to_string(),
                ..Default::default()
            },
            chrono::Utc::now(),
        )
        .await
        .unwrap();

    let resolver = TagResolver::new(Arc::new(test_db.db.tags.clone()));
    let mut ids = HashSet::new();
    for name in names {
        ids.insert(resolver.resolve(test_db.owner, name).await.unwrap());
    }
    (note.id, ids)
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_reconcile_converges_to_desired() {
    let test_db = TestDatabase::new().await;
    let reconciler = AssociationReconciler::new(Arc::new(test_db.db.links.clone()));
    let (note_id, abc) = note_with_tags(&test_db, &["a", "b", "c"]).await;

    let outcome = reconciler
        .reconcile(test_db.owner, EntityKind::Note, note_id, &abc)
        .await
        .unwrap();
    assert_eq!(outcome.added, 3);
    assert_eq!(outcome.removed, 0);

    let (_, bd) = note_with_tags(&test_db, &["b", "d"]).await;
    let outcome = reconciler
        .reconcile(test_db.owner, EntityKind::Note, note_id, &bd)
        .await
        .unwrap();
    assert_eq!(outcome.added, 1);
    assert_eq!(outcome.removed, 2);

    let linked = test_db
        .db
        .links
        .linked_tag_ids(test_db.owner, EntityKind::Note, note_id)
        .await
        .unwrap();
    assert_eq!(linked, bd);

    let names = test_db
        .db
        .links
        .tag_names(test_db.owner, EntityKind::Note, &[note_id])
        .await
        .unwrap();
    assert_eq!(names[&note_id], vec!["b".to_string(), "d".to_string()]);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_reconcile_unchanged_set_is_noop() {
    let test_db = TestDatabase::new().await;
    let reconciler = AssociationReconciler::new(Arc::new(test_db.db.links.clone()));
    let (note_id, tags) = note_with_tags(&test_db, &["x", "y"]).await;

    reconciler
        .reconcile(test_db.owner, EntityKind::Note, note_id, &tags)
        .await
        .unwrap();
    let outcome = reconciler
        .reconcile(test_db.owner, EntityKind::Note, note_id, &tags)
        .await
        .unwrap();

    assert_eq!(outcome.added, 0);
    assert_eq!(outcome.removed, 0);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_reconcile_empty_clears_links() {
    let test_db = TestDatabase::new().await;
    let reconciler = AssociationReconciler::new(Arc::new(test_db.db.links.clone()));
    let (note_id, tags) = note_with_tags(&test_db, &["one", "two"]).await;

    reconciler
        .reconcile(test_db.owner, EntityKind::Note, note_id, &tags)
        .await
        .unwrap();
    let outcome = reconciler
        .reconcile(test_db.owner, EntityKind::Note, note_id, &HashSet::new())
        .await
        .unwrap();

    assert_eq!(outcome.removed, 2);
    assert!(test_db
        .db
        .links
        .linked_tag_ids(test_db.owner, EntityKind::Note, note_id)
        .await
        .unwrap()
        .is_empty());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_foreign_tag_is_rejected_and_nothing_changes() {
    let test_db = TestDatabase::new().await;
    let other = TestDatabase::fresh_owner();
    let reconciler = AssociationReconciler::new(Arc::new(test_db.db.links.clone()));
    let (note_id, mine) = note_with_tags(&test_db, &["mine"]).await;
    reconciler
        .reconcile(test_db.owner, EntityKind::Note, note_id, &mine)
        .await
        .unwrap();

    let foreign = TagResolver::new(Arc::new(test_db.db.tags.clone()))
        .resolve(other, "theirs")
        .await
        .unwrap();

    let result = reconciler
        .reconcile(
            test_db.owner,
            EntityKind::Note,
            note_id,
            &HashSet::from([foreign]),
        )
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));

    // The rejected diff leaves the existing link in place.
    let linked = test_db
        .db
        .links
        .linked_tag_ids(test_db.owner, EntityKind::Note, note_id)
        .await
        .unwrap();
    assert_eq!(linked, mine);

    test_db.cleanup().await;
    TestDatabase::cleanup_owner(&test_db.db, other).await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_foreign_or_missing_entity_is_rejected() {
    let test_db = TestDatabase::new().await;
    let other = TestDatabase::fresh_owner();
    let reconciler = AssociationReconciler::new(Arc::new(test_db.db.links.clone()));
    let (_, mine) = note_with_tags(&test_db, &["mine"]).await;

    let theirs = test_db
        .db
        .notes
        .insert(
            other,
            &CreateNoteRequest {
                title: "Theirs".to_string(),
                ..Default::default()
            },
            chrono::Utc::now(),
        )
        .await
        .unwrap();

    for entity_id in [theirs.id, Uuid::now_v7()] {
        let result = reconciler
            .reconcile(test_db.owner, EntityKind::Note, entity_id, &mine)
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    let vocab = test_db.db.tags.list_tags(test_db.owner).await.unwrap();
    assert!(vocab.iter().all(|t| t.usage_count == 0));

    test_db.cleanup().await;
    TestDatabase::cleanup_owner(&test_db.db, other).await;
}
