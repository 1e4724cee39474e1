//! Tag identity against PostgreSQL: case-insensitive uniqueness and
//! lost-race recovery under concurrent resolution.

use std::sync::Arc;

use futures::future::join_all;
use quire_db::test_fixtures::TestDatabase;
use quire_db::{TagResolver, TagStore};

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_resolve_is_case_insensitive() {
    let test_db = TestDatabase::new().await;
    let resolver = TagResolver::new(Arc::new(test_db.db.tags.clone()));

    let a = resolver.resolve(test_db.owner, "Rust").await.unwrap();
    let b = resolver.resolve(test_db.owner, "  rust ").await.unwrap();
    let c = resolver.resolve(test_db.owner, "RUST").await.unwrap();

    assert_eq!(a, b);
    assert_eq!(b, c);

    let tags = test_db.db.tags.list_tags(test_db.owner).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "rust");
    assert_eq!(tags[0].usage_count, 0);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_insert_reports_lost_race_as_none() {
    let test_db = TestDatabase::new().await;
    let store = &test_db.db.tags;

    let first = store
        .insert_tag(test_db.owner, "dup", "#6b7280")
        .await
        .unwrap();
    let second = store
        .insert_tag(test_db.owner, "dup", "#6b7280")
        .await
        .unwrap();

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(
        store.find_tag_id(test_db.owner, "dup").await.unwrap(),
        first
    );

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_concurrent_resolution_converges_on_one_row() {
    let test_db = TestDatabase::new().await;
    let resolver = TagResolver::new(Arc::new(test_db.db.tags.clone()));

    let spellings = ["Shared", "shared", "SHARED", " shared", "sHaReD", "shared "];
    let results = join_all(
        spellings
            .iter()
            .map(|name| resolver.resolve(test_db.owner, name)),
    )
    .await;

    let ids: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));

    let tags = test_db.db.tags.list_tags(test_db.owner).await.unwrap();
    assert_eq!(tags.len(), 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_same_name_distinct_per_owner() {
    let test_db = TestDatabase::new().await;
    let other = TestDatabase::fresh_owner();
    let resolver = TagResolver::new(Arc::new(test_db.db.tags.clone()));

    let mine = resolver.resolve(test_db.owner, "work").await.unwrap();
    let theirs = resolver.resolve(other, "work").await.unwrap();
    assert_ne!(mine, theirs);

    test_db.cleanup().await;
    TestDatabase::cleanup_owner(&test_db.db, other).await;
}
