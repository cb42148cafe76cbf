//! Submitting the same number twice never yields two rows; a second owner
//! gets a conflict and the first owner keeps the order.

use gm_core::{submit_order, CreateOutcome, OrderRegistry, OrderStatus, SubmitOutcome};
use gm_testkit::{new_user, order_number, MemStore};

#[tokio::test]
async fn same_owner_twice_is_created_then_already_owned() {
    let store = MemStore::new();
    let u = new_user(&store).await.unwrap();
    let n = order_number(123);

    let first = store.create_order(u, &n).await.unwrap();
    let second = store.create_order(u, &n).await.unwrap();

    let created = match first {
        CreateOutcome::Created(o) => o,
        other => panic!("expected Created, got {other:?}"),
    };
    assert_eq!(created.status, OrderStatus::New);
    assert!(created.accrual.raw() == 0);
    assert_eq!(second, CreateOutcome::AlreadyOwnedByCaller(created));
    assert_eq!(store.order_count(), 1);
}

#[tokio::test]
async fn other_owner_conflicts_and_first_owner_is_kept() {
    let store = MemStore::new();
    let u1 = new_user(&store).await.unwrap();
    let u2 = new_user(&store).await.unwrap();
    let n = order_number(123);

    store.create_order(u1, &n).await.unwrap();
    assert_eq!(
        store.create_order(u2, &n).await.unwrap(),
        CreateOutcome::OwnedByOther
    );

    let stored = store.order_by_number(n.as_str()).await.unwrap().unwrap();
    assert_eq!(stored.owner, u1);
    assert!(store.orders_by_owner(u2).await.unwrap().is_empty());
    assert_eq!(store.order_count(), 1);
}

#[tokio::test]
async fn submission_surface_maps_every_outcome() {
    let store = MemStore::new();
    let u1 = new_user(&store).await.unwrap();
    let u2 = new_user(&store).await.unwrap();
    let n = order_number(7);

    assert_eq!(submit_order(&store, u1, n.as_str()).await, SubmitOutcome::Accepted);
    assert_eq!(
        submit_order(&store, u1, n.as_str()).await,
        SubmitOutcome::AlreadyOwnedByCaller
    );
    assert_eq!(submit_order(&store, u2, n.as_str()).await, SubmitOutcome::Conflict);
    assert_eq!(
        submit_order(&store, u1, "79927398710").await,
        SubmitOutcome::InvalidFormat
    );
    assert_eq!(submit_order(&store, u1, "12ab").await, SubmitOutcome::InvalidFormat);
    assert_eq!(submit_order(&store, u1, "").await, SubmitOutcome::InvalidFormat);

    // Invalid input never reaches the registry.
    assert_eq!(store.order_count(), 1);
}

#[tokio::test]
async fn registry_failure_is_internal_error() {
    let store = MemStore::new();
    // Never registered: the in-memory registry refuses orders for unknown users.
    let ghost = uuid::Uuid::new_v4();
    assert_eq!(
        submit_order(&store, ghost, order_number(1).as_str()).await,
        SubmitOutcome::InternalError
    );
}

#[tokio::test]
async fn owner_listing_is_ascending_by_upload_time() {
    let store = MemStore::new();
    let u = new_user(&store).await.unwrap();
    for seed in [3, 1, 2] {
        store.create_order(u, &order_number(seed)).await.unwrap();
    }

    let listed = store.orders_by_owner(u).await.unwrap();
    let numbers: Vec<String> = listed.iter().map(|o| o.number.clone()).collect();
    let expected: Vec<String> = [3, 1, 2]
        .iter()
        .map(|s| order_number(*s).as_str().to_string())
        .collect();
    assert_eq!(numbers, expected);
}
