//! In-process scenario tests for gm-daemon HTTP endpoints.
//!
//! The router is driven via `tower::ServiceExt::oneshot` over a `MemStore`;
//! no socket and no database are involved.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use gm_core::{LedgerStore, Micros, OrderRegistry, OrderStatus};
use gm_daemon::{identity::USER_ID_HEADER, routes, state};
use gm_testkit::{new_order, new_user, order_number, MemStore};
use http_body_util::BodyExt;
use tower::ServiceExt; // oneshot
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_router(store: &Arc<MemStore>) -> axum::Router {
    routes::build_router(Arc::new(state::AppState::new(store.clone())))
}

async fn call(router: axum::Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn get_as(user: Uuid, uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(USER_ID_HEADER, user.to_string())
        .body(Body::empty())
        .unwrap()
}

fn post_order_as(user: Uuid, number: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/user/orders")
        .header(USER_ID_HEADER, user.to_string())
        .header("content-type", "text/plain")
        .body(Body::from(number.to_string()))
        .unwrap()
}

fn post_withdraw_as(user: Uuid, json: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/user/balance/withdraw")
        .header(USER_ID_HEADER, user.to_string())
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

/// A user whose balance has been credited `units` through a PROCESSED order
/// created from `seed`.
async fn funded_user(store: &MemStore, seed: u64, units: i64) -> Uuid {
    let u = new_user(store).await.unwrap();
    let o = new_order(store, u, &order_number(seed)).await.unwrap();
    store
        .apply_transition(o.id, OrderStatus::Processed, Micros::from_units(units))
        .await
        .unwrap();
    u
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let store = Arc::new(MemStore::new());
    let req = Request::builder()
        .method("GET")
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = call(make_router(&store), req).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "gm-daemon");
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_or_malformed_identity_is_401() {
    let store = Arc::new(MemStore::new());

    let req = Request::builder()
        .method("GET")
        .uri("/api/user/orders")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(make_router(&store), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method("GET")
        .uri("/api/user/balance")
        .header(USER_ID_HEADER, "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(make_router(&store), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// POST /api/user/orders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn order_submission_status_codes() {
    let store = Arc::new(MemStore::new());
    let u1 = new_user(&*store).await.unwrap();
    let u2 = new_user(&*store).await.unwrap();
    let n = order_number(1);

    let (status, _) = call(make_router(&store), post_order_as(u1, n.as_str())).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = call(make_router(&store), post_order_as(u1, n.as_str())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(make_router(&store), post_order_as(u2, n.as_str())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(make_router(&store), post_order_as(u1, "79927398710")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(make_router(&store), post_order_as(u1, "   ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(store.order_count(), 1);
}

#[tokio::test]
async fn order_body_whitespace_is_trimmed() {
    let store = Arc::new(MemStore::new());
    let u = new_user(&*store).await.unwrap();
    let n = order_number(2);

    let (status, _) = call(make_router(&store), post_order_as(u, &format!("{n}\n"))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(store.order_by_number(n.as_str()).await.unwrap().is_some());
}

// ---------------------------------------------------------------------------
// GET /api/user/orders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn order_list_is_204_when_empty_then_200_with_accrual_only_when_processed() {
    let store = Arc::new(MemStore::new());
    let u = new_user(&*store).await.unwrap();

    let (status, body) = call(make_router(&store), get_as(u, "/api/user/orders")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let done = new_order(&*store, u, &order_number(10)).await.unwrap();
    new_order(&*store, u, &order_number(11)).await.unwrap();
    store
        .apply_transition(done.id, OrderStatus::Processed, Micros::parse_decimal("729.98").unwrap())
        .await
        .unwrap();

    let (status, body) = call(make_router(&store), get_as(u, "/api/user/orders")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    let list = json.as_array().expect("array");
    assert_eq!(list.len(), 2);

    assert_eq!(list[0]["number"], order_number(10).as_str());
    assert_eq!(list[0]["status"], "PROCESSED");
    assert_eq!(list[0]["accrual"], 729.98);
    assert!(list[0]["uploaded_at"].as_str().unwrap().ends_with('Z'));

    assert_eq!(list[1]["status"], "NEW");
    assert!(list[1].get("accrual").is_none());
}

// ---------------------------------------------------------------------------
// GET /api/user/balance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn balance_reports_current_and_withdrawn() {
    let store = Arc::new(MemStore::new());
    let u = funded_user(&store, 20, 500).await;

    let (status, _) = call(
        make_router(&store),
        post_withdraw_as(u, &format!(r#"{{"order":"{}","sum":120.5}}"#, order_number(20))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(make_router(&store), get_as(u, "/api/user/balance")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["current"], 379.5);
    assert_eq!(json["withdrawn"], 120.5);
}

#[tokio::test]
async fn balance_of_unknown_user_is_404() {
    let store = Arc::new(MemStore::new());
    let (status, _) = call(make_router(&store), get_as(Uuid::new_v4(), "/api/user/balance")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// POST /api/user/balance/withdraw
// ---------------------------------------------------------------------------

#[tokio::test]
async fn withdraw_status_codes() {
    let store = Arc::new(MemStore::new());
    let u = funded_user(&store, 30, 100).await;
    let n = order_number(30);

    let cases: [(String, StatusCode); 5] = [
        (
            format!(r#"{{"order":"{n}","sum":150}}"#),
            StatusCode::PAYMENT_REQUIRED,
        ),
        (
            r#"{"order":"79927398710","sum":1}"#.to_string(),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        (
            format!(r#"{{"order":"{}","sum":1}}"#, order_number(31)),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        (
            format!(r#"{{"order":"{n}","sum":0}}"#),
            StatusCode::UNPROCESSABLE_ENTITY,
        ),
        (r#"{"order":"#.to_string(), StatusCode::BAD_REQUEST),
    ];

    for (body, expected) in cases {
        let (status, _) = call(make_router(&store), post_withdraw_as(u, &body)).await;
        assert_eq!(status, expected, "body {body}");
    }

    // None of the refused requests touched the ledger.
    let bal = store.balance(u).await.unwrap().unwrap();
    assert_eq!(bal.current, Micros::from_units(100));
    assert_eq!(bal.withdrawn, Micros::ZERO);
}

// ---------------------------------------------------------------------------
// GET /api/user/withdrawals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn withdrawals_list_is_204_then_200() {
    let store = Arc::new(MemStore::new());
    let u = funded_user(&store, 40, 10).await;
    let n = order_number(40);

    let (status, _) = call(make_router(&store), get_as(u, "/api/user/withdrawals")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(
        make_router(&store),
        post_withdraw_as(u, &format!(r#"{{"order":"{n}","sum":2.25}}"#)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(make_router(&store), get_as(u, "/api/user/withdrawals")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    let list = json.as_array().expect("array");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["order"], n.as_str());
    assert_eq!(list[0]["sum"], 2.25);
    assert!(list[0]["processed_at"].is_string());
}

#[tokio::test]
async fn callers_see_only_their_own_rows() {
    let store = Arc::new(MemStore::new());
    let u1 = funded_user(&store, 50, 10).await;
    let u2 = new_user(&*store).await.unwrap();

    let (status, _) = call(make_router(&store), get_as(u2, "/api/user/orders")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // u2 cannot spend against u1's order either.
    let (status, _) = call(
        make_router(&store),
        post_withdraw_as(u2, &format!(r#"{{"order":"{}","sum":1}}"#, order_number(50))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = call(make_router(&store), get_as(u1, "/api/user/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body).as_array().unwrap().len(), 1);
}
