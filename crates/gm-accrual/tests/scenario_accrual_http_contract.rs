//! HttpAccrualClient against a local mock of the accrual service.

use std::time::Duration;

use gm_accrual::{AccrualError, AccrualReply, AccrualSource, HttpAccrualClient, MAX_RETRY_AFTER};
use gm_core::{Micros, OrderStatus};
use httpmock::prelude::*;
use serde_json::json;

const ORDER: &str = "79927398713";

fn client(server: &MockServer) -> HttpAccrualClient {
    HttpAccrualClient::new(server.base_url(), Duration::from_secs(2)).expect("client")
}

#[tokio::test]
async fn processed_reply_carries_status_and_accrual() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/orders/{ORDER}"));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "order": ORDER, "status": "PROCESSED", "accrual": 42.5 }));
        })
        .await;

    let reply = client(&server).query(ORDER).await.expect("query");
    m.assert_async().await;

    match reply {
        AccrualReply::Ready(r) => {
            assert_eq!(r.order, ORDER);
            assert_eq!(r.status, OrderStatus::Processed);
            assert_eq!(r.accrual, Micros::parse_decimal("42.5").unwrap());
        }
        other => panic!("expected Ready, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_external_status_maps_to_registered() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/orders/{ORDER}"));
            then.status(200)
                .json_body(json!({ "order": ORDER, "status": "SOMETHING_NEW" }));
        })
        .await;

    match client(&server).query(ORDER).await.expect("query") {
        AccrualReply::Ready(r) => {
            assert_eq!(r.status, OrderStatus::Registered);
            assert_eq!(r.accrual, Micros::ZERO);
        }
        other => panic!("expected Ready, got {other:?}"),
    }
}

#[tokio::test]
async fn no_content_means_not_registered() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/orders/{ORDER}"));
            then.status(204);
        })
        .await;

    assert_eq!(
        client(&server).query(ORDER).await.expect("query"),
        AccrualReply::NotRegistered
    );
}

#[tokio::test]
async fn too_many_requests_surfaces_retry_after() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/orders/{ORDER}"));
            then.status(429)
                .header("Retry-After", "7")
                .body("No more than N requests per minute allowed");
        })
        .await;

    assert_eq!(
        client(&server).query(ORDER).await.expect("query"),
        AccrualReply::RateLimited {
            retry_after: Duration::from_secs(7)
        }
    );
}

#[tokio::test]
async fn absurd_retry_after_is_clamped() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/orders/{ORDER}"));
            then.status(429).header("Retry-After", "18446744073709551615");
        })
        .await;

    assert_eq!(
        client(&server).query(ORDER).await.expect("query"),
        AccrualReply::RateLimited {
            retry_after: MAX_RETRY_AFTER
        }
    );
}

#[tokio::test]
async fn server_error_is_retryable_status_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/orders/{ORDER}"));
            then.status(500);
        })
        .await;

    assert_eq!(
        client(&server).query(ORDER).await.unwrap_err(),
        AccrualError::Status(500)
    );
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/orders/{ORDER}"));
            then.status(200).body("{\"order\":");
        })
        .await;

    assert!(matches!(
        client(&server).query(ORDER).await,
        Err(AccrualError::Decode(_))
    ));
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/orders/{ORDER}"));
            then.status(200)
                .delay(Duration::from_millis(800))
                .json_body(json!({ "order": ORDER, "status": "PROCESSED", "accrual": 1 }));
        })
        .await;

    let c = HttpAccrualClient::new(server.base_url(), Duration::from_millis(100)).expect("client");
    assert_eq!(c.query(ORDER).await.unwrap_err(), AccrualError::Timeout);
}

#[tokio::test]
async fn unreachable_service_is_transport_error() {
    // Port 9 (discard) on localhost is closed on any sane test host.
    let c = HttpAccrualClient::new("http://127.0.0.1:9", Duration::from_secs(2)).expect("client");
    match c.query(ORDER).await {
        Err(AccrualError::Transport(_)) | Err(AccrualError::Timeout) => {}
        other => panic!("expected transport failure, got {other:?}"),
    }
}
