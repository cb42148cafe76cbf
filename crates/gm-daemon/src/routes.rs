//! Axum router and all HTTP handlers for gm-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers only translate between HTTP and the core's
//! outcome enums; every decision is made in `gm-core`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use gm_core::{
    request_withdrawal, submit_order, LedgerStore, OrderRegistry, SubmitOutcome,
    WithdrawalRequestOutcome,
};
use tracing::error;

use crate::{
    api_types::{
        BalanceView, ErrorResponse, HealthResponse, OrderView, WithdrawRequest, WithdrawalView,
    },
    identity::CallerId,
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/user/orders", post(post_order).get(list_orders))
        .route("/api/user/balance", get(get_balance))
        .route("/api/user/balance/withdraw", post(post_withdraw))
        .route("/api/user/withdrawals", get(list_withdrawals))
        .with_state(state)
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    (status, Json(ErrorResponse::new(msg))).into_response()
}

fn internal_error(context: &str, e: anyhow::Error) -> Response {
    error!(error = %format!("{e:#}"), "{context}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /api/user/orders
// ---------------------------------------------------------------------------

/// Body is the bare order number as text.
pub(crate) async fn post_order(
    State(st): State<Arc<AppState>>,
    CallerId(user): CallerId,
    body: String,
) -> Response {
    let raw = body.trim();
    if raw.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty order number");
    }

    match submit_order(st.store.as_ref(), user, raw).await {
        SubmitOutcome::Accepted => StatusCode::ACCEPTED.into_response(),
        SubmitOutcome::AlreadyOwnedByCaller => StatusCode::OK.into_response(),
        SubmitOutcome::Conflict => {
            error_response(StatusCode::CONFLICT, "order number belongs to another user")
        }
        SubmitOutcome::InvalidFormat => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, "invalid order number")
        }
        SubmitOutcome::InternalError => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/user/orders
// ---------------------------------------------------------------------------

pub(crate) async fn list_orders(
    State(st): State<Arc<AppState>>,
    CallerId(user): CallerId,
) -> Response {
    match st.store.orders_by_owner(user).await {
        Ok(orders) if orders.is_empty() => StatusCode::NO_CONTENT.into_response(),
        Ok(orders) => {
            let body: Vec<OrderView> = orders.into_iter().map(OrderView::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => internal_error("list orders failed", e),
    }
}

// ---------------------------------------------------------------------------
// GET /api/user/balance
// ---------------------------------------------------------------------------

pub(crate) async fn get_balance(
    State(st): State<Arc<AppState>>,
    CallerId(user): CallerId,
) -> Response {
    match st.store.balance(user).await {
        Ok(Some(b)) => (StatusCode::OK, Json(BalanceView::from(b))).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "unknown user"),
        Err(e) => internal_error("balance lookup failed", e),
    }
}

// ---------------------------------------------------------------------------
// POST /api/user/balance/withdraw
// ---------------------------------------------------------------------------

pub(crate) async fn post_withdraw(
    State(st): State<Arc<AppState>>,
    CallerId(user): CallerId,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    };

    match request_withdrawal(st.store.as_ref(), user, req.order.trim(), req.sum).await {
        WithdrawalRequestOutcome::Accepted => StatusCode::OK.into_response(),
        WithdrawalRequestOutcome::InsufficientFunds => {
            error_response(StatusCode::PAYMENT_REQUIRED, "insufficient funds")
        }
        WithdrawalRequestOutcome::InvalidOrderNumber => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, "invalid order number")
        }
        WithdrawalRequestOutcome::UnknownOrder => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, "unknown order")
        }
        WithdrawalRequestOutcome::InvalidAmount => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, "sum must be positive")
        }
        WithdrawalRequestOutcome::InternalError => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/user/withdrawals
// ---------------------------------------------------------------------------

pub(crate) async fn list_withdrawals(
    State(st): State<Arc<AppState>>,
    CallerId(user): CallerId,
) -> Response {
    match st.store.withdrawals(user).await {
        Ok(ws) if ws.is_empty() => StatusCode::NO_CONTENT.into_response(),
        Ok(ws) => {
            let body: Vec<WithdrawalView> = ws.into_iter().map(WithdrawalView::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => internal_error("list withdrawals failed", e),
    }
}
