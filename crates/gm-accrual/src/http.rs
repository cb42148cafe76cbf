use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use gm_core::{Micros, OrderStatus};
use reqwest::{header::RETRY_AFTER, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{
    map_external_status, AccrualError, AccrualReply, AccrualResult, AccrualSource,
    DEFAULT_RETRY_AFTER, MAX_RETRY_AFTER,
};

/// reqwest-backed [`AccrualSource`]: `GET {base}/api/orders/{number}`.
#[derive(Debug, Clone)]
pub struct HttpAccrualClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAccrualClient {
    /// Client whose every request is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build accrual http client")?;
        Ok(Self::new_with_client(base_url, http))
    }

    pub fn new_with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn order_url(&self, order_number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, order_number)
    }
}

#[derive(Debug, Deserialize)]
struct WireReply {
    #[serde(default)]
    order: Option<String>,
    status: String,
    #[serde(default)]
    accrual: Option<Micros>,
}

fn transport_error(e: reqwest::Error) -> AccrualError {
    if e.is_timeout() {
        AccrualError::Timeout
    } else {
        AccrualError::Transport(e.to_string())
    }
}

/// Seconds form only; anything else falls back to [`DEFAULT_RETRY_AFTER`].
/// Clamped to [`MAX_RETRY_AFTER`].
fn parse_retry_after(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
        .min(MAX_RETRY_AFTER)
}

fn decode_ready(requested: &str, body: &[u8]) -> Result<AccrualResult, AccrualError> {
    let wire: WireReply =
        serde_json::from_slice(body).map_err(|e| AccrualError::Decode(e.to_string()))?;

    if let Some(order) = wire.order.as_deref() {
        if order != requested {
            return Err(AccrualError::Decode(format!(
                "reply for order {order:?}, asked about {requested:?}"
            )));
        }
    }

    let status = map_external_status(&wire.status);
    let accrual = if status == OrderStatus::Processed {
        wire.accrual.unwrap_or(Micros::ZERO)
    } else {
        Micros::ZERO
    };
    if accrual.is_negative() {
        return Err(AccrualError::Decode(format!("negative accrual {accrual}")));
    }

    Ok(AccrualResult {
        order: requested.to_string(),
        status,
        accrual,
    })
}

#[async_trait]
impl AccrualSource for HttpAccrualClient {
    async fn query(&self, order_number: &str) -> Result<AccrualReply, AccrualError> {
        let resp = self
            .http
            .get(self.order_url(order_number))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        debug!(order = order_number, status = status.as_u16(), "accrual reply");

        match status {
            StatusCode::OK => {
                let body = resp.bytes().await.map_err(transport_error)?;
                decode_ready(order_number, &body).map(AccrualReply::Ready)
            }
            StatusCode::NO_CONTENT => Ok(AccrualReply::NotRegistered),
            StatusCode::TOO_MANY_REQUESTS => {
                let header = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok());
                Ok(AccrualReply::RateLimited {
                    retry_after: parse_retry_after(header),
                })
            }
            other => Err(AccrualError::Status(other.as_u16())),
        }
    }
}
