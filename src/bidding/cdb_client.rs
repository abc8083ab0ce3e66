// src/bidding/cdb_client.rs

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

use crate::cdb::{CdbRequest, ServerResponse};
use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result};

/// CDB 传输层：text/plain POST，带 cookie，不做重试
#[derive(Clone)]
pub struct CdbClient {
    client: Client,
}

impl CdbClient {
    pub fn new(config: &AdapterConfig) -> Result<Self> {
        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = config.http_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// 发送一次 CDB 调用。非 2xx 为错误；204 或空 body 视为无出价
    pub async fn send(&self, request: &CdbRequest) -> Result<ServerResponse> {
        let start = Instant::now();
        let body = match &request.data {
            Value::String(raw) => raw.clone(),
            data => serde_json::to_string(data)?,
        };
        let response = self
            .client
            .post(&request.url)
            .header("Content-Type", "text/plain")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let elapsed = start.elapsed().as_millis();
        if !status.is_success() {
            warn!(url = %request.url, status = status.as_u16(), elapsed_ms = elapsed, "CDB call failed");
            return Err(AdapterError::Status(status.as_u16()));
        }

        let mut bytes = response.bytes().await?.to_vec();
        debug!(status = status.as_u16(), bytes = bytes.len(), elapsed_ms = elapsed, "CDB answered");
        if status == StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(ServerResponse::Envelope {
                status: status.as_u16(),
                body: None,
            });
        }

        let raw = String::from_utf8_lossy(&bytes).into_owned();
        let body = match simd_json::serde::from_slice::<Value>(&mut bytes) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "CDB body is not JSON, keeping it raw");
                Value::String(raw)
            }
        };
        Ok(ServerResponse::Envelope {
            status: status.as_u16(),
            body: Some(body),
        })
    }
}
