// src/mock_cdb.rs

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::post, serve, Json, Router};
use rand::Rng;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::cdb::{Slot, WireRequest};
use crate::error::Result;

/// 以此前缀开头的 impid 永远不出价
pub const NO_BID_PREFIX: &str = "nobid";

/// 记录 Mock CDB 收到的请求，便于测试断言
#[derive(Debug, Default)]
pub struct MockCdbState {
    pub requests: Mutex<Vec<WireRequest>>,
    pub analytics_batches: Mutex<Vec<Value>>,
}

impl MockCdbState {
    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn analytics_batches(&self) -> Vec<Value> {
        self.analytics_batches.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

fn slot_answer(slot: &Slot) -> Value {
    let cpm: f64 = rand::thread_rng().gen_range(0.5..3.0);
    let mut answer = json!({
        "impid": slot.impid,
        "bidId": format!("bid-{}", slot.impid),
        "cpm": (cpm * 100.0).round() / 100.0,
        "currency": "EUR",
        "ttl": 300,
    });
    if let Some(zone) = slot.zoneid.as_ref().and_then(|z| z.as_integer()) {
        answer["zoneid"] = json!(zone);
    }
    if let Some(size) = slot.sizes.first().and_then(|s| s.split_once('x')) {
        answer["width"] = json!(size.0.parse::<u32>().unwrap_or(0));
        answer["height"] = json!(size.1.parse::<u32>().unwrap_or(0));
    }

    if slot.native == Some(true) {
        answer["native"] = json!({
            "products": [{"title": "Mock Native Ad", "image": {"url": "http://example.com/native.jpg"}}]
        });
    } else if slot.video.is_some() {
        answer["video"] = json!(true);
        answer["displayurl"] = json!(format!("http://cdb-mock.local/vast?impid={}", slot.impid));
    } else {
        answer["creative"] = json!(format!(
            "<html><body>Mock CDB Banner Ad<img src=\"http://cdb-mock.local/impression?impid={}\" style=\"display:none;\" /></body></html>",
            slot.impid
        ));
    }
    answer
}

/// 模拟 CDB 竞价：请求体为 text/plain 的 JSON，无出价时返回 204
async fn handle_cdb(State(state): State<Arc<MockCdbState>>, body: String) -> Response {
    let request: WireRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Mock CDB received an unreadable request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    info!(slot_count = request.slots.len(), "Mock CDB received request");

    let delay_ms = rand::thread_rng().gen_range(5..30);
    sleep(Duration::from_millis(delay_ms)).await;

    let slots: Vec<Value> = request
        .slots
        .iter()
        .filter(|slot| !slot.impid.starts_with(NO_BID_PREFIX))
        .map(slot_answer)
        .collect();
    if let Ok(mut requests) = state.requests.lock() {
        requests.push(request);
    }

    if slots.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }
    (StatusCode::OK, Json(json!({ "slots": slots }))).into_response()
}

async fn handle_analytics(State(state): State<Arc<MockCdbState>>, body: String) -> StatusCode {
    match serde_json::from_str::<Value>(&body) {
        Ok(batch) => {
            if let Ok(mut batches) = state.analytics_batches.lock() {
                batches.push(batch);
            }
            StatusCode::OK
        }
        Err(_) => StatusCode::BAD_REQUEST,
    }
}

pub fn router(state: Arc<MockCdbState>) -> Router {
    Router::new()
        .route("/cdb", post(handle_cdb))
        .route("/prebid/analytics", post(handle_analytics))
        .with_state(state)
}

/// 运行中的 Mock CDB 及其已记录的数据
pub struct MockCdb {
    pub addr: SocketAddr,
    pub state: Arc<MockCdbState>,
}

impl MockCdb {
    pub fn cdb_url(&self) -> String {
        format!("http://{}/cdb", self.addr)
    }

    pub fn analytics_url(&self) -> String {
        format!("http://{}/prebid/analytics", self.addr)
    }
}

/// 在回环地址上绑定随机端口
pub async fn spawn_mock_cdb() -> Result<MockCdb> {
    spawn_mock_cdb_on("127.0.0.1:0").await
}

/// 启动 Mock CDB 服务，路由为 `/cdb` 与 `/prebid/analytics`
pub async fn spawn_mock_cdb_on(bind: &str) -> Result<MockCdb> {
    let listener = TcpListener::bind(bind).await?;
    let addr = listener.local_addr()?;
    let state = Arc::new(MockCdbState::default());
    let app = router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = serve(listener, app).await {
            warn!(error = %e, "Mock CDB stopped");
        }
    });
    info!("Mock CDB running at http://{}", addr);
    Ok(MockCdb { addr, state })
}
