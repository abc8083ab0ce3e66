// src/cdb/response.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// 传输层返回：包裹形式 `{ body, status }` 或直接的 JSON 对象
#[derive(Debug, Clone, PartialEq)]
pub enum ServerResponse {
    Envelope { status: u16, body: Option<Value> },
    Bare(Value),
}

impl ServerResponse {
    pub fn body(&self) -> Option<&Value> {
        match self {
            ServerResponse::Envelope { body, .. } => body.as_ref(),
            ServerResponse::Bare(value) => Some(value),
        }
    }
}

/// CDB 返回的单个报价
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSlot {
    pub impid: String,
    #[serde(default)]
    pub bid_id: Option<String>,
    #[serde(default)]
    pub cpm: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub deal_code: Option<String>,
    #[serde(default)]
    pub zoneid: Option<i64>,
    #[serde(default)]
    pub creative: Option<String>,
    #[serde(default)]
    pub native: Option<Value>,
    #[serde(default)]
    pub video: Option<bool>,
    #[serde(default)]
    pub displayurl: Option<String>,
}

/// 每个 slot 恰好一种创意类型
#[derive(Debug, Clone, PartialEq)]
pub enum SlotCreative<'a> {
    Native(&'a Value),
    Video { display_url: Option<&'a str> },
    Html(Option<&'a str>),
}

impl ResponseSlot {
    /// 原生优先于视频，视频优先于普通创意
    pub fn creative_kind(&self) -> SlotCreative<'_> {
        if let Some(native) = self.native.as_ref().filter(|v| !v.is_null()) {
            SlotCreative::Native(native)
        } else if self.video.unwrap_or(false) {
            SlotCreative::Video {
                display_url: self.displayurl.as_deref(),
            }
        } else {
            SlotCreative::Html(self.creative.as_deref())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WireResponse {
    pub slots: Vec<ResponseSlot>,
}

impl WireResponse {
    /// 反序列化失败的 slot 逐个丢弃，其余保留
    pub fn from_body(body: Option<&Value>) -> Self {
        let raw_slots = match body.and_then(|b| b.get("slots")).and_then(Value::as_array) {
            Some(slots) => slots,
            None => return Self::default(),
        };
        let slots = raw_slots
            .iter()
            .filter_map(|raw| match ResponseSlot::deserialize(raw) {
                Ok(slot) => Some(slot),
                Err(e) => {
                    debug!(error = %e, "dropping malformed CDB slot");
                    None
                }
            })
            .collect();
        Self { slots }
    }
}
