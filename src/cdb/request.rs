// src/cdb/request.rs

use serde::{Deserialize, Serialize};

use crate::model::ZoneId;

/// CDB 请求体
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    pub publisher: Publisher,
    pub slots: Vec<Slot>,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr_consent: Option<GdprConsentBlock>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Publisher {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networkid: Option<u64>,
}

/// 单个广告位描述
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Slot {
    pub impid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactionid: Option<String>,
    #[serde(rename = "auctionId", skip_serializing_if = "Option::is_none")]
    pub auction_id: Option<String>,
    pub sizes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoneid: Option<ZoneId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publishersubid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoSlot>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VideoSlot {
    pub playersizes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minduration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playbackmethod: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startdelay: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceh: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GdprConsentBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr_applies: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_given: Option<bool>,
    /// `Some(None)` 以显式 null 发送
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_data: Option<Option<String>>,
}

/// 可直接发送的调用：完整 URL 加 JSON 请求体
#[derive(Debug, Clone, PartialEq)]
pub struct CdbRequest {
    pub url: String,
    pub data: serde_json::Value,
}
