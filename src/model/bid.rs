// src/model/bid.rs

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Banner,
    Video,
}

/// 拍卖引擎期望的出价结构
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedBid {
    pub request_id: String,
    pub ad_id: String,
    pub cpm: f64,
    pub currency: Option<String>,
    pub net_revenue: bool,
    pub ttl: u32,
    pub creative_id: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub deal_id: Option<String>,
    pub media_type: MediaType,
    /// HTML 创意，或原生广告的引导脚本
    pub ad: Option<String>,
    pub vast_url: Option<String>,
    /// 拍卖引擎回传出价做通知时填写
    #[serde(default)]
    pub auction_id: Option<String>,
}
