// src/model/bidder_request.rs

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::model::truthy;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMode {
    InPage,
    Amp,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct VendorData {
    #[serde(default)]
    pub vendor_consents: HashMap<String, Value>,
}

/// 区分显式的 `null` 与缺失字段：出现过的字段一律为 `Some`
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// GDPR 同意信息，三个字段各自独立，缺失即不上报；显式的 null 仍算作已提供
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GdprConsent {
    #[serde(default, deserialize_with = "present")]
    pub gdpr_applies: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub consent_string: Option<Option<String>>,
    pub vendor_data: Option<VendorData>,
}

impl GdprConsent {
    pub fn applies(&self) -> Option<bool> {
        self.gdpr_applies.as_ref().map(truthy)
    }

    pub fn vendor_consent(&self, vendor_id: u32) -> Option<bool> {
        self.vendor_data
            .as_ref()?
            .vendor_consents
            .get(&vendor_id.to_string())
            .map(truthy)
    }
}

/// 同一轮拍卖内所有 BidRequest 共享的上下文
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BidderRequest {
    #[serde(default)]
    pub auction_id: Option<String>,
    /// 拍卖超时预算，单位毫秒
    #[serde(default)]
    pub timeout: u64,
    /// 拍卖引擎看到的顶层页面 URL
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub gdpr_consent: Option<GdprConsent>,
    #[serde(default)]
    pub ceh: Option<String>,
    #[serde(default)]
    pub integration_mode: Option<IntegrationMode>,
}

impl BidderRequest {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}
