// src/config/mod.rs

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod file_source;

pub use file_source::FileConfigSource;

pub const BIDDER_CODE: &str = "criteo";
pub const ADAPTER_VERSION: u32 = 18;
pub const PROFILE_ID_INLINE: u32 = 207;
pub const PROFILE_ID_PUBLISHERTAG: u32 = 185;
pub const CRITEO_VENDOR_ID: u32 = 91;
pub const CDB_ENDPOINT: &str = "https://bidder.criteo.com/cdb";
pub const PUBLISHER_TAG_URL: &str = "https://static.criteo.net/js/ld/publishertag.prebid.js";
pub const FAST_BID_STORAGE_KEY: &str = "criteo_fast_bid";
pub const FAST_BID_HASH_PREFIX: &str = "// Hash: ";
pub const ANALYTICS_ENDPOINT: &str = "https://bidder.criteo.com/prebid/analytics";

/// 适配器运行配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdapterConfig {
    pub cdb_endpoint: String,
    pub profile_id_inline: u32,
    pub profile_id_publishertag: u32,
    pub adapter_version: u32,
    pub vendor_id: u32,
    /// 调用方拍卖引擎的版本，以 `wv` 上报
    pub wrapper_version: String,
    pub publisher_tag_url: String,
    pub fast_bid_storage_key: String,
    pub fast_bid_hash_prefix: String,
    /// 调用 CDB 前等待快速路径的时长（毫秒）
    pub fast_bid_grace_ms: u64,
    /// 哈希邮箱，覆盖 bidder request 中的值
    pub ceh: Option<String>,
    pub http_timeout_ms: Option<u64>,
    pub analytics: AnalyticsOptions,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            cdb_endpoint: CDB_ENDPOINT.to_string(),
            profile_id_inline: PROFILE_ID_INLINE,
            profile_id_publishertag: PROFILE_ID_PUBLISHERTAG,
            adapter_version: ADAPTER_VERSION,
            vendor_id: CRITEO_VENDOR_ID,
            wrapper_version: env!("CARGO_PKG_VERSION").to_string(),
            publisher_tag_url: PUBLISHER_TAG_URL.to_string(),
            fast_bid_storage_key: FAST_BID_STORAGE_KEY.to_string(),
            fast_bid_hash_prefix: FAST_BID_HASH_PREFIX.to_string(),
            fast_bid_grace_ms: 50,
            ceh: None,
            http_timeout_ms: None,
            analytics: AnalyticsOptions::default(),
        }
    }
}

impl AdapterConfig {
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            cdb_endpoint: endpoint.to_string(),
            ..Self::default()
        }
    }

    pub fn fast_bid_grace(&self) -> Duration {
        Duration::from_millis(self.fast_bid_grace_ms)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_ms.map(Duration::from_millis)
    }
}

/// 分析上报配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyticsOptions {
    pub endpoint: String,
    pub sampling_percentage: Option<f64>,
    pub send_delay_ms: Option<u64>,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            endpoint: ANALYTICS_ENDPOINT.to_string(),
            sampling_percentage: None,
            send_delay_ms: None,
        }
    }
}
