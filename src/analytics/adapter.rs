// src/analytics/adapter.rs

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::analytics::event_cache::EventCache;
use crate::analytics::sender::AnalyticsSender;
use crate::config::AnalyticsOptions;

pub const AUCTION_INIT: &str = "auctionInit";
pub const AUCTION_END: &str = "auctionEnd";
pub const PERFORMANCE_ENTRIES_EVENT_TYPE: &str = "performanceEntries";
pub const DEFAULT_SAMPLING_PERCENTAGE: f64 = 100.0;
pub const DEFAULT_SEND_DELAY_MS: u64 = 3000;

/// 已知的竞价端点，耗时记录归属于其 URL 包含的第一个端点
const BIDDING_ENDPOINTS: [(&str, &str); 2] = [
    ("appnexus", "//ib.adnxs.com/ut/v3/prebid"),
    ("criteo", "//bidder.criteo.com/cdb"),
];

/// 单条资源耗时记录，格式同浏览器 performance timeline
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEntry {
    pub name: String,
    #[serde(default)]
    pub entry_type: String,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub duration: f64,
}

/// 耗时记录来源，宿主没有 timeline 时返回 `None`
pub trait PerformanceSource: Send + Sync {
    fn entries(&self) -> Option<Vec<PerformanceEntry>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoPerformanceTimeline;

impl PerformanceSource for NoPerformanceTimeline {
    fn entries(&self) -> Option<Vec<PerformanceEntry>> {
        None
    }
}

pub fn bidder_for_url(url: &str) -> Option<&'static str> {
    BIDDING_ENDPOINTS
        .iter()
        .find(|(_, endpoint)| url.contains(endpoint))
        .map(|(bidder, _)| *bidder)
}

/// 解析后的分析上报配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyticsSettings {
    pub sampling_percentage: f64,
    pub send_delay: Duration,
}

impl AnalyticsSettings {
    pub fn from_options(options: &AnalyticsOptions) -> Self {
        let sampling_percentage = options
            .sampling_percentage
            .filter(|p| (0.0..=100.0).contains(p))
            .unwrap_or(DEFAULT_SAMPLING_PERCENTAGE);
        let send_delay = Duration::from_millis(options.send_delay_ms.unwrap_or(DEFAULT_SEND_DELAY_MS));
        Self {
            sampling_percentage,
            send_delay,
        }
    }
}

/// Criteo 分析适配器：缓存拍卖事件，拍卖结束后延迟批量上报
pub struct CriteoAnalyticsAdapter {
    settings: AnalyticsSettings,
    cache: EventCache,
    performance: Arc<dyn PerformanceSource>,
    sender: AnalyticsSender,
}

impl CriteoAnalyticsAdapter {
    pub fn enable(
        options: &AnalyticsOptions,
        performance: Arc<dyn PerformanceSource>,
        sender: AnalyticsSender,
    ) -> Arc<Self> {
        let settings = AnalyticsSettings::from_options(options);
        info!(
            sampling = settings.sampling_percentage,
            send_delay_ms = settings.send_delay.as_millis(),
            "Criteo analytics enabled"
        );
        Arc::new(Self {
            settings,
            cache: EventCache::new(),
            performance,
            sender,
        })
    }

    pub fn settings(&self) -> AnalyticsSettings {
        self.settings
    }

    pub fn track(self: &Arc<Self>, event_type: &str, args: &Value) {
        let now = Utc::now().timestamp_millis();
        match event_type {
            AUCTION_INIT => {
                let start = args.get("timestamp").and_then(Value::as_i64).filter(|t| *t != 0).unwrap_or(now);
                self.cache.set_auction_start(start);
                self.cache.cache(event_type, args, now);
            }
            AUCTION_END => {
                self.cache.cache(event_type, args, now);
                self.schedule_flush();
            }
            _ => self.cache.cache(event_type, args, now),
        }
    }

    fn schedule_flush(self: &Arc<Self>) {
        let adapter = self.clone();
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(adapter.settings.send_delay).await;
                    adapter.cache_performance_entries();
                    if let Some(batch) = adapter.flush() {
                        adapter.sender.send(batch).await;
                    }
                });
            }
            Err(_) => warn!("no async runtime, analytics flush skipped"),
        }
    }

    /// 按出价方归组已知竞价端点的耗时记录；没有 timeline 时不缓存
    pub fn cache_performance_entries(&self) {
        let Some(entries) = self.performance.entries() else {
            debug!("no performance timeline, entries not captured");
            return;
        };
        let mut grouped: Map<String, Value> = Map::new();
        for entry in entries {
            let bidder = match bidder_for_url(&entry.name) {
                Some(bidder) if entry.duration != 0.0 => bidder,
                _ => continue,
            };
            let value = match serde_json::to_value(&entry) {
                Ok(value) => value,
                Err(e) => {
                    warn!(error = %e, "unable to serialize performance entry");
                    continue;
                }
            };
            if let Value::Array(list) = grouped
                .entry(bidder.to_string())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                list.push(value);
            }
        }
        self.cache.put(PERFORMANCE_ENTRIES_EVENT_TYPE, Value::Object(grouped));
    }

    /// 取出缓存批次；本轮未被采样时保留缓存
    pub fn flush(&self) -> Option<String> {
        let draw = rand::thread_rng().gen_range(0..100) as f64;
        if self.settings.sampling_percentage <= draw {
            info!("Analytics not sent request sampled.");
            return None;
        }
        let events = self.cache.take();
        match serde_json::to_string(&events) {
            Ok(batch) => {
                info!(event_types = events.len(), "Sending analytics events");
                Some(batch)
            }
            Err(e) => {
                warn!(error = %e, "unable to serialize analytics batch");
                None
            }
        }
    }

    pub fn cached_event_types(&self) -> usize {
        self.cache.len()
    }
}
