// src/analytics/event_cache.rs

use serde_json::{Map, Value};
use std::sync::Mutex;
use tracing::{info, warn};

pub const DURATION_FIELD: &str = "durationSinceAuctionStart";

/// 分析事件缓存：按事件类型归档，每条事件附带距拍卖开始的耗时
#[derive(Debug, Default)]
pub struct EventCache {
    auction_start_ms: Mutex<i64>,
    events: Mutex<Map<String, Value>>,
}

impl EventCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_auction_start(&self, start_ms: i64) {
        match self.auction_start_ms.lock() {
            Ok(mut start) => *start = start_ms,
            Err(e) => warn!(error = %e, "auction start clock poisoned"),
        }
    }

    pub fn auction_start(&self) -> i64 {
        self.auction_start_ms.lock().map(|start| *start).unwrap_or(0)
    }

    /// 存储 `event` 的副本，不修改调用方的值
    pub fn cache(&self, event_type: &str, event: &Value, now_ms: i64) {
        let mut cloned = event.clone();
        let duration = now_ms - self.auction_start();
        match cloned.as_object_mut() {
            Some(fields) => {
                fields.insert(DURATION_FIELD.to_string(), Value::from(duration));
            }
            None => {
                let mut fields = Map::new();
                fields.insert("value".to_string(), cloned);
                fields.insert(DURATION_FIELD.to_string(), Value::from(duration));
                cloned = Value::Object(fields);
            }
        }
        info!(event_type, duration_ms = duration, "Caching event");

        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "event cache poisoned, event dropped");
                return;
            }
        };
        match events
            .entry(event_type.to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(list) => list.push(cloned),
            other => *other = Value::Array(vec![cloned]),
        }
    }

    /// 覆盖 `event_type` 下已有的内容
    pub fn put(&self, event_type: &str, value: Value) {
        if let Ok(mut events) = self.events.lock() {
            events.insert(event_type.to_string(), value);
        }
    }

    /// 换入空缓存，返回已收集的内容
    pub fn take(&self) -> Map<String, Value> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_are_copied_and_timed() {
        let cache = EventCache::new();
        cache.set_auction_start(1_000);
        let event = json!({"bidder": "criteo"});

        cache.cache("bidRequested", &event, 1_250);
        cache.cache("bidRequested", &event, 1_300);

        assert_eq!(event, json!({"bidder": "criteo"}));
        let events = cache.take();
        assert_eq!(
            events["bidRequested"],
            json!([
                {"bidder": "criteo", "durationSinceAuctionStart": 250},
                {"bidder": "criteo", "durationSinceAuctionStart": 300}
            ])
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn scalar_events_are_wrapped() {
        let cache = EventCache::new();
        cache.cache("custom", &json!(42), 10);
        assert_eq!(cache.take()["custom"], json!([{"value": 42, "durationSinceAuctionStart": 10}]));
    }

    #[test]
    fn put_replaces_and_take_empties() {
        let cache = EventCache::new();
        cache.cache("performanceEntries", &json!({}), 0);
        cache.put("performanceEntries", json!({"criteo": []}));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take()["performanceEntries"], json!({"criteo": []}));
        assert!(cache.take().is_empty());
    }
}
