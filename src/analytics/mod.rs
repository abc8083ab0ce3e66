// src/analytics/mod.rs

pub mod adapter;
pub mod event_cache;
pub mod sender;

pub use adapter::{
    bidder_for_url, AnalyticsSettings, CriteoAnalyticsAdapter, NoPerformanceTimeline, PerformanceEntry,
    PerformanceSource, AUCTION_END, AUCTION_INIT,
};
pub use event_cache::EventCache;
pub use sender::AnalyticsSender;
