// src/model/mod.rs

use serde_json::Value;

pub mod bid;
pub mod bid_request;
pub mod bidder_request;
pub mod context;

pub use bid::{MediaType, NormalizedBid};
pub use bid_request::{
    BannerMediaType, BidParams, BidRequest, MediaTypes, NativeCallback, Sizes, VideoMediaType,
    VideoParams, ZoneId,
};
pub use bidder_request::{BidderRequest, GdprConsent, IntegrationMode, VendorData};
pub use context::CdbContext;

/// Loose truthiness for flags the auction engine may send as bool, 0/1 or strings.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
