// src/bidding/mod.rs

pub mod adapter;
pub mod cdb_client;
pub mod native;
pub mod translator;

pub use adapter::{CriteoBidAdapter, DeferredResponse, ServerRequest, TimedOutBid};
pub use cdb_client::CdbClient;
pub use native::{top_window_slots, NativeSlotRegistry};

use crate::cdb::ServerResponse;
use crate::model::{BidRequest, BidderRequest, NormalizedBid};

/// 拍卖引擎调用的出价方契约
pub trait BidderSpec: Send + Sync {
    fn code(&self) -> &str;

    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool;

    fn build_requests(&self, bid_requests: &[BidRequest], bidder_request: &BidderRequest) -> ServerRequest;

    /// 不会失败：响应中无法使用的部分直接丢弃
    fn interpret_response(&self, response: Option<&ServerResponse>, request: &ServerRequest) -> Vec<NormalizedBid>;

    fn on_timeout(&self, _timed_out: &TimedOutBid) {}

    fn on_bid_won(&self, _bid: &NormalizedBid) {}

    fn on_set_targeting(&self, _bid: &NormalizedBid) {}
}
