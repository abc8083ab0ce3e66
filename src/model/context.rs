// src/model/context.rs

use url::Url;

use crate::model::{BidRequest, BidderRequest, IntegrationMode};

/// 一次 CDB 调用的页面上下文
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CdbContext {
    pub url: String,
    pub debug: bool,
    pub no_log: bool,
    pub amp: bool,
}

impl CdbContext {
    pub fn new(bid_requests: &[BidRequest], bidder_request: &BidderRequest) -> Self {
        let url = bidder_request.page_url.clone();
        let (debug, no_log) = match Url::parse(&url) {
            Ok(parsed) => {
                let flag = |name: &str| parsed.query_pairs().any(|(k, v)| k == name && v == "1");
                (flag("pbt_debug"), flag("pbt_nolog"))
            }
            Err(_) => (false, false),
        };
        let amp = bidder_request.integration_mode == Some(IntegrationMode::Amp)
            || bid_requests.iter().any(BidRequest::is_amp);
        Self { url, debug, no_log, amp }
    }
}
