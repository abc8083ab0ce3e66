// src/bidding/adapter.rs

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bidding::cdb_client::CdbClient;
use crate::bidding::native::NativeSlotRegistry;
use crate::bidding::translator;
use crate::bidding::BidderSpec;
use crate::cdb::{CdbRequest, ServerResponse};
use crate::config::{AdapterConfig, BIDDER_CODE};
use crate::error::Result;
use crate::fastbid::{
    FastBidFuture, FastBidLoader, PubTagAdapter, PubTagBuildArgs, PublisherTag, PublisherTagProvider, ScriptLoader,
};
use crate::model::{BidRequest, BidderRequest, NormalizedBid};

/// 延迟调用的 CDB 应答，`None` 表示无出价
pub type DeferredResponse = BoxFuture<'static, Option<ServerResponse>>;

/// 交给拍卖引擎的请求：发布者标签接管时直接给出 URL/body，否则为延迟执行的调用
pub enum ServerRequest {
    Direct {
        url: String,
        data: Value,
        auction_id: Option<String>,
        bid_requests: Vec<BidRequest>,
    },
    Deferred {
        response: DeferredResponse,
        auction_id: Option<String>,
        bid_requests: Vec<BidRequest>,
    },
}

impl ServerRequest {
    pub fn bid_requests(&self) -> &[BidRequest] {
        match self {
            ServerRequest::Direct { bid_requests, .. } | ServerRequest::Deferred { bid_requests, .. } => bid_requests,
        }
    }

    pub fn auction_id(&self) -> Option<&str> {
        match self {
            ServerRequest::Direct { auction_id, .. } | ServerRequest::Deferred { auction_id, .. } => auction_id.as_deref(),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, ServerRequest::Deferred { .. })
    }
}

/// 拍卖引擎上报的超时出价
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimedOutBid {
    pub bidder: String,
    pub ad_unit_code: String,
    pub bid_id: String,
    #[serde(default)]
    pub auction_id: Option<String>,
    #[serde(default)]
    pub timeout: u64,
}

enum FastPath {
    Spawned(JoinHandle<Option<bool>>),
    Inline(FastBidFuture),
}

/// Criteo 出价适配器
pub struct CriteoBidAdapter {
    config: AdapterConfig,
    provider: Arc<dyn PublisherTagProvider>,
    loader: FastBidLoader,
    client: CdbClient,
    script_loader: Arc<dyn ScriptLoader>,
    native_slots: Arc<NativeSlotRegistry>,
}

impl CriteoBidAdapter {
    pub fn new(
        config: AdapterConfig,
        provider: Arc<dyn PublisherTagProvider>,
        loader: FastBidLoader,
        client: CdbClient,
        script_loader: Arc<dyn ScriptLoader>,
        native_slots: Arc<NativeSlotRegistry>,
    ) -> Self {
        Self {
            config,
            provider,
            loader,
            client,
            script_loader,
            native_slots,
        }
    }

    fn with_configured_ceh(&self, bidder_request: &BidderRequest) -> BidderRequest {
        let mut bidder_request = bidder_request.clone();
        if let Some(ceh) = &self.config.ceh {
            bidder_request.ceh = Some(ceh.clone());
        }
        bidder_request
    }

    fn schedule_publisher_tag_reload(&self, after: Duration) {
        let script_loader = self.script_loader.clone();
        let url = self.config.publisher_tag_url.clone();
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(after).await;
                    script_loader.load_external_script(&url, BIDDER_CODE);
                });
            }
            Err(_) => warn!("no async runtime, publisher tag reload skipped"),
        }
    }

    fn kick_off_fast_path(&self) -> Option<FastPath> {
        let pending = self.loader.try_load()?;
        Some(match Handle::try_current() {
            Ok(handle) => FastPath::Spawned(handle.spawn(pending)),
            Err(_) => FastPath::Inline(pending),
        })
    }

    /// 发布者标签已安装且认识该拍卖时，返回其对应的适配器
    fn pub_tag_adapter(&self, auction_id: Option<&str>) -> Option<Arc<dyn PubTagAdapter>> {
        let tag = self.provider.publisher_tag()?;
        let auction_id = auction_id.unwrap_or_default();
        let adapter = tag.get_adapter(auction_id);
        if adapter.is_none() {
            debug!(auction_id, "publisher tag has no adapter for auction");
        }
        adapter
    }
}

/// 构建一次 CDB 调用，已安装发布者标签时由标签构建
fn build_cdb_call(
    provider: &dyn PublisherTagProvider,
    config: &AdapterConfig,
    bid_requests: &[BidRequest],
    bidder_request: &BidderRequest,
) -> Result<CdbRequest> {
    match provider.publisher_tag() {
        Some(tag) => Ok(pub_tag_call(tag.as_ref(), config, bid_requests, bidder_request)),
        None => translator::build_request(config, bid_requests, bidder_request),
    }
}

fn pub_tag_call(
    tag: &dyn PublisherTag,
    config: &AdapterConfig,
    bid_requests: &[BidRequest],
    bidder_request: &BidderRequest,
) -> CdbRequest {
    let adapter = tag.create_adapter(PubTagBuildArgs {
        profile_id: config.profile_id_publishertag,
        adapter_version: config.adapter_version,
        bid_requests,
        bidder_request,
        wrapper_version: &config.wrapper_version,
    });
    CdbRequest {
        url: adapter.build_cdb_url(),
        data: adapter.build_cdb_request(),
    }
}

async fn await_fast_path(fast_path: FastPath, grace: Duration) {
    let outcome = match fast_path {
        FastPath::Spawned(mut handle) => match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(error = %e, "FastBid task failed");
                None
            }
            Err(_) => {
                debug!(grace_ms = grace.as_millis(), "FastBid still verifying, calling CDB anyway");
                return;
            }
        },
        FastPath::Inline(pending) => pending.await,
    };
    debug!(?outcome, "FastBid settled");
}

fn auction_id_of(bid_requests: &[BidRequest], bidder_request: &BidderRequest) -> Option<String> {
    bidder_request
        .auction_id
        .clone()
        .or_else(|| bid_requests.iter().find_map(|bid| bid.auction_id.clone()))
}

impl BidderSpec for CriteoBidAdapter {
    fn code(&self) -> &str {
        BIDDER_CODE
    }

    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool {
        translator::is_bid_request_valid(bid)
    }

    fn build_requests(&self, bid_requests: &[BidRequest], bidder_request: &BidderRequest) -> ServerRequest {
        let bidder_request = self.with_configured_ceh(bidder_request);
        let auction_id = auction_id_of(bid_requests, &bidder_request);

        if let Some(tag) = self.provider.publisher_tag() {
            let request = pub_tag_call(tag.as_ref(), &self.config, bid_requests, &bidder_request);
            return ServerRequest::Direct {
                url: request.url,
                data: request.data,
                auction_id,
                bid_requests: bid_requests.to_vec(),
            };
        }

        let fast_path = self.kick_off_fast_path();
        self.schedule_publisher_tag_reload(bidder_request.timeout());

        let provider = self.provider.clone();
        let config = self.config.clone();
        let client = self.client.clone();
        let bids = bid_requests.to_vec();
        let grace = self.config.fast_bid_grace();
        let response: DeferredResponse = Box::pin(async move {
            if let Some(fast_path) = fast_path {
                await_fast_path(fast_path, grace).await;
            }
            let request = match build_cdb_call(provider.as_ref(), &config, &bids, &bidder_request) {
                Ok(request) => request,
                Err(e) => {
                    error!(error = %e, "Unable to call criteo");
                    return None;
                }
            };
            match client.send(&request).await {
                Ok(response) => Some(response),
                Err(e) => {
                    error!(error = %e, url = %request.url, "Unable to call criteo");
                    None
                }
            }
        });

        info!(slots = bid_requests.len(), "CDB call deferred");
        ServerRequest::Deferred {
            response,
            auction_id,
            bid_requests: bid_requests.to_vec(),
        }
    }

    fn interpret_response(&self, response: Option<&ServerResponse>, request: &ServerRequest) -> Vec<NormalizedBid> {
        let body = response.and_then(ServerResponse::body);
        if let Some(adapter) = self.pub_tag_adapter(request.auction_id()) {
            return adapter.interpret_response(body, request.bid_requests());
        }
        let bids = translator::parse_wire_response(body, request.bid_requests(), &self.native_slots);
        debug!(bids = bids.len(), "CDB response interpreted");
        bids
    }

    fn on_timeout(&self, timed_out: &TimedOutBid) {
        if let Some(adapter) = self.pub_tag_adapter(timed_out.auction_id.as_deref()) {
            adapter.handle_bid_timeout();
        }
    }

    fn on_bid_won(&self, bid: &NormalizedBid) {
        if let Some(adapter) = self.pub_tag_adapter(bid.auction_id.as_deref()) {
            adapter.handle_bid_won(bid);
        }
    }

    fn on_set_targeting(&self, bid: &NormalizedBid) {
        if let Some(adapter) = self.pub_tag_adapter(bid.auction_id.as_deref()) {
            adapter.handle_set_targeting(bid);
        }
    }
}
