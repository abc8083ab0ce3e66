// src/bidding/translator.rs

//! 拍卖引擎询价请求与 CDB 协议格式之间的转换

use rand::Rng;
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use crate::bidding::native::{create_native_ad, NativeSlotRegistry};
use crate::cdb::{
    CdbRequest, GdprConsentBlock, Publisher, ResponseSlot, Slot, SlotCreative, User, VideoSlot,
    WireRequest, WireResponse,
};
use crate::config::AdapterConfig;
use crate::error::Result;
use crate::model::{BidRequest, BidderRequest, CdbContext, MediaType, NormalizedBid, ZoneId};

pub const DEFAULT_TTL: u32 = 60;
const CACHE_BUSTER_BOUND: u64 = 99_999_999_999;

/// 校验询价请求：必须有 zoneId 或 networkId，视频请求需满足全部视频约束
pub fn is_bid_request_valid(bid: &BidRequest) -> bool {
    if !bid.has_id_param() {
        return false;
    }
    if bid.video().is_some() && !has_valid_video_media_type(bid) {
        return false;
    }
    true
}

pub fn has_valid_video_media_type(bid: &BidRequest) -> bool {
    let (params, media) = match bid.video() {
        Some(video) => video,
        None => return false,
    };

    let required_media = [
        ("mimes", media.mimes.is_some()),
        ("playerSize", media.player_size.is_some()),
        ("maxduration", media.maxduration.is_some()),
        ("protocols", media.protocols.is_some()),
        ("api", media.api.is_some()),
    ];
    let required_params = [
        ("skip", params.skip.is_some()),
        ("placement", params.placement.is_some()),
        ("playbackmethod", params.playbackmethod.is_some()),
    ];

    let mut valid = true;
    for (name, present) in required_media {
        if !present {
            error!("Criteo Bid Adapter: mediaTypes.video.{} is required", name);
            valid = false;
        }
    }
    for (name, present) in required_params {
        if !present {
            error!("Criteo Bid Adapter: params.video.{} is required", name);
            valid = false;
        }
    }
    if !valid {
        return false;
    }

    // 不支持长视频；context 与 placement 必须一致
    match (media.context.as_deref(), params.placement) {
        (Some("instream"), Some(placement)) => placement == 1,
        (Some("outstream"), Some(placement)) => placement != 1,
        _ => false,
    }
}

/// CDB URL：带防缓存参数，以及可选的 debug、nolog、AMP 开关
pub fn build_cdb_url(config: &AdapterConfig, context: &CdbContext) -> String {
    let cache_buster = rand::thread_rng().gen_range(0..CACHE_BUSTER_BOUND);
    let mut url = format!(
        "{}?profileId={}&av={}&wv={}&cb={}",
        config.cdb_endpoint,
        config.profile_id_inline,
        config.adapter_version,
        urlencoding::encode(&config.wrapper_version),
        cache_buster
    );
    if context.amp {
        url.push_str("&im=1");
    }
    if context.debug {
        url.push_str("&debug=1");
    }
    if context.no_log {
        url.push_str("&nolog=1");
    }
    url
}

pub fn build_wire_request(
    config: &AdapterConfig,
    context: &CdbContext,
    bid_requests: &[BidRequest],
    bidder_request: &BidderRequest,
) -> WireRequest {
    let mut network_id = None;
    let slots = bid_requests
        .iter()
        .map(|bid| {
            network_id = bid.params.network_id().or(network_id);
            build_slot(bid)
        })
        .collect();

    let gdpr_consent = bidder_request
        .gdpr_consent
        .as_ref()
        .map(|consent| GdprConsentBlock {
            gdpr_applies: consent.applies(),
            consent_given: consent.vendor_consent(config.vendor_id),
            consent_data: consent.consent_string.clone(),
        });

    WireRequest {
        publisher: Publisher {
            url: context.url.clone(),
            networkid: network_id,
        },
        slots,
        user: User {
            ceh: bidder_request.ceh.clone(),
        },
        gdpr_consent,
    }
}

fn build_slot(bid: &BidRequest) -> Slot {
    let video = bid.video().map(|(params, media)| VideoSlot {
        playersizes: media
            .player_size
            .as_ref()
            .map(|sizes| sizes.tokens())
            .unwrap_or_default(),
        mimes: media.mimes.clone(),
        protocols: media.protocols.clone(),
        maxduration: media.maxduration,
        api: media.api.clone(),
        skip: params.skip,
        placement: params.placement,
        minduration: params.minduration,
        playbackmethod: params.playbackmethod,
        startdelay: params.startdelay,
    });

    Slot {
        impid: bid.ad_unit_code.clone(),
        transactionid: bid.transaction_id.clone(),
        auction_id: bid.auction_id.clone(),
        sizes: bid.banner_sizes().map(|s| s.tokens()).unwrap_or_default(),
        zoneid: bid.params.zone_id().cloned(),
        publishersubid: bid
            .params
            .publisher_sub_id
            .clone()
            .filter(|s| !s.is_empty()),
        native: bid.params.native_callback.as_ref().map(|_| true),
        video,
    }
}

/// 内置路径（无发布者标签）使用的 URL 与序列化后的请求体
pub fn build_request(
    config: &AdapterConfig,
    bid_requests: &[BidRequest],
    bidder_request: &BidderRequest,
) -> Result<CdbRequest> {
    let context = CdbContext::new(bid_requests, bidder_request);
    let url = build_cdb_url(config, &context);
    let data = serde_json::to_value(build_wire_request(config, &context, bid_requests, bidder_request))?;
    Ok(CdbRequest { url, data })
}

fn new_ad_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn matching_request<'a>(slot: &ResponseSlot, bid_requests: &'a [BidRequest]) -> Option<&'a BidRequest> {
    bid_requests.iter().find(|bid| {
        bid.ad_unit_code == slot.impid
            && match bid.params.zone_id() {
                None => true,
                Some(zone) => matches!(
                    (ZoneId::as_integer(zone), slot.zoneid),
                    (Some(requested), Some(answered)) if requested == answered
                ),
            }
    })
}

/// 将 CDB 返回的 slots 转换为拍卖引擎的出价；无法匹配的 slot 直接丢弃
pub fn parse_wire_response(
    body: Option<&Value>,
    bid_requests: &[BidRequest],
    native_slots: &NativeSlotRegistry,
) -> Vec<NormalizedBid> {
    let response = WireResponse::from_body(body);
    let mut bids = Vec::with_capacity(response.slots.len());

    for slot in &response.slots {
        let bid_request = match matching_request(slot, bid_requests) {
            Some(bid_request) => bid_request,
            None => {
                debug!(impid = %slot.impid, zoneid = ?slot.zoneid, "no bid request matches CDB slot");
                continue;
            }
        };

        let ad_id = slot
            .bid_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(new_ad_id);
        let mut bid = NormalizedBid {
            request_id: bid_request.bid_id.clone(),
            ad_id,
            cpm: slot.cpm,
            currency: slot.currency.clone(),
            net_revenue: true,
            ttl: slot.ttl.filter(|ttl| *ttl != 0).unwrap_or(DEFAULT_TTL),
            creative_id: bid_request.bid_id.clone(),
            width: slot.width,
            height: slot.height,
            deal_id: slot.deal_code.clone(),
            media_type: MediaType::Banner,
            ad: None,
            vast_url: None,
            auction_id: bid_request.auction_id.clone(),
        };

        match slot.creative_kind() {
            SlotCreative::Native(payload) => {
                bid.ad = Some(create_native_ad(
                    native_slots,
                    &bid.ad_id,
                    payload,
                    bid_request.params.native_callback.clone(),
                ));
            }
            SlotCreative::Video { display_url } => {
                bid.vast_url = display_url.map(str::to_string);
                bid.media_type = MediaType::Video;
            }
            SlotCreative::Html(creative) => {
                bid.ad = creative.map(str::to_string);
            }
        }
        bids.push(bid);
    }

    bids
}
