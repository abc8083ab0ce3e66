// src/main.rs

use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use criteo_adapter::analytics::{AnalyticsSender, CriteoAnalyticsAdapter, NoPerformanceTimeline, AUCTION_END, AUCTION_INIT};
use criteo_adapter::bidding::{top_window_slots, BidderSpec, CdbClient, CriteoBidAdapter, ServerRequest};
use criteo_adapter::config::file_source::ConfigSource;
use criteo_adapter::config::FileConfigSource;
use criteo_adapter::fastbid::{
    CryptoCapabilities, FastBidLoader, FileStorage, LoggingScriptLoader, NoScriptEngine, PublisherTagRegistry,
    SignatureVerifier,
};
use criteo_adapter::logging::init_tracing;
use criteo_adapter::mock_cdb::spawn_mock_cdb_on;
use criteo_adapter::model::{BidParams, BidRequest, BidderRequest, Sizes, ZoneId};

#[derive(Parser, Debug)]
#[command(author = "whiteCcinn", version, about = "Criteo header-bidding adapter demo against a mock CDB")]
struct CliArgs {
    /// Port of the mock CDB.
    #[arg(short, long, default_value_t = 9001)]
    port: u16,
    #[arg(long, default_value = "logs")]
    log_dir: String,
    #[arg(long, default_value = "static/criteo_adapter.json")]
    config: String,
    /// Directory holding the cached FastBid script.
    #[arg(long, default_value = "storage")]
    storage_dir: String,
    /// Call this CDB instead of the mock.
    #[arg(long)]
    cdb_endpoint: Option<String>,
    #[arg(long)]
    ceh: Option<String>,
    /// Keep the mock CDB running until Ctrl-C.
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn demo_bid_requests(auction_id: &str) -> Vec<BidRequest> {
    let bid = |code: &str, zone: i64, sizes: Sizes| BidRequest {
        ad_unit_code: code.to_string(),
        bid_id: format!("bid-{code}"),
        transaction_id: Some(format!("tx-{code}")),
        auction_id: Some(auction_id.to_string()),
        sizes: Some(sizes),
        params: BidParams {
            zone_id: Some(ZoneId::Numeric(zone)),
            ..BidParams::default()
        },
        ..BidRequest::default()
    };
    vec![
        bid("leaderboard", 123, Sizes::Multiple(vec![[728, 90]])),
        bid("mpu", 456, Sizes::Multiple(vec![[300, 250], [300, 600]])),
        bid("nobid-footer", 789, Sizes::Single([320, 50])),
    ]
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let _guard = init_tracing(&args.log_dir).expect("Unable to set global tracing subscriber");

    let mock = spawn_mock_cdb_on(&format!("127.0.0.1:{}", args.port))
        .await
        .expect("Unable to start mock CDB");

    let mut config = FileConfigSource::new(&args.config).load();
    config.cdb_endpoint = args.cdb_endpoint.clone().unwrap_or_else(|| mock.cdb_url());
    if args.ceh.is_some() {
        config.ceh = args.ceh.clone();
    }
    config.analytics.endpoint = mock.analytics_url();
    info!(endpoint = %config.cdb_endpoint, "Criteo adapter starting");

    let registry = Arc::new(PublisherTagRegistry::new());
    let loader = FastBidLoader::new(
        &config,
        Arc::new(FileStorage::new(&args.storage_dir)),
        SignatureVerifier::new(CryptoCapabilities::native()),
        Arc::new(NoScriptEngine),
        registry.clone(),
    );
    let client = CdbClient::new(&config).expect("Unable to build HTTP client");
    let analytics = CriteoAnalyticsAdapter::enable(
        &config.analytics,
        Arc::new(NoPerformanceTimeline),
        AnalyticsSender::spawn(reqwest::Client::new(), &config.analytics.endpoint, 64),
    );
    let send_delay = analytics.settings().send_delay;
    let adapter = CriteoBidAdapter::new(
        config,
        registry,
        loader,
        client,
        Arc::new(LoggingScriptLoader),
        top_window_slots(),
    );

    let auction_id = uuid::Uuid::new_v4().to_string();
    let bidder_request = BidderRequest {
        auction_id: Some(auction_id.clone()),
        timeout: 3000,
        page_url: "https://publisher.example/article?pbt_debug=1".to_string(),
        ..BidderRequest::default()
    };
    analytics.track(AUCTION_INIT, &json!({ "auctionId": auction_id, "timeout": bidder_request.timeout }));

    let bid_requests: Vec<BidRequest> = demo_bid_requests(&auction_id)
        .into_iter()
        .filter(|bid| adapter.is_bid_request_valid(bid))
        .collect();
    analytics.track("bidRequested", &json!({ "bidderCode": adapter.code(), "bids": bid_requests.len() }));

    let mut request = adapter.build_requests(&bid_requests, &bidder_request);
    let answer = match &mut request {
        ServerRequest::Deferred { response, .. } => response.await,
        ServerRequest::Direct { url, .. } => {
            warn!(url = %url, "publisher tag active, demo does not send direct requests");
            None
        }
    };

    let bids = adapter.interpret_response(answer.as_ref(), &request);
    for bid in &bids {
        info!(request_id = %bid.request_id, ad_id = %bid.ad_id, cpm = bid.cpm, "bid received");
        analytics.track("bidResponse", &json!(bid));
    }
    if let Some(winner) = bids.iter().max_by(|a, b| a.cpm.total_cmp(&b.cpm)) {
        adapter.on_bid_won(winner);
        analytics.track("bidWon", &json!(winner));
    }
    analytics.track(AUCTION_END, &json!({ "auctionId": auction_id, "bids": bids.len() }));
    info!(bids = bids.len(), "auction round finished");

    if args.serve {
        info!("Mock CDB serving at {}, Ctrl-C to stop", mock.cdb_url());
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "unable to listen for shutdown signal");
        }
    } else {
        // Leave time for the delayed analytics flush.
        sleep(send_delay + Duration::from_millis(500)).await;
    }
    info!(
        cdb_requests = mock.state.requests().len(),
        analytics_batches = mock.state.analytics_batches().len(),
        "Criteo adapter shut down"
    );
}
