// src/fastbid/pubtag.rs

//! The publisher tag is Criteo's full client-side implementation of the bidding contract.
//! Once a verified FastBid script (or the reloaded tag) registers one here, every adapter
//! operation is routed through it instead of the built-in translator.

use serde_json::Value;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::error::{AdapterError, Result};
use crate::model::{BidRequest, BidderRequest, NormalizedBid};

/// Arguments the publisher tag needs to build one CDB call.
#[derive(Debug, Clone, Copy)]
pub struct PubTagBuildArgs<'a> {
    pub profile_id: u32,
    pub adapter_version: u32,
    pub bid_requests: &'a [BidRequest],
    pub bidder_request: &'a BidderRequest,
    pub wrapper_version: &'a str,
}

/// Per-auction adapter handed out by the publisher tag.
pub trait PubTagAdapter: Send + Sync {
    fn build_cdb_url(&self) -> String;
    fn build_cdb_request(&self) -> Value;
    fn interpret_response(&self, body: Option<&Value>, bid_requests: &[BidRequest]) -> Vec<NormalizedBid>;
    fn handle_bid_timeout(&self);
    fn handle_bid_won(&self, bid: &NormalizedBid);
    fn handle_set_targeting(&self, bid: &NormalizedBid);
}

pub trait PublisherTag: Send + Sync {
    fn create_adapter(&self, args: PubTagBuildArgs<'_>) -> Arc<dyn PubTagAdapter>;
    fn get_adapter(&self, auction_id: &str) -> Option<Arc<dyn PubTagAdapter>>;
}

/// Answers "has an alternate implementation taken over?" Queried on every call.
pub trait PublisherTagProvider: Send + Sync {
    fn publisher_tag(&self) -> Option<Arc<dyn PublisherTag>>;
}

#[derive(Default)]
pub struct PublisherTagRegistry {
    installed: RwLock<Option<Arc<dyn PublisherTag>>>,
}

impl PublisherTagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registration call a verified script uses to take over.
    pub fn install(&self, tag: Arc<dyn PublisherTag>) -> Result<()> {
        let mut installed = self
            .installed
            .write()
            .map_err(|e| AdapterError::Storage(e.to_string()))?;
        *installed = Some(tag);
        info!("Criteo publisher tag installed");
        Ok(())
    }

    pub fn is_installed(&self) -> bool {
        self.publisher_tag().is_some()
    }
}

impl PublisherTagProvider for PublisherTagRegistry {
    fn publisher_tag(&self) -> Option<Arc<dyn PublisherTag>> {
        self.installed.read().ok().and_then(|tag| tag.clone())
    }
}

/// Executes a verified FastBid payload. Implementations register whatever the script
/// provides through [`PublisherTagRegistry::install`].
pub trait ScriptRuntime: Send + Sync {
    fn execute(&self, script: &str, registry: &PublisherTagRegistry) -> Result<()>;
}

/// Runtime for hosts that ship the publisher tag natively: a verified script unlocks it.
pub struct BundledScriptRuntime {
    tag: Arc<dyn PublisherTag>,
}

impl BundledScriptRuntime {
    pub fn new(tag: Arc<dyn PublisherTag>) -> Self {
        Self { tag }
    }
}

impl ScriptRuntime for BundledScriptRuntime {
    fn execute(&self, script: &str, registry: &PublisherTagRegistry) -> Result<()> {
        debug!(script_len = script.len(), "unlocking bundled publisher tag");
        registry.install(self.tag.clone())
    }
}

/// Runtime for hosts without a script engine: every payload fails to run.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScriptEngine;

impl ScriptRuntime for NoScriptEngine {
    fn execute(&self, script: &str, _registry: &PublisherTagRegistry) -> Result<()> {
        Err(AdapterError::InvalidRequest(format!(
            "no script engine to run {} bytes of FastBid",
            script.len()
        )))
    }
}

/// External script loader, used to refresh the publisher tag after an auction.
pub trait ScriptLoader: Send + Sync {
    fn load_external_script(&self, url: &str, bidder_code: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingScriptLoader;

impl ScriptLoader for LoggingScriptLoader {
    fn load_external_script(&self, url: &str, bidder_code: &str) {
        info!(url, bidder_code, "publisher tag reload requested");
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::sync::Mutex;

    /// Publisher tag double that records every call it receives.
    #[derive(Default)]
    pub struct RecordingPubTag {
        pub calls: Mutex<Vec<String>>,
        pub hand_out_adapter: bool,
    }

    impl RecordingPubTag {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                hand_out_adapter: true,
            })
        }

        pub fn without_adapters() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    struct RecordingAdapter {
        tag: Arc<RecordingPubTag>,
    }

    impl RecordingAdapter {
        fn record(&self, call: String) {
            self.tag.calls.lock().unwrap().push(call);
        }
    }

    impl PubTagAdapter for RecordingAdapter {
        fn build_cdb_url(&self) -> String {
            self.record("buildCdbUrl".into());
            "cdbUrl".into()
        }

        fn build_cdb_request(&self) -> Value {
            self.record("buildCdbRequest".into());
            Value::String("cdbRequest".into())
        }

        fn interpret_response(&self, _body: Option<&Value>, _bid_requests: &[BidRequest]) -> Vec<NormalizedBid> {
            self.record("interpretResponse".into());
            Vec::new()
        }

        fn handle_bid_timeout(&self) {
            self.record("handleBidTimeout".into());
        }

        fn handle_bid_won(&self, bid: &NormalizedBid) {
            self.record(format!("handleBidWon:{}", bid.ad_id));
        }

        fn handle_set_targeting(&self, bid: &NormalizedBid) {
            self.record(format!("handleSetTargeting:{}", bid.ad_id));
        }
    }

    /// Wrapper so the tag can hand out adapters pointing back at itself.
    pub struct SharedPubTag(pub Arc<RecordingPubTag>);

    impl PublisherTag for SharedPubTag {
        fn create_adapter(&self, args: PubTagBuildArgs<'_>) -> Arc<dyn PubTagAdapter> {
            self.0.calls.lock().unwrap().push(format!(
                "Prebid({},{},{},{})",
                args.profile_id,
                args.adapter_version,
                args.bid_requests.len(),
                args.wrapper_version
            ));
            Arc::new(RecordingAdapter { tag: self.0.clone() })
        }

        fn get_adapter(&self, auction_id: &str) -> Option<Arc<dyn PubTagAdapter>> {
            self.0.calls.lock().unwrap().push(format!("GetAdapter:{auction_id}"));
            if self.0.hand_out_adapter {
                Some(Arc::new(RecordingAdapter { tag: self.0.clone() }))
            } else {
                None
            }
        }
    }
}
