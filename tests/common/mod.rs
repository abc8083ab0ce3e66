// tests/common/mod.rs

#![allow(dead_code)]

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use once_cell::sync::Lazy;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;

use criteo_adapter::bidding::{CdbClient, CriteoBidAdapter, NativeSlotRegistry};
use criteo_adapter::config::AdapterConfig;
use criteo_adapter::fastbid::verifier::latin1_bytes;
use criteo_adapter::fastbid::{
    CryptoCapabilities, FastBidLoader, Jwk, LocalStorage, LoggingScriptLoader, PublisherTagRegistry, ScriptRuntime,
    SignatureVerifier,
};
use criteo_adapter::model::{BidParams, BidRequest, Sizes, ZoneId};

static SIGNING_KEY: Lazy<RsaPrivateKey> =
    Lazy::new(|| RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("key generation"));

pub fn signing_jwk() -> Jwk {
    let public = SIGNING_KEY.to_public_key();
    Jwk {
        kty: "RSA".to_string(),
        n: URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
        e: URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
        alg: "RS256".to_string(),
        ext: Some("true".to_string()),
    }
}

/// A cache entry in the `// Hash: <signature>\n<script>` layout.
pub fn signed_blob(script: &str) -> String {
    let digest = Sha256::digest(latin1_bytes(script));
    let signature = SIGNING_KEY
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .expect("signing");
    format!("// Hash: {}\n{}", STANDARD.encode(signature), script)
}

pub fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("criteo-adapter-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    dir
}

pub fn zone_bid(code: &str, zone: i64, sizes: Sizes) -> BidRequest {
    BidRequest {
        ad_unit_code: code.to_string(),
        bid_id: format!("bid-{code}"),
        transaction_id: Some(format!("tx-{code}")),
        auction_id: Some("auction-it".to_string()),
        sizes: Some(sizes),
        params: BidParams {
            zone_id: Some(ZoneId::Numeric(zone)),
            ..BidParams::default()
        },
        ..BidRequest::default()
    }
}

pub struct Wiring {
    pub adapter: CriteoBidAdapter,
    pub registry: Arc<PublisherTagRegistry>,
    pub native_slots: Arc<NativeSlotRegistry>,
}

pub fn wire_adapter(config: AdapterConfig, storage: Arc<dyn LocalStorage>, runtime: Arc<dyn ScriptRuntime>) -> Wiring {
    let registry = Arc::new(PublisherTagRegistry::new());
    let native_slots = Arc::new(NativeSlotRegistry::new());
    let loader = FastBidLoader::new(
        &config,
        storage,
        SignatureVerifier::with_key(CryptoCapabilities::native(), signing_jwk()),
        runtime,
        registry.clone(),
    );
    let client = CdbClient::new(&config).expect("http client");
    let adapter = CriteoBidAdapter::new(
        config,
        registry.clone(),
        loader,
        client,
        Arc::new(LoggingScriptLoader),
        native_slots.clone(),
    );
    Wiring {
        adapter,
        registry,
        native_slots,
    }
}
