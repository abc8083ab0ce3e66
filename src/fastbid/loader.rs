// src/fastbid/loader.rs

use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AdapterConfig;
use crate::fastbid::pubtag::{PublisherTagRegistry, ScriptRuntime};
use crate::fastbid::storage::LocalStorage;
use crate::fastbid::verifier::SignatureVerifier;

/// Settles with `Some(true)` when the script took over, `Some(false)` when the signature
/// did not match, `None` when verification could not complete.
pub type FastBidFuture = BoxFuture<'static, Option<bool>>;

/// Cached script: a `// Hash: <base64 signature>` line followed by the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedScriptBlob<'a> {
    pub hash: &'a str,
    pub payload: &'a str,
}

impl<'a> SignedScriptBlob<'a> {
    pub fn parse(blob: &'a str, hash_prefix: &str) -> Option<Self> {
        let first_line_end = blob.find('\n')?;
        let first_line = blob[..first_line_end].trim();
        let hash = first_line.strip_prefix(hash_prefix)?;
        Some(Self {
            hash,
            payload: &blob[first_line_end + 1..],
        })
    }
}

/// Loads the cached FastBid script, verifies it and lets it take over.
pub struct FastBidLoader {
    storage: Arc<dyn LocalStorage>,
    verifier: SignatureVerifier,
    runtime: Arc<dyn ScriptRuntime>,
    registry: Arc<PublisherTagRegistry>,
    storage_key: String,
    hash_prefix: String,
}

impl FastBidLoader {
    pub fn new(
        config: &AdapterConfig,
        storage: Arc<dyn LocalStorage>,
        verifier: SignatureVerifier,
        runtime: Arc<dyn ScriptRuntime>,
        registry: Arc<PublisherTagRegistry>,
    ) -> Self {
        Self {
            storage,
            verifier,
            runtime,
            registry,
            storage_key: config.fast_bid_storage_key.clone(),
            hash_prefix: config.fast_bid_hash_prefix.clone(),
        }
    }

    /// `None` right away when there is nothing to verify; otherwise the pending verdict.
    pub fn try_load(&self) -> Option<FastBidFuture> {
        let blob = match self.storage.get_item(&self.storage_key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "unable to read FastBid from storage");
                return None;
            }
        };

        let (hash, payload) = match SignedScriptBlob::parse(&blob, &self.hash_prefix) {
            Some(parsed) => (parsed.hash.to_string(), parsed.payload.to_string()),
            None => {
                warn!("No hash found in FastBid");
                self.discard();
                return None;
            }
        };

        let verdict = match self.verifier.verify(&hash, &payload) {
            Ok(Some(verdict)) => verdict,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to verify Criteo FastBid");
                return None;
            }
        };

        let storage = self.storage.clone();
        let storage_key = self.storage_key.clone();
        let runtime = self.runtime.clone();
        let registry = self.registry.clone();
        Some(Box::pin(async move {
            let discard = || {
                if let Err(e) = storage.remove_item(&storage_key) {
                    warn!(error = %e, "unable to remove FastBid from storage");
                }
            };
            match verdict.await {
                Ok(true) => {
                    info!("Using Criteo FastBid");
                    match runtime.execute(&payload, &registry) {
                        Ok(()) => Some(true),
                        Err(e) => {
                            warn!(error = %e, "FastBid script failed to run");
                            discard();
                            None
                        }
                    }
                }
                Ok(false) => {
                    warn!("Invalid Criteo FastBid found");
                    discard();
                    Some(false)
                }
                Err(e) => {
                    warn!(error = %e, "catch validateFastBid error");
                    discard();
                    None
                }
            }
        }))
    }

    fn discard(&self) {
        if let Err(e) = self.storage.remove_item(&self.storage_key) {
            warn!(error = %e, "unable to remove FastBid from storage");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AdapterError, Result};
    use crate::fastbid::pubtag::fakes::{RecordingPubTag, SharedPubTag};
    use crate::fastbid::pubtag::PublisherTagProvider;
    use crate::fastbid::storage::InMemoryStorage;
    use crate::fastbid::verifier::test_keys::{sign, test_jwk};
    use crate::fastbid::verifier::{CryptoCapabilities, CryptoError, CryptoFuture, CryptoKey, Jwk, SubtleCrypto};
    use std::sync::Mutex;

    const KEY: &str = "criteo_fast_bid";

    #[derive(Default)]
    struct RecordingRuntime {
        executed: Mutex<Vec<String>>,
        fail: bool,
    }

    impl ScriptRuntime for RecordingRuntime {
        fn execute(&self, script: &str, registry: &PublisherTagRegistry) -> Result<()> {
            if self.fail {
                return Err(AdapterError::InvalidRequest("script threw".into()));
            }
            self.executed.lock().unwrap().push(script.to_string());
            registry.install(Arc::new(SharedPubTag(RecordingPubTag::new())))
        }
    }

    struct Harness {
        storage: Arc<InMemoryStorage>,
        runtime: Arc<RecordingRuntime>,
        registry: Arc<PublisherTagRegistry>,
        loader: FastBidLoader,
    }

    fn harness(blob: Option<&str>, caps: CryptoCapabilities) -> Harness {
        harness_with_runtime(blob, caps, RecordingRuntime::default())
    }

    fn harness_with_runtime(blob: Option<&str>, caps: CryptoCapabilities, runtime: RecordingRuntime) -> Harness {
        let storage = Arc::new(match blob {
            Some(blob) => InMemoryStorage::with_item(KEY, blob),
            None => InMemoryStorage::new(),
        });
        let runtime = Arc::new(runtime);
        let registry = Arc::new(PublisherTagRegistry::new());
        let loader = FastBidLoader::new(
            &AdapterConfig::default(),
            storage.clone(),
            SignatureVerifier::with_key(caps, test_jwk()),
            runtime.clone(),
            registry.clone(),
        );
        Harness {
            storage,
            runtime,
            registry,
            loader,
        }
    }

    fn stored(h: &Harness) -> Option<String> {
        h.storage.get_item(KEY).unwrap()
    }

    #[test]
    fn blob_parsing_requires_hash_line() {
        let parsed = SignedScriptBlob::parse("// Hash: abc \nbody\nmore", "// Hash: ").unwrap();
        assert_eq!(parsed.hash, "abc");
        assert_eq!(parsed.payload, "body\nmore");
        assert!(SignedScriptBlob::parse("// Has", "// Hash: ").is_none());
        assert!(SignedScriptBlob::parse("// Hash: abc", "// Hash: ").is_none());
        assert!(SignedScriptBlob::parse("code\n// Hash: abc", "// Hash: ").is_none());
    }

    #[test]
    fn no_blob_is_a_synchronous_no_op() {
        let h = harness(None, CryptoCapabilities::native());
        assert!(h.loader.try_load().is_none());
    }

    #[test]
    fn corrupt_header_discards_blob() {
        let h = harness(Some("// Has"), CryptoCapabilities::native());
        assert!(h.loader.try_load().is_none());
        assert_eq!(stored(&h), None);
    }

    #[tokio::test]
    async fn valid_signature_executes_script_and_keeps_blob() {
        let script = "window.ensureEvalCalled.mark();";
        let blob = format!("// Hash: {}\n{}", sign(script), script);
        let h = harness(Some(&blob), CryptoCapabilities::native());

        let outcome = h.loader.try_load().unwrap().await;

        assert_eq!(outcome, Some(true));
        assert_eq!(*h.runtime.executed.lock().unwrap(), vec![script.to_string()]);
        assert!(h.registry.publisher_tag().is_some());
        assert_eq!(stored(&h), Some(blob));
    }

    #[tokio::test]
    async fn invalid_signature_clears_blob() {
        let blob = format!("// Hash: {}\n{}", sign("something else"), "script");
        let h = harness(Some(&blob), CryptoCapabilities::native());

        assert_eq!(h.loader.try_load().unwrap().await, Some(false));
        assert!(h.runtime.executed.lock().unwrap().is_empty());
        assert!(!h.registry.is_installed());
        assert_eq!(stored(&h), None);
    }

    #[tokio::test]
    async fn undecodable_signature_is_swallowed_and_clears_blob() {
        let h = harness(Some("// Hash: ***\nscript"), CryptoCapabilities::native());
        assert_eq!(h.loader.try_load().unwrap().await, None);
        assert_eq!(stored(&h), None);
    }

    #[test]
    fn missing_crypto_leaves_everything_alone() {
        let h = harness(Some("// Hash: azerty\n"), CryptoCapabilities::none());
        assert!(h.loader.try_load().is_none());
        assert!(stored(&h).is_some());
    }

    struct ThrowingSubtle;

    impl SubtleCrypto for ThrowingSubtle {
        fn import_key(&self, _jwk: &Jwk) -> std::result::Result<CryptoFuture<CryptoKey>, CryptoError> {
            Err(CryptoError::KeyImport("thrown".into()))
        }

        fn verify(&self, _key: &CryptoKey, _signature: &[u8], _data: &[u8]) -> std::result::Result<CryptoFuture<bool>, CryptoError> {
            unreachable!()
        }
    }

    #[test]
    fn synchronous_verifier_failure_returns_none() {
        let caps = CryptoCapabilities {
            subtle: Some(Arc::new(ThrowingSubtle)),
            ..CryptoCapabilities::default()
        };
        let h = harness(Some("// Hash: azerty\n"), caps);
        assert!(h.loader.try_load().is_none());
        assert!(stored(&h).is_some());
    }

    #[tokio::test]
    async fn failing_script_is_discarded() {
        let script = "throw new Error()";
        let blob = format!("// Hash: {}\n{}", sign(script), script);
        let runtime = RecordingRuntime {
            fail: true,
            ..RecordingRuntime::default()
        };
        let h = harness_with_runtime(Some(&blob), CryptoCapabilities::native(), runtime);
        assert_eq!(h.loader.try_load().unwrap().await, None);
        assert_eq!(stored(&h), None);
        assert!(!h.registry.is_installed());
    }
}
