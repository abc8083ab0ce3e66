// src/fastbid/verifier.rs

//! FastBid signature verification.
//!
//! The host decides which crypto backends exist through [`CryptoCapabilities`]. Two of them
//! are future-shaped ([`SubtleCrypto`]), the legacy one reports through completion callbacks
//! ([`LegacyCrypto`]) and is adapted to the same future contract in [`legacy_verify`].

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use futures::future::{self, BoxFuture};
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// `atob`-style decoding: padding optional, whitespace ignored.
const FORGIVING_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const FAST_BID_MODULUS: &str = "ztQYwCE5BU7T9CDM5he6rKoabstXRmkzx54zFPZkWbK530dwtLBDeaWBMxHBUT55CYyboR_EZ4efghPi3CoNGfGWezpjko9P6p2EwGArtHEeS4slhu_SpSIFMjG6fdrpRoNuIAMhq1Z-Pr_-HOd1pThFKeGFr2_NhtAg-TXAzaU";
const FAST_BID_EXPONENT: &str = "AQAB";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("key import failed: {0}")]
    KeyImport(String),
    #[error("verify failed: {0}")]
    Verify(String),
    #[error("signature is not valid base64: {0}")]
    SignatureEncoding(String),
    #[error("crypto operation dropped without completing")]
    Abandoned,
}

/// Public key record in JSON Web Key form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    pub n: String,
    pub e: String,
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
}

impl Jwk {
    /// The key handed to the legacy backend, which rejects the `ext` member.
    pub fn fast_bid_legacy() -> Self {
        Self {
            kty: "RSA".to_string(),
            n: FAST_BID_MODULUS.to_string(),
            e: FAST_BID_EXPONENT.to_string(),
            alg: "RS256".to_string(),
            ext: None,
        }
    }

    pub fn fast_bid() -> Self {
        Self {
            ext: Some("true".to_string()),
            ..Self::fast_bid_legacy()
        }
    }

    pub fn without_ext(&self) -> Self {
        Self {
            ext: None,
            ..self.clone()
        }
    }

    pub fn to_public_key(&self) -> Result<RsaPublicKey, CryptoError> {
        if self.kty != "RSA" {
            return Err(CryptoError::KeyImport(format!("unsupported kty {}", self.kty)));
        }
        let decode = |field: &str| {
            URL_SAFE_NO_PAD
                .decode(field)
                .map(|bytes| BigUint::from_bytes_be(&bytes))
                .map_err(|e| CryptoError::KeyImport(e.to_string()))
        };
        RsaPublicKey::new(decode(&self.n)?, decode(&self.e)?)
            .map_err(|e| CryptoError::KeyImport(e.to_string()))
    }
}

/// Imported verification key.
#[derive(Debug, Clone, PartialEq)]
pub struct CryptoKey(pub RsaPublicKey);

pub type CryptoFuture<T> = BoxFuture<'static, Result<T, CryptoError>>;
pub type Completion<T> = Box<dyn FnOnce(Result<T, CryptoError>) + Send>;

/// Future-shaped crypto API. An `Err` from the call itself is a synchronous failure,
/// an `Err` from the returned future is a rejection.
pub trait SubtleCrypto: Send + Sync {
    fn import_key(&self, jwk: &Jwk) -> Result<CryptoFuture<CryptoKey>, CryptoError>;
    fn verify(
        &self,
        key: &CryptoKey,
        signature: &[u8],
        data: &[u8],
    ) -> Result<CryptoFuture<bool>, CryptoError>;
}

/// Event-shaped crypto API: outcomes arrive through the completion callback.
pub trait LegacyCrypto: Send + Sync {
    fn import_key(&self, jwk_json: &[u8], on_complete: Completion<CryptoKey>) -> Result<(), CryptoError>;
    fn verify(
        &self,
        key: &CryptoKey,
        signature: &[u8],
        data: &[u8],
        on_complete: Completion<bool>,
    ) -> Result<(), CryptoError>;
}

/// RSASSA-PKCS1-v1_5 / SHA-256 verification backed by the `rsa` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RsaSubtle;

fn rsa_verify(key: &CryptoKey, signature: &[u8], data: &[u8]) -> Result<bool, CryptoError> {
    let digest = Sha256::digest(data);
    match key.0.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature) {
        Ok(()) => Ok(true),
        Err(rsa::Error::Verification) => Ok(false),
        Err(e) => Err(CryptoError::Verify(e.to_string())),
    }
}

impl SubtleCrypto for RsaSubtle {
    fn import_key(&self, jwk: &Jwk) -> Result<CryptoFuture<CryptoKey>, CryptoError> {
        let key = jwk.to_public_key().map(CryptoKey);
        Ok(Box::pin(future::ready(key)))
    }

    fn verify(
        &self,
        key: &CryptoKey,
        signature: &[u8],
        data: &[u8],
    ) -> Result<CryptoFuture<bool>, CryptoError> {
        Ok(Box::pin(future::ready(rsa_verify(key, signature, data))))
    }
}

/// Callback flavour of [`RsaSubtle`]; completes before returning.
#[derive(Debug, Default, Clone, Copy)]
pub struct RsaLegacyCrypto;

impl LegacyCrypto for RsaLegacyCrypto {
    fn import_key(&self, jwk_json: &[u8], on_complete: Completion<CryptoKey>) -> Result<(), CryptoError> {
        let result = serde_json::from_slice::<Jwk>(jwk_json)
            .map_err(|e| CryptoError::KeyImport(e.to_string()))
            .and_then(|jwk| jwk.to_public_key())
            .map(CryptoKey);
        on_complete(result);
        Ok(())
    }

    fn verify(
        &self,
        key: &CryptoKey,
        signature: &[u8],
        data: &[u8],
        on_complete: Completion<bool>,
    ) -> Result<(), CryptoError> {
        on_complete(rsa_verify(key, signature, data));
        Ok(())
    }
}

/// Crypto backends the host exposes. Tried in field order.
#[derive(Clone, Default)]
pub struct CryptoCapabilities {
    pub subtle: Option<Arc<dyn SubtleCrypto>>,
    pub webkit_subtle: Option<Arc<dyn SubtleCrypto>>,
    pub ms_crypto: Option<Arc<dyn LegacyCrypto>>,
}

impl CryptoCapabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn native() -> Self {
        Self {
            subtle: Some(Arc::new(RsaSubtle)),
            ..Self::default()
        }
    }
}

enum Backend {
    Standard(Arc<dyn SubtleCrypto>),
    Prefixed(Arc<dyn SubtleCrypto>),
    Legacy(Arc<dyn LegacyCrypto>),
}

impl Backend {
    fn select(caps: &CryptoCapabilities) -> Option<Self> {
        if let Some(subtle) = &caps.subtle {
            return Some(Backend::Standard(subtle.clone()));
        }
        if let Some(subtle) = &caps.webkit_subtle {
            return Some(Backend::Prefixed(subtle.clone()));
        }
        caps.ms_crypto.clone().map(Backend::Legacy)
    }

    fn name(&self) -> &'static str {
        match self {
            Backend::Standard(_) => "subtle",
            Backend::Prefixed(_) => "webkitSubtle",
            Backend::Legacy(_) => "msCrypto",
        }
    }
}

/// One byte per UTF-16 code unit, truncated to 8 bits, as legacy byte strings are.
pub fn latin1_bytes(text: &str) -> Vec<u8> {
    text.encode_utf16().map(|unit| unit as u8).collect()
}

pub fn decode_signature(hash: &str) -> Result<Vec<u8>, CryptoError> {
    let compact: String = hash.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    FORGIVING_BASE64
        .decode(compact)
        .map_err(|e| CryptoError::SignatureEncoding(e.to_string()))
}

/// Checks a detached base64 signature over a script payload.
#[derive(Clone)]
pub struct SignatureVerifier {
    capabilities: CryptoCapabilities,
    key: Jwk,
}

impl SignatureVerifier {
    pub fn new(capabilities: CryptoCapabilities) -> Self {
        Self::with_key(capabilities, Jwk::fast_bid())
    }

    pub fn with_key(capabilities: CryptoCapabilities, key: Jwk) -> Self {
        Self { capabilities, key }
    }

    /// `Ok(None)` when no backend exists, `Err` when the backend fails synchronously,
    /// otherwise a future that settles with the verdict or a rejection.
    pub fn verify(&self, hash: &str, payload: &str) -> Result<Option<CryptoFuture<bool>>, CryptoError> {
        let backend = match Backend::select(&self.capabilities) {
            Some(backend) => backend,
            None => {
                debug!("no crypto backend available, FastBid not verified");
                return Ok(None);
            }
        };
        debug!(backend = backend.name(), "verifying FastBid signature");

        let hash = hash.to_string();
        let data = latin1_bytes(payload);
        let verdict = match backend {
            Backend::Standard(subtle) | Backend::Prefixed(subtle) => {
                let import = subtle.import_key(&self.key)?;
                Box::pin(async move {
                    let key = import.await?;
                    let signature = decode_signature(&hash)?;
                    subtle.verify(&key, &signature, &data)?.await
                }) as CryptoFuture<bool>
            }
            Backend::Legacy(ms_crypto) => {
                let jwk_json = serde_json::to_vec(&self.key.without_ext())
                    .map_err(|e| CryptoError::KeyImport(e.to_string()))?;
                legacy_verify(ms_crypto, jwk_json, hash, data)
            }
        };
        Ok(Some(verdict))
    }
}

/// Bridges the callback API into a future. Synchronous failures become rejections here.
fn legacy_verify(
    ms_crypto: Arc<dyn LegacyCrypto>,
    jwk_json: Vec<u8>,
    hash: String,
    data: Vec<u8>,
) -> CryptoFuture<bool> {
    Box::pin(async move {
        let (key_tx, key_rx) = oneshot::channel();
        ms_crypto.import_key(
            &jwk_json,
            Box::new(move |result: Result<CryptoKey, CryptoError>| {
                let _ = key_tx.send(result);
            }),
        )?;
        let key = key_rx.await.map_err(|_| CryptoError::Abandoned)??;

        let signature = decode_signature(&hash)?;
        let (verify_tx, verify_rx) = oneshot::channel();
        ms_crypto.verify(
            &key,
            &signature,
            &data,
            Box::new(move |result: Result<bool, CryptoError>| {
                let _ = verify_tx.send(result);
            }),
        )?;
        verify_rx.await.map_err(|_| CryptoError::Abandoned)?
    })
}
