// src/fastbid/mod.rs

pub mod loader;
pub mod pubtag;
pub mod storage;
pub mod verifier;

pub use loader::{FastBidFuture, FastBidLoader, SignedScriptBlob};
pub use pubtag::{
    BundledScriptRuntime, LoggingScriptLoader, NoScriptEngine, PubTagAdapter, PubTagBuildArgs, PublisherTag,
    PublisherTagProvider, PublisherTagRegistry, ScriptLoader, ScriptRuntime,
};
pub use storage::{FileStorage, InMemoryStorage, LocalStorage};
pub use verifier::{CryptoCapabilities, CryptoError, Jwk, SignatureVerifier};
