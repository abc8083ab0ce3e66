// src/lib.rs

pub mod analytics;
pub mod bidding;
pub mod cdb;
pub mod config;
pub mod error;
pub mod fastbid;
pub mod logging;
pub mod mock_cdb;
pub mod model;

pub use bidding::{BidderSpec, CriteoBidAdapter, ServerRequest};
pub use error::{AdapterError, Result};
