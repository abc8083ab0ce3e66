// src/cdb/mod.rs

pub mod request;
pub mod response;

pub use request::{CdbRequest, GdprConsentBlock, Publisher, Slot, User, VideoSlot, WireRequest};
pub use response::{ResponseSlot, ServerResponse, SlotCreative, WireResponse};
