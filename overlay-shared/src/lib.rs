//! # Overview
//! Shared functionality for the Chord-like messaging overlay: the
//! [`wire`] message definitions and their [`codec`] framing, address
//! [`addr`] utilities, the [`overlay`] routing-table and destination-
//! selection algorithms, a small [`error`] taxonomy and a
//! [`shutdown`] handle used by both binaries.

pub mod addr;
pub mod codec;
pub mod error;
pub mod overlay;
pub mod shutdown;
pub mod types;

pub mod wire {
    #![allow(clippy::all)]
    include!(concat!(env!("OUT_DIR"), "/minichord.rs"));
}

pub use types::NodeId;
