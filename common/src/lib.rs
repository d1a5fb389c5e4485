//! Wire payloads published by a beacon-relay node.
//!
//! Shared between the node and anything consuming its data topics, so the
//! JSON shape lives in exactly one place.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod payload;

pub use payload::*;
