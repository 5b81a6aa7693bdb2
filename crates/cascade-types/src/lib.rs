//! Foundation types for Cascade.
//!
//! This crate provides the identifier, request, and status types used
//! throughout the Cascade data path. Every other Cascade crate depends on
//! `cascade-types`.
//!
//! # Key Types
//!
//! - [`Digest`] — fixed-length content digest (BLAKE3 hash of a caller key)
//! - [`Identifier`] — digest plus column and type tag, the addressable unit
//! - [`IoRequest`] / [`IoFlags`] — one write or read unit and its flag bits
//! - [`RangeRequest`] — inclusive identifier interval for range queries
//! - [`GroupId`] / [`NodeAddr`] / [`SuccessPolicy`] — replica placement
//! - [`status`] — errno-style integer status codes carried on the wire

pub mod error;
pub mod group;
pub mod id;
pub mod io;
pub mod status;

pub use error::TypeError;
pub use group::{GroupId, NodeAddr, SuccessPolicy};
pub use id::{Digest, Identifier, DIGEST_SIZE};
pub use io::{AttrFlags, IoFlags, IoRequest, RangeRequest};
