//! parley-protocol
//!
//! Wire-level encoding/decoding for the broker.
//!
//! This crate turns logical records (`parley_core::Message`,
//! `JoinRequest`, `Roster`) into constant-size byte buffers and back.
//! Constant sizes let every reader consume exactly one record per read and
//! let the activity log seek backwards by whole records.
//!
//! - [`wire_types`]   : tags, version, field widths, record sizes
//! - [`record_codec`] : encode / decode

pub mod wire_types;
pub mod record_codec;

pub use record_codec::{
    ProtocolError,
    decode_join,
    decode_message,
    decode_roster,
    encode_join,
    encode_message,
    encode_roster,
};

pub use wire_types::{JOIN_SIZE, MESSAGE_SIZE, ROSTER_SIZE};
