//! Binary encoding/decoding for broker records.
//!
//! Every record is a fixed-size buffer. String fields are UTF-8, padded
//! with NUL bytes to their full width; a field that fills its width has no
//! terminator.
//!
//! ```text
//! Header (all records)
//! --------------------
//! [0]   : tag      (WireTag as u8)
//! [1]   : version  (PROTOCOL_VERSION)
//! [2..4]: reserved = 0
//!
//! Message (tag = kind id 1..=7), MESSAGE_SIZE bytes:
//!   [4..68]     name (MAX_NAME_LEN)
//!   [68..1092]  body (MAX_BODY_LEN)
//!
//! Join (tag = 0x10), JOIN_SIZE bytes:
//!   [4..68]     name
//!   [68..324]   inbound path  (client -> broker)
//!   [324..580]  outbound path (broker -> client)
//!
//! Roster (tag = 0x20), ROSTER_SIZE bytes:
//!   [4..8]      client_count (u32 BE, <= ROSTER_CAPACITY)
//!   [8..]       ROSTER_CAPACITY name slots of MAX_NAME_LEN each
//! ```
//!
//! Decoders require the buffer to be exactly one record long: a short or
//! oversized buffer means the peer is out of step and there is no safe
//! place to resume.

use std::fmt;

use parley_core::{
    JoinRequest, Message, Roster, MAX_BODY_LEN, MAX_NAME_LEN, MAX_PATH_LEN, ROSTER_CAPACITY,
};

use crate::wire_types::{
    WireTag, HEADER_LEN, JOIN_SIZE, MESSAGE_SIZE, PROTOCOL_VERSION, ROSTER_SIZE,
};

/// Errors that can arise when encoding/decoding a record.
#[derive(Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer length differs from the record size.
    WrongSize { expected: usize, got: usize },
    /// Unknown tag, or a tag of the wrong record family.
    UnknownTag(u8),
    /// Unsupported or mismatched protocol version.
    VersionMismatch(u8),
    /// A string field does not fit its width.
    FieldTooLong(&'static str),
    /// A string field is not valid UTF-8 or contains an interior NUL.
    InvalidField(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::WrongSize { expected, got } => {
                write!(f, "record is {} bytes, expected {}", got, expected)
            }
            ProtocolError::UnknownTag(t) => write!(f, "unknown record tag: {}", t),
            ProtocolError::VersionMismatch(v) => {
                write!(f, "protocol version mismatch: got {}, expected {}", v, PROTOCOL_VERSION)
            }
            ProtocolError::FieldTooLong(field) => write!(f, "field too long: {}", field),
            ProtocolError::InvalidField(field) => write!(f, "invalid field: {}", field),
        }
    }
}

impl std::error::Error for ProtocolError {}

// ============================================================================
// Message
// ============================================================================

/// Encode a message, appending exactly `MESSAGE_SIZE` bytes to `out`.
pub fn encode_message(msg: &Message, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    out.reserve(MESSAGE_SIZE);
    put_header(WireTag::from_kind(msg.kind), out);
    put_str(&msg.name, MAX_NAME_LEN, "name", out)?;
    put_str(&msg.body, MAX_BODY_LEN, "body", out)?;
    Ok(())
}

/// Decode a single message record.
pub fn decode_message(buf: &[u8]) -> Result<Message, ProtocolError> {
    let tag = check_header(buf, MESSAGE_SIZE)?;
    let kind = tag.kind().ok_or(ProtocolError::UnknownTag(tag as u8))?;

    let mut offset = HEADER_LEN;
    let name = get_str(buf, &mut offset, MAX_NAME_LEN, "name")?;
    let body = get_str(buf, &mut offset, MAX_BODY_LEN, "body")?;

    Ok(Message { kind, name, body })
}

// ============================================================================
// Join request
// ============================================================================

/// Encode a join request, appending exactly `JOIN_SIZE` bytes to `out`.
pub fn encode_join(join: &JoinRequest, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    out.reserve(JOIN_SIZE);
    put_header(WireTag::Join, out);
    put_str(&join.name, MAX_NAME_LEN, "name", out)?;
    put_str(&join.inbound_path, MAX_PATH_LEN, "inbound_path", out)?;
    put_str(&join.outbound_path, MAX_PATH_LEN, "outbound_path", out)?;
    Ok(())
}

/// Decode a single join request record.
pub fn decode_join(buf: &[u8]) -> Result<JoinRequest, ProtocolError> {
    let tag = check_header(buf, JOIN_SIZE)?;
    if tag != WireTag::Join {
        return Err(ProtocolError::UnknownTag(tag as u8));
    }

    let mut offset = HEADER_LEN;
    let name = get_str(buf, &mut offset, MAX_NAME_LEN, "name")?;
    let inbound_path = get_str(buf, &mut offset, MAX_PATH_LEN, "inbound_path")?;
    let outbound_path = get_str(buf, &mut offset, MAX_PATH_LEN, "outbound_path")?;

    Ok(JoinRequest {
        name,
        inbound_path,
        outbound_path,
    })
}

// ============================================================================
// Roster snapshot
// ============================================================================

/// Encode a roster snapshot, appending exactly `ROSTER_SIZE` bytes to `out`.
///
/// Unused name slots are zero-filled.
pub fn encode_roster(roster: &Roster, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    if roster.client_count() > ROSTER_CAPACITY {
        return Err(ProtocolError::FieldTooLong("names"));
    }

    out.reserve(ROSTER_SIZE);
    put_header(WireTag::Roster, out);
    out.extend_from_slice(&(roster.client_count() as u32).to_be_bytes());

    for name in &roster.names {
        put_str(name, MAX_NAME_LEN, "name", out)?;
    }
    let unused = (ROSTER_CAPACITY - roster.client_count()) * MAX_NAME_LEN;
    out.resize(out.len() + unused, 0);

    Ok(())
}

/// Decode the roster snapshot region.
pub fn decode_roster(buf: &[u8]) -> Result<Roster, ProtocolError> {
    let tag = check_header(buf, ROSTER_SIZE)?;
    if tag != WireTag::Roster {
        return Err(ProtocolError::UnknownTag(tag as u8));
    }

    let count = read_u32_be(&buf[HEADER_LEN..HEADER_LEN + 4]) as usize;
    if count > ROSTER_CAPACITY {
        return Err(ProtocolError::InvalidField("client_count"));
    }

    let mut offset = HEADER_LEN + 4;
    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        names.push(get_str(buf, &mut offset, MAX_NAME_LEN, "name")?);
    }

    Ok(Roster { names })
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn put_header(tag: WireTag, out: &mut Vec<u8>) {
    out.push(tag as u8);
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&[0, 0]); // reserved
}

fn check_header(buf: &[u8], size: usize) -> Result<WireTag, ProtocolError> {
    if buf.len() != size {
        return Err(ProtocolError::WrongSize {
            expected: size,
            got: buf.len(),
        });
    }

    let version = buf[1];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch(version));
    }

    WireTag::from_u8(buf[0]).ok_or(ProtocolError::UnknownTag(buf[0]))
}

fn put_str(
    s: &str,
    width: usize,
    field: &'static str,
    out: &mut Vec<u8>,
) -> Result<(), ProtocolError> {
    let bytes = s.as_bytes();
    if bytes.len() > width {
        return Err(ProtocolError::FieldTooLong(field));
    }
    if bytes.contains(&0) {
        return Err(ProtocolError::InvalidField(field));
    }
    out.extend_from_slice(bytes);
    out.resize(out.len() + (width - bytes.len()), 0);
    Ok(())
}

fn get_str(
    buf: &[u8],
    offset: &mut usize,
    width: usize,
    field: &'static str,
) -> Result<String, ProtocolError> {
    let raw = &buf[*offset..*offset + width];
    *offset += width;

    let len = raw.iter().position(|&b| b == 0).unwrap_or(width);
    std::str::from_utf8(&raw[..len])
        .map(str::to_string)
        .map_err(|_| ProtocolError::InvalidField(field))
}

fn read_u32_be(bytes: &[u8]) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&bytes[0..4]);
    u32::from_be_bytes(arr)
}
