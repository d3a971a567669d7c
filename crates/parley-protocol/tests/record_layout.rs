// crates/parley-protocol/tests/record_layout.rs
use parley_core::{JoinRequest, Message, MessageKind, Roster, MAX_BODY_LEN, MAX_NAME_LEN};
use parley_protocol::wire_types::{PROTOCOL_VERSION, WireTag};
use parley_protocol::{
    decode_join, decode_message, decode_roster, encode_join, encode_message, encode_roster,
    ProtocolError, JOIN_SIZE, MESSAGE_SIZE, ROSTER_SIZE,
};

fn encoded(msg: &Message) -> Vec<u8> {
    let mut out = Vec::new();
    encode_message(msg, &mut out).expect("encodable");
    out
}

#[test]
fn every_kind_has_the_same_wire_size() {
    let samples = [
        Message::chat("alice", "hello there"),
        Message::joined("alice"),
        Message::departed("alice"),
        Message::shutdown(),
        Message::disconnected("bob"),
        Message::ping(""),
        Message::rejected(),
    ];

    for msg in &samples {
        assert_eq!(encoded(msg).len(), MESSAGE_SIZE, "{:?}", msg.kind);
    }
    assert!(MESSAGE_SIZE < 4096, "message writes must stay atomic on a FIFO");
}

#[test]
fn header_and_padding_layout() {
    let buf = encoded(&Message::chat("al", "hi"));

    assert_eq!(buf[0], WireTag::Chat as u8);
    assert_eq!(buf[1], PROTOCOL_VERSION);
    assert_eq!(&buf[2..4], &[0, 0]);
    assert_eq!(&buf[4..6], b"al");
    assert!(buf[6..4 + MAX_NAME_LEN].iter().all(|&b| b == 0));
    assert_eq!(&buf[4 + MAX_NAME_LEN..4 + MAX_NAME_LEN + 2], b"hi");
}

#[test]
fn decodes_what_a_peer_wrote() {
    let buf = encoded(&Message::chat("alice", "héllo"));
    let msg = decode_message(&buf).expect("valid record");
    assert_eq!(msg.kind, MessageKind::Chat);
    assert_eq!(msg.name, "alice");
    assert_eq!(msg.body, "héllo");
}

#[test]
fn full_width_fields_have_no_terminator() {
    let name = "n".repeat(MAX_NAME_LEN);
    let body = "b".repeat(MAX_BODY_LEN);
    let msg = decode_message(&encoded(&Message::chat(name.clone(), body.clone())))
        .expect("valid record");
    assert_eq!(msg.name, name);
    assert_eq!(msg.body, body);
}

#[test]
fn short_and_oversized_records_are_rejected() {
    let buf = encoded(&Message::joined("alice"));

    assert_eq!(
        decode_message(&buf[..MESSAGE_SIZE - 1]),
        Err(ProtocolError::WrongSize {
            expected: MESSAGE_SIZE,
            got: MESSAGE_SIZE - 1
        })
    );

    let mut long = buf.clone();
    long.push(0);
    assert!(matches!(
        decode_message(&long),
        Err(ProtocolError::WrongSize { .. })
    ));
}

#[test]
fn oversized_fields_refuse_to_encode() {
    let mut out = Vec::new();
    let err = encode_message(&Message::chat("x".repeat(MAX_NAME_LEN + 1), ""), &mut out);
    assert_eq!(err, Err(ProtocolError::FieldTooLong("name")));

    let err = encode_message(&Message::chat("x", "y".repeat(MAX_BODY_LEN + 1)), &mut out);
    assert_eq!(err, Err(ProtocolError::FieldTooLong("body")));
}

#[test]
fn bad_version_and_tag_are_rejected() {
    let mut buf = encoded(&Message::joined("alice"));
    buf[1] = PROTOCOL_VERSION + 1;
    assert_eq!(
        decode_message(&buf),
        Err(ProtocolError::VersionMismatch(PROTOCOL_VERSION + 1))
    );

    let mut buf = encoded(&Message::joined("alice"));
    buf[0] = 0xEE;
    assert_eq!(decode_message(&buf), Err(ProtocolError::UnknownTag(0xEE)));
}

#[test]
fn join_request_layout() {
    let join = JoinRequest {
        name: "alice".into(),
        inbound_path: "/tmp/run/42.server.fifo".into(),
        outbound_path: "/tmp/run/42.client.fifo".into(),
    };
    let mut buf = Vec::new();
    encode_join(&join, &mut buf).expect("encodable");

    assert_eq!(buf.len(), JOIN_SIZE);
    assert_eq!(buf[0], WireTag::Join as u8);
    assert_eq!(decode_join(&buf).expect("valid join"), join);

    // A message record is never mistaken for a join.
    let msg = encoded(&Message::joined("alice"));
    assert!(decode_join(&msg).is_err());
}

#[test]
fn roster_zero_fills_unused_slots() {
    let roster = Roster::new(vec!["alice".into(), "bob".into()]);
    let mut buf = Vec::new();
    encode_roster(&roster, &mut buf).expect("encodable");

    assert_eq!(buf.len(), ROSTER_SIZE);
    assert_eq!(&buf[4..8], &2u32.to_be_bytes());
    let first_unused = 8 + 2 * MAX_NAME_LEN;
    assert!(buf[first_unused..].iter().all(|&b| b == 0));

    assert_eq!(decode_roster(&buf).expect("valid roster"), roster);
}

#[test]
fn roster_count_beyond_capacity_is_invalid() {
    let mut buf = Vec::new();
    encode_roster(&Roster::default(), &mut buf).expect("encodable");
    buf[4..8].copy_from_slice(&1000u32.to_be_bytes());
    assert_eq!(
        decode_roster(&buf),
        Err(ProtocolError::InvalidField("client_count"))
    );
}
