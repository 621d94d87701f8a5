//! Codec Tests
//!
//! Tests for command and reply encoding/decoding.

use std::io::Cursor;

use hashsync::protocol::{
    decode_command, decode_reply, encode_command, encode_reply, read_command, read_reply,
    write_command, write_reply, Command, CommandType, ErrorCode, Reply, Status, HEADER_SIZE,
    MAX_PAYLOAD_SIZE,
};
use hashsync::{BoundedOutcome, BoundedStep, FieldMap, SyncError};

fn fields(entries: &[(&str, &str)]) -> FieldMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn command_survives(command: Command) {
    let encoded = encode_command(&command);
    assert_eq!(encoded[0], command.command_type() as u8);
    assert_eq!(decode_command(&encoded).unwrap(), command);
}

fn reply_survives(reply: Reply) {
    let encoded = encode_reply(&reply);
    assert_eq!(encoded[0], reply.status() as u8);
    assert_eq!(decode_reply(&encoded).unwrap(), reply);
}

// =============================================================================
// Command Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_ping() {
    let encoded = encode_command(&Command::Ping);
    assert_eq!(encoded, vec![0x01, 0, 0, 0, 0]);
    assert_eq!(decode_command(&encoded).unwrap(), Command::Ping);
}

#[test]
fn test_encode_decode_get() {
    let encoded = encode_command(&Command::Get {
        key: "hello".to_string(),
    });

    // header + one length-prefixed argument
    assert_eq!(encoded.len(), HEADER_SIZE + 4 + 5);
    assert_eq!(&encoded[1..5], &9u32.to_be_bytes());

    match decode_command(&encoded).unwrap() {
        Command::Get { key } => assert_eq!(key, "hello"),
        other => panic!("Expected GET command, got {:?}", other),
    }
}

#[test]
fn test_encode_decode_string_commands() {
    command_survives(Command::Set {
        key: "k".to_string(),
        value: "value with spaces".to_string(),
    });
    command_survives(Command::Expire {
        key: "k".to_string(),
        seconds: 30,
    });
    command_survives(Command::Delete {
        keys: vec!["a".to_string(), "b".to_string()],
    });
    command_survives(Command::Delete { keys: vec![] });
}

#[test]
fn test_encode_decode_hash_set_all() {
    command_survives(Command::HashSetAll {
        key: "player:1".to_string(),
        fields: fields(&[("energy", "5"), ("name", "ann")]),
    });
}

#[test]
fn test_encode_decode_hash_increment_negative() {
    command_survives(Command::HashIncrement {
        key: "h".to_string(),
        field: "n".to_string(),
        delta: -42,
    });
}

#[test]
fn test_encode_decode_bounded_increment() {
    command_survives(Command::HashIncrementBounded {
        key: "h".to_string(),
        field: "n".to_string(),
        step: BoundedStep::down(3, -10).unwrap(),
    });
}

#[test]
fn test_encode_decode_unicode_and_empty_args() {
    command_survives(Command::HashSetField {
        key: "".to_string(),
        field: "名前".to_string(),
        value: "ünïcödé".to_string(),
    });
}

// =============================================================================
// Command Errors
// =============================================================================

#[test]
fn test_decode_unknown_command() {
    let bytes = [0xFF, 0, 0, 0, 0];
    assert!(matches!(decode_command(&bytes), Err(SyncError::Protocol(_))));
}

#[test]
fn test_decode_incomplete_header() {
    assert!(matches!(decode_command(&[0x01, 0, 0]), Err(SyncError::Protocol(_))));
}

#[test]
fn test_decode_truncated_payload() {
    let mut encoded = encode_command(&Command::Get {
        key: "hello".to_string(),
    });
    encoded.truncate(encoded.len() - 2);
    assert!(matches!(decode_command(&encoded), Err(SyncError::Protocol(_))));
}

#[test]
fn test_decode_oversized_payload() {
    let mut bytes = vec![CommandType::Get as u8];
    bytes.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());
    assert!(matches!(decode_command(&bytes), Err(SyncError::Protocol(_))));
}

#[test]
fn test_from_args_arity() {
    assert!(matches!(
        Command::from_args(CommandType::Get, vec![]),
        Err(SyncError::Protocol(_))
    ));
    assert!(matches!(
        Command::from_args(CommandType::Get, vec!["a".to_string(), "b".to_string()]),
        Err(SyncError::Protocol(_))
    ));
    assert!(matches!(
        Command::from_args(
            CommandType::HashSetAll,
            vec!["k".to_string(), "f".to_string()]
        ),
        Err(SyncError::Protocol(_))
    ));
}

#[test]
fn test_from_args_rejects_bad_numbers() {
    let args = vec!["k".to_string(), "f".to_string(), "many".to_string()];
    assert!(matches!(
        Command::from_args(CommandType::HashIncrement, args),
        Err(SyncError::Protocol(_))
    ));
}

#[test]
fn test_from_args_rejects_bad_bounded_step() {
    let args = |direction: &str, delta: &str| {
        vec![
            "k".to_string(),
            "f".to_string(),
            direction.to_string(),
            delta.to_string(),
            "10".to_string(),
        ]
    };

    assert!(Command::from_args(CommandType::HashIncrementBounded, args("up", "1")).is_ok());
    assert!(matches!(
        Command::from_args(CommandType::HashIncrementBounded, args("sideways", "1")),
        Err(SyncError::Protocol(_))
    ));
    assert!(matches!(
        Command::from_args(CommandType::HashIncrementBounded, args("up", "0")),
        Err(SyncError::Protocol(_))
    ));
}

// =============================================================================
// Reply Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_simple_replies() {
    assert_eq!(encode_reply(&Reply::Ok), vec![Status::Ok as u8, 0, 0, 0, 0]);
    reply_survives(Reply::Ok);
    reply_survives(Reply::Nil);
    reply_survives(Reply::Int(i64::MIN));
    reply_survives(Reply::Text(String::new()));
    reply_survives(Reply::Text("hello".to_string()));
}

#[test]
fn test_encode_decode_collections() {
    reply_survives(Reply::Map(fields(&[("a", "1"), ("b", "")])));
    reply_survives(Reply::Map(FieldMap::new()));
    reply_survives(Reply::List(vec!["x".to_string(), "y".to_string()]));
}

#[test]
fn test_encode_decode_bounded_outcomes() {
    reply_survives(Reply::Bounded(BoundedOutcome::Applied(8)));
    reply_survives(Reply::Bounded(BoundedOutcome::Clamped(-1)));
    reply_survives(Reply::Bounded(BoundedOutcome::Refused));
}

#[test]
fn test_decode_unknown_bounded_tag() {
    let mut encoded = encode_reply(&Reply::Bounded(BoundedOutcome::Applied(1)));
    encoded[HEADER_SIZE] = 9;
    assert!(matches!(decode_reply(&encoded), Err(SyncError::Protocol(_))));
}

#[test]
fn test_decode_unknown_status() {
    assert!(matches!(decode_reply(&[0x7F, 0, 0, 0, 0]), Err(SyncError::Protocol(_))));
}

#[test]
fn test_decode_short_int_reply() {
    let bytes = [Status::Int as u8, 0, 0, 0, 2, 0, 1];
    assert!(matches!(decode_reply(&bytes), Err(SyncError::Protocol(_))));
}

// =============================================================================
// Error Replies
// =============================================================================

#[test]
fn test_error_reply_rebuilds_variant() {
    let original = SyncError::Parse {
        target: "h/n".to_string(),
        value: "abc".to_string(),
    };
    let reply = decode_reply(&encode_reply(&Reply::from_error(&original))).unwrap();

    match reply {
        Reply::Error { code, args } => {
            assert_eq!(code, ErrorCode::Parse);
            match Reply::into_error(code, args) {
                SyncError::Parse { target, value } => {
                    assert_eq!(target, "h/n");
                    assert_eq!(value, "abc");
                }
                other => panic!("Expected Parse error, got {:?}", other),
            }
        }
        other => panic!("Expected error reply, got {:?}", other),
    }
}

#[test]
fn test_error_reply_codes() {
    let cases = [
        (SyncError::WrongType("k".to_string()), ErrorCode::WrongType),
        (SyncError::Overflow("k/f".to_string()), ErrorCode::Overflow),
        (SyncError::Unsupported("x".to_string()), ErrorCode::Unsupported),
        (SyncError::Protocol("x".to_string()), ErrorCode::Protocol),
        (SyncError::BlankKey, ErrorCode::Other),
    ];

    for (error, expected) in cases {
        match Reply::from_error(&error) {
            Reply::Error { code, .. } => assert_eq!(code, expected),
            other => panic!("Expected error reply, got {:?}", other),
        }
    }
}

#[test]
fn test_busy_reply_is_unavailable() {
    match Reply::busy("too many connections") {
        Reply::Error { code, args } => {
            assert_eq!(code, ErrorCode::Busy);
            assert!(Reply::into_error(code, args).is_unavailable());
        }
        other => panic!("Expected error reply, got {:?}", other),
    }
}

#[test]
fn test_unknown_error_code_maps_to_other() {
    assert_eq!(ErrorCode::from_u8(0xEE), ErrorCode::Other);
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_command_round_trip() {
    let commands = vec![
        Command::Ping,
        Command::HashGetAll {
            key: "h".to_string(),
        },
        Command::Incr {
            key: "c".to_string(),
        },
    ];

    let mut buffer = Vec::new();
    for command in &commands {
        write_command(&mut buffer, command).unwrap();
    }

    let mut cursor = Cursor::new(buffer);
    for command in &commands {
        assert_eq!(&read_command(&mut cursor).unwrap(), command);
    }
    assert!(matches!(read_command(&mut cursor), Err(SyncError::Io(_))));
}

#[test]
fn test_stream_reply_round_trip() {
    let mut buffer = Vec::new();
    write_reply(&mut buffer, &Reply::Int(7)).unwrap();
    write_reply(&mut buffer, &Reply::Nil).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_reply(&mut cursor).unwrap(), Reply::Int(7));
    assert_eq!(read_reply(&mut cursor).unwrap(), Reply::Nil);
}

#[test]
fn test_stream_truncated_frame_is_io_error() {
    let mut encoded = encode_reply(&Reply::Text("hello".to_string()));
    encoded.truncate(encoded.len() - 1);

    let mut cursor = Cursor::new(encoded);
    assert!(matches!(read_reply(&mut cursor), Err(SyncError::Io(_))));
}
