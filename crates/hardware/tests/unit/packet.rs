//! Remote serial protocol framing tests.

use armsim_core::common::Fault;
use armsim_core::gdb::packet::{checksum, encode, read_packet};
use pretty_assertions::assert_eq;

// ══════════════════════════════════════════════════════════
// 1. Encoding
// ══════════════════════════════════════════════════════════

#[test]
fn checksum_is_the_byte_sum_modulo_256() {
    assert_eq!(checksum(b""), 0);
    assert_eq!(checksum(b"S05"), 0xB8);
    assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
}

#[test]
fn stop_reply_frames_as_expected() {
    assert_eq!(encode("S05"), b"$S05#b8");
}

#[test]
fn reserved_bytes_are_escaped() {
    let packet = encode("a$b");
    // '$' becomes '}' followed by '$' ^ 0x20, and the checksum covers the
    // escaped form.
    assert_eq!(&packet[..5], b"$a}\x04b");
    let sum = checksum(b"a}\x04b");
    assert_eq!(&packet[5..], format!("#{sum:02x}").as_bytes());
}

// ══════════════════════════════════════════════════════════
// 2. Decoding
// ══════════════════════════════════════════════════════════

#[test]
fn encoded_packets_read_back() {
    for payload in ["", "S05", "qSupported", "a$b#c}d*e"] {
        let wire = encode(payload);
        let got = read_packet(&mut &wire[..]).unwrap();
        assert_eq!(got, payload);
    }
}

#[test]
fn escaped_wire_bytes_count_toward_the_checksum() {
    // '$' travels as '}','\x04'; the wire checksum covers those two bytes,
    // not the reconstructed payload.
    assert_eq!(read_packet(&mut &b"$a}\x04b#44"[..]).unwrap(), "a$b");
    let wire = encode("a$b");
    assert_eq!(read_packet(&mut &wire[..]).unwrap(), "a$b");
}

#[test]
fn stray_acks_before_the_packet_are_skipped() {
    let mut wire = b"+-+".to_vec();
    wire.extend_from_slice(&encode("g"));
    assert_eq!(read_packet(&mut &wire[..]).unwrap(), "g");
}

#[test]
fn checksum_mismatch_is_fatal() {
    let err = read_packet(&mut &b"$S05#00"[..]).unwrap_err();
    assert!(matches!(err, Fault::GdbDesync { .. }), "{err}");
}

#[test]
fn truncated_packet_is_fatal() {
    let err = read_packet(&mut &b"$S05"[..]).unwrap_err();
    assert!(matches!(err, Fault::GdbDesync { .. }), "{err}");
}

#[test]
fn garbage_before_the_dollar_is_fatal() {
    let err = read_packet(&mut &b"xyz$g#67"[..]).unwrap_err();
    assert!(matches!(err, Fault::GdbDesync { .. }), "{err}");
}
