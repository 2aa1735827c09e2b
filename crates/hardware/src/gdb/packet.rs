//! Remote serial protocol framing.
//!
//! Packets travel as `$<payload>#<checksum>` where the checksum is the
//! payload byte sum modulo 256 in two hex digits. The bytes `$`, `#`, `}`
//! and `*` are escaped as `}` followed by the byte xor `0x20`.

use crate::common::Fault;
use std::io::Read;

/// Payload byte sum modulo 256.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Frames a payload as a wire packet, escaping where needed.
pub fn encode(payload: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 4);
    for &b in payload.as_bytes() {
        if matches!(b, b'$' | b'#' | b'}' | b'*') {
            body.push(b'}');
            body.push(b ^ 0x20);
        } else {
            body.push(b);
        }
    }
    let sum = checksum(&body);
    let mut packet = Vec::with_capacity(body.len() + 4);
    packet.push(b'$');
    packet.extend_from_slice(&body);
    packet.push(b'#');
    packet.extend_from_slice(format!("{sum:02x}").as_bytes());
    packet
}

/// Reads one framed packet, verifying the checksum and undoing escapes.
///
/// Stray acknowledgement bytes before the opening `$` are skipped. A
/// checksum mismatch means the channel can no longer be trusted and is
/// fatal.
pub fn read_packet(stream: &mut impl Read) -> Result<String, Fault> {
    loop {
        match read_byte(stream)? {
            b'$' => break,
            b'+' | b'-' => {}
            other => {
                return Err(Fault::GdbDesync {
                    reason: format!("expected '$', got {:#04x}", other),
                })
            }
        }
    }

    // The checksum covers the escaped wire bytes, so it accumulates as they
    // arrive; the body keeps only the unescaped payload.
    let mut body = Vec::new();
    let mut local = 0u8;
    loop {
        match read_byte(stream)? {
            b'#' => break,
            b'}' => {
                let escaped = read_byte(stream)?;
                local = local.wrapping_add(b'}').wrapping_add(escaped);
                body.push(escaped ^ 0x20);
            }
            b => {
                local = local.wrapping_add(b);
                body.push(b);
            }
        }
    }

    let hi = read_byte(stream)?;
    let lo = read_byte(stream)?;
    let wire = (hex_val(hi)? << 4) | hex_val(lo)?;
    if wire != local {
        return Err(Fault::GdbDesync {
            reason: format!("checksum mismatch: wire {wire:02x}, computed {local:02x}"),
        });
    }

    String::from_utf8(body).map_err(|_| Fault::GdbDesync {
        reason: "non-utf8 payload".into(),
    })
}

fn read_byte(stream: &mut impl Read) -> Result<u8, Fault> {
    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf)?;
    if n == 0 {
        return Err(Fault::GdbDesync {
            reason: "connection closed mid-packet".into(),
        });
    }
    Ok(buf[0])
}

fn hex_val(b: u8) -> Result<u8, Fault> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(Fault::GdbDesync {
            reason: format!("bad checksum digit {b:#04x}"),
        }),
    }
}
