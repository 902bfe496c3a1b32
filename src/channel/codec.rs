//! Per-type payload encoding and decoding.
//!
//! | Type   | Decode                                  | Encode            |
//! |--------|-----------------------------------------|-------------------|
//! | Switch | `"1"` / `"0"`, anything else ignored    | `"1"` / `"0"`     |
//! | Dimmer | leading integer, clamped to 0–100       | decimal           |
//! | Select | leading integer                         | decimal           |
//! | Number | —                                       | two decimals      |
//! | Text   | verbatim UTF-8, must fit the slot       | verbatim          |
//! | Sync   | fires when the first byte is `'1'`      | —                 |

use core::fmt::Write;

use super::{Binding, Payload};
use crate::error::CodecError;

pub const DIMMER_MIN: i32 = 0;
pub const DIMMER_MAX: i32 = 100;

/// What a successful [`apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The bound variable was written.
    Stored,
    /// A Sync channel fired; the caller should broadcast.
    SyncRequested,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Leading decimal integer, C `atoi` style.
///
/// Leading whitespace and one sign are accepted, parsing stops at the first
/// non-digit, no digits yields 0 and overflow saturates at the `i32` bounds.
pub fn parse_leading_int(payload: &[u8]) -> i32 {
    let mut rest = payload;
    while let [b, tail @ ..] = rest {
        if b.is_ascii_whitespace() || *b == 0x0b {
            rest = tail;
        } else {
            break;
        }
    }

    let negative = match rest {
        [b'-', tail @ ..] => {
            rest = tail;
            true
        }
        [b'+', tail @ ..] => {
            rest = tail;
            false
        }
        _ => false,
    };

    let mut acc: i64 = 0;
    for b in rest.iter().take_while(|b| b.is_ascii_digit()) {
        acc = acc * 10 + i64::from(b - b'0');
        if acc > i64::from(i32::MAX) + 1 {
            break;
        }
    }
    let signed = if negative { -acc } else { acc };
    signed.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

pub fn decode_switch(payload: &[u8]) -> Result<bool, CodecError> {
    match payload {
        b"1" => Ok(true),
        b"0" => Ok(false),
        _ => Err(CodecError::DecodeIgnored),
    }
}

pub fn decode_dimmer(payload: &[u8]) -> i32 {
    parse_leading_int(payload).clamp(DIMMER_MIN, DIMMER_MAX)
}

pub fn decode_select(payload: &[u8]) -> i32 {
    parse_leading_int(payload)
}

pub fn decode_sync(payload: &[u8]) -> bool {
    payload.first() == Some(&b'1')
}

pub fn decode_text(payload: &[u8]) -> Result<&str, CodecError> {
    core::str::from_utf8(payload).map_err(|_| CodecError::DecodeIgnored)
}

/// Decode `payload` and write it through `binding`.
///
/// On error the bound variable is untouched.
pub fn apply(binding: &Binding<'_>, payload: &[u8]) -> Result<Applied, CodecError> {
    match binding {
        Binding::Switch(cell) => {
            cell.set(decode_switch(payload)?);
        }
        Binding::Dimmer(cell) => cell.set(decode_dimmer(payload)),
        Binding::Select(cell) => cell.set(decode_select(payload)),
        Binding::Number(_) => return Err(CodecError::Unsupported),
        Binding::Text(slot) => slot.replace(decode_text(payload)?)?,
        Binding::Sync => {
            return if decode_sync(payload) {
                Ok(Applied::SyncRequested)
            } else {
                Err(CodecError::DecodeIgnored)
            };
        }
    }
    Ok(Applied::Stored)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

pub fn encode_switch(on: bool) -> Payload {
    let mut out = Payload::new();
    let _ = out.push(if on { b'1' } else { b'0' });
    out
}

pub fn encode_int(value: i32) -> Payload {
    let mut s = heapless::String::<12>::new();
    // "-2147483648" is 11 bytes.
    let _ = write!(s, "{value}");
    bytes(&s)
}

/// Fixed two decimals: `3.14159` → `"3.14"`.
pub fn encode_number(value: f32) -> Result<Payload, CodecError> {
    let mut s = heapless::String::<64>::new();
    write!(s, "{value:.2}").map_err(|_| CodecError::Overflow)?;
    Ok(bytes(&s))
}

pub fn encode_text(text: &str) -> Result<Payload, CodecError> {
    Payload::from_slice(text.as_bytes()).map_err(|()| CodecError::Overflow)
}

/// Current value behind `binding` in wire form.  Sync has none.
pub fn encode(binding: &Binding<'_>) -> Result<Payload, CodecError> {
    match binding {
        Binding::Switch(cell) => Ok(encode_switch(cell.get())),
        Binding::Dimmer(cell) | Binding::Select(cell) => Ok(encode_int(cell.get())),
        Binding::Number(cell) => encode_number(cell.get()),
        Binding::Text(slot) => {
            let mut out = Payload::new();
            slot.copy_into(&mut out)?;
            Ok(out)
        }
        Binding::Sync => Err(CodecError::Unsupported),
    }
}

fn bytes(s: &str) -> Payload {
    let mut out = Payload::new();
    let _ = out.extend_from_slice(s.as_bytes());
    out
}
