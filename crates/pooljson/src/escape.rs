//! JSON string escaping.
//!
//! [`encode`] turns raw bytes into the body of a JSON string literal and
//! [`decode`] reverses it. Both return their input untouched when there is
//! nothing to do, so the common case allocates nothing.
//!
//! Decoding is lenient: a malformed `\u` escape (bad hex digits, a lone
//! surrogate) is kept verbatim, an unknown escape such as `\q` keeps the
//! escaped byte, and a backslash at the very end is kept.

use std::borrow::Cow;

use memchr::memchr;

use crate::pool::Pool;

/// Returns `true` when [`encode`] would change `bytes`.
#[must_use]
pub fn needs_encoding(bytes: &[u8]) -> bool {
    bytes.iter().any(|&b| escaped_len(b) != 1)
}

/// Escapes `bytes` for use inside a JSON string literal.
///
/// `"` `\` `/` and the control characters backspace, form feed, newline,
/// carriage return and tab use their short escapes; every other byte below
/// `0x20` becomes `\u00XX`.
pub fn encode<'a>(pool: &'a Pool, bytes: &'a [u8]) -> &'a [u8] {
    if !needs_encoding(bytes) {
        return bytes;
    }
    let len = bytes.iter().map(|&b| escaped_len(b)).sum();
    let out = pool.alloc_zeroed(len);
    let mut at = 0;
    for &byte in bytes {
        let short = match byte {
            b'"' => b'"',
            b'\\' => b'\\',
            b'/' => b'/',
            0x08 => b'b',
            0x0c => b'f',
            b'\n' => b'n',
            b'\r' => b'r',
            b'\t' => b't',
            0x00..=0x1f => {
                out[at..at + 6].copy_from_slice(&[
                    b'\\',
                    b'u',
                    b'0',
                    b'0',
                    HEX[usize::from(byte >> 4)],
                    HEX[usize::from(byte & 0xf)],
                ]);
                at += 6;
                continue;
            }
            _ => {
                out[at] = byte;
                at += 1;
                continue;
            }
        };
        out[at] = b'\\';
        out[at + 1] = short;
        at += 2;
    }
    out
}

/// Decodes the escapes in `bytes`. Returns `bytes` itself when it holds no
/// backslash, otherwise a decoded copy in `pool`.
pub fn decode<'a>(pool: &'a Pool, bytes: &'a [u8]) -> &'a [u8] {
    if memchr(b'\\', bytes).is_none() {
        return bytes;
    }
    let copy = pool.dup_unaligned(bytes);
    let len = decode_in_place(copy);
    let copy: &'a [u8] = copy;
    &copy[..len]
}

/// Decodes escapes in place, returning the decoded length. The output is
/// never longer than the input.
pub fn decode_in_place(buf: &mut [u8]) -> usize {
    let Some(first) = memchr(b'\\', buf) else {
        return buf.len();
    };
    let mut read = first;
    let mut write = first;
    while read < buf.len() {
        let byte = buf[read];
        if byte != b'\\' {
            buf[write] = byte;
            write += 1;
            read += 1;
            continue;
        }
        let Some(&escaped) = buf.get(read + 1) else {
            buf[write] = b'\\';
            write += 1;
            break;
        };
        let out = match escaped {
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'u' => {
                if let Some((ch, consumed)) = unicode_escape(&buf[read + 2..]) {
                    let mut utf8 = [0; 4];
                    let encoded = ch.encode_utf8(&mut utf8).as_bytes();
                    buf[write..write + encoded.len()].copy_from_slice(encoded);
                    write += encoded.len();
                    read += 2 + consumed;
                } else {
                    let end = (read + 6).min(buf.len());
                    buf.copy_within(read..end, write);
                    write += end - read;
                    read = end;
                }
                continue;
            }
            other => other,
        };
        buf[write] = out;
        write += 1;
        read += 2;
    }
    write
}

/// [`decode`] without a pool, for callers that own their output.
pub(crate) fn unescape(bytes: &[u8]) -> Cow<'_, [u8]> {
    if memchr(b'\\', bytes).is_none() {
        return Cow::Borrowed(bytes);
    }
    let mut owned = bytes.to_vec();
    let len = decode_in_place(&mut owned);
    owned.truncate(len);
    Cow::Owned(owned)
}

const HEX: &[u8; 16] = b"0123456789abcdef";

fn escaped_len(byte: u8) -> usize {
    match byte {
        b'"' | b'\\' | b'/' | 0x08 | 0x0c | b'\n' | b'\r' | b'\t' => 2,
        0x00..=0x1f => 6,
        _ => 1,
    }
}

/// Decodes the hex digits following `\u`, joining a surrogate pair when a
/// second escape follows. Returns the character and the bytes consumed after
/// the `u`.
fn unicode_escape(rest: &[u8]) -> Option<(char, usize)> {
    let high = HexQuad::read(rest)?;
    match high {
        0xd800..=0xdbff => {
            let tail = rest.get(4..)?;
            if !tail.starts_with(b"\\u") {
                return None;
            }
            let low = HexQuad::read(&tail[2..])?;
            if !(0xdc00..=0xdfff).contains(&low) {
                return None;
            }
            let code = 0x10000 + ((high - 0xd800) << 10) + (low - 0xdc00);
            char::from_u32(code).map(|ch| (ch, 10))
        }
        0xdc00..=0xdfff => None,
        _ => char::from_u32(high).map(|ch| (ch, 4)),
    }
}

/// Accumulates exactly four hexadecimal digits into a code unit.
#[derive(Debug, Default)]
struct HexQuad {
    acc: u32,
    len: u8,
}

impl HexQuad {
    fn read(bytes: &[u8]) -> Option<u32> {
        let mut quad = Self::default();
        bytes.iter().take(4).find_map(|&b| quad.feed(b).transpose())?.ok()
    }

    /// Convert a single ASCII hex digit into its 0..=15 value.
    #[inline]
    fn hex_val(b: u8) -> Option<u32> {
        match b {
            b'0'..=b'9' => Some(u32::from(b - b'0')),
            b'a'..=b'f' => Some(u32::from(b - b'a') + 10),
            b'A'..=b'F' => Some(u32::from(b - b'A') + 10),
            _ => None,
        }
    }

    /// Returns `Ok(Some(unit))` on the fourth digit, `Ok(None)` before it and
    /// `Err(())` on a non-hex byte.
    fn feed(&mut self, b: u8) -> Result<Option<u32>, ()> {
        let d = Self::hex_val(b).ok_or(())?;
        self.acc = (self.acc << 4) | d;
        self.len += 1;
        if self.len == 4 {
            let unit = self.acc;
            *self = Self::default();
            Ok(Some(unit))
        } else {
            Ok(None)
        }
    }
}
