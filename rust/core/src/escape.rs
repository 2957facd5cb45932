// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! String escape decoding
//!
//! STEP strings are 7-bit clean. Apostrophes and backslashes are doubled,
//! and everything outside printable ASCII goes through one of the
//! extended-character escapes:
//!
//! - `\X2\hhhh...\X0\` - UTF-16 code units, 4 hex digits each
//! - `\X4\hhhhhhhh...\X0\` - code points, 8 hex digits each
//! - `\X\hh` - one ISO-8859-1 code point
//! - `\S\c` - `c` shifted into the upper half of the active code page
//!   (`\PA\`, ISO-8859-1, is the only page supported)

use std::borrow::Cow;
use std::fmt::Write;

use crate::error::{Error, Result};

/// Decode the body of a string literal (apostrophes stripped).
///
/// Error offsets are relative to `body`.
pub fn decode_string(body: &str) -> Result<String> {
    let bytes = body.as_bytes();
    let mut out = String::with_capacity(body.len());
    let mut pos = 0;

    while pos < bytes.len() {
        // Copy the run up to the next character that needs attention
        let next = memchr::memchr2(b'\'', b'\\', &bytes[pos..])
            .map_or(bytes.len(), |i| pos + i);
        out.push_str(&body[pos..next]);
        pos = next;
        if pos >= bytes.len() {
            break;
        }

        if bytes[pos] == b'\'' {
            if bytes.get(pos + 1) == Some(&b'\'') {
                out.push('\'');
                pos += 2;
                continue;
            }
            return Err(Error::decode(body, pos, "unescaped apostrophe"));
        }

        pos = decode_escape(body, pos, &mut out)?;
    }

    Ok(out)
}

/// Decode without allocating when the body contains no escapes.
pub(crate) fn decode_string_cow(body: &str) -> Result<Cow<'_, str>> {
    if memchr::memchr2(b'\'', b'\\', body.as_bytes()).is_none() {
        Ok(Cow::Borrowed(body))
    } else {
        decode_string(body).map(Cow::Owned)
    }
}

/// Decode one backslash escape starting at `start`, returning the offset after it.
fn decode_escape(body: &str, start: usize, out: &mut String) -> Result<usize> {
    let rest = &body[start..];

    if rest.starts_with("\\\\") {
        out.push('\\');
        return Ok(start + 2);
    }
    if rest.starts_with("\\X2\\") {
        return decode_run(body, start, 4, out);
    }
    if rest.starts_with("\\X4\\") {
        return decode_run(body, start, 8, out);
    }
    if rest.starts_with("\\X\\") {
        let hex = rest.get(3..5).filter(|h| is_hex(h.as_bytes()));
        let hex = hex.ok_or_else(|| {
            Error::decode(body, start, "\\X\\ escape needs exactly 2 hex digits")
        })?;
        out.push(char::from(parse_hex(hex) as u8));
        return Ok(start + 5);
    }
    if rest.starts_with("\\S\\") {
        let c = rest[3..]
            .chars()
            .next()
            .filter(|c| (' '..='~').contains(c))
            .ok_or_else(|| Error::decode(body, start, "\\S\\ escape needs a printable character"))?;
        out.push(char::from(c as u8 + 0x80));
        return Ok(start + 4);
    }
    if rest.starts_with("\\P") && rest.as_bytes().get(3) == Some(&b'\\') {
        return match rest.as_bytes()[2] {
            b'A' => Ok(start + 4),
            b'B'..=b'I' => Err(Error::decode(
                body,
                start,
                format!("unsupported code page {}", &rest[..4]),
            )),
            _ => Err(Error::decode(body, start, "unrecognized escape")),
        };
    }

    Err(Error::decode(body, start, "unrecognized escape"))
}

/// Decode an `\X2\` or `\X4\` run terminated by `\X0\`.
fn decode_run(body: &str, start: usize, width: usize, out: &mut String) -> Result<usize> {
    let opener = &body[start..start + 4];
    let run_start = start + 4;
    let run_len = memchr::memchr(b'\\', &body.as_bytes()[run_start..])
        .ok_or_else(|| Error::decode(body, start, format!("unterminated {} run", opener)))?;
    let run_end = run_start + run_len;

    if !body[run_end..].starts_with("\\X0\\") {
        return Err(Error::decode(body, start, format!("unterminated {} run", opener)));
    }
    let run = &body[run_start..run_end];
    if let Some(bad) = run.bytes().position(|b| !b.is_ascii_hexdigit()) {
        return Err(Error::decode(body, run_start + bad, "non-hex digit in extended escape"));
    }
    if run.len() % width != 0 {
        return Err(Error::decode(
            body,
            run_start,
            format!(
                "malformed {} run: {} hex digits is not a multiple of {}",
                opener,
                run.len(),
                width
            ),
        ));
    }

    if width == 4 {
        let units = run.as_bytes().chunks(4).map(|group| parse_hex_bytes(group) as u16);
        for (i, decoded) in char::decode_utf16(units).enumerate() {
            let c = decoded.map_err(|e| {
                Error::decode(
                    body,
                    run_start + i * 4,
                    format!("unpaired surrogate {:04X}", e.unpaired_surrogate()),
                )
            })?;
            out.push(c);
        }
    } else {
        for (i, group) in run.as_bytes().chunks(8).enumerate() {
            let code = parse_hex_bytes(group);
            let c = char::from_u32(code).ok_or_else(|| {
                Error::decode(body, run_start + i * 8, format!("invalid code point {:08X}", code))
            })?;
            out.push(c);
        }
    }

    Ok(run_end + 4)
}

#[inline]
fn is_hex(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_hexdigit)
}

#[inline]
fn parse_hex(hex: &str) -> u32 {
    parse_hex_bytes(hex.as_bytes())
}

/// Hex digits to integer; callers validate the digits first.
#[inline]
fn parse_hex_bytes(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            _ => b - b'A' + 10,
        };
        (acc << 4) | digit as u32
    })
}

/// Encode text as a string literal body (without the surrounding apostrophes).
///
/// Printable ASCII is kept, apostrophes and backslashes are doubled,
/// everything else is written with the narrowest extended escape.
pub fn encode_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    // Width of the currently open \X2\ / \X4\ run, if any
    let mut open_run: Option<u8> = None;

    for c in text.chars() {
        let code = c as u32;
        let width = match code {
            0x20..=0x7E => None,
            0..=0xFF => Some(1),
            0x100..=0xFFFF => Some(2),
            _ => Some(4),
        };

        if open_run.is_some() && open_run != width {
            out.push_str("\\X0\\");
            open_run = None;
        }

        match width {
            None => match c {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                _ => out.push(c),
            },
            Some(1) => {
                let _ = write!(out, "\\X\\{:02X}", code);
            }
            Some(w) => {
                if open_run.is_none() {
                    let _ = write!(out, "\\X{}\\", w);
                    open_run = width;
                }
                if w == 2 {
                    let _ = write!(out, "{:04X}", code);
                } else {
                    let _ = write!(out, "{:08X}", code);
                }
            }
        }
    }

    if open_run.is_some() {
        out.push_str("\\X0\\");
    }
    out
}
