// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary literal decoding
//!
//! A binary literal is written `"NHHHH..."`: `N` (0-3) is the number of unused
//! high-order bits in the first hex digit, the rest is the value in hex.
//! Unused bits must be zero.

use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Decoded binary literal: big-endian bytes plus the exact bit count
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BinaryValue {
    bytes: SmallVec<[u8; 16]>,
    bits: usize,
}

impl BinaryValue {
    /// Number of significant bits
    #[inline]
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Big-endian bytes; unused high-order bits of the first byte are zero
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Value as an integer, if it fits in 128 bits
    pub fn value(&self) -> Option<u128> {
        let significant = match self.bytes.iter().position(|&b| b != 0) {
            Some(first) => &self.bytes[first..],
            None => return Some(0),
        };
        if significant.len() > 16 {
            return None;
        }
        Some(significant.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128))
    }

    /// Padding digit and hex body, as written between the double quotes
    pub(crate) fn hex_body(&self) -> (usize, String) {
        let padding = (4 - self.bits % 4) % 4;
        let digits = (self.bits + padding) / 4;
        let mut hex = String::with_capacity(self.bytes.len() * 2);
        for b in &self.bytes {
            hex.push_str(&format!("{:02X}", b));
        }
        // Byte packing may add one leading zero nibble
        let hex = hex[hex.len() - digits.min(hex.len())..].to_string();
        (padding, hex)
    }
}

/// Decode the body of a binary literal (double quotes stripped).
///
/// Error offsets are relative to `body`.
pub fn decode_binary(body: &str) -> Result<BinaryValue> {
    let bytes = body.as_bytes();
    let padding = match bytes.first() {
        Some(&d @ b'0'..=b'3') => (d - b'0') as usize,
        Some(_) => {
            return Err(Error::decode(body, 0, "binary padding digit must be 0-3"));
        }
        None => return Err(Error::decode(body, 0, "empty binary literal")),
    };

    let hex = &bytes[1..];
    if let Some(bad) = hex.iter().position(|b| !b.is_ascii_hexdigit()) {
        return Err(Error::decode(body, bad + 1, "non-hex digit in binary literal"));
    }
    if hex.is_empty() && padding > 0 {
        return Err(Error::decode(body, 0, "padding declared on empty binary literal"));
    }
    if let Some(&d) = hex.first() {
        if nibble(d) >> (4 - padding) != 0 {
            return Err(Error::decode(body, 1, "unused high-order bits of binary literal are set"));
        }
    }

    let mut packed: SmallVec<[u8; 16]> = SmallVec::with_capacity((hex.len() + 1) / 2);
    // An odd digit count leaves the first byte with a single nibble
    let (head, tail) = hex.split_at(hex.len() % 2);
    if let Some(&d) = head.first() {
        packed.push(nibble(d));
    }
    for pair in tail.chunks(2) {
        packed.push((nibble(pair[0]) << 4) | nibble(pair[1]));
    }

    Ok(BinaryValue {
        bytes: packed,
        bits: hex.len() * 4 - padding,
    })
}

#[inline]
fn nibble(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_byte() {
        let bin = decode_binary("0FF").unwrap();
        assert_eq!(bin.value(), Some(255));
        assert_eq!(bin.bits(), 8);
        assert_eq!(bin.bytes(), &[0xFF]);
    }

    #[test]
    fn test_decode_padding() {
        // 3 unused bits in the leading digit: a single significant bit
        let bin = decode_binary("31").unwrap();
        assert_eq!(bin.bits(), 1);
        assert_eq!(bin.value(), Some(1));

        let bin = decode_binary("23BC").unwrap();
        assert_eq!(bin.bits(), 10);
        assert_eq!(bin.value(), Some(0x3BC));
        assert_eq!(bin.bytes(), &[0x03, 0xBC]);
    }

    #[test]
    fn test_set_padding_bits() {
        for body in ["2FFF", "2ABC", "18", "38"] {
            let err = decode_binary(body).unwrap_err();
            assert!(matches!(err, Error::Decode { .. }), "{} should be rejected", body);
            assert_eq!(err.position().offset, 1);
        }
        assert_eq!(decode_binary("17").unwrap().value(), Some(7));
        assert_eq!(decode_binary("17").unwrap().bits(), 3);
    }

    #[test]
    fn test_decode_empty_body() {
        let bin = decode_binary("0").unwrap();
        assert_eq!(bin.bits(), 0);
        assert_eq!(bin.value(), Some(0));
    }

    #[test]
    fn test_decode_wide() {
        let body = format!("0{}", "F".repeat(40));
        let bin = decode_binary(&body).unwrap();
        assert_eq!(bin.bits(), 160);
        assert_eq!(bin.value(), None);

        let body = format!("0{}1", "0".repeat(39));
        assert_eq!(decode_binary(&body).unwrap().value(), Some(1));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode_binary(""), Err(Error::Decode { .. })));
        assert!(matches!(decode_binary("4FF"), Err(Error::Decode { .. })));
        assert!(matches!(decode_binary("X0"), Err(Error::Decode { .. })));
        assert!(matches!(decode_binary("2"), Err(Error::Decode { .. })));

        let err = decode_binary("0FG").unwrap_err();
        assert_eq!(err.position().offset, 2);
    }

    #[test]
    fn test_hex_body() {
        assert_eq!(decode_binary("0FF").unwrap().hex_body(), (0, "FF".to_string()));
        assert_eq!(decode_binary("23BC").unwrap().hex_body(), (2, "3BC".to_string()));
        assert_eq!(decode_binary("0").unwrap().hex_body(), (0, String::new()));
    }
}
