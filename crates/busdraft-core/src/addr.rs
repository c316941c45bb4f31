//! Register address codec.
//!
//! Operators type addresses in decimal or `0x`-prefixed hex, and stored
//! documents may carry either spelling as a string. Canonical storage is a
//! plain integer; the notation only affects display and strict re-parsing.

use serde::{Deserialize, Serialize};

/// Notation used when rendering or strictly parsing an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFormat {
    Hex,
    #[default]
    Dec,
}

impl AddressFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFormat::Hex => "hex",
            AddressFormat::Dec => "dec",
        }
    }

    /// Infer the notation from a raw stored string.
    pub fn infer(raw: &str) -> Self {
        let bytes = raw.trim().as_bytes();
        if bytes.len() >= 2 && bytes[0] == b'0' && (bytes[1] == b'x' || bytes[1] == b'X') {
            AddressFormat::Hex
        } else {
            AddressFormat::Dec
        }
    }
}

/// Parse an operator-entered address.
///
/// With an explicit format the input must match that notation; hex accepts
/// an optional `0x` prefix. Without one, detection tries `0x`-prefixed hex,
/// then decimal digits, then bare hex digits, then a generic numeric parse
/// truncated toward zero. Empty or unparseable input is `None`.
pub fn parse_address(input: &str, format: Option<AddressFormat>) -> Option<u32> {
    let raw = input.trim();
    if raw.is_empty() {
        return None;
    }
    match format {
        Some(AddressFormat::Hex) => {
            let lower = raw.to_ascii_lowercase();
            let digits = lower.strip_prefix("0x").unwrap_or(&lower);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            u32::from_str_radix(digits, 16).ok()
        }
        Some(AddressFormat::Dec) => {
            if !raw.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            raw.parse().ok()
        }
        None => {
            let lower = raw.to_ascii_lowercase();
            if let Some(digits) = lower.strip_prefix("0x") {
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return u32::from_str_radix(digits, 16).ok();
                }
            }
            if lower.bytes().all(|b| b.is_ascii_digit()) {
                return lower.parse().ok();
            }
            if lower.bytes().all(|b| b.is_ascii_hexdigit()) {
                return u32::from_str_radix(&lower, 16).ok();
            }
            let number: f64 = raw.parse().ok()?;
            if number.is_finite() && (0.0..=u32::MAX as f64).contains(&number) {
                Some(number.trunc() as u32)
            } else {
                None
            }
        }
    }
}

/// Render an address in the requested notation.
///
/// Negative values render as empty text so the caller re-prompts instead
/// of showing a sign the wire format cannot carry.
pub fn format_address(value: i64, format: AddressFormat) -> String {
    if value < 0 {
        return String::new();
    }
    match format {
        AddressFormat::Hex => format!("0x{value:x}"),
        AddressFormat::Dec => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_hex_parsing() {
        assert_eq!(parse_address("0x1A", Some(AddressFormat::Hex)), Some(26));
        assert_eq!(parse_address("1a", Some(AddressFormat::Hex)), Some(26));
        assert_eq!(parse_address("0X1A", Some(AddressFormat::Hex)), Some(26));
        assert_eq!(parse_address("0x", Some(AddressFormat::Hex)), None);
        assert_eq!(parse_address("0x1G", Some(AddressFormat::Hex)), None);
        assert_eq!(parse_address("", Some(AddressFormat::Hex)), None);
    }

    #[test]
    fn test_strict_dec_parsing() {
        assert_eq!(parse_address("42", Some(AddressFormat::Dec)), Some(42));
        assert_eq!(parse_address(" 007 ", Some(AddressFormat::Dec)), Some(7));
        assert_eq!(parse_address("0x42", Some(AddressFormat::Dec)), None);
        assert_eq!(parse_address("4 2", Some(AddressFormat::Dec)), None);
        assert_eq!(parse_address("-5", Some(AddressFormat::Dec)), None);
    }

    #[test]
    fn test_auto_detection_order() {
        // 0x-prefixed hex wins
        assert_eq!(parse_address("0x10", None), Some(16));
        // plain digits are decimal even though they are also hex digits
        assert_eq!(parse_address("10", None), Some(10));
        // bare hex digits
        assert_eq!(parse_address("ff", None), Some(255));
        assert_eq!(parse_address("1A", None), Some(26));
        // generic numeric fallback truncates toward zero
        assert_eq!(parse_address("42.9", None), Some(42));
        assert_eq!(parse_address("-3", None), None);
        assert_eq!(parse_address("flow", None), None);
    }

    #[test]
    fn test_format_address() {
        assert_eq!(format_address(255, AddressFormat::Hex), "0xff");
        assert_eq!(format_address(255, AddressFormat::Dec), "255");
        assert_eq!(format_address(0, AddressFormat::Hex), "0x0");
        assert_eq!(format_address(-1, AddressFormat::Hex), "");
        assert_eq!(format_address(-1, AddressFormat::Dec), "");
    }

    #[test]
    fn test_format_parse_round_trip() {
        for value in (0u32..=65_535).step_by(37).chain([0, 1, 255, 65_535]) {
            let hex = format_address(value as i64, AddressFormat::Hex);
            assert_eq!(parse_address(&hex, Some(AddressFormat::Hex)), Some(value));
            let dec = format_address(value as i64, AddressFormat::Dec);
            assert_eq!(parse_address(&dec, Some(AddressFormat::Dec)), Some(value));
        }
    }

    #[test]
    fn test_infer_format() {
        assert_eq!(AddressFormat::infer("0x10"), AddressFormat::Hex);
        assert_eq!(AddressFormat::infer("  0X10"), AddressFormat::Hex);
        assert_eq!(AddressFormat::infer("16"), AddressFormat::Dec);
        assert_eq!(AddressFormat::infer("ff"), AddressFormat::Dec);
    }
}
