/// Formats bytes as uppercase hexadecimal pairs separated by spaces.
pub(crate) fn format_hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "<empty>".to_string();
    }

    bytes
        .iter()
        .map(|value| hex::encode_upper([*value]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a hexadecimal byte string, ignoring whitespace and an optional `0x`.
pub(crate) fn parse_hex(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let compact: String = value.split_whitespace().collect();
    let digits = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);
    hex::decode(digits)
}

/// Parses a 16-bit value written in decimal or with a `0x` prefix.
pub(crate) fn parse_u16(value: &str) -> Option<u16> {
    let trimmed = value.trim();
    match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(digits) => u16::from_str_radix(digits, 16).ok(),
        None => trimmed.parse().ok(),
    }
}
