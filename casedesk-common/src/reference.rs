//! Human-facing record reference ids (`REF-0000001`)

/// Prefix of every reference id
pub const REFERENCE_PREFIX: &str = "REF-";

/// Zero-padded width of the numeric part
pub const REFERENCE_WIDTH: usize = 7;

/// Format a sequence number as a reference id
pub fn format_reference_id(sequence: i64) -> String {
    format!("{}{:0width$}", REFERENCE_PREFIX, sequence, width = REFERENCE_WIDTH)
}

/// Numeric part of a reference id, `None` when malformed
pub fn parse_reference_number(reference_id: &str) -> Option<i64> {
    let digits = reference_id.trim().strip_prefix(REFERENCE_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i64>().ok()
}

/// Greatest well-formed sequence number among existing ids.
///
/// Ordering is numeric, so `REF-100` beats `REF-99` even without padding.
/// Malformed ids are ignored rather than blocking creation.
pub fn max_reference_number<'a, I>(reference_ids: I) -> Option<i64>
where
    I: IntoIterator<Item = &'a str>,
{
    reference_ids
        .into_iter()
        .filter_map(parse_reference_number)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pads_to_seven_digits() {
        assert_eq!(format_reference_id(1), "REF-0000001");
        assert_eq!(format_reference_id(1234567), "REF-1234567");
        assert_eq!(format_reference_id(12345678), "REF-12345678");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_reference_number("REF-0000042"), Some(42));
        assert_eq!(parse_reference_number("REF-"), None);
        assert_eq!(parse_reference_number("REF-12a"), None);
        assert_eq!(parse_reference_number("CASE-0000001"), None);
    }

    #[test]
    fn test_max_is_numeric_not_lexical() {
        let ids = ["REF-99", "REF-100", "REF-0000007", "REF-bogus"];
        assert_eq!(max_reference_number(ids.iter().copied()), Some(100));
    }

    #[test]
    fn test_max_of_only_malformed_is_none() {
        let ids = ["REF-x", "nonsense"];
        assert_eq!(max_reference_number(ids.iter().copied()), None);
    }
}
