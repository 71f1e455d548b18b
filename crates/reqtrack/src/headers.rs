//! Parsing for the `-H "Name: Value; Other: Value"` header flag.

/// Split a header flag into ordered `(name, value)` pairs.
///
/// Pairs are separated by `;`. Names and values are trimmed. Fragments
/// without a colon, or with an empty name, are ignored.
pub fn parse_header_flag(flag: &str) -> Vec<(String, String)> {
    flag.split(';')
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .filter_map(|fragment| fragment.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_flag_pairs() {
        let headers = parse_header_flag("User-Agent: test/1.0;  X-Token :abc ; Accept: */*");
        assert_eq!(
            headers,
            vec![
                ("User-Agent".to_string(), "test/1.0".to_string()),
                ("X-Token".to_string(), "abc".to_string()),
                ("Accept".to_string(), "*/*".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_header_flag_ignores_malformed() {
        let headers = parse_header_flag("garbage; ; :novalue; Host: a:8080");
        assert_eq!(headers, vec![("Host".to_string(), "a:8080".to_string())]);
    }

    #[test]
    fn test_parse_header_flag_empty() {
        assert!(parse_header_flag("").is_empty());
    }
}
