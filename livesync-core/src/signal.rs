//! Compact key-value signaling codec
//!
//! Encodes and decodes the CMCD/CMSD-style dictionary strings carried in
//! the `CMCD` query parameter and the `Cmsd-Dynamic` response header.
//! The grammar is a simplified RFC 8941 dictionary: comma-separated
//! pairs, `key=value` or a bare key meaning boolean true.

use std::collections::HashMap;
use tracing::warn;

/// A decoded signaling value.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    /// Bare numeric token. Only produced when the textual form
    /// round-trips exactly, so `123px` never becomes 123.
    Number(f64),
    /// Any other token; surrounding double quotes are stripped.
    Text(String),
    /// Bare key with no `=`.
    Flag,
}

impl SignalValue {
    /// Numeric view of the value. Text parses leniently so a quoted
    /// report like `ltc="1.5"` still counts; non-finite values don't.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Number(n) => Some(*n),
            SignalValue::Text(t) => t.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            SignalValue::Flag => None,
        }
    }

    /// Textual view for identifier-like values such as session ids.
    /// Empty strings yield `None`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SignalValue::Number(n) => Some(format_number(*n)),
            SignalValue::Text(t) => (!t.is_empty()).then(|| t.clone()),
            SignalValue::Flag => None,
        }
    }
}

/// Decoded signaling dictionary. Keys are unique, insertion order is
/// irrelevant.
pub type SignalMap = HashMap<String, SignalValue>;

/// Decode a signaling string into a map.
///
/// Decoding never fails: malformed pairs are dropped with a warning and
/// blank input yields the empty map. Each pair is split on the first `=`;
/// a pair without `=` becomes a boolean flag.
pub fn decode(input: &str) -> SignalMap {
    let mut map = SignalMap::new();
    if input.trim().is_empty() {
        return map;
    }

    for pair in input.split(',') {
        let pair = pair.trim();
        // Trailing or doubled commas produce empty candidates
        if pair.is_empty() {
            continue;
        }

        match pair.split_once('=') {
            None => {
                map.insert(pair.to_string(), SignalValue::Flag);
            }
            Some((key, value)) => {
                let key = key.trim();
                if key.is_empty() {
                    warn!("skipping signaling pair with empty key: {:?}", pair);
                    continue;
                }
                map.insert(key.to_string(), parse_value(value.trim()));
            }
        }
    }

    map
}

/// Encode a map back into the signaling grammar: bare keys for flags,
/// bare numbers, double-quoted text. Output is sorted by key so encoding
/// is deterministic.
pub fn encode(map: &SignalMap) -> String {
    let mut parts: Vec<String> = map
        .iter()
        .map(|(key, value)| match value {
            SignalValue::Flag => key.clone(),
            SignalValue::Number(n) => format!("{}={}", key, format_number(*n)),
            SignalValue::Text(t) => format!("{}=\"{}\"", key, t),
        })
        .collect();
    parts.sort();
    parts.join(",")
}

fn parse_value(raw: &str) -> SignalValue {
    if let Some(n) = parse_exact_number(raw) {
        return SignalValue::Number(n);
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return SignalValue::Text(raw[1..raw.len() - 1].to_string());
    }
    SignalValue::Text(raw.to_string())
}

/// Parse `raw` as a number only if formatting the parsed value yields the
/// exact input again. Rejects partial-numeric strings like `123px` and
/// non-canonical spellings like `1e3`, `.5` or `+2`.
fn parse_exact_number(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    let n: f64 = raw.parse().ok()?;
    if !n.is_finite() {
        return None;
    }
    (format_number(n) == raw).then_some(n)
}

/// Format a number the way the signaling grammar expects: integral values
/// print without a decimal point.
pub fn format_number(n: f64) -> String {
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pairs_and_flags() {
        let map = decode("sid=\"abc\",ltc=1.5,bs,ts=1678886400000");
        assert_eq!(map.len(), 4);
        assert_eq!(map["sid"], SignalValue::Text("abc".to_string()));
        assert_eq!(map["ltc"], SignalValue::Number(1.5));
        assert_eq!(map["bs"], SignalValue::Flag);
        assert_eq!(map["ts"], SignalValue::Number(1678886400000.0));
    }

    #[test]
    fn test_decode_numeric_round_trip_rule() {
        assert_eq!(decode("v=12")["v"], SignalValue::Number(12.0));
        assert_eq!(decode("v=-3.25")["v"], SignalValue::Number(-3.25));
        // Partial-numeric and non-canonical spellings stay strings
        assert_eq!(decode("v=123px")["v"], SignalValue::Text("123px".to_string()));
        assert_eq!(decode("v=1e3")["v"], SignalValue::Text("1e3".to_string()));
        assert_eq!(decode("v=.5")["v"], SignalValue::Text(".5".to_string()));
        assert_eq!(decode("v=-0")["v"], SignalValue::Text("-0".to_string()));
        assert_eq!(decode("v=NaN")["v"], SignalValue::Text("NaN".to_string()));
    }

    #[test]
    fn test_decode_quoted_strings() {
        assert_eq!(decode("v=\"hello world\"")["v"], SignalValue::Text("hello world".to_string()));
        // Quoted numbers stay strings; the quotes are only stripped
        assert_eq!(decode("v=\"12\"")["v"], SignalValue::Text("12".to_string()));
        // A single quote character is too short to be a quoted pair
        assert_eq!(decode("v=\"")["v"], SignalValue::Text("\"".to_string()));
    }

    #[test]
    fn test_decode_splits_on_first_equals() {
        assert_eq!(decode("a=b=c")["a"], SignalValue::Text("b=c".to_string()));
    }

    #[test]
    fn test_decode_skips_empty_pairs_and_empty_keys() {
        let map = decode("a=1,,b=2,");
        assert_eq!(map.len(), 2);

        let map = decode("=5,a=1,=");
        assert_eq!(map.len(), 1);
        assert_eq!(map["a"], SignalValue::Number(1.0));
    }

    #[test]
    fn test_decode_trims_whitespace() {
        let map = decode(" a = 1 , b = \"x\" , c ");
        assert_eq!(map["a"], SignalValue::Number(1.0));
        assert_eq!(map["b"], SignalValue::Text("x".to_string()));
        assert_eq!(map["c"], SignalValue::Flag);
    }

    #[test]
    fn test_decode_blank_input() {
        assert!(decode("").is_empty());
        assert!(decode("   ").is_empty());
    }

    #[test]
    fn test_decode_empty_value() {
        // `k=` keeps the key with an empty string value
        assert_eq!(decode("k=")["k"], SignalValue::Text(String::new()));
    }

    #[test]
    fn test_encode() {
        let mut map = SignalMap::new();
        map.insert("rate".to_string(), SignalValue::Number(2.0));
        map.insert("sid".to_string(), SignalValue::Text("abc".to_string()));
        map.insert("bs".to_string(), SignalValue::Flag);
        assert_eq!(encode(&map), "bs,rate=2,sid=\"abc\"");
    }

    #[test]
    fn test_decode_encode_round_trip_for_numbers_and_flags() {
        let mut map = SignalMap::new();
        map.insert("ltc".to_string(), SignalValue::Number(1.5));
        map.insert("ts".to_string(), SignalValue::Number(1678886400000.0));
        map.insert("su".to_string(), SignalValue::Flag);
        assert_eq!(decode(&encode(&map)), map);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(12.0), "12");
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(0.005), "0.005");
        assert_eq!(format_number(-1.1), "-1.1");
        assert_eq!(format_number(1678886400000.0), "1678886400000");
    }
}
