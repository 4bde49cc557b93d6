//! Range request specifiers
//!
//! A [`Specifier`] is the value of a `Range` request header,
//! `"<unit>=<range-set>"`.

use crate::headers::BYTES_UNIT;
use std::fmt;

/// The encoded value of a `Range` request header
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Specifier(String);

impl Specifier {
    /// Build a specifier for an arbitrary unit from an already encoded
    /// range set.
    pub fn new(unit: &str, range_set: &str) -> Self {
        Specifier(format!("{}={}", unit, range_set))
    }

    /// Encode signed byte positions as a `bytes` specifier.
    ///
    /// Positions are consumed left to right:
    /// - a negative `-N` is the suffix range `-N`;
    /// - a non-negative `N` followed by a non-negative `M >= N` is the
    ///   closed range `N-M`, consuming both;
    /// - any other non-negative `N` is the open range `N-`.
    ///
    /// Ranges keep the caller's order; nothing is sorted, merged or
    /// deduplicated. No positions at all encodes `bytes=-0`, which no
    /// server can satisfy.
    pub fn bytes(positions: &[i64]) -> Self {
        if positions.is_empty() {
            return Specifier::new(BYTES_UNIT, "-0");
        }

        let mut ranges = Vec::new();
        let mut i = 0;
        while i < positions.len() {
            let first = positions[i];
            if first < 0 {
                ranges.push(format!("-{}", first.unsigned_abs()));
                i += 1;
                continue;
            }
            match positions.get(i + 1) {
                Some(&last) if last >= first => {
                    ranges.push(format!("{}-{}", first, last));
                    i += 2;
                }
                _ => {
                    ranges.push(format!("{}-", first));
                    i += 1;
                }
            }
        }

        Specifier::new(BYTES_UNIT, &ranges.join(","))
    }

    /// The range unit, everything before the first `=`
    pub fn unit(&self) -> &str {
        self.0.split_once('=').map_or(self.0.as_str(), |(unit, _)| unit)
    }

    /// The range set, everything after the first `=`
    pub fn range_set(&self) -> &str {
        self.0.split_once('=').map_or("", |(_, set)| set)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_unsatisfiable() {
        assert_eq!(Specifier::bytes(&[]).as_str(), "bytes=-0");
    }

    #[test]
    fn test_open_range() {
        assert_eq!(Specifier::bytes(&[0]).as_str(), "bytes=0-");
        assert_eq!(Specifier::bytes(&[500]).as_str(), "bytes=500-");
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(Specifier::bytes(&[-500]).as_str(), "bytes=-500");
        assert_eq!(Specifier::bytes(&[i64::MIN]).as_str(), "bytes=-9223372036854775808");
    }

    #[test]
    fn test_closed_range() {
        assert_eq!(Specifier::bytes(&[0, 99]).as_str(), "bytes=0-99");
        assert_eq!(Specifier::bytes(&[7, 7]).as_str(), "bytes=7-7");
    }

    #[test]
    fn test_pair_consumed_together() {
        assert_eq!(Specifier::bytes(&[0, 9, 20]).as_str(), "bytes=0-9,20-");
        assert_eq!(
            Specifier::bytes(&[0, 9, 20, 29]).as_str(),
            "bytes=0-9,20-29"
        );
    }

    #[test]
    fn test_smaller_next_value_opens_range() {
        assert_eq!(Specifier::bytes(&[10, 5]).as_str(), "bytes=10-,5-");
    }

    #[test]
    fn test_negative_next_value_opens_range() {
        assert_eq!(Specifier::bytes(&[10, -5]).as_str(), "bytes=10-,-5");
    }

    #[test]
    fn test_order_and_duplicates_preserved() {
        assert_eq!(
            Specifier::bytes(&[50, 59, 0, 9, 50, 59]).as_str(),
            "bytes=50-59,0-9,50-59"
        );
    }

    #[test]
    fn test_unit_recovery() {
        let spec = Specifier::new("pages", "1-3");
        assert_eq!(spec.unit(), "pages");
        assert_eq!(spec.range_set(), "1-3");
        assert_eq!(Specifier::bytes(&[1, 2]).unit(), "bytes");
    }
}
