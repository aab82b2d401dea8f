//! CDM keyword tables and single-line field recognition.
//!
//! A CDM object block is a run of `KEY = VALUE [unit]` lines. Only the
//! keywords below are recognized; everything else in the block is ignored.

use regex::Regex;
use std::sync::OnceLock;

/// Number of slots in a Cartesian state vector.
pub const STATE_VECTOR_LEN: usize = 6;

/// Number of canonical lower-triangular covariance entries (6x6 RTN).
pub const COVARIANCE_LEN: usize = 21;

/// State vector keywords, in slot order.
pub const STATE_VECTOR_FIELDS: [&str; STATE_VECTOR_LEN] =
    ["X", "Y", "Z", "X_DOT", "Y_DOT", "Z_DOT"];

/// Covariance keywords, in canonical row-major lower-triangular order.
pub const COVARIANCE_FIELDS: [&str; COVARIANCE_LEN] = [
    "CR_R", "CT_R", "CT_T", "CN_R", "CN_T", "CN_N",
    "CRDOT_R", "CRDOT_T", "CRDOT_N", "CRDOT_RDOT",
    "CTDOT_R", "CTDOT_T", "CTDOT_N", "CTDOT_RDOT", "CTDOT_TDOT",
    "CNDOT_R", "CNDOT_T", "CNDOT_N", "CNDOT_RDOT", "CNDOT_TDOT", "CNDOT_NDOT",
];

/// Keyword carrying the object's catalog number.
pub const OBJECT_DESIGNATOR: &str = "OBJECT_DESIGNATOR";

/// Common prefix of every object-block header line.
pub const OBJECT_MARKER_PREFIX: &str = "OBJECT = OBJECT";

/// Header line opening the first object block.
pub const OBJECT1_MARKER: &str = "OBJECT = OBJECT1";

/// Header line opening the second object block.
pub const OBJECT2_MARKER: &str = "OBJECT = OBJECT2";

/// What a trimmed line inside an active object block carries.
///
/// `None` values mean the keyword matched but its value did not parse; the
/// caller keeps whatever it had before.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldLine<'a> {
    Designator(Option<&'a str>),
    State { index: usize, value: Option<f64> },
    Covariance { index: usize, value: Option<f64> },
    Other,
}

#[allow(clippy::expect_used)]
fn value_pattern() -> &'static Regex {
    static VALUE: OnceLock<Regex> = OnceLock::new();
    VALUE.get_or_init(|| {
        Regex::new(r"^\s*=\s*([0-9.eE+\-]+)").expect("numeric value pattern compiles")
    })
}

#[allow(clippy::expect_used)]
fn designator_pattern() -> &'static Regex {
    static DESIGNATOR: OnceLock<Regex> = OnceLock::new();
    DESIGNATOR.get_or_init(|| {
        Regex::new(r"^\s*=\s*(\d+)").expect("designator pattern compiles")
    })
}

/// Returns the text after `key` when `key` is a whole token at the start of
/// `line`, i.e. followed by whitespace or `=`. `X` never matches `X_DOT = 1`.
pub fn strip_keyword<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?;
    match rest.chars().next() {
        Some(c) if c == '=' || c.is_whitespace() => Some(rest),
        _ => None,
    }
}

/// Parses the numeric value following a keyword: `= 7000.5 [km]` yields
/// `7000.5`. Trailing annotations are ignored.
pub fn parse_value(rest: &str) -> Option<f64> {
    let token = value_pattern().captures(rest)?.get(1)?.as_str();
    token.parse().ok()
}

fn parse_designator(rest: &str) -> Option<&str> {
    designator_pattern()
        .captures(rest)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Classifies one trimmed line of an active object block.
pub fn classify(line: &str) -> FieldLine<'_> {
    if let Some(rest) = line.strip_prefix(OBJECT_DESIGNATOR) {
        return FieldLine::Designator(parse_designator(rest));
    }

    if let Some((index, rest)) = STATE_VECTOR_FIELDS
        .iter()
        .enumerate()
        .find_map(|(i, key)| strip_keyword(line, key).map(|rest| (i, rest)))
    {
        return FieldLine::State {
            index,
            value: parse_value(rest),
        };
    }

    if let Some((index, rest)) = COVARIANCE_FIELDS
        .iter()
        .enumerate()
        .find_map(|(i, key)| strip_keyword(line, key).map(|rest| (i, rest)))
    {
        return FieldLine::Covariance {
            index,
            value: parse_value(rest),
        };
    }

    FieldLine::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_requires_token_boundary() {
        assert_eq!(strip_keyword("X = 1.0", "X"), Some(" = 1.0"));
        assert_eq!(strip_keyword("X=1.0", "X"), Some("=1.0"));
        assert_eq!(strip_keyword("X\t= 1.0", "X"), Some("\t= 1.0"));
        assert_eq!(strip_keyword("X_DOT = 1.0", "X"), None);
        assert_eq!(strip_keyword("X", "X"), None);
    }

    #[test]
    fn test_value_with_unit_annotation() {
        assert_eq!(parse_value(" = 7000.5 [km]"), Some(7000.5));
        assert_eq!(parse_value("= -1.25E-03 [km**2]"), Some(-1.25e-3));
        assert_eq!(parse_value("=4.5e2"), Some(450.0));
    }

    #[test]
    fn test_value_rejects_garbage() {
        assert_eq!(parse_value(" = abc"), None);
        assert_eq!(parse_value(" = --1"), None);
        assert_eq!(parse_value(" 7000.5"), None);
        assert_eq!(parse_value(" = "), None);
    }

    #[test]
    fn test_classify_state_and_covariance() {
        assert_eq!(
            classify("Z_DOT = 7.1 [km/s]"),
            FieldLine::State { index: 5, value: Some(7.1) }
        );
        assert_eq!(
            classify("CNDOT_NDOT = 1e-9"),
            FieldLine::Covariance { index: 20, value: Some(1e-9) }
        );
        assert_eq!(
            classify("CR_R = n/a"),
            FieldLine::Covariance { index: 0, value: None }
        );
    }

    #[test]
    fn test_classify_ignores_unknown_keywords() {
        assert_eq!(classify("COMMENT X = 1"), FieldLine::Other);
        assert_eq!(classify("X_DOT2 = 3.0"), FieldLine::Other);
        assert_eq!(classify("CR_R_EXTRA = 3.0"), FieldLine::Other);
        assert_eq!(classify(""), FieldLine::Other);
    }

    #[test]
    fn test_designator_takes_leading_digits() {
        assert_eq!(
            classify("OBJECT_DESIGNATOR = 25544"),
            FieldLine::Designator(Some("25544"))
        );
        assert_eq!(
            classify("OBJECT_DESIGNATOR=12345A"),
            FieldLine::Designator(Some("12345"))
        );
        assert_eq!(
            classify("OBJECT_DESIGNATOR = UNKNOWN"),
            FieldLine::Designator(None)
        );
    }

    #[test]
    fn test_field_tables_have_no_duplicates() {
        let mut all: Vec<&str> = STATE_VECTOR_FIELDS
            .iter()
            .chain(COVARIANCE_FIELDS.iter())
            .copied()
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), STATE_VECTOR_LEN + COVARIANCE_LEN);
    }
}
