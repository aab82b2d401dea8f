//! Job input encoding.
//!
//! Six newline-separated lines, no trailing newline:
//!
//! ```text
//! <object1 designator>
//! <X Y Z X_DOT Y_DOT Z_DOT>
//! <covariance entries, 0..=21 of them>
//! <object2 designator>
//! <X Y Z X_DOT Y_DOT Z_DOT>
//! <covariance entries>
//! ```
//!
//! Numbers use Rust's shortest round-trip representation (`0.0`, `7000.5`,
//! `1e-7`), which the worker's whitespace-token reader accepts.

use crate::cdm::{CdmObject, Conjunction, StateVector, STATE_VECTOR_LEN};
use thiserror::Error;

/// Number of lines in an encoded job input.
pub const JOB_INPUT_LINES: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("line {line}: invalid number {token:?}")]
    InvalidNumber { line: usize, token: String },

    #[error("line {line}: state vector needs {STATE_VECTOR_LEN} numbers, found {found}")]
    StateVectorLength { line: usize, found: usize },
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:?}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_object(out: &mut Vec<String>, object: &CdmObject) {
    out.push(object.designator.clone());
    out.push(join(&object.state_vector));
    out.push(join(&object.covariance));
}

/// Encodes both objects for the worker.
pub fn encode(conjunction: &Conjunction) -> String {
    let mut lines = Vec::with_capacity(JOB_INPUT_LINES);
    push_object(&mut lines, &conjunction.object1);
    push_object(&mut lines, &conjunction.object2);
    lines.join("\n")
}

fn parse_numbers(line: &str, line_no: usize) -> Result<Vec<f64>, EncodingError> {
    line.split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| EncodingError::InvalidNumber {
                line: line_no,
                token: token.to_string(),
            })
        })
        .collect()
}

fn parse_object<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    first_line: usize,
) -> Result<CdmObject, EncodingError> {
    let designator = lines.next().unwrap_or("").trim();

    let state_line = first_line + 1;
    let values = parse_numbers(lines.next().unwrap_or(""), state_line)?;
    let state_vector: StateVector =
        values
            .as_slice()
            .try_into()
            .map_err(|_| EncodingError::StateVectorLength {
                line: state_line,
                found: values.len(),
            })?;

    let covariance = parse_numbers(lines.next().unwrap_or(""), first_line + 2)?;

    Ok(CdmObject::new(designator, state_vector, covariance))
}

/// Reads an encoded job input back, the way the worker does. Missing
/// trailing lines read as empty. Line numbers in errors are 1-based.
pub fn decode(text: &str) -> Result<Conjunction, EncodingError> {
    let mut lines = text.lines();
    let object1 = parse_object(&mut lines, 1)?;
    let object2 = parse_object(&mut lines, 4)?;
    Ok(Conjunction { object1, object2 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Conjunction {
        Conjunction {
            object1: CdmObject::new(
                "25544",
                [7000.5, 0.0, -12.25, 7.5, 0.0, 1e-7],
                vec![0.0012, 41.42],
            ),
            object2: CdmObject::new("", [0.0; 6], Vec::new()),
        }
    }

    #[test]
    fn test_encode_layout() {
        let text = encode(&sample());
        assert_eq!(
            text,
            "25544\n7000.5 0.0 -12.25 7.5 0.0 1e-7\n0.0012 41.42\n\n0.0 0.0 0.0 0.0 0.0 0.0\n"
        );
        assert_eq!(text.split('\n').count(), JOB_INPUT_LINES);
        assert!(!text.ends_with("\n\n"));
    }

    #[test]
    fn test_decode_reads_encoder_output() {
        let original = sample();
        assert_eq!(decode(&encode(&original)).unwrap(), original);
    }

    #[test]
    fn test_decode_tolerates_extra_whitespace() {
        let text = "1\n 1  2\t3 4 5 6 \n\n2\n6 5 4 3 2 1\n9.5";
        let c = decode(text).unwrap();
        assert_eq!(c.object1.state_vector, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(c.object1.covariance.is_empty());
        assert_eq!(c.object2.covariance, vec![9.5]);
    }

    #[test]
    fn test_decode_rejects_bad_token() {
        let text = "1\n1 2 3 4 5 6\n0.1 x\n2\n1 2 3 4 5 6\n";
        assert_eq!(
            decode(text),
            Err(EncodingError::InvalidNumber { line: 3, token: "x".to_string() })
        );
    }

    #[test]
    fn test_decode_rejects_short_state_vector() {
        let text = "1\n1 2 3 4 5 6\n\n2\n1 2 3\n";
        assert_eq!(
            decode(text),
            Err(EncodingError::StateVectorLength { line: 5, found: 3 })
        );
    }
}
