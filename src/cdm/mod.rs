//! CDM Field Extractor
//!
//! Pulls the two objects' Cartesian state vectors, RTN covariance entries and
//! catalog numbers out of a Conjunction Data Message in KVN text form.
//!
//! Parsing is tolerant by policy: missing or malformed fields degrade to
//! defaults (state slots stay `0.0`, covariance entries are omitted) and never
//! produce an error. Units are taken as-is; a trailing `[unit]` annotation is
//! discarded.
//!
//! ```text
//! OBJECT                 = OBJECT1
//! OBJECT_DESIGNATOR      = 25544
//! X                      = 2570.097065 [km]
//! ...
//! CR_R                   = 4.142E+01 [m**2]
//! OBJECT                 = OBJECT2
//! ...
//! ```

pub mod fields;
pub mod scanner;

pub use fields::{
    COVARIANCE_FIELDS, COVARIANCE_LEN, OBJECT1_MARKER, OBJECT2_MARKER, STATE_VECTOR_FIELDS,
    STATE_VECTOR_LEN,
};

use fields::FieldLine;
use scanner::{LineEvent, ScanState};

/// Cartesian state `[X, Y, Z, X_DOT, Y_DOT, Z_DOT]`.
pub type StateVector = [f64; STATE_VECTOR_LEN];

/// One object's data as extracted from its block.
#[derive(Debug, Clone, Default)]
pub struct CdmObject {
    /// Catalog number from `OBJECT_DESIGNATOR`, empty when absent.
    pub designator: String,
    pub state_vector: StateVector,
    /// Covariance entries found, in document order. A repeated keyword appends
    /// again, so the length is not bounded by the 21 canonical entries.
    pub covariance: Vec<f64>,
    found: [bool; STATE_VECTOR_LEN],
}

impl CdmObject {
    /// Builds an object whose state slots are all considered present.
    pub fn new(designator: impl Into<String>, state_vector: StateVector, covariance: Vec<f64>) -> Self {
        Self {
            designator: designator.into(),
            state_vector,
            covariance,
            found: [true; STATE_VECTOR_LEN],
        }
    }

    /// State keywords that were absent (or unparseable) and defaulted to `0.0`.
    pub fn missing_state_fields(&self) -> Vec<&'static str> {
        STATE_VECTOR_FIELDS
            .iter()
            .zip(self.found)
            .filter(|(_, found)| !found)
            .map(|(name, _)| *name)
            .collect()
    }

    /// How many canonical covariance entries the block did not supply.
    pub fn missing_covariance(&self) -> usize {
        COVARIANCE_LEN.saturating_sub(self.covariance.len())
    }

    pub fn is_complete(&self) -> bool {
        self.missing_state_fields().is_empty() && self.missing_covariance() == 0
    }
}

// Equality covers the values that reach the queue, not parse provenance.
impl PartialEq for CdmObject {
    fn eq(&self, other: &Self) -> bool {
        self.designator == other.designator
            && self.state_vector == other.state_vector
            && self.covariance == other.covariance
    }
}

/// Both objects of a conjunction, in positional order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conjunction {
    pub object1: CdmObject,
    pub object2: CdmObject,
}

impl Conjunction {
    /// Extracts `OBJECT1` and `OBJECT2` from raw CDM text.
    pub fn from_cdm(text: &str) -> Self {
        let lines = split_lines(text);
        Self {
            object1: extract_object_block(&lines, OBJECT1_MARKER),
            object2: extract_object_block(&lines, OBJECT2_MARKER),
        }
    }
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Splits `text` into lines on every line boundary a CDM producer may emit:
/// `\n`, `\r\n`, a lone `\r`, the vertical tab and form feed, the ASCII
/// file/group/record separators, NEL and the Unicode line and paragraph
/// separators. A trailing boundary does not produce an empty last line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..i]);
        start = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                chars.next();
                start = j + 1;
            }
        }
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Extracts the block opened by `marker` from `lines`.
///
/// A marker that never appears yields an all-zero state vector, no
/// covariance and an empty designator.
pub fn extract_object_block(lines: &[&str], marker: &str) -> CdmObject {
    let mut object = CdmObject::default();
    let mut state = ScanState::Inactive;

    for line in lines {
        let (next, event) = scanner::step(state, line, marker);
        state = next;

        match event {
            LineEvent::Skip | LineEvent::Enter => {}
            LineEvent::Leave => break,
            LineEvent::Field(field) => apply(&mut object, field, line),
        }
    }

    object
}

fn apply(object: &mut CdmObject, field: FieldLine<'_>, raw: &str) {
    match field {
        FieldLine::Designator(Some(id)) => object.designator = id.to_string(),
        FieldLine::State {
            index,
            value: Some(v),
        } => {
            object.state_vector[index] = v;
            object.found[index] = true;
        }
        FieldLine::Covariance { value: Some(v), .. } => object.covariance.push(v),
        FieldLine::Designator(None)
        | FieldLine::State { value: None, .. }
        | FieldLine::Covariance { value: None, .. } => {
            tracing::debug!(line = raw.trim(), "Skipping CDM field with unparseable value");
        }
        FieldLine::Other => {}
    }
}
