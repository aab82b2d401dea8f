//! Object block scanner.
//!
//! Two states: `Inactive` until the requested header line is seen, then
//! `Active` until a header for a different object appears. Each line is one
//! transition; the scan stops at [`LineEvent::Leave`].

use super::fields::{self, FieldLine, OBJECT_MARKER_PREFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Inactive,
    Active,
}

/// Outcome of feeding one line to the scanner.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent<'a> {
    /// Outside the requested block.
    Skip,
    /// The requested header line; consumed without field extraction.
    Enter,
    /// A line inside the block.
    Field(FieldLine<'a>),
    /// Another object's header. The block is over.
    Leave,
}

/// Pure transition function for one raw line.
pub fn step<'a>(state: ScanState, line: &'a str, marker: &str) -> (ScanState, LineEvent<'a>) {
    let line = line.trim();

    if line.starts_with(marker) {
        return (ScanState::Active, LineEvent::Enter);
    }

    match state {
        ScanState::Inactive => (ScanState::Inactive, LineEvent::Skip),
        ScanState::Active if line.starts_with(OBJECT_MARKER_PREFIX) => {
            (ScanState::Inactive, LineEvent::Leave)
        }
        ScanState::Active => (ScanState::Active, LineEvent::Field(fields::classify(line))),
    }
}
