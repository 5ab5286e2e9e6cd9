//! Repeat-measurement collapsing.
//!
//! Instruments sometimes fire twice on the same step. Two adjacent records
//! that agree on every classification field are treated as one measurement
//! and only the later record is kept.

use crate::models::RawRecord;
use tracing::warn;

/// Drop every record immediately followed by an identical step
pub fn collapse_repeats(specimen: &str, records: Vec<RawRecord>) -> Vec<RawRecord> {
    let total = records.len();
    let mut kept = Vec::with_capacity(total);
    let mut records = records.into_iter().enumerate().peekable();

    while let Some((index, record)) = records.next() {
        let repeated = records
            .peek()
            .is_some_and(|(_, next)| next.repeat_key() == record.repeat_key());
        if repeated {
            warn!(
                "specimen {}: measurement {} (line {}) is repeated, keeping the later one",
                specimen, index, record.line
            );
            continue;
        }
        kept.push(record);
    }

    kept
}
