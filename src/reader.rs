//! Livdb file reading.
//!
//! A Livdb file is a sequence of specimen blocks. Each block opens with a
//! comma-separated header line (19 fields), continues with measurement
//! lines (22 fields) and closes with an `END` line.
//!
//! Malformed measurement lines degrade to what was read so far: the rest
//! of the block is skipped with a warning and reading resumes at the next
//! block. A header line met inside a block closes that block, so a missing
//! `END` costs no sibling specimen.

use crate::constants::{
    LIVDB_BODY_CODES, LIVDB_BODY_FIELDS, LIVDB_END_MARKER, LIVDB_HEADER_CODES,
    LIVDB_HEADER_FIELDS, LIVDB_MIN_HEADER_FIELDS,
};
use crate::error::{MagicError, Result};
use crate::models::{RawRecord, SpecimenBlock, SpecimenHeader};
use crate::protocol::ProtocolTable;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

/// Lazy reader yielding one specimen block at a time
pub struct LivdbReader<R> {
    reader: R,
    line_number: usize,
    source: String,
    /// Line read ahead of its block, returned by the next `next_line`
    pending: Option<(usize, String)>,
}

impl<R: BufRead> LivdbReader<R> {
    /// Create a reader; `source` names the input in log messages
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        Self {
            reader,
            line_number: 0,
            source: source.into(),
            pending: None,
        }
    }

    fn next_line(&mut self) -> Option<Result<(usize, String)>> {
        if let Some(pending) = self.pending.take() {
            return Some(Ok(pending));
        }
        let mut buffer = Vec::new();
        match self.reader.read_until(b'\n', &mut buffer) {
            Ok(0) => None,
            Ok(_) => {
                self.line_number += 1;
                let line = String::from_utf8_lossy(&buffer)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                Some(Ok((self.line_number, line)))
            }
            Err(e) => Some(Err(MagicError::Io(e))),
        }
    }

    /// Discard lines up to and including the next end marker
    fn skip_to_end(&mut self) -> Result<()> {
        while let Some(next) = self.next_line() {
            let (_, line) = next?;
            if is_end_marker(&line) {
                break;
            }
        }
        Ok(())
    }

    fn read_block(&mut self, header: SpecimenHeader, header_line: usize) -> Result<SpecimenBlock> {
        let mut block = SpecimenBlock {
            header,
            records: Vec::new(),
            line: header_line,
        };

        while let Some(next) = self.next_line() {
            let (line_number, line) = next?;
            if is_end_marker(&line) {
                return Ok(block);
            }
            match parse_body_line(&line, line_number, block.specimen()) {
                Ok(record) => block.records.push(record),
                Err(MagicError::MalformedRecord { .. }) if is_blank_record(&line) => {
                    debug!("{}: skipping blank line {}", self.source, line_number);
                }
                Err(_) if is_header_line(&line) => {
                    warn!(
                        "{}: specimen {} has no {} marker before the header at line {}",
                        self.source,
                        block.specimen(),
                        LIVDB_END_MARKER,
                        line_number
                    );
                    self.pending = Some((line_number, line));
                    return Ok(block);
                }
                Err(e) => {
                    let missing = match &e {
                        MagicError::MalformedRecord { found, .. } => {
                            missing_fields(&LIVDB_BODY_CODES, *found)
                        }
                        _ => String::new(),
                    };
                    warn!(
                        "{}: specimen {}: {} (missing {}); keeping the {} measurements read so far",
                        self.source,
                        block.specimen(),
                        e,
                        missing,
                        block.records.len()
                    );
                    self.skip_to_end()?;
                    return Ok(block);
                }
            }
        }

        warn!(
            "{}: specimen {} has no {} marker before end of file",
            self.source,
            block.specimen(),
            LIVDB_END_MARKER
        );
        Ok(block)
    }
}

impl<R: BufRead> Iterator for LivdbReader<R> {
    type Item = Result<SpecimenBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (line_number, line) = match self.next_line()? {
                Ok(next) => next,
                Err(e) => return Some(Err(e)),
            };

            if line.trim().is_empty() || is_blank_record(&line) {
                continue;
            }
            if is_end_marker(&line) {
                warn!(
                    "{}: stray {} marker at line {}",
                    self.source, LIVDB_END_MARKER, line_number
                );
                continue;
            }

            match parse_header_line(&line, line_number) {
                Ok(header) => return Some(self.read_block(header, line_number)),
                Err(e) => {
                    warn!("{}: {}; skipping block", self.source, e);
                    if let Err(e) = self.skip_to_end() {
                        return Some(Err(e));
                    }
                }
            }
        }
    }
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(',').collect()
}

/// First field is the end marker
pub fn is_end_marker(line: &str) -> bool {
    line.split(',')
        .next()
        .is_some_and(|first| first.trim() == LIVDB_END_MARKER)
}

/// Every field of the line is empty
pub fn is_blank_record(line: &str) -> bool {
    line.split(',').all(|field| field.trim().is_empty())
}

/// Line has header width and names a known experiment type
pub fn is_header_line(line: &str) -> bool {
    let fields = split_fields(line);
    (LIVDB_MIN_HEADER_FIELDS..LIVDB_BODY_FIELDS).contains(&fields.len())
        && ProtocolTable::is_supported(fields[10].trim())
}

fn missing_fields(codes: &[&str], found: usize) -> String {
    codes.get(found..).unwrap_or_default().join(", ")
}

/// Parse a block header line.
///
/// Headers with fewer than 19 fields are padded with empty values as long
/// as the experiment type is present.
pub fn parse_header_line(line: &str, line_number: usize) -> Result<SpecimenHeader> {
    let mut fields = split_fields(line);
    if fields.len() < LIVDB_MIN_HEADER_FIELDS {
        return Err(MagicError::MalformedRecord {
            line: line_number,
            expected: LIVDB_HEADER_FIELDS,
            found: fields.len(),
        });
    }
    if fields.len() < LIVDB_HEADER_FIELDS {
        warn!(
            "Missing data in header at line {}: {} of {} fields (missing {})",
            line_number,
            fields.len(),
            LIVDB_HEADER_FIELDS,
            missing_fields(&LIVDB_HEADER_CODES, fields.len())
        );
        fields.resize(LIVDB_HEADER_FIELDS, "");
    }

    let field = |index: usize| fields[index].trim().to_string();
    Ok(SpecimenHeader {
        sample_code: field(0),
        sample_dip: field(1),
        sample_dec: field(2),
        height: field(3),
        position: field(4),
        thickness: field(5),
        unit_dip: field(6),
        unit_dip_direction: field(7),
        site_latitude: field(8),
        site_longitude: field(9),
        experiment_type: field(10),
        measurer: field(11),
        magnetometer: field(12),
        demagnetiser: field(13),
        comment: field(14),
        database_version: field(15),
        conversion_version: field(16),
        sample_volume: field(17),
        sample_density: field(18),
    })
}

/// Parse one measurement line of a block
pub fn parse_body_line(line: &str, line_number: usize, specimen: &str) -> Result<RawRecord> {
    let fields = split_fields(line);
    if fields.len() < LIVDB_BODY_FIELDS {
        return Err(MagicError::MalformedRecord {
            line: line_number,
            expected: LIVDB_BODY_FIELDS,
            found: fields.len(),
        });
    }
    if fields.len() > LIVDB_BODY_FIELDS {
        debug!(
            "Ignoring {} extra fields at line {}",
            fields.len() - LIVDB_BODY_FIELDS,
            line_number
        );
    }

    let field = |index: usize| fields[index].trim().to_string();
    Ok(RawRecord {
        specimen: specimen.to_string(),
        treatment: field(0),
        microwave_power: field(1),
        microwave_time: field(2),
        moment_x: field(3),
        moment_y: field(4),
        moment_z: field(5),
        mass: field(6),
        field_intensity: field(7),
        field_dec: field(8),
        field_inc: field(9),
        date: field(10),
        time: field(11),
        remark: field(12),
        step_number: field(13),
        step_type: field(14),
        tristan_gain: field(15),
        microwave_integral: field(16),
        jr6_error: field(17),
        fit_smm: field(18),
        utrecht_error: field(19),
        af_peak_field: field(20),
        th_peak_temperature: field(21),
        line: line_number,
    })
}

/// Read every block of a Livdb file, sorted by specimen then experiment type.
///
/// A specimen/experiment pair appearing twice keeps the later block.
pub fn read_livdb_file(path: &Path) -> Result<Vec<SpecimenBlock>> {
    if !path.exists() {
        return Err(MagicError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path)?;
    read_livdb(BufReader::new(file), &path.display().to_string())
}

/// Read every block from an open handle
pub fn read_livdb<R: BufRead>(reader: R, source: &str) -> Result<Vec<SpecimenBlock>> {
    let mut blocks: BTreeMap<(String, String), SpecimenBlock> = BTreeMap::new();

    for block in LivdbReader::new(reader, source) {
        let block = block?;
        let key = (
            block.specimen().to_string(),
            block.experiment_type().to_string(),
        );
        if blocks.contains_key(&key) {
            warn!(
                "{}: specimen {} has duplicate experiment type {}; keeping the block at line {}",
                source, key.0, key.1, block.line
            );
        }
        blocks.insert(key, block);
    }

    debug!("{}: read {} specimen blocks", source, blocks.len());
    Ok(blocks.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn header(specimen: &str, experiment: &str) -> String {
        format!(
            "{},10,20,1.5,1,0.1,0,0,32.1,35.2,{},rs,2G,oven,test,1,1.0,10,2700",
            specimen, experiment
        )
    }

    fn body(treatment: &str, field: &str, step_type: &str) -> String {
        format!(
            "0,0,0,1.0,2.0,3.0,1,{},0,90,11-05-2013,14:00:00,,1,{},1,0,0,0,0,0,{}",
            field, step_type, treatment
        )
    }

    #[test]
    fn test_reads_blocks_in_order() {
        let text = [
            header("s1", "TH-PI-IZZI+"),
            body("0", "0", "NRM"),
            body("100", "40", "I"),
            "END".to_string(),
            header("s2", "TH-D"),
            body("0", "0", "NRM"),
            "END".to_string(),
        ]
        .join("\n");

        let blocks: Vec<_> = LivdbReader::new(Cursor::new(text), "test")
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].specimen(), "s1");
        assert_eq!(blocks[0].experiment_type(), "TH-PI-IZZI+");
        assert_eq!(blocks[0].records.len(), 2);
        assert_eq!(blocks[0].records[1].th_peak_temperature, "100");
        assert_eq!(blocks[0].records[1].field_intensity, "40");
        assert_eq!(blocks[0].records[1].line, 3);
        assert_eq!(blocks[1].records[0].specimen, "s2");
    }

    #[test]
    fn test_blank_record_is_skipped() {
        let text = [
            header("s1", "TH-D"),
            body("0", "0", "NRM"),
            ",,,,".to_string(),
            body("100", "0", "Z"),
            "END".to_string(),
        ]
        .join("\n");

        let blocks = read_livdb(Cursor::new(text), "test").unwrap();
        assert_eq!(blocks[0].records.len(), 2);
    }

    #[test]
    fn test_short_record_truncates_block() {
        let text = [
            header("s1", "TH-D"),
            body("0", "0", "NRM"),
            "1,2,3".to_string(),
            body("100", "0", "Z"),
            "END".to_string(),
            header("s2", "TH-D"),
            body("0", "0", "NRM"),
            "END".to_string(),
        ]
        .join("\n");

        let blocks = read_livdb(Cursor::new(text), "test").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].records.len(), 1);
        assert_eq!(blocks[1].specimen(), "s2");
        assert_eq!(blocks[1].records.len(), 1);
    }

    #[test]
    fn test_header_without_end_starts_new_block() {
        let text = [
            header("s1", "TH-D"),
            body("0", "0", "NRM"),
            header("s2", "TH-D"),
            body("0", "0", "NRM"),
            body("100", "0", "Z"),
            "END".to_string(),
        ]
        .join("\n");

        let blocks = read_livdb(Cursor::new(text), "test").unwrap();
        let summary: Vec<_> = blocks
            .iter()
            .map(|block| (block.specimen(), block.records.len(), block.line))
            .collect();
        assert_eq!(summary, vec![("s1", 1, 1), ("s2", 2, 3)]);
    }

    #[test]
    fn test_is_header_line() {
        assert!(is_header_line(&header("s1", "TH-PI-IZZI+")));
        assert!(!is_header_line(&header("s1", "NOT-A-TYPE")));
        assert!(!is_header_line(&body("100", "40", "I")));
        assert!(!is_header_line("1,2,3"));
        assert_eq!(missing_fields(&LIVDB_BODY_CODES, 20), "AF Demag/Remag Peak Field, TH Demag/Remag Peak Temperature");
        assert_eq!(missing_fields(&LIVDB_HEADER_CODES, 19), "");
    }

    #[test]
    fn test_parse_body_line_rejects_short_lines() {
        let result = parse_body_line("1,2,3", 7, "s1");
        match result.unwrap_err() {
            MagicError::MalformedRecord {
                line,
                expected,
                found,
            } => {
                assert_eq!(line, 7);
                assert_eq!(expected, LIVDB_BODY_FIELDS);
                assert_eq!(found, 3);
            }
            other => panic!("Expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_short_header_is_padded() {
        let line = "s1,10,20,1.5,1,0.1,0,0,32.1,35.2,TH-D,rs";
        let header = parse_header_line(line, 1).unwrap();
        assert_eq!(header.experiment_type, "TH-D");
        assert_eq!(header.measurer, "rs");
        assert_eq!(header.sample_density, "");

        assert!(parse_header_line("s1,10,20", 1).is_err());
    }

    #[test]
    fn test_duplicate_experiment_keeps_later_block() {
        let text = [
            header("s1", "TH-D"),
            body("0", "0", "NRM"),
            "END".to_string(),
            header("s1", "TH-D"),
            body("0", "0", "NRM"),
            body("100", "0", "Z"),
            "END".to_string(),
        ]
        .join("\n");

        let blocks = read_livdb(Cursor::new(text), "test").unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].records.len(), 2);
    }

    #[test]
    fn test_end_marker_detection() {
        assert!(is_end_marker("END"));
        assert!(is_end_marker(" END ,,,"));
        assert!(!is_end_marker("s1,END of comment"));
    }

    #[test]
    fn test_read_livdb_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "{}", header("b2", "AF-D")).unwrap();
        writeln!(temp_file, "{}", body("0", "0", "NRM")).unwrap();
        writeln!(temp_file, "END").unwrap();
        writeln!(temp_file, "{}", header("a1", "AF-D")).unwrap();
        writeln!(temp_file, "{}", body("0", "0", "NRM")).unwrap();
        writeln!(temp_file, "END").unwrap();

        let blocks = read_livdb_file(temp_file.path()).unwrap();
        assert_eq!(blocks[0].specimen(), "a1");
        assert_eq!(blocks[1].specimen(), "b2");

        let missing = read_livdb_file(Path::new("/nonexistent/file.livdb"));
        assert!(matches!(missing, Err(MagicError::InputNotFound { .. })));
    }
}
