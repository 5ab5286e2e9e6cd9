//! Tab-delimited MagIC table I/O.
//!
//! A table file starts with a `tab\t<table type>` marker line, optionally
//! followed by `* key\tvalue` lines holding columns that are constant for
//! every row, then a header line and one tab-joined line per row.

use crate::error::{MagicError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// One table row: column name to value, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing any earlier value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Builder form of [`Row::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An in-memory MagIC table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MagicTable {
    pub table_type: String,
    /// Union of row keys in first-seen order
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Columns written once as `* key\tvalue` lines
    pub constants: Vec<(String, String)>,
}

impl MagicTable {
    pub fn new(table_type: impl Into<String>) -> Self {
        Self {
            table_type: table_type.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, row: Row) {
        for key in row.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.to_string());
            }
        }
        self.rows.push(row);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = Row>) {
        for row in rows {
            self.push(row);
        }
    }

    pub fn set_constant(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.constants.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.constants.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, empty where a row lacks it
    pub fn column(&self, name: &str) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.get(name).unwrap_or(""))
            .collect()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "tab\t{}", self.table_type)?;
        for (key, value) in &self.constants {
            writeln!(writer, "* {}\t{}", key, value)?;
        }
        writeln!(writer, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let values: Vec<&str> = self
                .columns
                .iter()
                .map(|column| row.get(column).unwrap_or(""))
                .collect();
            writeln!(writer, "{}", values.join("\t"))?;
        }
        Ok(())
    }

    /// Parse a table; constant header lines become columns of every row
    pub fn read_from<R: BufRead>(reader: R, source: &str) -> Result<Self> {
        let invalid = |reason: &str| MagicError::InvalidTable {
            path: source.into(),
            reason: reason.to_string(),
        };

        let mut lines = reader.lines();
        let marker = lines.next().ok_or_else(|| invalid("empty file"))??;
        let table_type = marker
            .strip_prefix("tab")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| invalid("missing tab marker line"))?;

        let mut table = MagicTable::new(table_type);
        let mut constants = Vec::new();
        let header = loop {
            let line = lines.next().ok_or_else(|| invalid("missing header line"))??;
            match line.strip_prefix('*') {
                Some(constant) => {
                    let (key, value) = constant
                        .trim_start()
                        .split_once('\t')
                        .ok_or_else(|| invalid("constant line without a value"))?;
                    constants.push((key.trim().to_string(), value.trim_end().to_string()));
                }
                None => break line,
            }
        };
        let columns: Vec<String> = header
            .trim_end_matches(['\r', '\n'])
            .split('\t')
            .map(|c| c.trim().to_string())
            .collect();

        for line in lines {
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }
            let mut row = Row::new();
            for (key, value) in &constants {
                row.set(key.as_str(), value.as_str());
            }
            let mut values = line.split('\t');
            for column in &columns {
                row.set(column.as_str(), values.next().unwrap_or("").trim());
            }
            table.push(row);
        }

        if table.columns.is_empty() {
            for (key, _) in &constants {
                table.columns.push(key.clone());
            }
            table.columns.extend(columns);
        }
        debug!("{}: read {} {} rows", source, table.len(), table.table_type);
        Ok(table)
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        debug!("Wrote {} {} rows to {}", self.len(), self.table_type, path.display());
        Ok(())
    }

    pub fn read_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MagicError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        Self::read_from(BufReader::new(file), &path.display().to_string())
    }
}
