use csv::{ReaderBuilder, StringRecordsIntoIter, Trim};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{EocError, Location, Result};
use crate::table::record::Record;

/// Lazy record stream over one delimited file with a caller-declared schema.
///
/// The first physical row is data unless [`TableReader::skip_header`] is
/// called before iterating.
pub struct TableReader {
    path: PathBuf,
    columns: Vec<String>,
    records: StringRecordsIntoIter<File>,
    rows_read: usize,
}

fn open_source(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => EocError::SourceNotFound {
            path: path.to_path_buf(),
        },
        _ => EocError::Io(e),
    })
}

fn builder(delimiter: u8) -> ReaderBuilder {
    let mut b = ReaderBuilder::new();
    b.delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All);
    b
}

impl TableReader {
    pub fn open<P: AsRef<Path>>(path: P, delimiter: u8, columns: &[String]) -> Result<Self> {
        let path = path.as_ref();
        let file = open_source(path)?;
        let records = builder(delimiter).from_reader(file).into_records();
        Ok(TableReader {
            path: path.to_path_buf(),
            columns: columns.to_vec(),
            records,
            rows_read: 0,
        })
    }

    /// Drops the next physical row without checking its field count.
    pub fn skip_header(&mut self) -> Result<()> {
        if let Some(row) = self.records.next() {
            row?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows yielded so far.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }
}

impl Iterator for TableReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.records.next()? {
            Ok(raw) => raw,
            Err(e) => return Some(Err(e.into())),
        };
        let row = raw
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(self.rows_read + 1);

        if raw.len() != self.columns.len() {
            return Some(Err(EocError::MalformedRow {
                path: self.path.clone(),
                row,
                expected: self.columns.len(),
                found: raw.len(),
            }));
        }

        self.rows_read += 1;
        let record = Record::from_pairs(self.columns.iter().cloned().zip(raw.iter()))
            .located(Location {
                path: self.path.clone(),
                row,
            });
        Some(Ok(record))
    }
}

/// Reads row 0 of `path` and returns it as a column schema. Only for callers
/// that explicitly choose to trust the file's own header.
pub fn header_columns<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Vec<String>> {
    let path = path.as_ref();
    let file = open_source(path)?;
    let mut records = builder(delimiter).from_reader(file).into_records();
    match records.next() {
        Some(header) => Ok(header?.iter().map(str::to_string).collect()),
        None => Err(EocError::Config(format!(
            "{}: file is empty, no header to read",
            path.display()
        ))),
    }
}
