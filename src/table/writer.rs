use csv::WriterBuilder;
use std::io::Write;

use crate::error::{EocError, Result};
use crate::table::record::{Record, Sentinel};

/// Writes records in a fixed column order, header line first.
pub struct TableWriter {
    columns: Vec<String>,
    delimiter: u8,
    sentinel: Sentinel,
}

impl TableWriter {
    pub fn new(columns: Vec<String>, delimiter: u8) -> Self {
        TableWriter {
            columns,
            delimiter,
            sentinel: Sentinel::default(),
        }
    }

    pub fn with_sentinel(mut self, sentinel: Sentinel) -> Self {
        self.sentinel = sentinel;
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Streams `records` into `out` and returns the number of data rows.
    /// Stops at the first failed or incomplete record.
    pub fn write<W, I>(&self, out: W, records: I) -> Result<usize>
    where
        W: Write,
        I: IntoIterator<Item = Result<Record>>,
    {
        let mut wtr = WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(out);
        wtr.write_record(&self.columns)?;

        let mut count = 0;
        for record in records {
            let record = record?;
            let mut line = Vec::with_capacity(self.columns.len());
            for column in &self.columns {
                let value = record
                    .get(column)
                    .ok_or_else(|| EocError::IncompleteRecord {
                        column: column.clone(),
                        context: match record.origin() {
                            Some(origin) => format!("output row {} (from {})", count + 1, origin),
                            None => format!("output row {}", count + 1),
                        },
                    })?;
                line.push(value.render(self.sentinel));
            }
            wtr.write_record(line.iter().map(|s| s.as_bytes()))?;
            count += 1;
        }
        wtr.flush()?;
        Ok(count)
    }

    pub fn write_records<W: Write>(&self, out: W, records: &[Record]) -> Result<usize> {
        self.write(out, records.iter().cloned().map(Ok))
    }
}
