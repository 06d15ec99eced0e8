use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{EocError, Result};
use crate::table::record::Record;

/// One numerical method's rows, in refinement order.
pub struct Scheme<I> {
    pub title: String,
    pub rows: I,
}

impl<I> Scheme<I> {
    pub fn new(title: impl Into<String>, rows: I) -> Self {
        Scheme {
            title: title.into(),
            rows,
        }
    }
}

/// Schemes of unequal length were cut to their common prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct LengthMismatchWarning {
    pub common: usize,
    pub lengths: Vec<(String, usize)>,
}

impl LengthMismatchWarning {
    /// Schemes that lost rows to the truncation.
    pub fn truncated(&self) -> Vec<&str> {
        self.lengths
            .iter()
            .filter(|(_, len)| *len > self.common)
            .map(|(title, _)| title.as_str())
            .collect()
    }
}

impl fmt::Display for LengthMismatchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lengths: Vec<String> = self
            .lengths
            .iter()
            .map(|(title, len)| format!("{}={}", title, len))
            .collect();
        write!(
            f,
            "scheme lengths differ ({}); merged the first {} rows, truncating {}",
            lengths.join(", "),
            self.common,
            self.truncated().join(", ")
        )
    }
}

#[derive(Debug)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
    pub warnings: Vec<LengthMismatchWarning>,
}

pub fn column_name(quantity: &str, title: &str) -> String {
    format!("{}_{}", quantity, title)
}

pub struct SchemeMerger {
    axis: String,
    quantities: Vec<String>,
}

impl SchemeMerger {
    pub fn new(axis: impl Into<String>, quantities: &[String]) -> Self {
        SchemeMerger {
            axis: axis.into(),
            quantities: quantities.to_vec(),
        }
    }

    pub fn axis(&self) -> &str {
        &self.axis
    }

    /// Axis column, then `quantity_title` for each quantity and, inside that,
    /// each title.
    pub fn columns<S: AsRef<str>>(&self, titles: &[S]) -> Result<Vec<String>> {
        if self.quantities.is_empty() {
            return Err(EocError::Config("no quantities selected for the merge".into()));
        }

        let mut seen_titles = HashSet::new();
        for title in titles {
            let title = title.as_ref();
            if !seen_titles.insert(title) {
                return Err(EocError::DuplicateColumn {
                    column: column_name(&self.quantities[0], title),
                    reason: format!("scheme title `{}` is used twice", title),
                });
            }
        }

        let mut columns = vec![self.axis.clone()];
        let mut seen: HashSet<String> = HashSet::from([self.axis.clone()]);
        for quantity in &self.quantities {
            for title in titles {
                let name = column_name(quantity, title.as_ref());
                if !seen.insert(name.clone()) {
                    return Err(EocError::DuplicateColumn {
                        reason: format!(
                            "quantity `{}` of scheme `{}` collides with another column",
                            quantity,
                            title.as_ref()
                        ),
                        column: name,
                    });
                }
                columns.push(name);
            }
        }
        Ok(columns)
    }

    fn merge_level(&self, titles: &[String], level: &[Record]) -> Result<Record> {
        let mut merged = Record::new();
        merged.insert(self.axis.clone(), level[0].require(&self.axis)?.clone());
        for quantity in &self.quantities {
            for (title, row) in titles.iter().zip(level) {
                merged.insert(column_name(quantity, title), row.require(quantity)?.clone());
            }
        }
        Ok(merged)
    }

    /// Pivots the schemes into one wide table. All schemes are read in
    /// lockstep; longer schemes are drained afterwards only to count and
    /// validate their remaining rows.
    pub fn merge<I>(&self, schemes: Vec<Scheme<I>>) -> Result<MergedTable>
    where
        I: Iterator<Item = Result<Record>>,
    {
        if schemes.is_empty() {
            return Err(EocError::Config("no schemes to merge".into()));
        }
        let titles: Vec<String> = schemes.iter().map(|s| s.title.clone()).collect();
        let columns = self.columns(&titles)?;

        let mut sources: Vec<I> = schemes.into_iter().map(|s| s.rows).collect();
        let mut lengths = vec![0usize; sources.len()];
        let mut finished = vec![false; sources.len()];
        let mut rows = Vec::new();

        loop {
            let mut level = Vec::with_capacity(sources.len());
            for (k, source) in sources.iter_mut().enumerate() {
                match source.next() {
                    Some(row) => {
                        level.push(row?);
                        lengths[k] += 1;
                    }
                    None => finished[k] = true,
                }
            }
            if finished.iter().any(|&f| f) {
                break;
            }
            rows.push(self.merge_level(&titles, &level)?);
        }

        for (k, source) in sources.iter_mut().enumerate() {
            if finished[k] {
                continue;
            }
            for row in source {
                row?;
                lengths[k] += 1;
            }
        }

        if let Some(k) = lengths.iter().position(|&len| len == 0) {
            return Err(EocError::EmptyScheme {
                title: titles[k].clone(),
            });
        }

        let mut warnings = Vec::new();
        if lengths.iter().any(|&len| len != rows.len()) {
            let warning = LengthMismatchWarning {
                common: rows.len(),
                lengths: titles.iter().cloned().zip(lengths.iter().copied()).collect(),
            };
            warn!("{}", warning);
            warnings.push(warning);
        }
        debug!(rows = rows.len(), schemes = titles.len(), "merged schemes");

        Ok(MergedTable {
            columns,
            rows,
            warnings,
        })
    }
}
