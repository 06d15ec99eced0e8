use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{EocError, Result};
use crate::plot::Palette;
use crate::table::{header_columns, Sentinel, TableReader};

/// Axis and quantities a command falls back to when neither the config file
/// nor the command line names them.
pub struct Preset {
    pub axis: &'static str,
    pub quantities: &'static [&'static str],
}

pub const MERGE_PRESET: Preset = Preset {
    axis: "refine",
    quantities: &[
        "L2t_velocity",
        "L2t_pressure",
        "L2t_h1_velocity",
        "maxV",
        "maxP",
    ],
};

pub const EOC_PRESET: Preset = Preset {
    axis: "grid_width",
    quantities: &["L2_0", "L2_1"],
};

/// Contents of a `--config` TOML file. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub quantities: Vec<String>,
    pub columns: Option<Vec<String>>,
    pub columns_from_header: bool,
    pub axis: Option<String>,
    pub sentinel: Sentinel,
    pub has_header_row: bool,
    pub delimiter: char,
    pub allow_invalid: bool,
    pub palette: Palette,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            quantities: Vec::new(),
            columns: None,
            columns_from_header: false,
            axis: None,
            sentinel: Sentinel::None,
            has_header_row: false,
            delimiter: '\t',
            allow_invalid: false,
            palette: Palette::default(),
        }
    }
}

impl RunConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EocError::SourceNotFound {
                path: path.to_path_buf(),
            },
            _ => EocError::Io(e),
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Fills the gaps from `preset` and checks everything a run depends on.
    pub fn resolve(self, preset: &Preset) -> Result<Settings> {
        if !self.delimiter.is_ascii() {
            return Err(EocError::Config(format!(
                "delimiter `{}` is not a single-byte character",
                self.delimiter
            )));
        }
        self.palette.validate()?;

        let quantities = if self.quantities.is_empty() {
            preset.quantities.iter().map(|q| q.to_string()).collect()
        } else {
            self.quantities
        };
        Ok(Settings {
            axis: self.axis.unwrap_or_else(|| preset.axis.to_string()),
            quantities,
            columns: self.columns,
            columns_from_header: self.columns_from_header,
            delimiter: self.delimiter as u8,
            sentinel: self.sentinel,
            has_header_row: self.has_header_row || self.columns_from_header,
            allow_invalid: self.allow_invalid,
            palette: self.palette,
        })
    }
}

/// Fully resolved options for one command.
#[derive(Debug, Clone)]
pub struct Settings {
    pub axis: String,
    pub quantities: Vec<String>,
    pub columns: Option<Vec<String>>,
    pub columns_from_header: bool,
    pub delimiter: u8,
    pub sentinel: Sentinel,
    pub has_header_row: bool,
    pub allow_invalid: bool,
    pub palette: Palette,
}

impl Settings {
    /// Declared columns for `path`: explicit list, the file's own header when
    /// asked for, or the axis followed by the quantities.
    pub fn schema_for(&self, path: &Path) -> Result<Vec<String>> {
        if self.columns_from_header {
            return header_columns(path, self.delimiter);
        }
        Ok(match &self.columns {
            Some(columns) => columns.clone(),
            None => std::iter::once(self.axis.clone())
                .chain(self.quantities.iter().cloned())
                .collect(),
        })
    }

    pub fn require_columns(&self, path: &Path, schema: &[String], needed: &[&str]) -> Result<()> {
        let missing: Vec<&str> = needed
            .iter()
            .copied()
            .filter(|c| !schema.iter().any(|s| s == c))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EocError::Config(format!(
                "{}: column(s) {} not in the declared schema [{}]",
                path.display(),
                missing.join(", "),
                schema.join(", ")
            )))
        }
    }

    /// Opens `path` with its schema, checks that the axis and every quantity
    /// are declared, and skips the header row when there is one.
    pub fn open(&self, path: &Path) -> Result<TableReader> {
        let schema = self.schema_for(path)?;
        let mut needed: Vec<&str> = vec![self.axis.as_str()];
        needed.extend(self.quantities.iter().map(String::as_str));
        self.require_columns(path, &schema, &needed)?;

        let mut reader = TableReader::open(path, self.delimiter, &schema)?;
        if self.has_header_row {
            reader.skip_header()?;
        }
        Ok(reader)
    }
}
