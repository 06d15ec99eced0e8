use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::RunConfig;
use crate::error::{EocError, Result};
use crate::plot::PlotFormat;
use crate::table::Sentinel;

/// Convergence tables for refinement studies: per-step EOC columns and
/// side-by-side comparison of several schemes.
#[derive(Parser, Debug)]
#[command(name = "eoc_merge", version)]
pub struct Args {
    /// TOML file with table and palette settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// -v for debug output, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command; each one overrides the config file.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct TableOptions {
    /// Monitored quantities, comma separated
    #[arg(long, value_delimiter = ',')]
    pub quantities: Vec<String>,

    /// Column names of the input files, comma separated
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Use each input's first row as its column names
    #[arg(long)]
    pub columns_from_header: bool,

    /// Refinement axis column
    #[arg(long, visible_alias = "runtype")]
    pub axis: Option<String>,

    /// Field delimiter: a single character, or `tab`
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<char>,

    /// Literal written for undefined rates (none or nan)
    #[arg(long)]
    pub sentinel: Option<Sentinel>,

    /// Skip the first row of every input as a header
    #[arg(long)]
    pub header: bool,

    /// Leave rates of invalid measurements undefined instead of failing
    #[arg(long)]
    pub allow_invalid: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge per-scheme tables into one comparison table and plot file
    Merge {
        /// Scheme files followed by one title per file
        #[arg(required = true, num_args = 2.., value_name = "INPUTS")]
        inputs: Vec<String>,

        /// Figure caption
        #[arg(long, default_value = "")]
        caption: String,

        /// Output prefix; writes <prefix>.csv and <prefix>.<plot-format>
        #[arg(short = 'p', long, default_value = "out")]
        out_prefix: PathBuf,

        /// Plot description dialect (tex or toml)
        #[arg(long, default_value = "tex")]
        plot_format: PlotFormat,

        /// Skip the plot description
        #[arg(long)]
        no_plot: bool,

        #[command(flatten)]
        table: TableOptions,
    },

    /// Append EOC columns to one scheme's table
    Eoc {
        input: PathBuf,
        output: PathBuf,

        #[command(flatten)]
        table: TableOptions,
    },

    /// Multiply one column by a constant factor
    Scale {
        input: PathBuf,
        output: PathBuf,

        #[arg(long)]
        column: String,

        #[arg(long)]
        factor: f64,

        #[command(flatten)]
        table: TableOptions,
    },
}

fn parse_delimiter(s: &str) -> std::result::Result<char, String> {
    match s {
        "tab" | "\\t" => Ok('\t'),
        _ => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(format!("delimiter must be one character, got `{}`", s)),
            }
        }
    }
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

impl TableOptions {
    pub fn apply(&self, config: &mut RunConfig) {
        if !self.quantities.is_empty() {
            config.quantities = self.quantities.clone();
        }
        if !self.columns.is_empty() {
            config.columns = Some(self.columns.clone());
        }
        if self.columns_from_header {
            config.columns_from_header = true;
        }
        if let Some(axis) = &self.axis {
            config.axis = Some(axis.clone());
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(sentinel) = self.sentinel {
            config.sentinel = sentinel;
        }
        if self.header {
            config.has_header_row = true;
        }
        if self.allow_invalid {
            config.allow_invalid = true;
        }
    }
}

/// First half of `inputs` are files, second half their titles.
pub fn split_inputs(inputs: &[String]) -> Result<(Vec<PathBuf>, Vec<String>)> {
    if inputs.len() % 2 != 0 {
        return Err(EocError::Config(format!(
            "expected as many titles as files, got {} arguments",
            inputs.len()
        )));
    }
    let (files, titles) = inputs.split_at(inputs.len() / 2);
    Ok((
        files.iter().map(PathBuf::from).collect(),
        titles.to_vec(),
    ))
}
