use indicatif::{ProgressBar, ProgressStyle};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::cli::{split_inputs, Args, Commands, TableOptions};
use crate::config::{Preset, RunConfig, Settings, EOC_PRESET, MERGE_PRESET};
use crate::convergence::EocCalculator;
use crate::error::Result;
use crate::merge::{Scheme, SchemeMerger};
use crate::plot::{self, PlotFormat};
use crate::table::scale::scale_column;
use crate::table::{OutputBatch, TableReader, TableWriter};

pub struct MergeJob {
    pub files: Vec<PathBuf>,
    pub titles: Vec<String>,
    pub caption: String,
    pub out_prefix: PathBuf,
    pub plot: Option<PlotFormat>,
}

#[derive(Debug)]
pub struct MergeReport {
    pub rows: usize,
    pub warnings: usize,
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct EocReport {
    pub rows: usize,
    pub orders: Vec<(String, Option<f64>)>,
}

/// `<prefix>.<ext>`, keeping any dots already in the prefix.
fn with_suffix(prefix: &Path, ext: &str) -> PathBuf {
    let mut name: OsString = prefix.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn settings(config: &Option<PathBuf>, table: &TableOptions, preset: &Preset) -> Result<Settings> {
    let mut run_config = match config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    table.apply(&mut run_config);
    run_config.resolve(preset)
}

fn progress(len: usize, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("█░"));
    }
    pb
}

pub fn run(args: &Args) -> Result<()> {
    match &args.command {
        Commands::Merge {
            inputs,
            caption,
            out_prefix,
            plot_format,
            no_plot,
            table,
        } => {
            let settings = settings(&args.config, table, &MERGE_PRESET)?;
            let (files, titles) = split_inputs(inputs)?;
            let job = MergeJob {
                files,
                titles,
                caption: caption.clone(),
                out_prefix: out_prefix.clone(),
                plot: if *no_plot { None } else { Some(*plot_format) },
            };
            let report = run_merge(&settings, &job, args.quiet)?;
            info!(
                rows = report.rows,
                warnings = report.warnings,
                "wrote {}",
                report
                    .outputs
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Commands::Eoc {
            input,
            output,
            table,
        } => {
            let settings = settings(&args.config, table, &EOC_PRESET)?;
            let report = run_eoc(&settings, input, output)?;
            for (quantity, order) in &report.orders {
                match order {
                    Some(p) => info!("fitted order for {}: {:.3}", quantity, p),
                    None => info!("fitted order for {}: not enough levels", quantity),
                }
            }
            info!(rows = report.rows, "wrote {}", output.display());
        }
        Commands::Scale {
            input,
            output,
            column,
            factor,
            table,
        } => {
            let settings = settings(&args.config, table, &EOC_PRESET)?;
            let rows = run_scale(&settings, input, output, column, *factor)?;
            info!(rows, "wrote {}", output.display());
        }
    }
    Ok(())
}

pub fn run_merge(settings: &Settings, job: &MergeJob, quiet: bool) -> Result<MergeReport> {
    let merger = SchemeMerger::new(settings.axis.clone(), &settings.quantities);
    merger.columns(&job.titles)?;
    let styles = settings.palette.styles(&job.titles)?;

    let pb = progress(job.files.len(), quiet);
    pb.set_message("opening schemes");
    let mut schemes = Vec::with_capacity(job.files.len());
    for (file, title) in job.files.iter().zip(&job.titles) {
        debug!(scheme = %title, path = %file.display(), "opening scheme");
        schemes.push(Scheme::new(title.clone(), settings.open(file)?));
        pb.inc(1);
    }
    pb.finish_and_clear();

    let table = merger.merge(schemes)?;

    let csv_path = with_suffix(&job.out_prefix, "csv");
    let writer = TableWriter::new(table.columns.clone(), settings.delimiter)
        .with_sentinel(settings.sentinel);
    let mut batch = OutputBatch::new();
    let rows = batch.stage(&csv_path, |f| writer.write_records(f, &table.rows))?;

    if let Some(format) = job.plot {
        let dialect = format.dialect();
        let table_ref = csv_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| csv_path.display().to_string());
        let doc = plot::emit(
            merger.axis(),
            &settings.quantities,
            &styles,
            &table_ref,
            settings.delimiter,
            &job.caption,
        );
        let text = dialect.render(&doc)?;
        batch.stage(with_suffix(&job.out_prefix, dialect.extension()), |f| {
            f.write_all(text.as_bytes())?;
            Ok(())
        })?;
    }

    let outputs = batch.commit()?;
    Ok(MergeReport {
        rows,
        warnings: table.warnings.len(),
        outputs,
    })
}

pub fn run_eoc(settings: &Settings, input: &Path, output: &Path) -> Result<EocReport> {
    let reader = settings.open(input)?;
    let calc = EocCalculator::new(settings.axis.clone(), &settings.quantities)
        .allow_invalid(settings.allow_invalid);
    let columns = calc.output_columns(reader.columns())?;
    let writer = TableWriter::new(columns, settings.delimiter).with_sentinel(settings.sentinel);

    let mut eoc_rows = calc.augment(reader);
    let mut batch = OutputBatch::new();
    let rows = batch.stage(output, |f| writer.write(f, &mut eoc_rows))?;
    batch.commit()?;

    let orders = calc
        .quantities()
        .iter()
        .cloned()
        .zip(eoc_rows.order_fit().orders())
        .collect();
    Ok(EocReport { rows, orders })
}

pub fn run_scale(
    settings: &Settings,
    input: &Path,
    output: &Path,
    column: &str,
    factor: f64,
) -> Result<usize> {
    let schema = settings.schema_for(input)?;
    settings.require_columns(input, &schema, &[column])?;
    let mut reader = TableReader::open(input, settings.delimiter, &schema)?;
    if settings.has_header_row {
        reader.skip_header()?;
    }

    let writer = TableWriter::new(schema, settings.delimiter).with_sentinel(settings.sentinel);
    let mut batch = OutputBatch::new();
    let rows = batch.stage(output, |f| writer.write(f, scale_column(reader, column, factor)))?;
    batch.commit()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Sentinel;
    use std::fs;
    use tempfile::tempdir;

    fn merge_settings(quantities: &[&str]) -> Settings {
        RunConfig {
            quantities: quantities.iter().map(|q| q.to_string()).collect(),
            columns: Some(vec!["refine".into(), "h".into(), "q".into()]),
            delimiter: ',',
            has_header_row: true,
            ..RunConfig::default()
        }
        .resolve(&MERGE_PRESET)
        .unwrap()
    }

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_merge_two_schemes_end_to_end() {
        let dir = tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "refine,h,q\n0,1.0,0.1\n1,0.5,0.025\n");
        let b = write(dir.path(), "b.csv", "refine,h,q\n0,1.0,0.1\n1,0.5,0.05\n");
        let job = MergeJob {
            files: vec![a, b],
            titles: vec!["A".into(), "B".into()],
            caption: "A vs B".into(),
            out_prefix: dir.path().join("cmp"),
            plot: Some(PlotFormat::Tex),
        };

        let report = run_merge(&merge_settings(&["q"]), &job, true).unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.warnings, 0);

        let csv = fs::read_to_string(dir.path().join("cmp.csv")).unwrap();
        assert_eq!(csv, "refine,q_A,q_B\n0,0.1,0.1\n1,0.025,0.05\n");
        let tex = fs::read_to_string(dir.path().join("cmp.tex")).unwrap();
        assert!(tex.contains("table[x=refine,y=q_B,col sep=comma] {cmp.csv}"));
    }

    #[test]
    fn test_headerless_inputs_keep_first_level() {
        let dir = tempdir().unwrap();
        let a = write(dir.path(), "a.tsv", "0\t0.1\n1\t0.025\n2\t0.00625\n");
        let b = write(dir.path(), "b.tsv", "0\t0.1\n1\t0.05\n2\t0.025\n");
        let settings = RunConfig {
            quantities: vec!["q".into()],
            ..RunConfig::default()
        }
        .resolve(&MERGE_PRESET)
        .unwrap();
        let job = MergeJob {
            files: vec![a, b],
            titles: vec!["A".into(), "B".into()],
            caption: String::new(),
            out_prefix: dir.path().join("cmp"),
            plot: None,
        };

        let report = run_merge(&settings, &job, true).unwrap();
        assert_eq!(report.rows, 3);
        assert_eq!(
            fs::read_to_string(dir.path().join("cmp.csv")).unwrap(),
            "refine\tq_A\tq_B\n0\t0.1\t0.1\n1\t0.025\t0.05\n2\t0.00625\t0.025\n"
        );
    }

    #[test]
    fn test_merge_twice_is_byte_identical() {
        let dir = tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "refine,h,q\n0,1.0,0.1\n1,0.5,0.02\n2,0.25,0.004\n");
        let b = write(dir.path(), "b.csv", "refine,h,q\n0,1.0,0.2\n1,0.5,0.1\n2,0.25,0.05\n");
        let settings = merge_settings(&["q", "h"]);
        let mut outputs = Vec::new();
        for prefix in ["one", "two"] {
            let job = MergeJob {
                files: vec![a.clone(), b.clone()],
                titles: vec!["B".into(), "A".into()],
                caption: String::new(),
                out_prefix: dir.path().join(prefix),
                plot: Some(PlotFormat::Toml),
            };
            run_merge(&settings, &job, true).unwrap();
            outputs.push((
                fs::read(dir.path().join(format!("{}.csv", prefix))).unwrap(),
                fs::read_to_string(dir.path().join(format!("{}.toml", prefix))).unwrap(),
            ));
        }
        assert_eq!(outputs[0].0, outputs[1].0);
        // the plot document names its table, which differs by prefix
        assert_eq!(
            outputs[0].1.replace("one.csv", "X"),
            outputs[1].1.replace("two.csv", "X")
        );
    }

    #[test]
    fn test_merge_failure_leaves_no_outputs() {
        let dir = tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "refine,h,q\n0,1.0,0.1\n");
        let b = write(dir.path(), "b.csv", "refine,h,q\n0,1.0\n");
        let job = MergeJob {
            files: vec![a, b],
            titles: vec!["A".into(), "B".into()],
            caption: String::new(),
            out_prefix: dir.path().join("cmp"),
            plot: Some(PlotFormat::Tex),
        };
        let err = run_merge(&merge_settings(&["q"]), &job, true).unwrap_err();
        assert_eq!(err.kind(), "MalformedRowError");
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "unexpected files: {:?}", names);
    }

    #[test]
    fn test_eoc_end_to_end() {
        let dir = tempdir().unwrap();
        let input = write(
            dir.path(),
            "run.csv",
            "grid_width,L2_0,L2_1\n1.0,0.1,0.4\n0.5,0.025,0.2\n0.25,0.00625,0.1\n",
        );
        let output = dir.path().join("run_eoc.csv");
        let settings = RunConfig {
            delimiter: ',',
            has_header_row: true,
            ..RunConfig::default()
        }
        .resolve(&EOC_PRESET)
        .unwrap();

        let report = run_eoc(&settings, &input, &output).unwrap();
        assert_eq!(report.rows, 3);
        assert_eq!(report.orders[0].0, "L2_0");
        assert!((report.orders[0].1.unwrap() - 2.0).abs() < 1e-9);

        let text = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "grid_width,L2_0,L2_1,EOC_L2_0,EOC_L2_1");
        assert_eq!(lines[1], "1.0,0.1,0.4,none,none");
        let rates: Vec<f64> = lines[2]
            .split(',')
            .skip(3)
            .map(|s| s.parse().unwrap())
            .collect();
        assert!((rates[0] - 2.0).abs() < 1e-12);
        assert!((rates[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_eoc_negative_error_writes_nothing() {
        let dir = tempdir().unwrap();
        let input = write(dir.path(), "run.csv", "1.0\t0.1\n0.5\t-1\n");
        let output = dir.path().join("out.csv");
        let settings = RunConfig {
            quantities: vec!["q".into()],
            axis: Some("h".into()),
            has_header_row: false,
            sentinel: Sentinel::Nan,
            ..RunConfig::default()
        }
        .resolve(&EOC_PRESET)
        .unwrap();

        let err = run_eoc(&settings, &input, &output).unwrap_err();
        assert_eq!(err.kind(), "InvalidMeasurementError");
        assert!(err.to_string().contains("run.csv:2"));
        assert!(!output.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_eoc_columns_from_header() {
        let dir = tempdir().unwrap();
        let input = write(
            dir.path(),
            "run.csv",
            "level\tgrid_width\tL2_0\tL2_1\truntime\n0\t0.5\t0.2\t0.3\t1.5\n1\t0.25\t0.05\t0.15\t6.1\n",
        );
        let output = dir.path().join("out.csv");
        let settings = RunConfig {
            columns_from_header: true,
            sentinel: Sentinel::Nan,
            ..RunConfig::default()
        }
        .resolve(&EOC_PRESET)
        .unwrap();

        run_eoc(&settings, &input, &output).unwrap();
        let text = fs::read_to_string(&output).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "level\tgrid_width\tL2_0\tL2_1\truntime\tEOC_L2_0\tEOC_L2_1"
        );
        assert!(lines.next().unwrap().ends_with("\tnan\tnan"));
    }

    #[test]
    fn test_scale_column() {
        let dir = tempdir().unwrap();
        let input = write(dir.path(), "ts.csv", "t\tL2-Pres_1\n0.1\t0.5\n0.2\t0.25\n");
        let output = dir.path().join("new_ts.csv");
        let settings = RunConfig {
            columns_from_header: true,
            ..RunConfig::default()
        }
        .resolve(&EOC_PRESET)
        .unwrap();

        let rows = run_scale(&settings, &input, &output, "L2-Pres_1", 10.0).unwrap();
        assert_eq!(rows, 2);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "t\tL2-Pres_1\n0.1\t5\n0.2\t2.5\n"
        );
    }

    #[test]
    fn test_with_suffix_keeps_dots() {
        assert_eq!(
            with_suffix(Path::new("runs/v1.2"), "csv"),
            PathBuf::from("runs/v1.2.csv")
        );
    }
}
