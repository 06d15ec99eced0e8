use crate::error::{EocError, Result};
use crate::table::record::{Record, Sentinel, Value};

/// Multiplies `column` of every record by `factor`. Other fields pass through
/// untouched.
pub fn scale_column<'a, I>(
    records: I,
    column: &'a str,
    factor: f64,
) -> impl Iterator<Item = Result<Record>> + 'a
where
    I: IntoIterator<Item = Result<Record>>,
    I::IntoIter: 'a,
{
    records.into_iter().map(move |record| {
        let mut record = record?;
        let value = record.require(column)?;
        let x = match value.as_f64() {
            Some(x) if x.is_finite() => x,
            _ => {
                return Err(EocError::InvalidMeasurement {
                    column: column.to_string(),
                    value: value.render(Sentinel::Nan).into_owned(),
                    location: record.location(),
                })
            }
        };
        record.insert(column, Value::Number(factor * x));
        Ok(record)
    })
}
