extern crate nalgebra as na;

use tracing::warn;

use crate::error::{EocError, Result};
use crate::table::record::{Record, Value};

/// Convergence rate between two refinement levels. The first level of a
/// sequence has no predecessor and gets `Undefined`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    Undefined,
    Value(f64),
}

impl From<Rate> for Value {
    fn from(rate: Rate) -> Self {
        match rate {
            Rate::Undefined => Value::Undefined,
            Rate::Value(x) => Value::Number(x),
        }
    }
}

/// `ln(q_cur / q_prev) / ln(h_cur / h_prev)`
pub fn eoc(q_prev: f64, q_cur: f64, h_prev: f64, h_cur: f64) -> f64 {
    (q_cur / q_prev).ln() / (h_cur / h_prev).ln()
}

pub fn rate_column(quantity: &str) -> String {
    format!("EOC_{}", quantity)
}

pub struct EocCalculator {
    axis: String,
    quantities: Vec<String>,
    rate_columns: Vec<String>,
    allow_invalid: bool,
}

impl EocCalculator {
    pub fn new(axis: impl Into<String>, quantities: &[String]) -> Self {
        EocCalculator {
            axis: axis.into(),
            quantities: quantities.to_vec(),
            rate_columns: quantities.iter().map(|q| rate_column(q)).collect(),
            allow_invalid: false,
        }
    }

    /// Turn invalid measurements into `Undefined` rates instead of failing.
    pub fn allow_invalid(mut self, allow: bool) -> Self {
        self.allow_invalid = allow;
        self
    }

    pub fn axis(&self) -> &str {
        &self.axis
    }

    pub fn quantities(&self) -> &[String] {
        &self.quantities
    }

    pub fn rate_columns(&self) -> &[String] {
        &self.rate_columns
    }

    /// Source columns followed by one `EOC_<quantity>` column per quantity.
    pub fn output_columns(&self, source: &[String]) -> Result<Vec<String>> {
        let mut columns = source.to_vec();
        for (quantity, rate) in self.quantities.iter().zip(&self.rate_columns) {
            if columns.contains(rate) {
                return Err(EocError::DuplicateColumn {
                    column: rate.clone(),
                    reason: format!("rate of `{}` clashes with a source column", quantity),
                });
            }
            columns.push(rate.clone());
        }
        Ok(columns)
    }

    fn tolerate(&self, err: EocError) -> Result<()> {
        match err {
            EocError::InvalidMeasurement { .. } if self.allow_invalid => {
                warn!("{}; rate left undefined", err);
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Rates for every quantity, in declaration order.
    pub fn rates(&self, previous: Option<&Record>, current: &Record) -> Result<Vec<Rate>> {
        let n = self.quantities.len();
        let previous = match previous {
            Some(p) => p,
            None => return Ok(vec![Rate::Undefined; n]),
        };

        let (h_prev, h_cur) = match (previous.positive(&self.axis), current.positive(&self.axis)) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => {
                self.tolerate(e)?;
                return Ok(vec![Rate::Undefined; n]);
            }
        };
        if h_cur == h_prev {
            return Err(EocError::DegenerateRefinement {
                axis: self.axis.clone(),
                h: h_cur,
                location: current.location(),
            });
        }

        let mut q_prev = na::DVector::from_element(n, 1.0);
        let mut q_cur = na::DVector::from_element(n, 1.0);
        let mut valid = vec![true; n];
        for (i, quantity) in self.quantities.iter().enumerate() {
            match (previous.positive(quantity), current.positive(quantity)) {
                (Ok(a), Ok(b)) => {
                    q_prev[i] = a;
                    q_cur[i] = b;
                }
                (Err(e), _) | (_, Err(e)) => {
                    self.tolerate(e)?;
                    valid[i] = false;
                }
            }
        }

        let rates = q_cur.component_div(&q_prev).map(f64::ln) / (h_cur / h_prev).ln();
        Ok(rates
            .iter()
            .zip(valid)
            .map(|(&r, ok)| if ok { Rate::Value(r) } else { Rate::Undefined })
            .collect())
    }

    /// Appends rate columns to a scheme's rows as they stream past.
    pub fn augment<I>(&self, rows: I) -> EocRows<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        EocRows {
            calc: self,
            rows: rows.into_iter(),
            previous: None,
            fit: OrderFit::new(self.quantities.len()),
        }
    }
}

pub struct EocRows<'a, I> {
    calc: &'a EocCalculator,
    rows: I,
    previous: Option<Record>,
    fit: OrderFit,
}

impl<'a, I> EocRows<'a, I> {
    pub fn order_fit(&self) -> &OrderFit {
        &self.fit
    }
}

impl<'a, I> Iterator for EocRows<'a, I>
where
    I: Iterator<Item = Result<Record>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.rows.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e)),
        };
        let rates = match self.calc.rates(self.previous.as_ref(), &row) {
            Ok(rates) => rates,
            Err(e) => return Some(Err(e)),
        };
        self.fit.observe(self.calc, &row);

        let mut out = row.clone();
        for (column, rate) in self.calc.rate_columns.iter().zip(rates) {
            out.insert(column.clone(), rate);
        }
        self.previous = Some(row);
        Some(Ok(out))
    }
}

/// Least-squares order over a whole refinement sequence: slope of `ln q`
/// against `ln h`, one per quantity.
#[derive(Debug, Clone, Default)]
pub struct OrderFit {
    samples: Vec<Vec<(f64, f64)>>,
}

impl OrderFit {
    pub fn new(quantities: usize) -> Self {
        OrderFit {
            samples: vec![Vec::new(); quantities],
        }
    }

    /// Skips anything that is not a valid measurement.
    pub fn observe(&mut self, calc: &EocCalculator, row: &Record) {
        let h = match row.positive(&calc.axis) {
            Ok(h) => h,
            Err(_) => return,
        };
        for (samples, quantity) in self.samples.iter_mut().zip(&calc.quantities) {
            if let Ok(q) = row.positive(quantity) {
                samples.push((h.ln(), q.ln()));
            }
        }
    }

    pub fn orders(&self) -> Vec<Option<f64>> {
        self.samples.iter().map(|s| fit_slope(s)).collect()
    }
}

fn fit_slope(samples: &[(f64, f64)]) -> Option<f64> {
    let lo = samples.iter().map(|s| s.0).fold(f64::INFINITY, f64::min);
    let hi = samples.iter().map(|s| s.0).fold(f64::NEG_INFINITY, f64::max);
    if samples.len() < 2 || hi <= lo {
        return None;
    }

    let n = samples.len();
    let a = na::DMatrix::from_fn(n, 2, |i, j| if j == 0 { samples[i].0 } else { 1.0 });
    let b = na::DVector::from_iterator(n, samples.iter().map(|s| s.1));
    let coeffs = a.svd(true, true).solve(&b, 1e-12).ok()?;
    Some(coeffs[0])
}
