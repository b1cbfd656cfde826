//! Posterior traces of a linear mass-radius regression.
//!
//! A trace is a table of correlated `(intercept, slope)` draws produced by
//! an external sampler. It is stored as delimited text with a header row;
//! only the two coefficient columns are read, any other columns (scatter,
//! log-likelihood, chain index, ...) are ignored.
//!
//! # Example file content
//! ```csv
//! # chain 1
//! b,coef__1,scatter
//! 0.0135,0.9984,0.031
//! 0.0141,0.9971,0.030
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::stats;

/// Column names and delimiter used when reading a trace file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceColumns {
    pub intercept: String,
    pub slope: String,
    pub delimiter: char,
}

impl Default for TraceColumns {
    fn default() -> Self {
        Self {
            intercept: "b".to_string(),
            slope: "coef__1".to_string(),
            delimiter: ',',
        }
    }
}

/// Equal-length intercept and slope columns; row `i` is one joint draw.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientTrace {
    intercept: Vec<f64>,
    slope: Vec<f64>,
}

/// Marginal moments of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub len: usize,
    pub intercept_mean: f64,
    pub intercept_std: Option<f64>,
    pub slope_mean: f64,
    pub slope_std: Option<f64>,
    pub correlation: Option<f64>,
}

impl CoefficientTrace {
    /// # Errors
    /// [`Error::InvalidTrace`] if the columns are empty, differ in length,
    /// or contain a non-finite value.
    pub fn new(intercept: Vec<f64>, slope: Vec<f64>) -> Result<Self, Error> {
        if intercept.is_empty() {
            return Err(Error::InvalidTrace("trace has no rows".into()));
        }
        if intercept.len() != slope.len() {
            return Err(Error::InvalidTrace(format!(
                "intercept has {} rows but slope has {}",
                intercept.len(),
                slope.len()
            )));
        }
        if let Some(row) = intercept
            .iter()
            .zip(&slope)
            .position(|(b, s)| !b.is_finite() || !s.is_finite())
        {
            return Err(Error::InvalidTrace(format!("non-finite value in row {row}")));
        }
        Ok(Self { intercept, slope })
    }

    /// Reads a delimited trace file.
    pub fn from_path(path: &Path, columns: &TraceColumns) -> Result<Self, Error> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let trace = parse(BufReader::new(file), columns, path)?;
        debug!(path = %path.display(), summary = ?trace.summary(), "loaded coefficient trace");
        Ok(trace)
    }

    /// Reads delimited trace text from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R, columns: &TraceColumns) -> Result<Self, Error> {
        parse(reader, columns, Path::new("<reader>"))
    }

    /// Number of draws `L` (always at least one).
    pub fn len(&self) -> usize {
        self.intercept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intercept.is_empty()
    }

    pub fn intercept(&self) -> &[f64] {
        &self.intercept
    }

    pub fn slope(&self) -> &[f64] {
        &self.slope
    }

    /// The `(intercept, slope)` draw at row `i`.
    pub fn draw(&self, i: usize) -> Option<(f64, f64)> {
        Some((*self.intercept.get(i)?, *self.slope.get(i)?))
    }

    /// Pearson correlation between intercept and slope draws.
    ///
    /// `None` for a single-row trace or a constant column.
    pub fn correlation(&self) -> Option<f64> {
        stats::correlation(&self.intercept, &self.slope)
    }

    pub fn summary(&self) -> TraceSummary {
        TraceSummary {
            len: self.len(),
            intercept_mean: stats::kahan_sum(&self.intercept) / self.len() as f64,
            intercept_std: stats::std_dev(&self.intercept),
            slope_mean: stats::kahan_sum(&self.slope) / self.len() as f64,
            slope_std: stats::std_dev(&self.slope),
            correlation: self.correlation(),
        }
    }
}

fn parse<R: BufRead>(reader: R, columns: &TraceColumns, path: &Path) -> Result<CoefficientTrace, Error> {
    let io_error = |source| Error::Io {
        path: PathBuf::from(path),
        source,
    };

    let mut positions: Option<(usize, usize)> = None;
    let mut intercept = Vec::new();
    let mut slope = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(io_error)?;
        let line = line.trim().trim_start_matches('\u{feff}');

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(columns.delimiter).map(str::trim).collect();

        let Some((bi, si)) = positions else {
            let header: Vec<String> = fields.iter().map(|f| unquote(f).to_string()).collect();
            let find = |name: &str| {
                header
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| Error::MissingColumn {
                        name: name.to_string(),
                        found: header.clone(),
                    })
            };
            positions = Some((find(&columns.intercept)?, find(&columns.slope)?));
            continue;
        };

        let value = |idx: usize, name: &str| -> Result<f64, Error> {
            let raw = fields.get(idx).ok_or_else(|| Error::Parse {
                line: line_num + 1,
                message: format!("expected at least {} fields, got {}", idx + 1, fields.len()),
            })?;
            unquote(raw).parse::<f64>().map_err(|_| Error::Parse {
                line: line_num + 1,
                message: format!("invalid {name} value {raw:?}"),
            })
        };
        intercept.push(value(bi, &columns.intercept)?);
        slope.push(value(si, &columns.slope)?);
    }

    if positions.is_none() {
        return Err(Error::InvalidTrace("missing header row".into()));
    }
    CoefficientTrace::new(intercept, slope)
}

fn unquote(field: &str) -> &str {
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}
