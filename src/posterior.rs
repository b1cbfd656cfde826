//! Posterior predictive radii from a mass-radius relation.
//!
//! The relation is linear, `R = b + s·M`, with `(b, s)` drawn jointly from
//! a stored regression trace, plus an intrinsic scatter term:
//!
//! - fractional scatter: `R ← R + z·R·k`
//! - constant scatter:   `R ← R + z·k`
//!
//! with `z ~ N(0, 1)` independent per draw. Every call loads the trace
//! afresh from its [`TraceSource`]; nothing is cached between calls.
//!
//! # Examples
//! ```
//! use stellarprop::posterior::{
//!     sample_posterior_radius, InMemoryTraces, RelationVariant,
//! };
//! use stellarprop::random::create_rng;
//! use stellarprop::trace::CoefficientTrace;
//!
//! let trace = CoefficientTrace::new(vec![0.01, 0.02], vec![0.98, 0.99]).unwrap();
//! let source = InMemoryTraces::new()
//!     .with(RelationVariant::Fractional, trace, 0.031)
//!     .unwrap();
//! let mut rng = create_rng(1);
//! let radii = sample_posterior_radius(&source, 0.5, RelationVariant::Fractional, 2, true, &mut rng)
//!     .unwrap();
//! assert_eq!(radii.len(), 2);
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::confidence::{self, QuantileTriple};
use crate::error::Error;
use crate::random;
use crate::trace::{CoefficientTrace, TraceColumns};

/// Posterior samples per input mass when the caller has no preference.
pub const DEFAULT_SAMPLES: usize = 5000;

/// Which published relation (and scatter model) to sample from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RelationVariant {
    /// Scatter proportional to the radius.
    #[default]
    Fractional,
    /// Additive scatter of fixed size.
    Constant,
}

impl RelationVariant {
    /// Short selector name (`Frac`, `Line`).
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationVariant::Fractional => "Frac",
            RelationVariant::Constant => "Line",
        }
    }
}

impl fmt::Display for RelationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "frac" | "fractional" => Ok(RelationVariant::Fractional),
            "line" | "linear" | "const" | "constant" => Ok(RelationVariant::Constant),
            _ => Err(Error::UnknownVariant(s.to_string())),
        }
    }
}

impl TryFrom<String> for RelationVariant {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RelationVariant> for String {
    fn from(v: RelationVariant) -> Self {
        v.as_str().to_string()
    }
}

/// Intrinsic scatter added on top of the regression line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScatterModel {
    /// Standard deviation `k·R`.
    Fractional(f64),
    /// Standard deviation `k`.
    Constant(f64),
}

impl ScatterModel {
    /// Scatter of magnitude `k` in the form used by `variant`.
    ///
    /// # Errors
    /// [`Error::InvalidScatter`] unless `k` is finite and non-negative.
    pub fn for_variant(variant: RelationVariant, k: f64) -> Result<Self, Error> {
        if !k.is_finite() || k < 0.0 {
            return Err(Error::InvalidScatter(k));
        }
        Ok(match variant {
            RelationVariant::Fractional => ScatterModel::Fractional(k),
            RelationVariant::Constant => ScatterModel::Constant(k),
        })
    }

    pub fn magnitude(&self) -> f64 {
        match *self {
            ScatterModel::Fractional(k) | ScatterModel::Constant(k) => k,
        }
    }

    /// Perturbs `radius` by the standard-normal deviate `z`.
    pub fn apply(&self, radius: f64, z: f64) -> f64 {
        match *self {
            ScatterModel::Fractional(k) => radius + z * radius * k,
            ScatterModel::Constant(k) => radius + z * k,
        }
    }
}

/// Stellar mass input: a single value or a list.
#[derive(Debug, Clone, PartialEq)]
pub enum MassInput {
    Scalar(f64),
    Many(Vec<f64>),
}

impl From<f64> for MassInput {
    fn from(m: f64) -> Self {
        MassInput::Scalar(m)
    }
}

impl From<Vec<f64>> for MassInput {
    fn from(m: Vec<f64>) -> Self {
        MassInput::Many(m)
    }
}

impl From<&[f64]> for MassInput {
    fn from(m: &[f64]) -> Self {
        MassInput::Many(m.to_vec())
    }
}

/// Row-major matrix of samples: one row per input mass.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl SampleGrid {
    fn new(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Samples for the `i`-th input mass.
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        if i >= self.rows {
            return None;
        }
        Some(&self.data[i * self.cols..(i + 1) * self.cols])
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.rows).filter_map(move |i| self.row(i))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Concatenation of the rows.
    pub fn into_flat(self) -> Vec<f64> {
        self.data
    }

    /// [`confidence::confidence_interval_with`] of each row.
    pub fn row_intervals(&self, interval: f64) -> Vec<Option<QuantileTriple>> {
        self.iter_rows()
            .map(|row| confidence::confidence_interval_with(row, interval))
            .collect()
    }
}

/// Output of the resampler.
#[derive(Debug, Clone, PartialEq)]
pub enum RadiusSamples {
    Flat(Vec<f64>),
    Grid(SampleGrid),
}

impl RadiusSamples {
    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All samples in row-major order.
    pub fn as_slice(&self) -> &[f64] {
        match self {
            RadiusSamples::Flat(v) => v,
            RadiusSamples::Grid(g) => g.as_slice(),
        }
    }

    pub fn into_flat(self) -> Vec<f64> {
        match self {
            RadiusSamples::Flat(v) => v,
            RadiusSamples::Grid(g) => g.into_flat(),
        }
    }

    /// 1σ confidence interval of all samples pooled together.
    pub fn confidence_interval(&self) -> Option<QuantileTriple> {
        confidence::confidence_interval(self.as_slice(), confidence::ONE_SIGMA, false)
    }
}

/// A loaded trace together with its scatter model.
#[derive(Debug, Clone, PartialEq)]
pub struct MassRadiusRelation {
    trace: CoefficientTrace,
    scatter: ScatterModel,
}

impl MassRadiusRelation {
    /// # Errors
    /// [`Error::InvalidScatter`] if the scatter magnitude is negative or
    /// non-finite.
    pub fn new(trace: CoefficientTrace, scatter: ScatterModel) -> Result<Self, Error> {
        let k = scatter.magnitude();
        if !k.is_finite() || k < 0.0 {
            return Err(Error::InvalidScatter(k));
        }
        Ok(Self { trace, scatter })
    }

    pub fn trace(&self) -> &CoefficientTrace {
        &self.trace
    }

    pub fn scatter(&self) -> ScatterModel {
        self.scatter
    }

    /// Draws `n` radii per input mass.
    ///
    /// `n` is clamped to the trace length with a warning. A scalar mass
    /// always yields [`RadiusSamples::Flat`]; a list yields an M×N
    /// [`RadiusSamples::Grid`] unless `flatten` is set.
    pub fn sample<R: Rng>(&self, mass: &MassInput, n: usize, flatten: bool, rng: &mut R) -> RadiusSamples {
        match mass {
            MassInput::Scalar(m) => RadiusSamples::Flat(self.sample_scalar(*m, n, rng)),
            MassInput::Many(masses) => {
                let grid = self.sample_many(masses, n, rng);
                if flatten {
                    RadiusSamples::Flat(grid.into_flat())
                } else {
                    RadiusSamples::Grid(grid)
                }
            }
        }
    }

    /// Draws `n` radii for a single mass.
    pub fn sample_scalar<R: Rng>(&self, mass: f64, n: usize, rng: &mut R) -> Vec<f64> {
        self.sample_many(&[mass], n, rng).into_flat()
    }

    /// Draws `n` radii for each mass; row `i` belongs to `masses[i]`.
    ///
    /// All trace indices are drawn first as one block, then all scatter
    /// deviates. The same index selects both intercept and slope.
    pub fn sample_many<R: Rng>(&self, masses: &[f64], n: usize, rng: &mut R) -> SampleGrid {
        let n = self.clamp_samples(n);
        let total = masses.len() * n;
        let indices = random::sample_indices(self.trace.len(), total, rng);
        let deviates = random::standard_normals(total, rng);

        let b = self.trace.intercept();
        let s = self.trace.slope();
        let data = indices
            .iter()
            .zip(&deviates)
            .enumerate()
            .map(|(k, (&i, &z))| {
                let mass = masses[k / n];
                self.scatter.apply(b[i] + s[i] * mass, z)
            })
            .collect();
        SampleGrid::new(masses.len(), n, data)
    }

    fn clamp_samples(&self, n: usize) -> usize {
        let available = self.trace.len();
        if n > available {
            warn!(
                requested = n,
                available,
                "requested posterior samples per mass exceed trace length, clamping"
            );
            available
        } else {
            n
        }
    }
}

/// Supplies a freshly loaded relation for each resampler call.
pub trait TraceSource {
    fn load(&self, variant: RelationVariant) -> Result<MassRadiusRelation, Error>;
}

/// Location and scatter magnitude of one relation's trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationEntry {
    /// Relative to [`RelationCatalog::data_dir`] unless absolute.
    pub trace: PathBuf,
    pub scatter: f64,
}

/// File-backed [`TraceSource`].
///
/// Every field has a default, so a partial configuration only needs to
/// name what differs:
/// ```
/// use stellarprop::posterior::RelationCatalog;
/// let catalog: RelationCatalog = serde_json::from_str(r#"{"data_dir": "/data/mr"}"#).unwrap();
/// assert_eq!(catalog.fractional.scatter, 0.031);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationCatalog {
    pub data_dir: PathBuf,
    pub fractional: RelationEntry,
    pub constant: RelationEntry,
    pub columns: TraceColumns,
}

impl Default for RelationCatalog {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("../resources/massradius"),
            fractional: RelationEntry {
                trace: PathBuf::from("fractional_01/chains.csv"),
                scatter: 0.031,
            },
            constant: RelationEntry {
                trace: PathBuf::from("linear_01/chains.csv"),
                scatter: 0.0143,
            },
            columns: TraceColumns::default(),
        }
    }
}

impl RelationCatalog {
    /// Default layout rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn entry(&self, variant: RelationVariant) -> &RelationEntry {
        match variant {
            RelationVariant::Fractional => &self.fractional,
            RelationVariant::Constant => &self.constant,
        }
    }

    pub fn trace_path(&self, variant: RelationVariant) -> PathBuf {
        self.data_dir.join(&self.entry(variant).trace)
    }
}

impl TraceSource for RelationCatalog {
    fn load(&self, variant: RelationVariant) -> Result<MassRadiusRelation, Error> {
        let path = self.trace_path(variant);
        let trace = CoefficientTrace::from_path(&path, &self.columns)?;
        let scatter = ScatterModel::for_variant(variant, self.entry(variant).scatter)?;
        MassRadiusRelation::new(trace, scatter)
    }
}

/// [`TraceSource`] over traces already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTraces {
    fractional: Option<MassRadiusRelation>,
    constant: Option<MassRadiusRelation>,
}

impl InMemoryTraces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `trace` with scatter magnitude `k` under `variant`.
    ///
    /// # Errors
    /// [`Error::InvalidScatter`] if `k` is negative or non-finite.
    pub fn with(
        mut self,
        variant: RelationVariant,
        trace: CoefficientTrace,
        k: f64,
    ) -> Result<Self, Error> {
        let relation = MassRadiusRelation::new(trace, ScatterModel::for_variant(variant, k)?)?;
        match variant {
            RelationVariant::Fractional => self.fractional = Some(relation),
            RelationVariant::Constant => self.constant = Some(relation),
        }
        Ok(self)
    }
}

impl TraceSource for InMemoryTraces {
    fn load(&self, variant: RelationVariant) -> Result<MassRadiusRelation, Error> {
        let slot = match variant {
            RelationVariant::Fractional => &self.fractional,
            RelationVariant::Constant => &self.constant,
        };
        slot.clone()
            .ok_or_else(|| Error::InvalidTrace(format!("no trace registered for {variant}")))
    }
}

/// Samples posterior radii for `mass` from the relation `variant`.
///
/// Loads the relation from `source`, then draws `n` radii per mass (see
/// [`MassRadiusRelation::sample`]). Pass [`DEFAULT_SAMPLES`] for the usual
/// sample size.
///
/// # Errors
/// Whatever `source` reports while loading the trace.
pub fn sample_posterior_radius<S, R>(
    source: &S,
    mass: impl Into<MassInput>,
    variant: RelationVariant,
    n: usize,
    flatten: bool,
    rng: &mut R,
) -> Result<RadiusSamples, Error>
where
    S: TraceSource + ?Sized,
    R: Rng,
{
    let relation = source.load(variant)?;
    let mass = mass.into();
    debug!(%variant, draws = relation.trace().len(), n, "sampling posterior radius");
    Ok(relation.sample(&mass, n, flatten, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::create_rng;

    fn identity_trace() -> CoefficientTrace {
        CoefficientTrace::new(vec![0.0; 10], vec![1.0; 10]).unwrap()
    }

    fn relation(variant: RelationVariant, k: f64) -> MassRadiusRelation {
        let scatter = ScatterModel::for_variant(variant, k).unwrap();
        MassRadiusRelation::new(identity_trace(), scatter).unwrap()
    }

    #[test]
    fn test_parse_variant() {
        assert_eq!("Frac".parse::<RelationVariant>().unwrap(), RelationVariant::Fractional);
        assert_eq!("fractional".parse::<RelationVariant>().unwrap(), RelationVariant::Fractional);
        assert_eq!("Line".parse::<RelationVariant>().unwrap(), RelationVariant::Constant);
        assert_eq!("CONST".parse::<RelationVariant>().unwrap(), RelationVariant::Constant);
        assert!(matches!(
            "Quad".parse::<RelationVariant>(),
            Err(Error::UnknownVariant(s)) if s == "Quad"
        ));
    }

    #[test]
    fn test_scatter_validation() {
        assert!(ScatterModel::for_variant(RelationVariant::Fractional, -0.1).is_err());
        assert!(ScatterModel::for_variant(RelationVariant::Constant, f64::NAN).is_err());
        assert!(MassRadiusRelation::new(identity_trace(), ScatterModel::Constant(-1.0)).is_err());
        assert!(InMemoryTraces::new()
            .with(RelationVariant::Fractional, identity_trace(), f64::INFINITY)
            .is_err());
    }

    #[test]
    fn test_scatter_apply() {
        assert!((ScatterModel::Fractional(0.1).apply(2.0, 1.0) - 2.2).abs() < 1e-15);
        assert!((ScatterModel::Constant(0.1).apply(2.0, 1.0) - 2.1).abs() < 1e-15);
        assert_eq!(ScatterModel::Fractional(0.1).apply(2.0, 0.0), 2.0);
    }

    #[test]
    fn test_zero_scatter_is_exact() {
        let rel = relation(RelationVariant::Fractional, 0.0);
        let mut rng = create_rng(0);
        let r = rel.sample_scalar(5.0, 10, &mut rng);
        assert_eq!(r, vec![5.0; 10]);
    }

    #[test]
    fn test_grid_shape_and_rows() {
        let rel = relation(RelationVariant::Constant, 0.0);
        let mut rng = create_rng(1);
        let out = rel.sample(&MassInput::Many(vec![1.0, 2.0, 3.0]), 4, false, &mut rng);
        let RadiusSamples::Grid(grid) = out else {
            panic!("expected grid");
        };
        assert_eq!(grid.shape(), (3, 4));
        assert_eq!(grid.row(1), Some(&[2.0; 4][..]));
        assert_eq!(grid.row(3), None);
        assert_eq!(grid.iter_rows().count(), 3);
    }

    #[test]
    fn test_flatten_is_row_concatenation() {
        let trace = CoefficientTrace::new(vec![0.1, 0.2, 0.3], vec![1.0, 1.1, 0.9]).unwrap();
        let rel = MassRadiusRelation::new(trace, ScatterModel::Fractional(0.05)).unwrap();
        let masses = MassInput::Many(vec![0.3, 0.6]);

        let grid = rel.sample(&masses, 3, false, &mut create_rng(9));
        let flat = rel.sample(&masses, 3, true, &mut create_rng(9));
        assert!(matches!(flat, RadiusSamples::Flat(_)));
        assert_eq!(grid.into_flat(), flat.into_flat());
    }

    #[test]
    fn test_clamps_to_trace_length() {
        let rel = relation(RelationVariant::Fractional, 0.031);
        let mut rng = create_rng(2);
        assert_eq!(rel.sample_scalar(1.0, 500, &mut rng).len(), 10);
        assert_eq!(rel.sample_many(&[1.0, 2.0], 500, &mut rng).shape(), (2, 10));
    }

    #[test]
    fn test_scalar_ignores_flatten() {
        let rel = relation(RelationVariant::Fractional, 0.0);
        let out = rel.sample(&MassInput::Scalar(1.0), 3, false, &mut create_rng(3));
        assert!(matches!(out, RadiusSamples::Flat(ref v) if v.len() == 3));
    }

    #[test]
    fn test_empty_mass_list() {
        let rel = relation(RelationVariant::Fractional, 0.0);
        let grid = rel.sample_many(&[], 5, &mut create_rng(4));
        assert_eq!(grid.shape(), (0, 5));
        assert!(grid.as_slice().is_empty());
    }

    #[test]
    fn test_index_draws_are_joint() {
        // each row lies on one of the two stored lines, never a mix
        let trace = CoefficientTrace::new(vec![0.0, 10.0], vec![1.0, 2.0]).unwrap();
        let rel = MassRadiusRelation::new(trace, ScatterModel::Constant(0.0)).unwrap();
        let r = rel.sample_scalar(1.0, 2, &mut create_rng(5));
        for v in r {
            assert!(v == 1.0 || v == 12.0, "{v}");
        }
    }

    #[test]
    fn test_in_memory_source() {
        let source = InMemoryTraces::new()
            .with(RelationVariant::Constant, identity_trace(), 0.0)
            .unwrap();
        let mut rng = create_rng(6);
        let out = sample_posterior_radius(&source, 2.0, RelationVariant::Constant, 5, true, &mut rng).unwrap();
        assert_eq!(out.as_slice(), &[2.0; 5]);

        let missing = sample_posterior_radius(&source, 2.0, RelationVariant::Fractional, 5, true, &mut rng);
        assert!(matches!(missing, Err(Error::InvalidTrace(_))));
    }

    #[test]
    fn test_catalog_defaults() {
        let catalog = RelationCatalog::default();
        assert_eq!(
            catalog.trace_path(RelationVariant::Fractional),
            PathBuf::from("../resources/massradius/fractional_01/chains.csv")
        );
        assert_eq!(
            catalog.trace_path(RelationVariant::Constant),
            PathBuf::from("../resources/massradius/linear_01/chains.csv")
        );
        assert_eq!(catalog.constant.scatter, 0.0143);
        assert_eq!(catalog.columns.intercept, "b");
        assert_eq!(catalog.columns.slope, "coef__1");
    }

    #[test]
    fn test_catalog_missing_file() {
        let catalog = RelationCatalog::with_data_dir("/nonexistent");
        let err = catalog.load(RelationVariant::Fractional).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_row_intervals() {
        let rel = relation(RelationVariant::Constant, 0.0);
        let grid = rel.sample_many(&[1.0, 4.0], 10, &mut create_rng(7));
        let iv = grid.row_intervals(confidence::ONE_SIGMA);
        assert_eq!(iv.len(), 2);
        assert_eq!(iv[1].unwrap().central, 4.0);
    }
}
