//! Quantile triples and empirical confidence intervals.
//!
//! A [`QuantileTriple`] is the usual way a measurement is reported in the
//! literature: a central value with lower and upper bounds, e.g.
//! `1.02 (+0.05 −0.03)`. [`ConfidenceTriple`] holds the cumulative
//! probabilities those bounds correspond to.

use serde::{Deserialize, Serialize};

use crate::stats::{self, PlottingPosition};

/// Probability mass inside ±1σ of a normal distribution.
pub const ONE_SIGMA: f64 = 0.682689;

/// Probability mass inside ±3σ of a normal distribution.
pub const THREE_SIGMA: f64 = 0.997300203937;

/// Lower, central and upper values of a quantity.
///
/// Callers are expected to supply `lower <= central <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileTriple {
    pub lower: f64,
    pub central: f64,
    pub upper: f64,
}

impl QuantileTriple {
    pub fn new(lower: f64, central: f64, upper: f64) -> Self {
        Self {
            lower,
            central,
            upper,
        }
    }

    /// Builds a triple from a central value and asymmetric error bars.
    ///
    /// # Examples
    /// ```
    /// use stellarprop::confidence::QuantileTriple;
    /// let t = QuantileTriple::from_errors(1.0, 0.1, 0.2);
    /// assert_eq!(t.lower, 0.9);
    /// assert_eq!(t.upper, 1.2);
    /// ```
    pub fn from_errors(central: f64, minus: f64, plus: f64) -> Self {
        Self::new(central - minus, central, central + plus)
    }

    /// `upper − lower`.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// `(central − lower, upper − central)`.
    pub fn errors(&self) -> (f64, f64) {
        (self.central - self.lower, self.upper - self.central)
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.lower, self.central, self.upper]
    }
}

/// Cumulative probabilities attached to a [`QuantileTriple`].
///
/// Callers are expected to supply `0 < lower < central < upper < 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceTriple {
    pub lower: f64,
    pub central: f64,
    pub upper: f64,
}

impl ConfidenceTriple {
    pub fn new(lower: f64, central: f64, upper: f64) -> Self {
        Self {
            lower,
            central,
            upper,
        }
    }

    /// Central interval of mass `p` around the median:
    /// `((1−p)/2, ½, (1+p)/2)`.
    pub fn from_interval(p: f64) -> Self {
        Self::new((1.0 - p) / 2.0, 0.5, (1.0 + p) / 2.0)
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.lower, self.central, self.upper]
    }
}

impl Default for ConfidenceTriple {
    /// The conventional 1σ triple `(0.16, 0.5, 0.84)`.
    fn default() -> Self {
        Self::new(0.16, 0.5, 0.84)
    }
}

/// Empirical (lower, median, upper) quantiles of `values`.
///
/// The bounds enclose a central mass of `interval`, or of [`THREE_SIGMA`]
/// when `three_sigma` is set. Quantiles use the Cunnane plotting positions
/// (α = β = 0.4).
///
/// # Returns
/// - `None` if `values` is empty or contains NaN.
///
/// # Examples
/// ```
/// use stellarprop::confidence::{confidence_interval, ONE_SIGMA};
/// let v: Vec<f64> = (1..=9).map(f64::from).collect();
/// let q = confidence_interval(&v, ONE_SIGMA, false).unwrap();
/// assert!((q.central - 5.0).abs() < 1e-12);
/// assert!(q.lower < 5.0 && q.upper > 5.0);
/// ```
pub fn confidence_interval(values: &[f64], interval: f64, three_sigma: bool) -> Option<QuantileTriple> {
    let p = if three_sigma { THREE_SIGMA } else { interval };
    confidence_interval_with(values, p)
}

/// [`confidence_interval`] for an explicit central mass `interval`.
pub fn confidence_interval_with(values: &[f64], interval: f64) -> Option<QuantileTriple> {
    let probs = ConfidenceTriple::from_interval(interval).as_array();
    let q = stats::quantiles(values, &probs, PlottingPosition::CUNNANE)?;
    Some(QuantileTriple::new(q[0], q[1], q[2]))
}
