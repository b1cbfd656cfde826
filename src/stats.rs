//! Descriptive statistics with numerical stability guarantees.
//!
//! All functions in this module handle edge cases explicitly and use
//! numerically stable algorithms to avoid catastrophic cancellation.
//!
//! # Algorithms
//!
//! - **Mean**: Neumaier compensated summation for O(ε) error independent of n.
//! - **Variance/StdDev**: Welford's online algorithm.
//!   Reference: Welford (1962), "Note on a Method for Calculating
//!   Corrected Sums of Squares and Products", *Technometrics* 4(3).
//! - **Quantile**: continuous estimators interpolating between order
//!   statistics, parameterized by plotting positions (α, β). Type 7
//!   (linear) is α = β = 1; the Cunnane estimator α = β = 0.4 is approximately
//!   quantile-unbiased and is what [`crate::confidence`] uses.
//!   Reference: Hyndman & Fan (1996), "Sample Quantiles in Statistical
//!   Packages", *The American Statistician* 50(4).

/// Computes the arithmetic mean using compensated summation.
///
/// # Returns
/// - `None` if `data` is empty or contains any NaN/Inf.
///
/// # Examples
/// ```
/// use stellarprop::stats::mean;
/// let v = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert!((mean(&v).unwrap() - 3.0).abs() < 1e-15);
/// ```
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    if !data.iter().all(|x| x.is_finite()) {
        return None;
    }
    Some(kahan_sum(data) / data.len() as f64)
}

/// Computes the sample variance using Welford's online algorithm.
///
/// Returns the **sample** (unbiased) variance with Bessel's correction
/// (denominator `n − 1`).
///
/// # Returns
/// - `None` if `data.len() < 2` or contains NaN/Inf.
///
/// # Examples
/// ```
/// use stellarprop::stats::variance;
/// let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
/// assert!((variance(&v).unwrap() - 4.571428571428571).abs() < 1e-10);
/// ```
pub fn variance(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    if !data.iter().all(|x| x.is_finite()) {
        return None;
    }
    let mut acc = WelfordAccumulator::new();
    for &x in data {
        acc.update(x);
    }
    acc.sample_variance()
}

/// Computes the sample standard deviation, `sqrt(variance(data))`.
///
/// # Returns
/// - `None` if `data.len() < 2` or contains NaN/Inf.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    variance(data).map(f64::sqrt)
}

/// Computes the sample covariance between two datasets.
///
/// # Formula
/// ```text
/// Cov(X, Y) = Σ(xᵢ − x̄)(yᵢ − ȳ) / (n − 1)
/// ```
///
/// # Returns
/// - `None` if `x.len() != y.len()`, `n < 2`, or data contains NaN/Inf.
///
/// # Examples
/// ```
/// use stellarprop::stats::covariance;
/// let x = [1.0, 2.0, 3.0, 4.0, 5.0];
/// let y = [2.0, 4.0, 6.0, 8.0, 10.0];
/// let cov = covariance(&x, &y).unwrap();
/// assert!((cov - 5.0).abs() < 1e-14);
/// ```
pub fn covariance(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n < 2 {
        return None;
    }
    if !x.iter().chain(y.iter()).all(|v| v.is_finite()) {
        return None;
    }
    let nf = n as f64;
    let mean_x = kahan_sum(x) / nf;
    let mean_y = kahan_sum(y) / nf;
    let sum: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum();
    Some(sum / (nf - 1.0))
}

/// Pearson correlation coefficient `Cov(X,Y) / (s_X·s_Y)`.
///
/// # Returns
/// - `None` under the same conditions as [`covariance`], or if either
///   input has zero variance.
pub fn correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    let cov = covariance(x, y)?;
    let sx = std_dev(x)?;
    let sy = std_dev(y)?;
    if sx == 0.0 || sy == 0.0 {
        return None;
    }
    Some((cov / (sx * sy)).clamp(-1.0, 1.0))
}

// ---------------------------------------------------------------------------
// Quantiles
// ---------------------------------------------------------------------------

/// Plotting-position parameters `(α, β)` of a continuous sample quantile.
///
/// For sorted data `x[1..=n]` and probability `p`:
/// ```text
/// m = α + p·(1 − α − β)
/// j = ⌊clamp(n·p + m, 1, n−1)⌋,   g = clamp(n·p + m − j, 0, 1)
/// Q(p) = (1 − g)·x[j] + g·x[j+1]
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlottingPosition {
    pub alpha: f64,
    pub beta: f64,
}

impl PlottingPosition {
    /// Hyndman–Fan type 7 (linear interpolation of the modes).
    pub const LINEAR: Self = Self {
        alpha: 1.0,
        beta: 1.0,
    };

    /// Cunnane (1978): approximately quantile-unbiased.
    pub const CUNNANE: Self = Self {
        alpha: 0.4,
        beta: 0.4,
    };
}

impl Default for PlottingPosition {
    fn default() -> Self {
        Self::CUNNANE
    }
}

/// Computes the `p`-th quantile of **pre-sorted** data with the given
/// plotting positions.
///
/// # Returns
/// - `None` if `sorted_data` is empty or `p` is outside `[0, 1]`.
///
/// # Examples
/// ```
/// use stellarprop::stats::{quantile_sorted_with, PlottingPosition};
/// let data = [1.0, 2.0, 3.0, 4.0];
/// let q = quantile_sorted_with(&data, 0.25, PlottingPosition::CUNNANE).unwrap();
/// assert!((q - 1.45).abs() < 1e-12);
/// ```
pub fn quantile_sorted_with(sorted_data: &[f64], p: f64, pos: PlottingPosition) -> Option<f64> {
    let n = sorted_data.len();
    if n == 0 || !(0.0..=1.0).contains(&p) {
        return None;
    }
    if n == 1 {
        return Some(sorted_data[0]);
    }

    let nf = n as f64;
    let m = pos.alpha + p * (1.0 - pos.alpha - pos.beta);
    let aleph = nf * p + m;
    let k = aleph.clamp(1.0, nf - 1.0).floor();
    let g = (aleph - k).clamp(0.0, 1.0);
    let k = k as usize;
    Some((1.0 - g) * sorted_data[k - 1] + g * sorted_data[k])
}

/// Computes several quantiles of unsorted `data` with one sort.
///
/// # Returns
/// - `None` if `data` is empty, contains NaN, or any probability is
///   outside `[0, 1]`.
///
/// # Examples
/// ```
/// use stellarprop::stats::{quantiles, PlottingPosition};
/// let q = quantiles(&[5.0, 1.0, 3.0], &[0.0, 0.5, 1.0], PlottingPosition::LINEAR).unwrap();
/// assert_eq!(q, vec![1.0, 3.0, 5.0]);
/// ```
pub fn quantiles(data: &[f64], probs: &[f64], pos: PlottingPosition) -> Option<Vec<f64>> {
    let sorted = sorted_copy(data)?;
    probs
        .iter()
        .map(|&p| quantile_sorted_with(&sorted, p, pos))
        .collect()
}

fn sorted_copy(data: &[f64]) -> Option<Vec<f64>> {
    if data.is_empty() || data.iter().any(|x| x.is_nan()) {
        return None;
    }
    let mut sorted = data.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    Some(sorted)
}

// ---------------------------------------------------------------------------
// Kahan compensated summation
// ---------------------------------------------------------------------------

/// Neumaier compensated summation for O(ε) error independent of `n`.
///
/// This is an improved variant of Kahan summation that also handles the
/// case where the addend is larger in magnitude than the running sum.
///
/// Reference: Neumaier (1974), "Rundungsfehleranalyse einiger Verfahren
/// zur Summation endlicher Summen", *ZAMM* 54(1), pp. 39–51.
pub fn kahan_sum(data: &[f64]) -> f64 {
    let mut sum = 0.0_f64;
    let mut c = 0.0_f64;
    for &x in data {
        let t = sum + x;
        if sum.abs() >= x.abs() {
            c += (sum - t) + x;
        } else {
            c += (x - t) + sum;
        }
        sum = t;
    }
    sum + c
}

// ---------------------------------------------------------------------------
// Welford online accumulator
// ---------------------------------------------------------------------------

/// Streaming accumulator for mean and variance.
///
/// # Examples
/// ```
/// use stellarprop::stats::WelfordAccumulator;
/// let mut acc = WelfordAccumulator::new();
/// for &x in &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
///     acc.update(x);
/// }
/// assert!((acc.mean().unwrap() - 5.0).abs() < 1e-15);
/// assert!((acc.sample_variance().unwrap() - 4.571428571428571).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WelfordAccumulator {
    count: u64,
    mean_acc: f64,
    m2: f64,
}

impl WelfordAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a new sample into the accumulator.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            // avoids delta² overflow for huge first values
            self.mean_acc = value;
            return;
        }
        let delta = value - self.mean_acc;
        self.mean_acc += delta / self.count as f64;
        self.m2 += delta * (value - self.mean_acc);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the running mean, or `None` if no samples have been added.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.mean_acc)
        }
    }

    /// Returns the sample variance (n − 1 denominator), or `None` if fewer
    /// than 2 samples have been added.
    pub fn sample_variance(&self) -> Option<f64> {
        if self.count < 2 {
            None
        } else {
            Some(self.m2 / (self.count - 1) as f64)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- mean ---

    #[test]
    fn test_mean_basic() {
        assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0, 5.0]), Some(3.0));
    }

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_mean_nan() {
        assert_eq!(mean(&[1.0, f64::NAN, 3.0]), None);
        assert_eq!(mean(&[1.0, f64::INFINITY, 3.0]), None);
    }

    // --- variance ---

    #[test]
    fn test_variance_basic() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let var = variance(&v).unwrap();
        assert!((var - 4.571428571428571).abs() < 1e-10);
    }

    #[test]
    fn test_variance_constant() {
        let v = [5.0; 100];
        assert!((variance(&v).unwrap()).abs() < 1e-15);
    }

    #[test]
    fn test_variance_too_short() {
        assert_eq!(variance(&[1.0]), None);
        assert_eq!(variance(&[]), None);
    }

    #[test]
    fn test_std_dev() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let sd = std_dev(&v).unwrap();
        assert!((sd - 4.571428571428571_f64.sqrt()).abs() < 1e-10);
    }

    // --- covariance / correlation ---

    #[test]
    fn test_covariance_perfect_negative() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [10.0, 8.0, 6.0, 4.0, 2.0];
        assert!((covariance(&x, &y).unwrap() + 5.0).abs() < 1e-14);
        assert!((correlation(&x, &y).unwrap() + 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_covariance_edge_cases() {
        assert_eq!(covariance(&[], &[]), None);
        assert_eq!(covariance(&[1.0], &[2.0]), None);
        assert_eq!(covariance(&[1.0, 2.0], &[1.0]), None);
        assert_eq!(covariance(&[1.0, f64::NAN], &[1.0, 2.0]), None);
    }

    #[test]
    fn test_correlation_constant_input() {
        assert_eq!(correlation(&[1.0, 2.0, 3.0], &[4.0, 4.0, 4.0]), None);
    }

    // --- plotting positions ---

    #[test]
    fn test_linear_extremes_and_median() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        let q = quantiles(&data, &[0.0, 1.0, 0.5], PlottingPosition::LINEAR).unwrap();
        assert_eq!(q, vec![1.0, 5.0, 3.0]);
    }

    #[test]
    fn test_linear_interpolation() {
        let data = [1.0, 2.0, 3.0, 4.0];
        // (n-1)·p = 0.75 → 0.25·x[0] + 0.75·x[1]
        let q = quantile_sorted_with(&data, 0.25, PlottingPosition::LINEAR).unwrap();
        assert!((q - 1.75).abs() < 1e-15);
    }

    #[test]
    fn test_quantiles_invalid() {
        let pos = PlottingPosition::default();
        assert_eq!(quantiles(&[1.0, 2.0], &[-0.1], pos), None);
        assert_eq!(quantiles(&[1.0, 2.0], &[1.1], pos), None);
        assert_eq!(quantiles(&[], &[0.5], pos), None);
        assert_eq!(quantiles(&[1.0, f64::NAN], &[0.5], pos), None);
    }

    #[test]
    fn test_cunnane_known_values() {
        // n = 10, values 1..=10
        let data: Vec<f64> = (1..=10).map(f64::from).collect();
        // p = 0.16: m = 0.4 + 0.032 = 0.432, aleph = 2.032 → 2 + 0.032
        let q = quantile_sorted_with(&data, 0.16, PlottingPosition::CUNNANE).unwrap();
        assert!((q - 2.032).abs() < 1e-12, "{q}");
        let med = quantile_sorted_with(&data, 0.5, PlottingPosition::CUNNANE).unwrap();
        assert!((med - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_plotting_position_clamps_to_extremes() {
        let data = [1.0, 2.0, 3.0];
        assert_eq!(quantile_sorted_with(&data, 0.0, PlottingPosition::CUNNANE), Some(1.0));
        assert_eq!(quantile_sorted_with(&data, 1.0, PlottingPosition::CUNNANE), Some(3.0));
        assert_eq!(quantile_sorted_with(&[7.0], 0.3, PlottingPosition::CUNNANE), Some(7.0));
    }

    #[test]
    fn test_quantiles_batch() {
        let data = [9.0, 1.0, 5.0, 3.0, 7.0];
        let q = quantiles(&data, &[0.0, 0.5, 1.0], PlottingPosition::default()).unwrap();
        assert_eq!(q, vec![1.0, 5.0, 9.0]);
        assert_eq!(quantiles(&data, &[0.5, 2.0], PlottingPosition::default()), None);
    }

    // --- kahan_sum ---

    #[test]
    fn test_kahan_sum_precision() {
        let data = [1.0, 1e100, 1.0, -1e100];
        assert_eq!(kahan_sum(&data), 2.0);
    }
}
