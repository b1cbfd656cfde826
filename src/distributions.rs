//! Probability distributions.
//!
//! The skew-normal family with analytical moments and numerically
//! inverted quantile / inverse survival functions.
//!
//! # Supported Distributions
//!
//! | Distribution | Parameters | Mean | Variance |
//! |---|---|---|---|
//! | [`SkewNormal`] | μ, σ, α | μ + σδ√(2/π) | σ²(1 − 2δ²/π) |
//!
//! with `δ = α/√(1+α²)`.
//!
//! # Design Notes
//!
//! Parameters are plain `f64` values. `α = 0` reduces to the normal
//! distribution N(μ, σ²).

use rand::distr::Distribution;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::roots;
use crate::special;

/// Error type for invalid distribution parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum DistributionError {
    /// Parameters violate distribution constraints.
    InvalidParameters(String),
}

impl std::fmt::Display for DistributionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistributionError::InvalidParameters(msg) => {
                write!(f, "invalid distribution parameters: {msg}")
            }
        }
    }
}

impl std::error::Error for DistributionError {}

// ============================================================================
// Skew-Normal Distribution
// ============================================================================

/// Skew-normal distribution SN(μ, σ, α).
///
/// # Mathematical Definition
/// With `z = (x − μ)/σ`:
/// - PDF: f(x) = (2/σ)·φ(z)·Φ(αz)
/// - CDF: F(x) = Φ(z) − 2·T(z, α)  (T = Owen's T function)
/// - Mean: μ + σδ√(2/π), δ = α/√(1+α²)
/// - Variance: σ²(1 − 2δ²/π)
///
/// Reference: Azzalini (1985), "A class of distributions which includes
/// the normal ones", *Scandinavian Journal of Statistics* 12(2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewNormal {
    mu: f64,
    sigma: f64,
    alpha: f64,
}

impl SkewNormal {
    /// Creates a new skew-normal distribution.
    ///
    /// # Errors
    /// Returns `Err` if `sigma ≤ 0` or any parameter is not finite.
    pub fn new(mu: f64, sigma: f64, alpha: f64) -> Result<Self, DistributionError> {
        if !mu.is_finite() || !sigma.is_finite() || !alpha.is_finite() || sigma <= 0.0 {
            return Err(DistributionError::InvalidParameters(format!(
                "SkewNormal requires finite μ, α and σ > 0, got μ={mu}, σ={sigma}, α={alpha}"
            )));
        }
        Ok(Self { mu, sigma, alpha })
    }

    pub fn location(&self) -> f64 {
        self.mu
    }

    pub fn scale(&self) -> f64 {
        self.sigma
    }

    pub fn shape(&self) -> f64 {
        self.alpha
    }

    /// δ = α/√(1+α²), the correlation of the underlying half-normal
    /// construction.
    pub fn delta(&self) -> f64 {
        self.alpha / (1.0 + self.alpha * self.alpha).sqrt()
    }

    /// Mean = μ + σδ√(2/π).
    pub fn mean(&self) -> f64 {
        self.mu + self.sigma * self.delta() * (2.0 / std::f64::consts::PI).sqrt()
    }

    /// Variance = σ²(1 − 2δ²/π).
    pub fn variance(&self) -> f64 {
        let d = self.delta();
        self.sigma * self.sigma * (1.0 - 2.0 * d * d / std::f64::consts::PI)
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    fn standardize(&self, x: f64) -> f64 {
        (x - self.mu) / self.sigma
    }

    /// PDF: (2/σ)·φ(z)·Φ(αz).
    pub fn pdf(&self, x: f64) -> f64 {
        let z = self.standardize(x);
        2.0 / self.sigma
            * special::standard_normal_pdf(z)
            * special::standard_normal_cdf(self.alpha * z)
    }

    /// CDF: Φ(z) − 2·T(z, α), clamped to [0, 1].
    pub fn cdf(&self, x: f64) -> f64 {
        if x == f64::NEG_INFINITY {
            return 0.0;
        }
        if x == f64::INFINITY {
            return 1.0;
        }
        let z = self.standardize(x);
        (special::standard_normal_cdf(z) - 2.0 * special::owens_t(z, self.alpha)).clamp(0.0, 1.0)
    }

    /// Survival function 1 − F(x) = Q(z) + 2·T(z, α), clamped to [0, 1].
    ///
    /// Evaluated directly so upper-tail probabilities do not cancel.
    pub fn sf(&self, x: f64) -> f64 {
        if x == f64::NEG_INFINITY {
            return 1.0;
        }
        if x == f64::INFINITY {
            return 0.0;
        }
        let z = self.standardize(x);
        (special::standard_normal_sf(z) + 2.0 * special::owens_t(z, self.alpha)).clamp(0.0, 1.0)
    }

    /// Inverse CDF (quantile function).
    ///
    /// Brackets the root by expanding outward from a moment-matched normal
    /// guess, then refines with bracketed Newton iterations on the CDF.
    ///
    /// Returns `None` if `p` is outside `(0, 1)`.
    pub fn quantile(&self, p: f64) -> Option<f64> {
        if p.is_nan() || p <= 0.0 || p >= 1.0 {
            return None;
        }
        let guess = self.mean() + self.std_dev() * special::inverse_normal_cdf(p);
        let (lo, hi) = self.bracket(guess, |x| self.cdf(x) - p);
        Some(roots::newton_bracketed(
            |x| self.cdf(x),
            |x| self.pdf(x),
            p,
            guess,
            lo,
            hi,
        ))
    }

    /// Inverse survival function: the `x` with `1 − F(x) = q`.
    ///
    /// Mathematically `quantile(1 − q)`, but solved against [`sf`](Self::sf)
    /// so small `q` keeps its precision.
    ///
    /// Returns `None` if `q` is outside `(0, 1)`.
    pub fn isf(&self, q: f64) -> Option<f64> {
        if q.is_nan() || q <= 0.0 || q >= 1.0 {
            return None;
        }
        let guess = self.mean() - self.std_dev() * special::inverse_normal_cdf(q);
        let (lo, hi) = self.bracket(guess, |x| q - self.sf(x));
        Some(roots::newton_bracketed(
            |x| -self.sf(x),
            |x| self.pdf(x),
            -q,
            guess,
            lo,
            hi,
        ))
    }

    /// Median = F⁻¹(½).
    pub fn median(&self) -> f64 {
        self.quantile(0.5).unwrap_or(self.mu)
    }

    /// Mode (peak of the density).
    ///
    /// The standardized mode `a` solves `α·φ(αa) = a·Φ(αa)`; the result is
    /// `μ + σa`. See [`standardized_mode`].
    pub fn mode(&self) -> f64 {
        self.mu + self.sigma * standardized_mode(self.alpha)
    }

    /// Central interval containing probability `confidence`:
    /// `(F⁻¹((1−c)/2), F⁻¹((1+c)/2))`.
    ///
    /// Returns `None` if `confidence` is outside `(0, 1)`.
    pub fn interval(&self, confidence: f64) -> Option<(f64, f64)> {
        if confidence.is_nan() || confidence <= 0.0 || confidence >= 1.0 {
            return None;
        }
        let tail = (1.0 - confidence) / 2.0;
        Some((self.quantile(tail)?, self.quantile(1.0 - tail)?))
    }

    /// Expands `[guess − s, guess + s]` until `h` changes sign across it.
    ///
    /// `h` must be increasing in `x`.
    fn bracket<H: Fn(f64) -> f64>(&self, guess: f64, h: H) -> (f64, f64) {
        let mut step = self.std_dev().max(self.sigma * 1e-3);
        let mut lo = guess - step;
        let mut hi = guess + step;
        for _ in 0..200 {
            let below = h(lo) <= 0.0;
            let above = h(hi) >= 0.0;
            if below && above {
                break;
            }
            step *= 2.0;
            if !below {
                lo = guess - step;
            }
            if !above {
                hi = guess + step;
            }
        }
        (lo, hi)
    }
}

impl Distribution<f64> for SkewNormal {
    /// Draws via the additive representation: with `U₀, V ~ N(0,1)`,
    /// `U₁ = δU₀ + √(1−δ²)V` and `Z = U₁` if `U₀ ≥ 0` else `−U₁`.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let d = self.delta();
        let u0: f64 = rng.sample(StandardNormal);
        let v: f64 = rng.sample(StandardNormal);
        let u1 = d * u0 + (1.0 - d * d).sqrt() * v;
        let z = if u0 >= 0.0 { u1 } else { -u1 };
        self.mu + self.sigma * z
    }
}

/// Peak condition of the standard skew-normal density.
///
/// `g(a) = α·φ(αa) − a·Φ(αa)` is zero exactly at the standardized mode.
pub fn mode_condition(alpha: f64, a: f64) -> f64 {
    alpha * special::standard_normal_pdf(alpha * a) - a * special::standard_normal_cdf(alpha * a)
}

/// Standardized mode of SN(0, 1, α).
///
/// The root of [`mode_condition`] lies in `[0, 1)` for `α > 0` and, by the
/// reflection `mode(−α) = −mode(α)`, in `(−1, 0]` for `α < 0`.
pub fn standardized_mode(alpha: f64) -> f64 {
    if alpha == 0.0 || !alpha.is_finite() {
        return 0.0;
    }
    let a = alpha.abs();
    let root = roots::brent(|t| mode_condition(a, t), 0.0, 1.0, 1e-15, 200).unwrap_or(0.0);
    root.copysign(alpha)
}

// ============================================================================
// Tests
// ============================================================================
