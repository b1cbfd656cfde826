//! Skew-normal distributions matched to reported quantiles.
//!
//! Given a measurement reported as `(lower, central, upper)` with known
//! cumulative probabilities (by default the 1σ triple `0.16, 0.5, 0.84`),
//! [`fit_skew_normal`] finds the `(μ, σ, α)` of a skew-normal whose
//! quantiles reproduce it. The central value can be matched either as the
//! median or as the mode (peak) of the distribution.
//!
//! # Examples
//! ```
//! use stellarprop::confidence::QuantileTriple;
//! use stellarprop::skewfit::{fit_skew_normal, FitOptions};
//!
//! let xin = QuantileTriple::new(0.9, 1.0, 1.12);
//! let fit = fit_skew_normal(xin, &FitOptions::default());
//! assert!(fit.converged);
//! assert!(fit.params.alpha > 0.0); // longer upper tail
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::confidence::{ConfidenceTriple, QuantileTriple};
use crate::distributions::{mode_condition, SkewNormal};
use crate::error::Error;
use crate::roots::{self, SolveReport, SolverSettings, Termination};

/// Which system of equations pins down the three parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FitMode {
    /// Central value is the mode; bounds are matched through the CDF.
    Peak,
    /// `F(x_i) = c_i` for all three points, solved as a root-find.
    #[default]
    MedianExact,
    /// Same residuals as [`MedianExact`](Self::MedianExact), minimized in
    /// the least-squares sense.
    MedianLeastSquares,
    /// `F⁻¹(c_i) = x_i`, i.e. residuals measured in data units.
    SurvivalFunction,
}

impl FitMode {
    /// Short selector name (`Peak`, `Med`, `Med2`, `SF`).
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMode::Peak => "Peak",
            FitMode::MedianExact => "Med",
            FitMode::MedianLeastSquares => "Med2",
            FitMode::SurvivalFunction => "SF",
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "peak" | "mode" => Ok(FitMode::Peak),
            "med" | "median" | "medianexact" => Ok(FitMode::MedianExact),
            "med2" | "medianleastsquares" => Ok(FitMode::MedianLeastSquares),
            "sf" | "survivalfunction" => Ok(FitMode::SurvivalFunction),
            _ => Err(Error::UnknownFitMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for FitMode {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FitMode> for String {
    fn from(mode: FitMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Location `mu`, scale `sigma` and shape `alpha` of a skew-normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkewNormalParams {
    pub mu: f64,
    pub sigma: f64,
    pub alpha: f64,
}

impl SkewNormalParams {
    pub fn new(mu: f64, sigma: f64, alpha: f64) -> Self {
        Self { mu, sigma, alpha }
    }

    /// Heuristic starting point: location at the central value, scale at
    /// half the interval width, shape from the interval asymmetry.
    pub fn initial_guess(xin: &QuantileTriple) -> Self {
        let half = xin.width() / 2.0;
        let (minus, plus) = xin.errors();
        Self::new(xin.central, half, (plus - minus) / half)
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.mu, self.sigma, self.alpha]
    }

    pub fn from_array(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }

    /// Builds the distribution, failing if `sigma <= 0` or any parameter
    /// is non-finite.
    pub fn to_distribution(&self) -> Result<SkewNormal, Error> {
        Ok(SkewNormal::new(self.mu, self.sigma, self.alpha)?)
    }
}

/// Inputs to [`fit_skew_normal`] besides the quantile triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Cumulative probabilities of `(lower, central, upper)`.
    pub confidence: ConfidenceTriple,
    /// Starting point; [`SkewNormalParams::initial_guess`] when absent.
    pub guess: Option<SkewNormalParams>,
    pub mode: FitMode,
    /// Compute [`FitDiagnostics`] for the solution.
    pub verify: bool,
    pub solver: SolverSettings,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            confidence: ConfidenceTriple::default(),
            guess: None,
            mode: FitMode::default(),
            verify: true,
            solver: SolverSettings::default(),
        }
    }
}

impl FitOptions {
    pub fn with_mode(mut self, mode: FitMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_guess(mut self, guess: SkewNormalParams) -> Self {
        self.guess = Some(guess);
        self
    }

    pub fn with_confidence(mut self, confidence: ConfidenceTriple) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Properties recomputed from a fitted distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub mode: f64,
    pub median: f64,
    /// Central interval of mass `cu − cl`.
    pub interval: (f64, f64),
    /// `cu − cl`.
    pub interval_width: f64,
    /// `mode − lower` of the input triple.
    pub below_mode: f64,
    /// `upper − mode` of the input triple.
    pub above_mode: f64,
}

/// Outcome of [`fit_skew_normal`].
#[derive(Debug, Clone, PartialEq)]
pub struct SkewNormalFit {
    /// Best parameters found, whether or not the solve converged.
    pub params: SkewNormalParams,
    /// Residuals of the selected equation system at `params`.
    pub residuals: [f64; 3],
    /// Euclidean norm of `residuals`.
    pub residual_norm: f64,
    /// Residual max-norm fell below the solver tolerance.
    pub converged: bool,
    pub iterations: usize,
    pub termination: Termination,
    /// Present when verification was requested and `params` describe a
    /// valid distribution.
    pub diagnostics: Option<FitDiagnostics>,
}

impl SkewNormalFit {
    /// The fitted distribution, or `None` if `params` are invalid.
    pub fn distribution(&self) -> Option<SkewNormal> {
        self.params.to_distribution().ok()
    }
}

/// Fits a skew-normal to a quantile triple.
///
/// Never fails: a solve that does not reach the tolerance is returned with
/// `converged = false` and its residuals, so the caller can retry with a
/// different [`FitOptions::guess`] or [`FitMode`].
pub fn fit_skew_normal(xin: QuantileTriple, options: &FitOptions) -> SkewNormalFit {
    let guess = options
        .guess
        .unwrap_or_else(|| SkewNormalParams::initial_guess(&xin));
    debug!(mode = %options.mode, ?xin, ?guess, "fitting skew-normal");

    let conf = options.confidence;
    let mode = options.mode;
    let system = |p: &[f64; 3]| residuals(mode, &xin, &conf, p);

    let report: SolveReport<3> = match mode {
        FitMode::MedianLeastSquares => {
            roots::levenberg_marquardt(system, guess.as_array(), &options.solver)
        }
        FitMode::Peak | FitMode::MedianExact | FitMode::SurvivalFunction => {
            roots::newton_system(system, guess.as_array(), &options.solver)
        }
    };

    let params = SkewNormalParams::from_array(report.x);
    let diagnostics = if options.verify {
        params
            .to_distribution()
            .ok()
            .map(|dist| verify(&dist, &xin, &conf))
    } else {
        None
    };
    if let Some(d) = &diagnostics {
        debug!(
            mode = d.mode,
            median = d.median,
            interval_lo = d.interval.0,
            interval_hi = d.interval.1,
            interval_width = d.interval_width,
            below_mode = d.below_mode,
            above_mode = d.above_mode,
            "skew-normal fit diagnostics"
        );
    }

    SkewNormalFit {
        params,
        residuals: report.residuals,
        residual_norm: report.residual_norm(),
        converged: report.converged(),
        iterations: report.iterations,
        termination: report.termination,
        diagnostics,
    }
}

fn residuals(mode: FitMode, xin: &QuantileTriple, conf: &ConfidenceTriple, p: &[f64; 3]) -> [f64; 3] {
    let Ok(dist) = SkewNormal::new(p[0], p[1], p[2]) else {
        return [f64::NAN; 3];
    };
    let x = xin.as_array();
    let c = conf.as_array();

    match mode {
        FitMode::Peak => {
            let t = (xin.central - p[0]) / p[1];
            [
                dist.cdf(xin.lower) - conf.lower,
                dist.cdf(xin.upper) - conf.upper,
                mode_condition(p[2], t),
            ]
        }
        FitMode::MedianExact | FitMode::MedianLeastSquares => {
            std::array::from_fn(|i| dist.cdf(x[i]) - c[i])
        }
        FitMode::SurvivalFunction => {
            // data units, normalized to the interval half-width
            let half = xin.width() / 2.0;
            let scale = if half > 0.0 { half } else { 1.0 };
            std::array::from_fn(|i| {
                dist.isf(1.0 - c[i])
                    .map_or(f64::NAN, |q| (q - x[i]) / scale)
            })
        }
    }
}

fn verify(dist: &SkewNormal, xin: &QuantileTriple, conf: &ConfidenceTriple) -> FitDiagnostics {
    let mode = dist.mode();
    let interval_width = conf.upper - conf.lower;
    FitDiagnostics {
        mode,
        median: dist.median(),
        interval: dist
            .interval(interval_width)
            .unwrap_or((f64::NAN, f64::NAN)),
        interval_width,
        below_mode: mode - xin.lower,
        above_mode: xin.upper - mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_cdf_matches(fit: &SkewNormalFit, xin: &QuantileTriple, conf: &ConfidenceTriple) {
        let dist = fit.distribution().unwrap();
        for (x, c) in xin.as_array().into_iter().zip(conf.as_array()) {
            assert!((dist.cdf(x) - c).abs() < 1e-6, "F({x}) = {} vs {c}", dist.cdf(x));
        }
    }

    #[test]
    fn test_parse_fit_mode() {
        assert_eq!("Peak".parse::<FitMode>().unwrap(), FitMode::Peak);
        assert_eq!("Med".parse::<FitMode>().unwrap(), FitMode::MedianExact);
        assert_eq!("med2".parse::<FitMode>().unwrap(), FitMode::MedianLeastSquares);
        assert_eq!("SF".parse::<FitMode>().unwrap(), FitMode::SurvivalFunction);
        assert_eq!(
            "SurvivalFunction".parse::<FitMode>().unwrap(),
            FitMode::SurvivalFunction
        );
        assert!(matches!(
            "Mean".parse::<FitMode>(),
            Err(Error::UnknownFitMode(s)) if s == "Mean"
        ));
    }

    #[test]
    fn test_fit_mode_display_roundtrip() {
        for mode in [
            FitMode::Peak,
            FitMode::MedianExact,
            FitMode::MedianLeastSquares,
            FitMode::SurvivalFunction,
        ] {
            assert_eq!(mode.to_string().parse::<FitMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_initial_guess() {
        let g = SkewNormalParams::initial_guess(&QuantileTriple::new(1.0, 2.0, 4.0));
        assert_eq!(g.mu, 2.0);
        assert_eq!(g.sigma, 1.5);
        assert!((g.alpha - 2.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn test_symmetric_input_gives_normal() {
        let z = crate::special::inverse_normal_cdf(0.84);
        let xin = QuantileTriple::new(10.0 - 2.0 * z, 10.0, 10.0 + 2.0 * z);
        let fit = fit_skew_normal(xin, &FitOptions::default());
        assert!(fit.converged, "{fit:?}");
        assert_cdf_matches(&fit, &xin, &ConfidenceTriple::default());
        // ∂F/∂μ and ∂F/∂α are both ∝ φ(z) at α = 0, so μ and α trade off
        assert!((fit.params.mu - 10.0).abs() < 1e-2, "{:?}", fit.params);
        assert!((fit.params.sigma - 2.0).abs() < 1e-4, "{:?}", fit.params);
        assert!(fit.params.alpha.abs() < 1e-2, "{:?}", fit.params);
    }

    #[test]
    fn test_symmetric_input_with_close_guess() {
        let z = crate::special::inverse_normal_cdf(0.84);
        let xin = QuantileTriple::new(10.0 - 2.0 * z, 10.0, 10.0 + 2.0 * z);
        let options = FitOptions::default().with_guess(SkewNormalParams::new(10.0, 2.0, 0.0));
        let fit = fit_skew_normal(xin, &options);
        assert!(fit.converged, "{fit:?}");
        assert_eq!(fit.iterations, 0);
        assert_eq!(fit.params, SkewNormalParams::new(10.0, 2.0, 0.0));
    }

    #[test]
    fn test_median_exact_recovers_known_distribution() {
        let truth = SkewNormal::new(1.0, 0.3, 2.0).unwrap();
        let conf = ConfidenceTriple::default();
        let xin = QuantileTriple::new(
            truth.quantile(conf.lower).unwrap(),
            truth.quantile(conf.central).unwrap(),
            truth.quantile(conf.upper).unwrap(),
        );
        let fit = fit_skew_normal(xin, &FitOptions::default());
        assert!(fit.converged, "{fit:?}");
        assert!((fit.params.mu - 1.0).abs() < 1e-6, "{:?}", fit.params);
        assert!((fit.params.sigma - 0.3).abs() < 1e-6, "{:?}", fit.params);
        assert!((fit.params.alpha - 2.0).abs() < 1e-5, "{:?}", fit.params);
        assert_cdf_matches(&fit, &xin, &conf);
    }

    #[test]
    fn test_least_squares_matches_exact() {
        let xin = QuantileTriple::new(0.9, 1.0, 1.12);
        let exact = fit_skew_normal(xin, &FitOptions::default());
        let lsq = fit_skew_normal(
            xin,
            &FitOptions::default().with_mode(FitMode::MedianLeastSquares),
        );
        assert!(exact.converged && lsq.converged);
        for (a, b) in exact.params.as_array().into_iter().zip(lsq.params.as_array()) {
            assert!((a - b).abs() < 1e-6, "{:?} vs {:?}", exact.params, lsq.params);
        }
    }

    #[test]
    fn test_survival_function_mode() {
        let xin = QuantileTriple::new(0.9, 1.0, 1.12);
        let conf = ConfidenceTriple::default();
        let fit = fit_skew_normal(xin, &FitOptions::default().with_mode(FitMode::SurvivalFunction));
        assert!(fit.converged, "{fit:?}");
        assert_cdf_matches(&fit, &xin, &conf);
    }

    #[test]
    fn test_peak_mode_places_mode_at_central() {
        let xin = QuantileTriple::new(0.9, 1.0, 1.12);
        let fit = fit_skew_normal(xin, &FitOptions::default().with_mode(FitMode::Peak));
        assert!(fit.converged, "{fit:?}");
        let d = fit.diagnostics.unwrap();
        assert!((d.mode - 1.0).abs() < 1e-8, "{d:?}");
        assert!((d.below_mode - 0.1).abs() < 1e-8);
        assert!((d.above_mode - 0.12).abs() < 1e-8);
        // right-skewed: median sits above the mode
        assert!(d.median > d.mode);
    }

    #[test]
    fn test_diagnostics_reproduce_input() {
        let xin = QuantileTriple::new(0.9, 1.0, 1.12);
        let fit = fit_skew_normal(xin, &FitOptions::default());
        let d = fit.diagnostics.unwrap();
        assert!((d.median - 1.0).abs() < 1e-8);
        assert!((d.interval_width - 0.68).abs() < 1e-12);
        // central 68% interval of a skewed fit is not (0.16, 0.84) exactly,
        // but it must straddle the median
        assert!(d.interval.0 < d.median && d.median < d.interval.1);
    }

    #[test]
    fn test_verify_disabled() {
        let options = FitOptions {
            verify: false,
            ..FitOptions::default()
        };
        let fit = fit_skew_normal(QuantileTriple::new(0.9, 1.0, 1.12), &options);
        assert!(fit.diagnostics.is_none());
    }

    #[test]
    fn test_degenerate_input_reports_failure() {
        let fit = fit_skew_normal(QuantileTriple::new(1.0, 1.0, 1.0), &FitOptions::default());
        assert!(!fit.converged);
        assert_eq!(fit.termination, Termination::NonFinite);
        assert!(fit.diagnostics.is_none());
    }

    #[test]
    fn test_options_serde_defaults() {
        let opts: FitOptions = serde_json::from_str(r#"{"mode": "Peak"}"#).unwrap();
        assert_eq!(opts.mode, FitMode::Peak);
        assert!(opts.verify);
        assert_eq!(opts.confidence, ConfidenceTriple::default());

        let bad = serde_json::from_str::<FitOptions>(r#"{"mode": "Mean"}"#);
        assert!(bad.is_err());
    }
}
