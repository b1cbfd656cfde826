//! # stellarprop
//!
//! Statistical utilities for propagating stellar parameter uncertainties.
//!
//! Two tools sit on top of a small layer of numerical primitives:
//!
//! - **Skew-normal quantile matching**: turn an asymmetric measurement
//!   `x (+σ₊ −σ₋)` into a skew-normal `(μ, σ, α)` whose quantiles reproduce
//!   it ([`fit_skew_normal`]).
//! - **Mass-radius posterior resampling**: draw stellar radii for given
//!   masses from a stored trace of correlated regression coefficients plus
//!   intrinsic scatter ([`sample_posterior_radius`]).
//!
//! ## Modules
//!
//! - [`special`] — Normal CDF/PDF/inverse, erf, Owen's T function
//! - [`stats`] — Descriptive statistics and empirical quantiles
//! - [`distributions`] — The skew-normal distribution
//! - [`roots`] — Scalar root finding and small nonlinear systems
//! - [`confidence`] — Quantile triples and empirical confidence intervals
//! - [`skewfit`] — Skew-normal fits to quantile triples
//! - [`trace`] — Regression coefficient traces and their file format
//! - [`posterior`] — Mass-radius posterior resampler
//! - [`random`] — Seeded RNG and bootstrap draws
//! - [`error`] — Crate error type
//!
//! ## Design Philosophy
//!
//! - **Numerical stability first**: compensated summation, Welford
//!   variance, tail-accurate survival functions
//! - **Explicit randomness**: every sampler takes `&mut impl Rng`
//! - **Failures as values**: solvers report convergence instead of erroring
//! - **Property-based testing**: Mathematical invariants verified via proptest

pub mod confidence;
pub mod distributions;
pub mod error;
pub mod posterior;
pub mod random;
pub mod roots;
pub mod skewfit;
pub mod special;
pub mod stats;
pub mod trace;

pub use confidence::{confidence_interval, ConfidenceTriple, QuantileTriple};
pub use error::Error;
pub use posterior::{
    sample_posterior_radius, MassInput, RadiusSamples, RelationCatalog, RelationVariant,
    DEFAULT_SAMPLES,
};
pub use skewfit::{fit_skew_normal, FitMode, FitOptions, SkewNormalFit, SkewNormalParams};
