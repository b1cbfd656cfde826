//! Root finding and small nonlinear systems.
//!
//! - [`brent`] — bracketed scalar root finder.
//! - [`newton_bracketed`] — Newton–Raphson with bisection fallback, for
//!   inverting monotone functions such as CDFs.
//! - [`newton_system`] — damped Newton for square systems `F(x) = 0`.
//! - [`levenberg_marquardt`] — minimizes `½‖F(x)‖²`.
//!
//! The system solvers work on fixed-size arrays (`[f64; N]`) and build the
//! Jacobian by forward differences, so callers only supply the residual
//! function. Neither solver fails: both return the best point found
//! together with a [`SolveReport`] describing how the iteration ended.

use serde::{Deserialize, Serialize};

/// Tunables shared by the system solvers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Maximum number of outer iterations.
    pub max_iterations: usize,
    /// Convergence threshold on the max-norm of the residual vector.
    pub tolerance: f64,
    /// Relative forward-difference step (√ε by default).
    pub jacobian_step: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            jacobian_step: f64::EPSILON.sqrt(),
        }
    }
}

/// Why a system solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Residual max-norm fell below the tolerance.
    Converged,
    /// Iteration budget exhausted.
    MaxIterations,
    /// No step could reduce the residual any further.
    Stalled,
    /// The residual function was not finite at the starting point.
    NonFinite,
}

/// Outcome of a system solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport<const N: usize> {
    /// Best point found.
    pub x: [f64; N],
    /// Residual vector at `x`.
    pub residuals: [f64; N],
    /// Outer iterations performed.
    pub iterations: usize,
    /// How the iteration ended.
    pub termination: Termination,
}

impl<const N: usize> SolveReport<N> {
    /// Euclidean norm of the residual vector.
    pub fn residual_norm(&self) -> f64 {
        self.residuals.iter().map(|r| r * r).sum::<f64>().sqrt()
    }

    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

// ============================================================================
// Scalar roots
// ============================================================================

/// Brent's method for a root of `f` in `[lo, hi]`.
///
/// Combines bisection, secant and inverse quadratic interpolation; it
/// never leaves the bracket and converges superlinearly on smooth `f`.
///
/// Reference: Brent (1973), *Algorithms for Minimization without
/// Derivatives*, Chapter 4; Press et al. (2007), *Numerical Recipes*, §9.3.
///
/// # Returns
/// - `None` if `f(lo)` and `f(hi)` have the same sign or either is NaN.
///
/// # Examples
/// ```
/// use stellarprop::roots::brent;
/// let root = brent(|x| x * x - 2.0, 0.0, 2.0, 1e-14, 100).unwrap();
/// assert!((root - 2.0_f64.sqrt()).abs() < 1e-12);
/// ```
pub fn brent<F: Fn(f64) -> f64>(
    f: F,
    lo: f64,
    hi: f64,
    tol: f64,
    max_iter: usize,
) -> Option<f64> {
    let (mut a, mut b) = (lo, hi);
    let (mut fa, mut fb) = (f(a), f(b));
    if fa.is_nan() || fb.is_nan() {
        return None;
    }
    if fa == 0.0 {
        return Some(a);
    }
    if fb == 0.0 {
        return Some(b);
    }
    if fa.signum() == fb.signum() {
        return None;
    }

    let (mut c, mut fc) = (b, fb);
    let mut d = b - a;
    let mut e = d;

    for _ in 0..max_iter {
        if fb.signum() == fc.signum() {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * tol;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0.0 {
            return Some(b);
        }

        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                (2.0 * xm * s, 1.0 - s)
            } else {
                let q0 = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * xm * q0 * (q0 - r) - (b - a) * (r - 1.0)),
                    (q0 - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        b += if d.abs() > tol1 { d } else { tol1.copysign(xm) };
        fb = f(b);
    }
    Some(b)
}

/// Solves `g(x) = target` for monotone non-decreasing `g` with derivative
/// `dg`, starting from `x0` inside the bracket `[lo, hi]`.
///
/// Newton steps that leave the current bracket are replaced by bisection,
/// so the iteration cannot diverge. The caller must ensure
/// `g(lo) ≤ target ≤ g(hi)`.
pub fn newton_bracketed<G, D>(g: G, dg: D, target: f64, x0: f64, lo: f64, hi: f64) -> f64
where
    G: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
{
    const MAX_ITER: usize = 200;
    let (mut lo, mut hi) = (lo, hi);
    let mut x = x0.clamp(lo, hi);

    for _ in 0..MAX_ITER {
        let f = g(x) - target;
        if f == 0.0 {
            return x;
        }
        if f < 0.0 {
            lo = x;
        } else {
            hi = x;
        }
        if hi - lo <= 4.0 * f64::EPSILON * x.abs().max(f64::MIN_POSITIVE) {
            break;
        }

        let slope = dg(x);
        let candidate = if slope > 0.0 && slope.is_finite() {
            x - f / slope
        } else {
            f64::NAN
        };
        let next = if candidate > lo && candidate < hi {
            candidate
        } else {
            0.5 * (lo + hi)
        };
        if (next - x).abs() <= 2.0 * f64::EPSILON * x.abs() {
            return next;
        }
        x = next;
    }
    x
}

// ============================================================================
// Nonlinear systems
// ============================================================================

/// Damped Newton iteration for `F(x) = 0` with `N` equations and unknowns.
///
/// Each iteration solves `J·δ = −F` and backtracks along `δ` until the
/// squared residual decreases. When the Jacobian is singular or
/// backtracking fails, a Levenberg–Marquardt step is tried instead before
/// giving up with [`Termination::Stalled`].
///
/// # Examples
/// ```
/// use stellarprop::roots::{newton_system, SolverSettings};
/// let report = newton_system(
///     |x: &[f64; 2]| [x[0] * x[0] + x[1] * x[1] - 4.0, x[0] - x[1]],
///     [1.0, 0.5],
///     &SolverSettings::default(),
/// );
/// assert!(report.converged());
/// assert!((report.x[0] - 2.0_f64.sqrt()).abs() < 1e-9);
/// ```
pub fn newton_system<const N: usize, F>(
    f: F,
    x0: [f64; N],
    settings: &SolverSettings,
) -> SolveReport<N>
where
    F: Fn(&[f64; N]) -> [f64; N],
{
    let mut x = x0;
    let mut r = f(&x);
    if !all_finite(&r) {
        return report(x, r, 0, Termination::NonFinite);
    }
    let mut cost = half_sq(&r);

    for iter in 0..settings.max_iterations {
        if max_abs(&r) < settings.tolerance {
            return report(x, r, iter, Termination::Converged);
        }
        let jac = jacobian(&f, &x, &r, settings.jacobian_step);

        let mut accepted = false;
        if let Some(step) = solve_linear(jac, r.map(|v| -v)) {
            let mut scale = 1.0;
            for _ in 0..40 {
                let trial = add_scaled(&x, &step, scale);
                let tr = f(&trial);
                if all_finite(&tr) && half_sq(&tr) < cost {
                    x = trial;
                    r = tr;
                    cost = half_sq(&r);
                    accepted = true;
                    break;
                }
                scale *= 0.5;
            }
        }

        if !accepted {
            match marquardt_step(&f, &x, &jac, &r, cost, 1e-3) {
                Some((trial, tr, _)) => {
                    x = trial;
                    r = tr;
                    cost = half_sq(&r);
                }
                None => {
                    let termination = if max_abs(&r) < settings.tolerance {
                        Termination::Converged
                    } else {
                        Termination::Stalled
                    };
                    return report(x, r, iter + 1, termination);
                }
            }
        }
    }

    let termination = if max_abs(&r) < settings.tolerance {
        Termination::Converged
    } else {
        Termination::MaxIterations
    };
    report(x, r, settings.max_iterations, termination)
}

/// Levenberg–Marquardt minimization of `½‖F(x)‖²`.
///
/// Solves `(JᵀJ + λ·diag(JᵀJ))·δ = −Jᵀr` and adapts λ: divided by 10
/// after an accepted step, multiplied by 10 after a rejected one.
///
/// Reference: Marquardt (1963), "An Algorithm for Least-Squares
/// Estimation of Nonlinear Parameters", *J. SIAM* 11(2).
pub fn levenberg_marquardt<const N: usize, F>(
    f: F,
    x0: [f64; N],
    settings: &SolverSettings,
) -> SolveReport<N>
where
    F: Fn(&[f64; N]) -> [f64; N],
{
    let mut x = x0;
    let mut r = f(&x);
    if !all_finite(&r) {
        return report(x, r, 0, Termination::NonFinite);
    }
    let mut cost = half_sq(&r);
    let mut lambda = 1e-3;

    for iter in 0..settings.max_iterations {
        if max_abs(&r) < settings.tolerance {
            return report(x, r, iter, Termination::Converged);
        }
        let jac = jacobian(&f, &x, &r, settings.jacobian_step);
        match marquardt_step(&f, &x, &jac, &r, cost, lambda) {
            Some((trial, tr, used)) => {
                x = trial;
                r = tr;
                cost = half_sq(&r);
                lambda = (used / 10.0).max(1e-12);
            }
            None => {
                let termination = if max_abs(&r) < settings.tolerance {
                    Termination::Converged
                } else {
                    Termination::Stalled
                };
                return report(x, r, iter + 1, termination);
            }
        }
    }

    let termination = if max_abs(&r) < settings.tolerance {
        Termination::Converged
    } else {
        Termination::MaxIterations
    };
    report(x, r, settings.max_iterations, termination)
}

/// Tries increasing damping until a step lowers the cost.
///
/// Returns the accepted point, its residuals and the λ that produced it.
fn marquardt_step<const N: usize, F>(
    f: &F,
    x: &[f64; N],
    jac: &[[f64; N]; N],
    r: &[f64; N],
    cost: f64,
    lambda: f64,
) -> Option<([f64; N], [f64; N], f64)>
where
    F: Fn(&[f64; N]) -> [f64; N],
{
    const LAMBDA_MAX: f64 = 1e16;

    // JᵀJ and Jᵀr; jac[i][j] = ∂F_i/∂x_j
    let mut jtj = [[0.0; N]; N];
    let mut jtr = [0.0; N];
    for a in 0..N {
        for b in 0..N {
            jtj[a][b] = (0..N).map(|i| jac[i][a] * jac[i][b]).sum();
        }
        jtr[a] = (0..N).map(|i| jac[i][a] * r[i]).sum();
    }

    let mut lambda = lambda;
    while lambda <= LAMBDA_MAX {
        let mut damped = jtj;
        for (k, row) in damped.iter_mut().enumerate() {
            row[k] += lambda * jtj[k][k].max(1e-12);
        }
        if let Some(step) = solve_linear(damped, jtr.map(|v| -v)) {
            let trial = add_scaled(x, &step, 1.0);
            let tr = f(&trial);
            if all_finite(&tr) && half_sq(&tr) < cost {
                return Some((trial, tr, lambda));
            }
        }
        lambda *= 10.0;
    }
    None
}

/// Forward-difference Jacobian, `jac[i][j] = ∂F_i/∂x_j`.
fn jacobian<const N: usize, F>(f: &F, x: &[f64; N], r: &[f64; N], step: f64) -> [[f64; N]; N]
where
    F: Fn(&[f64; N]) -> [f64; N],
{
    let mut jac = [[0.0; N]; N];
    for j in 0..N {
        let h = if x[j] == 0.0 { step } else { step * x[j].abs() };
        let mut shifted = *x;
        shifted[j] += h;
        // Exact representable step
        let h = shifted[j] - x[j];
        let rs = f(&shifted);
        for i in 0..N {
            jac[i][j] = (rs[i] - r[i]) / h;
        }
    }
    jac
}

/// Gaussian elimination with partial pivoting. `None` if singular.
fn solve_linear<const N: usize>(mut a: [[f64; N]; N], mut b: [f64; N]) -> Option<[f64; N]> {
    for col in 0..N {
        let pivot = (col..N).max_by(|&p, &q| a[p][col].abs().total_cmp(&a[q][col].abs()))?;
        if !(a[pivot][col].abs() > 1e-300) {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..N {
            let factor = a[row][col] / a[col][col];
            for k in col..N {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; N];
    for row in (0..N).rev() {
        let tail: f64 = (row + 1..N).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    if all_finite(&x) {
        Some(x)
    } else {
        None
    }
}

fn report<const N: usize>(
    x: [f64; N],
    residuals: [f64; N],
    iterations: usize,
    termination: Termination,
) -> SolveReport<N> {
    tracing::debug!(?termination, iterations, ?x, "system solve finished");
    SolveReport {
        x,
        residuals,
        iterations,
        termination,
    }
}

fn add_scaled<const N: usize>(x: &[f64; N], step: &[f64; N], scale: f64) -> [f64; N] {
    let mut out = *x;
    for (o, s) in out.iter_mut().zip(step.iter()) {
        *o += scale * s;
    }
    out
}

fn half_sq<const N: usize>(r: &[f64; N]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

fn max_abs<const N: usize>(r: &[f64; N]) -> f64 {
    r.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}

fn all_finite<const N: usize>(r: &[f64; N]) -> bool {
    r.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- brent ---

    #[test]
    fn test_brent_cubic() {
        let root = brent(|x| x * x * x - x - 2.0, 1.0, 2.0, 1e-14, 100).unwrap();
        assert!((root * root * root - root - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_brent_requires_bracket() {
        assert_eq!(brent(|x| x * x + 1.0, -1.0, 1.0, 1e-12, 100), None);
        assert_eq!(brent(|_| f64::NAN, -1.0, 1.0, 1e-12, 100), None);
    }

    #[test]
    fn test_brent_endpoint_root() {
        assert_eq!(brent(|x| x - 1.0, 1.0, 3.0, 1e-12, 100), Some(1.0));
    }

    // --- newton_bracketed ---

    #[test]
    fn test_newton_bracketed_inverts_exp() {
        let x = newton_bracketed(f64::exp, f64::exp, 5.0, 0.0, -10.0, 10.0);
        assert!((x - 5.0_f64.ln()).abs() < 1e-13);
    }

    #[test]
    fn test_newton_bracketed_flat_derivative_falls_back() {
        // derivative reported as zero everywhere forces pure bisection
        let x = newton_bracketed(|x| x, |_| 0.0, 0.3, 0.9, 0.0, 1.0);
        assert!((x - 0.3).abs() < 1e-12);
    }

    // --- newton_system ---

    #[test]
    fn test_newton_linear_system() {
        let report = newton_system(
            |x: &[f64; 3]| {
                [
                    2.0 * x[0] + x[1] - 3.0,
                    x[1] - x[2] + 1.0,
                    x[0] + x[2] - 4.0,
                ]
            },
            [0.0, 0.0, 0.0],
            &SolverSettings::default(),
        );
        assert!(report.converged());
        assert!(report.x[0].abs() < 1e-9);
        assert!((report.x[1] - 3.0).abs() < 1e-9);
        assert!((report.x[2] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_newton_rejects_nonfinite_start() {
        let report = newton_system(
            |x: &[f64; 1]| [x[0].ln()],
            [-1.0],
            &SolverSettings::default(),
        );
        assert_eq!(report.termination, Termination::NonFinite);
        assert!(!report.converged());
    }

    #[test]
    fn test_newton_reports_unsolvable_system() {
        // x² + 1 = 0 has no real root
        let report = newton_system(
            |x: &[f64; 1]| [x[0] * x[0] + 1.0],
            [0.7],
            &SolverSettings::default(),
        );
        assert!(!report.converged());
        assert!(report.residual_norm() >= 1.0 - 1e-9);
    }

    #[test]
    fn test_newton_steps_back_into_domain() {
        // Full Newton step from x=10 lands on negative x where ln is NaN.
        let report = newton_system(
            |x: &[f64; 1]| [x[0].ln() + x[0] - 1.0],
            [10.0],
            &SolverSettings::default(),
        );
        assert!(report.converged());
        assert!((report.x[0] - 1.0).abs() < 1e-9);
    }

    // --- levenberg_marquardt ---

    #[test]
    fn test_lm_rosenbrock_residuals() {
        // F = (10(y − x²), 1 − x); minimum at (1, 1)
        let report = levenberg_marquardt(
            |p: &[f64; 2]| [10.0 * (p[1] - p[0] * p[0]), 1.0 - p[0]],
            [-1.2, 1.0],
            &SolverSettings::default(),
        );
        assert!(report.converged(), "{report:?}");
        assert!((report.x[0] - 1.0).abs() < 1e-8);
        assert!((report.x[1] - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_lm_stalls_at_least_squares_minimum() {
        // Inconsistent system: x = 1 and x = 3 → best fit x = 2
        let report = levenberg_marquardt(
            |p: &[f64; 2]| [p[0] - 1.0, p[0] - 3.0],
            [0.0, 0.0],
            &SolverSettings::default(),
        );
        assert!(!report.converged());
        assert!((report.x[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_solve_linear_singular() {
        assert!(solve_linear([[1.0, 2.0], [2.0, 4.0]], [1.0, 2.0]).is_none());
        let x = solve_linear([[0.0, 1.0], [1.0, 0.0]], [2.0, 3.0]).unwrap();
        assert_eq!(x, [3.0, 2.0]);
    }
}
