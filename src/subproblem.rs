//! Approximate solver for the trust-region subproblem.
//!
//! Minimizes the quadratic model around the best point subject to the trust
//! region `|| d || <= delta` by the truncated conjugate-gradient method. The
//! iteration is stopped on the trust-region boundary, on non-positive
//! curvature or when the residual has dropped below the relative tolerance.
//! Only Hessian-vector products of the model are needed, so the implicit
//! part of the Hessian is never formed.

use log::debug;
use nalgebra::{ComplexField, DimName, Dyn, OVector, RealField, U1};
use num_traits::{One, Zero};

use crate::model::{InterpolationSet, QuadraticModel};

pub(crate) struct TrsStep<T: RealField + Copy> {
    /// The step from the best point, `|| d || <= delta`.
    pub d: OVector<T, Dyn>,
    /// Lower bound on the model curvature along the explored directions, or
    /// zero when the boundary was reached or non-positive curvature was seen.
    pub crvmin: T,
}

pub(crate) fn solve<T: RealField + Copy>(
    set: &InterpolationSet<T>,
    model: &QuadraticModel<T>,
    gopt: &OVector<T, Dyn>,
    delta: T,
    tol: T,
) -> TrsStep<T> {
    let n = set.n();
    let mut d = OVector::zeros_generic(Dyn(n), U1::name());

    let gnorm = gopt.norm();
    if gnorm == T::zero() || !gnorm.is_finite() {
        return TrsStep {
            d,
            crvmin: T::zero(),
        };
    }

    let mut r = gopt.clone_owned();
    let mut p = -r.clone_owned();
    let mut rr = r.norm_squared();
    let mut crvmin = T::zero();
    let mut crv_seen = false;

    for iter in 0..n {
        let hp = model.hess_mul(set, &p);
        let php = p.dot(&hp);
        let pp = p.norm_squared();

        if php <= T::zero() {
            // Non-positive curvature along p. The model is unbounded in this
            // direction, so the minimizer lies on the boundary.
            let tau = boundary_step(&d, &p, delta);
            d.axpy(tau, &p, T::one());
            debug!("negative curvature at CG iteration {}, going to boundary", iter);
            return TrsStep {
                d,
                crvmin: T::zero(),
            };
        }

        crvmin = if crv_seen {
            crvmin.min(php / pp)
        } else {
            crv_seen = true;
            php / pp
        };

        let alpha = rr / php;
        let dp = d.dot(&p);
        let dd = d.norm_squared();
        let next_normsq = dd + alpha * (dp + dp) + alpha * alpha * pp;

        if next_normsq >= delta * delta {
            // The unconstrained CG step leaves the trust region.
            let tau = boundary_step(&d, &p, delta);
            d.axpy(tau, &p, T::one());
            debug!("trust-region boundary reached at CG iteration {}", iter);
            return TrsStep {
                d,
                crvmin: T::zero(),
            };
        }

        d.axpy(alpha, &p, T::one());
        r.axpy(alpha, &hp, T::one());
        let rr_next = r.norm_squared();

        if rr_next.sqrt() <= tol * gnorm {
            break;
        }

        let beta = rr_next / rr;
        p *= beta;
        p -= &r;
        rr = rr_next;
    }

    TrsStep { d, crvmin }
}

/// The positive root of `|| d + tau p || = delta`.
///
/// With `a = || p ||^2`, `b = d'p` and `-c = delta^2 - || d ||^2 >= 0`, the
/// root is computed from Muller's formula when `b > 0` to avoid a possible
/// catastrophic cancellation in the quadratic formula.
fn boundary_step<T: RealField + Copy>(d: &OVector<T, Dyn>, p: &OVector<T, Dyn>, delta: T) -> T {
    let a = p.norm_squared();
    if a == T::zero() {
        return T::zero();
    }
    let b = d.dot(p);
    let c_neg = delta * delta - d.norm_squared();
    let disc = (b * b + a * c_neg).sqrt();
    if b <= T::zero() {
        (-b + disc) / a
    } else {
        c_neg / (b + disc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::{dvector, DVector};

    use crate::initial;
    use crate::testing::Sphere;

    fn quadratic_state(n: usize) -> (InterpolationSet<f64>, QuadraticModel<f64>) {
        let f = Sphere::new(n);
        let x0 = DVector::from_element(n, 1.0);
        let init = initial::build(&f, &x0, 0.5, 2 * n + 1, 1000, f64::NEG_INFINITY);
        assert!(init.status.is_none());
        (init.set, init.model)
    }

    #[test]
    fn step_stays_in_trust_region() {
        let (set, model) = quadratic_state(4);
        let gopt = model.grad_at_opt(&set);

        for delta in [1e-3, 0.1, 10.0] {
            let step = solve(&set, &model, &gopt, delta, 1e-2);
            assert!(step.d.norm() <= delta * (1.0 + 1e-12));
        }
    }

    #[test]
    fn reduction_is_nonnegative_on_convex_model() {
        let (set, model) = quadratic_state(4);
        let gopt = model.grad_at_opt(&set);

        let step = solve(&set, &model, &gopt, 0.5, 1e-2);
        let qred = model.reduction(&set, &gopt, &step.d);
        assert!(qred >= 0.0);
    }

    #[test]
    fn interior_solution_has_positive_crvmin() {
        let (set, model) = quadratic_state(3);
        let gopt = model.grad_at_opt(&set);

        // The sphere minimizer is within this radius, so CG converges in the
        // interior and reports the curvature of the model.
        let step = solve(&set, &model, &gopt, 100.0, 1e-2);
        assert!(step.d.norm() < 100.0);
        let crvmin: f64 = step.crvmin;
        assert!(crvmin > 0.0);
    }

    #[test]
    fn zero_gradient_returns_zero_step() {
        let (set, model) = quadratic_state(3);
        let gopt = dvector![0.0, 0.0, 0.0];

        let step = solve(&set, &model, &gopt, 1.0, 1e-2);
        assert_eq!(step.d.norm(), 0.0);
        assert_eq!(step.crvmin, 0.0);
    }
}
