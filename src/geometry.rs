//! Geometry-improving step selection.
//!
//! When the trust-region iteration stalls and the sample set has drifted away
//! from the best point, one point of the set is moved to restore poisedness.
//! The replacement step of length about `delbar` is chosen to make the
//! Lagrange function of the dropped point large in absolute value at the new
//! location, which keeps the denominator of the rank-two updating formula
//! away from zero.
//!
//! Two candidate directions are examined: the gradient of the Lagrange
//! function at the best point and the line through the best point and the
//! point being dropped. Along each, the sign of the full-length step is
//! chosen to maximize the absolute Lagrange value, and the better of the two
//! steps wins.

use log::debug;
use nalgebra::{ComplexField, DimName, Dyn, OVector, RealField, U1};
use num_traits::{One, Zero};

use crate::hmat::HMatrix;
use crate::model::InterpolationSet;

pub(crate) fn improving_step<T: RealField + Copy>(
    set: &InterpolationSet<T>,
    h: &HMatrix<T>,
    knew: usize,
    delbar: T,
) -> OVector<T, Dyn> {
    let n = set.n();
    let npt = set.npt();
    let xopt = set.xopt();

    // Coefficients of the Lagrange function of the dropped point: implicit
    // Hessian weights and the gradient at the best point.
    let weights = h.omega_col(knew);
    let mut glag = h.point_gradient(knew);
    for j in 0..npt {
        let yj = set.xpt().column(j);
        let scale = weights[j] * yj.dot(&xopt);
        glag.axpy(scale, &yj, T::one());
    }

    let hlag_mul = |u: &OVector<T, Dyn>| -> OVector<T, Dyn> {
        let mut out = OVector::zeros_generic(Dyn(n), U1::name());
        for j in 0..npt {
            let yj = set.xpt().column(j);
            let scale = weights[j] * yj.dot(u);
            out.axpy(scale, &yj, T::one());
        }
        out
    };

    // |l(xopt + alpha u)| maximized over the segment of length delbar; l
    // vanishes at xopt because knew differs from kopt.
    let best_along = |u: &OVector<T, Dyn>| -> Option<(T, OVector<T, Dyn>)> {
        let unorm = u.norm();
        if unorm == T::zero() || !unorm.is_finite() {
            return None;
        }
        let half: T = nalgebra::convert(0.5);
        let gu = glag.dot(u);
        let uhu = u.dot(&hlag_mul(u));
        let bound = delbar / unorm;

        let value = |alpha: T| alpha * gu + half * alpha * alpha * uhu;

        // The full step length is kept in both directions; a longer step is
        // always at least as good for the poisedness of the set.
        let forward = value(bound).abs();
        let backward = value(-bound).abs();
        let (best_value, best) = if forward >= backward {
            (forward, bound)
        } else {
            (backward, -bound)
        };

        if best_value == T::zero() {
            return None;
        }
        Some((best_value, u.scale(best)))
    };

    let along_gradient = best_along(&glag);
    let mut line = set.xpt().column(knew).clone_owned();
    line -= &xopt;
    let along_line = best_along(&line);

    let step = match (along_gradient, along_line) {
        (Some((vg, dg)), Some((vl, dl))) => {
            if vg >= vl {
                debug!("geometry step along the Lagrange gradient, |l| = {}", vg);
                dg
            } else {
                debug!("geometry step along the line to the dropped point, |l| = {}", vl);
                dl
            }
        }
        (Some((vg, dg)), None) => {
            debug!("geometry step along the Lagrange gradient, |l| = {}", vg);
            dg
        }
        (None, Some((vl, dl))) => {
            debug!("geometry step along the line to the dropped point, |l| = {}", vl);
            dl
        }
        (None, None) => {
            // Degenerate Lagrange data. Move the dropped point to distance
            // delbar from the best point anyway.
            let lnorm = line.norm();
            if lnorm > T::zero() {
                line.scale(delbar / lnorm)
            } else {
                let mut fallback = OVector::zeros_generic(Dyn(n), U1::name());
                fallback[0] = delbar;
                fallback
            }
        }
    };

    step
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::DVector;

    use crate::initial;
    use crate::testing::Sphere;

    #[test]
    fn step_length_is_delbar() {
        let n = 3;
        let f = Sphere::new(n);
        let x0 = DVector::from_element(n, 1.0);
        let init = initial::build(&f, &x0, 0.5, 2 * n + 1, 1000, f64::NEG_INFINITY);
        assert!(init.status.is_none());

        let knew = init.set.farthest_from_opt();
        let delbar = 0.25;
        let d = improving_step(&init.set, &init.hmat, knew, delbar);

        // Both candidate segments have the trust length, so the chosen step
        // must have it as well.
        assert!((d.norm() - delbar).abs() <= 1e-12 * delbar.max(1.0));
    }

    #[test]
    fn lagrange_value_is_significant() {
        let n = 2;
        let f = Sphere::new(n);
        let x0 = DVector::from_element(n, 0.0);
        let init = initial::build(&f, &x0, 1.0, 2 * n + 1, 1000, f64::NEG_INFINITY);
        assert!(init.status.is_none());

        let set = init.set;
        let h = init.hmat;
        let knew = set.farthest_from_opt();
        let d = improving_step(&set, &h, knew, 0.5);

        let (vlag, _) = h.lagrange_values(&set, &d);
        assert!(vlag[knew].abs() > 1e-3);
    }
}
