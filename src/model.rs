//! Interpolation set and quadratic interpolation model.
//!
//! The set stores the sample points as displacements from a shifting origin
//! `xbase` together with their function values. The model is the quadratic
//!
//! ```text
//! m(xbase + z) = m(xbase) + gq'z + 1/2 z'(hq + sum_k pq_k y_k y_k') z
//! ```
//!
//! where `y_k` are the columns of `xpt`. The Hessian is kept in two parts: an
//! explicit symmetric matrix `hq` and implicit weights `pq` of rank-one terms
//! over the sample points, which is the form in which the least-Frobenius-norm
//! updating produces it.

use log::debug;
use nalgebra::storage::Storage;
use nalgebra::{convert, ComplexField, DimName, Dyn, OMatrix, OVector, RealField, Vector, U1};
use num_traits::{One, Zero};

use crate::hmat::HMatrix;

/// The sample points of the interpolation problem and their function values.
pub(crate) struct InterpolationSet<T: RealField + Copy> {
    xbase: OVector<T, Dyn>,
    xpt: OMatrix<T, Dyn, Dyn>,
    fval: OVector<T, Dyn>,
    kopt: usize,
}

impl<T: RealField + Copy> InterpolationSet<T> {
    pub(crate) fn new(
        xbase: OVector<T, Dyn>,
        xpt: OMatrix<T, Dyn, Dyn>,
        fval: OVector<T, Dyn>,
        kopt: usize,
    ) -> Self {
        Self {
            xbase,
            xpt,
            fval,
            kopt,
        }
    }

    pub(crate) fn n(&self) -> usize {
        self.xpt.nrows()
    }

    pub(crate) fn npt(&self) -> usize {
        self.xpt.ncols()
    }

    pub(crate) fn kopt(&self) -> usize {
        self.kopt
    }

    pub(crate) fn set_kopt(&mut self, kopt: usize) {
        self.kopt = kopt;
    }

    pub(crate) fn xbase(&self) -> &OVector<T, Dyn> {
        &self.xbase
    }

    pub(crate) fn xpt(&self) -> &OMatrix<T, Dyn, Dyn> {
        &self.xpt
    }

    pub(crate) fn fval(&self) -> &OVector<T, Dyn> {
        &self.fval
    }

    pub(crate) fn fopt(&self) -> T {
        self.fval[self.kopt]
    }

    /// The displacement of the best point from `xbase`.
    pub(crate) fn xopt(&self) -> OVector<T, Dyn> {
        self.xpt.column(self.kopt).clone_owned()
    }

    pub(crate) fn distsq_to_opt(&self, k: usize) -> T {
        let mut sum = T::zero();
        for i in 0..self.n() {
            let diff = self.xpt[(i, k)] - self.xpt[(i, self.kopt)];
            sum += diff * diff;
        }
        sum
    }

    pub(crate) fn max_distsq_to_opt(&self) -> T {
        let mut max = T::zero();
        for k in 0..self.npt() {
            let distsq = self.distsq_to_opt(k);
            if distsq > max {
                max = distsq;
            }
        }
        max
    }

    /// The non-`kopt` point farthest from the best point.
    pub(crate) fn farthest_from_opt(&self) -> usize {
        let mut knew = if self.kopt == 0 { 1 } else { 0 };
        let mut max = self.distsq_to_opt(knew);
        for k in 0..self.npt() {
            if k == self.kopt {
                continue;
            }
            let distsq = self.distsq_to_opt(k);
            if distsq > max {
                max = distsq;
                knew = k;
            }
        }
        knew
    }

    /// Replaces point `knew` by the displacement `xnew` with value `f`.
    pub(crate) fn replace<S>(&mut self, knew: usize, xnew: &Vector<T, Dyn, S>, f: T)
    where
        S: Storage<T, Dyn>,
    {
        self.xpt.column_mut(knew).copy_from(xnew);
        self.fval[knew] = f;
    }

    /// Moves the origin to the current best point. The model and the H
    /// representation must be transformed *before* this is applied, because
    /// their transformations read the old displacements.
    pub(crate) fn apply_shift(&mut self, s: &OVector<T, Dyn>) {
        for k in 0..self.npt() {
            let mut col = self.xpt.column_mut(k);
            col -= s;
        }
        self.xbase += s;
    }

    pub(crate) fn any_not_finite(&self) -> bool {
        self.xpt.iter().any(|v| !v.is_finite()) || self.fval.iter().any(|v| !v.is_finite())
    }
}

/// The quadratic model interpolating the function values of the set.
pub(crate) struct QuadraticModel<T: RealField + Copy> {
    gq: OVector<T, Dyn>,
    hq: OMatrix<T, Dyn, Dyn>,
    pq: OVector<T, Dyn>,
    itest: u32,
}

impl<T: RealField + Copy> QuadraticModel<T> {
    pub(crate) fn new(gq: OVector<T, Dyn>, hq: OMatrix<T, Dyn, Dyn>, pq: OVector<T, Dyn>) -> Self {
        Self {
            gq,
            hq,
            pq,
            itest: 0,
        }
    }

    /// Multiplies the full model Hessian by `v`.
    pub(crate) fn hess_mul<S>(
        &self,
        set: &InterpolationSet<T>,
        v: &Vector<T, Dyn, S>,
    ) -> OVector<T, Dyn>
    where
        S: Storage<T, Dyn>,
    {
        let mut out = &self.hq * v;
        for k in 0..set.npt() {
            let yk = set.xpt().column(k);
            let weight = self.pq[k] * yk.dot(v);
            out.axpy(weight, &yk, T::one());
        }
        out
    }

    /// The model gradient at the best point.
    pub(crate) fn grad_at_opt(&self, set: &InterpolationSet<T>) -> OVector<T, Dyn> {
        let xopt = set.xopt();
        let mut gopt = self.hess_mul(set, &xopt);
        gopt += &self.gq;
        gopt
    }

    /// The model value at `xbase + z`, relative to the model value at `xbase`.
    pub(crate) fn value_rel<S>(&self, set: &InterpolationSet<T>, z: &Vector<T, Dyn, S>) -> T
    where
        S: Storage<T, Dyn>,
    {
        let half: T = convert(0.5);
        self.gq.dot(z) + half * self.hess_mul(set, z).dot(z)
    }

    /// The reduction `m(xopt) - m(xopt + d)` predicted for a step `d` from the
    /// best point, given the gradient there.
    pub(crate) fn reduction<S>(
        &self,
        set: &InterpolationSet<T>,
        gopt: &OVector<T, Dyn>,
        d: &Vector<T, Dyn, S>,
    ) -> T
    where
        S: Storage<T, Dyn>,
    {
        let half: T = convert(0.5);
        -(gopt.dot(d) + half * self.hess_mul(set, d).dot(d))
    }

    /// Updates the model after point `knew` of the set has been replaced.
    ///
    /// `xdrop` is the dropped displacement, `moderr` the error of the old
    /// model at the new point, and `h` must already represent the modified
    /// set. Interpolation is preserved at all surviving points and restored
    /// at the new one.
    pub(crate) fn update(
        &mut self,
        set: &InterpolationSet<T>,
        h: &HMatrix<T>,
        knew: usize,
        xdrop: &OVector<T, Dyn>,
        moderr: T,
    ) {
        let n = set.n();

        // The implicit weight of the dropped point becomes explicit.
        let pqk = self.pq[knew];
        if pqk != T::zero() {
            for i in 0..n {
                for j in 0..n {
                    self.hq[(i, j)] += pqk * xdrop[i] * xdrop[j];
                }
            }
        }
        self.pq[knew] = T::zero();

        // The model error is absorbed by the minimum-Frobenius-norm change.
        let omega = h.omega_col(knew);
        self.pq.axpy(moderr, &omega, T::one());
        let bg = h.point_gradient(knew);
        self.gq.axpy(moderr, &bg, T::one());
    }

    /// Considers replacing the model by the least-Frobenius-norm interpolant
    /// of the current function values.
    ///
    /// The replacement is triggered by three consecutive trust-region steps
    /// with ratio at most 0.01 whose model gradient dominates the gradient of
    /// the alternative interpolant. Returns whether the model was replaced.
    pub(crate) fn try_alternative(
        &mut self,
        set: &InterpolationSet<T>,
        h: &HMatrix<T>,
        ratio: T,
    ) -> bool {
        if ratio > convert(0.01) {
            self.itest = 0;
            return false;
        }

        let fopt = set.fopt();
        let mut dfval = set.fval().clone_owned();
        dfval.add_scalar_mut(-fopt);

        let mut g_alt = OVector::zeros_generic(Dyn(set.n()), U1::name());
        for k in 0..set.npt() {
            g_alt.axpy(dfval[k], &h.point_gradient(k), T::one());
        }

        self.itest += 1;
        let hundred: T = convert(100.0);
        if self.gq.norm_squared() < hundred * g_alt.norm_squared() {
            self.itest = 0;
        }

        if self.itest < 3 {
            return false;
        }

        self.gq = g_alt;
        self.hq.fill(T::zero());
        self.pq = h.omega_mul(&dfval);
        self.itest = 0;
        debug!("model replaced by the least-Frobenius-norm interpolant");
        true
    }

    /// Transforms the model for a move of the origin to `xbase + s`. Must be
    /// called while the set still holds the old displacements.
    pub(crate) fn shift_base(&mut self, set: &InterpolationSet<T>, s: &OVector<T, Dyn>) {
        let n = set.n();
        let half: T = convert(0.5);

        // Gradient at the new origin.
        let ginc = self.hess_mul(set, s);
        self.gq += ginc;

        // The implicit terms lose their alignment with the shifted points;
        // the difference goes into the explicit Hessian.
        let mut w = OVector::zeros_generic(Dyn(n), U1::name());
        for k in 0..set.npt() {
            let pqk = self.pq[k];
            if pqk == T::zero() {
                continue;
            }
            for i in 0..n {
                w[i] += pqk * (set.xpt()[(i, k)] - half * s[i]);
            }
        }
        for i in 0..n {
            for j in 0..n {
                self.hq[(i, j)] += w[i] * s[j] + s[i] * w[j];
            }
        }
    }

    pub(crate) fn any_not_finite(&self) -> bool {
        self.gq.iter().any(|v| !v.is_finite())
            || self.hq.iter().any(|v| !v.is_finite())
            || self.pq.iter().any(|v| !v.is_finite())
    }

    #[cfg(test)]
    pub(crate) fn gq(&self) -> &OVector<T, Dyn> {
        &self.gq
    }

    #[cfg(test)]
    pub(crate) fn hq(&self) -> &OMatrix<T, Dyn, Dyn> {
        &self.hq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    use crate::core::Function;
    use crate::initial;
    use crate::testing::Rosenbrock;

    fn interpolation_diffs(set: &InterpolationSet<f64>, model: &QuadraticModel<f64>) -> Vec<f64> {
        let anchor = model.value_rel(set, &set.xpt().column(set.kopt()).clone_owned());
        (0..set.npt())
            .map(|k| model.value_rel(set, &set.xpt().column(k).clone_owned()) - anchor)
            .collect()
    }

    fn assert_interpolates(set: &InterpolationSet<f64>, model: &QuadraticModel<f64>) {
        let diffs = interpolation_diffs(set, model);
        for k in 0..set.npt() {
            let expected = set.fval()[k] - set.fopt();
            assert_abs_diff_eq!(diffs[k], expected, epsilon = 1e-6 * (1.0 + expected.abs()));
        }
    }

    #[test]
    fn update_preserves_interpolation() {
        let f = Rosenbrock::default();
        let x0 = dvector![-1.2, 1.0];
        let mut init = initial::build(&f, &x0, 0.5, 5, 100, f64::NEG_INFINITY);
        assert!(init.status.is_none());

        let set = &mut init.set;
        let model = &mut init.model;
        let h = &mut init.hmat;
        assert_interpolates(set, model);

        let gopt = model.grad_at_opt(set);
        let d = dvector![0.2, -0.1];
        let qred = model.reduction(set, &gopt, &d);
        let xnew = set.xopt() + &d;
        let fnew = f.apply(&(set.xbase() + &xnew));
        let moderr = fnew - set.fopt() + qred;

        let (vlag, beta) = h.lagrange_values(set, &d);
        let knew = set.farthest_from_opt();
        assert_ne!(knew, 0);
        let xdrop = set.xpt().column(knew).clone_owned();
        assert!(h.update(knew, &vlag, beta));
        set.replace(knew, &xnew, fnew);
        model.update(set, h, knew, &xdrop, moderr);
        if fnew < set.fopt() {
            set.set_kopt(knew);
        }

        assert_interpolates(set, model);
    }

    #[test]
    fn base_shift_preserves_model_values() {
        let f = Rosenbrock::default();
        let x0 = dvector![-1.2, 1.0];
        let mut init = initial::build(&f, &x0, 0.5, 5, 100, f64::NEG_INFINITY);
        assert!(init.status.is_none());

        let set = &mut init.set;
        let model = &mut init.model;
        let h = &mut init.hmat;

        let before = interpolation_diffs(set, model);

        let s = set.xopt();
        model.shift_base(set, &s);
        h.shift_base(set, &s);
        set.apply_shift(&s);

        assert_eq!(set.xopt().norm(), 0.0);
        let after = interpolation_diffs(set, model);
        for (b, a) in before.iter().zip(after.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-8 * (1.0 + b.abs()));
        }
        assert_interpolates(set, model);
    }

    #[test]
    fn alternative_model_interpolates() {
        let f = Rosenbrock::default();
        let x0 = dvector![-1.2, 1.0];
        let mut init = initial::build(&f, &x0, 0.5, 5, 100, f64::NEG_INFINITY);
        assert!(init.status.is_none());

        let set = &init.set;
        let model = &mut init.model;

        // Distort the model gradient so that it dominates the gradient of the
        // least-Frobenius-norm interpolant; three bad-ratio steps in a row
        // then force the switch.
        model.gq *= 1e6;
        let mut replaced = false;
        for _ in 0..3 {
            replaced = model.try_alternative(set, &init.hmat, -1.0);
        }

        assert!(replaced);
        assert_eq!(model.hq().norm(), 0.0);
        assert_interpolates(set, model);
    }
}
