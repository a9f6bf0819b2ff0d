//! Factored inverse of the KKT matrix of the least-Frobenius-norm
//! interpolation system.
//!
//! The inverse H is held in the factored form of Powell's NEWUOA paper:
//! `bmat` carries the gradient rows (one row per sample point followed by a
//! symmetric trailing block) and the point-point block is `zmat D zmat'`,
//! where D is a diagonal of plus and minus ones encoded by the single index
//! `idz` (the columns before `idz` carry the minus sign). The factors never
//! leave this module; the rest of the crate works through the operations
//! below.

use nalgebra::storage::Storage;
use nalgebra::{convert, ComplexField, DimName, Dyn, OMatrix, OVector, RealField, Vector, U1};
use num_traits::{One, Zero};

use crate::model::InterpolationSet;

pub(crate) struct HMatrix<T: RealField + Copy> {
    bmat: OMatrix<T, Dyn, Dyn>,
    zmat: OMatrix<T, Dyn, Dyn>,
    idz: usize,
}

impl<T: RealField + Copy> HMatrix<T> {
    pub(crate) fn new(bmat: OMatrix<T, Dyn, Dyn>, zmat: OMatrix<T, Dyn, Dyn>, idz: usize) -> Self {
        Self { bmat, zmat, idz }
    }

    fn npt(&self) -> usize {
        self.zmat.nrows()
    }

    fn n(&self) -> usize {
        self.bmat.ncols()
    }

    fn nptm(&self) -> usize {
        self.zmat.ncols()
    }

    fn dz(&self, j: usize) -> T {
        if j < self.idz {
            -T::one()
        } else {
            T::one()
        }
    }

    /// The gradient part of the `k`-th Lagrange function at `xbase`.
    pub(crate) fn point_gradient(&self, k: usize) -> OVector<T, Dyn> {
        self.bmat.row(k).transpose()
    }

    /// The `k`-th column of the point-point block `zmat D zmat'`.
    pub(crate) fn omega_col(&self, k: usize) -> OVector<T, Dyn> {
        let mut out = OVector::zeros_generic(Dyn(self.npt()), U1::name());
        for j in 0..self.nptm() {
            let weight = self.dz(j) * self.zmat[(k, j)];
            if weight != T::zero() {
                out.axpy(weight, &self.zmat.column(j), T::one());
            }
        }
        out
    }

    /// Multiplies the point-point block by `v`.
    pub(crate) fn omega_mul<S>(&self, v: &Vector<T, Dyn, S>) -> OVector<T, Dyn>
    where
        S: Storage<T, Dyn>,
    {
        let mut out = OVector::zeros_generic(Dyn(self.npt()), U1::name());
        for j in 0..self.nptm() {
            let weight = self.dz(j) * self.zmat.column(j).dot(v);
            out.axpy(weight, &self.zmat.column(j), T::one());
        }
        out
    }

    /// Diagonal entry `k` of the point-point block.
    pub(crate) fn hdiag(&self, k: usize) -> T {
        let mut sum = T::zero();
        for j in 0..self.nptm() {
            sum += self.dz(j) * self.zmat[(k, j)] * self.zmat[(k, j)];
        }
        sum
    }

    /// Computes the values of all Lagrange functions at `xopt + d` together
    /// with the denominator parameter beta of the updating formula.
    ///
    /// The first `npt` entries of the returned vector are the Lagrange values
    /// (H w in the paper's notation), the trailing `n` entries the gradient
    /// part that the update consumes.
    pub(crate) fn lagrange_values<S>(
        &self,
        set: &InterpolationSet<T>,
        d: &Vector<T, Dyn, S>,
    ) -> (OVector<T, Dyn>, T)
    where
        S: Storage<T, Dyn>,
    {
        let n = self.n();
        let npt = self.npt();
        let half: T = convert(0.5);
        let xopt = set.xopt();

        let mut vlag = OVector::zeros_generic(Dyn(npt + n), U1::name());
        let mut wcheck = OVector::zeros_generic(Dyn(npt), U1::name());

        for k in 0..npt {
            let yk = set.xpt().column(k);
            let suma = yk.dot(d);
            let sumb = yk.dot(&xopt);
            wcheck[k] = suma * (half * suma + sumb);

            let mut sum = T::zero();
            for j in 0..n {
                sum += self.bmat[(k, j)] * d[j];
            }
            vlag[k] = sum;
        }

        let mut beta = T::zero();
        for jj in 0..self.nptm() {
            let mut sum = T::zero();
            for i in 0..npt {
                sum += self.zmat[(i, jj)] * wcheck[i];
            }
            if jj < self.idz {
                beta += sum * sum;
                sum = -sum;
            } else {
                beta -= sum * sum;
            }
            for i in 0..npt {
                vlag[i] += sum * self.zmat[(i, jj)];
            }
        }

        let mut bsum = T::zero();
        let mut dx = T::zero();
        let dsq = d.norm_squared();
        let xoptsq = xopt.norm_squared();
        for j in 0..n {
            let mut sum = T::zero();
            for i in 0..npt {
                sum += wcheck[i] * self.bmat[(i, j)];
            }
            bsum += sum * d[j];
            let jp = npt + j;
            for k in 0..n {
                sum += self.bmat[(jp, k)] * d[k];
            }
            vlag[jp] = sum;
            bsum += sum * d[j];
            dx += d[j] * xopt[j];
        }
        beta = dx * dx + dsq * (xoptsq + dx + dx + half * dsq) + beta - bsum;
        vlag[set.kopt()] += T::one();

        (vlag, beta)
    }

    /// Updates the factors for the replacement of point `knew` by the point
    /// whose Lagrange data `(vlag, beta)` was produced by
    /// [`lagrange_values`](Self::lagrange_values).
    ///
    /// Returns false and leaves the represented matrix unchanged when the
    /// denominator of the updating formula is zero or not finite.
    #[must_use]
    pub(crate) fn update(&mut self, knew: usize, vlag: &OVector<T, Dyn>, beta: T) -> bool {
        let n = self.n();
        let npt = self.npt();
        let nptm = self.nptm();
        let mut vlag = vlag.clone_owned();

        // Rotate pairs of equal-sign columns of zmat so that at most the
        // first column of each sign block keeps a nonzero in row knew. The
        // rotations are orthogonal within a block and do not change the
        // represented matrix.
        let mut jl = 0;
        for j in 1..nptm {
            if j == self.idz {
                jl = self.idz;
            } else if self.zmat[(knew, j)] != T::zero() {
                let za = self.zmat[(knew, jl)];
                let zb = self.zmat[(knew, j)];
                let temp = (za * za + zb * zb).sqrt();
                let tempa = za / temp;
                let tempb = zb / temp;
                for i in 0..npt {
                    let t = tempa * self.zmat[(i, jl)] + tempb * self.zmat[(i, j)];
                    self.zmat[(i, j)] = tempa * self.zmat[(i, j)] - tempb * self.zmat[(i, jl)];
                    self.zmat[(i, jl)] = t;
                }
                self.zmat[(knew, j)] = T::zero();
            }
        }

        // Row knew of the point-point block, which now has contributions from
        // at most two columns of zmat.
        let mut tempa = self.zmat[(knew, 0)];
        if self.idz >= 1 {
            tempa = -tempa;
        }
        let tempb = if jl > 0 {
            self.zmat[(knew, jl)]
        } else {
            T::zero()
        };
        let mut w = OVector::zeros_generic(Dyn(npt + n), U1::name());
        for i in 0..npt {
            w[i] = tempa * self.zmat[(i, 0)];
            if jl > 0 {
                w[i] += tempb * self.zmat[(i, jl)];
            }
        }

        let alpha = w[knew];
        let tau = vlag[knew];
        let denom = alpha * beta + tau * tau;
        if !denom.is_finite() || denom == T::zero() {
            return false;
        }
        vlag[knew] -= T::one();
        let sqrtdn = denom.abs().sqrt();

        let mut restore_sign = false;
        if jl == 0 {
            // Row knew lives in a single column; the rank-two update acts on
            // that column alone.
            let tempb = tempa / sqrtdn;
            let tempa = tau / sqrtdn;
            for i in 0..npt {
                self.zmat[(i, 0)] = tempa * self.zmat[(i, 0)] - tempb * vlag[i];
            }
            if self.idz == 0 && denom < T::zero() {
                self.idz = 1;
            }
            if self.idz >= 1 && denom >= T::zero() {
                restore_sign = true;
            }
        } else {
            // Row knew has components in both sign blocks.
            let ja = if beta >= T::zero() { jl } else { 0 };
            let jb = jl - ja;
            let temp = self.zmat[(knew, jb)] / denom;
            let tempa2 = temp * beta;
            let tempb2 = temp * tau;
            let tknew = self.zmat[(knew, ja)];
            let scala = T::one() / (beta.abs() * tknew * tknew + tau * tau).sqrt();
            let scalb = scala * sqrtdn;
            for i in 0..npt {
                self.zmat[(i, ja)] = scala * (tau * self.zmat[(i, ja)] - tknew * vlag[i]);
                self.zmat[(i, jb)] =
                    scalb * (self.zmat[(i, jb)] - tempa2 * w[i] - tempb2 * vlag[i]);
            }
            if denom <= T::zero() {
                if beta < T::zero() {
                    self.idz += 1;
                } else {
                    restore_sign = true;
                }
            }
        }

        // One column moved from the minus block to the plus block; put the
        // blocks back into contiguous order.
        if restore_sign {
            self.idz -= 1;
            self.zmat.swap_columns(0, self.idz);
        }

        // Finally the gradient rows.
        for j in 0..n {
            let jp = npt + j;
            w[jp] = self.bmat[(knew, j)];
            let tempa = (alpha * vlag[jp] - tau * w[jp]) / denom;
            let tempb = (-beta * w[jp] - tau * vlag[jp]) / denom;
            for i in 0..=jp {
                let value = self.bmat[(i, j)] + tempa * vlag[i] + tempb * w[i];
                self.bmat[(i, j)] = value;
                if i >= npt {
                    self.bmat[(jp, i - npt)] = value;
                }
            }
        }

        true
    }

    /// Transforms the factors for a move of the origin to `xbase + s`. Must
    /// be called while the set still holds the old displacements. The
    /// point-point block is invariant under the shift; only `bmat` changes.
    pub(crate) fn shift_base(&mut self, set: &InterpolationSet<T>, s: &OVector<T, Dyn>) {
        let n = self.n();
        let npt = self.npt();
        let half: T = convert(0.5);
        let quart: T = convert(0.25);

        let xoptsq = s.norm_squared();
        let tempq = quart * xoptsq;

        // w1[k] = y_k's - |s|^2 / 2, and v_k = y_k - s / 2 below.
        let mut w1 = OVector::zeros_generic(Dyn(npt), U1::name());
        for k in 0..npt {
            w1[k] = set.xpt().column(k).dot(s) - half * xoptsq;
        }

        let vk = |k: usize, i: usize| set.xpt()[(i, k)] - half * s[i];

        // Contributions that do not involve zmat.
        let mut vlag = OVector::zeros_generic(Dyn(n), U1::name());
        let mut bk = OVector::zeros_generic(Dyn(n), U1::name());
        for k in 0..npt {
            for i in 0..n {
                vlag[i] = w1[k] * vk(k, i) + tempq * s[i];
                bk[i] = self.bmat[(k, i)];
            }
            for i in 0..n {
                for j in 0..n {
                    self.bmat[(npt + i, j)] += bk[i] * vlag[j] + vlag[i] * bk[j];
                }
            }
        }

        // Contributions of each column of zmat.
        for jj in 0..self.nptm() {
            let mut sumz = T::zero();
            for k in 0..npt {
                sumz += self.zmat[(k, jj)];
            }
            for j in 0..n {
                let mut sum = tempq * sumz * s[j];
                for k in 0..npt {
                    sum += w1[k] * self.zmat[(k, jj)] * vk(k, j);
                }
                vlag[j] = sum;
                let signed = self.dz(jj) * sum;
                for k in 0..npt {
                    self.bmat[(k, j)] += signed * self.zmat[(k, jj)];
                }
            }
            let dzjj = self.dz(jj);
            for i in 0..n {
                for j in 0..n {
                    self.bmat[(npt + i, j)] += dzjj * vlag[i] * vlag[j];
                }
            }
        }
    }

    pub(crate) fn any_not_finite(&self) -> bool {
        self.bmat.iter().any(|v| !v.is_finite()) || self.zmat.iter().any(|v| !v.is_finite())
    }

    #[cfg(test)]
    pub(crate) fn bmat(&self) -> &OMatrix<T, Dyn, Dyn> {
        &self.bmat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use nalgebra::dvector;

    use crate::core::Function;
    use crate::initial;
    use crate::testing::{Rosenbrock, Sphere};

    /// Checks that the factors describe the Lagrange basis of the set: the
    /// k-th Lagrange function takes value one at point k and zero elsewhere.
    /// The constant term of each Lagrange function is recovered from the
    /// point currently sitting at the origin displacement.
    fn assert_lagrange_basis(set: &InterpolationSet<f64>, h: &HMatrix<f64>, origin: usize) {
        let npt = set.npt();
        for k in 0..npt {
            let weights = h.omega_col(k);
            let grad = h.point_gradient(k);
            let constant = if k == origin { 1.0 } else { 0.0 };
            for l in 0..npt {
                let yl = set.xpt().column(l).clone_owned();
                let mut value = constant + grad.dot(&yl);
                for j in 0..npt {
                    let yj = set.xpt().column(j);
                    let w = yj.dot(&yl);
                    value += 0.5 * weights[j] * w * w;
                }
                let expected = if k == l { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(value, expected, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn update_preserves_lagrange_basis() {
        let f = Rosenbrock::default();
        let x0 = dvector![-1.2, 1.0];
        let mut init = initial::build(&f, &x0, 0.5, 5, 100, f64::NEG_INFINITY);
        assert!(init.status.is_none());

        let set = &mut init.set;
        let h = &mut init.hmat;
        assert_lagrange_basis(set, h, 0);

        let d = dvector![0.3, 0.1];
        let xnew = set.xopt() + &d;
        let fnew = f.apply(&(set.xbase() + &xnew));

        let (vlag, beta) = h.lagrange_values(set, &d);
        let knew = set.farthest_from_opt();
        assert_ne!(knew, 0);
        assert!(h.update(knew, &vlag, beta));
        set.replace(knew, &xnew, fnew);

        assert_lagrange_basis(set, h, 0);
    }

    #[test]
    fn trailing_block_stays_symmetric() {
        let f = Sphere::new(3);
        let x0 = dvector![1.0, -0.5, 2.0];
        let mut init = initial::build(&f, &x0, 0.5, 7, 100, f64::NEG_INFINITY);
        assert!(init.status.is_none());

        let set = &mut init.set;
        let h = &mut init.hmat;

        let d = dvector![0.2, 0.1, -0.15];
        let xnew = set.xopt() + &d;
        let (vlag, beta) = h.lagrange_values(set, &d);
        let knew = set.farthest_from_opt();
        assert!(h.update(knew, &vlag, beta));
        set.replace(knew, &xnew, 0.0);

        let npt = set.npt();
        let n = set.n();
        let max = h.bmat().iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        for i in 0..n {
            for j in 0..n {
                let diff = (h.bmat()[(npt + i, j)] - h.bmat()[(npt + j, i)]).abs();
                assert!(diff <= 1e-12 * max.max(1.0));
            }
        }
    }

    #[test]
    fn lagrange_values_are_lagrange_functions() {
        // The first npt entries of vlag must be the values of the Lagrange
        // functions at xopt + d; verify against a direct evaluation through
        // the factors.
        let f = Sphere::new(2);
        let x0 = dvector![0.4, -0.1];
        let init = initial::build(&f, &x0, 0.5, 5, 100, f64::NEG_INFINITY);
        assert!(init.status.is_none());

        let set = init.set;
        let h = init.hmat;
        let d = dvector![0.25, -0.3];
        let (vlag, _) = h.lagrange_values(&set, &d);

        let z = set.xopt() + &d;
        for k in 0..set.npt() {
            let weights = h.omega_col(k);
            let grad = h.point_gradient(k);
            let constant = if k == 0 { 1.0 } else { 0.0 };
            let mut value = constant + grad.dot(&z);
            for j in 0..set.npt() {
                let yj = set.xpt().column(j);
                let w = yj.dot(&z);
                value += 0.5 * weights[j] * w * w;
            }
            assert_abs_diff_eq!(vlag[k], value, epsilon = 1e-10);
        }
    }

    #[test]
    fn shift_preserves_lagrange_basis() {
        let f = Rosenbrock::default();
        let x0 = dvector![-1.2, 1.0];
        let mut init = initial::build(&f, &x0, 0.5, 5, 100, f64::NEG_INFINITY);
        assert!(init.status.is_none());

        let set = &mut init.set;
        let h = &mut init.hmat;

        let s = set.xopt();
        h.shift_base(set, &s);
        set.apply_shift(&s);

        // The point at the origin displacement is now the former best point.
        assert_lagrange_basis(set, h, set.kopt());
    }
}
