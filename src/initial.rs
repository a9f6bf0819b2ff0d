//! Initial sampling and the closed-form initial model.
//!
//! The first `npt` points are the origin of the run, steps of length `rhobeg`
//! along the positive and negative coordinate directions, and, when `npt`
//! exceeds `2n + 1`, points displaced along two coordinates at once. The signs
//! of the two-coordinate displacements follow the lower of the two function
//! values seen on the corresponding axes.
//!
//! For this pattern the initial quadratic model comes from forward, central
//! and cross differences, and the inverse KKT factors have a closed form, so
//! no linear system is solved.

use log::debug;
use nalgebra::{convert, ComplexField, DimName, Dyn, OMatrix, OVector, RealField, U1};
use num_traits::{One, Zero};

use crate::core::{is_nan, Function};
use crate::driver::ExitStatus;
use crate::hmat::HMatrix;
use crate::model::{InterpolationSet, QuadraticModel};

pub(crate) struct InitOutput<T: RealField + Copy> {
    pub set: InterpolationSet<T>,
    pub model: QuadraticModel<T>,
    pub hmat: HMatrix<T>,
    pub nf: usize,
    pub status: Option<ExitStatus>,
    pub best: Option<(OVector<T, Dyn>, T)>,
    pub last: Option<(OVector<T, Dyn>, T)>,
}

/// Coordinates of a two-coordinate sample point, 1-based as the point order
/// dictates.
fn paired_coords(k: usize, n: usize) -> (usize, usize) {
    let itemp = (k - n - 1) / n;
    let mut jpt = k - itemp * n - n;
    let mut ipt = jpt + itemp;
    if ipt > n {
        let t = jpt;
        jpt = ipt - n;
        ipt = t;
    }
    (ipt, jpt)
}

pub(crate) fn build<F: Function>(
    f: &F,
    x0: &OVector<F::Field, Dyn>,
    rhobeg: F::Field,
    npt: usize,
    maxfun: usize,
    ftarget: F::Field,
) -> InitOutput<F::Field> {
    let n = x0.nrows();
    let nptm = npt - n - 1;
    let zero = F::Field::zero();
    let one = F::Field::one();
    let half: F::Field = convert(0.5);
    let inf: F::Field = convert(f64::INFINITY);

    let mut xpt = OMatrix::zeros_generic(Dyn(n), Dyn(npt));
    let mut fval = OVector::zeros_generic(Dyn(npt), U1::name());
    let mut kopt = 0;
    let mut nf = 0;
    let mut status = None;
    let mut best: Option<(OVector<F::Field, Dyn>, F::Field)> = None;
    let mut last = None;

    for k in 0..npt {
        // Place the k-th sample.
        if k == 0 {
            // The caller's starting point.
        } else if k <= n {
            xpt[(k - 1, k)] = rhobeg;
        } else if k <= 2 * n {
            xpt[(k - n - 1, k)] = -rhobeg;
        } else {
            let (ipt, jpt) = paired_coords(k, n);
            let xip = if fval[n + ipt] < fval[ipt] {
                -rhobeg
            } else {
                rhobeg
            };
            let xjp = if fval[n + jpt] < fval[jpt] {
                -rhobeg
            } else {
                rhobeg
            };
            xpt[(ipt - 1, k)] = xip;
            xpt[(jpt - 1, k)] = xjp;
        }

        if nf >= maxfun {
            status = Some(ExitStatus::MaxfunReached);
            break;
        }

        let x = x0 + xpt.column(k);
        if x.iter().any(|v| is_nan(*v)) {
            status = Some(ExitStatus::NanInput);
            break;
        }

        let fx = f.apply(&x);
        nf += 1;
        debug!("nf = {}, f = {}", nf, fx);
        last = Some((x.clone_owned(), fx));

        if is_nan(fx) || fx >= inf {
            status = Some(ExitStatus::NanInfF);
            break;
        }
        if best.as_ref().map_or(true, |(_, bf)| fx < *bf) {
            best = Some((x, fx));
        }

        fval[k] = fx;
        if fx < fval[kopt] {
            kopt = k;
        }

        if fx <= ftarget {
            status = Some(ExitStatus::FtargetReached);
            break;
        }
    }

    let mut gq = OVector::zeros_generic(Dyn(n), U1::name());
    let mut hq = OMatrix::zeros_generic(Dyn(n), Dyn(n));
    let pq = OVector::zeros_generic(Dyn(npt), U1::name());
    let mut bmat = OMatrix::zeros_generic(Dyn(npt + n), Dyn(n));
    let mut zmat = OMatrix::zeros_generic(Dyn(npt), Dyn(nptm));

    if status.is_none() {
        let fbeg = fval[0];
        let rhosq = rhobeg * rhobeg;
        let recip = one / rhosq;
        let reciq = half.sqrt() / rhosq;

        for j in 0..n {
            let kp = j + 1;
            let km = n + 1 + j;
            if km < npt {
                // Both axis points exist: central differences.
                let fp = fval[kp];
                let fm = fval[km];
                gq[j] = (fp - fm) / (rhobeg + rhobeg);
                hq[(j, j)] = (fp + fm - fbeg - fbeg) / rhosq;
                bmat[(kp, j)] = half / rhobeg;
                bmat[(km, j)] = -half / rhobeg;
                zmat[(0, j)] = -reciq - reciq;
                zmat[(kp, j)] = reciq;
                zmat[(km, j)] = reciq;
            } else {
                // Only the forward point exists.
                gq[j] = (fval[kp] - fbeg) / rhobeg;
                bmat[(0, j)] = -one / rhobeg;
                bmat[(kp, j)] = one / rhobeg;
                bmat[(npt + j, j)] = -half * rhosq;
            }
        }

        for k in (2 * n + 1)..npt {
            let (ipt, jpt) = paired_coords(k, n);
            let xip = xpt[(ipt - 1, k)];
            let xjp = xpt[(jpt - 1, k)];
            let fi = if xip < zero { n + ipt } else { ipt };
            let fj = if xjp < zero { n + jpt } else { jpt };

            let zc = k - n - 1;
            zmat[(0, zc)] = recip;
            zmat[(k, zc)] = recip;
            zmat[(fi, zc)] = -recip;
            zmat[(fj, zc)] = -recip;

            let cross = (fbeg - fval[fi] - fval[fj] + fval[k]) / (xip * xjp);
            hq[(ipt - 1, jpt - 1)] = cross;
            hq[(jpt - 1, ipt - 1)] = cross;
        }
    }

    InitOutput {
        set: InterpolationSet::new(x0.clone_owned(), xpt, fval, kopt),
        model: QuadraticModel::new(gq, hq, pq),
        hmat: HMatrix::new(bmat, zmat, 0),
        nf,
        status,
        best,
        last,
    }
}
