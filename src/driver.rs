//! High-level API for running the minimization.
//!
//! This module contains the driver that owns all internal state of the method
//! and provides a simple API to run the iterative process to termination.
//!
//! The simplest way of using the driver is to initialize it with the
//! defaults:
//!
//! ```rust
//! use newuoa::NewuoaDriver;
//! # use newuoa::nalgebra as na;
//! # use newuoa::{Function, Problem};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct MyFunction;
//! #
//! # impl Problem for MyFunction {
//! #     type Field = f64;
//! #
//! #     fn dim(&self) -> usize {
//! #         2
//! #     }
//! # }
//! #
//! # impl Function for MyFunction {
//! #     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         x.norm_squared()
//! #     }
//! # }
//!
//! let f = MyFunction;
//!
//! let mut driver = NewuoaDriver::new(&f);
//! let minimum = driver.minimize();
//! ```
//!
//! If you need to specify additional settings, use the builder:
//!
//! ```rust
//! use newuoa::{NewuoaDriver, NewuoaOptions};
//! # use newuoa::nalgebra as na;
//! # use newuoa::{Function, Problem};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct MyFunction;
//! #
//! # impl Problem for MyFunction {
//! #     type Field = f64;
//! #
//! #     fn dim(&self) -> usize {
//! #         2
//! #     }
//! # }
//! #
//! # impl Function for MyFunction {
//! #     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         x.norm_squared()
//! #     }
//! # }
//!
//! let f = MyFunction;
//!
//! let mut options = NewuoaOptions::default();
//! options.set_rhobeg(0.5).set_rhoend(1e-8);
//!
//! let mut driver = NewuoaDriver::builder(&f)
//!     .with_initial(vec![10.0, -10.0])
//!     .with_options(options)
//!     .build();
//!
//! let minimum = driver.minimize();
//! ```
//!
//! The returned [`Minimum`] always carries the best point found, the number
//! of objective evaluations and the [`ExitStatus`], also when the run was cut
//! short by a NaN objective value or a poisoned model.

use crate::core::RealField as _;
use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{convert, ComplexField, DimName, Dyn, OVector, RealField as _, U1};
use num_traits::{One, Zero};
use thiserror::Error;

use crate::core::{is_nan, Function, Problem};
use crate::geometry;
use crate::hmat::HMatrix;
use crate::initial;
use crate::model::InterpolationSet;
use crate::subproblem;

/// Reason of the termination of a minimization run.
///
/// The numeric codes returned by [`code`](ExitStatus::code) are stable and
/// follow the convention of the reference implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The final trust-region resolution was reached. This is the normal
    /// convergence.
    SmallTrRadius,
    /// The objective reached the target value.
    FtargetReached,
    /// A trust-region step of regular length failed to predict any reduction
    /// of the model.
    TrStepFailed,
    /// The budget of objective evaluations was exhausted.
    MaxfunReached,
    /// The defensive bound on the number of iterations was hit.
    MaxtrReached,
    /// A variable passed to the objective was NaN.
    NanInput,
    /// The objective returned NaN or positive infinity.
    NanInfF,
    /// The model or the inverse KKT factors were poisoned by NaN.
    NanModel,
}

impl ExitStatus {
    /// The stable integer code of the status.
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::SmallTrRadius => 0,
            ExitStatus::FtargetReached => 1,
            ExitStatus::TrStepFailed => 2,
            ExitStatus::MaxfunReached => 3,
            ExitStatus::MaxtrReached => 20,
            ExitStatus::NanInput => -1,
            ExitStatus::NanInfF => -2,
            ExitStatus::NanModel => -3,
        }
    }

    /// Whether the status describes a numerical failure rather than a
    /// stopping condition.
    pub fn is_failure(&self) -> bool {
        self.code() < 0
    }

    /// The failure described by this status, if any.
    pub fn failure(&self) -> Option<Failure> {
        match self {
            ExitStatus::NanInput => Some(Failure::NanInput),
            ExitStatus::NanInfF => Some(Failure::NanInfF),
            ExitStatus::NanModel => Some(Failure::NanModel),
            _ => None,
        }
    }
}

/// Numerical failure cutting a minimization run short.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// A variable passed to the objective was NaN.
    #[error("a variable passed to the objective is NaN")]
    NanInput,
    /// The objective returned NaN or positive infinity.
    #[error("the objective returned NaN or positive infinity")]
    NanInfF,
    /// The model state was poisoned by NaN.
    #[error("the interpolation model is numerically poisoned")]
    NanModel,
}

/// Options for the [`NewuoaDriver`].
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct NewuoaOptions<P: Problem> {
    /// Initial trust-region radius. Should be about one tenth of the greatest
    /// expected change to a variable. Default: `1`.
    rhobeg: P::Field,
    /// Final trust-region radius, controlling the accuracy of the returned
    /// point. Default: `sqrt(EPSILON)`.
    rhoend: P::Field,
    /// Target objective value; the run stops as soon as a value not above it
    /// is seen. Default: negative infinity (disabled).
    ftarget: P::Field,
    /// Budget of objective evaluations. Zero selects `100 * dim`. Default:
    /// `0`.
    maxfun: usize,
    /// Number of interpolation points, between `n + 2` and
    /// `(n + 1)(n + 2) / 2`. Zero selects the recommended `2 * dim + 1`.
    /// Default: `0`.
    npt: usize,
    /// Ratio threshold below which a trust-region step counts as bad.
    /// Default: `0.1`.
    eta1: P::Field,
    /// Ratio threshold above which the trust region may expand. Default:
    /// `0.7`.
    eta2: P::Field,
    /// Trust-region contraction factor. Default: `0.5`.
    gamma1: P::Field,
    /// Trust-region expansion factor. Default: `2`.
    gamma2: P::Field,
}

impl<P: Problem> Default for NewuoaOptions<P> {
    fn default() -> Self {
        Self {
            rhobeg: convert(1.0),
            rhoend: P::Field::EPSILON_SQRT,
            ftarget: convert(f64::NEG_INFINITY),
            maxfun: 0,
            npt: 0,
            eta1: convert(0.1),
            eta2: convert(0.7),
            gamma1: convert(0.5),
            gamma2: convert(2.0),
        }
    }
}

/// Builder for the [`NewuoaDriver`].
pub struct NewuoaBuilder<'a, F: Problem> {
    f: &'a F,
    options: NewuoaOptions<F>,
    x0: OVector<F::Field, Dyn>,
}

impl<'a, F: Problem> NewuoaBuilder<'a, F> {
    fn new(f: &'a F) -> Self {
        let dim = Dyn(f.dim());
        let x0 = OVector::from_element_generic(dim, U1::name(), convert(0.0));

        Self {
            f,
            options: NewuoaOptions::default(),
            x0,
        }
    }

    /// Sets the initial point from which the iterative process starts.
    pub fn with_initial(mut self, x0: Vec<F::Field>) -> Self {
        let dim = Dyn(self.f.dim());
        self.x0 = OVector::from_vec_generic(dim, U1::name(), x0);
        self
    }

    /// Sets the options of the algorithm.
    pub fn with_options(mut self, options: NewuoaOptions<F>) -> Self {
        self.options = options;
        self
    }

    /// Builds the [`NewuoaDriver`].
    ///
    /// # Panics
    ///
    /// Panics if the dimension is zero, the initial point does not match the
    /// dimension, or the options are inconsistent (radii ordering, `npt`
    /// range, ratio and factor ranges).
    pub fn build(self) -> NewuoaDriver<'a, F> {
        let n = self.f.dim();
        let zero = F::Field::zero();
        let one: F::Field = convert(1.0);

        assert!(n >= 1, "the problem must have at least one variable");
        assert!(
            self.x0.nrows() == n,
            "initial point does not match the problem dimension"
        );

        let NewuoaOptions {
            rhobeg,
            rhoend,
            eta1,
            eta2,
            gamma1,
            gamma2,
            ..
        } = self.options;

        assert!(
            rhoend > zero && rhobeg >= rhoend,
            "invalid trust-region radii"
        );
        assert!(
            zero <= eta1 && eta1 <= eta2 && eta2 < one,
            "invalid ratio thresholds"
        );
        assert!(
            zero < gamma1 && gamma1 < one && one < gamma2,
            "invalid radius factors"
        );

        let npt = if self.options.npt == 0 {
            2 * n + 1
        } else {
            self.options.npt
        };
        assert!(
            npt >= n + 2 && npt <= (n + 1) * (n + 2) / 2,
            "npt must be in [n + 2, (n + 1)(n + 2) / 2]"
        );

        let maxfun = if self.options.maxfun == 0 {
            100 * n
        } else {
            self.options.maxfun
        };

        NewuoaDriver {
            f: self.f,
            options: self.options,
            npt,
            maxfun,
            x0: self.x0,
        }
    }
}

/// The driver of the minimization process.
///
/// For default settings, use [`NewuoaDriver::new`]. For more flexibility, use
/// [`NewuoaDriver::builder`]. For the usage of the driver, see
/// [module](self) documentation.
pub struct NewuoaDriver<'a, F: Problem> {
    f: &'a F,
    options: NewuoaOptions<F>,
    npt: usize,
    maxfun: usize,
    x0: OVector<F::Field, Dyn>,
}

/// The result of a minimization run.
#[derive(Debug, Clone)]
pub struct Minimum<T: nalgebra::RealField + Copy> {
    x: OVector<T, Dyn>,
    fx: T,
    nf: usize,
    status: ExitStatus,
}

impl<T: nalgebra::RealField + Copy> Minimum<T> {
    /// The best point found.
    pub fn x(&self) -> &[T] {
        self.x.as_slice()
    }

    /// The objective value at the best point. NaN when the very first
    /// evaluation already failed.
    pub fn fx(&self) -> T {
        self.fx
    }

    /// The number of objective evaluations spent.
    pub fn nf(&self) -> usize {
        self.nf
    }

    /// The reason of the termination.
    pub fn status(&self) -> ExitStatus {
        self.status
    }
}

impl<'a, F: Problem> NewuoaDriver<'a, F> {
    /// Returns the builder for specifying additional settings.
    pub fn builder(f: &'a F) -> NewuoaBuilder<'a, F> {
        NewuoaBuilder::new(f)
    }

    /// Initializes the driver with the default settings.
    pub fn new(f: &'a F) -> Self {
        NewuoaDriver::builder(f).build()
    }
}

/// Result of one objective evaluation inside the loop.
enum Eval<T> {
    Value(T),
    Stop(ExitStatus),
}

impl<'a, F: Function> NewuoaDriver<'a, F> {
    /// Runs the minimization to termination and returns the best point found.
    pub fn minimize(&mut self) -> Minimum<F::Field> {
        let zero = F::Field::zero();
        let half: F::Field = convert(0.5);
        let tenth: F::Field = convert(0.1);
        let onehalf: F::Field = convert(1.5);
        let four: F::Field = convert(4.0);
        let huge: F::Field = convert(f64::INFINITY);

        let NewuoaOptions {
            rhobeg,
            rhoend,
            ftarget,
            eta1,
            eta2,
            gamma1,
            gamma2,
            ..
        } = self.options;
        let maxfun = self.maxfun;

        let mut init = initial::build(self.f, &self.x0, rhobeg, self.npt, maxfun, ftarget);
        let mut nf = init.nf;
        let mut best = init.best.take();
        let mut last = init.last.take();

        if let Some(status) = init.status {
            return self.finish(status, best, last, nf);
        }

        let mut set = init.set;
        let mut model = init.model;
        let mut h = init.hmat;

        let mut rho = rhobeg;
        let mut delta = rhobeg;
        let mut dnormsav = [huge; 3];
        let mut moderrsav = [huge; 3];

        let mut status = ExitStatus::MaxtrReached;
        let maxtr = 2 * maxfun;

        'iterations: for _ in 0..maxtr {
            // Poisoning checkpoint before the trust-region solve.
            if model.any_not_finite() || h.any_not_finite() {
                status = ExitStatus::NanModel;
                break 'iterations;
            }

            let gopt = model.grad_at_opt(&set);
            let step = subproblem::solve(&set, &model, &gopt, delta, convert(1e-2));
            let crvmin = step.crvmin;
            let dnorm = delta.min(step.d.norm());
            let qred = model.reduction(&set, &gopt, &step.d);
            let shortd = dnorm < half * rho;

            // Outcome of the trust-region step, consumed by the indicator
            // logic below.
            let mut ratio: F::Field = convert(-1.0);
            let mut knew_tr = None;

            if shortd {
                // The model wants a negligible move. Contract and resolve
                // instead of spending an evaluation.
                delta = tenth * delta;
                if delta <= onehalf * rho {
                    delta = rho;
                }
                debug!("short step ({} < rho / 2), delta contracted to {}", dnorm, delta);
            } else if !(qred > zero) {
                // A step of regular length must predict a reduction;
                // otherwise the model is no longer trustworthy.
                debug!("trust-region step failed to reduce the model, qred = {}", qred);
                status = ExitStatus::TrStepFailed;
                break 'iterations;
            } else {
                let fopt = set.fopt();
                let xopt = set.xopt();
                let xnew = &xopt + &step.d;

                let fnew = match self.evaluate(&set, &xnew, &mut nf, &mut best, &mut last) {
                    Eval::Value(fnew) => fnew,
                    Eval::Stop(stop) => {
                        status = stop;
                        break 'iterations;
                    }
                };

                let moderr = fnew - fopt + qred;
                push(&mut dnormsav, dnorm);
                push(&mut moderrsav, moderr);

                ratio = (fopt - fnew) / qred;
                if ratio <= eta1 {
                    delta = gamma1 * delta.min(dnorm);
                } else if ratio <= eta2 {
                    delta = (gamma1 * delta).max(dnorm);
                } else {
                    delta = (gamma1 * delta).max(gamma2 * dnorm);
                }
                if delta <= onehalf * rho {
                    delta = rho;
                }
                debug!("ratio = {}, delta = {}", ratio, delta);

                if fnew <= ftarget {
                    status = ExitStatus::FtargetReached;
                    break 'iterations;
                }
                if nf >= maxfun {
                    status = ExitStatus::MaxfunReached;
                    break 'iterations;
                }

                // Select the interpolation point to drop in favor of the
                // trial point.
                let ximproved = fnew < fopt;
                let (vlag, beta) = h.lagrange_values(&set, &step.d);
                knew_tr = setdrop_tr(&set, &h, &vlag, beta, delta, rho, ximproved);

                if let Some(knew) = knew_tr {
                    let xdrop = set.xpt().column(knew).clone_owned();
                    if !h.update(knew, &vlag, beta) {
                        status = ExitStatus::NanModel;
                        break 'iterations;
                    }
                    set.replace(knew, &xnew, fnew);
                    model.update(&set, &h, knew, &xdrop, moderr);
                    if ximproved {
                        set.set_kopt(knew);
                    }
                    debug!("point {} replaced by the trust-region trial", knew);

                    model.try_alternative(&set, &h, ratio);
                }
            }

            // Indicators driving the next move. At most one of improve_geo
            // and reduce_rho can hold. Infinite ring-buffer entries are the
            // "no evaluation at this resolution yet" sentinel and carry no
            // evidence against the model.
            let eighth: F::Field = convert(0.125);
            let accurate_mod = moderrsav
                .iter()
                .all(|e| !e.is_finite() || e.abs() <= eighth * crvmin * rho * rho)
                && dnormsav.iter().all(|dn| !dn.is_finite() || *dn <= rho);
            let max_distsq = set.max_distsq_to_opt();
            let close_itpset = max_distsq <= four * delta * delta;
            let adequate_geo = (shortd && accurate_mod) || close_itpset;
            let small_trrad = delta.max(dnorm) <= rho;
            let bad_trstep_geo = shortd || !(qred > zero) || ratio <= eta1 || knew_tr.is_none();
            let bad_trstep_rho = shortd || !(qred > zero) || ratio <= zero || knew_tr.is_none();
            let improve_geo = bad_trstep_geo && !adequate_geo;
            let reduce_rho = bad_trstep_rho && adequate_geo && small_trrad;
            debug_assert!(!(improve_geo && reduce_rho));

            if improve_geo {
                // Poisoning checkpoint before the geometry step.
                if model.any_not_finite() || h.any_not_finite() {
                    status = ExitStatus::NanModel;
                    break 'iterations;
                }

                let knew = set.farthest_from_opt();
                let delbar = (tenth * max_distsq.sqrt()).min(half * delta).max(rho);
                let d = geometry::improving_step(&set, &h, knew, delbar);
                debug!("improving the position of point {}, delbar = {}", knew, delbar);

                let fopt = set.fopt();
                let xopt = set.xopt();
                let xnew = &xopt + &d;

                let fnew = match self.evaluate(&set, &xnew, &mut nf, &mut best, &mut last) {
                    Eval::Value(fnew) => fnew,
                    Eval::Stop(stop) => {
                        status = stop;
                        break 'iterations;
                    }
                };

                let gopt = model.grad_at_opt(&set);
                let qred_geo = model.reduction(&set, &gopt, &d);
                let moderr = fnew - fopt + qred_geo;
                push(&mut dnormsav, delbar.min(d.norm()));
                push(&mut moderrsav, moderr);

                if fnew <= ftarget {
                    status = ExitStatus::FtargetReached;
                    break 'iterations;
                }
                if nf >= maxfun {
                    status = ExitStatus::MaxfunReached;
                    break 'iterations;
                }

                let (vlag, beta) = h.lagrange_values(&set, &d);
                let xdrop = set.xpt().column(knew).clone_owned();
                if !h.update(knew, &vlag, beta) {
                    status = ExitStatus::NanModel;
                    break 'iterations;
                }
                set.replace(knew, &xnew, fnew);
                model.update(&set, &h, knew, &xdrop, moderr);
                if fnew < fopt {
                    set.set_kopt(knew);
                }
            } else if reduce_rho {
                if rho <= rhoend {
                    status = ExitStatus::SmallTrRadius;
                    break 'iterations;
                }

                let over_end = rho / rhoend;
                let rho_next = if over_end <= convert(16.0) {
                    rhoend
                } else if over_end <= convert(250.0) {
                    (rho * rhoend).sqrt()
                } else {
                    tenth * rho
                };
                delta = (half * rho).max(rho_next);
                debug!("rho reduced from {} to {}, delta = {}", rho, rho_next, delta);
                rho = rho_next;
                dnormsav = [huge; 3];
                moderrsav = [huge; 3];
            }

            // Keep the displacements small relative to the resolution; the
            // rounding of the bilinear forms grows with || xopt ||^2.
            let xoptsq = set.xopt().norm_squared();
            let thousand: F::Field = convert(1e3);
            if xoptsq >= thousand * delta * delta {
                let s = set.xopt();
                model.shift_base(&set, &s);
                h.shift_base(&set, &s);
                set.apply_shift(&s);
                debug!("base shifted to the best point");
            }
        }

        self.finish(status, best, last, nf)
    }

    /// Evaluates the objective at `xbase + xnew` with all the terminal checks
    /// that surround an evaluation. The counter is incremented exactly when
    /// the objective was actually called.
    fn evaluate(
        &self,
        set: &InterpolationSet<F::Field>,
        xnew: &OVector<F::Field, Dyn>,
        nf: &mut usize,
        best: &mut Option<(OVector<F::Field, Dyn>, F::Field)>,
        last: &mut Option<(OVector<F::Field, Dyn>, F::Field)>,
    ) -> Eval<F::Field> {
        let huge: F::Field = convert(f64::INFINITY);

        if *nf >= self.maxfun {
            return Eval::Stop(ExitStatus::MaxfunReached);
        }

        let x = set.xbase() + xnew;
        if x.iter().any(|v| is_nan(*v)) {
            return Eval::Stop(ExitStatus::NanInput);
        }

        let fx = self.f.apply(&x);
        *nf += 1;
        debug!("nf = {}, f = {}", nf, fx);
        *last = Some((x.clone_owned(), fx));

        if is_nan(fx) || fx >= huge {
            return Eval::Stop(ExitStatus::NanInfF);
        }
        if best.as_ref().map_or(true, |(_, bf)| fx < *bf) {
            *best = Some((x, fx));
        }

        Eval::Value(fx)
    }

    fn finish(
        &self,
        status: ExitStatus,
        best: Option<(OVector<F::Field, Dyn>, F::Field)>,
        last: Option<(OVector<F::Field, Dyn>, F::Field)>,
        nf: usize,
    ) -> Minimum<F::Field> {
        let (x, fx) = match (best, last) {
            (Some((bx, bf)), Some((lx, lf))) => {
                if bf <= lf || is_nan(lf) {
                    (bx, bf)
                } else {
                    (lx, lf)
                }
            }
            (Some(best), None) => best,
            (None, Some(last)) => last,
            (None, None) => (self.x0.clone_owned(), convert(f64::NAN)),
        };

        debug!(
            "finished with status {:?} (code {}), nf = {}, f = {}",
            status,
            status.code(),
            nf,
            fx
        );

        Minimum { x, fx, nf, status }
    }
}

/// Selects the interpolation point to drop for the trust-region trial point,
/// weighting the denominator of the updating formula by the distance from the
/// best point. Returns `None` when keeping the set unchanged is preferable,
/// which can happen only when the trial did not improve the best value.
fn setdrop_tr<T: nalgebra::RealField + Copy>(
    set: &InterpolationSet<T>,
    h: &HMatrix<T>,
    vlag: &OVector<T, Dyn>,
    beta: T,
    delta: T,
    rho: T,
    ximproved: bool,
) -> Option<usize> {
    let tenth: T = convert(0.1);
    let rhosq = (tenth * delta).max(rho).powi(2);

    let mut knew = None;
    let mut detrat = if ximproved { T::zero() } else { T::one() };

    for k in 0..set.npt() {
        if !ximproved && k == set.kopt() {
            continue;
        }
        let hdiag = h.hdiag(k);
        let mut score = (beta * hdiag + vlag[k] * vlag[k]).abs();
        let distsq = set.distsq_to_opt(k);
        if distsq > rhosq {
            score *= (distsq / rhosq).powi(3);
        }
        if score > detrat {
            detrat = score;
            knew = Some(k);
        }
    }

    if knew.is_none() && ximproved {
        // The improving point must enter the set; fall back to the point
        // farthest from the best one.
        knew = Some(set.farthest_from_opt());
    }

    knew
}

fn push<T: Copy>(buf: &mut [T; 3], value: T) {
    buf[0] = buf[1];
    buf[1] = buf[2];
    buf[2] = value;
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    use nalgebra::{storage::Storage, IsContiguous, Vector};

    use crate::testing::*;

    /// Wrapper that poisons the objective from a given evaluation on.
    struct NanFrom<F> {
        inner: F,
        from: usize,
        calls: Cell<usize>,
    }

    impl<F> NanFrom<F> {
        fn new(inner: F, from: usize) -> Self {
            Self {
                inner,
                from,
                calls: Cell::new(0),
            }
        }
    }

    impl<F: Problem> Problem for NanFrom<F> {
        type Field = F::Field;

        fn dim(&self) -> usize {
            self.inner.dim()
        }
    }

    impl<F: Function> Function for NanFrom<F> {
        fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
        where
            Sx: Storage<Self::Field, Dyn> + IsContiguous,
        {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if call >= self.from {
                convert(f64::NAN)
            } else {
                self.inner.apply(x)
            }
        }
    }

    #[test]
    fn sphere_minimization() {
        let f = Sphere::new(4);
        let minimum = minimize(&f, vec![2.0, -1.5, 0.5, 1.0], 0.5, 1e-8, 500);

        assert_eq!(minimum.status(), ExitStatus::SmallTrRadius);
        assert!(minimum.fx() <= 1e-10);
    }

    #[test]
    fn rosenbrock_valley() {
        let f = Rosenbrock::new(2);
        let minimum = minimize(&f, vec![-1.2, 1.0], 0.5, 1e-6, 500);

        assert!(!minimum.status().is_failure());
        for xi in minimum.x() {
            assert!((xi - 1.0).abs() <= 1e-4);
        }
    }

    #[test]
    fn trid_quadratic_accuracy() {
        let f = Trid::new(5);
        let minimum = minimize(&f, vec![0.0; 5], 1.0, 1e-8, 500);

        assert_eq!(minimum.status(), ExitStatus::SmallTrRadius);
        assert!(minimum.nf() <= 300, "nf = {}", minimum.nf());

        let solution = f.solution();
        for (xi, si) in minimum.x().iter().zip(solution.iter()) {
            assert!((xi - si).abs() <= 1e-6, "|{} - {}|", xi, si);
        }
    }

    #[test]
    fn powell_singular() {
        let f = PowellSingular::new(4);
        let minimum = minimize(&f, vec![3.0, -1.0, 0.0, 1.0], 1.0, 1e-6, 2000);

        assert!(!minimum.status().is_failure());
        assert!(minimum.fx() <= 1e-8, "f = {}", minimum.fx());
    }

    #[test]
    fn constant_objective_converges_immediately() {
        let f = Constant::new(3, 42.0);
        let npt = 2 * 3 + 1;
        let minimum = minimize(&f, vec![1.0, 2.0, 3.0], 0.5, 1e-6, 500);

        assert_eq!(minimum.status(), ExitStatus::SmallTrRadius);
        assert_eq!(minimum.fx(), 42.0);
        assert!(minimum.nf() <= npt + 3, "nf = {}", minimum.nf());
    }

    #[test]
    fn nan_at_first_evaluation() {
        let f = NanFrom::new(Sphere::new(2), 1);
        let minimum = minimize(&f, vec![3.0, 4.0], 0.5, 1e-6, 100);

        assert_eq!(minimum.status(), ExitStatus::NanInfF);
        assert_eq!(minimum.status().code(), -2);
        assert_eq!(minimum.nf(), 1);
        assert_eq!(minimum.x(), &[3.0, 4.0]);
        assert!(minimum.fx().is_nan());
    }

    #[test]
    fn nan_later_preserves_best_point() {
        let f = NanFrom::new(Sphere::new(2), 8);
        let minimum = minimize(&f, vec![3.0, 4.0], 0.5, 1e-6, 100);

        assert_eq!(minimum.status(), ExitStatus::NanInfF);
        assert_eq!(minimum.nf(), 8);
        assert!(minimum.fx().is_finite());
        assert!(minimum.fx() <= 25.0);
    }

    #[test]
    fn ftarget_stops_on_first_reachable_value() {
        let f = Sphere::new(2);
        let mut options = NewuoaOptions::default();
        options.set_ftarget(f64::INFINITY).set_rhobeg(0.5);

        let minimum = NewuoaDriver::builder(&f)
            .with_initial(vec![1.0, 1.0])
            .with_options(options)
            .build()
            .minimize();

        assert_eq!(minimum.status(), ExitStatus::FtargetReached);
        assert_eq!(minimum.nf(), 1);
    }

    #[test]
    fn disabled_ftarget_never_triggers() {
        let f = Sphere::new(2);
        let minimum = minimize(&f, vec![1.0, 1.0], 0.5, 1e-6, 500);

        assert_ne!(minimum.status(), ExitStatus::FtargetReached);
        assert_eq!(minimum.status(), ExitStatus::SmallTrRadius);
    }

    #[test]
    fn budget_stops_after_one_iteration_evaluation() {
        let n = 2;
        let npt = 2 * n + 1;
        let f = Sphere::new(n);
        let minimum = minimize(&f, vec![3.0, 4.0], 0.5, 1e-6, npt + 1);

        assert_eq!(minimum.status(), ExitStatus::MaxfunReached);
        assert_eq!(minimum.status().code(), 3);
        assert_eq!(minimum.nf(), npt + 1);
    }

    #[test]
    fn equal_radii_terminate_normally() {
        let f = Sphere::new(2);
        let minimum = minimize(&f, vec![1.0, 1.0], 0.5, 0.5, 500);

        assert_eq!(minimum.status(), ExitStatus::SmallTrRadius);
        assert_eq!(minimum.status().code(), 0);
    }

    #[test]
    fn failure_maps_negative_codes() {
        assert_eq!(ExitStatus::NanInput.failure(), Some(Failure::NanInput));
        assert_eq!(ExitStatus::NanInfF.failure(), Some(Failure::NanInfF));
        assert_eq!(ExitStatus::NanModel.failure(), Some(Failure::NanModel));
        assert_eq!(ExitStatus::SmallTrRadius.failure(), None);
        assert!(ExitStatus::NanModel.is_failure());
        assert!(!ExitStatus::MaxfunReached.is_failure());
    }

    #[test]
    fn nan_in_initial_point_is_rejected() {
        let f = Sphere::new(2);
        let minimum = minimize(&f, vec![f64::NAN, 1.0], 0.5, 1e-6, 100);

        assert_eq!(minimum.status(), ExitStatus::NanInput);
        assert_eq!(minimum.status().code(), -1);
        assert_eq!(minimum.nf(), 0);
    }

    #[test]
    fn exact_quadratic_needs_few_evaluations() {
        // The model becomes exact for a quadratic objective early on, so the
        // run should spend most of its budget only on resolution refinement.
        let f = Trid::new(4);
        let minimum = minimize(&f, vec![0.0; 4], 1.0, 1e-6, 500);

        assert_eq!(minimum.status(), ExitStatus::SmallTrRadius);
        assert!(minimum.nf() <= 200, "nf = {}", minimum.nf());
    }
}
