//! Testing problems and utilities useful for benchmarking, debugging and
//! smoke testing.
//!
//! [`Sphere`] and [`Rosenbrock`] are recommended for first tests. [`Trid`]
//! has a known analytic minimizer, which makes it convenient for accuracy
//! assertions, and [`PowellSingular`] has a singular Hessian in the solution.
//!
//! # References
//!
//! \[1\] [A Literature Survey of Benchmark Functions For Global Optimization
//! Problems](https://arxiv.org/abs/1308.4008)
//!
//! \[2\] [Numerical Methods for Unconstrained Optimization and Nonlinear
//! Equations](https://epubs.siam.org/doi/book/10.1137/1.9781611971200)

#![allow(unused)]

use nalgebra::{storage::Storage, DVector, Dyn, IsContiguous, OVector, Vector};

use crate::core::{Function, Problem};
use crate::driver::{Minimum, NewuoaDriver, NewuoaOptions};

/// Extension of the [`Problem`] trait that provides additional information
/// that is useful for testing algorithms.
pub trait TestProblem: Problem {
    /// Standard initial values for the problem. Using the same initial values
    /// is essential for fair comparison of methods.
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>>;
}

/// [Sphere
/// function](https://en.wikipedia.org/wiki/Test_functions_for_optimization)
/// \[1\].
///
/// A simple paraboloid which can be used in early development and sanity
/// checking as it can be considered a trivial problem.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    n: usize,
}

impl Sphere {
    /// Initializes the function with given dimension.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n must be greater than zero");
        Self { n }
    }
}

impl Default for Sphere {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Problem for Sphere {
    type Field = f64;

    fn dim(&self) -> usize {
        self.n
    }
}

impl Function for Sphere {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        x.iter().map(|xi| xi * xi).sum()
    }
}

impl TestProblem for Sphere {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let init = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { 10.0 } else { -10.0 }),
        );

        vec![init]
    }
}

/// Chained [Rosenbrock
/// function](https://en.wikipedia.org/wiki/Rosenbrock_function) \[1,2\] (also
/// known as Rosenbrock's valley or banana function).
///
/// The global minimum is inside a long, narrow, parabolic shaped flat valley.
/// The challenge is to find the solution inside the valley.
#[derive(Debug, Clone, Copy)]
pub struct Rosenbrock {
    n: usize,
}

impl Rosenbrock {
    /// Initializes the function with given dimension.
    ///
    /// The dimension **must** be at least 2.
    pub fn new(n: usize) -> Self {
        assert!(n >= 2, "n must be at least two");
        Self { n }
    }
}

impl Default for Rosenbrock {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Problem for Rosenbrock {
    type Field = f64;

    fn dim(&self) -> usize {
        self.n
    }
}

impl Function for Rosenbrock {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        (0..self.n - 1)
            .map(|i| {
                let t1 = x[i + 1] - x[i] * x[i];
                let t2 = 1.0 - x[i];
                100.0 * t1 * t1 + t2 * t2
            })
            .sum()
    }
}

impl TestProblem for Rosenbrock {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let init = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| if i % 2 == 0 { -1.2 } else { 1.0 }),
        );

        vec![init]
    }
}

/// [Trid function](https://www.sfu.ca/~ssurjano/trid.html), a convex
/// quadratic with a tridiagonal Hessian.
///
/// The unique minimizer is `x_i = (i + 1)(n - i)` (0-based), which makes the
/// function convenient for accuracy assertions against an analytic solution.
#[derive(Debug, Clone, Copy)]
pub struct Trid {
    n: usize,
}

impl Trid {
    /// Initializes the function with given dimension.
    pub fn new(n: usize) -> Self {
        assert!(n > 1, "n must be greater than one");
        Self { n }
    }

    /// The analytic minimizer.
    pub fn solution(&self) -> OVector<f64, Dyn> {
        DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| ((i + 1) * (self.n - i)) as f64),
        )
    }
}

impl Problem for Trid {
    type Field = f64;

    fn dim(&self) -> usize {
        self.n
    }
}

impl Function for Trid {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        let squares: f64 = x.iter().map(|xi| (xi - 1.0) * (xi - 1.0)).sum();
        let products: f64 = (1..self.n).map(|i| x[i] * x[i - 1]).sum();
        squares - products
    }
}

impl TestProblem for Trid {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::zeros(self.n)]
    }
}

/// [Powell singular function](https://www.sfu.ca/~ssurjano/powell.html)
/// \[1,2\].
///
/// Both the gradient and the Hessian are singular in the solution, which
/// makes the final phase of convergence hard for model-based methods.
#[derive(Debug, Clone, Copy)]
pub struct PowellSingular {
    n: usize,
}

impl PowellSingular {
    /// Initializes the function with given dimension.
    ///
    /// The dimension **must** be a multiple of 4.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "n must be greater than zero");
        assert!(n % 4 == 0, "n must be a multiple of 4");
        Self { n }
    }
}

impl Default for PowellSingular {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Problem for PowellSingular {
    type Field = f64;

    fn dim(&self) -> usize {
        self.n
    }
}

impl Function for PowellSingular {
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        (0..self.n / 4)
            .map(|i| {
                let x1 = x[4 * i];
                let x2 = x[4 * i + 1];
                let x3 = x[4 * i + 2];
                let x4 = x[4 * i + 3];

                let t1 = x1 + 10.0 * x2;
                let t2 = x3 - x4;
                let t3 = x2 - 2.0 * x3;
                let t4 = x1 - x4;

                t1 * t1 + 5.0 * t2 * t2 + t3 * t3 * t3 * t3 + 10.0 * t4 * t4 * t4 * t4
            })
            .sum()
    }
}

impl TestProblem for PowellSingular {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        let init = DVector::from_iterator(
            self.n,
            (0..self.n).map(|i| match i % 4 {
                0 => 3.0,
                1 => -1.0,
                2 => 0.0,
                3 => 1.0,
                _ => unreachable!(),
            }),
        );

        vec![init]
    }
}

/// A function that takes the same value everywhere.
#[derive(Debug, Clone, Copy)]
pub struct Constant {
    n: usize,
    value: f64,
}

impl Constant {
    /// Initializes the function with given dimension and value.
    pub fn new(n: usize, value: f64) -> Self {
        assert!(n > 0, "n must be greater than zero");
        Self { n, value }
    }
}

impl Problem for Constant {
    type Field = f64;

    fn dim(&self) -> usize {
        self.n
    }
}

impl Function for Constant {
    fn apply<Sx>(&self, _x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous,
    {
        self.value
    }
}

impl TestProblem for Constant {
    fn initials(&self) -> Vec<OVector<Self::Field, Dyn>> {
        vec![DVector::zeros(self.n)]
    }
}

/// A simple minimization driver that can be used in tests.
pub fn minimize<F: Function<Field = f64>>(
    f: &F,
    x0: Vec<f64>,
    rhobeg: f64,
    rhoend: f64,
    maxfun: usize,
) -> Minimum<f64> {
    let mut options = NewuoaOptions::default();
    options
        .set_rhobeg(rhobeg)
        .set_rhoend(rhoend)
        .set_maxfun(maxfun);

    NewuoaDriver::builder(f)
        .with_initial(x0)
        .with_options(options)
        .build()
        .minimize()
}
