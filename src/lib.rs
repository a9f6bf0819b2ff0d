#![allow(clippy::many_single_char_names)]
#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

//! # NEWUOA
//!
//! A pure Rust implementation of Powell's NEWUOA method for unconstrained
//! minimization of a scalar function of *n* real variables when only
//! point-wise function values are available.
//!
//! The method maintains a quadratic interpolation model built from `npt`
//! sample points (`2n + 1` by default) and refines it by alternating
//! trust-region steps, which reduce the objective, with geometry steps, which
//! keep the sample set well poised. No gradient, Hessian or Jacobian is ever
//! requested from the caller.
//!
//! ## Problem
//!
//! A problem is any type that implements the [`Problem`] and [`Function`]
//! traits.
//!
//! ```rust
//! use newuoa::nalgebra as na;
//! use newuoa::{Function, Problem};
//! use na::{Dyn, IsContiguous};
//!
//! struct Rosenbrock {
//!     a: f64,
//!     b: f64,
//! }
//!
//! impl Problem for Rosenbrock {
//!     // The numeric type. Usually f64 or f32.
//!     type Field = f64;
//!
//!     // The number of variables.
//!     fn dim(&self) -> usize {
//!         2
//!     }
//! }
//!
//! impl Function for Rosenbrock {
//!     // Evaluate trial values of variables.
//!     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//!     where
//!         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//!     {
//!         (self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2)
//!     }
//! }
//! ```
//!
//! ## Minimizing
//!
//! When you have your function available, use the [`NewuoaDriver`] to run the
//! iterative process until one of the stopping conditions is reached.
//!
//! ```rust
//! use newuoa::NewuoaDriver;
//! # use newuoa::nalgebra as na;
//! # use newuoa::{Function, Problem};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct Rosenbrock {
//! #     a: f64,
//! #     b: f64,
//! # }
//! #
//! # impl Problem for Rosenbrock {
//! #     type Field = f64;
//! #
//! #     fn dim(&self) -> usize {
//! #         2
//! #     }
//! # }
//! #
//! # impl Function for Rosenbrock {
//! #     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
//! #     where
//! #         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
//! #     {
//! #         (self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2)
//! #     }
//! # }
//!
//! let f = Rosenbrock { a: 1.0, b: 100.0 };
//!
//! let mut driver = NewuoaDriver::builder(&f)
//!     .with_initial(vec![-1.2, 1.0])
//!     .build();
//!
//! let minimum = driver.minimize();
//!
//! if minimum.status().is_failure() {
//!     println!("minimization failed: {:?}", minimum.status());
//! } else {
//!     println!(
//!         "f = {} at {:?} after {} evaluations",
//!         minimum.fx(),
//!         minimum.x(),
//!         minimum.nf()
//!     );
//! }
//! ```
//!
//! ## Stopping conditions
//!
//! The driver stops when the trust-region radius reaches its final value
//! (normal convergence), when the target objective value is reached, when the
//! evaluation budget is exhausted, or when the objective or the model becomes
//! numerically poisoned (NaN or infinity). See [`ExitStatus`] for the full
//! list. Every exit, including the failures, preserves the best point found
//! so far.
//!
//! ## References
//!
//! \[1\] [The NEWUOA software for unconstrained optimization without
//! derivatives](https://link.springer.com/chapter/10.1007/0-387-30065-1_16)
//!
//! \[2\] [Least Frobenius norm updating of quadratic models that satisfy
//! interpolation conditions](https://link.springer.com/article/10.1007/s10107-003-0490-7)
//!
//! ## License
//!
//! Licensed under MIT.

mod core;
pub mod driver;
mod geometry;
mod hmat;
mod initial;
mod model;
mod subproblem;

pub use crate::core::*;
pub use driver::{ExitStatus, Failure, Minimum, NewuoaBuilder, NewuoaDriver, NewuoaOptions};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
