use nalgebra::{storage::Storage, Dyn, IsContiguous, Vector};

use super::base::Problem;

/// Definition of an objective function.
///
/// ## Defining a function
///
/// A function is any type that implements [`Function`] and [`Problem`]
/// traits.
///
/// ```rust
/// use newuoa::nalgebra as na;
/// use newuoa::{Function, Problem};
/// use na::{Dyn, IsContiguous};
///
/// struct Rosenbrock {
///     a: f64,
///     b: f64,
/// }
///
/// impl Problem for Rosenbrock {
///     type Field = f64;
///
///     fn dim(&self) -> usize {
///         2
///     }
/// }
///
/// impl Function for Rosenbrock {
///     fn apply<Sx>(&self, x: &na::Vector<Self::Field, Dyn, Sx>) -> Self::Field
///     where
///         Sx: na::storage::Storage<Self::Field, Dyn> + IsContiguous,
///     {
///         (self.a - x[0]).powi(2) + self.b * (x[1] - x[0].powi(2)).powi(2)
///     }
/// }
/// ```
///
/// The function receives a read-only view of the variables and returns a
/// single scalar. Any state that the evaluation needs (parameters, buffers,
/// counters behind interior mutability) lives on the implementing type, so
/// independent minimization runs can own independent instances. Returning NaN
/// or positive infinity is allowed and treated by the driver as a terminal
/// condition, not as an error to recover from.
pub trait Function: Problem {
    /// Calculates the function value in given point.
    fn apply<Sx>(&self, x: &Vector<Self::Field, Dyn, Sx>) -> Self::Field
    where
        Sx: Storage<Self::Field, Dyn> + IsContiguous;
}
