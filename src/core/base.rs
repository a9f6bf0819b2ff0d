/// The base trait for [`Function`](crate::Function).
pub trait Problem {
    /// Type of the field, usually f32 or f64.
    type Field: RealField + Copy;

    /// Get the number of variables of the problem.
    fn dim(&self) -> usize;
}

/// Extension of [`nalgebra::RealField`] with constants that the algorithm
/// internals need.
pub trait RealField: nalgebra::RealField {
    /// Machine epsilon.
    const EPSILON: Self;

    /// Square root of machine epsilon. This value is a standard constant for
    /// tolerances in numerical code that works with function values.
    const EPSILON_SQRT: Self;
}

impl RealField for f32 {
    const EPSILON: Self = f32::EPSILON;
    const EPSILON_SQRT: Self = 0.00034526698;
}

impl RealField for f64 {
    const EPSILON: Self = f64::EPSILON;
    const EPSILON_SQRT: Self = 0.000000014901161193847656;
}

/// NaN test that works for any field type.
#[allow(clippy::eq_op)]
pub(crate) fn is_nan<T: RealField + Copy>(v: T) -> bool {
    v != v
}
