//! Piecewise-linear lookup and guarded division.

use crate::FloatValue;

/// Linearly interpolate `x` in the breakpoint table `(xs, ys)`.
///
/// Values outside the table take the nearest end value. The `xs` breakpoints
/// must be sorted in ascending order and have the same length as `ys`.
/// An empty table returns zero.
///
/// # Example
/// ```
/// use soiln_core::utils::interpolation::linear_interp;
///
/// let xs = [0.0, 1.0, 2.0];
/// let ys = [0.0, 10.0, 10.0];
/// assert!((linear_interp(0.5, &xs, &ys) - 5.0).abs() < 1e-12);
/// assert!((linear_interp(-1.0, &xs, &ys) - 0.0).abs() < 1e-12);
/// assert!((linear_interp(5.0, &xs, &ys) - 10.0).abs() < 1e-12);
/// ```
pub fn linear_interp(x: FloatValue, xs: &[FloatValue], ys: &[FloatValue]) -> FloatValue {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return 0.0;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }

    for i in 1..n {
        if x <= xs[i] {
            let span = xs[i] - xs[i - 1];
            if span <= 0.0 {
                return ys[i];
            }
            let w = (x - xs[i - 1]) / span;
            return ys[i - 1] + w * (ys[i] - ys[i - 1]);
        }
    }
    ys[n - 1]
}

/// Divide `numerator` by `denominator`, returning `default` when the
/// denominator is zero or the result is not finite.
pub fn divide(numerator: FloatValue, denominator: FloatValue, default: FloatValue) -> FloatValue {
    if denominator == 0.0 {
        return default;
    }
    let result = numerator / denominator;
    if result.is_finite() {
        result
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interp_inside_table() {
        let xs = [0.0, 28.0, 88.0, 100.0];
        let ys = [0.1, 0.1, 1.0, 1.18];
        let v = linear_interp(58.0, &xs, &ys);
        assert!((v - 0.55).abs() < 1e-12, "Expected 0.55, got {}", v);
    }

    #[test]
    fn test_interp_clamps_at_ends() {
        let xs = [0.0, 4.5, 6.0, 8.0, 9.0, 14.0];
        let ys = [0.0, 0.0, 1.0, 1.0, 0.0, 0.0];
        assert_eq!(linear_interp(-3.0, &xs, &ys), 0.0);
        assert_eq!(linear_interp(20.0, &xs, &ys), 0.0);
        assert_eq!(linear_interp(7.0, &xs, &ys), 1.0);
    }

    #[test]
    fn test_interp_repeated_breakpoint() {
        // A vertical step should not divide by zero
        let xs = [0.0, 1.0, 1.0, 2.0];
        let ys = [0.0, 0.0, 1.0, 1.0];
        let v = linear_interp(1.0, &xs, &ys);
        assert!(v.is_finite());
    }

    #[test]
    fn test_interp_empty_table() {
        assert_eq!(linear_interp(1.0, &[], &[]), 0.0);
    }

    #[test]
    fn test_divide_guards_zero() {
        assert_eq!(divide(1.0, 0.0, 0.0), 0.0);
        assert_eq!(divide(1.0, 4.0, 0.0), 0.25);
    }
}
