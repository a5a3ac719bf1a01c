//! Shared test utilities for the zonal statistics workspace.
//!
//! This crate provides common testing infrastructure including:
//! - The reference 4x4 grid and LEFT/TOP/RIGHT admin polygons
//! - Grid and polygon generators
//! - Temporary file helpers
//! - Approximate float assertions
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, fixtures};
//! ```

pub mod files;
pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use files::*;
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
    ($left:expr, $right:expr) => {
        $crate::assert_approx_eq!($left, $right, 1e-9)
    };
}

/// Asserts that an `Option<f64>` statistic was computed and is NaN.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_nan_stat;
///
/// assert_nan_stat!(zone.mean);
/// ```
#[macro_export]
macro_rules! assert_nan_stat {
    ($value:expr) => {{
        match $value {
            Some(v) if f64::is_nan(v) => {}
            other => panic!(
                "assertion failed: `{}` is not Some(NaN): {:?}",
                stringify!($value),
                other
            ),
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
        assert_approx_eq!(0.1 + 0.2, 0.3);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_rejects_nan() {
        assert_approx_eq!(f64::NAN, 1.0, 0.001);
    }

    #[test]
    fn test_assert_nan_stat() {
        assert_nan_stat!(Some(f64::NAN));
    }

    #[test]
    #[should_panic(expected = "is not Some(NaN)")]
    fn test_assert_nan_stat_fails_on_none() {
        let missing: Option<f64> = None;
        assert_nan_stat!(missing);
    }
}
