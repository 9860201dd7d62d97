//! Table lookup over rectilinear grids

use ndarray::Array2;

/// Locates `x` on an ascending `axis` and returns the lower knot index and the
/// normalized position `t` inside the bracketing interval.
///
/// `x` is clamped to `[axis[0], axis[n-1]]`, so `t` is always in `[0, 1]`. An
/// axis with a single knot always returns `(0, 0.0)`. When `x` falls exactly
/// on a knot, `t` is exactly `0.0` or `1.0`.
pub fn locate(axis: &[f64], x: f64) -> (usize, f64) {
    let n = axis.len();
    if n < 2 {
        return (0, 0.0);
    }
    let x = x.max(axis[0]).min(axis[n - 1]);
    // first knot strictly greater than x, kept inside [1, n-1]
    let upper = axis.partition_point(|&knot| knot <= x).max(1).min(n - 1);
    let lower = upper - 1;
    let t = (x - axis[lower]) / (axis[upper] - axis[lower]);
    (lower, t)
}

/// Linear interpolation written so that `t == 0` and `t == 1` return `a` and `b` exactly
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    (1.0 - t) * a + t * b
}

/// Bilinear interpolation of `grid` at `(x, y)`.
///
/// `grid` has shape `(x_axis.len(), y_axis.len())`. Inputs outside the axes
/// saturate at the boundary row/column instead of being extrapolated.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use vanos_engine_simulator::numerics::interpolation::bilinear;
///
/// let grid = array![[0.0, 10.0], [20.0, 30.0]];
/// let value = bilinear(&[0.0, 1.0], &[0.0, 1.0], &grid, 0.5, 0.5);
/// assert_eq!(value, 15.0);
/// assert_eq!(bilinear(&[0.0, 1.0], &[0.0, 1.0], &grid, -4.0, 1.0), 10.0);
/// ```
pub fn bilinear(x_axis: &[f64], y_axis: &[f64], grid: &Array2<f64>, x: f64, y: f64) -> f64 {
    let (i, tx) = locate(x_axis, x);
    let (j, ty) = locate(y_axis, y);
    let i1 = (i + 1).min(x_axis.len() - 1);
    let j1 = (j + 1).min(y_axis.len() - 1);

    let low = lerp(grid[[i, j]], grid[[i, j1]], ty);
    let high = lerp(grid[[i1, j]], grid[[i1, j1]], ty);
    lerp(low, high, tx)
}

/// Returns `true` if every element is strictly greater than the previous one
pub fn is_strictly_ascending(axis: &[f64]) -> bool {
    axis.windows(2).all(|w| w[0] < w[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn locate_brackets_and_clamps() {
        let axis = [1.0, 2.0, 4.0, 8.0];
        assert_eq!(locate(&axis, 1.0), (0, 0.0));
        assert_eq!(locate(&axis, 3.0), (1, 0.5));
        assert_eq!(locate(&axis, 8.0), (2, 1.0));
        assert_eq!(locate(&axis, 100.0), (2, 1.0));
        assert_eq!(locate(&axis, -100.0), (0, 0.0));
        assert_eq!(locate(&[5.0], 100.0), (0, 0.0));
    }

    #[test]
    fn knots_are_recovered_exactly() {
        let x_axis = [600.0, 900.0, 1100.0];
        let y_axis = [0.15, 0.4, 0.8, 1.2];
        let grid = array![
            [130.1, 129.3, 125.7, 120.9],
            [117.3, 115.1, 110.3, 105.0],
            [94.7, 88.1, 82.3, 76.9],
        ];
        for (i, &x) in x_axis.iter().enumerate() {
            for (j, &y) in y_axis.iter().enumerate() {
                assert_eq!(bilinear(&x_axis, &y_axis, &grid, x, y), grid[[i, j]]);
            }
        }
    }

    #[test]
    fn non_uniform_spacing() {
        let x_axis = [0.0, 1.0, 4.0];
        let y_axis = [0.0, 10.0];
        let grid = array![[0.0, 0.0], [10.0, 10.0], [40.0, 40.0]];
        let v = bilinear(&x_axis, &y_axis, &grid, 2.5, 3.0);
        assert!((v - 25.0).abs() < 1e-12);
    }

    #[test]
    fn ascending_check() {
        assert!(is_strictly_ascending(&[1.0, 2.0, 3.0]));
        assert!(!is_strictly_ascending(&[1.0, 1.0, 3.0]));
        assert!(!is_strictly_ascending(&[3.0, 2.0]));
    }
}
