//! Log-space linear algebra primitives for the pruning likelihood.
//!
//! Probabilities live in log space throughout the likelihood; these helpers
//! keep the arithmetic stable by factoring the largest term out before any
//! exponentiation.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Numerically stable `log(sum(exp(values)))`.
///
/// The maximum is factored out before exponentiating, so widely shifted
/// inputs neither overflow nor underflow. An empty or all `-inf` input
/// yields `-inf` (the log of an empty sum).
pub fn log_sum_exp(values: ArrayView1<f64>) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        return max;
    }
    let sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Integer matrix power by repeated squaring.
///
/// `exponent = 0` yields the identity. Cost is `O(log exponent)` matrix
/// multiplications.
///
/// # Panics
///
/// Panics if `matrix` is not square.
pub fn matrix_power(matrix: ArrayView2<f64>, exponent: u64) -> Array2<f64> {
    assert_eq!(matrix.nrows(), matrix.ncols(), "matrix must be square");
    let mut result = Array2::eye(matrix.nrows());
    let mut base = matrix.to_owned();
    let mut remaining = exponent;
    while remaining > 0 {
        if remaining & 1 == 1 {
            result = result.dot(&base);
        }
        remaining >>= 1;
        if remaining > 0 {
            base = base.dot(&base);
        }
    }
    result
}

/// Stable `log(matrix . exp(log_vector))`.
///
/// The log-sum-exp of the vector is factored out, the remainder is
/// exponentiated (all entries in `[0, 1]`), multiplied through the
/// probability-domain `matrix`, and the shift restored after the log. A
/// vector that is entirely `-inf` (an impossible state distribution) stays
/// entirely `-inf` instead of degrading to NaN.
///
/// # Panics
///
/// Panics if `matrix` is not square with side `log_vector.len()`.
pub fn log_matrix_vector(matrix: ArrayView2<f64>, log_vector: ArrayView1<f64>) -> Array1<f64> {
    let shift = log_sum_exp(log_vector);
    if shift == f64::NEG_INFINITY {
        return Array1::from_elem(log_vector.len(), f64::NEG_INFINITY);
    }
    let probs = log_vector.mapv(|v| (v - shift).exp());
    let mixed = matrix.dot(&probs);
    mixed.mapv(|v| v.ln() + shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_log_sum_exp_basic() {
        let values = array![0.5_f64.ln(), 0.5_f64.ln()];
        assert!((log_sum_exp(values.view())).abs() < 1e-12);
    }

    #[test]
    fn test_log_sum_exp_shifted() {
        // Naive exp would overflow; the shifted form is exact.
        let values = array![1000.0, 1000.0];
        let expected = 1000.0 + 2.0_f64.ln();
        assert!((log_sum_exp(values.view()) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_log_sum_exp_all_negative_infinity() {
        let values = array![f64::NEG_INFINITY, f64::NEG_INFINITY];
        assert_eq!(log_sum_exp(values.view()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_log_sum_exp_empty() {
        let values = Array1::<f64>::zeros(0);
        assert_eq!(log_sum_exp(values.view()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_log_sum_exp_ignores_impossible_entries() {
        let values = array![0.0, f64::NEG_INFINITY];
        assert!((log_sum_exp(values.view())).abs() < 1e-12);
    }

    #[test]
    fn test_matrix_power_zero_is_identity() {
        let matrix = array![[0.3, 0.7], [0.6, 0.4]];
        assert_eq!(matrix_power(matrix.view(), 0), Array2::eye(2));
    }

    #[test]
    fn test_matrix_power_one_is_input() {
        let matrix = array![[0.3, 0.7], [0.6, 0.4]];
        assert_eq!(matrix_power(matrix.view(), 1), matrix);
    }

    #[test]
    fn test_matrix_power_matches_repeated_multiplication() {
        let matrix = array![[0.9, 0.1], [0.2, 0.8]];
        let expected = matrix.dot(&matrix).dot(&matrix).dot(&matrix).dot(&matrix);
        let powered = matrix_power(matrix.view(), 5);
        for (a, b) in powered.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12, "power mismatch: {a} vs {b}");
        }
    }

    #[test]
    fn test_matrix_power_preserves_row_sums() {
        let matrix = array![[0.9, 0.1], [0.25, 0.75]];
        let powered = matrix_power(matrix.view(), 17);
        for row in powered.rows() {
            let sum: f64 = row.sum();
            assert!((sum - 1.0).abs() < 1e-9, "row sum drifted to {sum}");
        }
    }

    #[test]
    fn test_log_matrix_vector_matches_direct() {
        let matrix = array![[0.9, 0.1], [0.2, 0.8]];
        let log_vector = array![0.25_f64.ln(), 0.75_f64.ln()];
        let result = log_matrix_vector(matrix.view(), log_vector.view());

        let direct = matrix.dot(&array![0.25, 0.75]).mapv(f64::ln);
        for (a, b) in result.iter().zip(direct.iter()) {
            assert!((a - b).abs() < 1e-12, "lmve mismatch: {a} vs {b}");
        }
    }

    #[test]
    fn test_log_matrix_vector_deep_underflow() {
        // Both entries are e^-1000: far beyond f64 range without the shift.
        let matrix = array![[0.5, 0.5], [0.5, 0.5]];
        let log_vector = array![-1000.0, -1000.0];
        let result = log_matrix_vector(matrix.view(), log_vector.view());
        for &v in result.iter() {
            assert!((v + 1000.0).abs() < 1e-9, "lost the shift: {v}");
        }
    }

    #[test]
    fn test_log_matrix_vector_impossible_stays_impossible() {
        let matrix = array![[1.0, 0.0], [0.0, 1.0]];
        let log_vector = array![f64::NEG_INFINITY, f64::NEG_INFINITY];
        let result = log_matrix_vector(matrix.view(), log_vector.view());
        assert!(result.iter().all(|v| *v == f64::NEG_INFINITY));
    }

    #[test]
    fn test_log_matrix_vector_single_support() {
        // Mass on state 0 only: the result is the log of the matrix column.
        let matrix = array![[0.9, 0.1], [0.2, 0.8]];
        let log_vector = array![0.0, f64::NEG_INFINITY];
        let result = log_matrix_vector(matrix.view(), log_vector.view());
        assert!((result[0] - 0.9_f64.ln()).abs() < 1e-12);
        assert!((result[1] - 0.2_f64.ln()).abs() < 1e-12);
    }
}
