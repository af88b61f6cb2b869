//! Maximum principal stress via Cardano's method (spec.md §4.3.1 step 7).

/// Largest real root of `lambda^3 - i1*lambda^2 + i2*lambda - i3 = 0`, the
/// characteristic polynomial of a symmetric 3x3 stress tensor with
/// invariants `i1, i2, i3`.
///
/// Solved via Cardano's method on the depressed cubic. A real symmetric
/// tensor always has three real eigenvalues, so the depressed-cubic
/// discriminant is (up to floating-point noise) non-positive and the
/// trigonometric branch is taken; the single-real-root Cardano branch is
/// kept only as a guard against that noise.
pub fn max_principal_stress(i1: f64, i2: f64, i3: f64) -> f64 {
    let p = i2 - i1 * i1 / 3.0;
    let q = -2.0 * i1.powi(3) / 27.0 + i1 * i2 / 3.0 - i3;

    if p.abs() < 1e-9 {
        // Degenerate depressed cubic t^3 = -q (triple/near-triple root).
        return (-q).cbrt() + i1 / 3.0;
    }

    let discriminant = (q / 2.0).powi(2) + (p / 3.0).powi(3);

    if discriminant <= 0.0 {
        let neg_p_3 = (-p / 3.0).max(0.0);
        let r = neg_p_3.sqrt();
        let arg = if r > 1e-300 {
            ((3.0 * q) / (2.0 * p) * (-3.0 / p).sqrt()).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let theta = arg.acos() / 3.0;

        let mut max_t = f64::NEG_INFINITY;
        for k in 0..3 {
            let t = 2.0 * r * (theta - 2.0 * std::f64::consts::PI * k as f64 / 3.0).cos();
            max_t = max_t.max(t);
        }
        max_t + i1 / 3.0
    } else {
        let sqrt_disc = discriminant.sqrt();
        let u = (-q / 2.0 + sqrt_disc).cbrt();
        let v = (-q / 2.0 - sqrt_disc).cbrt();
        u + v + i1 / 3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariants of a diagonal tensor reduce to the textbook elementary
    /// symmetric polynomials of its eigenvalues.
    fn invariants_of_diagonal(a: f64, b: f64, c: f64) -> (f64, f64, f64) {
        (a + b + c, a * b + b * c + c * a, a * b * c)
    }

    #[test]
    fn diagonal_tensor_recovers_largest_eigenvalue() {
        let (i1, i2, i3) = invariants_of_diagonal(5.0, -2.0, 1.0);
        let max_root = max_principal_stress(i1, i2, i3);
        assert!((max_root - 5.0).abs() < 1e-6, "got {}", max_root);
    }

    #[test]
    fn isotropic_tensor_has_single_repeated_root() {
        let (i1, i2, i3) = invariants_of_diagonal(3.0, 3.0, 3.0);
        let max_root = max_principal_stress(i1, i2, i3);
        assert!((max_root - 3.0).abs() < 1e-6, "got {}", max_root);
    }

    #[test]
    fn negative_definite_tensor_max_root_is_least_negative() {
        let (i1, i2, i3) = invariants_of_diagonal(-1.0, -5.0, -9.0);
        let max_root = max_principal_stress(i1, i2, i3);
        assert!((max_root - (-1.0)).abs() < 1e-6, "got {}", max_root);
    }

    #[test]
    fn zero_tensor_has_zero_max_root() {
        assert!((max_principal_stress(0.0, 0.0, 0.0)).abs() < 1e-9);
    }
}
