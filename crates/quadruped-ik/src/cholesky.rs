//! Dense Cholesky factorization for small symmetric positive-definite
//! systems.
//!
//! No pivoting. Callers keep the system well conditioned by construction
//! (the IK solver adds `λI` to `JJᵀ`).

use nalgebra::{SMatrix, SVector};

use quadruped_core::LinalgError;

/// Factor `a = L·Lᵀ` in place.
///
/// Reads the lower triangle of `a` and overwrites it with `L`. The strict
/// upper triangle is neither read nor written.
///
/// # Errors
///
/// [`LinalgError::NotPositiveDefinite`] if any pivot radicand is not
/// strictly positive (including NaN).
pub fn factorize<const D: usize>(a: &mut SMatrix<f64, D, D>) -> Result<(), LinalgError> {
    for i in 0..D {
        let mut radicand = a[(i, i)];
        for k in 0..i {
            radicand -= a[(i, k)] * a[(i, k)];
        }
        if radicand.is_nan() || radicand <= 0.0 {
            return Err(LinalgError::NotPositiveDefinite { pivot: i, radicand });
        }
        let pivot = radicand.sqrt();
        a[(i, i)] = pivot;

        for j in (i + 1)..D {
            let mut sum = a[(j, i)];
            for k in 0..i {
                sum -= a[(j, k)] * a[(i, k)];
            }
            a[(j, i)] = sum / pivot;
        }
    }
    Ok(())
}

/// Solve `L·Lᵀ·x = b` given the lower-triangular factor from [`factorize`].
#[must_use]
pub fn solve<const D: usize>(l: &SMatrix<f64, D, D>, b: &SVector<f64, D>) -> SVector<f64, D> {
    // Forward: L·y = b
    let mut y = SVector::<f64, D>::zeros();
    for i in 0..D {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[(i, k)] * y[k];
        }
        y[i] = sum / l[(i, i)];
    }

    // Back: Lᵀ·x = y
    let mut x = SVector::<f64, D>::zeros();
    for i in (0..D).rev() {
        let mut sum = y[i];
        for k in (i + 1)..D {
            sum -= l[(k, i)] * x[k];
        }
        x[i] = sum / l[(i, i)];
    }
    x
}

/// An owned Cholesky factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CholeskyFactor<const D: usize> {
    lower: SMatrix<f64, D, D>,
}

impl<const D: usize> CholeskyFactor<D> {
    /// Factor a symmetric positive-definite matrix.
    ///
    /// # Errors
    ///
    /// See [`factorize`].
    pub fn new(mut a: SMatrix<f64, D, D>) -> Result<Self, LinalgError> {
        factorize(&mut a)?;
        Ok(Self {
            lower: a.lower_triangle(),
        })
    }

    /// Lower-triangular factor `L`.
    #[must_use]
    pub const fn lower(&self) -> &SMatrix<f64, D, D> {
        &self.lower
    }

    /// Solve `A·x = b`.
    #[must_use]
    pub fn solve(&self, b: &SVector<f64, D>) -> SVector<f64, D> {
        solve(&self.lower, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn reference_four_by_four() {
        let a = Matrix4::new(
            3.003_217_436_238_645, 1.659_068_572_274_807, 2.432_642_921_790_789, 1.279_492_052_255_865,
            1.659_068_572_274_807, 1.289_834_014_392_391, 1.450_692_528_403_469, 0.657_039_422_017_651,
            2.432_642_921_790_789, 1.450_692_528_403_469, 2.847_823_143_596_547, 1.391_123_829_732_284,
            1.279_492_052_255_865, 0.657_039_422_017_651, 1.391_123_829_732_284, 0.969_167_182_059_849,
        );
        let b = Vector4::new(
            0.351_659_507_062_997,
            0.830_828_627_896_291,
            0.585_264_091_152_724,
            0.549_723_608_291_140,
        );
        let expected = Vector4::new(
            -1.280_018_108_747_851,
            2.100_872_981_518_109,
            -0.595_963_245_646_154,
            1.688_252_489_992_340,
        );

        let mut l = a;
        factorize(&mut l).unwrap();
        let x = solve(&l, &b);
        assert_relative_eq!(x, expected, epsilon = 1e-9);
    }

    #[test]
    fn factor_reproduces_matrix() {
        let a = Matrix3::new(4.0, 12.0, -16.0, 12.0, 37.0, -43.0, -16.0, -43.0, 98.0);
        let factor = CholeskyFactor::new(a).unwrap();
        let expected = Matrix3::new(2.0, 0.0, 0.0, 6.0, 1.0, 0.0, -8.0, 5.0, 3.0);
        assert_relative_eq!(*factor.lower(), expected, epsilon = 1e-12);
        let l = factor.lower();
        assert_relative_eq!(l * l.transpose(), a, epsilon = 1e-12);
    }

    #[test]
    fn upper_triangle_is_ignored() {
        let mut a = Matrix3::new(4.0, 999.0, 999.0, 12.0, 37.0, 999.0, -16.0, -43.0, 98.0);
        factorize(&mut a).unwrap();
        assert_relative_eq!(a[(2, 1)], 5.0, epsilon = 1e-12);
        assert_relative_eq!(a[(0, 2)], 999.0);
    }

    #[test]
    fn matches_nalgebra_on_random_spd() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..50 {
            let m = Matrix3::from_fn(|_, _| rng.gen_range(-1.0..1.0));
            let a = m * m.transpose() + Matrix3::identity() * 0.02;
            let b = Vector3::from_fn(|_, _| rng.gen_range(-1.0..1.0));

            let ours = CholeskyFactor::new(a).unwrap().solve(&b);
            let reference = nalgebra::Cholesky::new(a).unwrap().solve(&b);
            assert_relative_eq!(ours, reference, epsilon = 1e-9, max_relative = 1e-9);
        }
    }

    #[test]
    fn negative_pivot_is_reported() {
        let a = Matrix3::new(1.0, 0.0, 0.0, 2.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let err = CholeskyFactor::new(a).unwrap_err();
        assert!(matches!(err, LinalgError::NotPositiveDefinite { pivot: 1, radicand } if radicand < 0.0));
    }

    #[test]
    fn zero_and_nan_pivots_are_reported() {
        assert!(CholeskyFactor::new(Matrix3::<f64>::zeros()).is_err());
        let mut a = Matrix3::<f64>::identity();
        a[(0, 0)] = f64::NAN;
        assert!(CholeskyFactor::new(a).is_err());
    }
}
