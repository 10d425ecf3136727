use std::ops::Range;

use gbp_linalg::prelude::*;
use ndarray::{s, Axis};

use crate::{inverse, CanonicalGaussian, GaussianError, Result};

type Aa = Matrix<Float>;
type Ab = Matrix<Float>;
type Ba = Matrix<Float>;
type Bb = Matrix<Float>;

/// Indices of `0..dim` that are not in `keep`, in ascending order
fn complement(keep: &Range<usize>, dim: usize) -> Vec<usize> {
    (0..keep.start).chain(keep.end..dim).collect()
}

/// Partition a precision matrix into the kept block `a` and the eliminated
/// indices `b`.
fn extract_submatrices_from_precision_matrix(
    precision_matrix: &Matrix<Float>,
    keep: Range<usize>,
    eliminate: &[usize],
) -> (Aa, Ab, Ba, Bb) {
    debug_assert!(precision_matrix.is_square());
    let rows_a = precision_matrix.slice(s![keep.clone(), ..]);
    let rows_b = precision_matrix.select(Axis(0), eliminate);

    let aa = rows_a.slice(s![.., keep.clone()]).to_owned();
    let ab = rows_a.select(Axis(1), eliminate);
    let ba = rows_b.slice(s![.., keep]).to_owned();
    let bb = rows_b.select(Axis(1), eliminate);

    (aa, ab, ba, bb)
}

impl CanonicalGaussian {
    /// Marginalise the distribution onto the contiguous block `keep`,
    /// eliminating every other index with the Schur complement:
    ///
    /// - `eta' = eta_a - lam_ab · lam_bb⁻¹ · eta_b`
    /// - `lam' = lam_aa - lam_ab · lam_bb⁻¹ · lam_ba`
    ///
    /// Keeping the full range returns the distribution unchanged.
    ///
    /// # Errors
    ///
    /// - [`GaussianError::BlockOutOfBounds`] if `keep` is empty or reaches
    ///   past the dimension of the distribution
    /// - a numerical instability error if `lam_bb` cannot be inverted
    ///
    /// ```
    /// use gbp_gaussian::CanonicalGaussian;
    /// use ndarray::array;
    /// let joint = CanonicalGaussian::new(
    ///     array![1.0, 2.0],
    ///     array![[2.0, 1.0], [1.0, 2.0]],
    /// )
    /// .unwrap();
    /// let marginal = joint.marginalise(0..1).unwrap();
    /// assert_eq!(marginal.information_vector(), &array![0.0]);
    /// assert_eq!(marginal.precision_matrix(), &array![[1.5]]);
    /// ```
    #[allow(clippy::similar_names)]
    pub fn marginalise(&self, keep: Range<usize>) -> Result<Self> {
        let dim = self.len();
        if keep.is_empty() || keep.end > dim {
            return Err(GaussianError::BlockOutOfBounds {
                start: keep.start,
                end: keep.end,
                dim,
            });
        }

        let eliminate = complement(&keep, dim);
        if eliminate.is_empty() {
            return Ok(self.clone());
        }

        let (lam_aa, lam_ab, lam_ba, lam_bb) =
            extract_submatrices_from_precision_matrix(self.precision_matrix(), keep.clone(), &eliminate);
        let eta_a = self.information_vector().slice(s![keep]);
        let eta_b = self.information_vector().select(Axis(0), &eliminate);

        let lam_bb_inv = inverse::invert(&lam_bb)?;
        let gain = lam_ab.dot(&lam_bb_inv);

        let information_vector = &eta_a - &gain.dot(&eta_b);
        let precision_matrix = &lam_aa - &gain.dot(&lam_ba);

        Self::new(information_vector, precision_matrix)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::{array, concatenate};
    use pretty_assertions::assert_eq;

    use super::*;

    macro_rules! generate_4x4_precision_matrix {
        () => {{
            let upper_left = array![[1., 2.], [5., 6.]];
            let upper_right = array![[3., 4.], [7., 8.]];
            let lower_left = array![[9., 10.], [13., 14.]];
            let lower_right = array![[11., 12.], [15., 16.]];

            let precision_matrix = concatenate![
                Axis(0),
                concatenate![Axis(1), upper_left, upper_right],
                concatenate![Axis(1), lower_left, lower_right]
            ];
            (
                precision_matrix,
                upper_left,
                upper_right,
                lower_left,
                lower_right,
            )
        }};
    }

    #[test]
    fn extract_submatrices_keeping_first_block() {
        let (precision_matrix, upper_left, upper_right, lower_left, lower_right) =
            generate_4x4_precision_matrix!();
        let (aa, ab, ba, bb) =
            extract_submatrices_from_precision_matrix(&precision_matrix, 0..2, &[2, 3]);
        assert_eq!(aa, upper_left);
        assert_eq!(ab, upper_right);
        assert_eq!(ba, lower_left);
        assert_eq!(bb, lower_right);
    }

    #[test]
    fn extract_submatrices_keeping_second_block() {
        let (precision_matrix, upper_left, upper_right, lower_left, lower_right) =
            generate_4x4_precision_matrix!();
        let (aa, ab, ba, bb) =
            extract_submatrices_from_precision_matrix(&precision_matrix, 2..4, &[0, 1]);
        assert_eq!(aa, lower_right);
        assert_eq!(ab, lower_left);
        assert_eq!(ba, upper_right);
        assert_eq!(bb, upper_left);
    }

    #[test]
    fn complement_of_middle_block() {
        assert_eq!(complement(&(2..4), 6), vec![0, 1, 4, 5]);
        assert_eq!(complement(&(0..3), 3), Vec::<usize>::new());
    }

    #[test]
    fn independent_blocks_marginalise_exactly() {
        let a = CanonicalGaussian::new(array![1.0, -2.0], array![[4.0, 1.0], [1.0, 3.0]]).unwrap();
        let b = CanonicalGaussian::new(array![0.5, 7.0], array![[2.0, 0.5], [0.5, 5.0]]).unwrap();

        let mut joint = CanonicalGaussian::zeros(4);
        joint.add_assign_block(0, &a).unwrap();
        joint.add_assign_block(2, &b).unwrap();

        assert_eq!(joint.marginalise(0..2).unwrap(), a);
        assert_eq!(joint.marginalise(2..4).unwrap(), b);
    }

    #[test]
    fn marginal_matches_covariance_block() {
        // the covariance of a marginal is the corresponding block of the joint
        // covariance
        let joint = CanonicalGaussian::new(array![1.0, 2.0, 3.0, 4.0], array![
            [4.0, 1.0, 0.5, 0.0],
            [1.0, 3.0, 0.0, 0.5],
            [0.5, 0.0, 5.0, 1.0],
            [0.0, 0.5, 1.0, 2.0]
        ])
        .unwrap();
        let covariance = joint.covariance().unwrap();
        let mean = joint.mean().unwrap();

        for keep in [0..2, 2..4, 1..3] {
            let marginal = joint.marginalise(keep.clone()).unwrap();
            let expected_covariance = covariance.slice(s![keep.clone(), keep.clone()]);
            for (x, y) in marginal
                .covariance()
                .unwrap()
                .iter()
                .zip(expected_covariance.iter())
            {
                assert_abs_diff_eq!(x, y, epsilon = 1e-10);
            }
            let expected_mean = mean.slice(s![keep]);
            for (x, y) in marginal.mean().unwrap().iter().zip(expected_mean.iter()) {
                assert_abs_diff_eq!(x, y, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn keeping_everything_is_identity() {
        let joint = CanonicalGaussian::new(array![1.0, 2.0], array![[0.0, 0.0], [0.0, 0.0]]).unwrap();
        assert_eq!(joint.marginalise(0..2).unwrap(), joint);
    }

    #[test]
    fn empty_or_out_of_range_block_should_fail() {
        let joint = CanonicalGaussian::zeros(4);
        assert_eq!(
            joint.marginalise(2..2),
            Err(GaussianError::BlockOutOfBounds {
                start: 2,
                end: 2,
                dim: 4
            })
        );
        assert!(joint.marginalise(3..5).is_err());
    }

    #[test]
    fn singular_eliminated_block_is_numerical_instability() {
        let joint = CanonicalGaussian::zeros(4);
        let err = joint.marginalise(2..4).unwrap_err();
        assert!(err.is_numerical_instability());
    }
}
