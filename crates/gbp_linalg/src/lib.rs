//! A small collection of extension traits and types for ndarray, used by the
//! information-form Gaussian and the factor graph built on top of it.

pub mod pretty_print;

use std::ops::Range;

pub mod prelude {
    pub use super::{
        pretty_print::{pretty_format_matrix, pretty_format_vector},
        seq_n, Block, BlockLayout, Float, Matrix, MatrixView, Vector, VectorNorm, VectorView,
    };
}

/// The precision of the floating point type used in GBP.
pub type Float = f64;

pub type Vector<T> = ndarray::Array1<T>;
pub type Matrix<T> = ndarray::Array2<T>;
pub type VectorView<'a, T> = ndarray::ArrayView1<'a, T>;
pub type MatrixView<'a, T> = ndarray::ArrayView2<'a, T>;

/// Utility function to create `start..start + n`
/// Similar to `Eigen::seqN`
#[inline]
#[must_use]
pub const fn seq_n(start: usize, n: usize) -> Range<usize> {
    start..start + n
}

pub trait VectorNorm {
    fn euclidean_norm(&self) -> Float;
    fn l1_norm(&self) -> Float;

    #[inline(always)]
    fn l2_norm(&self) -> Float {
        self.euclidean_norm()
    }
}

impl<S> VectorNorm for ndarray::ArrayBase<S, ndarray::Ix1>
where
    S: ndarray::Data<Elem = Float>,
{
    fn euclidean_norm(&self) -> Float {
        self.fold(0.0, |acc, x| acc + x * x).sqrt()
    }

    #[inline(always)]
    fn l1_norm(&self) -> Float {
        self.fold(0.0, |acc, x| acc + x.abs())
    }
}

/// A contiguous slice `[offset, offset + len)` of a joint vector/matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub offset: usize,
    pub len:    usize,
}

impl Block {
    /// The index range covered by the block
    #[inline]
    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        seq_n(self.offset, self.len)
    }

    /// One past the last index of the block
    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Offset table of consecutive blocks in a joint vector.
///
/// Every variable connected to a factor owns one block of the factor's joint
/// information vector and precision matrix. The table is built once, as
/// neighbours are added, so no block boundary has to be written as a literal.
///
/// ```
/// use gbp_linalg::{Block, BlockLayout};
/// let layout = BlockLayout::from_dims([2, 2]);
/// assert_eq!(layout.dim(), 4);
/// assert_eq!(layout.get(1), Some(Block { offset: 2, len: 2 }));
/// assert_eq!(layout.get(1).map(|b| b.range()), Some(2..4));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockLayout {
    blocks: Vec<Block>,
}

impl BlockLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Create a layout from the dimensions of each block, in order
    pub fn from_dims(dims: impl IntoIterator<Item = usize>) -> Self {
        let mut layout = Self::new();
        for len in dims {
            layout.push(len);
        }
        layout
    }

    /// Append a block of length `len` after the last block
    pub fn push(&mut self, len: usize) -> Block {
        let block = Block {
            offset: self.dim(),
            len,
        };
        self.blocks.push(block);
        block
    }

    /// Total dimension spanned by all blocks
    #[must_use]
    pub fn dim(&self) -> usize {
        self.blocks.last().map_or(0, Block::end)
    }

    /// Number of blocks
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Block> {
        self.blocks.get(index).copied()
    }

    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, Block>> {
        self.blocks.iter().copied()
    }
}

/// Concatenate a sequence of vectors into one, in order.
///
/// ```
/// use gbp_linalg::concatenate_vectors;
/// use ndarray::array;
/// let x = concatenate_vectors(&[array![1.0, 2.0], array![3.0]]);
/// assert_eq!(x, array![1.0, 2.0, 3.0]);
/// ```
#[must_use]
pub fn concatenate_vectors(vectors: &[Vector<Float>]) -> Vector<Float> {
    vectors
        .iter()
        .flat_map(|v| v.iter().copied())
        .collect::<Vector<Float>>()
}
