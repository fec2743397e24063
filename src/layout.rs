//! Shape/stride/offset descriptors.
//!
//! A [`StridedLayout`] maps logical multi-indices onto a flat buffer:
//! the buffer index of `i` is `offset + Σ i[k] * strides[k]`. Strides are in
//! elements and may be negative (reversed traversal) or zero (broadcast).

use crate::{Result, StridedError};

/// Memory order of a dense layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    /// Last index varies fastest (C order).
    RowMajor,
    /// First index varies fastest (Fortran order).
    ColumnMajor,
}

/// Compute row-major strides (last index varies fastest).
pub fn row_major_strides(shape: &[usize]) -> Vec<isize> {
    let rank = shape.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in (0..rank - 1).rev() {
        strides[i] = strides[i + 1] * shape[i + 1] as isize;
    }
    strides
}

/// Compute column-major strides (first index varies fastest).
pub fn col_major_strides(shape: &[usize]) -> Vec<isize> {
    let rank = shape.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in 1..rank {
        strides[i] = strides[i - 1] * shape[i - 1] as isize;
    }
    strides
}

/// Index of the first element visited by a 1-D strided loop over `n` elements.
///
/// For a negative stride the first logical element lives at the high end of
/// the buffer, so the loop starts at `(n - 1) * |stride|`. Fails with
/// [`StridedError::OffsetOverflow`] when that index does not fit.
#[inline]
pub fn stride_offset(n: usize, stride: isize) -> Result<usize> {
    if stride >= 0 || n == 0 {
        return Ok(0);
    }
    (n - 1)
        .checked_mul(stride.unsigned_abs())
        .filter(|&o| o <= isize::MAX as usize)
        .ok_or(StridedError::OffsetOverflow)
}

/// Check that a 1-D strided access pattern stays inside a buffer of length `len`.
pub(crate) fn check_extent(len: usize, n: usize, stride: isize, offset: usize) -> Result<()> {
    if n == 0 {
        return Ok(());
    }
    let offset = isize::try_from(offset).map_err(|_| StridedError::OffsetOverflow)?;
    let span = stride
        .checked_mul(n as isize - 1)
        .ok_or(StridedError::OffsetOverflow)?;
    let end = offset.checked_add(span).ok_or(StridedError::OffsetOverflow)?;
    let (lo, hi) = if end < offset { (end, offset) } else { (offset, end) };
    if lo < 0 {
        return Err(StridedError::OutOfBounds { index: lo, len });
    }
    if hi as usize >= len {
        return Err(StridedError::OutOfBounds { index: hi, len });
    }
    Ok(())
}

/// Whether every stride pattern is dense in the given order.
pub(crate) fn is_dense(shape: &[usize], strides: &[isize], order: Order) -> bool {
    if shape.len() != strides.len() {
        return false;
    }
    let mut expected = 1isize;
    let mut check = |dim: usize, stride: isize| {
        if dim <= 1 {
            return true;
        }
        if stride != expected {
            return false;
        }
        expected = expected.saturating_mul(dim as isize);
        true
    };
    match order {
        Order::RowMajor => shape
            .iter()
            .rev()
            .zip(strides.iter().rev())
            .all(|(&d, &s)| check(d, s)),
        Order::ColumnMajor => shape.iter().zip(strides.iter()).all(|(&d, &s)| check(d, s)),
    }
}

/// Infer the loop order that best matches a stride pattern.
///
/// Returns `RowMajor` when the strides are non-increasing in magnitude (the
/// last dimension is fastest), `ColumnMajor` when they are non-decreasing,
/// and `None` for mixed patterns. Singleton dimensions are ignored. A layout
/// that satisfies both (rank <= 1) reports `RowMajor`.
pub fn strides_to_order(shape: &[usize], strides: &[isize]) -> Option<Order> {
    let mags: Vec<usize> = shape
        .iter()
        .zip(strides.iter())
        .filter(|(&d, _)| d > 1)
        .map(|(_, &s)| s.unsigned_abs())
        .collect();
    if mags.windows(2).all(|w| w[0] >= w[1]) {
        Some(Order::RowMajor)
    } else if mags.windows(2).all(|w| w[0] <= w[1]) {
        Some(Order::ColumnMajor)
    } else {
        None
    }
}

/// Shape, strides and offset of a strided array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StridedLayout {
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
}

impl StridedLayout {
    /// Create a layout; `shape` and `strides` must have the same length.
    pub fn new(shape: &[usize], strides: &[isize], offset: usize) -> Result<Self> {
        if shape.len() != strides.len() {
            return Err(StridedError::InvalidShape(format!(
                "shape has {} dimensions but strides has {}",
                shape.len(),
                strides.len()
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
            strides: strides.to_vec(),
            offset,
        })
    }

    /// Create a layout from a signed shape, rejecting negative extents.
    pub fn from_signed(shape: &[i64], strides: &[isize], offset: usize) -> Result<Self> {
        let mut extents = Vec::with_capacity(shape.len());
        for (dim, &extent) in shape.iter().enumerate() {
            let extent = usize::try_from(extent).map_err(|_| {
                StridedError::InvalidShape(format!("dimension {dim} has negative extent {extent}"))
            })?;
            extents.push(extent);
        }
        Self::new(&extents, strides, offset)
    }

    /// Dense layout with zero offset.
    pub fn contiguous(shape: &[usize], order: Order) -> Self {
        let strides = match order {
            Order::RowMajor => row_major_strides(shape),
            Order::ColumnMajor => col_major_strides(shape),
        };
        Self {
            shape: shape.to_vec(),
            strides,
            offset: 0,
        }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of logical elements (1 for rank 0).
    #[inline]
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// True when any extent is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.contains(&0)
    }

    pub fn is_row_major(&self) -> bool {
        strides_to_order(&self.shape, &self.strides) == Some(Order::RowMajor)
    }

    pub fn is_column_major(&self) -> bool {
        let rank = self.shape.iter().filter(|&&d| d > 1).count();
        rank <= 1 || strides_to_order(&self.shape, &self.strides) == Some(Order::ColumnMajor)
    }

    pub fn order(&self) -> Option<Order> {
        strides_to_order(&self.shape, &self.strides)
    }

    /// Whether a logical traversal visits consecutive buffer elements.
    ///
    /// True for dense row-major or column-major packing; kernels use this to
    /// take flat (and unrolled) fast paths.
    pub fn is_unit_stride(&self) -> bool {
        is_dense(&self.shape, &self.strides, Order::RowMajor)
            || is_dense(&self.shape, &self.strides, Order::ColumnMajor)
    }

    /// Smallest and largest reachable buffer index, or `None` when empty.
    pub fn index_bounds(&self) -> Result<Option<(isize, isize)>> {
        if self.is_empty() {
            return Ok(None);
        }
        let offset = isize::try_from(self.offset).map_err(|_| StridedError::OffsetOverflow)?;
        let mut lo = offset;
        let mut hi = offset;
        for (&dim, &stride) in self.shape.iter().zip(self.strides.iter()) {
            if dim > 1 {
                let end = stride
                    .checked_mul(dim as isize - 1)
                    .ok_or(StridedError::OffsetOverflow)?;
                if end >= 0 {
                    hi = hi.checked_add(end).ok_or(StridedError::OffsetOverflow)?;
                } else {
                    lo = lo.checked_add(end).ok_or(StridedError::OffsetOverflow)?;
                }
            }
        }
        Ok(Some((lo, hi)))
    }

    /// Validate that every reachable index lies in `[0, len)`.
    pub fn validate(&self, len: usize) -> Result<()> {
        if let Some((lo, hi)) = self.index_bounds()? {
            if lo < 0 {
                return Err(StridedError::OutOfBounds { index: lo, len });
            }
            if hi as usize >= len {
                return Err(StridedError::OutOfBounds { index: hi, len });
            }
        }
        Ok(())
    }

    /// Buffer index of a logical multi-index.
    ///
    /// # Panics
    /// Panics if `index` has the wrong rank or is outside the shape.
    pub fn offset_of(&self, index: &[usize]) -> isize {
        assert_eq!(index.len(), self.shape.len(), "index rank mismatch");
        let mut pos = self.offset as isize;
        for ((&i, &dim), &stride) in index.iter().zip(self.shape.iter()).zip(self.strides.iter()) {
            assert!(i < dim, "index {i} out of range for extent {dim}");
            pos += i as isize * stride;
        }
        pos
    }
}
