//! Strided iteration engine.
//!
//! Every element-wise operation in this crate reduces to "visit each logical
//! index once and hand the per-operand buffer offsets to a closure". This
//! module owns those loops:
//!
//! - [`walk_1d`] .. [`walk_4d`]: rank-specialized nested loops
//! - [`walk_nd`]: rank-agnostic recursion used for higher ranks
//! - [`walk_blocked`]: tiles over the rank-specialized nests
//! - [`for_each_offset`]: validation, zero-extent guard and [`Traversal`] selection
//!
//! Fixed-rank and generic walks visit indices in row-major logical order
//! (dimension 0 outermost). [`Traversal::Auto`] and [`Traversal::Blocked`]
//! may reorder, fuse and tile loops for locality, so only their result (not
//! their visiting order) is specified.

use std::array;

use crate::block::{block_sizes, BLOCK_BYTES};
use crate::fuse::fuse_dims;
use crate::order::loop_order;
use crate::{Result, StridedError};

/// Loop strategy used to visit every logical index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Traversal {
    /// Rank-specialized nested loops; the operand rank must equal the value (1 to 4).
    Fixed(usize),
    /// Rank-agnostic recursive traversal (any rank, including 0).
    Nd,
    /// Reorder loops by stride, squeeze and fuse dimensions, then pick
    /// the specialized kernel for the reduced rank.
    Auto,
    /// [`Traversal::Auto`] plus cache blocking: the reduced iteration space
    /// is cut into tiles whose working set fits an L1 cache.
    Blocked,
}

/// Highest rank with a specialized loop nest.
pub const MAX_FIXED_RANK: usize = 4;

#[inline(always)]
fn advance<const K: usize>(offsets: &mut [isize; K], delta: &[isize; K]) {
    for k in 0..K {
        offsets[k] += delta[k];
    }
}

/// Visit `shape[0]` elements along one dimension.
#[inline]
pub(crate) fn walk_1d<const K: usize, F>(shape: &[usize], strides: &[&[isize]; K], f: &mut F)
where
    F: FnMut(&[isize; K]),
{
    let s0 = shape[0];
    if s0 == 0 {
        return;
    }
    let d0: [isize; K] = array::from_fn(|k| strides[k][0]);
    let mut off = [0isize; K];
    for _ in 0..s0 {
        f(&off);
        advance(&mut off, &d0);
    }
}

/// Two nested loops; dimension 1 is innermost.
#[inline]
pub(crate) fn walk_2d<const K: usize, F>(shape: &[usize], strides: &[&[isize]; K], f: &mut F)
where
    F: FnMut(&[isize; K]),
{
    let (s0, s1) = (shape[0], shape[1]);
    if s0 == 0 || s1 == 0 {
        return;
    }
    let d1: [isize; K] = array::from_fn(|k| strides[k][1]);
    let d0: [isize; K] = array::from_fn(|k| strides[k][0] - s1 as isize * strides[k][1]);
    let mut off = [0isize; K];
    for _ in 0..s0 {
        for _ in 0..s1 {
            f(&off);
            advance(&mut off, &d1);
        }
        advance(&mut off, &d0);
    }
}

/// Three nested loops; dimension 2 is innermost.
#[inline]
pub(crate) fn walk_3d<const K: usize, F>(shape: &[usize], strides: &[&[isize]; K], f: &mut F)
where
    F: FnMut(&[isize; K]),
{
    let (s0, s1, s2) = (shape[0], shape[1], shape[2]);
    if s0 == 0 || s1 == 0 || s2 == 0 {
        return;
    }
    let d2: [isize; K] = array::from_fn(|k| strides[k][2]);
    let d1: [isize; K] = array::from_fn(|k| strides[k][1] - s2 as isize * strides[k][2]);
    let d0: [isize; K] = array::from_fn(|k| strides[k][0] - s1 as isize * strides[k][1]);
    let mut off = [0isize; K];
    for _ in 0..s0 {
        for _ in 0..s1 {
            for _ in 0..s2 {
                f(&off);
                advance(&mut off, &d2);
            }
            advance(&mut off, &d1);
        }
        advance(&mut off, &d0);
    }
}

/// Four nested loops; dimension 3 is innermost.
///
/// All four extents are checked before any loop runs.
#[inline]
pub(crate) fn walk_4d<const K: usize, F>(shape: &[usize], strides: &[&[isize]; K], f: &mut F)
where
    F: FnMut(&[isize; K]),
{
    let (s0, s1, s2, s3) = (shape[0], shape[1], shape[2], shape[3]);
    if s0 == 0 || s1 == 0 || s2 == 0 || s3 == 0 {
        return;
    }
    let d3: [isize; K] = array::from_fn(|k| strides[k][3]);
    let d2: [isize; K] = array::from_fn(|k| strides[k][2] - s3 as isize * strides[k][3]);
    let d1: [isize; K] = array::from_fn(|k| strides[k][1] - s2 as isize * strides[k][2]);
    let d0: [isize; K] = array::from_fn(|k| strides[k][0] - s1 as isize * strides[k][1]);
    let mut off = [0isize; K];
    for _ in 0..s0 {
        for _ in 0..s1 {
            for _ in 0..s2 {
                for _ in 0..s3 {
                    f(&off);
                    advance(&mut off, &d3);
                }
                advance(&mut off, &d2);
            }
            advance(&mut off, &d1);
        }
        advance(&mut off, &d0);
    }
}

/// Rank-agnostic traversal.
///
/// Peels the outermost dimension and recurses on the remaining ones; rank 0
/// is a single element at offset zero.
#[inline]
pub(crate) fn walk_nd<const K: usize, F>(shape: &[usize], strides: &[&[isize]; K], f: &mut F)
where
    F: FnMut(&[isize; K]),
{
    if shape.contains(&0) {
        return;
    }
    walk_nd_level(0, shape, strides, [0isize; K], f);
}

fn walk_nd_level<const K: usize, F>(
    level: usize,
    shape: &[usize],
    strides: &[&[isize]; K],
    base: [isize; K],
    f: &mut F,
) where
    F: FnMut(&[isize; K]),
{
    if level == shape.len() {
        f(&base);
        return;
    }
    let step: [isize; K] = array::from_fn(|k| strides[k][level]);
    let mut off = base;
    for _ in 0..shape[level] {
        walk_nd_level(level + 1, shape, strides, off, f);
        advance(&mut off, &step);
    }
}

/// Walk `shape` tile by tile; `blocks[d]` is the tile extent along `d`.
///
/// Tiles are visited in row-major order and each one runs through
/// [`walk_by_rank`] with offsets shifted to the tile origin.
pub(crate) fn walk_blocked<const K: usize, F>(
    shape: &[usize],
    strides: &[&[isize]; K],
    blocks: &[usize],
    f: &mut F,
) where
    F: FnMut(&[isize; K]),
{
    if shape.contains(&0) {
        return;
    }
    let mut extent = shape.to_vec();
    tile_level(0, shape, strides, blocks, [0isize; K], &mut extent, f);
}

fn tile_level<const K: usize, F>(
    level: usize,
    shape: &[usize],
    strides: &[&[isize]; K],
    blocks: &[usize],
    origin: [isize; K],
    extent: &mut [usize],
    f: &mut F,
) where
    F: FnMut(&[isize; K]),
{
    if level == shape.len() {
        let mut shifted = |o: &[isize; K]| {
            let at: [isize; K] = array::from_fn(|k| origin[k] + o[k]);
            f(&at);
        };
        walk_by_rank(extent, strides, &mut shifted);
        return;
    }
    let step = blocks[level].clamp(1, shape[level]);
    let mut start = 0usize;
    while start < shape[level] {
        extent[level] = step.min(shape[level] - start);
        let next: [isize; K] = array::from_fn(|k| origin[k] + start as isize * strides[k][level]);
        tile_level(level + 1, shape, strides, blocks, next, extent, f);
        start += step;
    }
}

/// Dispatch to the specialized loop nest for `shape.len()`, or the recursion.
#[inline]
fn walk_by_rank<const K: usize, F>(shape: &[usize], strides: &[&[isize]; K], f: &mut F)
where
    F: FnMut(&[isize; K]),
{
    match shape.len() {
        0 => f(&[0isize; K]),
        1 => walk_1d(shape, strides, f),
        2 => walk_2d(shape, strides, f),
        3 => walk_3d(shape, strides, f),
        4 => walk_4d(shape, strides, f),
        _ => walk_nd(shape, strides, f),
    }
}

/// Visit every logical index of `shape`, passing per-operand offsets to `f`.
///
/// The last operand is treated as the destination when ordering loops.
/// Offsets are relative to each operand's base pointer. Any zero extent makes
/// the call a no-op. Stride lists must have `shape.len()` entries.
/// `elem_size` is the widest operand element in bytes; only
/// [`Traversal::Blocked`] reads it.
pub(crate) fn for_each_offset<const K: usize, F>(
    traversal: Traversal,
    shape: &[usize],
    strides: [&[isize]; K],
    elem_size: usize,
    mut f: F,
) -> Result<()>
where
    F: FnMut(&[isize; K]),
{
    for s in strides.iter() {
        if s.len() != shape.len() {
            return Err(StridedError::RankMismatch(s.len(), shape.len()));
        }
    }
    match traversal {
        Traversal::Fixed(rank) => {
            if !(1..=MAX_FIXED_RANK).contains(&rank) {
                return Err(StridedError::InvalidShape(format!(
                    "no specialized kernel for rank {rank}"
                )));
            }
            if shape.len() != rank {
                return Err(StridedError::RankMismatch(shape.len(), rank));
            }
        }
        Traversal::Nd | Traversal::Auto | Traversal::Blocked => {}
    }
    if shape.contains(&0) {
        return Ok(());
    }

    match traversal {
        Traversal::Fixed(1) => walk_1d(shape, &strides, &mut f),
        Traversal::Fixed(2) => walk_2d(shape, &strides, &mut f),
        Traversal::Fixed(3) => walk_3d(shape, &strides, &mut f),
        Traversal::Fixed(_) => walk_4d(shape, &strides, &mut f),
        Traversal::Nd => walk_nd(shape, &strides, &mut f),
        Traversal::Auto | Traversal::Blocked => {
            let order = loop_order(shape, &strides, K.checked_sub(1));
            let ordered_shape: Vec<usize> = order.iter().map(|&d| shape[d]).collect();
            let ordered_strides: Vec<Vec<isize>> = strides
                .iter()
                .map(|s| order.iter().map(|&d| s[d]).collect())
                .collect();
            let (fused_shape, fused_strides) = fuse_dims(&ordered_shape, &ordered_strides);
            let refs: [&[isize]; K] = array::from_fn(|k| fused_strides[k].as_slice());
            if traversal == Traversal::Blocked {
                let blocks = block_sizes(&fused_shape, &refs, elem_size, BLOCK_BYTES);
                if blocks != fused_shape {
                    walk_blocked(&fused_shape, &refs, &blocks, &mut f);
                    return Ok(());
                }
            }
            walk_by_rank(&fused_shape, &refs, &mut f);
        }
    }
    Ok(())
}

/// Widest element size in bytes, at least 1.
#[inline]
pub(crate) fn widest(sizes: &[usize]) -> usize {
    sizes.iter().copied().max().unwrap_or(1).max(1)
}

pub(crate) fn ensure_same_shape(a: &[usize], b: &[usize]) -> Result<()> {
    if a.len() != b.len() {
        return Err(StridedError::RankMismatch(a.len(), b.len()));
    }
    if a != b {
        return Err(StridedError::ShapeMismatch(a.to_vec(), b.to_vec()));
    }
    Ok(())
}
