//! Extended 1-D kernels: cumulative sums, in-place reversal and cumulative
//! extrema.
//!
//! Same calling convention as [`crate::blas`]: `usize` counts, `isize`
//! strides, one extent check on entry and a `*_with_offsets` form taking the
//! index of the first logical element.

use num_traits::Float;

use crate::layout::{check_extent, stride_offset};
use crate::Result;

/// Below this length `cusum` sums sequentially.
const PAIRWISE_BLOCKSIZE: usize = 128;

/// Read cursor over a strided input.
struct Src<T> {
    ptr: *const T,
    stride: isize,
    offset: isize,
}

impl<T: Copy> Src<T> {
    #[inline(always)]
    unsafe fn at(&self, i: usize) -> T {
        *self.ptr.offset(self.offset + i as isize * self.stride)
    }
}

/// Write cursor over a strided output.
struct Dst<T> {
    ptr: *mut T,
    stride: isize,
    offset: isize,
}

impl<T: Copy> Dst<T> {
    #[inline(always)]
    unsafe fn at(&self, i: usize) -> *mut T {
        self.ptr.offset(self.offset + i as isize * self.stride)
    }
}

fn cursors<T: Copy>(
    n: usize,
    x: &[T],
    stride_x: isize,
    offset_x: usize,
    y: &mut [T],
    stride_y: isize,
    offset_y: usize,
) -> Result<(Src<T>, Dst<T>)> {
    check_extent(x.len(), n, stride_x, offset_x)?;
    check_extent(y.len(), n, stride_y, offset_y)?;
    Ok((
        Src {
            ptr: x.as_ptr(),
            stride: stride_x,
            offset: offset_x as isize,
        },
        Dst {
            ptr: y.as_mut_ptr(),
            stride: stride_y,
            offset: offset_y as isize,
        },
    ))
}

macro_rules! with_default_offsets {
    ($(#[$meta:meta])* $name:ident => $inner:ident) => {
        $(#[$meta])*
        pub fn $name<'y, T: Float>(
            n: usize,
            sum: T,
            x: &[T],
            stride_x: isize,
            y: &'y mut [T],
            stride_y: isize,
        ) -> Result<&'y mut [T]> {
            $inner(
                n,
                sum,
                x,
                stride_x,
                stride_offset(n, stride_x)?,
                y,
                stride_y,
                stride_offset(n, stride_y)?,
            )
        }
    };
}

// ============================================================================
// Cumulative sums
// ============================================================================

with_default_offsets!(
    /// Cumulative sum of `x` added to `sum`, by pairwise summation.
    cusum => cusum_with_offsets
);

#[allow(clippy::too_many_arguments)]
pub fn cusum_with_offsets<'y, T: Float>(
    n: usize,
    sum: T,
    x: &[T],
    stride_x: isize,
    offset_x: usize,
    y: &'y mut [T],
    stride_y: isize,
    offset_y: usize,
) -> Result<&'y mut [T]> {
    if n == 0 {
        return Ok(y);
    }
    let (src, dst) = cursors(n, x, stride_x, offset_x, y, stride_y, offset_y)?;
    unsafe { pairwise(n, sum, &src, 0, &dst) };
    Ok(y)
}

/// Cumulative sum of `x[start..start + n]` into `y[start..start + n]`.
///
/// Splits at a multiple of 8 near the middle; the right half starts from the
/// last output of the left half.
unsafe fn pairwise<T: Float>(n: usize, sum: T, x: &Src<T>, start: usize, y: &Dst<T>) {
    if n <= PAIRWISE_BLOCKSIZE {
        let mut s = sum;
        for i in start..start + n {
            s = s + x.at(i);
            *y.at(i) = s;
        }
        return;
    }
    let mut half = n / 2;
    half -= half % 8;
    pairwise(half, sum, x, start, y);
    let carry = *y.at(start + half - 1);
    pairwise(n - half, carry, x, start + half, y);
}

with_default_offsets!(
    /// Cumulative sum with Kahan-Babuska (Neumaier) compensation.
    cusumkbn => cusumkbn_with_offsets
);

#[allow(clippy::too_many_arguments)]
pub fn cusumkbn_with_offsets<'y, T: Float>(
    n: usize,
    sum: T,
    x: &[T],
    stride_x: isize,
    offset_x: usize,
    y: &'y mut [T],
    stride_y: isize,
    offset_y: usize,
) -> Result<&'y mut [T]> {
    if n == 0 {
        return Ok(y);
    }
    let (src, dst) = cursors(n, x, stride_x, offset_x, y, stride_y, offset_y)?;
    let mut s = sum;
    let mut c = T::zero();
    for i in 0..n {
        unsafe {
            let v = src.at(i);
            let t = s + v;
            c = c + neumaier(s, v, t);
            s = t;
            *dst.at(i) = s + c;
        }
    }
    Ok(y)
}

/// Rounding error of `t = a + b`.
#[inline(always)]
fn neumaier<T: Float>(a: T, b: T, t: T) -> T {
    if a.abs() >= b.abs() {
        (a - t) + b
    } else {
        (b - t) + a
    }
}

with_default_offsets!(
    /// Cumulative sum with second-order Kahan-Babuska compensation.
    cusumkbn2 => cusumkbn2_with_offsets
);

#[allow(clippy::too_many_arguments)]
pub fn cusumkbn2_with_offsets<'y, T: Float>(
    n: usize,
    sum: T,
    x: &[T],
    stride_x: isize,
    offset_x: usize,
    y: &'y mut [T],
    stride_y: isize,
    offset_y: usize,
) -> Result<&'y mut [T]> {
    if n == 0 {
        return Ok(y);
    }
    let (src, dst) = cursors(n, x, stride_x, offset_x, y, stride_y, offset_y)?;
    let mut s = sum;
    let mut cs = T::zero();
    let mut ccs = T::zero();
    for i in 0..n {
        unsafe {
            let v = src.at(i);
            let t = s + v;
            let c = neumaier(s, v, t);
            s = t;
            let t = cs + c;
            ccs = ccs + neumaier(cs, c, t);
            cs = t;
            *dst.at(i) = s + cs + ccs;
        }
    }
    Ok(y)
}

// ============================================================================
// Reversal
// ============================================================================

/// Reverse `n` strided elements of `x` in place.
pub fn rev<T: Copy>(n: usize, x: &mut [T], stride: isize) -> Result<&mut [T]> {
    rev_with_offset(n, x, stride, stride_offset(n, stride)?)
}

/// [`rev`] starting at `offset`. An odd middle element stays in place.
pub fn rev_with_offset<T: Copy>(
    n: usize,
    x: &mut [T],
    stride: isize,
    offset: usize,
) -> Result<&mut [T]> {
    if n < 2 {
        return Ok(x);
    }
    check_extent(x.len(), n, stride, offset)?;
    let half = n / 2;

    if stride == 1 {
        let (mut lo, mut hi) = (offset, offset + n - 1);
        for _ in 0..half % 3 {
            x.swap(lo, hi);
            lo += 1;
            hi -= 1;
        }
        for _ in 0..half / 3 {
            x.swap(lo, hi);
            x.swap(lo + 1, hi - 1);
            x.swap(lo + 2, hi - 2);
            lo += 3;
            hi -= 3;
        }
        return Ok(x);
    }

    let p = x.as_mut_ptr();
    let mut ix = offset as isize;
    let mut iy = ix + (n as isize - 1) * stride;
    for _ in 0..half {
        unsafe { std::ptr::swap(p.offset(ix), p.offset(iy)) };
        ix += stride;
        iy -= stride;
    }
    Ok(x)
}

// ============================================================================
// Cumulative extrema
// ============================================================================

#[derive(Clone, Copy)]
enum Extremum {
    Max,
    Min,
}

impl Extremum {
    /// Whether `v` replaces the running extremum `m`.
    #[inline(always)]
    fn replaces<T: Float>(self, v: T, m: T) -> bool {
        match self {
            Extremum::Max => v > m || (v == m && v.is_sign_positive() && m.is_sign_negative()),
            Extremum::Min => v < m || (v == m && v.is_sign_negative() && m.is_sign_positive()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cumulative_extremum<'y, T: Float>(
    which: Extremum,
    abs: bool,
    n: usize,
    x: &[T],
    stride_x: isize,
    offset_x: usize,
    y: &'y mut [T],
    stride_y: isize,
    offset_y: usize,
) -> Result<&'y mut [T]> {
    if n == 0 {
        return Ok(y);
    }
    let (src, dst) = cursors(n, x, stride_x, offset_x, y, stride_y, offset_y)?;
    let read = |i: usize| {
        let v = unsafe { src.at(i) };
        if abs {
            v.abs()
        } else {
            v
        }
    };

    let mut m = read(0);
    unsafe { *dst.at(0) = m };
    let mut i = 1;
    while i < n && !m.is_nan() {
        let v = read(i);
        if v.is_nan() || which.replaces(v, m) {
            m = v;
        }
        unsafe { *dst.at(i) = m };
        i += 1;
    }
    // NaN poisons the remainder.
    while i < n {
        unsafe { *dst.at(i) = m };
        i += 1;
    }
    Ok(y)
}

macro_rules! extremum_kernels {
    ($(#[$meta:meta])* $name:ident, $with:ident, $which:expr, $abs:expr) => {
        $(#[$meta])*
        pub fn $name<'y, T: Float>(
            n: usize,
            x: &[T],
            stride_x: isize,
            y: &'y mut [T],
            stride_y: isize,
        ) -> Result<&'y mut [T]> {
            $with(
                n,
                x,
                stride_x,
                stride_offset(n, stride_x)?,
                y,
                stride_y,
                stride_offset(n, stride_y)?,
            )
        }

        #[allow(clippy::too_many_arguments)]
        pub fn $with<'y, T: Float>(
            n: usize,
            x: &[T],
            stride_x: isize,
            offset_x: usize,
            y: &'y mut [T],
            stride_y: isize,
            offset_y: usize,
        ) -> Result<&'y mut [T]> {
            cumulative_extremum($which, $abs, n, x, stride_x, offset_x, y, stride_y, offset_y)
        }
    };
}

extremum_kernels!(
    /// Running maximum; `+0` beats `-0` and a `NaN` sticks.
    cumax, cumax_with_offsets, Extremum::Max, false
);
extremum_kernels!(
    /// Running minimum; `-0` beats `+0` and a `NaN` sticks.
    cumin, cumin_with_offsets, Extremum::Min, false
);
extremum_kernels!(
    /// Running maximum of absolute values.
    cumaxabs, cumaxabs_with_offsets, Extremum::Max, true
);
extremum_kernels!(
    /// Running minimum of absolute values.
    cuminabs, cuminabs_with_offsets, Extremum::Min, true
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StridedError;
    use approx::assert_relative_eq;

    #[test]
    fn test_cusum_with_initial_sum() {
        let x = [1.0, 2.0, 3.0];
        let mut y = [0.0; 3];
        cusum(3, 10.0, &x, 1, &mut y, 1).unwrap();
        assert_eq!(y, [11.0, 13.0, 16.0]);
    }

    #[test]
    fn test_cusum_pairwise_matches_running_sum() {
        let n = 1000;
        let x: Vec<f64> = (0..n).map(|i| (i % 7) as f64).collect();
        let mut y = vec![0.0; n];
        cusum(n, 0.0, &x, 1, &mut y, 1).unwrap();
        let mut s = 0.0;
        for i in 0..n {
            s += x[i];
            assert_eq!(y[i], s);
        }
    }

    #[test]
    fn test_cusumkbn_recovers_cancelled_term() {
        let x = [1e100, 1.0, -1e100];
        let mut y = [0.0; 3];
        cusumkbn(3, 0.0, &x, 1, &mut y, 1).unwrap();
        assert_eq!(y, [1e100, 1e100, 1.0]);

        let mut y2 = [0.0; 3];
        cusumkbn2(3, 0.0, &x, 1, &mut y2, 1).unwrap();
        assert_eq!(y2, [1e100, 1e100, 1.0]);
    }

    #[test]
    fn test_cusumkbn_negative_stride() {
        let x = [3.0f32, 2.0, 1.0];
        let mut y = [0.0f32; 3];
        cusumkbn(3, 0.0, &x, -1, &mut y, 1).unwrap();
        assert_relative_eq!(y[2], 6.0);
        assert_eq!(y[0], 1.0);
    }

    #[test]
    fn test_rev_unit_stride() {
        for n in 0..12 {
            let mut x: Vec<i32> = (0..n).collect();
            rev(n as usize, &mut x, 1).unwrap();
            let expected: Vec<i32> = (0..n).rev().collect();
            assert_eq!(x, expected, "n = {n}");
        }
    }

    #[test]
    fn test_rev_strided_leaves_gaps() {
        let mut x = [1, 0, 2, 0, 3, 0, 4];
        rev(4, &mut x, 2).unwrap();
        assert_eq!(x, [4, 0, 3, 0, 2, 0, 1]);
        rev_with_offset(2, &mut x, 2, 2).unwrap();
        assert_eq!(x, [4, 0, 2, 0, 3, 0, 1]);
    }

    #[test]
    fn test_rev_rejects_out_of_range() {
        let mut x = [1, 2, 3];
        assert!(matches!(
            rev(3, &mut x, 2),
            Err(StridedError::OutOfBounds { index: 4, len: 3 })
        ));
    }

    #[test]
    fn test_cumax_nan_poisons() {
        let x = [2.0, 1.0, f64::NAN, 4.0];
        let mut y = [0.0; 4];
        cumax(4, &x, 1, &mut y, 1).unwrap();
        assert_eq!(&y[..2], &[2.0, 2.0]);
        assert!(y[2].is_nan() && y[3].is_nan());
    }

    #[test]
    fn test_signed_zero_ties() {
        let x = [-0.0, 0.0];
        let mut y = [1.0; 2];
        cumax(2, &x, 1, &mut y, 1).unwrap();
        assert!(y[1] == 0.0 && y[1].is_sign_positive());

        let x = [0.0, -0.0];
        cumin(2, &x, 1, &mut y, 1).unwrap();
        assert!(y[1] == 0.0 && y[1].is_sign_negative());
    }

    #[test]
    fn test_abs_extrema() {
        let x = [-3.0, 1.0, -5.0, 2.0];
        let mut y = [0.0; 4];
        cumaxabs(4, &x, 1, &mut y, 1).unwrap();
        assert_eq!(y, [3.0, 3.0, 5.0, 5.0]);
        cuminabs(4, &x, 1, &mut y, 1).unwrap();
        assert_eq!(y, [3.0, 1.0, 1.0, 1.0]);
    }
}
