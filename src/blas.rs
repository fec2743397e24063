//! BLAS-style kernels over 1-D strided buffers.
//!
//! Every kernel has two forms:
//! - standard: the first logical element sits at `stride_offset(n, stride)`,
//!   so a negative stride walks the buffer from its high end
//! - `*_with_offsets`: explicit index of the first logical element
//!
//! Extents are validated once on entry (`OutOfBounds`); the loops after that
//! run on raw pointers. Kernels return the updated output buffer.
//!
//! With the `blas` feature, `daxpy`, `saxpy`, `drot` and `srot` call CBLAS
//! whenever the strides are non-zero and the sizes fit a BLAS integer.

use num_traits::Float;

use crate::layout::{check_extent, stride_offset};
use crate::simd::dispatch_if_large;
use crate::{Order, Result, StridedError};

/// Which triangle of a packed symmetric matrix is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uplo {
    Upper,
    Lower,
}

// ============================================================================
// axpy
// ============================================================================

/// `y += alpha * x` over `n` elements.
pub fn axpy<'y, T: Float>(
    n: usize,
    alpha: T,
    x: &[T],
    stride_x: isize,
    y: &'y mut [T],
    stride_y: isize,
) -> Result<&'y mut [T]> {
    axpy_with_offsets(
        n,
        alpha,
        x,
        stride_x,
        stride_offset(n, stride_x)?,
        y,
        stride_y,
        stride_offset(n, stride_y)?,
    )
}

/// `y += alpha * x` starting at `offset_x` / `offset_y`.
///
/// `n == 0` or `alpha == 0` returns `y` untouched without validating
/// anything. Unit strides take a 4-way unrolled loop after an `n % 4`
/// cleanup loop.
#[allow(clippy::too_many_arguments)]
pub fn axpy_with_offsets<'y, T: Float>(
    n: usize,
    alpha: T,
    x: &[T],
    stride_x: isize,
    offset_x: usize,
    y: &'y mut [T],
    stride_y: isize,
    offset_y: usize,
) -> Result<&'y mut [T]> {
    if n == 0 || alpha == T::zero() {
        return Ok(y);
    }
    check_extent(x.len(), n, stride_x, offset_x)?;
    check_extent(y.len(), n, stride_y, offset_y)?;

    if stride_x == 1 && stride_y == 1 {
        let xs = &x[offset_x..offset_x + n];
        let ys = &mut y[offset_y..offset_y + n];
        let m = n % 4;
        for (yi, &xi) in ys[..m].iter_mut().zip(&xs[..m]) {
            *yi = *yi + alpha * xi;
        }
        dispatch_if_large(n, || {
            for (yc, xc) in ys[m..].chunks_exact_mut(4).zip(xs[m..].chunks_exact(4)) {
                yc[0] = yc[0] + alpha * xc[0];
                yc[1] = yc[1] + alpha * xc[1];
                yc[2] = yc[2] + alpha * xc[2];
                yc[3] = yc[3] + alpha * xc[3];
            }
        });
        return Ok(y);
    }

    let xp = x.as_ptr();
    let yp = y.as_mut_ptr();
    let (mut ix, mut iy) = (offset_x as isize, offset_y as isize);
    for _ in 0..n {
        unsafe {
            let yi = yp.offset(iy);
            *yi = *yi + alpha * *xp.offset(ix);
        }
        ix += stride_x;
        iy += stride_y;
    }
    Ok(y)
}

/// Double-precision [`axpy`].
pub fn daxpy<'y>(
    n: usize,
    alpha: f64,
    x: &[f64],
    stride_x: isize,
    y: &'y mut [f64],
    stride_y: isize,
) -> Result<&'y mut [f64]> {
    daxpy_with_offsets(
        n,
        alpha,
        x,
        stride_x,
        stride_offset(n, stride_x)?,
        y,
        stride_y,
        stride_offset(n, stride_y)?,
    )
}

/// Double-precision [`axpy_with_offsets`].
#[allow(clippy::too_many_arguments)]
pub fn daxpy_with_offsets<'y>(
    n: usize,
    alpha: f64,
    x: &[f64],
    stride_x: isize,
    offset_x: usize,
    y: &'y mut [f64],
    stride_y: isize,
    offset_y: usize,
) -> Result<&'y mut [f64]> {
    #[cfg(feature = "blas")]
    {
        if n > 0 && alpha != 0.0 {
            check_extent(x.len(), n, stride_x, offset_x)?;
            check_extent(y.len(), n, stride_y, offset_y)?;
            if native::daxpy(n, alpha, x, stride_x, offset_x, y, stride_y, offset_y) {
                return Ok(y);
            }
        }
    }
    axpy_with_offsets(n, alpha, x, stride_x, offset_x, y, stride_y, offset_y)
}

/// Single-precision [`axpy`].
pub fn saxpy<'y>(
    n: usize,
    alpha: f32,
    x: &[f32],
    stride_x: isize,
    y: &'y mut [f32],
    stride_y: isize,
) -> Result<&'y mut [f32]> {
    saxpy_with_offsets(
        n,
        alpha,
        x,
        stride_x,
        stride_offset(n, stride_x)?,
        y,
        stride_y,
        stride_offset(n, stride_y)?,
    )
}

/// Single-precision [`axpy_with_offsets`].
#[allow(clippy::too_many_arguments)]
pub fn saxpy_with_offsets<'y>(
    n: usize,
    alpha: f32,
    x: &[f32],
    stride_x: isize,
    offset_x: usize,
    y: &'y mut [f32],
    stride_y: isize,
    offset_y: usize,
) -> Result<&'y mut [f32]> {
    #[cfg(feature = "blas")]
    {
        if n > 0 && alpha != 0.0 {
            check_extent(x.len(), n, stride_x, offset_x)?;
            check_extent(y.len(), n, stride_y, offset_y)?;
            if native::saxpy(n, alpha, x, stride_x, offset_x, y, stride_y, offset_y) {
                return Ok(y);
            }
        }
    }
    axpy_with_offsets(n, alpha, x, stride_x, offset_x, y, stride_y, offset_y)
}

// ============================================================================
// rot
// ============================================================================

/// Plane rotation: `x' = c*x + s*y`, `y' = c*y - s*x`.
pub fn rot<'y, T: Float>(
    n: usize,
    x: &mut [T],
    stride_x: isize,
    y: &'y mut [T],
    stride_y: isize,
    c: T,
    s: T,
) -> Result<&'y mut [T]> {
    rot_with_offsets(
        n,
        x,
        stride_x,
        stride_offset(n, stride_x)?,
        y,
        stride_y,
        stride_offset(n, stride_y)?,
        c,
        s,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn rot_with_offsets<'y, T: Float>(
    n: usize,
    x: &mut [T],
    stride_x: isize,
    offset_x: usize,
    y: &'y mut [T],
    stride_y: isize,
    offset_y: usize,
    c: T,
    s: T,
) -> Result<&'y mut [T]> {
    if n == 0 {
        return Ok(y);
    }
    check_extent(x.len(), n, stride_x, offset_x)?;
    check_extent(y.len(), n, stride_y, offset_y)?;

    let xp = x.as_mut_ptr();
    let yp = y.as_mut_ptr();
    let (mut ix, mut iy) = (offset_x as isize, offset_y as isize);
    for _ in 0..n {
        unsafe {
            let (xi, yi) = (xp.offset(ix), yp.offset(iy));
            let tmp = c * *xi + s * *yi;
            *yi = c * *yi - s * *xi;
            *xi = tmp;
        }
        ix += stride_x;
        iy += stride_y;
    }
    Ok(y)
}

/// Double-precision [`rot`].
pub fn drot<'y>(
    n: usize,
    x: &mut [f64],
    stride_x: isize,
    y: &'y mut [f64],
    stride_y: isize,
    c: f64,
    s: f64,
) -> Result<&'y mut [f64]> {
    drot_with_offsets(
        n,
        x,
        stride_x,
        stride_offset(n, stride_x)?,
        y,
        stride_y,
        stride_offset(n, stride_y)?,
        c,
        s,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn drot_with_offsets<'y>(
    n: usize,
    x: &mut [f64],
    stride_x: isize,
    offset_x: usize,
    y: &'y mut [f64],
    stride_y: isize,
    offset_y: usize,
    c: f64,
    s: f64,
) -> Result<&'y mut [f64]> {
    #[cfg(feature = "blas")]
    {
        if n > 0 {
            check_extent(x.len(), n, stride_x, offset_x)?;
            check_extent(y.len(), n, stride_y, offset_y)?;
            if native::drot(n, x, stride_x, offset_x, y, stride_y, offset_y, c, s) {
                return Ok(y);
            }
        }
    }
    rot_with_offsets(n, x, stride_x, offset_x, y, stride_y, offset_y, c, s)
}

/// Single-precision [`rot`].
pub fn srot<'y>(
    n: usize,
    x: &mut [f32],
    stride_x: isize,
    y: &'y mut [f32],
    stride_y: isize,
    c: f32,
    s: f32,
) -> Result<&'y mut [f32]> {
    srot_with_offsets(
        n,
        x,
        stride_x,
        stride_offset(n, stride_x)?,
        y,
        stride_y,
        stride_offset(n, stride_y)?,
        c,
        s,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn srot_with_offsets<'y>(
    n: usize,
    x: &mut [f32],
    stride_x: isize,
    offset_x: usize,
    y: &'y mut [f32],
    stride_y: isize,
    offset_y: usize,
    c: f32,
    s: f32,
) -> Result<&'y mut [f32]> {
    #[cfg(feature = "blas")]
    {
        if n > 0 {
            check_extent(x.len(), n, stride_x, offset_x)?;
            check_extent(y.len(), n, stride_y, offset_y)?;
            if native::srot(n, x, stride_x, offset_x, y, stride_y, offset_y, c, s) {
                return Ok(y);
            }
        }
    }
    rot_with_offsets(n, x, stride_x, offset_x, y, stride_y, offset_y, c, s)
}

// ============================================================================
// rotm
// ============================================================================

/// Modified Givens rotation.
///
/// `param = [flag, h11, h21, h12, h22]`:
/// - `-2`: identity, nothing is written
/// - `-1`: full `H`
/// - `0`: unit diagonal, uses `h21` and `h12`
/// - `1`: `h12 = 1`, `h21 = -1`, uses `h11` and `h22`
pub fn rotm<'y, T: Float>(
    n: usize,
    x: &mut [T],
    stride_x: isize,
    y: &'y mut [T],
    stride_y: isize,
    param: &[T; 5],
) -> Result<&'y mut [T]> {
    rotm_with_offsets(
        n,
        x,
        stride_x,
        stride_offset(n, stride_x)?,
        y,
        stride_y,
        stride_offset(n, stride_y)?,
        param,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn rotm_with_offsets<'y, T: Float>(
    n: usize,
    x: &mut [T],
    stride_x: isize,
    offset_x: usize,
    y: &'y mut [T],
    stride_y: isize,
    offset_y: usize,
    param: &[T; 5],
) -> Result<&'y mut [T]> {
    let one = T::one();
    let flag = param[0];
    if n == 0 || flag == -(one + one) {
        return Ok(y);
    }
    check_extent(x.len(), n, stride_x, offset_x)?;
    check_extent(y.len(), n, stride_y, offset_y)?;

    let (h11, h21, h12, h22) = if flag < T::zero() {
        (param[1], param[2], param[3], param[4])
    } else if flag == T::zero() {
        (one, param[2], param[3], one)
    } else {
        (param[1], -one, one, param[4])
    };

    let xp = x.as_mut_ptr();
    let yp = y.as_mut_ptr();
    let (mut ix, mut iy) = (offset_x as isize, offset_y as isize);
    for _ in 0..n {
        unsafe {
            let (xi, yi) = (xp.offset(ix), yp.offset(iy));
            let (w, z) = (*xi, *yi);
            *xi = w * h11 + z * h12;
            *yi = w * h21 + z * h22;
        }
        ix += stride_x;
        iy += stride_y;
    }
    Ok(y)
}

pub fn drotm<'y>(
    n: usize,
    x: &mut [f64],
    stride_x: isize,
    y: &'y mut [f64],
    stride_y: isize,
    param: &[f64; 5],
) -> Result<&'y mut [f64]> {
    rotm(n, x, stride_x, y, stride_y, param)
}

// ============================================================================
// spmv
// ============================================================================

/// `y = alpha*A*x + beta*y` for a symmetric `n x n` matrix `A` in packed storage.
///
/// `ap` holds the triangle named by `uplo` packed in `order`. Row-major upper
/// and column-major lower describe the same packing (and likewise the other
/// pair).
#[allow(clippy::too_many_arguments)]
pub fn spmv<'y, T: Float>(
    order: Order,
    uplo: Uplo,
    n: usize,
    alpha: T,
    ap: &[T],
    x: &[T],
    stride_x: isize,
    beta: T,
    y: &'y mut [T],
    stride_y: isize,
) -> Result<&'y mut [T]> {
    spmv_with_offsets(
        order,
        uplo,
        n,
        alpha,
        ap,
        1,
        0,
        x,
        stride_x,
        stride_offset(n, stride_x)?,
        beta,
        y,
        stride_y,
        stride_offset(n, stride_y)?,
    )
}

/// [`spmv`] with explicit strides and starting indices for every operand.
#[allow(clippy::too_many_arguments)]
pub fn spmv_with_offsets<'y, T: Float>(
    order: Order,
    uplo: Uplo,
    n: usize,
    alpha: T,
    ap: &[T],
    stride_ap: isize,
    offset_ap: usize,
    x: &[T],
    stride_x: isize,
    offset_x: usize,
    beta: T,
    y: &'y mut [T],
    stride_y: isize,
    offset_y: usize,
) -> Result<&'y mut [T]> {
    if stride_x == 0 {
        return Err(StridedError::ZeroStride("stride_x"));
    }
    if stride_y == 0 {
        return Err(StridedError::ZeroStride("stride_y"));
    }
    if stride_ap == 0 {
        return Err(StridedError::ZeroStride("stride_ap"));
    }
    let (zero, one) = (T::zero(), T::one());
    if n == 0 || (alpha == zero && beta == one) {
        return Ok(y);
    }
    let packed = n
        .checked_mul(n + 1)
        .map(|v| v / 2)
        .ok_or(StridedError::OffsetOverflow)?;
    check_extent(ap.len(), packed, stride_ap, offset_ap)?;
    check_extent(x.len(), n, stride_x, offset_x)?;
    check_extent(y.len(), n, stride_y, offset_y)?;

    let app = ap.as_ptr();
    let xp = x.as_ptr();
    let yp = y.as_mut_ptr();
    let (ox, oy, oap) = (offset_x as isize, offset_y as isize, offset_ap as isize);
    let xi = |i: usize| unsafe { *xp.offset(ox + i as isize * stride_x) };
    let yi = |i: usize| unsafe { yp.offset(oy + i as isize * stride_y) };
    let a = |k: usize| unsafe { *app.offset(oap + k as isize * stride_ap) };

    if beta != one {
        for i in 0..n {
            unsafe {
                let p = yi(i);
                *p = if beta == zero { zero } else { beta * *p };
            }
        }
    }
    if alpha == zero {
        return Ok(y);
    }

    // Row-major storage of one triangle is column-major storage of the other.
    let upper = matches!(
        (order, uplo),
        (Order::ColumnMajor, Uplo::Upper) | (Order::RowMajor, Uplo::Lower)
    );

    let mut kk = 0usize;
    if upper {
        for j in 0..n {
            let temp1 = alpha * xi(j);
            let mut temp2 = zero;
            for (i, k) in (kk..kk + j).enumerate() {
                unsafe {
                    let p = yi(i);
                    *p = *p + temp1 * a(k);
                }
                temp2 = temp2 + a(k) * xi(i);
            }
            unsafe {
                let p = yi(j);
                *p = *p + temp1 * a(kk + j) + alpha * temp2;
            }
            kk += j + 1;
        }
    } else {
        for j in 0..n {
            let temp1 = alpha * xi(j);
            let mut temp2 = zero;
            unsafe {
                let p = yi(j);
                *p = *p + temp1 * a(kk);
            }
            for (i, k) in (j + 1..n).zip(kk + 1..) {
                unsafe {
                    let p = yi(i);
                    *p = *p + temp1 * a(k);
                }
                temp2 = temp2 + a(k) * xi(i);
            }
            unsafe {
                let p = yi(j);
                *p = *p + alpha * temp2;
            }
            kk += n - j;
        }
    }
    Ok(y)
}

/// Double-precision [`spmv`].
#[allow(clippy::too_many_arguments)]
pub fn dspmv<'y>(
    order: Order,
    uplo: Uplo,
    n: usize,
    alpha: f64,
    ap: &[f64],
    x: &[f64],
    stride_x: isize,
    beta: f64,
    y: &'y mut [f64],
    stride_y: isize,
) -> Result<&'y mut [f64]> {
    spmv(order, uplo, n, alpha, ap, x, stride_x, beta, y, stride_y)
}

// ============================================================================
// CBLAS backend
// ============================================================================

#[cfg(feature = "blas")]
mod native {
    use crate::layout::stride_offset;

    /// BLAS increment and lowest touched index, or `None` if CBLAS cannot take it.
    fn blas_operand(n: usize, stride: isize, offset: usize) -> Option<(i32, usize)> {
        if stride == 0 {
            return None;
        }
        let inc = i32::try_from(stride).ok()?;
        offset
            .checked_sub(stride_offset(n, stride).ok()?)
            .map(|base| (inc, base))
    }

    macro_rules! native_axpy {
        ($name:ident, $t:ty, $cblas:path) => {
            #[allow(clippy::too_many_arguments)]
            pub(super) fn $name(
                n: usize,
                alpha: $t,
                x: &[$t],
                stride_x: isize,
                offset_x: usize,
                y: &mut [$t],
                stride_y: isize,
                offset_y: usize,
            ) -> bool {
                let (Ok(len), Some((incx, bx)), Some((incy, by))) = (
                    i32::try_from(n),
                    blas_operand(n, stride_x, offset_x),
                    blas_operand(n, stride_y, offset_y),
                ) else {
                    return false;
                };
                unsafe { $cblas(len, alpha, &x[bx..], incx, &mut y[by..], incy) };
                true
            }
        };
    }

    macro_rules! native_rot {
        ($name:ident, $t:ty, $cblas:path) => {
            #[allow(clippy::too_many_arguments)]
            pub(super) fn $name(
                n: usize,
                x: &mut [$t],
                stride_x: isize,
                offset_x: usize,
                y: &mut [$t],
                stride_y: isize,
                offset_y: usize,
                c: $t,
                s: $t,
            ) -> bool {
                let (Ok(len), Some((incx, bx)), Some((incy, by))) = (
                    i32::try_from(n),
                    blas_operand(n, stride_x, offset_x),
                    blas_operand(n, stride_y, offset_y),
                ) else {
                    return false;
                };
                unsafe { $cblas(len, &mut x[bx..], incx, &mut y[by..], incy, c, s) };
                true
            }
        };
    }

    native_axpy!(daxpy, f64, cblas::daxpy);
    native_axpy!(saxpy, f32, cblas::saxpy);
    native_rot!(drot, f64, cblas::drot);
    native_rot!(srot, f32, cblas::srot);
}
