//! Element-wise callbacks over strided views.
//!
//! Each arity has a `*_with` function taking an explicit [`Traversal`] plus
//! generated entry points:
//!
//! - `<name>1d` .. `<name>4d`: rank-specialized loop nests
//! - `<name>nd`: rank-agnostic recursion
//! - `<name>`: automatic loop ordering and fusion
//!
//! Cache-tiled traversal is reached through `*_with(Traversal::Blocked, ..)`.
//!
//! Inputs come first, the output view is last. Shapes are checked before any
//! element is touched; a zero extent anywhere makes the call a no-op.

use std::mem::size_of;

use crate::kernel::{ensure_same_shape, for_each_offset, widest, Traversal};
use crate::layout::row_major_strides;
use crate::view::{StridedView, StridedViewMut};
use crate::Result;

macro_rules! traversal_entry_points {
    (
        $(#[$meta:meta])*
        $with:ident => [$d1:ident, $d2:ident, $d3:ident, $d4:ident, $nd:ident, $auto:ident]
        <$($g:ident),*> ($($arg:ident : $ty:ty),* $(,)?)
        where { $($bounds:tt)* }
    ) => {
        #[doc = concat!("[`", stringify!($with), "`] with the rank-1 loop nest.")]
        pub fn $d1<$($g),*>($($arg: $ty),*) -> Result<()>
        where
            $($bounds)*
        {
            $with(Traversal::Fixed(1), $($arg),*)
        }

        #[doc = concat!("[`", stringify!($with), "`] with the rank-2 loop nest.")]
        pub fn $d2<$($g),*>($($arg: $ty),*) -> Result<()>
        where
            $($bounds)*
        {
            $with(Traversal::Fixed(2), $($arg),*)
        }

        #[doc = concat!("[`", stringify!($with), "`] with the rank-3 loop nest.")]
        pub fn $d3<$($g),*>($($arg: $ty),*) -> Result<()>
        where
            $($bounds)*
        {
            $with(Traversal::Fixed(3), $($arg),*)
        }

        #[doc = concat!("[`", stringify!($with), "`] with the rank-4 loop nest.")]
        pub fn $d4<$($g),*>($($arg: $ty),*) -> Result<()>
        where
            $($bounds)*
        {
            $with(Traversal::Fixed(4), $($arg),*)
        }

        #[doc = concat!("[`", stringify!($with), "`] for any rank, by recursion.")]
        pub fn $nd<$($g),*>($($arg: $ty),*) -> Result<()>
        where
            $($bounds)*
        {
            $with(Traversal::Nd, $($arg),*)
        }

        $(#[$meta])*
        pub fn $auto<$($g),*>($($arg: $ty),*) -> Result<()>
        where
            $($bounds)*
        {
            $with(Traversal::Auto, $($arg),*)
        }
    };
}

// ============================================================================
// nullary
// ============================================================================

/// Fill `y` with successive results of `f()`.
pub fn nullary_with<U, F>(traversal: Traversal, y: &mut StridedViewMut<'_, U>, mut f: F) -> Result<()>
where
    F: FnMut() -> U,
{
    let yp = y.as_mut_ptr();
    for_each_offset(traversal, y.shape(), [y.strides()], size_of::<U>(), |o| unsafe {
        *yp.offset(o[0]) = f();
    })
}

traversal_entry_points! {
    /// Fill `y` with successive results of `f()`.
    nullary_with => [nullary1d, nullary2d, nullary3d, nullary4d, nullarynd, nullary]
    <U, F>(y: &mut StridedViewMut<'_, U>, f: F)
    where { F: FnMut() -> U }
}

// ============================================================================
// unary
// ============================================================================

/// `y[i] = f(x[i])`.
pub fn unary_with<T, U, F>(
    traversal: Traversal,
    x: &StridedView<'_, T>,
    y: &mut StridedViewMut<'_, U>,
    mut f: F,
) -> Result<()>
where
    T: Copy,
    F: FnMut(T) -> U,
{
    ensure_same_shape(x.shape(), y.shape())?;
    let xp = x.ptr();
    let yp = y.as_mut_ptr();
    let elem = widest(&[size_of::<T>(), size_of::<U>()]);
    for_each_offset(traversal, y.shape(), [x.strides(), y.strides()], elem, |o| unsafe {
        *yp.offset(o[1]) = f(*xp.offset(o[0]));
    })
}

traversal_entry_points! {
    /// `y[i] = f(x[i])`.
    unary_with => [unary1d, unary2d, unary3d, unary4d, unarynd, unary]
    <T, U, F>(x: &StridedView<'_, T>, y: &mut StridedViewMut<'_, U>, f: F)
    where { T: Copy, F: FnMut(T) -> U }
}

// ============================================================================
// binary
// ============================================================================

/// `z[i] = f(x[i], y[i])`.
pub fn binary_with<T1, T2, U, F>(
    traversal: Traversal,
    x: &StridedView<'_, T1>,
    y: &StridedView<'_, T2>,
    z: &mut StridedViewMut<'_, U>,
    mut f: F,
) -> Result<()>
where
    T1: Copy,
    T2: Copy,
    F: FnMut(T1, T2) -> U,
{
    ensure_same_shape(x.shape(), z.shape())?;
    ensure_same_shape(y.shape(), z.shape())?;
    let (xp, yp) = (x.ptr(), y.ptr());
    let zp = z.as_mut_ptr();
    for_each_offset(
        traversal,
        z.shape(),
        [x.strides(), y.strides(), z.strides()],
        widest(&[size_of::<T1>(), size_of::<T2>(), size_of::<U>()]),
        |o| unsafe {
            *zp.offset(o[2]) = f(*xp.offset(o[0]), *yp.offset(o[1]));
        },
    )
}

traversal_entry_points! {
    /// `z[i] = f(x[i], y[i])`.
    binary_with => [binary1d, binary2d, binary3d, binary4d, binarynd, binary]
    <T1, T2, U, F>(
        x: &StridedView<'_, T1>,
        y: &StridedView<'_, T2>,
        z: &mut StridedViewMut<'_, U>,
        f: F,
    )
    where { T1: Copy, T2: Copy, F: FnMut(T1, T2) -> U }
}

// ============================================================================
// ternary
// ============================================================================

/// `w[i] = f(x[i], y[i], z[i])`.
pub fn ternary_with<T1, T2, T3, U, F>(
    traversal: Traversal,
    x: &StridedView<'_, T1>,
    y: &StridedView<'_, T2>,
    z: &StridedView<'_, T3>,
    w: &mut StridedViewMut<'_, U>,
    mut f: F,
) -> Result<()>
where
    T1: Copy,
    T2: Copy,
    T3: Copy,
    F: FnMut(T1, T2, T3) -> U,
{
    for input in [x.shape(), y.shape(), z.shape()] {
        ensure_same_shape(input, w.shape())?;
    }
    let (xp, yp, zp) = (x.ptr(), y.ptr(), z.ptr());
    let wp = w.as_mut_ptr();
    for_each_offset(
        traversal,
        w.shape(),
        [x.strides(), y.strides(), z.strides(), w.strides()],
        widest(&[size_of::<T1>(), size_of::<T2>(), size_of::<T3>(), size_of::<U>()]),
        |o| unsafe {
            *wp.offset(o[3]) = f(*xp.offset(o[0]), *yp.offset(o[1]), *zp.offset(o[2]));
        },
    )
}

traversal_entry_points! {
    /// `w[i] = f(x[i], y[i], z[i])`.
    ternary_with => [ternary1d, ternary2d, ternary3d, ternary4d, ternarynd, ternary]
    <T1, T2, T3, U, F>(
        x: &StridedView<'_, T1>,
        y: &StridedView<'_, T2>,
        z: &StridedView<'_, T3>,
        w: &mut StridedViewMut<'_, U>,
        f: F,
    )
    where { T1: Copy, T2: Copy, T3: Copy, F: FnMut(T1, T2, T3) -> U }
}

// ============================================================================
// quaternary
// ============================================================================

/// `u[i] = f(x[i], y[i], z[i], w[i])`.
#[allow(clippy::too_many_arguments)]
pub fn quaternary_with<T1, T2, T3, T4, U, F>(
    traversal: Traversal,
    x: &StridedView<'_, T1>,
    y: &StridedView<'_, T2>,
    z: &StridedView<'_, T3>,
    w: &StridedView<'_, T4>,
    u: &mut StridedViewMut<'_, U>,
    mut f: F,
) -> Result<()>
where
    T1: Copy,
    T2: Copy,
    T3: Copy,
    T4: Copy,
    F: FnMut(T1, T2, T3, T4) -> U,
{
    for input in [x.shape(), y.shape(), z.shape(), w.shape()] {
        ensure_same_shape(input, u.shape())?;
    }
    let (xp, yp, zp, wp) = (x.ptr(), y.ptr(), z.ptr(), w.ptr());
    let up = u.as_mut_ptr();
    for_each_offset(
        traversal,
        u.shape(),
        [x.strides(), y.strides(), z.strides(), w.strides(), u.strides()],
        widest(&[size_of::<T1>(), size_of::<T2>(), size_of::<T3>(), size_of::<T4>(), size_of::<U>()]),
        |o| unsafe {
            *up.offset(o[4]) = f(
                *xp.offset(o[0]),
                *yp.offset(o[1]),
                *zp.offset(o[2]),
                *wp.offset(o[3]),
            );
        },
    )
}

traversal_entry_points! {
    /// `u[i] = f(x[i], y[i], z[i], w[i])`.
    quaternary_with => [quaternary1d, quaternary2d, quaternary3d, quaternary4d, quaternarynd, quaternary]
    <T1, T2, T3, T4, U, F>(
        x: &StridedView<'_, T1>,
        y: &StridedView<'_, T2>,
        z: &StridedView<'_, T3>,
        w: &StridedView<'_, T4>,
        u: &mut StridedViewMut<'_, U>,
        f: F,
    )
    where { T1: Copy, T2: Copy, T3: Copy, T4: Copy, F: FnMut(T1, T2, T3, T4) -> U }
}

// ============================================================================
// quinary
// ============================================================================

/// `out[i] = f(x[i], y[i], z[i], w[i], u[i])`.
#[allow(clippy::too_many_arguments)]
pub fn quinary_with<T1, T2, T3, T4, T5, U, F>(
    traversal: Traversal,
    x: &StridedView<'_, T1>,
    y: &StridedView<'_, T2>,
    z: &StridedView<'_, T3>,
    w: &StridedView<'_, T4>,
    u: &StridedView<'_, T5>,
    out: &mut StridedViewMut<'_, U>,
    mut f: F,
) -> Result<()>
where
    T1: Copy,
    T2: Copy,
    T3: Copy,
    T4: Copy,
    T5: Copy,
    F: FnMut(T1, T2, T3, T4, T5) -> U,
{
    for input in [x.shape(), y.shape(), z.shape(), w.shape(), u.shape()] {
        ensure_same_shape(input, out.shape())?;
    }
    let (xp, yp, zp, wp, up) = (x.ptr(), y.ptr(), z.ptr(), w.ptr(), u.ptr());
    let op = out.as_mut_ptr();
    for_each_offset(
        traversal,
        out.shape(),
        [
            x.strides(),
            y.strides(),
            z.strides(),
            w.strides(),
            u.strides(),
            out.strides(),
        ],
        widest(&[
            size_of::<T1>(),
            size_of::<T2>(),
            size_of::<T3>(),
            size_of::<T4>(),
            size_of::<T5>(),
            size_of::<U>(),
        ]),
        |o| unsafe {
            *op.offset(o[5]) = f(
                *xp.offset(o[0]),
                *yp.offset(o[1]),
                *zp.offset(o[2]),
                *wp.offset(o[3]),
                *up.offset(o[4]),
            );
        },
    )
}

traversal_entry_points! {
    /// `out[i] = f(x[i], y[i], z[i], w[i], u[i])`.
    quinary_with => [quinary1d, quinary2d, quinary3d, quinary4d, quinarynd, quinary]
    <T1, T2, T3, T4, T5, U, F>(
        x: &StridedView<'_, T1>,
        y: &StridedView<'_, T2>,
        z: &StridedView<'_, T3>,
        w: &StridedView<'_, T4>,
        u: &StridedView<'_, T5>,
        out: &mut StridedViewMut<'_, U>,
        f: F,
    )
    where { T1: Copy, T2: Copy, T3: Copy, T4: Copy, T5: Copy, F: FnMut(T1, T2, T3, T4, T5) -> U }
}

// ============================================================================
// masked
// ============================================================================

/// `y[i] = f(x[i])` where `mask[i] == 0`; other elements of `y` are left as they were.
pub fn mskunary_with<T, U, F>(
    traversal: Traversal,
    x: &StridedView<'_, T>,
    mask: &StridedView<'_, u8>,
    y: &mut StridedViewMut<'_, U>,
    mut f: F,
) -> Result<()>
where
    T: Copy,
    F: FnMut(T) -> U,
{
    ensure_same_shape(x.shape(), y.shape())?;
    ensure_same_shape(mask.shape(), y.shape())?;
    let (xp, mp) = (x.ptr(), mask.ptr());
    let yp = y.as_mut_ptr();
    for_each_offset(
        traversal,
        y.shape(),
        [x.strides(), mask.strides(), y.strides()],
        widest(&[size_of::<T>(), size_of::<U>()]),
        |o| unsafe {
            if *mp.offset(o[1]) == 0 {
                *yp.offset(o[2]) = f(*xp.offset(o[0]));
            }
        },
    )
}

traversal_entry_points! {
    /// `y[i] = f(x[i])` where `mask[i] == 0`.
    mskunary_with => [mskunary1d, mskunary2d, mskunary3d, mskunary4d, mskunarynd, mskunary]
    <T, U, F>(x: &StridedView<'_, T>, mask: &StridedView<'_, u8>, y: &mut StridedViewMut<'_, U>, f: F)
    where { T: Copy, F: FnMut(T) -> U }
}

/// `z[i] = f(x[i], y[i])` where `mask[i] == 0`.
pub fn mskbinary_with<T1, T2, U, F>(
    traversal: Traversal,
    x: &StridedView<'_, T1>,
    y: &StridedView<'_, T2>,
    mask: &StridedView<'_, u8>,
    z: &mut StridedViewMut<'_, U>,
    mut f: F,
) -> Result<()>
where
    T1: Copy,
    T2: Copy,
    F: FnMut(T1, T2) -> U,
{
    for input in [x.shape(), y.shape(), mask.shape()] {
        ensure_same_shape(input, z.shape())?;
    }
    let (xp, yp, mp) = (x.ptr(), y.ptr(), mask.ptr());
    let zp = z.as_mut_ptr();
    for_each_offset(
        traversal,
        z.shape(),
        [x.strides(), y.strides(), mask.strides(), z.strides()],
        widest(&[size_of::<T1>(), size_of::<T2>(), size_of::<U>()]),
        |o| unsafe {
            if *mp.offset(o[2]) == 0 {
                *zp.offset(o[3]) = f(*xp.offset(o[0]), *yp.offset(o[1]));
            }
        },
    )
}

traversal_entry_points! {
    /// `z[i] = f(x[i], y[i])` where `mask[i] == 0`.
    mskbinary_with => [mskbinary1d, mskbinary2d, mskbinary3d, mskbinary4d, mskbinarynd, mskbinary]
    <T1, T2, U, F>(
        x: &StridedView<'_, T1>,
        y: &StridedView<'_, T2>,
        mask: &StridedView<'_, u8>,
        z: &mut StridedViewMut<'_, U>,
        f: F,
    )
    where { T1: Copy, T2: Copy, F: FnMut(T1, T2) -> U }
}

// ============================================================================
// accessor
// ============================================================================

/// Unary map with an accessor callback.
///
/// For each element, `clbk(x[i], n)` is called with the row-major linear
/// index `n` of `i` (the position `i` would have in a dense C-order array of
/// the same shape). The index does not depend on the traversal or on the
/// operand strides. `None` leaves `y[i]` untouched; `Some(v)` stores `f(v)`.
pub fn unary_by_with<T, U, F, C>(
    traversal: Traversal,
    x: &StridedView<'_, T>,
    y: &mut StridedViewMut<'_, U>,
    mut f: F,
    mut clbk: C,
) -> Result<()>
where
    T: Copy,
    F: FnMut(T) -> U,
    C: FnMut(T, usize) -> Option<T>,
{
    ensure_same_shape(x.shape(), y.shape())?;
    let xp = x.ptr();
    let yp = y.as_mut_ptr();
    let linear = row_major_strides(y.shape());
    let elem = widest(&[size_of::<T>(), size_of::<U>()]);
    for_each_offset(
        traversal,
        y.shape(),
        [x.strides(), linear.as_slice(), y.strides()],
        elem,
        |o| {
            let value = unsafe { *xp.offset(o[0]) };
            if let Some(v) = clbk(value, o[1] as usize) {
                unsafe {
                    *yp.offset(o[2]) = f(v);
                }
            }
        },
    )
}

traversal_entry_points! {
    /// Unary map with an accessor callback; see [`unary_by_with`].
    unary_by_with => [unary_by1d, unary_by2d, unary_by3d, unary_by4d, unary_bynd, unary_by]
    <T, U, F, C>(x: &StridedView<'_, T>, y: &mut StridedViewMut<'_, U>, f: F, clbk: C)
    where { T: Copy, F: FnMut(T) -> U, C: FnMut(T, usize) -> Option<T> }
}

/// Binary map with an accessor callback.
///
/// `clbk((x[i], y[i]), n)` sees both input values and the row-major linear
/// index `n`, as in [`unary_by_with`]. `Some((a, b))` stores `f(a, b)` in
/// `z[i]`; `None` skips the element.
pub fn binary_by_with<T1, T2, U, F, C>(
    traversal: Traversal,
    x: &StridedView<'_, T1>,
    y: &StridedView<'_, T2>,
    z: &mut StridedViewMut<'_, U>,
    mut f: F,
    mut clbk: C,
) -> Result<()>
where
    T1: Copy,
    T2: Copy,
    F: FnMut(T1, T2) -> U,
    C: FnMut((T1, T2), usize) -> Option<(T1, T2)>,
{
    ensure_same_shape(x.shape(), z.shape())?;
    ensure_same_shape(y.shape(), z.shape())?;
    let (xp, yp) = (x.ptr(), y.ptr());
    let zp = z.as_mut_ptr();
    let linear = row_major_strides(z.shape());
    let elem = widest(&[size_of::<T1>(), size_of::<T2>(), size_of::<U>()]);
    for_each_offset(
        traversal,
        z.shape(),
        [x.strides(), y.strides(), linear.as_slice(), z.strides()],
        elem,
        |o| {
            let values = unsafe { (*xp.offset(o[0]), *yp.offset(o[1])) };
            if let Some((a, b)) = clbk(values, o[2] as usize) {
                unsafe {
                    *zp.offset(o[3]) = f(a, b);
                }
            }
        },
    )
}

traversal_entry_points! {
    /// Binary map with an accessor callback; see [`binary_by_with`].
    binary_by_with => [binary_by1d, binary_by2d, binary_by3d, binary_by4d, binary_bynd, binary_by]
    <T1, T2, U, F, C>(
        x: &StridedView<'_, T1>,
        y: &StridedView<'_, T2>,
        z: &mut StridedViewMut<'_, U>,
        f: F,
        clbk: C,
    )
    where { T1: Copy, T2: Copy, F: FnMut(T1, T2) -> U, C: FnMut((T1, T2), usize) -> Option<(T1, T2)> }
}
