//! Element-wise callbacks over `Vec`-nested arrays.
//!
//! `shape[0]` is the extent of the outermost nesting level, so a `[2, 3, 4]`
//! shape reads `x[i0][i1][i2]` with `i2` varying fastest. Only the region
//! covered by `shape` is read or written; longer rows are left alone.
//!
//! Operands are gathered into dense row-major buffers, run through the
//! rank-specialized loop nest in [`crate::map`], and the output region is
//! scattered back. Outputs are gathered too, so masked elements keep their
//! prior values.

use crate::kernel::Traversal;
use crate::map;
use crate::view::{StridedView, StridedViewMut};
use crate::{Result, StridedError};

/// Two-level nested array (`x[i0][i1]`).
pub type Nested2d<T> = [Vec<T>];
/// Three-level nested array (`x[i0][i1][i2]`).
pub type Nested3d<T> = [Vec<Vec<T>>];
/// Four-level nested array (`x[i0][i1][i2][i3]`).
pub type Nested4d<T> = [Vec<Vec<Vec<T>>>];

fn prefix<T>(x: &[T], n: usize) -> Result<&[T]> {
    let len = x.len();
    x.get(..n).ok_or(StridedError::OutOfBounds {
        index: n as isize - 1,
        len,
    })
}

fn prefix_mut<T>(x: &mut [T], n: usize) -> Result<&mut [T]> {
    let len = x.len();
    x.get_mut(..n).ok_or(StridedError::OutOfBounds {
        index: n as isize - 1,
        len,
    })
}

fn gather1<T: Copy>(x: &[T], shape: &[usize], out: &mut Vec<T>) -> Result<()> {
    out.extend_from_slice(prefix(x, shape[0])?);
    Ok(())
}

fn gather2<T: Copy>(x: &Nested2d<T>, shape: &[usize], out: &mut Vec<T>) -> Result<()> {
    for row in prefix(x, shape[0])? {
        gather1(row, &shape[1..], out)?;
    }
    Ok(())
}

fn gather3<T: Copy>(x: &Nested3d<T>, shape: &[usize], out: &mut Vec<T>) -> Result<()> {
    for plane in prefix(x, shape[0])? {
        gather2(plane, &shape[1..], out)?;
    }
    Ok(())
}

fn gather4<T: Copy>(x: &Nested4d<T>, shape: &[usize], out: &mut Vec<T>) -> Result<()> {
    for cube in prefix(x, shape[0])? {
        gather3(cube, &shape[1..], out)?;
    }
    Ok(())
}

fn scatter1<T: Copy>(x: &mut [T], shape: &[usize], src: &mut &[T]) -> Result<()> {
    let cur: &[T] = *src;
    let (head, rest) = cur.split_at(shape[0]);
    prefix_mut(x, shape[0])?.copy_from_slice(head);
    *src = rest;
    Ok(())
}

fn scatter2<T: Copy>(x: &mut Nested2d<T>, shape: &[usize], src: &mut &[T]) -> Result<()> {
    for row in prefix_mut(x, shape[0])? {
        scatter1(row, &shape[1..], src)?;
    }
    Ok(())
}

fn scatter3<T: Copy>(x: &mut Nested3d<T>, shape: &[usize], src: &mut &[T]) -> Result<()> {
    for plane in prefix_mut(x, shape[0])? {
        scatter2(plane, &shape[1..], src)?;
    }
    Ok(())
}

fn scatter4<T: Copy>(x: &mut Nested4d<T>, shape: &[usize], src: &mut &[T]) -> Result<()> {
    for cube in prefix_mut(x, shape[0])? {
        scatter3(cube, &shape[1..], src)?;
    }
    Ok(())
}

macro_rules! nested_rank {
    (
        $rank:literal, $arr:ident, $gather:ident, $scatter:ident,
        $unary:ident, $binary:ident, $ternary:ident, $quaternary:ident, $mskunary:ident
    ) => {
        #[doc = concat!("`y = f(x)` over ", stringify!($rank), "-level nested arrays.")]
        pub fn $unary<T, U, F>(x: &$arr<T>, y: &mut $arr<U>, shape: [usize; $rank], f: F) -> Result<()>
        where
            T: Copy,
            U: Copy,
            F: FnMut(T) -> U,
        {
            if shape.contains(&0) {
                return Ok(());
            }
            let n: usize = shape.iter().product();
            let (mut xs, mut ys) = (Vec::with_capacity(n), Vec::with_capacity(n));
            $gather(x, &shape, &mut xs)?;
            $gather(y, &shape, &mut ys)?;
            map::unary_with(
                Traversal::Fixed($rank),
                &StridedView::contiguous(&xs, &shape)?,
                &mut StridedViewMut::contiguous(&mut ys, &shape)?,
                f,
            )?;
            $scatter(y, &shape, &mut ys.as_slice())
        }

        #[doc = concat!("`z = f(x, y)` over ", stringify!($rank), "-level nested arrays.")]
        pub fn $binary<T1, T2, U, F>(
            x: &$arr<T1>,
            y: &$arr<T2>,
            z: &mut $arr<U>,
            shape: [usize; $rank],
            f: F,
        ) -> Result<()>
        where
            T1: Copy,
            T2: Copy,
            U: Copy,
            F: FnMut(T1, T2) -> U,
        {
            if shape.contains(&0) {
                return Ok(());
            }
            let n: usize = shape.iter().product();
            let (mut xs, mut ys, mut zs) =
                (Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n));
            $gather(x, &shape, &mut xs)?;
            $gather(y, &shape, &mut ys)?;
            $gather(z, &shape, &mut zs)?;
            map::binary_with(
                Traversal::Fixed($rank),
                &StridedView::contiguous(&xs, &shape)?,
                &StridedView::contiguous(&ys, &shape)?,
                &mut StridedViewMut::contiguous(&mut zs, &shape)?,
                f,
            )?;
            $scatter(z, &shape, &mut zs.as_slice())
        }

        #[doc = concat!("`w = f(x, y, z)` over ", stringify!($rank), "-level nested arrays.")]
        pub fn $ternary<T1, T2, T3, U, F>(
            x: &$arr<T1>,
            y: &$arr<T2>,
            z: &$arr<T3>,
            w: &mut $arr<U>,
            shape: [usize; $rank],
            f: F,
        ) -> Result<()>
        where
            T1: Copy,
            T2: Copy,
            T3: Copy,
            U: Copy,
            F: FnMut(T1, T2, T3) -> U,
        {
            if shape.contains(&0) {
                return Ok(());
            }
            let n: usize = shape.iter().product();
            let (mut xs, mut ys, mut zs, mut ws) = (
                Vec::with_capacity(n),
                Vec::with_capacity(n),
                Vec::with_capacity(n),
                Vec::with_capacity(n),
            );
            $gather(x, &shape, &mut xs)?;
            $gather(y, &shape, &mut ys)?;
            $gather(z, &shape, &mut zs)?;
            $gather(w, &shape, &mut ws)?;
            map::ternary_with(
                Traversal::Fixed($rank),
                &StridedView::contiguous(&xs, &shape)?,
                &StridedView::contiguous(&ys, &shape)?,
                &StridedView::contiguous(&zs, &shape)?,
                &mut StridedViewMut::contiguous(&mut ws, &shape)?,
                f,
            )?;
            $scatter(w, &shape, &mut ws.as_slice())
        }

        #[doc = concat!("`u = f(x, y, z, w)` over ", stringify!($rank), "-level nested arrays.")]
        pub fn $quaternary<T1, T2, T3, T4, U, F>(
            x: &$arr<T1>,
            y: &$arr<T2>,
            z: &$arr<T3>,
            w: &$arr<T4>,
            u: &mut $arr<U>,
            shape: [usize; $rank],
            f: F,
        ) -> Result<()>
        where
            T1: Copy,
            T2: Copy,
            T3: Copy,
            T4: Copy,
            U: Copy,
            F: FnMut(T1, T2, T3, T4) -> U,
        {
            if shape.contains(&0) {
                return Ok(());
            }
            let n: usize = shape.iter().product();
            let (mut xs, mut ys, mut zs, mut ws, mut us) = (
                Vec::with_capacity(n),
                Vec::with_capacity(n),
                Vec::with_capacity(n),
                Vec::with_capacity(n),
                Vec::with_capacity(n),
            );
            $gather(x, &shape, &mut xs)?;
            $gather(y, &shape, &mut ys)?;
            $gather(z, &shape, &mut zs)?;
            $gather(w, &shape, &mut ws)?;
            $gather(u, &shape, &mut us)?;
            map::quaternary_with(
                Traversal::Fixed($rank),
                &StridedView::contiguous(&xs, &shape)?,
                &StridedView::contiguous(&ys, &shape)?,
                &StridedView::contiguous(&zs, &shape)?,
                &StridedView::contiguous(&ws, &shape)?,
                &mut StridedViewMut::contiguous(&mut us, &shape)?,
                f,
            )?;
            $scatter(u, &shape, &mut us.as_slice())
        }

        #[doc = concat!("`y = f(x)` where `mask == 0`, over ", stringify!($rank), "-level nested arrays.")]
        pub fn $mskunary<T, U, F>(
            x: &$arr<T>,
            mask: &$arr<u8>,
            y: &mut $arr<U>,
            shape: [usize; $rank],
            f: F,
        ) -> Result<()>
        where
            T: Copy,
            U: Copy,
            F: FnMut(T) -> U,
        {
            if shape.contains(&0) {
                return Ok(());
            }
            let n: usize = shape.iter().product();
            let (mut xs, mut ms, mut ys) =
                (Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n));
            $gather(x, &shape, &mut xs)?;
            $gather(mask, &shape, &mut ms)?;
            $gather(y, &shape, &mut ys)?;
            map::mskunary_with(
                Traversal::Fixed($rank),
                &StridedView::contiguous(&xs, &shape)?,
                &StridedView::contiguous(&ms, &shape)?,
                &mut StridedViewMut::contiguous(&mut ys, &shape)?,
                f,
            )?;
            $scatter(y, &shape, &mut ys.as_slice())
        }
    };
}

nested_rank!(2, Nested2d, gather2, scatter2, unary2d, binary2d, ternary2d, quaternary2d, mskunary2d);
nested_rank!(3, Nested3d, gather3, scatter3, unary3d, binary3d, ternary3d, quaternary3d, mskunary3d);
nested_rank!(4, Nested4d, gather4, scatter4, unary4d, binary4d, ternary4d, quaternary4d, mskunary4d);
