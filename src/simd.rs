//! Runtime target-feature dispatch for dense floating-point loops.
//!
//! With the `simd` feature, closures run under `pulp::Arch::dispatch`, which
//! recompiles them for the best instruction set the CPU reports. Without
//! it they run as-is.

/// Loops shorter than this skip the dispatch overhead.
pub(crate) const DISPATCH_THRESHOLD: usize = 64;

#[inline(always)]
pub(crate) fn dispatch<R>(f: impl FnOnce() -> R) -> R {
    #[cfg(feature = "simd")]
    {
        pulp::Arch::new().dispatch(f)
    }
    #[cfg(not(feature = "simd"))]
    {
        f()
    }
}

#[inline(always)]
pub(crate) fn dispatch_if_large<R>(len: usize, f: impl FnOnce() -> R) -> R {
    if len >= DISPATCH_THRESHOLD {
        dispatch(f)
    } else {
        f()
    }
}

/// Dense element-wise arithmetic with explicit SIMD lanes.
///
/// Every operation is a single IEEE add, sub or mul per element, so results
/// match the scalar loop bit for bit.
pub(crate) trait SimdArith: Copy + Sized {
    fn add_slices(a: &[Self], b: &[Self], out: &mut [Self]);
    fn sub_slices(a: &[Self], b: &[Self], out: &mut [Self]);
    fn mul_slices(a: &[Self], b: &[Self], out: &mut [Self]);
    fn abs_slice(a: &[Self], out: &mut [Self]);
}

#[cfg(not(feature = "simd"))]
macro_rules! impl_scalar_arith {
    ($t:ty) => {
        impl SimdArith for $t {
            fn add_slices(a: &[$t], b: &[$t], out: &mut [$t]) {
                for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
                    *o = x + y;
                }
            }
            fn sub_slices(a: &[$t], b: &[$t], out: &mut [$t]) {
                for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
                    *o = x - y;
                }
            }
            fn mul_slices(a: &[$t], b: &[$t], out: &mut [$t]) {
                for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
                    *o = x * y;
                }
            }
            fn abs_slice(a: &[$t], out: &mut [$t]) {
                for (o, &x) in out.iter_mut().zip(a) {
                    *o = x.abs();
                }
            }
        }
    };
}

#[cfg(not(feature = "simd"))]
impl_scalar_arith!(f32);
#[cfg(not(feature = "simd"))]
impl_scalar_arith!(f64);

#[cfg(feature = "simd")]
mod simd_impls {
    use super::{dispatch_if_large, SimdArith};
    use pulp::{Simd, WithSimd};

    macro_rules! lane_op {
        ($name:ident, $t:ty, $as_simd:ident, $as_simd_mut:ident, $op:ident, $scalar:tt) => {
            struct $name<'a> {
                a: &'a [$t],
                b: &'a [$t],
                out: &'a mut [$t],
            }

            impl WithSimd for $name<'_> {
                type Output = ();

                #[inline(always)]
                fn with_simd<S: Simd>(self, simd: S) -> Self::Output {
                    let (a_head, a_tail) = S::$as_simd(self.a);
                    let (b_head, b_tail) = S::$as_simd(self.b);
                    let (o_head, o_tail) = S::$as_simd_mut(self.out);
                    for ((o, &x), &y) in o_head.iter_mut().zip(a_head).zip(b_head) {
                        *o = simd.$op(x, y);
                    }
                    for ((o, &x), &y) in o_tail.iter_mut().zip(a_tail).zip(b_tail) {
                        *o = x $scalar y;
                    }
                }
            }
        };
    }

    lane_op!(AddF64, f64, as_simd_f64s, as_mut_simd_f64s, add_f64s, +);
    lane_op!(SubF64, f64, as_simd_f64s, as_mut_simd_f64s, sub_f64s, -);
    lane_op!(MulF64, f64, as_simd_f64s, as_mut_simd_f64s, mul_f64s, *);
    lane_op!(AddF32, f32, as_simd_f32s, as_mut_simd_f32s, add_f32s, +);
    lane_op!(SubF32, f32, as_simd_f32s, as_mut_simd_f32s, sub_f32s, -);
    lane_op!(MulF32, f32, as_simd_f32s, as_mut_simd_f32s, mul_f32s, *);

    macro_rules! impl_simd_arith {
        ($t:ty, $add:ident, $sub:ident, $mul:ident) => {
            impl SimdArith for $t {
                fn add_slices(a: &[$t], b: &[$t], out: &mut [$t]) {
                    pulp::Arch::new().dispatch($add { a, b, out });
                }
                fn sub_slices(a: &[$t], b: &[$t], out: &mut [$t]) {
                    pulp::Arch::new().dispatch($sub { a, b, out });
                }
                fn mul_slices(a: &[$t], b: &[$t], out: &mut [$t]) {
                    pulp::Arch::new().dispatch($mul { a, b, out });
                }
                fn abs_slice(a: &[$t], out: &mut [$t]) {
                    dispatch_if_large(a.len(), || {
                        for (o, &x) in out.iter_mut().zip(a) {
                            *o = x.abs();
                        }
                    });
                }
            }
        };
    }

    impl_simd_arith!(f64, AddF64, SubF64, MulF64);
    impl_simd_arith!(f32, AddF32, SubF32, MulF32);
}
