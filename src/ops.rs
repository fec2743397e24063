//! Ready-made element-wise dispatchers.
//!
//! | table | signatures |
//! |---|---|
//! | [`abs`] | float64, float32, int32, complex128 -> float64, generic |
//! | [`add`], [`sub`], [`mul`] | float64, float32, int32, complex128, generic |
//! | [`axpy`] | float64, float32, generic |
//!
//! The float64 and float32 entries carry native kernels ([`Capability::Simd`],
//! or [`Capability::Blas`] for `axpy`) that run on whole slices when every
//! operand is dense row-major and fall back to the strided loop otherwise.

use num_complex::Complex64;

use crate::backend::{Capabilities, Capability};
use crate::blas;
use crate::dispatch::{binary_kernel, unary_kernel, Dispatcher, Kernel};
use crate::dtype::{DType, Element, Scalar, Signature};
use crate::kernel::ensure_same_shape;
use crate::map;
use crate::simd::SimdArith;
use crate::Result;

fn simd_unary<T>(slices: fn(&[T], &mut [T]), scalar: fn(T) -> T) -> Kernel
where
    T: Element + SimdArith,
{
    Kernel::new(move |inputs, outputs| {
        let x = inputs[0].typed::<T>()?;
        let mut y = outputs[0].typed_mut::<T>()?;
        ensure_same_shape(x.shape(), y.shape())?;
        if let (Some(a), Some(out)) = (x.as_contiguous_slice(), y.as_contiguous_slice_mut()) {
            slices(a, out);
            return Ok(());
        }
        map::unary(&x, &mut y, scalar)
    })
}

fn simd_binary<T>(slices: fn(&[T], &[T], &mut [T]), scalar: fn(T, T) -> T) -> Kernel
where
    T: Element + SimdArith,
{
    Kernel::new(move |inputs, outputs| {
        let x = inputs[0].typed::<T>()?;
        let y = inputs[1].typed::<T>()?;
        let mut z = outputs[0].typed_mut::<T>()?;
        ensure_same_shape(x.shape(), z.shape())?;
        ensure_same_shape(y.shape(), z.shape())?;
        if let (Some(a), Some(b), Some(out)) = (
            x.as_contiguous_slice(),
            y.as_contiguous_slice(),
            z.as_contiguous_slice_mut(),
        ) {
            slices(a, b, out);
            return Ok(());
        }
        map::binary(&x, &y, &mut z, scalar)
    })
}

/// Element-wise absolute value (`nin = 1`, `nout = 1`).
pub fn abs(capabilities: &Capabilities) -> Result<Dispatcher> {
    Dispatcher::builder("abs", 1, 1)
        .kernel(Signature::uniform(DType::Float64, 2), unary_kernel(f64::abs))
        .native(
            Signature::uniform(DType::Float64, 2),
            Capability::Simd,
            simd_unary(f64::abs_slice, f64::abs),
        )
        .kernel(Signature::uniform(DType::Float32, 2), unary_kernel(f32::abs))
        .native(
            Signature::uniform(DType::Float32, 2),
            Capability::Simd,
            simd_unary(f32::abs_slice, f32::abs),
        )
        .kernel(Signature::uniform(DType::Int32, 2), unary_kernel(i32::wrapping_abs))
        .kernel(
            Signature::new([DType::Complex128, DType::Float64]),
            unary_kernel(|z: Complex64| z.norm()),
        )
        .generic(|args, out| out[0] = args[0].abs())
        .build(capabilities)
}

macro_rules! arithmetic_table {
    ($(#[$meta:meta])* $name:ident, $op:tt, $int:path, $slices:ident) => {
        $(#[$meta])*
        pub fn $name(capabilities: &Capabilities) -> Result<Dispatcher> {
            Dispatcher::builder(stringify!($name), 2, 1)
                .kernel(
                    Signature::uniform(DType::Float64, 3),
                    binary_kernel(|a: f64, b: f64| a $op b),
                )
                .native(
                    Signature::uniform(DType::Float64, 3),
                    Capability::Simd,
                    simd_binary(f64::$slices, |a, b| a $op b),
                )
                .kernel(
                    Signature::uniform(DType::Float32, 3),
                    binary_kernel(|a: f32, b: f32| a $op b),
                )
                .native(
                    Signature::uniform(DType::Float32, 3),
                    Capability::Simd,
                    simd_binary(f32::$slices, |a, b| a $op b),
                )
                .kernel(Signature::uniform(DType::Int32, 3), binary_kernel($int))
                .kernel(
                    Signature::uniform(DType::Complex128, 3),
                    binary_kernel(|a: Complex64, b: Complex64| a $op b),
                )
                .generic(|args, out| out[0] = args[0] $op args[1])
                .build(capabilities)
        }
    };
}

arithmetic_table!(
    /// Element-wise sum (`nin = 2`, `nout = 1`); integers wrap.
    add, +, i32::wrapping_add, add_slices
);
arithmetic_table!(
    /// Element-wise difference (`nin = 2`, `nout = 1`); integers wrap.
    sub, -, i32::wrapping_sub, sub_slices
);
arithmetic_table!(
    /// Element-wise product (`nin = 2`, `nout = 1`); integers wrap.
    mul, *, i32::wrapping_mul, mul_slices
);

macro_rules! blas_axpy_kernel {
    ($t:ty, $blas:path, $alpha:expr) => {{
        let alpha: $t = $alpha;
        Kernel::new(move |inputs, outputs| {
            let x = inputs[0].typed::<$t>()?;
            let y = inputs[1].typed::<$t>()?;
            let mut z = outputs[0].typed_mut::<$t>()?;
            ensure_same_shape(x.shape(), z.shape())?;
            ensure_same_shape(y.shape(), z.shape())?;
            // BLAS skips x entirely when alpha is zero, losing NaN/inf propagation.
            if alpha != 0.0 {
                if let (Some(a), Some(b), Some(out)) = (
                    x.as_contiguous_slice(),
                    y.as_contiguous_slice(),
                    z.as_contiguous_slice_mut(),
                ) {
                    out.copy_from_slice(b);
                    $blas(a.len(), alpha, a, 1, out, 1)?;
                    return Ok(());
                }
            }
            map::binary(&x, &y, &mut z, |a: $t, b: $t| alpha * a + b)
        })
    }};
}

/// `z = alpha * x + y` (`nin = 2`, `nout = 1`).
///
/// Dense float operands go through [`blas::daxpy`] / [`blas::saxpy`] when
/// [`Capability::Blas`] is available and `alpha != 0`. Every backend computes
/// `alpha * x + y` literally, so `alpha == 0` with a non-finite `x` gives `NaN`.
pub fn axpy(capabilities: &Capabilities, alpha: f64) -> Result<Dispatcher> {
    let alpha32 = alpha as f32;
    Dispatcher::builder("axpy", 2, 1)
        .kernel(
            Signature::uniform(DType::Float64, 3),
            binary_kernel(move |a: f64, b: f64| alpha * a + b),
        )
        .native(
            Signature::uniform(DType::Float64, 3),
            Capability::Blas,
            blas_axpy_kernel!(f64, blas::daxpy, alpha),
        )
        .kernel(
            Signature::uniform(DType::Float32, 3),
            binary_kernel(move |a: f32, b: f32| alpha32 * a + b),
        )
        .native(
            Signature::uniform(DType::Float32, 3),
            Capability::Blas,
            blas_axpy_kernel!(f32, blas::saxpy, alpha32),
        )
        .generic(move |args, out| out[0] = Scalar::Float(alpha) * args[0] + args[1])
        .build(capabilities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Backend, DynView, DynViewMut, StridedLayout};

    #[test]
    fn test_simd_backend_selected_when_available() {
        let caps = Capabilities::probe();
        let table = add(&caps).unwrap();
        let expected = if caps.has(Capability::Simd) {
            Backend::Native(Capability::Simd)
        } else {
            Backend::Portable
        };
        assert_eq!(
            table.backend_for(&Signature::uniform(DType::Float64, 3)),
            Some(expected)
        );
        assert_eq!(
            table.backend_for(&Signature::uniform(DType::Int32, 3)),
            Some(Backend::Portable)
        );
    }

    #[test]
    fn test_strided_operands_use_loop_path() {
        let table = mul(&Capabilities::probe()).unwrap();
        let a = [1.0f64, 2.0, 3.0, 4.0];
        let b = [10.0f64, 20.0];
        let mut c = [0.0f64; 2];
        let x = DynView::new(&a[..], StridedLayout::new(&[2], &[-2], 3).unwrap()).unwrap();
        table
            .call(
                &[x, DynView::from_slice(&b[..])],
                &mut [DynViewMut::from_slice(&mut c[..])],
            )
            .unwrap();
        assert_eq!(c, [40.0, 40.0]);
    }

    #[test]
    fn test_abs_complex_to_float() {
        let table = abs(&Capabilities::portable()).unwrap();
        let z = [Complex64::new(3.0, 4.0), Complex64::new(0.0, -2.0)];
        let mut out = [0.0f64; 2];
        table
            .call(&[DynView::from_slice(&z[..])], &mut [DynViewMut::from_slice(&mut out[..])])
            .unwrap();
        assert_eq!(out, [5.0, 2.0]);
    }

    #[test]
    fn test_generic_table_entry() {
        let table = sub(&Capabilities::portable()).unwrap();
        let a = [Scalar::Int(5), Scalar::Float(0.5)];
        let b = [Scalar::Int(7), Scalar::Int(1)];
        let mut c = [Scalar::default(); 2];
        table
            .call(
                &[DynView::from_slice(&a[..]), DynView::from_slice(&b[..])],
                &mut [DynViewMut::from_slice(&mut c[..])],
            )
            .unwrap();
        assert_eq!(c, [Scalar::Int(-2), Scalar::Float(-0.5)]);
    }

    #[test]
    fn test_axpy_native_and_portable_agree() {
        let x = [1.0f64, 2.0, 3.0, 4.0];
        let y = [0.5f64; 4];
        let mut native_out = [0.0f64; 4];
        let mut portable_out = [0.0f64; 4];
        let caps = Capabilities::probe();
        for (caps, out) in [
            (caps, &mut native_out),
            (caps.without(Capability::Blas), &mut portable_out),
        ] {
            axpy(&caps, 2.0)
                .unwrap()
                .call(
                    &[DynView::from_slice(&x[..]), DynView::from_slice(&y[..])],
                    &mut [DynViewMut::from_slice(&mut out[..])],
                )
                .unwrap();
        }
        assert_eq!(native_out, [2.5, 4.5, 6.5, 8.5]);
        assert_eq!(native_out, portable_out);
    }

    #[test]
    fn test_axpy_zero_alpha_propagates_non_finite_x() {
        let x = [f64::INFINITY, f64::NAN, 1.0];
        let y = [1.0f64, 2.0, 3.0];
        let tables = [
            (Capabilities::portable().with(Capability::Blas), Backend::Native(Capability::Blas)),
            (Capabilities::portable(), Backend::Portable),
        ];
        let mut results = Vec::new();
        for (caps, backend) in tables {
            let table = axpy(&caps, 0.0).unwrap();
            assert_eq!(table.backend_for(&Signature::uniform(DType::Float64, 3)), Some(backend));
            let mut z = [0.0f64; 3];
            table
                .call(
                    &[DynView::from_slice(&x[..]), DynView::from_slice(&y[..])],
                    &mut [DynViewMut::from_slice(&mut z[..])],
                )
                .unwrap();
            results.push(z);
        }

        let generic = axpy(&Capabilities::portable(), 0.0).unwrap();
        let xs = [f32::INFINITY, f32::NAN, 1.0];
        let ys = [1i16, 2, 3];
        let mut zg = [0.0f64; 3];
        assert_eq!(
            generic.resolve(&[DType::Float32, DType::Int16, DType::Float64]).unwrap().backend(),
            Backend::Generic
        );
        generic
            .call(
                &[DynView::from_slice(&xs[..]), DynView::from_slice(&ys[..])],
                &mut [DynViewMut::from_slice(&mut zg[..])],
            )
            .unwrap();
        results.push(zg);

        for z in &results {
            assert!(z[0].is_nan() && z[1].is_nan());
            assert_eq!(z[2], 3.0);
        }
        let bits = |z: &[f64; 3]| z.map(f64::to_bits);
        assert_eq!(bits(&results[0]), bits(&results[1]));
    }

    #[test]
    fn test_axpy_zero_alpha_single_precision_native() {
        let x = [f32::NEG_INFINITY, 2.0];
        let y = [1.0f32, 2.0];
        let mut z = [0.0f32; 2];
        axpy(&Capabilities::portable().with(Capability::Blas), 0.0)
            .unwrap()
            .call(
                &[DynView::from_slice(&x[..]), DynView::from_slice(&y[..])],
                &mut [DynViewMut::from_slice(&mut z[..])],
            )
            .unwrap();
        assert!(z[0].is_nan());
        assert_eq!(z[1], 2.0);
    }
}
