use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strided_dispatch::{
    binary_kernel, ops, Backend, Capabilities, Capability, DType, Dispatcher, DynView, DynViewMut,
    Scalar, Signature, StridedError, StridedLayout,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn generic_only_add() -> Dispatcher {
    Dispatcher::builder("add_generic", 2, 1)
        .generic(|args, out| out[0] = args[0] + args[1])
        .build(&Capabilities::portable())
        .unwrap()
}

#[test]
fn float64_kernel_matches_generic_fallback_bitwise() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(42);
    let a: Vec<f64> = (0..257).map(|_| rng.gen::<f64>() * 1e3 - 5e2).collect();
    let b: Vec<f64> = (0..257).map(|_| rng.gen::<f64>() * 1e-3).collect();

    let typed = ops::add(&Capabilities::probe()).unwrap();
    let generic = generic_only_add();
    assert_eq!(
        generic.resolve(&[DType::Float64; 3]).unwrap().backend(),
        Backend::Generic
    );

    let mut fast = vec![0.0f64; a.len()];
    let mut slow = vec![0.0f64; a.len()];
    for (table, out) in [(&typed, &mut fast), (&generic, &mut slow)] {
        table
            .call(
                &[DynView::from_slice(&a[..]), DynView::from_slice(&b[..])],
                &mut [DynViewMut::from_slice(&mut out[..])],
            )
            .unwrap();
    }
    for (x, y) in fast.iter().zip(&slow) {
        assert_eq!(x.to_bits(), y.to_bits());
    }
}

#[test]
fn unsupported_signature_without_fallback() {
    let table = Dispatcher::builder("mul_f64", 2, 1)
        .kernel(
            Signature::uniform(DType::Float64, 3),
            binary_kernel(|a: f64, b: f64| a * b),
        )
        .build(&Capabilities::portable())
        .unwrap();
    assert!(!table.has_generic());

    let a = [1i8, 2];
    let b = [3i8, 4];
    let mut c = [0i8; 2];
    let err = table
        .call(
            &[DynView::from_slice(&a[..]), DynView::from_slice(&b[..])],
            &mut [DynViewMut::from_slice(&mut c[..])],
        )
        .unwrap_err();
    match err {
        StridedError::UnsupportedSignature(sig) => {
            assert_eq!(sig, Signature::uniform(DType::Int8, 3));
            assert_eq!(sig.to_string(), "int8, int8, int8");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(c, [0, 0]);
}

#[test]
fn generic_fallback_converts_per_output_dtype() {
    let table = ops::mul(&Capabilities::portable()).unwrap();
    let a = [1.5f32, -2.0, 3.0];
    let b = [2i8, 3, 4];
    let mut out = [0i32; 3];
    table
        .call(
            &[DynView::from_slice(&a[..]), DynView::from_slice(&b[..])],
            &mut [DynViewMut::from_slice(&mut out[..])],
        )
        .unwrap();
    assert_eq!(out, [3, -6, 12]);
}

#[test]
fn strided_operands_resolve_like_dense_ones() {
    let table = ops::sub(&Capabilities::probe()).unwrap();
    let data = [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
    let ones = [1.0f64; 6];
    let mut out = [0.0f64; 6];
    let transposed = DynView::new(&data[..], StridedLayout::new(&[3, 2], &[1, 3], 0).unwrap()).unwrap();
    let broadcast = DynView::new(&ones[..], StridedLayout::new(&[3, 2], &[0, 0], 0).unwrap()).unwrap();
    table
        .call(
            &[transposed, broadcast],
            &mut [DynViewMut::contiguous(&mut out[..], &[3, 2]).unwrap()],
        )
        .unwrap();
    assert_eq!(out, [0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
}

#[test]
fn forced_portable_capabilities_disable_native_entries() {
    let caps = Capabilities::probe()
        .without(Capability::Simd)
        .without(Capability::Blas);
    let table = ops::abs(&caps).unwrap();
    for sig in table.types() {
        let backend = table.backend_for(sig).unwrap();
        assert!(
            matches!(backend, Backend::Portable | Backend::Generic),
            "{sig} -> {backend}"
        );
    }
}

#[test]
fn arity_and_shape_are_checked_before_dispatch() {
    let table = ops::add(&Capabilities::portable()).unwrap();
    let a = [1.0f64; 3];
    let mut c = [0.0f64; 3];
    assert!(matches!(
        table.call(
            &[DynView::from_slice(&a[..])],
            &mut [DynViewMut::from_slice(&mut c[..])],
        ),
        Err(StridedError::ArityMismatch { expected_in: 2, found_in: 1, .. })
    ));

    let short = [1.0f64; 2];
    assert!(matches!(
        table.call(
            &[DynView::from_slice(&a[..]), DynView::from_slice(&short[..])],
            &mut [DynViewMut::from_slice(&mut c[..])],
        ),
        Err(StridedError::ShapeMismatch(..))
    ));
}

#[test]
fn shared_table_across_threads() {
    let table = ops::add(&Capabilities::probe()).unwrap();
    std::thread::scope(|s| {
        for t in 0..4 {
            let table = &table;
            s.spawn(move || {
                let a = vec![t as f64; 16];
                let b = vec![1.0f64; 16];
                let mut c = vec![0.0f64; 16];
                table
                    .call(
                        &[DynView::from_slice(&a[..]), DynView::from_slice(&b[..])],
                        &mut [DynViewMut::from_slice(&mut c[..])],
                    )
                    .unwrap();
                assert!(c.iter().all(|&v| v == t as f64 + 1.0));
            });
        }
    });
}

#[test]
fn scalar_arrays_use_generic_entry() {
    let table = ops::add(&Capabilities::portable()).unwrap();
    let resolved = table.resolve(&[DType::Generic; 3]).unwrap();
    assert_eq!(resolved.backend(), Backend::Generic);

    let a = [Scalar::Int(i64::MAX), Scalar::Bool(true)];
    let b = [Scalar::Int(1), Scalar::Float(0.5)];
    let mut c = [Scalar::default(); 2];
    table
        .call(
            &[DynView::from_slice(&a[..]), DynView::from_slice(&b[..])],
            &mut [DynViewMut::from_slice(&mut c[..])],
        )
        .unwrap();
    assert_eq!(c[0], Scalar::Int(i64::MIN));
    assert_eq!(c[1], Scalar::Float(1.5));
}
