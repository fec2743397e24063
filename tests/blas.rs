use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strided_dispatch::blas::{self, Uplo};
use strided_dispatch::{Order, StridedError};

#[test]
fn axpy_alpha_zero_leaves_y() {
    let x = [1.0, 2.0, 3.0];
    let mut y = [4.0, 5.0, 6.0];
    let out = blas::daxpy(3, 0.0, &x, 1, &mut y, 1).unwrap();
    assert_eq!(out, &[4.0, 5.0, 6.0]);
}

#[test]
fn axpy_unit_and_strided_paths_agree() {
    let mut rng = StdRng::seed_from_u64(3);
    for n in [1usize, 3, 4, 5, 63, 64, 65, 200] {
        let alpha: f64 = rng.gen::<f64>() - 0.5;
        let x: Vec<f64> = (0..n).map(|_| rng.gen()).collect();
        let y0: Vec<f64> = (0..n).map(|_| rng.gen()).collect();

        let mut unit = y0.clone();
        blas::daxpy(n, alpha, &x, 1, &mut unit, 1).unwrap();

        // Same logical vectors, interleaved with padding and walked backwards.
        let mut xs = vec![f64::NAN; 2 * n];
        let mut ys = vec![f64::NAN; 3 * n];
        for i in 0..n {
            xs[2 * (n - 1 - i)] = x[i];
            ys[3 * i] = y0[i];
        }
        blas::daxpy(n, alpha, &xs, -2, &mut ys, 3).unwrap();

        for i in 0..n {
            assert_relative_eq!(unit[i], ys[3 * i], epsilon = 1e-14);
            assert_relative_eq!(unit[i], y0[i] + alpha * x[i], epsilon = 1e-12);
        }
    }
}

#[test]
fn axpy_with_offsets_targets_subrange() {
    let x = [0.0f32, 1.0, 2.0, 3.0];
    let mut y = [10.0f32; 6];
    blas::saxpy_with_offsets(2, 2.0, &x, 2, 1, &mut y, 1, 3).unwrap();
    assert_eq!(y, [10.0, 10.0, 10.0, 12.0, 16.0, 10.0]);
}

#[test]
fn rot_preserves_norm() {
    let theta = 0.3f64;
    let (c, s) = (theta.cos(), theta.sin());
    let mut x = [1.0, -2.0, 0.5];
    let mut y = [3.0, 0.25, -1.0];
    let before: Vec<f64> = x.iter().zip(&y).map(|(a, b)| a * a + b * b).collect();
    blas::drot(3, &mut x, 1, &mut y, 1, c, s).unwrap();
    for i in 0..3 {
        assert_relative_eq!(x[i] * x[i] + y[i] * y[i], before[i], epsilon = 1e-12);
    }
}

#[test]
fn drotm_identity_flag() {
    let mut x = [1.0, 2.0, 3.0];
    let mut y = [4.0, 5.0, 6.0];
    blas::drotm(3, &mut x, 1, &mut y, 1, &[-2.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(x, [1.0, 2.0, 3.0]);
    assert_eq!(y, [4.0, 5.0, 6.0]);
}

#[test]
fn dspmv_row_major_upper_equals_column_major_lower() {
    let mut rng = StdRng::seed_from_u64(11);
    let n = 6;
    let ap: Vec<f64> = (0..n * (n + 1) / 2).map(|_| rng.gen()).collect();
    let x: Vec<f64> = (0..n).map(|_| rng.gen()).collect();
    let y0: Vec<f64> = (0..n).map(|_| rng.gen()).collect();

    let mut a = y0.clone();
    let mut b = y0.clone();
    blas::dspmv(Order::RowMajor, Uplo::Upper, n, 1.5, &ap, &x, 1, 0.5, &mut a, 1).unwrap();
    blas::dspmv(Order::ColumnMajor, Uplo::Lower, n, 1.5, &ap, &x, 1, 0.5, &mut b, 1).unwrap();
    assert_eq!(a, b);

    let mut c = y0.clone();
    let mut d = y0;
    blas::dspmv(Order::RowMajor, Uplo::Lower, n, 1.5, &ap, &x, 1, 0.5, &mut c, 1).unwrap();
    blas::dspmv(Order::ColumnMajor, Uplo::Upper, n, 1.5, &ap, &x, 1, 0.5, &mut d, 1).unwrap();
    assert_eq!(c, d);
}

#[test]
fn dspmv_matches_dense_product() {
    // A = [[1, 2, 3], [2, 4, 5], [3, 5, 6]], row-major upper packing.
    let ap = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let x = [1.0, 1.0, 1.0];
    let mut y = [0.0; 3];
    blas::dspmv(Order::RowMajor, Uplo::Upper, 3, 1.0, &ap, &x, 1, 0.0, &mut y, 1).unwrap();
    assert_eq!(y, [6.0, 11.0, 14.0]);

    let x = [3.0, 2.0, 1.0];
    let mut y = [0.0; 3];
    blas::dspmv(Order::RowMajor, Uplo::Upper, 3, 1.0, &ap, &x, -1, 0.0, &mut y, 1).unwrap();
    assert_eq!(y, [14.0, 25.0, 31.0]);
}

#[test]
fn dspmv_with_offsets_reads_strided_packing() {
    let packed = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let mut ap = vec![0.0; 13];
    for (k, &v) in packed.iter().enumerate() {
        ap[1 + 2 * k] = v;
    }
    let x = [9.0, 1.0, 2.0, 3.0];
    let mut y = [0.0, 0.0, 0.0, 0.0, -1.0];
    blas::spmv_with_offsets(
        Order::ColumnMajor,
        Uplo::Lower,
        3,
        1.0,
        &ap,
        2,
        1,
        &x,
        1,
        1,
        0.0,
        &mut y,
        2,
        0,
    )
    .unwrap();
    assert_eq!(y, [14.0, 0.0, 25.0, 0.0, 31.0]);
}

#[test]
fn extent_errors_leave_buffers_untouched() {
    let ap = [1.0; 5];
    let x = [1.0; 3];
    let mut y = [0.0; 3];
    let err = blas::dspmv(Order::RowMajor, Uplo::Upper, 3, 1.0, &ap, &x, 1, 0.0, &mut y, 1)
        .unwrap_err();
    assert!(matches!(err, StridedError::OutOfBounds { index: 5, len: 5 }));
    assert_eq!(y, [0.0; 3]);
}

#[test]
fn huge_negative_stride_reports_overflow() {
    let x = [1.0; 4];
    let mut y = [0.0; 4];
    let err = blas::daxpy(usize::MAX, 2.0, &x, -2, &mut y, 1).unwrap_err();
    assert!(matches!(err, StridedError::OffsetOverflow));

    let err = blas::rot(usize::MAX / 2, &mut [0.0f32; 4], isize::MIN, &mut [0.0f32; 4], 1, 1.0, 0.0)
        .unwrap_err();
    assert!(matches!(err, StridedError::OffsetOverflow));

    let err = strided_dispatch::ext::rev(usize::MAX, &mut [1u8; 4], -3).unwrap_err();
    assert!(matches!(err, StridedError::OffsetOverflow));
    assert_eq!(y, [0.0; 4]);
}
