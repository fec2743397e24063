//! Cross-consistency of the fixed-rank, rank-agnostic, automatic and blocked
//! loop nests over random layouts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strided_dispatch::{map, StridedError, StridedView, StridedViewMut, Traversal};

/// Random strides (possibly negative or zero) over a fresh buffer.
fn random_input_layout(rng: &mut StdRng, shape: &[usize]) -> (Vec<isize>, usize, usize) {
    let mut strides = Vec::with_capacity(shape.len());
    let (mut offset, mut hi) = (0usize, 0usize);
    for &dim in shape {
        let stride: isize = rng.gen_range(-7..=7);
        let span = (dim - 1) * stride.unsigned_abs();
        if stride < 0 {
            offset += span;
        } else {
            hi += span;
        }
        strides.push(stride);
    }
    (strides, offset, offset + hi + 1)
}

/// Dense strides over a random dimension order with random signs.
fn random_output_layout(rng: &mut StdRng, shape: &[usize]) -> (Vec<isize>, usize, usize) {
    let mut perm: Vec<usize> = (0..shape.len()).collect();
    for i in (1..perm.len()).rev() {
        perm.swap(i, rng.gen_range(0..=i));
    }
    let mut strides = vec![0isize; shape.len()];
    let mut step = 1usize;
    let mut offset = 0usize;
    for &d in &perm {
        let negative = rng.gen_bool(0.5);
        strides[d] = if negative { -(step as isize) } else { step as isize };
        if negative {
            offset += (shape[d] - 1) * step;
        }
        step *= shape[d];
    }
    (strides, offset, step)
}

fn random_shape(rng: &mut StdRng, rank: usize) -> Vec<usize> {
    (0..rank).map(|_| rng.gen_range(1..=5)).collect()
}

fn multi_indices(shape: &[usize]) -> Vec<Vec<usize>> {
    let mut out = vec![vec![]];
    for &dim in shape {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                (0..dim).map(move |i| {
                    let mut next = prefix.clone();
                    next.push(i);
                    next
                })
            })
            .collect();
    }
    out
}

#[test]
fn fixed_nd_and_auto_agree_on_random_layouts() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for trial in 0..200 {
        let rank = 1 + trial % 4;
        let shape = random_shape(&mut rng, rank);
        let (xs, xo, xlen) = random_input_layout(&mut rng, &shape);
        let (ws, wo, wlen) = random_input_layout(&mut rng, &shape);
        let (ys, yo, ylen) = random_output_layout(&mut rng, &shape);
        let x: Vec<f64> = (0..xlen).map(|_| rng.gen()).collect();
        let w: Vec<f64> = (0..wlen).map(|_| rng.gen()).collect();
        let xv = StridedView::new(&x, &shape, &xs, xo).unwrap();
        let wv = StridedView::new(&w, &shape, &ws, wo).unwrap();

        let mut results = Vec::new();
        for traversal in [
            Traversal::Fixed(rank),
            Traversal::Nd,
            Traversal::Auto,
            Traversal::Blocked,
        ] {
            let mut y = vec![f64::NAN; ylen];
            let mut yv = StridedViewMut::new(&mut y, &shape, &ys, yo).unwrap();
            map::binary_with(traversal, &xv, &wv, &mut yv, |a, b| a * 2.0 - b).unwrap();
            results.push(y);
        }
        assert_eq!(results[0], results[1], "fixed vs nd, shape {shape:?}");
        assert_eq!(results[1], results[2], "nd vs auto, shape {shape:?}");
        assert_eq!(results[1], results[3], "nd vs blocked, shape {shape:?}");

        let yv = StridedView::new(&results[0], &shape, &ys, yo).unwrap();
        for index in multi_indices(&shape) {
            assert_eq!(yv.get(&index), xv.get(&index) * 2.0 - wv.get(&index));
        }
    }
}

#[test]
fn fixed_traversal_visits_row_major() {
    let mut rng = StdRng::seed_from_u64(17);
    for rank in 1..=4 {
        let shape = random_shape(&mut rng, rank);
        let (ys, yo, ylen) = random_output_layout(&mut rng, &shape);
        let mut fixed = vec![0usize; ylen];
        let mut nd = vec![0usize; ylen];
        for (traversal, out) in [(Traversal::Fixed(rank), &mut fixed), (Traversal::Nd, &mut nd)] {
            let mut counter = 0;
            let mut yv = StridedViewMut::new(out, &shape, &ys, yo).unwrap();
            map::nullary_with(traversal, &mut yv, || {
                counter += 1;
                counter
            })
            .unwrap();
        }
        assert_eq!(fixed, nd);

        let yv = StridedView::new(&fixed, &shape, &ys, yo).unwrap();
        for (visit, index) in multi_indices(&shape).iter().enumerate() {
            assert_eq!(yv.get(index), visit + 1);
        }
    }
}

#[test]
fn accessor_index_is_row_major_position() {
    let mut rng = StdRng::seed_from_u64(0xacce55);
    for trial in 0..120 {
        let rank = 1 + trial % 4;
        let shape = random_shape(&mut rng, rank);
        let (xs, xo, xlen) = random_input_layout(&mut rng, &shape);
        let (ys, yo, ylen) = random_output_layout(&mut rng, &shape);
        let x: Vec<f64> = (0..xlen).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let xv = StridedView::new(&x, &shape, &xs, xo).unwrap();

        let mut results = Vec::new();
        for traversal in [
            Traversal::Fixed(rank),
            Traversal::Nd,
            Traversal::Auto,
            Traversal::Blocked,
        ] {
            let mut y = vec![f64::NAN; ylen];
            let mut yv = StridedViewMut::new(&mut y, &shape, &ys, yo).unwrap();
            map::unary_by_with(
                traversal,
                &xv,
                &mut yv,
                |v| v * 0.5,
                |v: f64, n| (n % 3 != 0).then(|| v + n as f64),
            )
            .unwrap();
            results.push(y);
        }
        for (t, y) in results.iter().enumerate().skip(1) {
            let same = y
                .iter()
                .zip(&results[0])
                .all(|(a, b)| a.to_bits() == b.to_bits());
            assert!(same, "traversal {t} disagrees, shape {shape:?} strides {ys:?}");
        }

        let yv = StridedView::new(&results[0], &shape, &ys, yo).unwrap();
        for (n, index) in multi_indices(&shape).iter().enumerate() {
            if n % 3 == 0 {
                assert!(yv.get(index).is_nan());
            } else {
                assert_eq!(yv.get(index), (xv.get(index) + n as f64) * 0.5);
            }
        }
    }
}

#[test]
fn binary_accessor_matches_nd_on_transposed_output() {
    let x: Vec<i64> = (0..24).collect();
    let y: Vec<i64> = (0..24).map(|v| v * 100).collect();
    let shape = [2, 3, 4];
    let xv = StridedView::contiguous(&x, &shape).unwrap();
    let yv = StridedView::new(&y, &shape, &[1, 2, 6], 0).unwrap();
    let mut auto = vec![0i64; 24];
    let mut nd = vec![0i64; 24];
    for (out, traversal) in [(&mut auto, Traversal::Auto), (&mut nd, Traversal::Nd)] {
        let mut zv = StridedViewMut::new(out, &shape, &[1, 2, 6], 0).unwrap();
        map::binary_by_with(traversal, &xv, &yv, &mut zv, |a, b| a + b, |(a, b), n| {
            Some((a - n as i64, b + n as i64))
        })
        .unwrap();
    }
    assert_eq!(auto, nd);

    // x[i] is n itself, so z[i] = y[i] + n
    let zv = StridedView::new(&nd, &shape, &[1, 2, 6], 0).unwrap();
    for (n, index) in multi_indices(&shape).iter().enumerate() {
        assert_eq!(zv.get(index), yv.get(index) + n as i64);
    }
}

#[test]
fn blocked_transpose_larger_than_cache() {
    let (rows, cols) = (300usize, 300usize);
    let mut rng = StdRng::seed_from_u64(99);
    let x: Vec<f64> = (0..rows * cols).map(|_| rng.gen()).collect();
    // read column-major, write row-major
    let xv = StridedView::new(&x, &[rows, cols], &[1, rows as isize], 0).unwrap();
    let mut blocked = vec![0.0f64; rows * cols];
    let mut nd = vec![0.0f64; rows * cols];
    for (out, traversal) in [(&mut blocked, Traversal::Blocked), (&mut nd, Traversal::Nd)] {
        let mut yv = StridedViewMut::contiguous(out, &[rows, cols]).unwrap();
        map::unary_with(traversal, &xv, &mut yv, |v: f64| v).unwrap();
    }
    assert_eq!(blocked, nd);
    for i in 0..rows {
        for j in 0..cols {
            assert_eq!(blocked[i * cols + j], x[j * rows + i]);
        }
    }

    // same with a reversed middle axis and a broadcast input
    let shape = [40, 50, 60];
    let a: Vec<f32> = (0..shape.iter().product::<usize>()).map(|v| v as f32).collect();
    let av = StridedView::new(&a, &shape, &[1, -40, 2000], 49 * 40).unwrap();
    let b = [3.0f32];
    let bv = StridedView::new(&b, &shape, &[0, 0, 0], 0).unwrap();
    let mut blocked = vec![0.0f32; a.len()];
    let mut fixed = vec![0.0f32; a.len()];
    for (out, traversal) in [(&mut blocked, Traversal::Blocked), (&mut fixed, Traversal::Fixed(3))] {
        let mut zv = StridedViewMut::contiguous(out, &shape).unwrap();
        map::binary_with(traversal, &av, &bv, &mut zv, |p: f32, q: f32| p * q).unwrap();
    }
    assert_eq!(blocked, fixed);
}

#[test]
fn zero_extent_is_a_no_op() {
    let x = [1.0f64; 4];
    let mut y = [7.0f64; 4];
    let xv = StridedView::new(&x, &[2, 0, 2], &[2, 1, 1], 0).unwrap();
    let mut yv = StridedViewMut::new(&mut y, &[2, 0, 2], &[2, 1, 1], 0).unwrap();
    for traversal in [Traversal::Fixed(3), Traversal::Nd, Traversal::Auto, Traversal::Blocked] {
        map::unary_with(traversal, &xv, &mut yv, |_: f64| -> f64 { panic!("visited") }).unwrap();
    }
    assert_eq!(y, [7.0; 4]);
}

#[test]
fn masked_unary_skips_flagged_elements() {
    let x = [-2.0f64, 1.0, -3.0, -5.0, 4.0];
    let mask = [0u8, 0, 1, 0, 1];
    let mut y = [0.0f64; 5];
    map::mskunary1d(
        &StridedView::from_slice(&x[..]),
        &StridedView::from_slice(&mask[..]),
        &mut StridedViewMut::from_slice(&mut y[..]),
        |v| v * -1.0,
    )
    .unwrap();
    assert_eq!(y, [2.0, -1.0, 0.0, 5.0, 0.0]);
}

#[test]
fn broadcast_input_through_zero_stride() {
    let row = [1.0f64, 2.0, 3.0];
    let mut y = [0.0f64; 6];
    let xv = StridedView::new(&row, &[2, 3], &[0, 1], 0).unwrap();
    map::unary(&xv, &mut StridedViewMut::contiguous(&mut y, &[2, 3]).unwrap(), |v: f64| v + 1.0)
        .unwrap();
    assert_eq!(y, [2.0, 3.0, 4.0, 2.0, 3.0, 4.0]);
}

#[test]
fn fixed_rank_must_match_shape() {
    let x = [0.0f64; 6];
    let mut y = [0.0f64; 6];
    let xv = StridedView::contiguous(&x, &[2, 3]).unwrap();
    let mut yv = StridedViewMut::contiguous(&mut y, &[2, 3]).unwrap();
    assert!(matches!(
        map::unary3d(&xv, &mut yv, |v: f64| v),
        Err(StridedError::RankMismatch(2, 3))
    ));
    assert!(matches!(
        map::unary_with(Traversal::Fixed(5), &xv, &mut yv, |v: f64| v),
        Err(StridedError::InvalidShape(_))
    ));
}
