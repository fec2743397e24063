//! Loop-nesting order for cache-friendly traversal.

use std::cmp::Reverse;

/// Order the dimensions from outermost to innermost loop.
///
/// A dimension costs the sum of its stride magnitudes over all operands, and
/// the most expensive dimension becomes the outermost loop. Extents of one
/// cost nothing. The destination operand counts twice: every store dirties a
/// cache line that must later be written back, so when a source and the
/// destination disagree on the fastest dimension the destination's wins and
/// its stores stay contiguous. Equal costs keep logical order, which leaves
/// dense row-major operands in the identity order.
pub(crate) fn loop_order(
    shape: &[usize],
    strides_list: &[&[isize]],
    dest_index: Option<usize>,
) -> Vec<usize> {
    let weights: Vec<usize> = (0..strides_list.len())
        .map(|i| if dest_index == Some(i) { 2 } else { 1 })
        .collect();
    let costs: Vec<usize> = shape
        .iter()
        .enumerate()
        .map(|(dim, &extent)| {
            if extent <= 1 {
                return 0;
            }
            strides_list
                .iter()
                .zip(&weights)
                .fold(0usize, |acc, (strides, &w)| {
                    acc.saturating_add(strides[dim].unsigned_abs().saturating_mul(w))
                })
        })
        .collect();

    let mut order: Vec<usize> = (0..shape.len()).collect();
    // Stable, so ties stay in logical order.
    order.sort_by_key(|&dim| Reverse(costs[dim]));
    order
}
