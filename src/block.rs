//! Cache-blocking for [`Traversal::Blocked`](crate::Traversal::Blocked).
//!
//! Tile extents are chosen so that the bytes touched by one tile, summed over
//! all operands, fit in [`BLOCK_BYTES`]. Dimensions are in loop order
//! (outermost first) with strides in elements.

/// Working-set budget of one tile (an L1 data cache).
pub(crate) const BLOCK_BYTES: usize = 32 * 1024;

/// Bytes per cache line.
pub(crate) const CACHE_LINE: usize = 64;

/// Tile extent per dimension, same order as `shape`.
///
/// Returns `shape` unchanged when the whole iteration space already fits.
pub(crate) fn block_sizes(
    shape: &[usize],
    strides_list: &[&[isize]],
    elem_size: usize,
    budget: usize,
) -> Vec<usize> {
    let elem = elem_size.max(1) as isize;
    let byte_strides: Vec<Vec<isize>> = strides_list
        .iter()
        .map(|s| s.iter().map(|&v| v.saturating_mul(elem)).collect())
        .collect();
    let refs: Vec<&[isize]> = byte_strides.iter().map(Vec::as_slice).collect();
    let costs = dim_costs(strides_list, shape.len());
    shrink(shape, &costs, &refs, budget)
}

/// Smallest stride magnitude per dimension across operands; `0 -> 1`, else `2|s|`.
fn dim_costs(strides_list: &[&[isize]], rank: usize) -> Vec<usize> {
    (0..rank)
        .map(|d| {
            let min = strides_list
                .iter()
                .map(|s| s[d].unsigned_abs())
                .min()
                .unwrap_or(0);
            if min == 0 {
                1
            } else {
                min.saturating_mul(2)
            }
        })
        .collect()
}

fn shrink(shape: &[usize], costs: &[usize], byte_strides: &[&[isize]], budget: usize) -> Vec<usize> {
    let rank = shape.len();
    if rank == 0 || footprint(shape, byte_strides) <= budget {
        return shape.to_vec();
    }

    // An innermost dimension that is the tightest for every operand stays whole.
    let last = rank - 1;
    let innermost_tightest = byte_strides.iter().all(|s| {
        let inner = s[last].unsigned_abs();
        inner != 0 && s.iter().all(|&v| v == 0 || v.unsigned_abs() >= inner)
    });
    if innermost_tightest && rank > 1 {
        let outer: Vec<&[isize]> = byte_strides.iter().map(|s| &s[..last]).collect();
        let mut blocks = shrink(&shape[..last], &costs[..last], &outer, budget);
        blocks.push(shape[last]);
        return blocks;
    }

    let min_stride = byte_strides
        .iter()
        .flat_map(|s| s.iter().map(|v| v.unsigned_abs()))
        .min()
        .unwrap_or(0);
    if min_stride > budget {
        return vec![1; rank];
    }

    let mut blocks = shape.to_vec();
    while footprint(&blocks, byte_strides) >= 2 * budget {
        match heaviest(&blocks, costs) {
            Some(d) => blocks[d] = blocks[d].div_ceil(2),
            None => break,
        }
    }
    while footprint(&blocks, byte_strides) > budget {
        match heaviest(&blocks, costs) {
            Some(d) => blocks[d] -= 1,
            None => break,
        }
    }
    blocks
}

/// Bytes touched by a tile of extents `dims`, counted in whole cache lines.
///
/// Strides below a cache line extend one contiguous run; larger strides
/// multiply the number of runs.
fn footprint(dims: &[usize], byte_strides: &[&[isize]]) -> usize {
    let mut total = 0usize;
    for strides in byte_strides {
        let mut contiguous = 0usize;
        let mut runs = 1usize;
        for (&d, &s) in dims.iter().zip(strides.iter()) {
            let s = s.unsigned_abs();
            if s < CACHE_LINE {
                contiguous = contiguous.saturating_add(d.saturating_sub(1) * s);
            } else {
                runs = runs.saturating_mul(d);
            }
        }
        let lines = contiguous / CACHE_LINE + 1;
        total = total.saturating_add(CACHE_LINE.saturating_mul(lines).saturating_mul(runs));
    }
    total
}

/// Outermost dimension with the largest `(extent - 1) * cost` that can still shrink.
fn heaviest(blocks: &[usize], costs: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (d, (&b, &c)) in blocks.iter().zip(costs).enumerate() {
        if b <= 1 {
            continue;
        }
        let score = (b - 1).saturating_mul(c);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((d, score));
        }
    }
    best.map(|(d, _)| d)
}
