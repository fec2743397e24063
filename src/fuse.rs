//! Dimension fusion for strided traversal.
//!
//! Two adjacent loop levels can be collapsed into one when, for every
//! operand, stepping the outer level is the same as running the inner level
//! to completion: `strides[k][i] == shape[i + 1] * strides[k][i + 1]`.
//! Fusing this way never changes the order in which elements are visited.

/// Squeeze singleton dimensions and fuse contiguous neighbours.
///
/// `shape` and every stride list must already be in loop order (outermost
/// first). Returns the reduced shape and matching stride lists; an empty
/// shape means a single element.
pub(crate) fn fuse_dims(shape: &[usize], strides_list: &[Vec<isize>]) -> (Vec<usize>, Vec<Vec<isize>>) {
    let mut fused_shape: Vec<usize> = Vec::with_capacity(shape.len());
    let mut fused_strides: Vec<Vec<isize>> = vec![Vec::with_capacity(shape.len()); strides_list.len()];

    for (i, &extent) in shape.iter().enumerate() {
        if extent == 1 {
            continue;
        }
        let can_merge = match fused_shape.last() {
            Some(_) => fused_strides
                .iter()
                .zip(strides_list.iter())
                .all(|(acc, strides)| acc[acc.len() - 1] == extent as isize * strides[i]),
            None => false,
        };
        if can_merge {
            let last = fused_shape.len() - 1;
            fused_shape[last] *= extent;
            for (acc, strides) in fused_strides.iter_mut().zip(strides_list.iter()) {
                let inner = acc.len() - 1;
                acc[inner] = strides[i];
            }
        } else {
            fused_shape.push(extent);
            for (acc, strides) in fused_strides.iter_mut().zip(strides_list.iter()) {
                acc.push(strides[i]);
            }
        }
    }

    (fused_shape, fused_strides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuse_row_major_contiguous() {
        let (shape, strides) = fuse_dims(&[3, 4], &[vec![4, 1], vec![4, 1]]);
        assert_eq!(shape, vec![12]);
        assert_eq!(strides, vec![vec![1], vec![1]]);
    }

    #[test]
    fn test_fuse_non_contiguous() {
        let (shape, strides) = fuse_dims(&[3, 4], &[vec![10, 1]]);
        assert_eq!(shape, vec![3, 4]);
        assert_eq!(strides, vec![vec![10, 1]]);
    }

    #[test]
    fn test_fuse_partial() {
        // Inner two levels are dense, the outer one has a gap.
        let (shape, strides) = fuse_dims(&[2, 3, 4], &[vec![100, 4, 1]]);
        assert_eq!(shape, vec![2, 12]);
        assert_eq!(strides, vec![vec![100, 1]]);
    }

    #[test]
    fn test_fuse_requires_all_operands() {
        let (shape, _) = fuse_dims(&[3, 4], &[vec![4, 1], vec![1, 3]]);
        assert_eq!(shape, vec![3, 4]);
    }

    #[test]
    fn test_fuse_reversed_strides() {
        let (shape, strides) = fuse_dims(&[2, 3], &[vec![-3, -1]]);
        assert_eq!(shape, vec![6]);
        assert_eq!(strides, vec![vec![-1]]);
    }

    #[test]
    fn test_squeeze_singletons() {
        let (shape, strides) = fuse_dims(&[1, 5, 1], &[vec![99, 2, 77]]);
        assert_eq!(shape, vec![5]);
        assert_eq!(strides, vec![vec![2]]);

        let (shape, strides) = fuse_dims(&[1, 1], &[vec![3, 1]]);
        assert!(shape.is_empty());
        assert_eq!(strides, vec![Vec::<isize>::new()]);
    }
}
