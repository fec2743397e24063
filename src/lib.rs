//! Strided N-dimensional element-wise kernels with dtype signature dispatch.
//!
//! Arrays are addressed through a shape, a signed stride per dimension and a
//! starting offset into a borrowed flat buffer. On top of that description
//! the crate provides:
//!
//! # Traversal
//!
//! - [`StridedLayout`], [`StridedView`], [`StridedViewMut`]: validated descriptors over caller buffers
//! - [`Traversal`]: rank-specialized loop nests (1 to 4), a rank-agnostic
//!   recursion, an automatic choice that reorders and fuses loops, or the
//!   same with cache-sized tiles
//! - [`map`]: `nullary` .. `quinary`, masked and accessor (`*_by`) variants,
//!   each with `1d`..`4d`, `nd` and auto entry points
//! - [`nested`]: the same callbacks over `Vec`-nested arrays
//!
//! # Dispatch
//!
//! - [`DType`], [`Scalar`], [`DynView`], [`DynViewMut`]: dtype-tagged operands
//! - [`Dispatcher`]: signature table resolved once against the probed
//!   [`Capabilities`], with a boxed generic fallback
//! - [`ops`]: ready-made `abs`, `add`, `sub`, `mul`, `axpy` dispatchers
//!
//! # Vector kernels
//!
//! - [`blas`]: `axpy`, `rot`, `rotm`, `spmv` over 1-D strided buffers
//! - [`ext`]: reversal, compensated cumulative sums, cumulative extrema
//!
//! # Example
//!
//! ```rust
//! use strided_dispatch::{map, StridedView, StridedViewMut};
//!
//! let x = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let mut y = vec![0.0; 6];
//!
//! // Read `x` transposed (column-major) and write `y` row-major.
//! let xv = StridedView::new(&x, &[2, 3], &[1, 2], 0).unwrap();
//! let mut yv = StridedViewMut::contiguous(&mut y, &[2, 3]).unwrap();
//! map::unary2d(&xv, &mut yv, |v: f64| v * 10.0).unwrap();
//!
//! assert_eq!(y, vec![10.0, 30.0, 50.0, 20.0, 40.0, 60.0]);
//! ```
//!
//! # Dispatch example
//!
//! ```rust
//! use strided_dispatch::{ops, Capabilities, DynView, DynViewMut};
//!
//! let add = ops::add(&Capabilities::probe()).unwrap();
//! let a = [1.0f64, 2.0, 3.0];
//! let b = [10.0f64, 20.0, 30.0];
//! let mut c = [0.0f64; 3];
//!
//! add.call(
//!     &[DynView::from_slice(&a[..]), DynView::from_slice(&b[..])],
//!     &mut [DynViewMut::from_slice(&mut c[..])],
//! )
//! .unwrap();
//! assert_eq!(c, [11.0, 22.0, 33.0]);
//! ```

mod backend;
pub mod blas;
mod block;
mod dispatch;
mod dtype;
pub mod ext;
mod fuse;
mod kernel;
mod layout;
pub mod map;
pub mod nested;
pub mod ops;
mod order;
mod simd;
mod view;

// ============================================================================
// Layout and views
// ============================================================================
pub use layout::{col_major_strides, row_major_strides, stride_offset, strides_to_order, Order, StridedLayout};
pub use view::{StridedView, StridedViewMut};

// ============================================================================
// Traversal
// ============================================================================
pub use kernel::{Traversal, MAX_FIXED_RANK};

// ============================================================================
// Dispatch
// ============================================================================
pub use backend::{Backend, Capabilities, Capability, FORCE_PORTABLE_ENV};
pub use dispatch::{
    binary_by_kernel, binary_kernel, mskunary_kernel, nullary_kernel, ternary_kernel,
    unary_by_kernel, unary_kernel, Dispatcher, DispatcherBuilder, GenericOp, Kernel, Resolved,
};
pub use dtype::{ArrayData, ArrayDataMut, DType, DynView, DynViewMut, Element, Scalar, Signature, U8Clamped};

// ============================================================================
// Error types
// ============================================================================

/// Errors raised at the call boundary, before any loop runs.
#[derive(Debug, thiserror::Error)]
pub enum StridedError {
    /// Shape and strides of different lengths, negative extents, or an
    /// unsupported fixed rank.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// No kernel for the dtype signature and no generic fallback.
    #[error("unsupported signature: {0}")]
    UnsupportedSignature(Signature),

    /// A reachable buffer index lies outside the buffer.
    #[error("index {index} out of bounds for buffer of length {len}")]
    OutOfBounds { index: isize, len: usize },

    /// Integer overflow while computing a buffer index.
    #[error("offset overflow while computing buffer index")]
    OffsetOverflow,

    /// Array ranks do not match.
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),

    /// Array shapes do not match.
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// Wrong number of input or output arrays.
    #[error("expected {expected_in} inputs and {expected_out} outputs, got {found_in} and {found_out}")]
    ArityMismatch {
        expected_in: usize,
        expected_out: usize,
        found_in: usize,
        found_out: usize,
    },

    /// A dtype-tagged buffer was accessed as another element type.
    #[error("dtype mismatch: expected {expected}, found {found}")]
    DTypeMismatch { expected: DType, found: DType },

    /// A vector kernel was given a zero stride where one is not allowed.
    #[error("invalid stride 0 for {0}")]
    ZeroStride(&'static str),

    /// Malformed dispatch table.
    #[error("invalid dispatch table `{name}`: {reason}")]
    InvalidTable { name: String, reason: String },

    /// Unrecognized dtype name.
    #[error("unknown dtype `{0}`")]
    UnknownDType(String),
}

/// Result type for strided operations.
pub type Result<T> = std::result::Result<T, StridedError>;
