//! Typed strided views over borrowed buffers.
//!
//! - [`StridedView`]: immutable view (inputs, masks)
//! - [`StridedViewMut`]: mutable view (outputs)
//!
//! Constructors validate that every reachable index lies inside the buffer.
//! After that the kernels walk raw pointers without further checks.

use std::marker::PhantomData;

use crate::layout::{is_dense, row_major_strides, StridedLayout};
use crate::Order;
use crate::Result;

/// Immutable strided view.
pub struct StridedView<'a, T> {
    ptr: *const T,
    layout: StridedLayout,
    _data: PhantomData<&'a [T]>,
}

unsafe impl<T: Sync> Send for StridedView<'_, T> {}
unsafe impl<T: Sync> Sync for StridedView<'_, T> {}

impl<T> Clone for StridedView<'_, T> {
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            layout: self.layout.clone(),
            _data: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for StridedView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StridedView")
            .field("shape", &self.layout.shape())
            .field("strides", &self.layout.strides())
            .field("offset", &self.layout.offset())
            .finish()
    }
}

impl<'a, T> StridedView<'a, T> {
    /// Create a view, validating that all indices stay in bounds.
    pub fn new(data: &'a [T], shape: &[usize], strides: &[isize], offset: usize) -> Result<Self> {
        let layout = StridedLayout::new(shape, strides, offset)?;
        Self::from_layout(data, layout)
    }

    /// Create a view from a prebuilt layout.
    pub fn from_layout(data: &'a [T], layout: StridedLayout) -> Result<Self> {
        layout.validate(data.len())?;
        Ok(unsafe { Self::from_layout_unchecked(data, layout) })
    }

    /// Dense row-major view of a whole buffer.
    pub fn contiguous(data: &'a [T], shape: &[usize]) -> Result<Self> {
        Self::new(data, shape, &row_major_strides(shape), 0)
    }

    /// One-dimensional unit-stride view of a slice.
    pub fn from_slice(data: &'a [T]) -> Self {
        let layout = StridedLayout::contiguous(&[data.len()], Order::RowMajor);
        unsafe { Self::from_layout_unchecked(data, layout) }
    }

    /// Create a view without bounds checking.
    ///
    /// # Safety
    /// Every index `offset + Σ i[k] * strides[k]` reachable from the shape
    /// must lie inside `data`.
    pub unsafe fn new_unchecked(
        data: &'a [T],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Self> {
        let layout = StridedLayout::new(shape, strides, offset)?;
        Ok(Self::from_layout_unchecked(data, layout))
    }

    pub(crate) unsafe fn from_layout_unchecked(data: &'a [T], layout: StridedLayout) -> Self {
        Self {
            ptr: data.as_ptr().wrapping_add(layout.offset()),
            layout,
            _data: PhantomData,
        }
    }

    #[inline]
    pub fn layout(&self) -> &StridedLayout {
        &self.layout
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    /// Pointer to the element at the layout offset.
    #[inline]
    pub(crate) fn ptr(&self) -> *const T {
        self.ptr
    }

    /// The elements as one slice, when the layout is dense row-major.
    pub(crate) fn as_contiguous_slice(&self) -> Option<&'a [T]> {
        let len = self.layout.len();
        if len == 0 {
            return Some(&[]);
        }
        if !is_dense(self.shape(), self.strides(), Order::RowMajor) {
            return None;
        }
        Some(unsafe { std::slice::from_raw_parts(self.ptr, len) })
    }
}

impl<T: Copy> StridedView<'_, T> {
    /// Read the element at a logical multi-index.
    pub fn get(&self, index: &[usize]) -> T {
        let pos = self.layout.offset_of(index) - self.layout.offset() as isize;
        unsafe { *self.ptr.offset(pos) }
    }
}

/// Mutable strided view.
pub struct StridedViewMut<'a, T> {
    ptr: *mut T,
    layout: StridedLayout,
    _data: PhantomData<&'a mut [T]>,
}

unsafe impl<T: Send> Send for StridedViewMut<'_, T> {}

impl<T> std::fmt::Debug for StridedViewMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StridedViewMut")
            .field("shape", &self.layout.shape())
            .field("strides", &self.layout.strides())
            .field("offset", &self.layout.offset())
            .finish()
    }
}

impl<'a, T> StridedViewMut<'a, T> {
    /// Create a mutable view, validating that all indices stay in bounds.
    pub fn new(
        data: &'a mut [T],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Self> {
        let layout = StridedLayout::new(shape, strides, offset)?;
        Self::from_layout(data, layout)
    }

    /// Create a mutable view from a prebuilt layout.
    pub fn from_layout(data: &'a mut [T], layout: StridedLayout) -> Result<Self> {
        layout.validate(data.len())?;
        Ok(unsafe { Self::from_layout_unchecked(data, layout) })
    }

    /// Dense row-major view of a whole buffer.
    pub fn contiguous(data: &'a mut [T], shape: &[usize]) -> Result<Self> {
        let strides = row_major_strides(shape);
        Self::new(data, shape, &strides, 0)
    }

    /// One-dimensional unit-stride view of a slice.
    pub fn from_slice(data: &'a mut [T]) -> Self {
        let layout = StridedLayout::contiguous(&[data.len()], Order::RowMajor);
        unsafe { Self::from_layout_unchecked(data, layout) }
    }

    /// Create without bounds checking.
    ///
    /// # Safety
    /// Every index reachable from the shape must lie inside `data`.
    pub unsafe fn new_unchecked(
        data: &'a mut [T],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Self> {
        let layout = StridedLayout::new(shape, strides, offset)?;
        Ok(Self::from_layout_unchecked(data, layout))
    }

    pub(crate) unsafe fn from_layout_unchecked(data: &'a mut [T], layout: StridedLayout) -> Self {
        Self {
            ptr: data.as_mut_ptr().wrapping_add(layout.offset()),
            layout,
            _data: PhantomData,
        }
    }

    #[inline]
    pub fn layout(&self) -> &StridedLayout {
        &self.layout
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr
    }

    /// The elements as one mutable slice, when the layout is dense row-major.
    pub(crate) fn as_contiguous_slice_mut(&mut self) -> Option<&mut [T]> {
        let len = self.layout.len();
        if len == 0 {
            return Some(&mut []);
        }
        if !is_dense(self.shape(), self.strides(), Order::RowMajor) {
            return None;
        }
        Some(unsafe { std::slice::from_raw_parts_mut(self.ptr, len) })
    }

    /// Reborrow as an immutable view.
    pub fn as_view(&self) -> StridedView<'_, T> {
        StridedView {
            ptr: self.ptr as *const T,
            layout: self.layout.clone(),
            _data: PhantomData,
        }
    }
}

impl<T: Copy> StridedViewMut<'_, T> {
    pub fn get(&self, index: &[usize]) -> T {
        let pos = self.layout.offset_of(index) - self.layout.offset() as isize;
        unsafe { *self.ptr.offset(pos) }
    }

    pub fn set(&mut self, index: &[usize], value: T) {
        let pos = self.layout.offset_of(index) - self.layout.offset() as isize;
        unsafe {
            *self.ptr.offset(pos) = value;
        }
    }
}
