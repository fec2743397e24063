//! Runtime element types and dtype-tagged operands.
//!
//! - [`DType`]: the closed set of element types a dispatch table can key on
//! - [`Scalar`]: the boxed `generic` element every dtype converts through
//! - [`Element`]: compile-time link between a Rust type and its [`DType`]
//! - [`DynView`] / [`DynViewMut`]: borrowed buffers tagged with a dtype

use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

use num_complex::{Complex32, Complex64};

use crate::layout::{row_major_strides, StridedLayout};
use crate::view::{StridedView, StridedViewMut};
use crate::{Result, StridedError};

/// Element type of a strided buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    Float64,
    Float32,
    Int8,
    Int16,
    Int32,
    Uint8,
    /// `uint8` with clamped conversion.
    Uint8c,
    Uint16,
    Uint32,
    /// Single-precision complex (two `f32`).
    Complex64,
    /// Double-precision complex (two `f64`).
    Complex128,
    Bool,
    /// Boxed [`Scalar`] elements.
    Generic,
}

impl DType {
    pub const ALL: [DType; 13] = [
        DType::Float64,
        DType::Float32,
        DType::Int8,
        DType::Int16,
        DType::Int32,
        DType::Uint8,
        DType::Uint8c,
        DType::Uint16,
        DType::Uint32,
        DType::Complex64,
        DType::Complex128,
        DType::Bool,
        DType::Generic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DType::Float64 => "float64",
            DType::Float32 => "float32",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Uint8 => "uint8",
            DType::Uint8c => "uint8c",
            DType::Uint16 => "uint16",
            DType::Uint32 => "uint32",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
            DType::Bool => "bool",
            DType::Generic => "generic",
        }
    }

    pub fn is_floating(self) -> bool {
        matches!(self, DType::Float64 | DType::Float32)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, DType::Complex64 | DType::Complex128)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DType::Int8
                | DType::Int16
                | DType::Int32
                | DType::Uint8
                | DType::Uint8c
                | DType::Uint16
                | DType::Uint32
        )
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DType {
    type Err = StridedError;

    fn from_str(s: &str) -> Result<Self> {
        DType::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| StridedError::UnknownDType(s.to_string()))
    }
}

/// Ordered dtypes of a call: inputs first, then outputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(Vec<DType>);

impl Signature {
    pub fn new(dtypes: impl IntoIterator<Item = DType>) -> Self {
        Self(dtypes.into_iter().collect())
    }

    /// A signature with every position set to `dtype`.
    pub fn uniform(dtype: DType, len: usize) -> Self {
        Self(vec![dtype; len])
    }

    /// Parse a comma-separated list such as `"float64, float64"`.
    pub fn parse(s: &str) -> Result<Self> {
        s.split(',')
            .map(|name| name.trim().parse::<DType>())
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    #[inline]
    pub fn dtypes(&self) -> &[DType] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[DType]> for Signature {
    fn from(dtypes: &[DType]) -> Self {
        Self(dtypes.to_vec())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(d.as_str())?;
        }
        Ok(())
    }
}

// ============================================================================
// Scalar
// ============================================================================

/// Boxed element used by `generic` arrays and the fallback kernels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex64),
}

impl Default for Scalar {
    fn default() -> Self {
        Scalar::Int(0)
    }
}

/// Truncate toward zero the way typed-array integer stores do; non-finite is 0.
#[inline]
fn float_to_int(v: f64) -> i64 {
    if v.is_finite() {
        v.trunc() as i64
    } else {
        0
    }
}

/// Clamp and round half to even, as `uint8c` stores do.
fn clamp_u8(v: f64) -> u8 {
    if v.is_nan() || v <= 0.0 {
        return 0;
    }
    if v >= 255.0 {
        return 255;
    }
    let f = v.floor();
    let rounded = if v - f > 0.5 {
        f + 1.0
    } else if v - f < 0.5 {
        f
    } else if f % 2.0 == 0.0 {
        f
    } else {
        f + 1.0
    };
    rounded as u8
}

impl Scalar {
    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Bool(b) => f64::from(u8::from(b)),
            Scalar::Int(i) => i as f64,
            Scalar::Float(v) => v,
            Scalar::Complex(c) => c.re,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Scalar::Bool(b) => i64::from(b),
            Scalar::Int(i) => i,
            Scalar::Float(v) => float_to_int(v),
            Scalar::Complex(c) => float_to_int(c.re),
        }
    }

    pub fn as_complex(self) -> Complex64 {
        match self {
            Scalar::Complex(c) => c,
            other => Complex64::new(other.as_f64(), 0.0),
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            Scalar::Bool(b) => b,
            Scalar::Int(i) => i != 0,
            Scalar::Float(v) => v != 0.0 && !v.is_nan(),
            Scalar::Complex(c) => c.re != 0.0 || c.im != 0.0,
        }
    }

    /// Absolute value; complex magnitudes become `Float`.
    pub fn abs(self) -> Scalar {
        match self {
            Scalar::Bool(b) => Scalar::Int(i64::from(b)),
            Scalar::Int(i) => Scalar::Int(i.wrapping_abs()),
            Scalar::Float(v) => Scalar::Float(v.abs()),
            Scalar::Complex(c) => Scalar::Float(c.norm()),
        }
    }
}

/// Promote a pair to the widest kind present and apply the matching operation.
fn promote(
    a: Scalar,
    b: Scalar,
    int: fn(i64, i64) -> i64,
    float: fn(f64, f64) -> f64,
    complex: fn(Complex64, Complex64) -> Complex64,
) -> Scalar {
    match (a, b) {
        (Scalar::Complex(_), _) | (_, Scalar::Complex(_)) => {
            Scalar::Complex(complex(a.as_complex(), b.as_complex()))
        }
        (Scalar::Float(_), _) | (_, Scalar::Float(_)) => Scalar::Float(float(a.as_f64(), b.as_f64())),
        _ => Scalar::Int(int(a.as_i64(), b.as_i64())),
    }
}

impl Add for Scalar {
    type Output = Scalar;
    fn add(self, rhs: Scalar) -> Scalar {
        promote(self, rhs, i64::wrapping_add, |a, b| a + b, |a, b| a + b)
    }
}

impl Sub for Scalar {
    type Output = Scalar;
    fn sub(self, rhs: Scalar) -> Scalar {
        promote(self, rhs, i64::wrapping_sub, |a, b| a - b, |a, b| a - b)
    }
}

impl Mul for Scalar {
    type Output = Scalar;
    fn mul(self, rhs: Scalar) -> Scalar {
        promote(self, rhs, i64::wrapping_mul, |a, b| a * b, |a, b| a * b)
    }
}

/// `uint8` element with clamped conversion from wider values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct U8Clamped(pub u8);

// ============================================================================
// Type-erased buffers
// ============================================================================

macro_rules! array_data {
    ($($variant:ident($t:ty)),* $(,)?) => {
        /// Borrowed buffer tagged with its dtype.
        #[derive(Debug, Clone, Copy)]
        pub enum ArrayData<'a> {
            $($variant(&'a [$t]),)*
        }

        /// Mutably borrowed buffer tagged with its dtype.
        #[derive(Debug)]
        pub enum ArrayDataMut<'a> {
            $($variant(&'a mut [$t]),)*
        }

        impl ArrayData<'_> {
            pub fn dtype(&self) -> DType {
                match self {
                    $(ArrayData::$variant(_) => DType::$variant,)*
                }
            }

            pub fn len(&self) -> usize {
                match self {
                    $(ArrayData::$variant(d) => d.len(),)*
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }
        }

        impl ArrayDataMut<'_> {
            pub fn dtype(&self) -> DType {
                match self {
                    $(ArrayDataMut::$variant(_) => DType::$variant,)*
                }
            }

            pub fn len(&self) -> usize {
                match self {
                    $(ArrayDataMut::$variant(d) => d.len(),)*
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }
        }

        $(
            impl<'a> From<&'a [$t]> for ArrayData<'a> {
                fn from(data: &'a [$t]) -> Self {
                    ArrayData::$variant(data)
                }
            }

            impl<'a> From<&'a mut [$t]> for ArrayDataMut<'a> {
                fn from(data: &'a mut [$t]) -> Self {
                    ArrayDataMut::$variant(data)
                }
            }
        )*
    };
}

array_data! {
    Float64(f64),
    Float32(f32),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Uint8(u8),
    Uint8c(U8Clamped),
    Uint16(u16),
    Uint32(u32),
    Complex64(Complex32),
    Complex128(Complex64),
    Bool(bool),
    Generic(Scalar),
}

/// A Rust type that can live in a dtype-tagged buffer.
pub trait Element: Copy + Send + Sync + 'static {
    const DTYPE: DType;

    fn to_scalar(self) -> Scalar;

    fn from_scalar(value: Scalar) -> Self;

    fn downcast<'a>(data: &ArrayData<'a>) -> Option<&'a [Self]>;

    fn downcast_mut<'b>(data: &'b mut ArrayDataMut<'_>) -> Option<&'b mut [Self]>;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident, |$v:ident| $to:expr, |$s:ident| $from:expr) => {
        impl Element for $t {
            const DTYPE: DType = DType::$variant;

            #[inline]
            fn to_scalar(self) -> Scalar {
                let $v = self;
                $to
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                let $s = value;
                $from
            }

            fn downcast<'a>(data: &ArrayData<'a>) -> Option<&'a [Self]> {
                match *data {
                    ArrayData::$variant(d) => Some(d),
                    _ => None,
                }
            }

            fn downcast_mut<'b>(data: &'b mut ArrayDataMut<'_>) -> Option<&'b mut [Self]> {
                match data {
                    ArrayDataMut::$variant(d) => Some(&mut **d),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(f64, Float64, |v| Scalar::Float(v), |s| s.as_f64());
impl_element!(f32, Float32, |v| Scalar::Float(f64::from(v)), |s| s.as_f64() as f32);
impl_element!(i8, Int8, |v| Scalar::Int(i64::from(v)), |s| s.as_i64() as i8);
impl_element!(i16, Int16, |v| Scalar::Int(i64::from(v)), |s| s.as_i64() as i16);
impl_element!(i32, Int32, |v| Scalar::Int(i64::from(v)), |s| s.as_i64() as i32);
impl_element!(u8, Uint8, |v| Scalar::Int(i64::from(v)), |s| s.as_i64() as u8);
impl_element!(
    U8Clamped,
    Uint8c,
    |v| Scalar::Int(i64::from(v.0)),
    |s| match s {
        Scalar::Bool(b) => U8Clamped(u8::from(b)),
        Scalar::Int(i) => U8Clamped(i.clamp(0, 255) as u8),
        other => U8Clamped(clamp_u8(other.as_f64())),
    }
);
impl_element!(u16, Uint16, |v| Scalar::Int(i64::from(v)), |s| s.as_i64() as u16);
impl_element!(u32, Uint32, |v| Scalar::Int(i64::from(v)), |s| s.as_i64() as u32);
impl_element!(
    Complex32,
    Complex64,
    |v| Scalar::Complex(Complex64::new(f64::from(v.re), f64::from(v.im))),
    |s| {
        let c = s.as_complex();
        Complex32::new(c.re as f32, c.im as f32)
    }
);
impl_element!(Complex64, Complex128, |v| Scalar::Complex(v), |s| s.as_complex());
impl_element!(bool, Bool, |v| Scalar::Bool(v), |s| s.as_bool());
impl_element!(Scalar, Generic, |v| v, |s| s);

/// Run `$body` with `$t` bound to the Rust element type of `$dtype`.
macro_rules! with_element {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            $crate::DType::Float64 => { type $t = f64; $body }
            $crate::DType::Float32 => { type $t = f32; $body }
            $crate::DType::Int8 => { type $t = i8; $body }
            $crate::DType::Int16 => { type $t = i16; $body }
            $crate::DType::Int32 => { type $t = i32; $body }
            $crate::DType::Uint8 => { type $t = u8; $body }
            $crate::DType::Uint8c => { type $t = $crate::U8Clamped; $body }
            $crate::DType::Uint16 => { type $t = u16; $body }
            $crate::DType::Uint32 => { type $t = u32; $body }
            $crate::DType::Complex64 => { type $t = num_complex::Complex32; $body }
            $crate::DType::Complex128 => { type $t = num_complex::Complex64; $body }
            $crate::DType::Bool => { type $t = bool; $body }
            $crate::DType::Generic => { type $t = $crate::Scalar; $body }
        }
    };
}
pub(crate) use with_element;

// ============================================================================
// Dynamic views
// ============================================================================

/// Dtype-tagged immutable strided operand.
#[derive(Debug, Clone)]
pub struct DynView<'a> {
    data: ArrayData<'a>,
    layout: StridedLayout,
}

impl<'a> DynView<'a> {
    /// Validate `layout` against the buffer length.
    pub fn new(data: impl Into<ArrayData<'a>>, layout: StridedLayout) -> Result<Self> {
        let data = data.into();
        layout.validate(data.len())?;
        Ok(Self { data, layout })
    }

    /// Dense row-major operand.
    pub fn contiguous(data: impl Into<ArrayData<'a>>, shape: &[usize]) -> Result<Self> {
        Self::new(data, StridedLayout::new(shape, &row_major_strides(shape), 0)?)
    }

    /// One-dimensional unit-stride operand over a whole slice.
    pub fn from_slice<T: Element>(data: &'a [T]) -> Self
    where
        &'a [T]: Into<ArrayData<'a>>,
    {
        let layout = StridedLayout::contiguous(&[data.len()], crate::Order::RowMajor);
        Self {
            data: data.into(),
            layout,
        }
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    #[inline]
    pub fn layout(&self) -> &StridedLayout {
        &self.layout
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    pub fn data(&self) -> ArrayData<'a> {
        self.data
    }

    /// Typed view; fails with `DTypeMismatch` if `T` is not the stored dtype.
    pub fn typed<T: Element>(&self) -> Result<StridedView<'a, T>> {
        let data = T::downcast(&self.data).ok_or(StridedError::DTypeMismatch {
            expected: T::DTYPE,
            found: self.dtype(),
        })?;
        Ok(unsafe { StridedView::from_layout_unchecked(data, self.layout.clone()) })
    }
}

/// Dtype-tagged mutable strided operand.
#[derive(Debug)]
pub struct DynViewMut<'a> {
    data: ArrayDataMut<'a>,
    layout: StridedLayout,
}

impl<'a> DynViewMut<'a> {
    pub fn new(data: impl Into<ArrayDataMut<'a>>, layout: StridedLayout) -> Result<Self> {
        let data = data.into();
        layout.validate(data.len())?;
        Ok(Self { data, layout })
    }

    pub fn contiguous(data: impl Into<ArrayDataMut<'a>>, shape: &[usize]) -> Result<Self> {
        Self::new(data, StridedLayout::new(shape, &row_major_strides(shape), 0)?)
    }

    pub fn from_slice<T: Element>(data: &'a mut [T]) -> Self
    where
        &'a mut [T]: Into<ArrayDataMut<'a>>,
    {
        let layout = StridedLayout::contiguous(&[data.len()], crate::Order::RowMajor);
        Self {
            data: data.into(),
            layout,
        }
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    #[inline]
    pub fn layout(&self) -> &StridedLayout {
        &self.layout
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    pub fn typed_mut<T: Element>(&mut self) -> Result<StridedViewMut<'_, T>> {
        let found = self.dtype();
        let layout = self.layout.clone();
        let data = T::downcast_mut(&mut self.data).ok_or(StridedError::DTypeMismatch {
            expected: T::DTYPE,
            found,
        })?;
        Ok(unsafe { StridedViewMut::from_layout_unchecked(data, layout) })
    }
}
