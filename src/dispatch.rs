//! Signature-keyed kernel tables.
//!
//! A [`Dispatcher`] maps dtype signatures (inputs then outputs) to kernels.
//! Tables are assembled with [`DispatcherBuilder`] and resolved once against
//! a [`Capabilities`] set: every signature is bound to its native kernel when
//! the required capability is present, else to its portable kernel. Lookups
//! at call time try an exact signature first, then the boxed generic
//! fallback, and otherwise fail with
//! [`UnsupportedSignature`](StridedError::UnsupportedSignature).

use std::collections::HashMap;
use std::fmt;

use log::{debug, trace};

use crate::backend::{Backend, Capabilities, Capability};
use crate::dtype::{with_element, DType, DynView, DynViewMut, Element, Scalar, Signature};
use crate::kernel::{ensure_same_shape, Traversal};
use crate::layout::row_major_strides;
use crate::map;
use crate::view::{StridedView, StridedViewMut};
use crate::{Result, StridedError};

type KernelFn = dyn Fn(&[DynView<'_>], &mut [DynViewMut<'_>]) -> Result<()> + Send + Sync;

/// A type-erased kernel over dtype-tagged operands.
pub struct Kernel(Box<KernelFn>);

impl Kernel {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[DynView<'_>], &mut [DynViewMut<'_>]) -> Result<()> + Send + Sync + 'static,
    {
        Self(Box::new(f))
    }

    #[inline]
    pub fn call(&self, inputs: &[DynView<'_>], outputs: &mut [DynViewMut<'_>]) -> Result<()> {
        (self.0)(inputs, outputs)
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Kernel(..)")
    }
}

/// Element operation on boxed scalars: reads `nin` inputs, writes `nout` outputs.
pub type GenericOp = Box<dyn Fn(&[Scalar], &mut [Scalar]) + Send + Sync>;

struct Registration {
    signature: Signature,
    portable: Option<Kernel>,
    native: Option<(Capability, Kernel)>,
}

/// Collects kernels for a [`Dispatcher`].
pub struct DispatcherBuilder {
    name: String,
    nin: usize,
    nout: usize,
    registrations: Vec<Registration>,
    generic: Option<GenericOp>,
    problems: Vec<String>,
}

impl DispatcherBuilder {
    fn slot(&mut self, signature: Signature) -> &mut Registration {
        let pos = match self.registrations.iter().position(|r| r.signature == signature) {
            Some(pos) => pos,
            None => {
                self.registrations.push(Registration {
                    signature,
                    portable: None,
                    native: None,
                });
                self.registrations.len() - 1
            }
        };
        &mut self.registrations[pos]
    }

    /// Register the portable kernel for `signature`.
    pub fn kernel(mut self, signature: Signature, kernel: Kernel) -> Self {
        let slot = self.slot(signature.clone());
        if slot.portable.replace(kernel).is_some() {
            self.problems
                .push(format!("duplicate kernel for signature ({signature})"));
        }
        self
    }

    /// Register a native kernel that is used only when `capability` is available.
    pub fn native(mut self, signature: Signature, capability: Capability, kernel: Kernel) -> Self {
        let slot = self.slot(signature.clone());
        if slot.native.replace((capability, kernel)).is_some() {
            self.problems
                .push(format!("duplicate native kernel for signature ({signature})"));
        }
        self
    }

    /// Register the boxed fallback; it also serves the all-`generic` signature.
    pub fn generic<F>(mut self, op: F) -> Self
    where
        F: Fn(&[Scalar], &mut [Scalar]) + Send + Sync + 'static,
    {
        if self.generic.replace(Box::new(op)).is_some() {
            self.problems.push("duplicate generic fallback".to_string());
        }
        self
    }

    /// Validate the table and bind every signature to one implementation.
    pub fn build(self, capabilities: &Capabilities) -> Result<Dispatcher> {
        let DispatcherBuilder {
            name,
            nin,
            nout,
            registrations,
            generic,
            mut problems,
        } = self;

        let arity = nin + nout;
        if arity == 0 {
            problems.push("a kernel needs at least one array".to_string());
        }
        let generic_signature = Signature::uniform(DType::Generic, arity);
        for reg in &registrations {
            if reg.signature.len() != arity {
                problems.push(format!(
                    "signature ({}) has {} dtypes, expected {arity}",
                    reg.signature,
                    reg.signature.len()
                ));
            }
            if reg.portable.is_none() {
                problems.push(format!(
                    "native kernel for ({}) has no portable fallback",
                    reg.signature
                ));
            }
            if generic.is_some() && reg.signature == generic_signature {
                problems.push(format!(
                    "signature ({}) collides with the generic fallback",
                    reg.signature
                ));
            }
        }
        if let Some(reason) = problems.into_iter().next() {
            return Err(StridedError::InvalidTable { name, reason });
        }

        let mut types = Vec::with_capacity(registrations.len() + 1);
        let mut entries = Vec::with_capacity(registrations.len());
        let mut index = HashMap::with_capacity(registrations.len());
        for reg in registrations {
            let (backend, kernel) = match (reg.native, reg.portable) {
                (Some((cap, native)), _) if capabilities.has(cap) => (Backend::Native(cap), native),
                (native, Some(portable)) => {
                    if let Some((cap, _)) = native {
                        debug!("{name}: {cap:?} backend unavailable for ({}), using portable kernel", reg.signature);
                    }
                    (Backend::Portable, portable)
                }
                (_, None) => continue,
            };
            debug!("{name}: ({}) -> {backend}", reg.signature);
            index.insert(reg.signature.clone(), entries.len());
            types.push(reg.signature);
            entries.push(Entry { backend, kernel });
        }
        if generic.is_some() {
            types.push(generic_signature);
        }

        Ok(Dispatcher {
            name,
            nin,
            nout,
            types,
            entries,
            index,
            generic,
        })
    }
}

struct Entry {
    backend: Backend,
    kernel: Kernel,
}

/// An immutable, resolved kernel table.
///
/// Tables hold no interior state, so one instance can be shared by
/// reference across threads.
pub struct Dispatcher {
    name: String,
    nin: usize,
    nout: usize,
    types: Vec<Signature>,
    entries: Vec<Entry>,
    index: HashMap<Signature, usize>,
    generic: Option<GenericOp>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("nin", &self.nin)
            .field("nout", &self.nout)
            .field("types", &self.types)
            .finish()
    }
}

/// The implementation chosen for one signature.
#[derive(Clone, Copy)]
pub enum Resolved<'d> {
    Kernel(Backend, &'d Kernel),
    Generic(&'d GenericOp),
}

impl fmt::Debug for Resolved<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolved({})", self.backend())
    }
}

impl Resolved<'_> {
    pub fn backend(&self) -> Backend {
        match self {
            Resolved::Kernel(backend, _) => *backend,
            Resolved::Generic(_) => Backend::Generic,
        }
    }

    /// Run the resolved implementation. Operand shapes must already agree.
    pub fn invoke(&self, inputs: &[DynView<'_>], outputs: &mut [DynViewMut<'_>]) -> Result<()> {
        match self {
            Resolved::Kernel(_, kernel) => kernel.call(inputs, outputs),
            Resolved::Generic(op) => run_generic(op, inputs, outputs),
        }
    }
}

impl Dispatcher {
    pub fn builder(name: impl Into<String>, nin: usize, nout: usize) -> DispatcherBuilder {
        DispatcherBuilder {
            name: name.into(),
            nin,
            nout,
            registrations: Vec::new(),
            generic: None,
            problems: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of input arrays.
    #[inline]
    pub fn nin(&self) -> usize {
        self.nin
    }

    /// Number of output arrays.
    #[inline]
    pub fn nout(&self) -> usize {
        self.nout
    }

    /// Supported signatures in registration order, the generic one last.
    #[inline]
    pub fn types(&self) -> &[Signature] {
        &self.types
    }

    #[inline]
    pub fn has_generic(&self) -> bool {
        self.generic.is_some()
    }

    /// Backend an exactly matching signature is bound to.
    pub fn backend_for(&self, signature: &Signature) -> Option<Backend> {
        if let Some(&i) = self.index.get(signature) {
            return Some(self.entries[i].backend);
        }
        if self.generic.is_some()
            && signature.len() == self.nin + self.nout
            && signature.dtypes().iter().all(|&d| d == DType::Generic)
        {
            return Some(Backend::Generic);
        }
        None
    }

    /// Look up `dtypes`: exact match, then the generic fallback.
    pub fn resolve(&self, dtypes: &[DType]) -> Result<Resolved<'_>> {
        if let Some(&i) = self.index.get(&Signature::from(dtypes)) {
            let entry = &self.entries[i];
            trace!("{}: exact match for ({})", self.name, Signature::from(dtypes));
            return Ok(Resolved::Kernel(entry.backend, &entry.kernel));
        }
        match &self.generic {
            Some(op) if dtypes.len() == self.nin + self.nout => {
                trace!("{}: generic fallback for ({})", self.name, Signature::from(dtypes));
                Ok(Resolved::Generic(op))
            }
            _ => Err(StridedError::UnsupportedSignature(Signature::from(dtypes))),
        }
    }

    /// Check arity and shapes, resolve the operand dtypes, and run.
    pub fn call(&self, inputs: &[DynView<'_>], outputs: &mut [DynViewMut<'_>]) -> Result<()> {
        check_arity(inputs.len(), outputs.len(), self.nin, self.nout)?;
        let reference = match (outputs.first(), inputs.first()) {
            (Some(out), _) => out.shape().to_vec(),
            (None, Some(input)) => input.shape().to_vec(),
            (None, None) => return Ok(()),
        };
        for input in inputs {
            ensure_same_shape(input.shape(), &reference)?;
        }
        for output in outputs.iter() {
            ensure_same_shape(output.shape(), &reference)?;
        }
        let dtypes: Vec<DType> = inputs
            .iter()
            .map(DynView::dtype)
            .chain(outputs.iter().map(DynViewMut::dtype))
            .collect();
        self.resolve(&dtypes)?.invoke(inputs, outputs)
    }
}

fn check_arity(found_in: usize, found_out: usize, nin: usize, nout: usize) -> Result<()> {
    if found_in != nin || found_out != nout {
        return Err(StridedError::ArityMismatch {
            expected_in: nin,
            expected_out: nout,
            found_in,
            found_out,
        });
    }
    Ok(())
}

// ============================================================================
// Generic fallback
// ============================================================================

fn scalars_of<T: Element>(view: &StridedView<'_, T>) -> Result<Vec<Scalar>> {
    let mut out = vec![Scalar::default(); view.len()];
    map::unary_with(
        Traversal::Nd,
        view,
        &mut StridedViewMut::contiguous(&mut out, view.shape())?,
        T::to_scalar,
    )?;
    Ok(out)
}

fn store_scalars<T: Element>(view: &mut DynViewMut<'_>, values: &[Scalar]) -> Result<()> {
    let shape = view.shape().to_vec();
    let src = StridedView::new(values, &shape, &row_major_strides(&shape), 0)?;
    map::unary_with(Traversal::Nd, &src, &mut view.typed_mut::<T>()?, T::from_scalar)
}

/// Box every operand, apply `op` element by element, and unbox into the outputs.
///
/// Outputs are boxed too, so an op that leaves a result slot alone keeps the
/// prior value.
fn run_generic(op: &GenericOp, inputs: &[DynView<'_>], outputs: &mut [DynViewMut<'_>]) -> Result<()> {
    let len = match (outputs.first(), inputs.first()) {
        (Some(out), _) => out.layout().len(),
        (None, Some(input)) => input.layout().len(),
        (None, None) => return Ok(()),
    };
    if len == 0 {
        return Ok(());
    }

    let boxed_inputs = inputs
        .iter()
        .map(|view| -> Result<Vec<Scalar>> {
            with_element!(view.dtype(), T => scalars_of(&view.typed::<T>()?))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut boxed_outputs = outputs
        .iter_mut()
        .map(|view| -> Result<Vec<Scalar>> {
            with_element!(view.dtype(), T => scalars_of(&view.typed_mut::<T>()?.as_view()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut args = vec![Scalar::default(); inputs.len()];
    let mut results = vec![Scalar::default(); outputs.len()];
    for i in 0..len {
        for (arg, column) in args.iter_mut().zip(&boxed_inputs) {
            *arg = column[i];
        }
        for (res, column) in results.iter_mut().zip(&boxed_outputs) {
            *res = column[i];
        }
        op(&args, &mut results);
        for (column, res) in boxed_outputs.iter_mut().zip(&results) {
            column[i] = *res;
        }
    }

    for (view, values) in outputs.iter_mut().zip(&boxed_outputs) {
        with_element!(view.dtype(), T => store_scalars::<T>(view, values))?;
    }
    Ok(())
}

// ============================================================================
// Kernel helpers
// ============================================================================

/// Portable kernel writing `f()` into one output of type `U`.
pub fn nullary_kernel<U, F>(f: F) -> Kernel
where
    U: Element,
    F: Fn() -> U + Send + Sync + 'static,
{
    Kernel::new(move |inputs, outputs| {
        check_arity(inputs.len(), outputs.len(), 0, 1)?;
        map::nullary(&mut outputs[0].typed_mut::<U>()?, &f)
    })
}

/// Portable kernel computing `y = f(x)`.
pub fn unary_kernel<T, U, F>(f: F) -> Kernel
where
    T: Element,
    U: Element,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    Kernel::new(move |inputs, outputs| {
        check_arity(inputs.len(), outputs.len(), 1, 1)?;
        let x = inputs[0].typed::<T>()?;
        map::unary(&x, &mut outputs[0].typed_mut::<U>()?, &f)
    })
}

/// Portable kernel computing `z = f(x, y)`.
pub fn binary_kernel<T1, T2, U, F>(f: F) -> Kernel
where
    T1: Element,
    T2: Element,
    U: Element,
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
{
    Kernel::new(move |inputs, outputs| {
        check_arity(inputs.len(), outputs.len(), 2, 1)?;
        let x = inputs[0].typed::<T1>()?;
        let y = inputs[1].typed::<T2>()?;
        map::binary(&x, &y, &mut outputs[0].typed_mut::<U>()?, &f)
    })
}

/// Portable kernel computing `w = f(x, y, z)`.
pub fn ternary_kernel<T1, T2, T3, U, F>(f: F) -> Kernel
where
    T1: Element,
    T2: Element,
    T3: Element,
    U: Element,
    F: Fn(T1, T2, T3) -> U + Send + Sync + 'static,
{
    Kernel::new(move |inputs, outputs| {
        check_arity(inputs.len(), outputs.len(), 3, 1)?;
        let x = inputs[0].typed::<T1>()?;
        let y = inputs[1].typed::<T2>()?;
        let z = inputs[2].typed::<T3>()?;
        map::ternary(&x, &y, &z, &mut outputs[0].typed_mut::<U>()?, &f)
    })
}

/// Portable kernel computing `y = f(x)` where the `uint8` mask (second input) is zero.
pub fn mskunary_kernel<T, U, F>(f: F) -> Kernel
where
    T: Element,
    U: Element,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    Kernel::new(move |inputs, outputs| {
        check_arity(inputs.len(), outputs.len(), 2, 1)?;
        let x = inputs[0].typed::<T>()?;
        let mask = inputs[1].typed::<u8>()?;
        map::mskunary(&x, &mask, &mut outputs[0].typed_mut::<U>()?, &f)
    })
}

/// Portable kernel computing `y = f(x)` through an accessor; see [`map::unary_by_with`].
pub fn unary_by_kernel<T, U, F, C>(f: F, clbk: C) -> Kernel
where
    T: Element,
    U: Element,
    F: Fn(T) -> U + Send + Sync + 'static,
    C: Fn(T, usize) -> Option<T> + Send + Sync + 'static,
{
    Kernel::new(move |inputs, outputs| {
        check_arity(inputs.len(), outputs.len(), 1, 1)?;
        let x = inputs[0].typed::<T>()?;
        map::unary_by(&x, &mut outputs[0].typed_mut::<U>()?, &f, &clbk)
    })
}

/// Portable kernel computing `z = f(x, y)` through an accessor that sees
/// both input values; see [`map::binary_by_with`].
pub fn binary_by_kernel<T1, T2, U, F, C>(f: F, clbk: C) -> Kernel
where
    T1: Element,
    T2: Element,
    U: Element,
    F: Fn(T1, T2) -> U + Send + Sync + 'static,
    C: Fn((T1, T2), usize) -> Option<(T1, T2)> + Send + Sync + 'static,
{
    Kernel::new(move |inputs, outputs| {
        check_arity(inputs.len(), outputs.len(), 2, 1)?;
        let x = inputs[0].typed::<T1>()?;
        let y = inputs[1].typed::<T2>()?;
        map::binary_by(&x, &y, &mut outputs[0].typed_mut::<U>()?, &f, &clbk)
    })
}
