//! Optional native backends and the capability probe.
//!
//! A dispatch table is resolved once against a [`Capabilities`] value. A
//! native kernel whose capability is absent is replaced by its portable
//! counterpart; the absence is logged, never raised.

use std::fmt;

use log::debug;

/// Environment variable that forces [`Capabilities::probe`] to report no
/// native backend (`1` or `true`).
pub const FORCE_PORTABLE_ENV: &str = "STRIDED_DISPATCH_FORCE_PORTABLE";

/// An optimized backend a kernel may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Runtime target-feature dispatch through `pulp` (feature `simd`).
    Simd,
    /// CBLAS linked at build time (feature `blas`).
    Blas,
}

/// Which implementation a resolved signature runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Portable,
    Native(Capability),
    /// Boxed [`Scalar`](crate::Scalar) fallback.
    Generic,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Portable => f.write_str("portable"),
            Backend::Native(Capability::Simd) => f.write_str("native(simd)"),
            Backend::Native(Capability::Blas) => f.write_str("native(blas)"),
            Backend::Generic => f.write_str("generic"),
        }
    }
}

/// Set of native backends available to this process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    simd: bool,
    blas: bool,
}

impl Capabilities {
    /// No native backends.
    pub fn portable() -> Self {
        Self::default()
    }

    /// Detect the backends compiled into this build.
    pub fn probe() -> Self {
        if force_portable() {
            debug!("{FORCE_PORTABLE_ENV} set, using portable kernels only");
            return Self::portable();
        }
        let caps = Self {
            simd: cfg!(feature = "simd"),
            blas: cfg!(feature = "blas"),
        };
        debug!("probed capabilities: simd={} blas={}", caps.simd, caps.blas);
        caps
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Simd => self.simd,
            Capability::Blas => self.blas,
        }
    }

    /// Same set without `capability`.
    pub fn without(mut self, capability: Capability) -> Self {
        match capability {
            Capability::Simd => self.simd = false,
            Capability::Blas => self.blas = false,
        }
        self
    }

    /// Same set plus `capability`, whether or not it was compiled in.
    #[cfg(test)]
    pub(crate) fn with(mut self, capability: Capability) -> Self {
        match capability {
            Capability::Simd => self.simd = true,
            Capability::Blas => self.blas = true,
        }
        self
    }
}

fn force_portable() -> bool {
    match std::env::var(FORCE_PORTABLE_ENV) {
        Ok(value) => {
            let value = value.trim();
            value == "1" || value.eq_ignore_ascii_case("true")
        }
        Err(_) => false,
    }
}
