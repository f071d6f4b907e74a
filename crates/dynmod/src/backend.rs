//! Platform seam for native module primitives.
//!
//! Everything OS-specific lives behind [`ModuleBackend`]: opening a shared
//! module, looking up an exported symbol's address, and closing the handle.
//! [`DlBackend`] is the libloading-based implementation, one body per
//! platform. Tests substitute an in-memory backend through the same trait.

use std::any::Any;
use std::ffi::c_void;
use std::path::Path;

use crate::error::{Error, Result};

/// Opaque address of a resolved symbol.
///
/// Carries no type information. Callers that invoke through it assert the
/// target's real signature via [`SymbolAddress::cast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolAddress(*mut c_void);

// Addresses are plain integers to this crate; they are only dereferenced
// through the caller-audited `cast` seam.
unsafe impl Send for SymbolAddress {}
unsafe impl Sync for SymbolAddress {}

impl SymbolAddress {
    /// Wrap a raw pointer. Backend implementations use this to report
    /// resolved exports.
    pub fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    /// Whether the resolved address is null.
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// The raw pointer value.
    pub fn as_ptr(&self) -> *mut c_void {
        self.0
    }

    /// Reinterpret the address as `T`, typically a function pointer type.
    ///
    /// This is the single point where an untyped address becomes callable.
    ///
    /// # Safety
    ///
    /// The caller must guarantee the exported symbol really has type `T`
    /// and that the address is non-null. A mismatched signature is
    /// undefined behavior at the call site, not here.
    pub unsafe fn cast<T: Copy>(&self) -> T {
        debug_assert_eq!(
            std::mem::size_of::<T>(),
            std::mem::size_of::<*mut c_void>()
        );
        std::mem::transmute_copy(&self.0)
    }
}

bitflags::bitflags! {
    /// Options applied when opening a native module.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        /// Keep the module's code resident after close, so calls already
        /// in flight through stale addresses survive a swap (unix
        /// `RTLD_NODELETE`; no Windows equivalent, accepted and ignored).
        const RESIDENT = 1 << 0;
        /// Make the module's exports visible to later loads (unix
        /// `RTLD_GLOBAL`; default is `RTLD_LOCAL`). Used for the first
        /// load of a process, not for reloads.
        const GLOBAL = 1 << 1;
    }
}

/// Owned handle to an open native module.
///
/// The payload belongs to the backend that produced it; handles must only
/// be given back to that backend. Dropping the handle releases the module
/// the same way [`ModuleBackend::close`] does.
pub struct RawModule {
    payload: Box<dyn Any + Send + Sync>,
}

impl RawModule {
    /// Wrap a backend-specific payload.
    pub fn new(payload: impl Any + Send + Sync) -> Self {
        Self {
            payload: Box::new(payload),
        }
    }

    /// Borrow the payload as the backend's concrete type.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for RawModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawModule").finish_non_exhaustive()
    }
}

/// Native module primitives, one implementation per platform.
pub trait ModuleBackend: Send + Sync {
    /// Open the module at `path`. Returns an owned handle on success.
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<RawModule>;

    /// Address of `name` in `module`, or `None` when the export is absent.
    fn lookup(&self, module: &RawModule, name: &str) -> Option<SymbolAddress>;

    /// Close the handle. Whether code is actually unmapped depends on the
    /// flags it was opened with.
    fn close(&self, module: RawModule);
}

/// The libloading-backed [`ModuleBackend`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DlBackend;

impl DlBackend {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl ModuleBackend for DlBackend {
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<RawModule> {
        use libloading::os::unix;

        let mut raw = unix::RTLD_NOW;
        raw |= if flags.contains(OpenFlags::GLOBAL) {
            unix::RTLD_GLOBAL
        } else {
            unix::RTLD_LOCAL
        };
        if flags.contains(OpenFlags::RESIDENT) {
            raw |= libc::RTLD_NODELETE;
        }

        let lib = unsafe {
            unix::Library::open(Some(path), raw)
                .map_err(|e| Error::backend(format!("{}: {}", path.display(), e)))?
        };
        Ok(RawModule::new(lib))
    }

    fn lookup(&self, module: &RawModule, name: &str) -> Option<SymbolAddress> {
        let lib = module.payload::<libloading::os::unix::Library>()?;
        let sym = unsafe { lib.get::<*mut c_void>(name.as_bytes()).ok()? };
        Some(SymbolAddress::new(*sym))
    }

    fn close(&self, module: RawModule) {
        drop(module);
    }
}

#[cfg(windows)]
impl ModuleBackend for DlBackend {
    fn open(&self, path: &Path, _flags: OpenFlags) -> Result<RawModule> {
        use libloading::os::windows;

        let lib = unsafe {
            windows::Library::new(path)
                .map_err(|e| Error::backend(format!("{}: {}", path.display(), e)))?
        };
        Ok(RawModule::new(lib))
    }

    fn lookup(&self, module: &RawModule, name: &str) -> Option<SymbolAddress> {
        let lib = module.payload::<libloading::os::windows::Library>()?;
        let sym = unsafe { lib.get::<*mut c_void>(name.as_bytes()).ok()? };
        Some(SymbolAddress::new(*sym))
    }

    fn close(&self, module: RawModule) {
        drop(module);
    }
}
