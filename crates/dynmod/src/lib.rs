//! Runtime loader for native shared modules.
//!
//! A [`Loader`] opens a module from a prioritized candidate list, resolves
//! exported symbols to opaque addresses through a per-loader cache, and can
//! swap the module in place while other threads keep resolving through the
//! same loader. Requested names that are not exact exports are matched
//! against the export table by normalized edit-distance similarity.
//!
//! ```no_run
//! use dynmod::prelude::*;
//!
//! let registry = LoaderRegistry::new();
//! let codec = registry.get_or_create(
//!     "codec",
//!     ["/opt/plugins/libcodec.so", "/usr/lib/libcodec.so"],
//!     ReloadPolicy::Hot,
//! );
//!
//! if let Some(addr) = codec.resolve("codec_version") {
//!     let version: unsafe extern "C" fn() -> u32 = unsafe { addr.cast() };
//!     let _ = unsafe { version() };
//! }
//!
//! // Later, after the file on disk was replaced:
//! codec.reload(true);
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod loader;
pub mod module;
pub mod registry;
pub mod similarity;
pub mod symbols;
pub mod watcher;

pub use backend::{DlBackend, ModuleBackend, OpenFlags, RawModule, SymbolAddress};
pub use config::{ModuleSpec, RegistryConfig};
pub use coordinator::CallGuard;
pub use error::{Error, Result};
pub use loader::{Loader, LoaderStatus, ResolveOptions};
pub use module::ReloadPolicy;
pub use registry::LoaderRegistry;
pub use symbols::{ExportScanner, SymbolScanner, SymbolTable};
pub use watcher::ModuleWatcher;

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::backend::{ModuleBackend, OpenFlags, RawModule, SymbolAddress};
    pub use crate::config::{ModuleSpec, RegistryConfig};
    pub use crate::error::{Error, Result};
    pub use crate::loader::{Loader, LoaderStatus, ResolveOptions};
    pub use crate::module::ReloadPolicy;
    pub use crate::registry::LoaderRegistry;
    pub use crate::symbols::{SymbolScanner, SymbolTable};
    pub use crate::watcher::ModuleWatcher;
}
