//! The loader: one module, its cache, and its reload protocol.
//!
//! A [`Loader`] keeps its identity across reloads. Callers hold on to it
//! (usually through an `Arc` handed out by the registry) while the module
//! underneath is swapped. One mutex protects the handle and the cache
//! together; lookups wait out a running reload *before* taking that mutex.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{DlBackend, ModuleBackend, SymbolAddress};
use crate::cache::AddressCache;
use crate::coordinator::{CallGuard, InflightCalls, ReloadCoordinator};
use crate::module::{ModuleHandle, ReloadPolicy};
use crate::similarity::{first_acceptable, SIMILARITY_THRESHOLD};
use crate::symbols::{demangle, ExportScanner, SymbolScanner};

/// Grace period a non-blocking reload grants to calls already in flight.
///
/// A soft guarantee only: calls still running when it elapses race the
/// unload. The blocking variant waits on real quiescence instead.
const RELOAD_GRACE: Duration = Duration::from_secs(1);

/// Name handling for one resolution.
///
/// The default compares raw spellings on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveOptions {
    /// Demangle the requested name before matching. Names that do not
    /// demangle are used as given.
    pub demangle_requested: bool,
    /// Compare against demangled export spellings instead of raw ones.
    /// The winning export is still looked up by its raw name.
    pub demangle_exports: bool,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_demangle_requested(mut self, yes: bool) -> Self {
        self.demangle_requested = yes;
        self
    }

    pub fn with_demangle_exports(mut self, yes: bool) -> Self {
        self.demangle_exports = yes;
        self
    }
}

/// Point-in-time view of a loader, for diagnostics and dashboards.
#[derive(Debug, Clone)]
pub struct LoaderStatus {
    pub loaded: bool,
    pub path: Option<PathBuf>,
    /// Exported symbol count of the current generation.
    pub symbols: usize,
    /// Cached resolution count, misses included.
    pub cached: usize,
    /// Completed reload swaps.
    pub reloads: u64,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// State behind the loader mutex. Handle and cache move together so a
/// lookup never observes a cache that outlived its module generation.
struct LoaderCore {
    handle: ModuleHandle,
    cache: AddressCache,
    reloads: u64,
    loaded_at: Option<DateTime<Utc>>,
}

/// A native module with cached symbol resolution and in-place reload.
pub struct Loader {
    core: Mutex<LoaderCore>,
    coordinator: ReloadCoordinator,
    inflight: Arc<InflightCalls>,
    backend: Arc<dyn ModuleBackend>,
    scanner: Arc<dyn SymbolScanner>,
    /// Set once by the first successful load, never cleared. Resolution
    /// answers without blocking while this is false, and reloads no-op.
    ever_loaded: AtomicBool,
}

impl Loader {
    /// Open the first candidate that works, with the native backend.
    ///
    /// A failed load is not fatal: the loader stays usable and empty, and
    /// every resolution returns `None`.
    pub fn load<I, P>(candidates: I, policy: ReloadPolicy) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::load_with(
            candidates,
            policy,
            Arc::new(DlBackend::new()),
            Arc::new(ExportScanner::new()),
        )
    }

    /// [`Loader::load`] with injected module and scanner implementations.
    pub fn load_with<I, P>(
        candidates: I,
        policy: ReloadPolicy,
        backend: Arc<dyn ModuleBackend>,
        scanner: Arc<dyn SymbolScanner>,
    ) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let candidates: Vec<PathBuf> = candidates.into_iter().map(Into::into).collect();
        let mut handle = ModuleHandle::new(candidates, policy);

        let mut loaded_at = None;
        let ever_loaded = match handle.load(backend.as_ref(), scanner.as_ref(), true) {
            Ok(()) => {
                loaded_at = Some(Utc::now());
                true
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        };

        Self {
            core: Mutex::new(LoaderCore {
                handle,
                cache: AddressCache::new(),
                reloads: 0,
                loaded_at,
            }),
            coordinator: ReloadCoordinator::new(),
            inflight: Arc::new(InflightCalls::new()),
            backend,
            scanner,
            ever_loaded: AtomicBool::new(ever_loaded),
        }
    }

    /// Swap the module in place, keeping this loader's identity.
    ///
    /// No-op when nothing was ever loaded or a reload is already running
    /// (a concurrent request is dropped, never queued). With
    /// `wait_for_quiescence` the old module closes only after every
    /// outstanding [`CallGuard`] drops; without it, after [`RELOAD_GRACE`],
    /// a best-effort window that does not guarantee stragglers finished.
    pub fn reload(&self, wait_for_quiescence: bool) {
        if !self.ever_loaded.load(Ordering::Acquire) {
            debug!("Reload skipped: nothing was ever loaded");
            return;
        }
        if !self.coordinator.try_begin() {
            debug!("Reload already in flight, request dropped");
            return;
        }

        // Unload phase. Wake blocked lookups so they observe the
        // reloading state, then let in-flight calls drain.
        self.coordinator.signal_all();
        if wait_for_quiescence {
            self.inflight.wait_quiescent();
        } else {
            std::thread::sleep(RELOAD_GRACE);
        }

        {
            let mut core = self.core.lock();
            core.cache.clear();
            core.handle.unload(self.backend.as_ref());
        }

        // Load phase. The lock is not held across the whole sequence;
        // the reloading flag is what keeps lookups out.
        {
            let mut core = self.core.lock();
            match core
                .handle
                .load(self.backend.as_ref(), self.scanner.as_ref(), false)
            {
                Ok(()) => {
                    core.reloads += 1;
                    core.loaded_at = Some(Utc::now());
                }
                Err(e) => warn!("Reload left the module unloaded: {}", e),
            }
        }

        self.coordinator.finish();
        info!("Reload finished");
    }

    /// Resolve `name` to an address, raw spellings on both sides.
    pub fn resolve(&self, name: &str) -> Option<SymbolAddress> {
        self.resolve_with(name, ResolveOptions::default())
    }

    /// Resolve `name` to an address.
    ///
    /// Answers from the cache when it can. On a miss, the export table is
    /// scanned in extraction order and the first name scoring above the
    /// similarity threshold is looked up; with no acceptable match the
    /// requested name is tried verbatim. The outcome is cached either
    /// way, so a missing symbol costs one backend query per generation.
    ///
    /// Returns `None` when nothing was ever loaded (immediately, without
    /// blocking), when the module is currently unloaded after a failed
    /// reload, or when the symbol is absent.
    pub fn resolve_with(&self, name: &str, opts: ResolveOptions) -> Option<SymbolAddress> {
        if !self.ever_loaded.load(Ordering::Acquire) {
            return None;
        }

        // Wait out any running reload first; the lock is taken after.
        self.coordinator.wait_until_idle();
        let mut core = self.core.lock();

        let lookup_name = if opts.demangle_requested {
            demangle(name).unwrap_or_else(|| name.to_string())
        } else {
            name.to_string()
        };

        if let Some(hit) = core.cache.get(&lookup_name) {
            return hit;
        }

        let table = core.handle.table()?;
        let chosen = if opts.demangle_exports {
            let texts: Vec<String> = table
                .iter()
                .map(|n| demangle(n).unwrap_or_else(|| n.to_string()))
                .collect();
            first_acceptable(
                &lookup_name,
                texts.iter().map(String::as_str),
                SIMILARITY_THRESHOLD,
            )
        } else {
            first_acceptable(&lookup_name, table.iter(), SIMILARITY_THRESHOLD)
        };
        let chosen_name = match chosen {
            Some(idx) => table.names()[idx].clone(),
            None => lookup_name.clone(),
        };

        let loaded = core.handle.loaded()?;
        let address = self.backend.lookup(&loaded.raw, &chosen_name);
        debug!(
            "Resolved '{}' via '{}': {}",
            lookup_name,
            chosen_name,
            if address.is_some() { "found" } else { "absent" }
        );

        core.cache.insert(lookup_name, address);
        address
    }

    /// Resolve `name` and reinterpret the address as `T`.
    ///
    /// Null and unresolved addresses come back as `None`; non-null ones
    /// are cast unconditionally.
    ///
    /// # Safety
    ///
    /// The exported symbol must really have type `T`. A mismatch is
    /// undefined behavior, unguarded at this layer.
    pub unsafe fn symbol_as<T: Copy>(&self, name: &str, opts: ResolveOptions) -> Option<T> {
        let address = self.resolve_with(name, opts)?;
        if address.is_null() {
            return None;
        }
        Some(address.cast::<T>())
    }

    /// Resolve `name`, reinterpret it as `T` and run `f` on it, holding a
    /// call guard so blocking reloads wait for `f` to return.
    ///
    /// The guard is taken after resolution succeeds; a cold module can
    /// still be swapped between resolution and entry, which is the same
    /// window the grace period covers.
    ///
    /// # Safety
    ///
    /// Same contract as [`Loader::symbol_as`]: `T` must match the real
    /// type of the export.
    pub unsafe fn call_with<T: Copy, R>(
        &self,
        name: &str,
        opts: ResolveOptions,
        f: impl FnOnce(T) -> R,
    ) -> Option<R> {
        let address = self.resolve_with(name, opts)?;
        if address.is_null() {
            return None;
        }
        let _guard = self.begin_call();
        Some(f(address.cast::<T>()))
    }

    /// Mark a call in flight. Blocking reloads wait until every
    /// outstanding guard drops before closing the old module.
    pub fn begin_call(&self) -> CallGuard {
        CallGuard::enter(Arc::clone(&self.inflight))
    }

    /// Close the module and drop every cached address. The loader stays
    /// usable; resolution returns `None` until a reload brings a module
    /// back.
    ///
    /// Does not consult the reload coordinator: the clear and close stay
    /// atomic under the loader mutex, but an unload issued while a reload
    /// is running may see that reload's load phase put a module right
    /// back.
    pub fn unload(&self) {
        {
            let mut core = self.core.lock();
            core.cache.clear();
            core.handle.unload(self.backend.as_ref());
        }
        self.coordinator.signal_all();
    }

    /// Whether a module is loaded right now.
    pub fn is_loaded(&self) -> bool {
        self.core.lock().handle.is_loaded()
    }

    /// Whether `name` has a cached outcome. Takes the loader lock.
    pub fn is_cached(&self, name: &str) -> bool {
        self.core.lock().cache.contains(name)
    }

    /// Path of the currently loaded module.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.core.lock().handle.current_path().map(Path::to_path_buf)
    }

    pub fn status(&self) -> LoaderStatus {
        let core = self.core.lock();
        LoaderStatus {
            loaded: core.handle.is_loaded(),
            path: core.handle.current_path().map(Path::to_path_buf),
            symbols: core.handle.table().map_or(0, |t| t.len()),
            cached: core.cache.len(),
            reloads: core.reloads,
            loaded_at: core.loaded_at,
        }
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        let mut core = self.core.lock();
        core.cache.clear();
        core.handle.unload(self.backend.as_ref());
    }
}
