//! Shared in-memory module backend for integration tests.
//!
//! Scripts a tiny filesystem of path -> export table. Opening a scripted
//! path snapshots its table into a fresh module generation with unique
//! fake addresses, so tests can tell generations apart and count every
//! backend interaction.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use dynmod::{
    Error, ModuleBackend, OpenFlags, RawModule, Result, SymbolAddress, SymbolScanner, SymbolTable,
};

/// Payload stored inside the [`RawModule`]s this backend hands out.
struct OpenModule {
    symbols: HashMap<String, SymbolAddress>,
}

/// In-memory [`ModuleBackend`] and [`SymbolScanner`] with call counters.
pub struct MemoryBackend {
    tables: Mutex<HashMap<PathBuf, Vec<String>>>,
    open_attempts: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
    lookups: AtomicUsize,
    next_addr: AtomicUsize,
    last_flags: Mutex<Option<OpenFlags>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            open_attempts: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
            next_addr: AtomicUsize::new(0x1000),
            last_flags: Mutex::new(None),
        }
    }

    /// Script (or re-script) the export table behind `path`.
    pub fn set_table(&self, path: impl Into<PathBuf>, names: &[&str]) {
        self.tables
            .lock()
            .insert(path.into(), names.iter().map(|n| n.to_string()).collect());
    }

    /// Drop the module behind `path`, making future opens fail.
    pub fn remove(&self, path: impl AsRef<Path>) {
        self.tables.lock().remove(path.as_ref());
    }

    /// Total open calls, failed candidates included.
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    /// Successful opens.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Symbol lookups that reached the backend (cache misses only).
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Flags of the most recent successful open.
    pub fn last_flags(&self) -> Option<OpenFlags> {
        *self.last_flags.lock()
    }
}

impl ModuleBackend for MemoryBackend {
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<RawModule> {
        self.open_attempts.fetch_add(1, Ordering::SeqCst);

        let tables = self.tables.lock();
        let names = tables
            .get(path)
            .ok_or_else(|| Error::backend(format!("{}: no such module", path.display())))?;

        let symbols = names
            .iter()
            .map(|name| {
                let addr = self.next_addr.fetch_add(0x10, Ordering::SeqCst);
                (name.clone(), SymbolAddress::new(addr as *mut c_void))
            })
            .collect();

        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.last_flags.lock() = Some(flags);
        Ok(RawModule::new(OpenModule { symbols }))
    }

    fn lookup(&self, module: &RawModule, name: &str) -> Option<SymbolAddress> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let module = module.payload::<OpenModule>()?;
        module.symbols.get(name).copied()
    }

    fn close(&self, module: RawModule) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        drop(module);
    }
}

impl SymbolScanner for MemoryBackend {
    fn scan(&self, path: &Path) -> SymbolTable {
        let tables = self.tables.lock();
        match tables.get(path) {
            Some(names) => SymbolTable::new(names.clone()),
            None => SymbolTable::default(),
        }
    }
}

/// A backend scripted with one module at `path` exporting `names`.
pub fn backend_with(path: &str, names: &[&str]) -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    backend.set_table(path, names);
    backend
}

/// Initialize logging (use try_init to avoid panic if already set).
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .try_init();
}
