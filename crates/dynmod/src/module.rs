//! Module handle: candidate paths, load state, and the export table.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::{ModuleBackend, OpenFlags, RawModule};
use crate::error::{Error, Result};
use crate::symbols::{SymbolScanner, SymbolTable};

/// What happens to the old code when a module is swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadPolicy {
    /// Unload for real. Addresses resolved before the swap become invalid
    /// the moment the old module closes.
    #[default]
    Cold,
    /// Keep the old code resident across swaps, so calls still executing
    /// through stale addresses survive the grace window.
    Hot,
}

/// One loaded generation of a module.
pub(crate) struct LoadedModule {
    pub(crate) raw: RawModule,
    pub(crate) path: PathBuf,
    pub(crate) table: SymbolTable,
}

/// Candidate paths plus the currently loaded generation, if any.
///
/// Owned by exactly one loader, inside its mutex. Unloaded means
/// `module.is_none()`; the loader keeps its cache empty in that state.
pub(crate) struct ModuleHandle {
    candidates: Vec<PathBuf>,
    policy: ReloadPolicy,
    module: Option<LoadedModule>,
}

impl ModuleHandle {
    pub(crate) fn new(candidates: Vec<PathBuf>, policy: ReloadPolicy) -> Self {
        Self {
            candidates,
            policy,
            module: None,
        }
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.module.is_some()
    }

    pub(crate) fn loaded(&self) -> Option<&LoadedModule> {
        self.module.as_ref()
    }

    /// Current module path, when loaded.
    pub(crate) fn current_path(&self) -> Option<&Path> {
        self.module.as_ref().map(|m| m.path.as_path())
    }

    /// Open the first candidate that works, scanning its export table on
    /// the way in. Later candidates are not tried after a success.
    ///
    /// `initial` is true only for the first load of a process; reloads
    /// resolve with local visibility.
    pub(crate) fn load(
        &mut self,
        backend: &dyn ModuleBackend,
        scanner: &dyn SymbolScanner,
        initial: bool,
    ) -> Result<()> {
        let mut flags = OpenFlags::empty();
        if initial {
            flags |= OpenFlags::GLOBAL;
        }
        if self.policy == ReloadPolicy::Hot {
            flags |= OpenFlags::RESIDENT;
        }

        for path in &self.candidates {
            let table = scanner.scan(path);
            match backend.open(path, flags) {
                Ok(raw) => {
                    info!(
                        "Loaded module {} ({} exported symbols)",
                        path.display(),
                        table.len()
                    );
                    self.module = Some(LoadedModule {
                        raw,
                        path: path.clone(),
                        table,
                    });
                    return Ok(());
                }
                Err(e) => {
                    debug!("Candidate {} rejected: {}", path.display(), e);
                }
            }
        }

        Err(Error::ModuleNotFound {
            first: self.candidates.first().cloned().unwrap_or_default(),
            tried: self.candidates.len(),
        })
    }

    /// Close the current generation. No-op when already unloaded.
    pub(crate) fn unload(&mut self, backend: &dyn ModuleBackend) {
        if let Some(loaded) = self.module.take() {
            debug!("Unloading module {}", loaded.path.display());
            backend.close(loaded.raw);
        }
    }

    /// Export table of the current generation, when loaded.
    pub(crate) fn table(&self) -> Option<&SymbolTable> {
        self.module.as_ref().map(|m| &m.table)
    }
}
