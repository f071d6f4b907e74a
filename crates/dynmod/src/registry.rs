//! Named directory of shared loaders.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::backend::ModuleBackend;
use crate::config::RegistryConfig;
use crate::loader::Loader;
use crate::module::ReloadPolicy;
use crate::symbols::SymbolScanner;

/// Directory of named [`Loader`]s, one per logical library.
///
/// Every caller asking for the same key gets the same loader, so a reload
/// through any of them is visible to all. Entries live as long as the
/// registry; there is no eviction. There is no process-global instance
/// either: construct one at startup and share it by handle.
pub struct LoaderRegistry {
    loaders: Mutex<HashMap<String, Arc<Loader>>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self {
            loaders: Mutex::new(HashMap::new()),
        }
    }

    /// The loader registered under `key`, created on first use.
    ///
    /// `candidates` and `policy` only matter for the call that creates the
    /// entry; later calls get the existing loader unchanged.
    pub fn get_or_create<I, P>(&self, key: &str, candidates: I, policy: ReloadPolicy) -> Arc<Loader>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut loaders = self.loaders.lock();
        if let Some(existing) = loaders.get(key) {
            return Arc::clone(existing);
        }

        info!("Registering loader '{}'", key);
        let loader = Arc::new(Loader::load(candidates, policy));
        loaders.insert(key.to_string(), Arc::clone(&loader));
        loader
    }

    /// [`LoaderRegistry::get_or_create`] with injected module and scanner
    /// implementations.
    pub fn get_or_create_with<I, P>(
        &self,
        key: &str,
        candidates: I,
        policy: ReloadPolicy,
        backend: Arc<dyn ModuleBackend>,
        scanner: Arc<dyn SymbolScanner>,
    ) -> Arc<Loader>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut loaders = self.loaders.lock();
        if let Some(existing) = loaders.get(key) {
            return Arc::clone(existing);
        }

        info!("Registering loader '{}'", key);
        let loader = Arc::new(Loader::load_with(candidates, policy, backend, scanner));
        loaders.insert(key.to_string(), Arc::clone(&loader));
        loader
    }

    /// The loader registered under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Arc<Loader>> {
        self.loaders.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.loaders.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.loaders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.lock().is_empty()
    }

    /// Registered keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.loaders.lock().keys().cloned().collect()
    }

    /// Provision a loader for every module a manifest names. Keys that
    /// already exist keep their current loader.
    pub fn apply_config(&self, config: &RegistryConfig) {
        for spec in &config.modules {
            self.get_or_create(&spec.name, spec.paths.iter().map(PathBuf::from), spec.policy);
        }
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
