//! Address cache for resolved symbols.
//!
//! One cache per loader, living under the loader's mutex together with the
//! module handle, so a lookup-or-populate pass is atomic with respect to
//! unload. The cache itself carries no lock.

use std::collections::HashMap;

use crate::backend::SymbolAddress;

/// Map from resolved lookup name to the address the backend returned.
///
/// A `None` value is a remembered miss: the module genuinely does not
/// export the name, and asking the backend again would not change that
/// until the next reload wipes the cache.
#[derive(Debug, Default)]
pub struct AddressCache {
    entries: HashMap<String, Option<SymbolAddress>>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Cached outcome for `name`. Outer `None` means never looked up;
    /// `Some(None)` means looked up and absent.
    pub fn get(&self, name: &str) -> Option<Option<SymbolAddress>> {
        self.entries.get(name).copied()
    }

    pub fn insert(&mut self, name: String, address: Option<SymbolAddress>) {
        self.entries.insert(name, address);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Drop every entry. Called on unload and before reload.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::c_void;

    fn addr(value: usize) -> SymbolAddress {
        SymbolAddress::new(value as *mut c_void)
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = AddressCache::new();
        assert_eq!(cache.get("init"), None);

        cache.insert("init".into(), Some(addr(0x40)));
        assert_eq!(cache.get("init"), Some(Some(addr(0x40))));
        assert!(cache.contains("init"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_misses_are_remembered() {
        let mut cache = AddressCache::new();
        cache.insert("ghost".into(), None);

        // Present in the cache, with a null outcome.
        assert!(cache.contains("ghost"));
        assert_eq!(cache.get("ghost"), Some(None));
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut cache = AddressCache::new();
        cache.insert("a".into(), Some(addr(1)));
        cache.insert("b".into(), None);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }
}
