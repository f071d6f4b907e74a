//! Export tables and symbol name handling.
//!
//! A [`SymbolTable`] is the ordered list of names a module exports, captured
//! once per load. The fuzzy matcher walks it in this order, so extraction
//! order is part of resolution behavior.

use std::path::Path;

use object::Object;
use tracing::warn;

/// Ordered exported symbol names of one loaded module generation.
///
/// Rebuilt from scratch on every load; never merged across reloads.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    names: Vec<String>,
}

impl SymbolTable {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Exported names in extraction order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether `name` is exported verbatim.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Extracts the exported names of a binary on disk.
///
/// Failures are not errors: a table that cannot be read degrades to an
/// empty one, and resolution falls back to verbatim lookups.
pub trait SymbolScanner: Send + Sync {
    fn scan(&self, path: &Path) -> SymbolTable;
}

/// [`SymbolScanner`] reading dynamic export tables with the `object` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExportScanner;

impl ExportScanner {
    pub fn new() -> Self {
        Self
    }
}

impl SymbolScanner for ExportScanner {
    fn scan(&self, path: &Path) -> SymbolTable {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                warn!("Cannot read {} for export scan: {}", path.display(), e);
                return SymbolTable::default();
            }
        };

        let file = match object::File::parse(&*data) {
            Ok(file) => file,
            Err(e) => {
                warn!("Cannot parse {} as an object file: {}", path.display(), e);
                return SymbolTable::default();
            }
        };

        let exports = match file.exports() {
            Ok(exports) => exports,
            Err(e) => {
                warn!("Cannot read exports of {}: {}", path.display(), e);
                return SymbolTable::default();
            }
        };

        let names = exports
            .iter()
            .filter_map(|export| std::str::from_utf8(export.name()).ok())
            .map(str::to_owned)
            .collect();
        SymbolTable::new(names)
    }
}

/// Demangle a Rust symbol name, or `None` when it is not one.
pub fn demangle(name: &str) -> Option<String> {
    rustc_demangle::try_demangle(name).ok().map(|d| d.to_string())
}
