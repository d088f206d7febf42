//! Dependencies the host process was built with.

use std::fmt;
use std::sync::Arc;

use devtools_tools::CollectorError;
use serde::{Deserialize, Serialize};

/// One dependency entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Human readable name.
    pub name: String,
    /// Version, `"unknown"` when not recorded.
    pub version: String,
    /// Package or crate identifier.
    pub package: String,
}

impl Dependency {
    /// Creates an entry.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        package: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            package: package.into(),
        }
    }
}

type Loader = Arc<dyn Fn() -> Result<Vec<Dependency>, CollectorError> + Send + Sync>;

#[derive(Clone)]
enum Source {
    Fixed(Vec<Dependency>),
    Loader(Loader),
}

/// Source of dependency information: a fixed list or a loader run per query.
#[derive(Clone)]
pub struct DependencyCatalog {
    source: Source,
}

impl fmt::Debug for DependencyCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Source::Fixed(entries) => f
                .debug_struct("DependencyCatalog")
                .field("entries", &entries.len())
                .finish(),
            Source::Loader(_) => f
                .debug_struct("DependencyCatalog")
                .field("loader", &"dyn Fn")
                .finish(),
        }
    }
}

impl Default for DependencyCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyCatalog {
    /// Creates an empty fixed catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: Source::Fixed(Vec::new()),
        }
    }

    /// Adds an entry. Turns a loader-backed catalog into a fixed one.
    #[must_use]
    pub fn with(self, dependency: Dependency) -> Self {
        let mut entries = match self.source {
            Source::Fixed(entries) => entries,
            Source::Loader(_) => Vec::new(),
        };
        entries.push(dependency);
        Self {
            source: Source::Fixed(entries),
        }
    }

    /// Creates a catalog that calls `load` on every query.
    #[must_use]
    pub fn from_loader<F>(load: F) -> Self
    where
        F: Fn() -> Result<Vec<Dependency>, CollectorError> + Send + Sync + 'static,
    {
        Self {
            source: Source::Loader(Arc::new(load)),
        }
    }

    /// Returns the dependencies.
    ///
    /// # Errors
    ///
    /// Propagates a loader failure.
    pub fn list(&self) -> Result<Vec<Dependency>, CollectorError> {
        match &self.source {
            Source::Fixed(entries) => Ok(entries.clone()),
            Source::Loader(load) => load(),
        }
    }
}
