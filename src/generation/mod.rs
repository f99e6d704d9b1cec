//! Dependency generations.
//!
//! # Data Flow
//! ```text
//! <monitored dir>/lib/*.jar
//!     → factory.rs (non-recursive scan, sorted by file name)
//!     → scope.rs (ResolutionScope: generation artifacts, then parent scope)
//!     → Generation { number, library_dir, scope }
//!     → handed explicitly to the context builder
//! ```
//!
//! # Design Decisions
//! - A generation is immutable; every reload scans again into a new one
//! - Numbers are strictly increasing and never reused, failed scans included
//! - No ambient "current scope": scopes are passed by `Arc`

pub mod factory;
pub mod scope;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

pub use factory::GenerationFactory;
pub use scope::{Artifact, ResolutionScope};

/// One immutable snapshot of the library directory.
#[derive(Debug)]
pub struct Generation {
    number: u64,
    library_dir: PathBuf,
    scope: Arc<ResolutionScope>,
    created_at: SystemTime,
}

impl Generation {
    pub(crate) fn new(number: u64, library_dir: PathBuf, scope: Arc<ResolutionScope>) -> Self {
        Self {
            number,
            library_dir,
            scope,
            created_at: SystemTime::now(),
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    /// The generation's resolution scope.
    pub fn scope(&self) -> &Arc<ResolutionScope> {
        &self.scope
    }

    /// Artifacts discovered for this generation, in scan order.
    pub fn artifacts(&self) -> &[Artifact] {
        self.scope.artifacts()
    }

    pub fn artifact_names(&self) -> Vec<&str> {
        self.artifacts().iter().map(Artifact::file_name).collect()
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}
