//! Resolution scopes.
//!
//! A scope resolves artifact symbols from its own artifacts first and falls
//! back to its parent. Scopes are immutable and shared through `Arc`; each
//! generation gets its own child of the supervisor's parent scope.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

use crate::error::ResourceAccessError;

/// One dependency artifact discovered in a library directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    symbol: String,
    file_name: String,
    path: PathBuf,
    location: Url,
}

impl Artifact {
    /// Describe the artifact at `path`, which must be absolute.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, ResourceAccessError> {
        let path = path.into();
        let location = Url::from_file_path(&path)
            .map_err(|()| ResourceAccessError::ArtifactLocation(path.clone()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ResourceAccessError::ArtifactLocation(path.clone()))?;
        let symbol = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());

        Ok(Self {
            symbol,
            file_name,
            path,
            location,
        })
    }

    /// Name the artifact is resolved by (file stem, e.g. `orders-core`).
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `file://` location of the artifact.
    pub fn location(&self) -> &Url {
        &self.location
    }

    fn answers_to(&self, symbol: &str) -> bool {
        self.symbol == symbol || self.file_name == symbol
    }
}

/// An isolated namespace of artifacts with an optional parent.
#[derive(Debug, Default)]
pub struct ResolutionScope {
    label: String,
    artifacts: Vec<Artifact>,
    parent: Option<Arc<ResolutionScope>>,
}

impl ResolutionScope {
    /// An empty scope with no parent.
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            label: "root".to_string(),
            ..Self::default()
        })
    }

    pub fn new(
        label: impl Into<String>,
        artifacts: Vec<Artifact>,
        parent: Option<Arc<ResolutionScope>>,
    ) -> Self {
        Self {
            label: label.into(),
            artifacts,
            parent,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Artifacts owned by this scope, parents excluded.
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn parent(&self) -> Option<&Arc<ResolutionScope>> {
        self.parent.as_ref()
    }

    /// Resolve `symbol` (stem or file name), child first.
    pub fn resolve(&self, symbol: &str) -> Option<&Artifact> {
        self.artifacts
            .iter()
            .find(|a| a.answers_to(symbol))
            .or_else(|| self.parent.as_deref().and_then(|p| p.resolve(symbol)))
    }

    /// Number of scopes from this one up to the root, inclusive.
    pub fn depth(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |p| p.depth())
    }
}
