//! Configuration resource identities.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ConfigurationError;

/// Name under which the built-in defaults document is reported.
pub const DEFAULTS_RESOURCE_NAME: &str = "builtin:defaults.toml";

const DEFAULTS_DOCUMENT: &str = include_str!("defaults.toml");

/// One configuration document: a file on disk or inline contents.
///
/// A resource identifies where to read a document from; it does not cache the
/// contents, so every build sees what is on disk at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigResource {
    name: String,
    source: Source,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    File(PathBuf),
    Inline(Arc<str>),
}

impl ConfigResource {
    /// A document read from `path` each time it is loaded.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            source: Source::File(path),
        }
    }

    /// A document whose contents are held in memory.
    pub fn inline(name: impl Into<String>, contents: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            source: Source::Inline(contents.into()),
        }
    }

    /// The built-in defaults document.
    pub fn builtin_defaults() -> Self {
        Self::inline(DEFAULTS_RESOURCE_NAME, DEFAULTS_DOCUMENT)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filesystem path, for file-backed resources.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::File(path) => Some(path),
            Source::Inline(_) => None,
        }
    }

    /// Read the document's current contents.
    pub fn read(&self) -> Result<String, ConfigurationError> {
        match &self.source {
            Source::File(path) => fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
                resource: self.name.clone(),
                source,
            }),
            Source::Inline(contents) => Ok(contents.to_string()),
        }
    }
}

impl fmt::Display for ConfigResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_resource_reads_current_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        fs::write(&path, "[context]\nname = \"one\"\n").unwrap();

        let resource = ConfigResource::file(&path);
        assert_eq!(resource.path(), Some(path.as_path()));
        assert!(resource.read().unwrap().contains("one"));

        fs::write(&path, "[context]\nname = \"two\"\n").unwrap();
        assert!(resource.read().unwrap().contains("two"));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let resource = ConfigResource::file("/nonexistent/app.toml");
        match resource.read() {
            Err(ConfigurationError::Read { resource, .. }) => {
                assert_eq!(resource, "/nonexistent/app.toml")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_builtin_defaults_are_inline() {
        let defaults = ConfigResource::builtin_defaults();
        assert_eq!(defaults.name(), DEFAULTS_RESOURCE_NAME);
        assert!(defaults.path().is_none());
        assert!(defaults.read().unwrap().contains("lifecycle-log"));
    }
}
