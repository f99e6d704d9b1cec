//! Library directory scanning.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::ResourceAccessError;
use crate::generation::scope::{Artifact, ResolutionScope};
use crate::generation::Generation;

/// Produces numbered generations from a library directory.
///
/// Numbers come from a single counter and are consumed even when the scan
/// fails, so a number is never handed out twice.
#[derive(Debug)]
pub struct GenerationFactory {
    extension: String,
    next_number: AtomicU64,
}

impl GenerationFactory {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into().trim_start_matches('.').to_string(),
            next_number: AtomicU64::new(0),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Claim the next generation number.
    pub fn reserve_number(&self) -> u64 {
        self.next_number.fetch_add(1, Ordering::SeqCst)
    }

    /// Scan `library_dir` into the next generation, as a child of `parent`.
    pub fn build(
        &self,
        library_dir: &Path,
        parent: &Arc<ResolutionScope>,
    ) -> Result<Generation, ResourceAccessError> {
        let number = self.reserve_number();
        self.build_numbered(number, library_dir, parent)
    }

    /// Scan `library_dir` into a generation carrying a previously reserved number.
    pub fn build_numbered(
        &self,
        number: u64,
        library_dir: &Path,
        parent: &Arc<ResolutionScope>,
    ) -> Result<Generation, ResourceAccessError> {
        tracing::info!(
            generation = number,
            library_dir = %library_dir.display(),
            "Scanning library directory"
        );

        let artifacts = self.scan(library_dir)?;

        tracing::info!(
            generation = number,
            count = artifacts.len(),
            artifacts = ?artifacts.iter().map(|a| a.location().as_str()).collect::<Vec<_>>(),
            "Generation artifacts resolved"
        );

        let scope = ResolutionScope::new(
            format!("generation-{number}"),
            artifacts,
            Some(Arc::clone(parent)),
        );
        Ok(Generation::new(number, library_dir.to_path_buf(), Arc::new(scope)))
    }

    /// List matching artifacts in `library_dir`, sorted by file name.
    ///
    /// A missing directory yields no artifacts. Subdirectories are not entered.
    pub fn scan(&self, library_dir: &Path) -> Result<Vec<Artifact>, ResourceAccessError> {
        let to_error = |source: io::Error| ResourceAccessError::LibraryDirectory {
            path: library_dir.to_path_buf(),
            source,
        };

        let dir = match fs::canonicalize(library_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(library_dir = %library_dir.display(), "Library directory absent");
                return Ok(Vec::new());
            }
            Err(e) => return Err(to_error(e)),
        };

        let mut artifacts = Vec::new();
        for entry in fs::read_dir(&dir).map_err(to_error)? {
            let path = entry.map_err(to_error)?.path();
            if !self.matches_extension(&path) {
                continue;
            }
            // Follows symlinks; dangling links are skipped.
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => artifacts.push(Artifact::from_path(path)?),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(to_error(e)),
            }
        }

        artifacts.sort_by(|a, b| a.file_name().cmp(b.file_name()));
        artifacts.dedup_by(|a, b| a.location() == b.location());
        Ok(artifacts)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }
}
