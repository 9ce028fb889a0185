//! Results persistence module
//!
//! Writes the suite's results artifact and reads it back for reporting.
//! Writes are atomic: the artifact is staged in a temporary file next to
//! the target and renamed over it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::models::BenchmarkResult;
use crate::{Result, VidBenchError, RESULTS_FORMAT_VERSION};

/// Results storage manager
#[derive(Debug)]
pub struct ResultsStorage {
    results_path: PathBuf,
}

/// Results file structure for JSON persistence
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsFile {
    pub version: u32,
    pub results: Vec<BenchmarkResult>,
}

impl ResultsFile {
    pub fn new(results: Vec<BenchmarkResult>) -> Self {
        Self {
            version: RESULTS_FORMAT_VERSION,
            results,
        }
    }
}

impl ResultsStorage {
    /// Create a storage manager for the artifact at `results_path`
    pub fn new(results_path: impl Into<PathBuf>) -> Self {
        Self {
            results_path: results_path.into(),
        }
    }

    /// Load the results of a previous suite
    pub fn load_results(&self) -> Result<Vec<BenchmarkResult>> {
        let content = fs::read_to_string(&self.results_path).map_err(|e| {
            VidBenchError::PersistenceError(format!(
                "Failed to read results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        let results_file: ResultsFile = serde_json::from_str(&content).map_err(|e| {
            VidBenchError::PersistenceError(format!(
                "Failed to parse results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        if results_file.version != RESULTS_FORMAT_VERSION {
            return Err(VidBenchError::PersistenceError(format!(
                "Unsupported results format version {} in {}",
                results_file.version,
                self.results_path.display()
            )));
        }

        Ok(results_file.results)
    }

    /// Replace the artifact with `results`
    ///
    /// A crash mid-write leaves the previous artifact (or nothing) in place,
    /// never a truncated file.
    pub fn save_results(&self, results: &[BenchmarkResult]) -> Result<()> {
        let parent = match self.results_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        fs::create_dir_all(&parent).map_err(|e| {
            VidBenchError::PersistenceError(format!(
                "Failed to create results directory {}: {}",
                parent.display(),
                e
            ))
        })?;

        let results_file = ResultsFile::new(results.to_vec());
        let content = serde_json::to_string_pretty(&results_file)?;

        let mut staged = NamedTempFile::new_in(&parent).map_err(|e| self.write_error(e))?;
        staged
            .write_all(content.as_bytes())
            .map_err(|e| self.write_error(e))?;
        staged.flush().map_err(|e| self.write_error(e))?;
        staged
            .persist(&self.results_path)
            .map_err(|e| self.write_error(e.error))?;

        debug!(
            path = %self.results_path.display(),
            count = results.len(),
            "results artifact written"
        );

        Ok(())
    }

    /// Get results file path for external access
    pub fn get_results_path(&self) -> &Path {
        &self.results_path
    }

    fn write_error(&self, err: std::io::Error) -> VidBenchError {
        VidBenchError::PersistenceError(format!(
            "Failed to write results file {}: {}",
            self.results_path.display(),
            err
        ))
    }
}
