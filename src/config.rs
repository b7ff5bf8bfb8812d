//! Configuration of the background recomputation pool.

use std::fs;
use std::path::Path;
use std::thread;

use crate::types::Result;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Number of worker threads. Zero is treated as one.
    pub worker_threads: usize,
    /// Prefix of the worker thread names.
    pub thread_name: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            worker_threads,
            thread_name: "svd-recompose".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Read a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Number of workers actually spawned.
    pub fn effective_workers(&self) -> usize {
        self.worker_threads.max(1)
    }
}
