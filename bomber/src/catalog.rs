use core::{
    error::Error,
    sync::atomic::{AtomicUsize, Ordering},
};
use std::{fs::File, io::BufReader, path::Path};

use serde::Deserialize;

/// One entry of the on-disk request catalog.
///
/// The name may be blank; a positional fallback is assigned when jobs
/// are materialized for a run.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "url")]
    pub path: String,
}

/// The static, ordered list of request descriptors, loaded once at
/// startup and replayed on every run.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<RequestDescriptor>,
}

impl Catalog {
    pub fn new(entries: Vec<RequestDescriptor>) -> Self {
        Self { entries }
    }

    /// Loads the catalog from a JSON file of `{name?, url}` records.
    pub fn from_fs<P>(path: P) -> Result<Self, Box<dyn Error>>
    where
        P: AsRef<Path>,
    {
        log::debug!("loading request catalog from '{}' ...", path.as_ref().display());

        let rd = File::open(path.as_ref())
            .map_err(|err| format!("failed to open catalog file '{}': {err}", path.as_ref().display()))?;
        let entries = serde_json::from_reader(BufReader::new(rd))?;

        Ok(Self::new(entries))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materializes jobs for one run, keeping catalog order.
    ///
    /// Descriptors with a blank name take their 1-based position as the
    /// name, so every job carries a non-blank name.
    pub fn jobs(&self) -> Vec<Job> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, d)| {
                let name = if d.name.trim().is_empty() {
                    (idx + 1).to_string()
                } else {
                    d.name.clone()
                };

                Job { name, path: d.path.clone() }
            })
            .collect()
    }
}

/// One request prepared for execution within a specific run.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub path: String,
}

/// Shared per-run job queue.
///
/// Filled once, then drained concurrently by the workers: [`next`]
/// hands out jobs in submission order until the queue is exhausted.
///
/// [`next`]: JobQueue::next
#[derive(Debug)]
pub struct JobQueue {
    jobs: Vec<Job>,
    idx: AtomicUsize,
}

impl JobQueue {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self { jobs, idx: AtomicUsize::new(0) }
    }

    /// Takes the next job, or `None` once all jobs were handed out.
    #[inline]
    pub fn next(&self) -> Option<&Job> {
        let idx = self.idx.fetch_add(1, Ordering::Relaxed);

        self.jobs.get(idx)
    }
}
