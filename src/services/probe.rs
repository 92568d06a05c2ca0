//! Process probing: the seam between the scheduler and the OS.
//!
//! Capture payloads are structured process-state snapshots assembled from
//! bounded `/proc/<pid>/` reads. All reads are size-capped; a pid that
//! cannot be read is treated as not found rather than trusted.

use crate::models::MemorySample;
use crate::{Error, Result, current_timestamp_millis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum size for a small `/proc` file read (4 KiB).
///
/// `comm`, `stat`, and `cmdline` are well under 1 KiB; the cap guards
/// against crafted procfs entries.
const MAX_PROC_READ_SIZE: u64 = 4096;

/// Maximum bytes read from `/proc/<pid>/maps`.
const MAX_MAPS_READ_SIZE: u64 = 65_536;

/// Maximum mapped-region paths carried in a snapshot.
const MAX_SNAPSHOT_REGIONS: usize = 64;

/// Maximum `/proc` directory entries scanned when listing processes.
const MAX_PROC_SCAN_ENTRIES: usize = 65_536;

/// Kernel page size assumed for `statm`/`stat` rss conversion.
const PAGE_SIZE: u64 = 4096;

/// Basic identity and resource figures for a live process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Process id.
    pub pid: u32,
    /// Process name (from `comm`).
    pub name: String,
    /// Kernel state character (`R`, `S`, `Z`, ...).
    pub state: String,
    /// Thread count.
    pub threads: u64,
    /// Resident set size in bytes.
    pub rss_bytes: u64,
    /// Virtual memory size in bytes.
    pub vsize_bytes: u64,
}

/// The payload written for an immediate capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    /// Capture timestamp (unix millis).
    pub captured_at: u64,
    /// Process identity and resource figures.
    pub info: ProcessInfo,
    /// Command line (argv joined with spaces; empty for kernel threads).
    pub cmdline: String,
    /// Total mapped regions.
    pub region_count: usize,
    /// Backing paths of the first mapped regions (bounded).
    pub regions: Vec<String>,
}

/// Seam to the operating system.
///
/// The scheduler only talks to processes through this trait; tests swap in
/// a [`ScriptedProbe`].
pub trait ProcessProbe: Send + Sync {
    /// Resolves a pid to its current process info.
    ///
    /// # Errors
    ///
    /// [`Error::ProcessNotFound`] if the pid does not resolve.
    fn resolve(&self, pid: u32) -> Result<ProcessInfo>;

    /// Produces the serialized snapshot payload for an immediate capture.
    fn snapshot(&self, pid: u32) -> Result<Vec<u8>>;

    /// Takes one timed-analysis sample.
    fn sample(&self, pid: u32) -> Result<MemorySample>;

    /// Lists running processes.
    fn processes(&self) -> Result<Vec<ProcessInfo>>;
}

/// `/proc`-backed probe used in production.
pub struct ProcProbe {
    root: PathBuf,
}

impl ProcProbe {
    /// Creates a probe over `/proc`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/proc"),
        }
    }

    /// Creates a probe over an alternate procfs root.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reads a size-capped `/proc/<pid>/<name>` file.
    fn read_proc_file(&self, pid: u32, name: &str, cap: u64) -> Result<String> {
        use std::io::Read;

        let path = self.root.join(pid.to_string()).join(name);
        let file = std::fs::File::open(&path).map_err(|_| Error::ProcessNotFound { pid })?;

        let mut buf = String::new();
        file.take(cap)
            .read_to_string(&mut buf)
            .map_err(|_| Error::ProcessNotFound { pid })?;
        Ok(buf)
    }

    /// Parses `/proc/<pid>/stat`, tolerating parens/spaces in the comm field.
    fn parse_stat(pid: u32, stat: &str) -> Result<ProcessInfo> {
        let not_found = || Error::ProcessNotFound { pid };

        let open = stat.find('(').ok_or_else(not_found)?;
        let close = stat.rfind(')').ok_or_else(not_found)?;
        let name = stat.get(open + 1..close).ok_or_else(not_found)?.to_string();
        let rest = stat.get(close + 2..).ok_or_else(not_found)?;

        let fields: Vec<&str> = rest.split_whitespace().collect();
        // After the comm field: state is field 0, num_threads 17, vsize 20,
        // rss (pages) 21.
        let state = (*fields.first().ok_or_else(not_found)?).to_string();
        let threads = fields
            .get(17)
            .and_then(|f| f.parse::<u64>().ok())
            .ok_or_else(not_found)?;
        let vsize_bytes = fields
            .get(20)
            .and_then(|f| f.parse::<u64>().ok())
            .ok_or_else(not_found)?;
        let rss_pages = fields
            .get(21)
            .and_then(|f| f.parse::<u64>().ok())
            .ok_or_else(not_found)?;

        Ok(ProcessInfo {
            pid,
            name,
            state,
            threads,
            rss_bytes: rss_pages.saturating_mul(PAGE_SIZE),
            vsize_bytes,
        })
    }
}

impl Default for ProcProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for ProcProbe {
    fn resolve(&self, pid: u32) -> Result<ProcessInfo> {
        let stat = self.read_proc_file(pid, "stat", MAX_PROC_READ_SIZE)?;
        Self::parse_stat(pid, &stat)
    }

    fn snapshot(&self, pid: u32) -> Result<Vec<u8>> {
        let info = self.resolve(pid)?;

        let cmdline = self
            .read_proc_file(pid, "cmdline", MAX_PROC_READ_SIZE)
            .map(|raw| {
                raw.split('\0')
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let maps = self
            .read_proc_file(pid, "maps", MAX_MAPS_READ_SIZE)
            .unwrap_or_default();
        let region_count = maps.lines().count();
        let regions: Vec<String> = maps
            .lines()
            .filter_map(|line| line.split_whitespace().nth(5))
            .map(ToString::to_string)
            .take(MAX_SNAPSHOT_REGIONS)
            .collect();

        let snapshot = ProcessSnapshot {
            captured_at: current_timestamp_millis(),
            info,
            cmdline,
            region_count,
            regions,
        };

        serde_json::to_vec_pretty(&snapshot).map_err(|e| Error::storage("serialize_snapshot", e))
    }

    fn sample(&self, pid: u32) -> Result<MemorySample> {
        let info = self.resolve(pid)?;
        Ok(MemorySample {
            timestamp: current_timestamp_millis(),
            rss_bytes: info.rss_bytes,
            vsize_bytes: info.vsize_bytes,
            threads: info.threads,
            state: info.state,
        })
    }

    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| Error::storage("scan_proc", e))?;

        let mut found = Vec::new();
        for entry in entries.take(MAX_PROC_SCAN_ENTRIES) {
            let Ok(entry) = entry else { continue };
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            // Processes can exit between the scan and the read.
            if let Ok(info) = self.resolve(pid) {
                found.push(info);
            }
        }

        found.sort_by(|a, b| b.rss_bytes.cmp(&a.rss_bytes));
        Ok(found)
    }
}

/// Deterministic probe for tests and local development.
///
/// Registered processes return synthetic samples with monotonically growing
/// resident memory; [`vanish`](Self::vanish) simulates a process exiting
/// mid-job.
#[derive(Default)]
pub struct ScriptedProbe {
    processes: Mutex<HashMap<u32, ProcessInfo>>,
    sample_counter: AtomicU64,
}

impl ScriptedProbe {
    /// Creates an empty scripted probe.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fake process.
    pub fn add_process(&self, pid: u32, name: &str) {
        let info = ProcessInfo {
            pid,
            name: name.to_string(),
            state: "S".to_string(),
            threads: 4,
            rss_bytes: 8 * 1024 * 1024,
            vsize_bytes: 64 * 1024 * 1024,
        };
        if let Ok(mut processes) = self.processes.lock() {
            processes.insert(pid, info);
        }
    }

    /// Removes a fake process, simulating an exit.
    pub fn vanish(&self, pid: u32) {
        if let Ok(mut processes) = self.processes.lock() {
            processes.remove(&pid);
        }
    }
}

impl ProcessProbe for ScriptedProbe {
    fn resolve(&self, pid: u32) -> Result<ProcessInfo> {
        self.processes
            .lock()
            .ok()
            .and_then(|p| p.get(&pid).cloned())
            .ok_or(Error::ProcessNotFound { pid })
    }

    fn snapshot(&self, pid: u32) -> Result<Vec<u8>> {
        let info = self.resolve(pid)?;
        let snapshot = ProcessSnapshot {
            captured_at: current_timestamp_millis(),
            info,
            cmdline: "scripted".to_string(),
            region_count: 0,
            regions: Vec::new(),
        };
        serde_json::to_vec_pretty(&snapshot).map_err(|e| Error::storage("serialize_snapshot", e))
    }

    fn sample(&self, pid: u32) -> Result<MemorySample> {
        let info = self.resolve(pid)?;
        let tick = self.sample_counter.fetch_add(1, Ordering::Relaxed);
        Ok(MemorySample {
            timestamp: current_timestamp_millis(),
            rss_bytes: info.rss_bytes + tick * 4096,
            vsize_bytes: info.vsize_bytes,
            threads: info.threads,
            state: info.state,
        })
    }

    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        Ok(self
            .processes
            .lock()
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default())
    }
}
