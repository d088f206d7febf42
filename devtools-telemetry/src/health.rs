//! Health reporting utilities.

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    /// Resident memory of this process.
    pub process_resident: u64,
    /// Total physical memory of the machine.
    pub system_total: u64,
    /// Physical memory currently in use machine-wide.
    pub system_used: u64,
}

/// Point-in-time view of the process and its host machine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// Always `"UP"` when a snapshot could be taken.
    pub status: &'static str,
    /// Memory figures.
    pub memory: MemoryUsage,
    /// Logical processors available to the process.
    pub available_processors: usize,
    /// Operating system name and version.
    pub os: String,
    /// CPU architecture.
    pub arch: &'static str,
    /// Process start time.
    pub start_time: DateTime<Utc>,
    /// Process uptime in milliseconds.
    pub uptime_ms: u64,
    /// Threads owned by the process, where the platform reports them.
    pub thread_count: Option<usize>,
}

/// Samples process statistics through `sysinfo`.
#[derive(Debug)]
pub struct ProcessStats {
    pid: Option<Pid>,
    started: SystemTime,
    system: Mutex<System>,
}

impl Default for ProcessStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessStats {
    /// Creates a sampler for the current process.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pid: sysinfo::get_current_pid().ok(),
            started: SystemTime::now(),
            system: Mutex::new(System::new()),
        }
    }

    /// Refreshes memory and process figures and returns a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        let mut system = self
            .system
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        system.refresh_memory();

        if let Some(pid) = self.pid {
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        }
        let process = self.pid.and_then(|pid| system.process(pid));

        let start_time = process
            .map(|p| SystemTime::UNIX_EPOCH + Duration::from_secs(p.start_time()))
            .unwrap_or(self.started);
        let uptime = SystemTime::now()
            .duration_since(start_time)
            .unwrap_or_default();

        let os = match (System::name(), System::os_version()) {
            (Some(name), Some(version)) => format!("{name} {version}"),
            (Some(name), None) => name,
            _ => std::env::consts::OS.to_owned(),
        };

        HealthSnapshot {
            status: "UP",
            memory: MemoryUsage {
                process_resident: process.map_or(0, sysinfo::Process::memory),
                system_total: system.total_memory(),
                system_used: system.used_memory(),
            },
            available_processors: std::thread::available_parallelism()
                .map_or(1, std::num::NonZeroUsize::get),
            os,
            arch: std::env::consts::ARCH,
            start_time: start_time.into(),
            uptime_ms: u64::try_from(uptime.as_millis()).unwrap_or(u64::MAX),
            thread_count: process.and_then(|p| p.tasks()).map(|tasks| tasks.len()),
        }
    }
}
