//! OS telemetry provider: the capability that hands out raw counters.
//!
//! Everything above this seam (snapshot building, process ranking, host
//! actions) talks to a `dyn TelemetryProvider`, so it can be driven by the
//! sysinfo-backed [`host::HostProvider`] in production and by the scripted
//! [`fake::FakeProvider`] in tests.

pub mod fake;
pub mod host;

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("no such process")]
    NotFound,
    #[error("access denied")]
    AccessDenied,
    #[error("{0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        ProviderError::Unavailable(msg.into())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Memory or swap counters, bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryCounters {
    pub total: u64,
    pub used: u64,
    pub percent: f32,
}

/// Usage of the filesystem holding a path, bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskCounters {
    pub total: u64,
    pub used: u64,
    pub percent: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub label: String,
    pub current: Option<f32>,
}

/// Named group of readings (e.g. "coretemp"), in provider order.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorGroup {
    pub name: String,
    pub readings: Vec<SensorReading>,
}

/// Per-process fields a caller may ask for. Providers only fill in what
/// was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessField {
    Pid,
    Name,
    CpuPercent,
    MemoryPercent,
    Status,
}

/// One row of the raw process table. Fields that were not requested stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: Option<String>,
    pub cpu_percent: Option<f32>,
    pub memory_percent: Option<f32>,
    pub status: Option<String>,
}

pub trait TelemetryProvider: Send + Sync {
    /// Aggregate CPU utilisation measured over `interval`. Blocks the caller.
    fn cpu_percent(&self, interval: Duration) -> ProviderResult<f32>;

    /// Per logical core utilisation since the last CPU refresh. Non-blocking.
    fn per_core_cpu_percent(&self) -> ProviderResult<Vec<f32>>;

    fn virtual_memory(&self) -> ProviderResult<MemoryCounters>;

    fn swap_memory(&self) -> ProviderResult<MemoryCounters>;

    fn disk_usage(&self, path: &str) -> ProviderResult<DiskCounters>;

    /// Boot time, seconds since the Unix epoch.
    fn boot_time(&self) -> ProviderResult<u64>;

    fn sensors_temperatures(&self) -> ProviderResult<Vec<SensorGroup>>;

    /// Walk the live process table. The outer error means the table could
    /// not be enumerated at all; inner errors belong to single processes.
    fn processes(
        &self,
        fields: &[ProcessField],
    ) -> ProviderResult<Vec<ProviderResult<ProcessRecord>>>;

    /// Forcefully terminate a process.
    fn kill_process(&self, pid: u32) -> ProviderResult<()>;

    fn os_name(&self) -> String;

    /// CPU model string; may be empty.
    fn cpu_model(&self) -> String;
}

/// Round to one decimal, the precision used for memory/swap/disk percentages.
pub(crate) fn percent_of(used: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    let pct = used as f64 / total as f64 * 100.0;
    ((pct * 10.0).round() / 10.0) as f32
}
