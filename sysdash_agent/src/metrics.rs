//! Host summary: one telemetry snapshot per request.

use crate::provider::{SensorGroup, TelemetryProvider};
use crate::types::{DiskUsage, MemoryUsage, SystemInfo, TelemetrySnapshot};
use chrono::{DateTime, Local};
use once_cell::sync::OnceCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Window used to measure aggregate CPU; a zero-length sample reads as 0%.
pub const DEFAULT_CPU_INTERVAL: Duration = Duration::from_millis(300);

const ROOT_FS: &str = "/";
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

// Runtime toggle (read once)
fn temp_enabled() -> bool {
    static ON: OnceCell<bool> = OnceCell::new();
    *ON.get_or_init(|| {
        std::env::var("SYSDASH_TEMP")
            .map(|v| v != "0")
            .unwrap_or(true)
    })
}

pub struct TelemetrySnapshotBuilder {
    provider: Arc<dyn TelemetryProvider>,
    cpu_interval: Duration,
    sense_temperature: bool,
}

impl TelemetrySnapshotBuilder {
    pub fn new(provider: Arc<dyn TelemetryProvider>) -> Self {
        Self {
            provider,
            cpu_interval: DEFAULT_CPU_INTERVAL,
            sense_temperature: temp_enabled(),
        }
    }

    pub fn cpu_interval(mut self, interval: Duration) -> Self {
        self.cpu_interval = interval;
        self
    }

    pub fn sense_temperature(mut self, on: bool) -> Self {
        self.sense_temperature = on;
        self
    }

    /// Blocks for the CPU sampling window. Never fails: unreadable
    /// counters come back as zeros, a missing sensor as `None`.
    pub fn build(&self) -> TelemetrySnapshot {
        self.build_at(Local::now())
    }

    pub fn build_at(&self, now: DateTime<Local>) -> TelemetrySnapshot {
        let p = self.provider.as_ref();

        let cpu_percent = p.cpu_percent(self.cpu_interval).unwrap_or_else(|e| {
            warn!("cpu sample failed: {e}");
            0.0
        });
        // Read right after the blocking sample so both cover the same window.
        let per_cpu = p.per_core_cpu_percent().unwrap_or_else(|e| {
            warn!("per-core cpu read failed: {e}");
            Vec::new()
        });

        let mem = p.virtual_memory().unwrap_or_else(|e| {
            warn!("memory read failed: {e}");
            Default::default()
        });
        let swap = p.swap_memory().unwrap_or_else(|e| {
            debug!("swap read failed: {e}");
            Default::default()
        });
        let disk = p.disk_usage(ROOT_FS).unwrap_or_else(|e| {
            warn!("disk usage for {ROOT_FS} failed: {e}");
            Default::default()
        });

        let temperature = if self.sense_temperature {
            self.cpu_temperature()
        } else {
            None
        };

        let uptime = match p.boot_time() {
            Ok(boot) => format_uptime(uptime_secs(boot, now.timestamp())),
            Err(e) => {
                debug!("boot time unavailable: {e}");
                format_uptime(0)
            }
        };

        TelemetrySnapshot {
            time: now.format("%H:%M:%S").to_string(),
            cpu_percent,
            per_cpu,
            memory: MemoryUsage {
                total: mem.total,
                used: mem.used,
                percent: mem.percent,
            },
            swap: MemoryUsage {
                total: swap.total,
                used: swap.used,
                percent: swap.percent,
            },
            disk: DiskUsage {
                total: disk.total,
                used: disk.used,
                percent: disk.percent,
                temperature,
            },
            system: SystemInfo {
                os: p.os_name(),
                cpu: p.cpu_model(),
                total_ram: bytes_to_gib(mem.total),
                uptime,
            },
        }
    }

    /// Sensor access is a failure boundary: errors, panics and empty maps
    /// all read as "no temperature".
    fn cpu_temperature(&self) -> Option<f32> {
        let provider = self.provider.as_ref();
        match catch_unwind(AssertUnwindSafe(|| provider.sensors_temperatures())) {
            Ok(Ok(groups)) => first_temperature(&groups),
            Ok(Err(e)) => {
                debug!("sensors unavailable: {e}");
                None
            }
            Err(e) => {
                warn!("sensor read panicked: {e:?}");
                None
            }
        }
    }
}

/// First non-zero reading in provider order, across groups.
pub fn first_temperature(groups: &[SensorGroup]) -> Option<f32> {
    groups
        .iter()
        .flat_map(|g| g.readings.iter())
        .filter_map(|r| r.current)
        .find(|t| *t != 0.0 && t.is_finite())
}

/// Bytes to GiB (base 1024), rounded to two decimals.
pub fn bytes_to_gib(bytes: u64) -> f64 {
    (bytes as f64 / GIB * 100.0).round() / 100.0
}

/// Boot times in the future clamp to zero.
fn uptime_secs(boot_time: u64, now_unix: i64) -> u64 {
    u64::try_from(now_unix)
        .unwrap_or(0)
        .saturating_sub(boot_time)
}

/// `H:MM:SS`, prefixed with `N day(s), ` past the first day.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let h = (secs % 86_400) / 3_600;
    let m = (secs % 3_600) / 60;
    let s = secs % 60;
    match days {
        0 => format!("{h}:{m:02}:{s:02}"),
        1 => format!("1 day, {h}:{m:02}:{s:02}"),
        d => format!("{d} days, {h}:{m:02}:{s:02}"),
    }
}
