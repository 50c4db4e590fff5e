//! Telemetry provider backed by sysinfo.

use super::{
    percent_of, DiskCounters, MemoryCounters, ProcessField, ProcessRecord, ProviderError,
    ProviderResult, SensorGroup, SensorReading, TelemetryProvider,
};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use sysinfo::{
    Components, CpuRefreshKind, Disks, MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessStatus,
    ProcessesToUpdate, RefreshKind, Signal, System, MINIMUM_CPU_UPDATE_INTERVAL,
};
use tracing::debug;

/// Persistent sysinfo handles. CPU and process counters are deltas between
/// refreshes, so both `System`s live as long as the provider does. They are
/// split so a 300ms CPU sample never holds up a process scan.
pub struct HostProvider {
    cpu: Mutex<System>,
    procs: Mutex<System>,
}

impl Default for HostProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProvider {
    pub fn new() -> Self {
        let cpu = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::everything()),
        );
        let mut procs = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        // Baseline so the first scan already has a CPU delta to work from.
        procs.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
        Self {
            cpu: Mutex::new(cpu),
            procs: Mutex::new(procs),
        }
    }

    fn cpu_sys(&self) -> ProviderResult<MutexGuard<'_, System>> {
        self.cpu
            .lock()
            .map_err(|_| ProviderError::unavailable("cpu counters poisoned"))
    }

    fn proc_sys(&self) -> ProviderResult<MutexGuard<'_, System>> {
        self.procs
            .lock()
            .map_err(|_| ProviderError::unavailable("process table poisoned"))
    }
}

fn memory_system() -> System {
    System::new_with_specifics(
        RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
    )
}

/// Lowercase status vocabulary shared with the dashboard.
pub fn status_label(status: ProcessStatus) -> &'static str {
    match status {
        ProcessStatus::Run => "running",
        ProcessStatus::Sleep => "sleeping",
        ProcessStatus::Idle => "idle",
        ProcessStatus::Stop => "stopped",
        ProcessStatus::Zombie => "zombie",
        ProcessStatus::Tracing => "tracing-stop",
        ProcessStatus::Dead => "dead",
        ProcessStatus::Wakekill => "wake-kill",
        ProcessStatus::Waking => "waking",
        ProcessStatus::Parked => "parked",
        ProcessStatus::LockBlocked => "locked",
        ProcessStatus::UninterruptibleDiskSleep => "disk-sleep",
        _ => "unknown",
    }
}

/// Group name of a component: first word of its label ("coretemp Core 0" -> "coretemp").
fn sensor_group_name(label: &str) -> &str {
    label.split_whitespace().next().unwrap_or("")
}

impl TelemetryProvider for HostProvider {
    fn cpu_percent(&self, interval: Duration) -> ProviderResult<f32> {
        let mut sys = self.cpu_sys()?;
        sys.refresh_cpu_usage();
        std::thread::sleep(interval.max(MINIMUM_CPU_UPDATE_INTERVAL));
        sys.refresh_cpu_usage();
        Ok(sys.global_cpu_usage())
    }

    fn per_core_cpu_percent(&self) -> ProviderResult<Vec<f32>> {
        let sys = self.cpu_sys()?;
        Ok(sys.cpus().iter().map(|c| c.cpu_usage()).collect())
    }

    fn virtual_memory(&self) -> ProviderResult<MemoryCounters> {
        let sys = memory_system();
        let total = sys.total_memory();
        let used = sys.used_memory();
        if total == 0 {
            return Err(ProviderError::unavailable("memory counters unavailable"));
        }
        Ok(MemoryCounters {
            total,
            used,
            percent: percent_of(used, total),
        })
    }

    fn swap_memory(&self) -> ProviderResult<MemoryCounters> {
        let sys = memory_system();
        let total = sys.total_swap();
        let used = sys.used_swap();
        Ok(MemoryCounters {
            total,
            used,
            percent: percent_of(used, total),
        })
    }

    fn disk_usage(&self, path: &str) -> ProviderResult<DiskCounters> {
        let disks = Disks::new_with_refreshed_list();
        let target = Path::new(path);
        // Longest mount point that prefixes the path wins ("/" vs "/home").
        let disk = disks
            .list()
            .iter()
            .filter(|d| target.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| ProviderError::unavailable(format!("no filesystem mounted at {path}")))?;
        let total = disk.total_space();
        let used = total.saturating_sub(disk.available_space());
        Ok(DiskCounters {
            total,
            used,
            percent: percent_of(used, total),
        })
    }

    fn boot_time(&self) -> ProviderResult<u64> {
        match System::boot_time() {
            0 => Err(ProviderError::unavailable("boot time unavailable")),
            t => Ok(t),
        }
    }

    fn sensors_temperatures(&self) -> ProviderResult<Vec<SensorGroup>> {
        let components = Components::new_with_refreshed_list();
        let mut groups: Vec<SensorGroup> = Vec::new();
        for c in components.iter() {
            let label = c.label();
            let name = sensor_group_name(label);
            let reading = SensorReading {
                label: label.to_string(),
                current: c.temperature(),
            };
            match groups.iter_mut().find(|g| g.name == name) {
                Some(g) => g.readings.push(reading),
                None => groups.push(SensorGroup {
                    name: name.to_string(),
                    readings: vec![reading],
                }),
            }
        }
        Ok(groups)
    }

    fn processes(
        &self,
        fields: &[ProcessField],
    ) -> ProviderResult<Vec<ProviderResult<ProcessRecord>>> {
        let want = |f: ProcessField| fields.contains(&f);
        let mut kind = ProcessRefreshKind::nothing();
        if want(ProcessField::CpuPercent) {
            kind = kind.with_cpu();
        }
        if want(ProcessField::MemoryPercent) {
            kind = kind.with_memory();
        }

        let mut sys = self.proc_sys()?;
        sys.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        sys.refresh_processes_specifics(ProcessesToUpdate::All, true, kind);
        let total_mem = sys.total_memory();

        let mut rows: Vec<ProcessRecord> = sys
            .processes()
            .values()
            .map(|p| {
                let mem_pct = if total_mem == 0 {
                    0.0
                } else {
                    (p.memory() as f64 / total_mem as f64 * 100.0) as f32
                };
                ProcessRecord {
                    pid: p.pid().as_u32(),
                    name: want(ProcessField::Name)
                        .then(|| p.name().to_string_lossy().into_owned()),
                    cpu_percent: want(ProcessField::CpuPercent).then(|| p.cpu_usage()),
                    memory_percent: want(ProcessField::MemoryPercent).then_some(mem_pct),
                    status: want(ProcessField::Status)
                        .then(|| status_label(p.status()).to_string()),
                }
            })
            .collect();
        // sysinfo keeps processes in a hash map; ties in the ranking keep this order.
        rows.sort_unstable_by_key(|r| r.pid);
        Ok(rows.into_iter().map(Ok).collect())
    }

    fn kill_process(&self, pid: u32) -> ProviderResult<()> {
        let sys_pid = Pid::from_u32(pid);
        let mut sys = self.proc_sys()?;
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        let process = sys.process(sys_pid).ok_or(ProviderError::NotFound)?;
        let sent = match process.kill_with(Signal::Kill) {
            Some(sent) => sent,
            // Signal not supported on this platform, fall back to kill()
            None => process.kill(),
        };
        if sent {
            return Ok(());
        }

        let os_err = std::io::Error::last_os_error();
        debug!(pid, error = %os_err, "kill failed");
        if os_err.kind() == std::io::ErrorKind::PermissionDenied {
            return Err(ProviderError::AccessDenied);
        }
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::nothing(),
        );
        if sys.process(sys_pid).is_none() {
            return Err(ProviderError::NotFound);
        }
        Err(ProviderError::unavailable(format!(
            "failed to kill PID {pid}: {os_err}"
        )))
    }

    fn os_name(&self) -> String {
        System::long_os_version()
            .or_else(System::name)
            .unwrap_or_else(|| std::env::consts::OS.to_string())
    }

    fn cpu_model(&self) -> String {
        self.cpu_sys()
            .ok()
            .and_then(|sys| sys.cpus().first().map(|c| c.brand().trim().to_string()))
            .unwrap_or_default()
    }
}
