//! In-memory provider with scripted readings, for tests.

use super::{
    DiskCounters, MemoryCounters, ProcessField, ProcessRecord, ProviderError, ProviderResult,
    SensorGroup, SensorReading, TelemetryProvider,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// How the fake answers a kill request for a pid.
#[derive(Debug, Clone, PartialEq)]
pub enum KillBehavior {
    Killable,
    Denied,
    Fail(String),
}

/// Scripted provider used in tests. Every reading is plain data; the
/// provider records what it was asked for.
pub struct FakeProvider {
    pub cpu: ProviderResult<f32>,
    pub per_core: Vec<f32>,
    pub memory: ProviderResult<MemoryCounters>,
    pub swap: ProviderResult<MemoryCounters>,
    pub disk: ProviderResult<DiskCounters>,
    pub boot_time: ProviderResult<u64>,
    pub sensors: ProviderResult<Vec<SensorGroup>>,
    pub panic_in_sensors: bool,
    pub table: ProviderResult<Vec<ProviderResult<ProcessRecord>>>,
    pub os: String,
    pub cpu_model: String,
    kill_rules: HashMap<u32, KillBehavior>,
    requested_fields: Mutex<Vec<Vec<ProcessField>>>,
    sampled_intervals: Mutex<Vec<Duration>>,
    killed: Mutex<Vec<u32>>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            cpu: Ok(12.5),
            per_core: vec![10.0, 15.0],
            memory: Ok(MemoryCounters {
                total: 8_589_934_592,
                used: 4_294_967_296,
                percent: 50.0,
            }),
            swap: Ok(MemoryCounters::default()),
            disk: Ok(DiskCounters {
                total: 1_000,
                used: 250,
                percent: 25.0,
            }),
            boot_time: Ok(0),
            sensors: Ok(Vec::new()),
            panic_in_sensors: false,
            table: Ok(Vec::new()),
            os: "FakeOS 1.0".into(),
            cpu_model: "Fake CPU @ 1.00GHz".into(),
            kill_rules: HashMap::new(),
            requested_fields: Mutex::new(Vec::new()),
            sampled_intervals: Mutex::new(Vec::new()),
            killed: Mutex::new(Vec::new()),
        }
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process table from `(pid, name, cpu, mem)` rows, all running.
    pub fn with_processes(mut self, rows: &[(u32, &str, f32, f32)]) -> Self {
        self.table = Ok(rows
            .iter()
            .map(|&(pid, name, cpu, mem)| Ok(record(pid, name, cpu, mem, "running")))
            .collect());
        self
    }

    /// Append a row that fails to read.
    pub fn with_failing_process(mut self, err: ProviderError) -> Self {
        if let Ok(rows) = self.table.as_mut() {
            rows.push(Err(err));
        }
        self
    }

    pub fn with_sensor(mut self, group: &str, label: &str, current: Option<f32>) -> Self {
        if self.sensors.is_err() {
            self.sensors = Ok(Vec::new());
        }
        if let Ok(groups) = self.sensors.as_mut() {
            let reading = SensorReading {
                label: label.to_string(),
                current,
            };
            match groups.iter_mut().find(|g| g.name == group) {
                Some(g) => g.readings.push(reading),
                None => groups.push(SensorGroup {
                    name: group.to_string(),
                    readings: vec![reading],
                }),
            }
        }
        self
    }

    pub fn with_kill(mut self, pid: u32, behavior: KillBehavior) -> Self {
        self.kill_rules.insert(pid, behavior);
        self
    }

    pub fn requested_fields(&self) -> Vec<Vec<ProcessField>> {
        self.requested_fields.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn sampled_intervals(&self) -> Vec<Duration> {
        self.sampled_intervals.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn killed(&self) -> Vec<u32> {
        self.killed.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

pub fn record(pid: u32, name: &str, cpu: f32, mem: f32, status: &str) -> ProcessRecord {
    ProcessRecord {
        pid,
        name: Some(name.to_string()),
        cpu_percent: Some(cpu),
        memory_percent: Some(mem),
        status: Some(status.to_string()),
    }
}

impl TelemetryProvider for FakeProvider {
    fn cpu_percent(&self, interval: Duration) -> ProviderResult<f32> {
        if let Ok(mut v) = self.sampled_intervals.lock() {
            v.push(interval);
        }
        self.cpu.clone()
    }

    fn per_core_cpu_percent(&self) -> ProviderResult<Vec<f32>> {
        Ok(self.per_core.clone())
    }

    fn virtual_memory(&self) -> ProviderResult<MemoryCounters> {
        self.memory.clone()
    }

    fn swap_memory(&self) -> ProviderResult<MemoryCounters> {
        self.swap.clone()
    }

    fn disk_usage(&self, _path: &str) -> ProviderResult<DiskCounters> {
        self.disk.clone()
    }

    fn boot_time(&self) -> ProviderResult<u64> {
        self.boot_time.clone()
    }

    fn sensors_temperatures(&self) -> ProviderResult<Vec<SensorGroup>> {
        if self.panic_in_sensors {
            panic!("sensor driver exploded");
        }
        self.sensors.clone()
    }

    fn processes(
        &self,
        fields: &[ProcessField],
    ) -> ProviderResult<Vec<ProviderResult<ProcessRecord>>> {
        if let Ok(mut v) = self.requested_fields.lock() {
            v.push(fields.to_vec());
        }
        self.table.clone()
    }

    fn kill_process(&self, pid: u32) -> ProviderResult<()> {
        match self.kill_rules.get(&pid) {
            None => Err(ProviderError::NotFound),
            Some(KillBehavior::Denied) => Err(ProviderError::AccessDenied),
            Some(KillBehavior::Fail(msg)) => Err(ProviderError::Unavailable(msg.clone())),
            Some(KillBehavior::Killable) => {
                if let Ok(mut v) = self.killed.lock() {
                    v.push(pid);
                }
                Ok(())
            }
        }
    }

    fn os_name(&self) -> String {
        self.os.clone()
    }

    fn cpu_model(&self) -> String {
        self.cpu_model.clone()
    }
}
