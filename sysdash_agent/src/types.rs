//! Data types sent to the dashboard over HTTP.
//! Keep this module minimal and stable; it defines the wire format.

use serde::Serialize;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MemoryUsage {
    pub total: u64,
    pub used: u64,
    pub percent: f32,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub percent: f32,
    // CPU temperature in °C; dashboard clients read it from this block
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SystemInfo {
    pub os: String,
    pub cpu: String,
    /// GiB, two decimals.
    pub total_ram: f64,
    pub uptime: String,
}

/// One point-in-time reading of host resources, built per request.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub time: String,
    pub cpu_percent: f32,
    pub per_cpu: Vec<f32>,
    pub memory: MemoryUsage,
    pub swap: MemoryUsage,
    pub disk: DiskUsage,
    pub system: SystemInfo,
}

impl TelemetrySnapshot {
    pub fn temperature(&self) -> Option<f32> {
        self.disk.temperature
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub status: String,
}

/// Outcome of a host action. `status` is the HTTP status the caller should
/// answer with; it is not part of the JSON body.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    pub status: u16,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            status: 200,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            status: 200,
        }
    }

    pub fn failed(status: u16, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            status,
        }
    }
}
