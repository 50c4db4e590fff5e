//! Ranked, size-bounded view of the live process table.

use crate::provider::{ProcessField, ProcessRecord, ProviderError, TelemetryProvider};
use crate::types::ProcessEntry;
use std::cmp::Ordering;
use tracing::{debug, warn};

pub const DEFAULT_LIMIT: usize = 40;

/// The only per-process fields read; anything else (cmdline, open files)
/// is expensive and unused.
pub const SAMPLED_FIELDS: [ProcessField; 5] = [
    ProcessField::Pid,
    ProcessField::Name,
    ProcessField::CpuPercent,
    ProcessField::MemoryPercent,
    ProcessField::Status,
];

/// Why a row was dropped from the sample.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Gone,
    AccessDenied,
    Unreadable(String),
    MissingField(ProcessField),
}

impl From<ProviderError> for SkipReason {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotFound => SkipReason::Gone,
            ProviderError::AccessDenied => SkipReason::AccessDenied,
            ProviderError::Unavailable(msg) => SkipReason::Unreadable(msg),
        }
    }
}

/// Negative limits clamp to zero.
pub fn clamp_limit(raw: i64) -> usize {
    usize::try_from(raw.max(0)).unwrap_or(usize::MAX)
}

fn round2(v: f32) -> f32 {
    ((v as f64 * 100.0).round() / 100.0) as f32
}

/// Turn one raw row into an entry. Memory is rounded here; CPU is kept as reported.
pub fn to_entry(row: Result<ProcessRecord, ProviderError>) -> Result<ProcessEntry, SkipReason> {
    let rec = row?;
    let cpu_percent = rec
        .cpu_percent
        .ok_or(SkipReason::MissingField(ProcessField::CpuPercent))?;
    let memory_percent = rec
        .memory_percent
        .ok_or(SkipReason::MissingField(ProcessField::MemoryPercent))?;
    Ok(ProcessEntry {
        pid: rec.pid,
        name: rec.name.unwrap_or_default(),
        cpu_percent,
        memory_percent: round2(memory_percent),
        status: rec.status.unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Stable sort by CPU descending; equal CPU keeps enumeration order.
pub fn rank(entries: &mut [ProcessEntry]) {
    entries.sort_by(|a, b| {
        b.cpu_percent
            .partial_cmp(&a.cpu_percent)
            .unwrap_or(Ordering::Equal)
    });
}

pub struct ProcessTableSampler<'a> {
    provider: &'a dyn TelemetryProvider,
}

impl<'a> ProcessTableSampler<'a> {
    pub fn new(provider: &'a dyn TelemetryProvider) -> Self {
        Self { provider }
    }

    /// Top `limit` processes by CPU. Rows that fail to read are skipped;
    /// a table that cannot be enumerated yields an empty list.
    pub fn sample(&self, limit: usize) -> Vec<ProcessEntry> {
        let rows = match self.provider.processes(&SAMPLED_FIELDS) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("process table unavailable: {e}");
                return Vec::new();
            }
        };

        let total = rows.len();
        let mut entries: Vec<ProcessEntry> = rows
            .into_iter()
            .map(to_entry)
            .filter_map(|r| match r {
                Ok(entry) => Some(entry),
                Err(reason) => {
                    debug!(?reason, "skipping process");
                    None
                }
            })
            .collect();
        debug!(total, kept = entries.len(), limit, "sampled process table");

        // Rank the whole table first; truncating earlier would favour enumeration order.
        rank(&mut entries);
        entries.truncate(limit);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::{record, FakeProvider};

    fn pids(v: &[ProcessEntry]) -> Vec<u32> {
        v.iter().map(|p| p.pid).collect()
    }

    #[test]
    fn ranks_by_cpu_then_truncates() {
        let fake = FakeProvider::new().with_processes(&[
            (1, "init", 0.0, 0.1),
            (2, "busy", 80.0, 1.0),
            (3, "mid", 20.0, 2.0),
            (4, "hot", 95.5, 3.0),
        ]);
        let out = ProcessTableSampler::new(&fake).sample(2);
        assert_eq!(pids(&out), vec![4, 2]);
    }

    #[test]
    fn ties_keep_enumeration_order() {
        let fake = FakeProvider::new().with_processes(&[
            (30, "c", 5.0, 0.0),
            (10, "a", 5.0, 0.0),
            (20, "b", 9.0, 0.0),
            (5, "d", 5.0, 0.0),
        ]);
        let out = ProcessTableSampler::new(&fake).sample(10);
        assert_eq!(pids(&out), vec![20, 30, 10, 5]);
    }

    #[test]
    fn erroring_rows_are_skipped() {
        let fake = FakeProvider::new()
            .with_processes(&[(1, "a", 1.0, 0.0), (2, "b", 2.0, 0.0), (3, "c", 3.0, 0.0)])
            .with_failing_process(ProviderError::AccessDenied)
            .with_failing_process(ProviderError::NotFound);
        let sampler = ProcessTableSampler::new(&fake);
        assert_eq!(sampler.sample(40).len(), 3);
        assert_eq!(sampler.sample(2).len(), 2);
    }

    #[test]
    fn zero_limit_is_empty() {
        let fake = FakeProvider::new().with_processes(&[(1, "a", 1.0, 0.0)]);
        assert!(ProcessTableSampler::new(&fake).sample(0).is_empty());
    }

    #[test]
    fn unreadable_table_is_empty_not_error() {
        let mut fake = FakeProvider::new();
        fake.table = Err(ProviderError::unavailable("no /proc"));
        assert!(ProcessTableSampler::new(&fake).sample(5).is_empty());
    }

    #[test]
    fn requests_only_the_sampled_fields() {
        let fake = FakeProvider::new();
        let _ = ProcessTableSampler::new(&fake).sample(5);
        assert_eq!(fake.requested_fields(), vec![SAMPLED_FIELDS.to_vec()]);
    }

    #[test]
    fn memory_rounded_cpu_untouched() {
        let fake = FakeProvider::new().with_processes(&[(7, "x", 33.333_33, 1.23456)]);
        let out = ProcessTableSampler::new(&fake).sample(1);
        assert_eq!(out[0].memory_percent, 1.23);
        assert_eq!(out[0].cpu_percent, 33.333_33);
        assert_eq!(out[0].status, "running");
    }

    #[test]
    fn missing_name_becomes_empty_string() {
        let mut rec = record(9, "", 1.0, 1.0, "sleeping");
        rec.name = None;
        let entry = to_entry(Ok(rec)).unwrap();
        assert_eq!(entry.name, "");
    }

    #[test]
    fn missing_cpu_is_a_skip() {
        let mut rec = record(9, "n", 1.0, 1.0, "sleeping");
        rec.cpu_percent = None;
        assert_eq!(
            to_entry(Ok(rec)),
            Err(SkipReason::MissingField(ProcessField::CpuPercent))
        );
        assert_eq!(
            to_entry(Err(ProviderError::AccessDenied)),
            Err(SkipReason::AccessDenied)
        );
    }

    #[test]
    fn limit_clamping() {
        assert_eq!(clamp_limit(-3), 0);
        assert_eq!(clamp_limit(0), 0);
        assert_eq!(clamp_limit(200), 200);
    }
}
