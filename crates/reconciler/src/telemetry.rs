//! Flush counters and their log emission.
//! Callers pass counters in explicitly; nothing here touches the engine.

use log::info;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushCounters {
    pub flushes: u64,
    pub renders_last: u64,
    pub renders_total: u64,
    pub patches_last: u64,
    pub patches_total: u64,
    pub mounts_total: u64,
    pub unmounts_total: u64,
    /// Updates cut short by `should_update`.
    pub skipped_total: u64,
    /// Mutation requests absorbed into an already pending flush.
    pub coalesced: u64,
}

impl FlushCounters {
    /// Fold the numbers of one finished flush into the running totals.
    pub fn record(&mut self, pass: &PassStats) {
        self.flushes = self.flushes.saturating_add(1);
        self.renders_last = pass.renders;
        self.renders_total = self.renders_total.saturating_add(pass.renders);
        self.patches_last = pass.patches;
        self.patches_total = self.patches_total.saturating_add(pass.patches);
        self.mounts_total = self.mounts_total.saturating_add(pass.mounts);
        self.unmounts_total = self.unmounts_total.saturating_add(pass.unmounts);
        self.skipped_total = self.skipped_total.saturating_add(pass.skipped);
    }
}

/// Numbers gathered during a single diff + patch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub renders: u64,
    pub patches: u64,
    pub mounts: u64,
    pub unmounts: u64,
    pub skipped: u64,
}

pub fn counters_json(counters: &FlushCounters) -> String {
    serde_json::to_string(counters).unwrap_or_default()
}

pub fn maybe_emit(enabled: bool, counters: &FlushCounters) {
    if enabled {
        info!(target: "reconciler::telemetry", "{}", counters_json(counters));
    }
}
