//! Install usage counters

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Receives one event per successful chart install
pub trait MetricsSink: Send + Sync {
    /// Record an install of `chart` at `version`
    fn record_install(&self, chart: &str, version: &str);
}

/// In-process install counter keyed by chart name and version
#[derive(Debug, Default)]
pub struct InstallCounter {
    counts: Mutex<BTreeMap<(String, String), u64>>,
}

impl InstallCounter {
    /// Create an empty counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs recorded for one chart version
    pub fn count(&self, chart: &str, version: &str) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(chart.to_string(), version.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Installs recorded across all charts
    pub fn total(&self) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }
}

impl MetricsSink for InstallCounter {
    fn record_install(&self, chart: &str, version: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let total = counts
            .entry((chart.to_string(), version.to_string()))
            .or_insert(0);
        *total += 1;
        tracing::info!(chart, version, installs = *total, "chart installed");
    }
}
