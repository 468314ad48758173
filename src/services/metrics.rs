//! Fire-and-forget counter sink.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Counter sink the pipeline reports into. Increments must never fail or
/// block the caller in any observable way.
pub trait MetricsSink: Send + Sync {
    fn inc_counter(&self, key: &str);
}

/// In-process counters, readable for dashboards and tests.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<BTreeMap<String, u64>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counters
            .lock()
            .expect("metrics lock poisoned")
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters.lock().expect("metrics lock poisoned").clone()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn inc_counter(&self, key: &str) {
        let mut counters = self.counters.lock().expect("metrics lock poisoned");
        *counters.entry(key.to_string()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = InMemoryMetrics::new();
        metrics.inc_counter("alert_filter.10058.risk.-1");
        metrics.inc_counter("alert_filter.10058.risk.-1");
        metrics.inc_counter("alert_filter.10097.risk.3");
        assert_eq!(metrics.get("alert_filter.10058.risk.-1"), 2);
        assert_eq!(metrics.get("alert_filter.10097.risk.3"), 1);
        assert_eq!(metrics.get("missing"), 0);
    }
}
