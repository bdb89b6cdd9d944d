//! Metrics and reporting for resolve/publish operations.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tier hit counters (thread-safe, cheap to clone).
#[derive(Debug, Clone, Default)]
pub struct ResolveMetrics {
    /// Resolved from the local public store
    pub local_public_hits: Arc<AtomicU64>,
    /// Resolved from the local private store
    pub local_private_hits: Arc<AtomicU64>,
    /// Downloaded from the remote private copy
    pub remote_private_hits: Arc<AtomicU64>,
    /// Downloaded as a public zip via the manifest
    pub manifest_hits: Arc<AtomicU64>,
    /// Fetched from the origin hub
    pub origin_fetches: Arc<AtomicU64>,
    /// Resolved nowhere
    pub misses: Arc<AtomicU64>,
    /// Publish calls that succeeded
    pub publishes: Arc<AtomicU64>,
    /// Publish calls that failed
    pub publish_failures: Arc<AtomicU64>,
}

impl ResolveMetrics {
    pub fn record_local_public_hit(&self) {
        self.local_public_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_private_hit(&self) {
        self.local_private_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_private_hit(&self) {
        self.remote_private_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_manifest_hit(&self) {
        self.manifest_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_origin_fetch(&self) {
        self.origin_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish(&self, success: bool) {
        if success {
            self.publishes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.publish_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            local_public_hits: self.local_public_hits.load(Ordering::Relaxed),
            local_private_hits: self.local_private_hits.load(Ordering::Relaxed),
            remote_private_hits: self.remote_private_hits.load(Ordering::Relaxed),
            manifest_hits: self.manifest_hits.load(Ordering::Relaxed),
            origin_fetches: self.origin_fetches.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            publishes: self.publishes.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics (for reporting).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub local_public_hits: u64,
    pub local_private_hits: u64,
    pub remote_private_hits: u64,
    pub manifest_hits: u64,
    pub origin_fetches: u64,
    pub misses: u64,
    pub publishes: u64,
    pub publish_failures: u64,
}

impl MetricsSnapshot {
    pub fn local_hits(&self) -> u64 {
        self.local_public_hits + self.local_private_hits
    }

    pub fn remote_hits(&self) -> u64 {
        self.remote_private_hits + self.manifest_hits
    }

    /// Share of resolutions served without touching the network.
    pub fn local_hit_rate(&self) -> f64 {
        let total = self.local_hits() + self.remote_hits() + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.local_hits() as f64 / total as f64
    }

    /// Format a human-readable report.
    pub fn format_report(&self) -> String {
        let mut lines = Vec::new();
        lines.push("Artifact Cache Report".to_string());
        lines.push("=".repeat(50));
        lines.push("Resolutions:".to_string());
        lines.push(format!("  Local public:    {}", self.local_public_hits));
        lines.push(format!("  Local private:   {}", self.local_private_hits));
        lines.push(format!("  Remote private:  {}", self.remote_private_hits));
        lines.push(format!("  Public manifest: {}", self.manifest_hits));
        lines.push(format!("  Not found:       {}", self.misses));
        lines.push(format!(
            "  Local Hit Rate:  {:.1}%",
            self.local_hit_rate() * 100.0
        ));
        lines.push(String::new());
        lines.push("Writes:".to_string());
        lines.push(format!("  Origin fetches:  {}", self.origin_fetches));
        lines.push(format!("  Publishes:       {}", self.publishes));
        lines.push(format!("  Failed:          {}", self.publish_failures));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = ResolveMetrics::default();
        let clone = metrics.clone();
        clone.record_local_public_hit();
        metrics.record_miss();
        let snap = metrics.snapshot();
        assert_eq!(snap.local_public_hits, 1);
        assert_eq!(snap.misses, 1);
        assert!((snap.local_hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_mentions_every_tier() {
        let report = MetricsSnapshot::default().format_report();
        for label in ["Local public", "Remote private", "Public manifest", "Origin fetches"] {
            assert!(report.contains(label), "missing {label}");
        }
    }
}
