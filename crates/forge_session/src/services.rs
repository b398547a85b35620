//! Ambient services: error reporting and performance monitoring.
//!
//! Both services are constructed once from configuration and injected into
//! every session machine. When a feature flag is off the service still
//! accepts calls but records nothing.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::FeatureFlags;

/// Reports kept by [`ErrorReporter`].
pub const MAX_ERROR_REPORTS: usize = 100;
/// Metrics kept by [`PerformanceMonitor`].
pub const MAX_METRICS: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One reported error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReport {
    pub id: String,
    pub name: String,
    pub message: String,
    /// Free-form context such as the operation or session id
    pub context: Value,
    pub severity: Severity,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Bounded in-memory error log.
pub struct ErrorReporter {
    enabled: bool,
    reports: Mutex<VecDeque<ErrorReport>>,
}

impl ErrorReporter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            reports: Mutex::new(VecDeque::with_capacity(MAX_ERROR_REPORTS)),
        }
    }

    /// Record an error and log it. Returns the report id when recorded.
    pub fn report(
        &self,
        name: impl Into<String>,
        message: impl Into<String>,
        context: Value,
        severity: Severity,
    ) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let report = ErrorReport {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            message: message.into(),
            context,
            severity,
            created_at: Utc::now(),
        };
        error!(
            name = %report.name,
            severity = ?report.severity,
            context = %report.context,
            "{}",
            report.message
        );

        let id = report.id.clone();
        let mut reports = self.reports.lock();
        if reports.len() == MAX_ERROR_REPORTS {
            reports.pop_front();
        }
        reports.push_back(report);
        Some(id)
    }

    /// Reports oldest first.
    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }

    pub fn clear(&self) {
        self.reports.lock().clear();
    }
}

/// A single timing sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    pub name: String,
    pub duration_ms: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate over all samples of one metric name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricSummary {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
}

/// Bounded in-memory timing log.
pub struct PerformanceMonitor {
    enabled: bool,
    metrics: Mutex<VecDeque<Metric>>,
}

impl PerformanceMonitor {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            metrics: Mutex::new(VecDeque::with_capacity(MAX_METRICS)),
        }
    }

    pub fn record(&self, name: impl Into<String>, duration_ms: f64) {
        if !self.enabled {
            return;
        }
        let metric = Metric {
            name: name.into(),
            duration_ms,
            recorded_at: Utc::now(),
        };
        debug!(metric = %metric.name, duration_ms, "Recorded metric");

        let mut metrics = self.metrics.lock();
        if metrics.len() == MAX_METRICS {
            metrics.pop_front();
        }
        metrics.push_back(metric);
    }

    /// Await `fut` and record its wall-clock duration under `name`.
    pub async fn measure_async<F, T>(&self, name: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let output = fut.await;
        self.record(name, started.elapsed().as_secs_f64() * 1000.0);
        output
    }

    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics.lock().iter().cloned().collect()
    }

    pub fn summary(&self, name: &str) -> Option<MetricSummary> {
        let metrics = self.metrics.lock();
        summarize(metrics.iter().filter(|m| m.name == name).map(|m| m.duration_ms))
    }

    /// Summaries for every recorded metric name.
    pub fn summaries(&self) -> HashMap<String, MetricSummary> {
        let metrics = self.metrics.lock();
        let mut grouped: HashMap<String, Vec<f64>> = HashMap::new();
        for m in metrics.iter() {
            grouped.entry(m.name.clone()).or_default().push(m.duration_ms);
        }
        grouped
            .into_iter()
            .filter_map(|(name, samples)| summarize(samples.into_iter()).map(|s| (name, s)))
            .collect()
    }
}

fn summarize(samples: impl Iterator<Item = f64>) -> Option<MetricSummary> {
    let mut count = 0;
    let mut total = 0.0;
    let mut min_ms = f64::INFINITY;
    let mut max_ms = f64::NEG_INFINITY;
    for s in samples {
        count += 1;
        total += s;
        min_ms = min_ms.min(s);
        max_ms = max_ms.max(s);
    }
    if count == 0 {
        return None;
    }
    Some(MetricSummary {
        count,
        min_ms,
        max_ms,
        avg_ms: total / count as f64,
    })
}

/// Shared services handed to session machines.
#[derive(Clone)]
pub struct Services {
    pub errors: Arc<ErrorReporter>,
    pub perf: Arc<PerformanceMonitor>,
}

impl Default for Services {
    fn default() -> Self {
        Self::from_features(&FeatureFlags::default())
    }
}

impl Services {
    pub fn from_features(features: &FeatureFlags) -> Self {
        Self {
            errors: Arc::new(ErrorReporter::new(features.enable_error_reporting)),
            perf: Arc::new(PerformanceMonitor::new(features.enable_performance_monitoring)),
        }
    }

    /// Flush metric summaries to the log.
    pub fn shutdown(&self) {
        let mut summaries: Vec<_> = self.perf.summaries().into_iter().collect();
        summaries.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, s) in summaries {
            info!(
                metric = %name,
                count = s.count,
                avg_ms = s.avg_ms,
                max_ms = s.max_ms,
                "Performance summary"
            );
        }
        info!("Services shut down ({} error report(s))", self.errors.len());
    }
}
