//! 解析性能监控
//!
//! 包裹每一次解析（含嵌套解析）并按服务累计计数，只观察，不影响解析结果。

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::config::MonitorConfig;
use crate::container::ServiceKey;

/// [`ServiceMonitor::start_resolve`] 返回的计时句柄
#[derive(Debug)]
pub struct ResolveTicket {
    key: ServiceKey,
    name: String,
    started: Instant,
}

impl ResolveTicket {
    pub fn key(&self) -> ServiceKey {
        self.key
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[derive(Debug, Clone)]
struct MetricRecord {
    display_name: String,
    total_resolves: u64,
    error_count: u64,
    total_duration: Duration,
    min_duration: Duration,
    max_duration: Duration,
    last_error: Option<String>,
    last_resolved_at: Option<DateTime<Utc>>,
}

impl MetricRecord {
    fn new(display_name: String) -> Self {
        Self {
            display_name,
            total_resolves: 0,
            error_count: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            last_error: None,
            last_resolved_at: None,
        }
    }

    fn average(&self) -> Duration {
        if self.total_resolves == 0 {
            Duration::ZERO
        } else {
            let nanos = self.total_duration.as_nanos() / u128::from(self.total_resolves);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
    }
}

/// 单个服务的指标快照
#[derive(Debug, Clone, Serialize)]
pub struct ServiceMetrics {
    pub service: String,
    pub display_name: String,
    pub total_resolves: u64,
    pub error_count: u64,
    pub total_duration_us: f64,
    pub average_duration_us: f64,
    pub min_duration_us: f64,
    pub max_duration_us: f64,
    pub last_error: Option<String>,
    pub last_resolved_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct MetricsExport {
    generated_at: DateTime<Utc>,
    total_resolves: u64,
    total_errors: u64,
    services: Vec<ServiceMetrics>,
}

/// 服务监控器
pub struct ServiceMonitor {
    enabled: AtomicBool,
    slow_resolve_threshold: Duration,
    records: DashMap<ServiceKey, MetricRecord>,
}

impl ServiceMonitor {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            slow_resolve_threshold: config.slow_resolve_threshold,
            records: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// 开始一次解析计时
    pub fn start_resolve(&self, key: ServiceKey, name: &str) -> ResolveTicket {
        ResolveTicket {
            key,
            name: name.to_string(),
            started: Instant::now(),
        }
    }

    /// 结束解析计时并累计到该服务的指标中
    pub fn end_resolve(
        &self,
        ticket: ResolveTicket,
        success: bool,
        error_message: Option<&str>,
    ) -> Duration {
        let duration = ticket.started.elapsed();
        if !self.is_enabled() {
            return duration;
        }

        if duration > self.slow_resolve_threshold {
            tracing::warn!(
                service = %ticket.key,
                duration_us = duration.as_micros() as u64,
                threshold_us = self.slow_resolve_threshold.as_micros() as u64,
                "Slow service resolution"
            );
        }

        let mut record = self
            .records
            .entry(ticket.key)
            .or_insert_with(|| MetricRecord::new(ticket.name.clone()));
        record.display_name = ticket.name;
        record.total_resolves += 1;
        record.total_duration += duration;
        record.min_duration = record.min_duration.min(duration);
        record.max_duration = record.max_duration.max(duration);
        record.last_resolved_at = Some(Utc::now());
        if !success {
            record.error_count += 1;
            record.last_error = error_message.map(str::to_string);
        }
        duration
    }

    pub fn metrics(&self, key: &ServiceKey) -> Option<ServiceMetrics> {
        self.records.get(key).map(|record| snapshot(key, &record))
    }

    /// 所有被观察的服务，按解析次数降序
    pub fn all_metrics(&self) -> Vec<ServiceMetrics> {
        let mut metrics: Vec<ServiceMetrics> = self
            .records
            .iter()
            .map(|entry| snapshot(entry.key(), entry.value()))
            .collect();
        metrics.sort_by(|a, b| {
            b.total_resolves
                .cmp(&a.total_resolves)
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        metrics
    }

    pub fn total_resolves(&self) -> u64 {
        self.records.iter().map(|r| r.total_resolves).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.records.iter().map(|r| r.error_count).sum()
    }

    pub fn generate_performance_report(&self) -> String {
        let metrics = self.all_metrics();
        if metrics.is_empty() {
            return "DI Performance Report: no resolutions recorded".to_string();
        }

        let mut report = String::new();
        report.push_str("DI Performance Report\n");
        report.push_str("=====================\n");
        report.push_str(&format!(
            "Services observed: {} | Total resolves: {} | Errors: {}\n\n",
            metrics.len(),
            self.total_resolves(),
            self.total_errors()
        ));
        report.push_str(&format!(
            "{:<32} {:>9} {:>12} {:>12} {:>7}\n",
            "Service", "Resolves", "Avg (us)", "Max (us)", "Errors"
        ));
        for m in &metrics {
            report.push_str(&format!(
                "{:<32} {:>9} {:>12.1} {:>12.1} {:>7}\n",
                truncate(&m.display_name, 32),
                m.total_resolves,
                m.average_duration_us,
                m.max_duration_us,
                m.error_count
            ));
        }
        report
    }

    pub fn export_metrics_as_json(&self) -> serde_json::Result<String> {
        let export = MetricsExport {
            generated_at: Utc::now(),
            total_resolves: self.total_resolves(),
            total_errors: self.total_errors(),
            services: self.all_metrics(),
        };
        serde_json::to_string_pretty(&export)
    }

    pub fn clear(&self) {
        self.records.clear();
    }
}

fn snapshot(key: &ServiceKey, record: &MetricRecord) -> ServiceMetrics {
    let micros = |d: Duration| d.as_secs_f64() * 1_000_000.0;
    ServiceMetrics {
        service: key.type_name().to_string(),
        display_name: record.display_name.clone(),
        total_resolves: record.total_resolves,
        error_count: record.error_count,
        total_duration_us: micros(record.total_duration),
        average_duration_us: micros(record.average()),
        min_duration_us: if record.total_resolves == 0 {
            0.0
        } else {
            micros(record.min_duration)
        },
        max_duration_us: micros(record.max_duration),
        last_error: record.last_error.clone(),
        last_resolved_at: record.last_resolved_at,
    }
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        name.to_string()
    } else {
        let kept: String = name.chars().take(width - 3).collect();
        format!("{kept}...")
    }
}
