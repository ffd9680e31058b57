//! 服务健康检查
//!
//! 解析失败被转换为健康状态而不是向上传播。周期检查由宿主通过
//! [`HealthChecker::update`] 驱动，按单调时钟的上次运行时间与配置间隔比较。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::config::HealthCheckConfig;
use crate::container::ServiceKey;
use crate::errors::ContainerError;
use crate::logging::OperationTimer;

/// 单个服务或整个容器的健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Degraded => "Degraded",
            HealthStatus::Unhealthy => "Unhealthy",
        };
        f.write_str(label)
    }
}

/// 单个服务的检查结果
#[derive(Debug, Clone, Serialize)]
pub struct HealthResult {
    pub service: String,
    pub status: HealthStatus,
    pub message: String,
    pub response_time: Duration,
    pub checked_at: DateTime<Utc>,
}

/// 健康检查的探测目标，由容器实现
pub trait HealthProbe: Send + Sync {
    /// 所有已注册的服务键
    fn registered_keys(&self) -> Vec<ServiceKey>;

    /// 尝试解析 `key`
    fn probe(&self, key: ServiceKey) -> Result<(), ContainerError>;

    fn display_name(&self, key: &ServiceKey) -> String {
        key.short_name()
    }
}

#[derive(Debug, Default)]
struct AutoCheckState {
    enabled: bool,
    last_run: Option<Instant>,
}

pub struct HealthChecker {
    config: HealthCheckConfig,
    results: RwLock<HashMap<ServiceKey, HealthResult>>,
    auto: Mutex<AutoCheckState>,
}

impl HealthChecker {
    pub fn new(config: HealthCheckConfig) -> Self {
        let auto = AutoCheckState {
            enabled: config.auto_check_on_start,
            last_run: None,
        };
        Self {
            config,
            results: RwLock::new(HashMap::new()),
            auto: Mutex::new(auto),
        }
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// 检查单个服务并分类结果
    pub fn check_service_health(&self, probe: &dyn HealthProbe, key: ServiceKey) -> HealthResult {
        let result = self.evaluate(probe, key);
        self.results.write().insert(key, result.clone());
        result
    }

    /// 检查所有已注册服务，替换上一次的结果
    pub fn check_all_services_health(&self, probe: &dyn HealthProbe) -> HashMap<ServiceKey, HealthResult> {
        let timer = OperationTimer::new("health_sweep");
        let keys = probe.registered_keys();
        let results: HashMap<ServiceKey, HealthResult> = keys
            .iter()
            .map(|key| (*key, self.evaluate(probe, *key)))
            .collect();
        self.publish(&results);
        timer.with_metadata("services", results.len()).finish();
        results
    }

    /// 与 [`check_all_services_health`](Self::check_all_services_health) 相同，
    /// 每个服务之间让出执行器
    pub async fn check_all_services_health_async(
        &self,
        probe: &dyn HealthProbe,
    ) -> HashMap<ServiceKey, HealthResult> {
        let timer = OperationTimer::new("health_sweep_async");
        let keys = probe.registered_keys();
        let mut results = HashMap::with_capacity(keys.len());
        for key in keys {
            results.insert(key, self.evaluate(probe, key));
            tokio::task::yield_now().await;
        }
        self.publish(&results);
        timer.with_metadata("services", results.len()).finish();
        results
    }

    /// 最近结果中最差的状态；没有结果时为 `Healthy`
    pub fn overall_health(&self) -> HealthStatus {
        self.results
            .read()
            .values()
            .map(|r| r.status)
            .max()
            .unwrap_or(HealthStatus::Healthy)
    }

    pub fn last_results(&self) -> HashMap<ServiceKey, HealthResult> {
        self.results.read().clone()
    }

    pub fn result(&self, key: &ServiceKey) -> Option<HealthResult> {
        self.results.read().get(key).cloned()
    }

    pub fn start_auto_check(&self) {
        let mut auto = self.auto.lock();
        auto.enabled = true;
        auto.last_run = None;
        tracing::info!(
            interval_ms = self.config.check_interval.as_millis() as u64,
            "Automatic health checks started"
        );
    }

    pub fn stop_auto_check(&self) {
        self.auto.lock().enabled = false;
        tracing::info!("Automatic health checks stopped");
    }

    pub fn is_auto_check_enabled(&self) -> bool {
        self.auto.lock().enabled
    }

    /// 宿主的一次 tick，返回是否执行了检查
    pub fn update(&self, probe: &dyn HealthProbe) -> bool {
        self.update_at(probe, Instant::now())
    }

    /// 在指定时刻执行一次 tick
    ///
    /// `start_auto_check` 之后的第一次 tick 总会执行检查。
    pub fn update_at(&self, probe: &dyn HealthProbe, now: Instant) -> bool {
        {
            let mut auto = self.auto.lock();
            if !auto.enabled {
                return false;
            }
            let due = match auto.last_run {
                None => true,
                Some(last) => now.saturating_duration_since(last) >= self.config.check_interval,
            };
            if !due {
                return false;
            }
            auto.last_run = Some(now);
        }
        self.check_all_services_health(probe);
        true
    }

    pub fn generate_health_report(&self) -> String {
        let results = self.results.read();
        let mut entries: Vec<&HealthResult> = results.values().collect();
        entries.sort_by(|a, b| {
            b.status
                .cmp(&a.status)
                .then_with(|| a.service.cmp(&b.service))
        });

        let mut report = String::new();
        report.push_str("Container Health Report\n");
        report.push_str("=======================\n");
        report.push_str(&format!(
            "Overall: {} | Services checked: {}\n",
            self.overall_health(),
            entries.len()
        ));
        for result in entries {
            report.push_str(&format!(
                "  [{:<9}] {} ({:.2} ms): {}\n",
                result.status.to_string(),
                result.service,
                result.response_time.as_secs_f64() * 1000.0,
                result.message
            ));
        }
        report
    }

    pub fn clear(&self) {
        self.results.write().clear();
    }

    fn evaluate(&self, probe: &dyn HealthProbe, key: ServiceKey) -> HealthResult {
        let service = probe.display_name(&key);
        let started = Instant::now();
        let outcome = probe.probe(key);
        let response_time = started.elapsed();

        let (status, message) = match outcome {
            Err(err) => (HealthStatus::Unhealthy, err.to_string()),
            Ok(()) if response_time > self.config.timeout => (
                HealthStatus::Unhealthy,
                format!(
                    "resolution exceeded the {} ms time budget",
                    self.config.timeout.as_millis()
                ),
            ),
            Ok(()) if response_time > self.config.degraded_threshold => (
                HealthStatus::Degraded,
                format!(
                    "resolution slower than {} ms",
                    self.config.degraded_threshold.as_millis()
                ),
            ),
            Ok(()) => (HealthStatus::Healthy, "resolved".to_string()),
        };

        if status != HealthStatus::Healthy {
            tracing::warn!(
                service = %service,
                status = %status,
                response_time_ms = response_time.as_millis() as u64,
                message = %message,
                "Service health check did not pass"
            );
        }

        HealthResult {
            service,
            status,
            message,
            response_time,
            checked_at: Utc::now(),
        }
    }

    fn publish(&self, results: &HashMap<ServiceKey, HealthResult>) {
        let mut stored = self.results.write();
        stored.clear();
        stored.extend(results.iter().map(|(k, v)| (*k, v.clone())));
        drop(stored);

        tracing::info!(
            services = results.len(),
            overall = %self.overall_health(),
            "Health sweep completed"
        );
    }
}
