//! Tests for the inventory/telemetry join
//!
//! Both leaves are replaced by in-memory mocks so every failure path can be
//! driven deterministically.

use super::*;
use crate::error::{InventoryError, StatsQuery, TelemetryError};
use crate::models::{FailureKind, MetricKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Inventory mock returning a fixed snapshot, an error, or hanging
enum InventoryBehavior {
    Assignments(Vec<DeviceAssignment>),
    Fail,
    Hang,
}

struct MockInventory {
    behavior: InventoryBehavior,
    call_count: AtomicUsize,
}

impl MockInventory {
    fn new(behavior: InventoryBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            call_count: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl InventorySource for MockInventory {
    async fn list_assignments(&self) -> Result<Vec<DeviceAssignment>, InventoryError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            InventoryBehavior::Assignments(assignments) => Ok(assignments.clone()),
            InventoryBehavior::Fail => Err(InventoryError::Rpc(tonic::Status::unavailable(
                "kubelet socket closed",
            ))),
            InventoryBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(vec![])
            }
        }
    }
}

/// Telemetry mock keyed by device id; unknown ids fail like a missing handle
struct MockTelemetry {
    stats: HashMap<String, DeviceStats>,
    failing: HashMap<String, StatsQuery>,
    slow: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MockTelemetry {
    fn new() -> Self {
        Self {
            stats: HashMap::new(),
            failing: HashMap::new(),
            slow: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_device(mut self, id: &str, stats: DeviceStats) -> Self {
        self.stats.insert(id.to_string(), stats);
        self
    }

    fn with_failing(mut self, id: &str, query: StatsQuery) -> Self {
        self.failing.insert(id.to_string(), query);
        self
    }

    fn with_slow(mut self, id: &str) -> Self {
        self.slow.push(id.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelemetrySource for MockTelemetry {
    async fn get_stats(&self, device_id: &str) -> Result<DeviceStats, TelemetryError> {
        self.calls.lock().unwrap().push(device_id.to_string());

        if self.slow.iter().any(|id| id == device_id) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if let Some(query) = self.failing.get(device_id) {
            return Err(TelemetryError::query_failed(*query, "nvml error"));
        }

        let id = crate::telemetry::DeviceId::parse(device_id)?;
        self.stats
            .get(device_id)
            .cloned()
            .ok_or(TelemetryError::DeviceNotFound(id.minor()))
    }

    fn stop(&self) {}
}

fn assignment(pod: &str, ns: &str, container: &str, resource: &str, device: &str) -> DeviceAssignment {
    DeviceAssignment {
        pod_name: pod.to_string(),
        pod_namespace: ns.to_string(),
        container_name: container.to_string(),
        resource_name: resource.to_string(),
        device_id: device.to_string(),
    }
}

fn gpu(pod: &str, container: &str, device: &str) -> DeviceAssignment {
    assignment(pod, "default", container, NVIDIA_RESOURCE_NAME, device)
}

fn stats(model: &str, uuid: &str, total: u64, used: u64, duty: u64) -> DeviceStats {
    DeviceStats {
        model: model.to_string(),
        id: uuid.to_string(),
        memory_total_bytes: total,
        memory_used_bytes: used,
        duty_cycle_percent: duty,
    }
}

fn collector(inventory: Arc<MockInventory>, telemetry: Arc<MockTelemetry>) -> GpuCollector {
    GpuCollector::new(inventory, telemetry, CollectorConfig::default())
}

fn value_of(report: &CollectReport, kind: MetricKind, pod: &str) -> Option<f64> {
    report
        .samples
        .iter()
        .find(|s| s.kind == kind && s.labels.pod_name == pod)
        .map(|s| s.value)
}

#[tokio::test]
async fn test_single_device_end_to_end() {
    let inventory = MockInventory::new(InventoryBehavior::Assignments(vec![assignment(
        "p1",
        "ns1",
        "c1",
        NVIDIA_RESOURCE_NAME,
        "nvidia0",
    )]));
    let telemetry = Arc::new(MockTelemetry::new().with_device(
        "nvidia0",
        stats("Tesla-X", "GPU-uuid-1", 16_000_000_000, 4_000_000_000, 37),
    ));

    let report = collector(inventory, telemetry).collect().await;

    assert!(report.failures.is_empty());
    assert_eq!(report.samples.len(), 3);

    let kinds: Vec<_> = report.samples.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, MetricKind::ALL.to_vec());
    assert_eq!(report.samples[0].value, 4e9);
    assert_eq!(report.samples[1].value, 1.6e10);
    assert_eq!(report.samples[2].value, 37.0);

    let expected = SampleLabels {
        model: "Tesla-X".to_string(),
        id: "GPU-uuid-1".to_string(),
        container_name: "c1".to_string(),
        pod_name: "p1".to_string(),
        pod_namespace: "ns1".to_string(),
    };
    assert!(report.samples.iter().all(|s| s.labels == expected));
}

#[tokio::test]
async fn test_all_devices_succeed_emits_three_per_assignment() {
    let inventory = MockInventory::new(InventoryBehavior::Assignments(vec![
        gpu("p1", "c1", "nvidia0"),
        gpu("p2", "c2", "nvidia1"),
        gpu("p3", "c3", "nvidia2"),
    ]));
    let telemetry = Arc::new(
        MockTelemetry::new()
            .with_device("nvidia0", stats("A100", "GPU-0", 100, 10, 5))
            .with_device("nvidia1", stats("A100", "GPU-1", 100, 20, 6))
            .with_device("nvidia2", stats("A100", "GPU-2", 100, 30, 7)),
    );

    let report = collector(inventory, telemetry.clone()).collect().await;

    assert_eq!(report.samples.len(), 9);
    assert_eq!(report.devices_reported(), 3);
    assert!(report.failures.is_empty());
    assert_eq!(telemetry.calls(), vec!["nvidia0", "nvidia1", "nvidia2"]);

    // Each device's samples are contiguous and labeled from its own assignment
    for (chunk, pod) in report.samples.chunks(3).zip(["p1", "p2", "p3"]) {
        assert!(chunk.iter().all(|s| s.labels.pod_name == pod));
    }
    assert_eq!(value_of(&report, MetricKind::MemoryUsedBytes, "p2"), Some(20.0));
    assert_eq!(value_of(&report, MetricKind::DutyCycle, "p3"), Some(7.0));
}

#[tokio::test]
async fn test_inventory_failure_yields_no_samples() {
    let inventory = MockInventory::new(InventoryBehavior::Fail);
    let telemetry = Arc::new(MockTelemetry::new());

    let report = collector(inventory.clone(), telemetry.clone()).collect().await;

    assert!(report.samples.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, FailureKind::InventoryUnavailable);
    assert!(report.failures[0].device_id.is_none());
    assert!(report.inventory_failed());
    assert_eq!(inventory.call_count.load(Ordering::SeqCst), 1);
    assert!(telemetry.calls().is_empty());
}

#[tokio::test]
async fn test_inventory_timeout_yields_no_samples() {
    let inventory = MockInventory::new(InventoryBehavior::Hang);
    let telemetry = Arc::new(MockTelemetry::new());

    let collector = GpuCollectorBuilder::new()
        .inventory(inventory)
        .telemetry(telemetry.clone())
        .inventory_timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let report = collector.collect().await;

    assert!(report.samples.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, FailureKind::InventoryUnavailable);
    assert!(report.failures[0].message.contains("timed out"));
    assert!(telemetry.calls().is_empty());
}

#[tokio::test]
async fn test_one_failing_device_is_isolated() {
    let inventory = MockInventory::new(InventoryBehavior::Assignments(vec![
        gpu("p1", "c1", "nvidia0"),
        gpu("p2", "c2", "nvidia1"),
        gpu("p3", "c3", "nvidia2"),
    ]));
    let telemetry = Arc::new(
        MockTelemetry::new()
            .with_device("nvidia0", stats("T4", "GPU-0", 100, 10, 1))
            .with_failing("nvidia1", StatsQuery::MemoryInfo)
            .with_device("nvidia2", stats("T4", "GPU-2", 100, 30, 3)),
    );

    let report = collector(inventory, telemetry).collect().await;

    assert_eq!(report.samples.len(), 6);
    assert!(value_of(&report, MetricKind::MemoryUsedBytes, "p2").is_none());
    assert_eq!(value_of(&report, MetricKind::MemoryUsedBytes, "p3"), Some(30.0));

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.kind, FailureKind::TelemetryQueryFailed);
    assert_eq!(failure.device_id.as_deref(), Some("nvidia1"));
    assert_eq!(failure.pod_name.as_deref(), Some("p2"));
    assert_eq!(failure.container_name.as_deref(), Some("c2"));
    assert!(failure.message.contains("memory info"));
}

#[tokio::test]
async fn test_failure_kinds_per_device() {
    let inventory = MockInventory::new(InventoryBehavior::Assignments(vec![
        gpu("p1", "c1", "gpu0"),
        gpu("p2", "c2", "nvidia9"),
        gpu("p3", "c3", "nvidia0"),
    ]));
    let telemetry = Arc::new(MockTelemetry::new().with_device("nvidia0", stats("T4", "GPU-0", 1, 1, 1)));

    let report = collector(inventory, telemetry).collect().await;

    assert_eq!(report.samples.len(), 3);
    let kinds: Vec<_> = report.failures.iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![FailureKind::DeviceIdentifierInvalid, FailureKind::DeviceNotFound]
    );
}

#[tokio::test]
async fn test_slow_device_times_out_without_blocking_others() {
    let inventory = MockInventory::new(InventoryBehavior::Assignments(vec![
        gpu("p1", "c1", "nvidia0"),
        gpu("p2", "c2", "nvidia1"),
    ]));
    let telemetry = Arc::new(
        MockTelemetry::new()
            .with_slow("nvidia0")
            .with_device("nvidia0", stats("T4", "GPU-0", 1, 1, 1))
            .with_device("nvidia1", stats("T4", "GPU-1", 2, 2, 2)),
    );

    let collector = GpuCollectorBuilder::new()
        .inventory(inventory)
        .telemetry(telemetry)
        .telemetry_timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let report = collector.collect().await;

    assert_eq!(report.samples.len(), 3);
    assert!(report.samples.iter().all(|s| s.labels.pod_name == "p2"));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, FailureKind::TelemetryQueryFailed);
    assert_eq!(report.failures[0].device_id.as_deref(), Some("nvidia0"));
}

#[tokio::test]
async fn test_non_accelerator_resources_are_skipped() {
    let inventory = MockInventory::new(InventoryBehavior::Assignments(vec![
        assignment("p1", "default", "c1", "example.com/nic", "nvidia0"),
        assignment("p1", "default", "c1", "cpu", "0"),
        gpu("p2", "c2", "nvidia1"),
    ]));
    let telemetry = Arc::new(
        MockTelemetry::new()
            .with_device("nvidia0", stats("T4", "GPU-0", 1, 1, 1))
            .with_device("nvidia1", stats("T4", "GPU-1", 2, 2, 2)),
    );

    let report = collector(inventory, telemetry.clone()).collect().await;

    assert_eq!(telemetry.calls(), vec!["nvidia1"]);
    assert_eq!(report.samples.len(), 3);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_custom_resource_name() {
    let inventory = MockInventory::new(InventoryBehavior::Assignments(vec![
        gpu("p1", "c1", "nvidia0"),
        assignment("p2", "default", "c2", "nvidia.com/mig-1g.5gb", "nvidia1"),
    ]));
    let telemetry = Arc::new(
        MockTelemetry::new()
            .with_device("nvidia0", stats("A100", "GPU-0", 1, 1, 1))
            .with_device("nvidia1", stats("A100", "GPU-1", 2, 2, 2)),
    );

    let collector = GpuCollectorBuilder::new()
        .inventory(inventory)
        .telemetry(telemetry.clone())
        .resource_name("nvidia.com/mig-1g.5gb")
        .build()
        .unwrap();

    let report = collector.collect().await;

    assert_eq!(telemetry.calls(), vec!["nvidia1"]);
    assert_eq!(report.samples.len(), 3);
    assert_eq!(report.samples[0].labels.pod_name, "p2");
}

#[tokio::test]
async fn test_shared_device_is_queried_per_assignment() {
    let inventory = MockInventory::new(InventoryBehavior::Assignments(vec![
        gpu("p1", "c1", "nvidia0"),
        gpu("p1", "c2", "nvidia0"),
    ]));
    let telemetry = Arc::new(MockTelemetry::new().with_device("nvidia0", stats("T4", "GPU-0", 8, 4, 50)));

    let report = collector(inventory, telemetry.clone()).collect().await;

    assert_eq!(telemetry.calls(), vec!["nvidia0", "nvidia0"]);
    assert_eq!(report.samples.len(), 6);
    assert_eq!(report.samples[0].labels.container_name, "c1");
    assert_eq!(report.samples[3].labels.container_name, "c2");
}

#[tokio::test]
async fn test_repeated_collects_are_equal() {
    let inventory = MockInventory::new(InventoryBehavior::Assignments(vec![
        gpu("p1", "c1", "nvidia0"),
        gpu("p2", "c2", "bogus"),
    ]));
    let telemetry = Arc::new(MockTelemetry::new().with_device("nvidia0", stats("T4", "GPU-0", 8, 4, 50)));
    let collector = collector(inventory.clone(), telemetry);

    let first = collector.collect().await;
    let second = collector.collect().await;

    assert_eq!(first, second);
    assert_eq!(inventory.call_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_empty_inventory() {
    let inventory = MockInventory::new(InventoryBehavior::Assignments(vec![]));
    let telemetry = Arc::new(MockTelemetry::new());

    let report = collector(inventory, telemetry.clone()).collect().await;

    assert_eq!(report, CollectReport::default());
    assert!(telemetry.calls().is_empty());
}

#[tokio::test]
async fn test_concurrent_collects_are_independent() {
    let inventory = MockInventory::new(InventoryBehavior::Assignments(vec![
        gpu("p1", "c1", "nvidia0"),
        gpu("p2", "c2", "nvidia1"),
    ]));
    let telemetry = Arc::new(
        MockTelemetry::new()
            .with_device("nvidia0", stats("T4", "GPU-0", 1, 1, 1))
            .with_device("nvidia1", stats("T4", "GPU-1", 2, 2, 2)),
    );
    let collector = Arc::new(collector(inventory, telemetry));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let collector = Arc::clone(&collector);
            tokio::spawn(async move { collector.collect().await })
        })
        .collect();

    for handle in handles {
        let report = handle.await.unwrap();
        assert_eq!(report.samples.len(), 6);
        assert!(report.failures.is_empty());
    }
}

#[test]
fn test_collector_config_default() {
    let config = CollectorConfig::default();
    assert_eq!(config.resource_name, "nvidia.com/gpu");
    assert_eq!(config.inventory_timeout, Duration::from_secs(10));
    assert_eq!(config.telemetry_timeout, Duration::from_secs(10));
}

#[test]
fn test_builder_requires_both_sources() {
    let telemetry = Arc::new(MockTelemetry::new());
    assert!(GpuCollectorBuilder::new().telemetry(telemetry).build().is_err());

    let inventory = MockInventory::new(InventoryBehavior::Fail);
    assert!(GpuCollectorBuilder::new().inventory(inventory).build().is_err());
}
