//! Prometheus exposition of scrape results
//!
//! The metric descriptors are fixed at startup in a [`MetricSchema`]. Every
//! scrape builds fresh gauge families from its samples, so nothing from a
//! previous scrape can leak into the next one.

use crate::models::{MetricKind, MetricSample, SampleLabels};
use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};

/// Default metric name prefix
pub const DEFAULT_METRIC_PREFIX: &str = "container";

/// Name, help text and labels of one GPU gauge
#[derive(Debug, Clone)]
pub struct MetricDescriptor {
    pub kind: MetricKind,
    pub name: String,
    pub help: &'static str,
}

/// Immutable set of descriptors for the three GPU gauges
#[derive(Debug, Clone)]
pub struct MetricSchema {
    descriptors: Vec<MetricDescriptor>,
    const_labels: Vec<(String, String)>,
}

impl MetricSchema {
    pub fn new(prefix: &str) -> Self {
        let descriptors = MetricKind::ALL
            .iter()
            .map(|&kind| {
                let (suffix, help) = match kind {
                    MetricKind::MemoryUsedBytes => (
                        "gpu_memory_used_bytes",
                        "Total accelerator memory allocated in bytes.",
                    ),
                    MetricKind::MemoryTotalBytes => (
                        "gpu_memory_total_bytes",
                        "Total accelerator memory in bytes.",
                    ),
                    MetricKind::DutyCycle => (
                        "gpu_duty_cycle",
                        "Percent of time over the past 10s during which the accelerator was actively processing",
                    ),
                };
                MetricDescriptor {
                    kind,
                    name: format!("{}_{}", prefix, suffix),
                    help,
                }
            })
            .collect();

        Self {
            descriptors,
            const_labels: vec![("make".to_string(), "nvidia".to_string())],
        }
    }

    pub fn descriptors(&self) -> &[MetricDescriptor] {
        &self.descriptors
    }

    fn gauge_vec(&self, descriptor: &MetricDescriptor) -> prometheus::Result<GaugeVec> {
        let opts = self
            .const_labels
            .iter()
            .fold(Opts::new(descriptor.name.clone(), descriptor.help), |opts, (k, v)| {
                opts.const_label(k.clone(), v.clone())
            });
        GaugeVec::new(opts, &SampleLabels::NAMES)
    }

    /// Build metric families from one scrape's samples
    ///
    /// Families without samples are omitted, matching a collector that simply
    /// emits nothing for a failed device.
    pub fn families(&self, samples: &[MetricSample]) -> prometheus::Result<Vec<MetricFamily>> {
        let mut families = Vec::new();

        for descriptor in &self.descriptors {
            let mut matching = samples.iter().filter(|s| s.kind == descriptor.kind).peekable();
            if matching.peek().is_none() {
                continue;
            }

            let gauges = self.gauge_vec(descriptor)?;
            for sample in matching {
                gauges
                    .get_metric_with_label_values(&sample.labels.values())?
                    .set(sample.value);
            }
            families.extend(gauges.collect());
        }

        Ok(families)
    }
}

impl Default for MetricSchema {
    fn default() -> Self {
        Self::new(DEFAULT_METRIC_PREFIX)
    }
}
