use crate::domain::types::{LabelSet, RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Gauge descriptor: name, help text and constant labels, all fixed at creation.
///
/// The current value lives inside the registry the gauge is registered into;
/// a gauge belongs to exactly one registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gauge {
    name: String,
    help: String,
    const_labels: LabelSet,
}

impl Gauge {
    /// Creates a new gauge descriptor
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        const_labels: LabelSet,
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            const_labels,
        }
    }

    /// Metric name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Help text rendered on the `# HELP` line
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Labels attached to every sample of this gauge
    pub fn const_labels(&self) -> &LabelSet {
        &self.const_labels
    }
}

/// One sample of a metric: a label combination and its current value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Full label set of this sample (constant labels merged with set labels)
    pub labels: LabelSet,
    /// Current value
    pub value: f64,
}

/// Consistent read-only view of one registered metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Metric name
    pub name: String,
    /// Help text
    pub help: String,
    /// Current samples, empty until the metric is first set
    pub samples: Vec<Sample>,
}

#[derive(Debug)]
struct GaugeState {
    gauge: Gauge,
    values: BTreeMap<LabelSet, f64>,
}

/// Thread-safe metric registry holding the current value of every gauge.
///
/// Registration order is preserved so exposition output is deterministic.
/// A single coarse `RwLock` guards all state: the write rate is a few
/// updates per second, so reader/writer contention is negligible and every
/// snapshot is consistent by construction.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    order: Vec<String>,
    gauges: HashMap<String, GaugeState>,
}

impl MetricRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a gauge.
    ///
    /// Fails with [`RegistryError::DuplicateName`] if a metric with the same
    /// name already exists; the registry is left unchanged on failure.
    pub fn register(&self, gauge: Gauge) -> RegistryResult<()> {
        let mut inner = self.inner.write().expect("Failed to acquire write lock");
        if inner.gauges.contains_key(gauge.name()) {
            return Err(RegistryError::DuplicateName(gauge.name().to_string()));
        }
        let name = gauge.name().to_string();
        inner.order.push(name.clone());
        inner.gauges.insert(
            name,
            GaugeState {
                gauge,
                values: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Atomically updates the value for the given metric and label combination.
    ///
    /// `label_values` are merged over the gauge's constant labels to form the
    /// sample key. Fails with [`RegistryError::UnknownMetric`] if no metric
    /// with that name is registered; nothing is mutated on failure.
    pub fn set(&self, name: &str, label_values: &LabelSet, value: f64) -> RegistryResult<()> {
        let mut inner = self.inner.write().expect("Failed to acquire write lock");
        let state = inner
            .gauges
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownMetric(name.to_string()))?;
        let mut key = state.gauge.const_labels().clone();
        key.extend(
            label_values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        state.values.insert(key, value);
        Ok(())
    }

    /// Produces a consistent view of all registered metrics in registration
    /// order. Metrics never set appear with an empty sample list.
    pub fn snapshot(&self) -> Vec<MetricSnapshot> {
        let inner = self.inner.read().expect("Failed to acquire read lock");
        inner
            .order
            .iter()
            .filter_map(|name| inner.gauges.get(name))
            .map(|state| MetricSnapshot {
                name: state.gauge.name().to_string(),
                help: state.gauge.help().to_string(),
                samples: state
                    .values
                    .iter()
                    .map(|(labels, value)| Sample {
                        labels: labels.clone(),
                        value: *value,
                    })
                    .collect(),
            })
            .collect()
    }

    /// Number of registered metrics
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("Failed to acquire read lock")
            .order
            .len()
    }

    /// Returns true if no metric is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
