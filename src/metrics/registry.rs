//! Process-wide metric registry.
//!
//! Counters and histograms are registered once at startup and handed out as
//! cheaply clonable handles backed by atomics, so any component can record
//! without coordination. `snapshot()` copies all current values into an
//! immutable [`RegistrySnapshot`] that is safe to read while increments
//! continue on other tasks. Increments are atomic per metric; a snapshot may
//! observe different metrics at slightly different instants.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;

/// Errors raised while building the metric set. These are configuration
/// conflicts and are only ever produced at startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("metric '{0}' is already registered")]
    Duplicate(String),
    #[error("metric '{0}' has an invalid bucket list: bounds must be finite and strictly ascending")]
    InvalidBuckets(String),
}

#[derive(Debug, Default)]
struct CounterCore {
    value: AtomicU64,
}

impl CounterCore {
    fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A monotonically non-decreasing counter handle.
#[derive(Clone)]
pub struct Counter {
    core: Arc<CounterCore>,
}

impl Counter {
    pub fn inc(&self) {
        self.core.inc();
    }

    pub fn get(&self) -> u64 {
        self.core.get()
    }
}

#[derive(Debug)]
struct HistogramCore {
    // Upper bounds, strictly ascending. Bucket counts are cumulative: an
    // observation of v increments every bucket whose bound is >= v.
    bounds: Arc<[f64]>,
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    sum_bits: AtomicU64,
}

impl HistogramCore {
    fn new(bounds: Arc<[f64]>) -> Self {
        let buckets = bounds.iter().map(|_| AtomicU64::new(0)).collect();
        HistogramCore {
            bounds,
            buckets,
            count: AtomicU64::new(0),
            sum_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn observe(&self, value: f64) {
        for (bound, bucket) in self.bounds.iter().zip(self.buckets.iter()) {
            if value <= *bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.count.fetch_add(1, Ordering::Relaxed);

        let mut current = self.sum_bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self.sum_bits.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let buckets = self
            .bounds
            .iter()
            .zip(self.buckets.iter())
            .map(|(bound, bucket)| (*bound, bucket.load(Ordering::Relaxed)))
            .collect();
        HistogramSnapshot {
            buckets,
            count: self.count.load(Ordering::Relaxed),
            sum: f64::from_bits(self.sum_bits.load(Ordering::Relaxed)),
        }
    }
}

/// A histogram handle with fixed bucket bounds.
#[derive(Clone, Debug)]
pub struct Histogram {
    core: Arc<HistogramCore>,
}

impl Histogram {
    pub fn observe(&self, value: f64) {
        self.core.observe(value);
    }
}

struct CounterVecCore {
    label_names: Vec<String>,
    series: RwLock<BTreeMap<Vec<String>, Arc<CounterCore>>>,
}

/// A family of counters distinguished by label values.
#[derive(Clone)]
pub struct CounterVec {
    core: Arc<CounterVecCore>,
}

impl CounterVec {
    /// Returns the counter for the given label values, creating the series on
    /// first use. Panics if the number of values does not match the number of
    /// label names declared at registration.
    pub fn with_label_values(&self, values: &[&str]) -> Counter {
        Counter {
            core: lookup_series(&self.core.label_names, &self.core.series, values, || {
                Arc::new(CounterCore::default())
            }),
        }
    }
}

struct HistogramVecCore {
    label_names: Vec<String>,
    bounds: Arc<[f64]>,
    series: RwLock<BTreeMap<Vec<String>, Arc<HistogramCore>>>,
}

/// A family of histograms distinguished by label values, sharing one bucket
/// bound list.
#[derive(Clone)]
pub struct HistogramVec {
    core: Arc<HistogramVecCore>,
}

impl HistogramVec {
    pub fn with_label_values(&self, values: &[&str]) -> Histogram {
        let bounds = self.core.bounds.clone();
        Histogram {
            core: lookup_series(&self.core.label_names, &self.core.series, values, move || {
                Arc::new(HistogramCore::new(bounds.clone()))
            }),
        }
    }
}

fn lookup_series<T>(
    label_names: &[String],
    series: &RwLock<BTreeMap<Vec<String>, Arc<T>>>,
    values: &[&str],
    create: impl Fn() -> Arc<T>,
) -> Arc<T> {
    assert_eq!(
        values.len(),
        label_names.len(),
        "label value count does not match label names {:?}",
        label_names
    );
    let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    if let Some(existing) = series
        .read()
        .expect("metric series lock poisoned")
        .get(&key)
    {
        return existing.clone();
    }
    let mut map = series.write().expect("metric series lock poisoned");
    map.entry(key).or_insert_with(create).clone()
}

enum Metric {
    Counter { help: String, core: Arc<CounterCore> },
    CounterVec { help: String, core: Arc<CounterVecCore> },
    Histogram { help: String, core: Arc<HistogramCore> },
    HistogramVec { help: String, core: Arc<HistogramVecCore> },
}

/// The process-scoped registry. Created once at startup and shared by handle;
/// metrics are never removed.
pub struct MetricsRegistry {
    metrics: Mutex<BTreeMap<String, Metric>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        MetricsRegistry {
            metrics: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn register_counter(&self, name: &str, help: &str) -> Result<Counter, RegistryError> {
        let core = Arc::new(CounterCore::default());
        self.insert(
            name,
            Metric::Counter {
                help: help.to_string(),
                core: core.clone(),
            },
        )?;
        Ok(Counter { core })
    }

    pub fn register_counter_vec(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<CounterVec, RegistryError> {
        let core = Arc::new(CounterVecCore {
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            series: RwLock::new(BTreeMap::new()),
        });
        self.insert(
            name,
            Metric::CounterVec {
                help: help.to_string(),
                core: core.clone(),
            },
        )?;
        Ok(CounterVec { core })
    }

    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        buckets: &[f64],
    ) -> Result<Histogram, RegistryError> {
        let bounds = validate_buckets(name, buckets)?;
        let core = Arc::new(HistogramCore::new(bounds));
        self.insert(
            name,
            Metric::Histogram {
                help: help.to_string(),
                core: core.clone(),
            },
        )?;
        Ok(Histogram { core })
    }

    pub fn register_histogram_vec(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Result<HistogramVec, RegistryError> {
        let bounds = validate_buckets(name, buckets)?;
        let core = Arc::new(HistogramVecCore {
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            bounds,
            series: RwLock::new(BTreeMap::new()),
        });
        self.insert(
            name,
            Metric::HistogramVec {
                help: help.to_string(),
                core: core.clone(),
            },
        )?;
        Ok(HistogramVec { core })
    }

    fn insert(&self, name: &str, metric: Metric) -> Result<(), RegistryError> {
        let mut metrics = self.metrics.lock().expect("metric registry lock poisoned");
        if metrics.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        metrics.insert(name.to_string(), metric);
        Ok(())
    }

    /// Copies every registered metric into an immutable snapshot, sorted by
    /// metric name with labeled series sorted by label values.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let metrics = self.metrics.lock().expect("metric registry lock poisoned");
        let families = metrics
            .iter()
            .map(|(name, metric)| snapshot_family(name, metric))
            .collect();
        RegistrySnapshot { families }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_buckets(name: &str, buckets: &[f64]) -> Result<Arc<[f64]>, RegistryError> {
    let ascending = buckets
        .windows(2)
        .all(|pair| pair[0] < pair[1]);
    if buckets.is_empty() || !ascending || buckets.iter().any(|b| !b.is_finite()) {
        return Err(RegistryError::InvalidBuckets(name.to_string()));
    }
    Ok(buckets.into())
}

fn snapshot_family(name: &str, metric: &Metric) -> MetricFamily {
    match metric {
        Metric::Counter { help, core } => MetricFamily {
            name: name.to_string(),
            help: help.clone(),
            kind: MetricKind::Counter,
            samples: vec![Sample {
                labels: Vec::new(),
                value: SampleValue::Counter(core.get()),
            }],
        },
        Metric::CounterVec { help, core } => MetricFamily {
            name: name.to_string(),
            help: help.clone(),
            kind: MetricKind::Counter,
            samples: snapshot_series(core.label_names.as_slice(), &core.series, |c| {
                SampleValue::Counter(c.get())
            }),
        },
        Metric::Histogram { help, core } => MetricFamily {
            name: name.to_string(),
            help: help.clone(),
            kind: MetricKind::Histogram,
            samples: vec![Sample {
                labels: Vec::new(),
                value: SampleValue::Histogram(core.snapshot()),
            }],
        },
        Metric::HistogramVec { help, core } => MetricFamily {
            name: name.to_string(),
            help: help.clone(),
            kind: MetricKind::Histogram,
            samples: snapshot_series(core.label_names.as_slice(), &core.series, |h| {
                SampleValue::Histogram(h.snapshot())
            }),
        },
    }
}

fn snapshot_series<T>(
    label_names: &[String],
    series: &RwLock<BTreeMap<Vec<String>, Arc<T>>>,
    value: impl Fn(&T) -> SampleValue,
) -> Vec<Sample> {
    series
        .read()
        .expect("metric series lock poisoned")
        .iter()
        .map(|(values, core)| Sample {
            labels: label_names
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect(),
            value: value(core),
        })
        .collect()
}

/// An immutable point-in-time copy of the registry, ordered by metric name.
pub struct RegistrySnapshot {
    pub families: Vec<MetricFamily>,
}

impl RegistrySnapshot {
    /// Looks up an unlabeled counter value, mostly useful in tests.
    pub fn counter_value(&self, name: &str) -> Option<u64> {
        self.families
            .iter()
            .find(|family| family.name == name)
            .and_then(|family| family.samples.first())
            .and_then(|sample| match sample.value {
                SampleValue::Counter(v) => Some(v),
                _ => None,
            })
    }
}

pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub samples: Vec<Sample>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MetricKind {
    Counter,
    Histogram,
}

pub struct Sample {
    pub labels: Vec<(String, String)>,
    pub value: SampleValue,
}

pub enum SampleValue {
    Counter(u64),
    Histogram(HistogramSnapshot),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// (upper bound, cumulative count) pairs in ascending bound order.
    pub buckets: Vec<(f64, u64)>,
    pub count: u64,
    pub sum: f64,
}
