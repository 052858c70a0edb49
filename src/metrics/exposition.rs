//! Rendering of registry snapshots into the Prometheus text exposition
//! format.
//!
//! Output is deterministic: families arrive sorted by name from the registry,
//! labeled series sorted by label values, and an identical snapshot always
//! renders to byte-identical text.

use std::fmt::Write;

use super::registry::{HistogramSnapshot, MetricKind, RegistrySnapshot, SampleValue};

/// The registered media type for the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Renders a snapshot into exposition text.
pub fn render(snapshot: &RegistrySnapshot) -> String {
    let mut out = String::new();
    for family in &snapshot.families {
        let kind = match family.kind {
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
        };
        let _ = writeln!(out, "# HELP {} {}", family.name, family.help);
        let _ = writeln!(out, "# TYPE {} {}", family.name, kind);

        for sample in &family.samples {
            match &sample.value {
                SampleValue::Counter(value) => {
                    let _ = writeln!(
                        out,
                        "{}{} {}",
                        family.name,
                        label_block(&sample.labels, None),
                        value
                    );
                }
                SampleValue::Histogram(h) => {
                    render_histogram(&mut out, &family.name, &sample.labels, h);
                }
            }
        }
    }
    out
}

fn render_histogram(
    out: &mut String,
    name: &str,
    labels: &[(String, String)],
    h: &HistogramSnapshot,
) {
    for (bound, count) in &h.buckets {
        let _ = writeln!(
            out,
            "{}_bucket{} {}",
            name,
            label_block(labels, Some(("le", &format_value(*bound)))),
            count
        );
    }
    let _ = writeln!(
        out,
        "{}_bucket{} {}",
        name,
        label_block(labels, Some(("le", "+Inf"))),
        h.count
    );
    let _ = writeln!(out, "{}_sum{} {}", name, label_block(labels, None), format_value(h.sum));
    let _ = writeln!(out, "{}_count{} {}", name, label_block(labels, None), h.count);
}

/// Formats a `{name="value",...}` block, or an empty string when there are no
/// labels to render.
fn label_block(labels: &[(String, String)], extra: Option<(&str, &str)>) -> String {
    let mut pairs: Vec<String> = labels
        .iter()
        .map(|(name, value)| format!("{}=\"{}\"", name, escape_label_value(value)))
        .collect();
    if let Some((name, value)) = extra {
        pairs.push(format!("{}=\"{}\"", name, escape_label_value(value)));
    }
    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_value(value: f64) -> String {
    format!("{}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::registry::MetricsRegistry;

    #[test]
    fn renders_counters_and_cumulative_buckets_deterministically() {
        let registry = MetricsRegistry::new();
        let counter = registry.register_counter("app_calls", "App calls").unwrap();
        let histogram = registry
            .register_histogram("latency_ms", "Latency in ms", &[1.0, 5.0])
            .unwrap();

        counter.inc();
        counter.inc();
        counter.inc();
        histogram.observe(0.5);
        histogram.observe(2.0);

        let expected = "\
# HELP app_calls App calls
# TYPE app_calls counter
app_calls 3
# HELP latency_ms Latency in ms
# TYPE latency_ms histogram
latency_ms_bucket{le=\"1\"} 1
latency_ms_bucket{le=\"5\"} 2
latency_ms_bucket{le=\"+Inf\"} 2
latency_ms_sum 2.5
latency_ms_count 2
";
        let snapshot = registry.snapshot();
        assert_eq!(render(&snapshot), expected);
        // Stable across repeated renders of the same snapshot.
        assert_eq!(render(&snapshot), render(&snapshot));
    }

    #[test]
    fn renders_labeled_series_with_escaped_values() {
        let registry = MetricsRegistry::new();
        let requests = registry
            .register_counter_vec("requests_total", "Requests", &["route"])
            .unwrap();
        requests.with_label_values(&["/welcome"]).inc();
        requests.with_label_values(&["with\"quote"]).inc();

        let text = render(&registry.snapshot());
        assert!(text.contains("requests_total{route=\"/welcome\"} 1"));
        assert!(text.contains("requests_total{route=\"with\\\"quote\"} 1"));
    }
}
