//! In-process client metrics.
//!
//! Labelled counters and one latency histogram, stored as atomics in
//! `DashMap`s and rendered in Prometheus text format on demand. Label sets
//! are sorted so the same labels always land on the same series.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn render_labels(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| {
            let v = v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n");
            format!("{k}=\"{v}\"")
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct Counter {
    series: DashMap<LabelKey, AtomicU64>,
}

impl Counter {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.series
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.series
            .get(&label_key(labels))
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        for r in self.series.iter() {
            let _ = writeln!(
                out,
                "{name}{{{}}} {}",
                render_labels(r.key()),
                r.value().load(Ordering::Relaxed)
            );
        }
    }
}

// Request round-trips, in milliseconds.
const BUCKETS_MS: [u64; 8] = [1, 5, 10, 50, 100, 500, 1_000, 5_000];

#[derive(Default)]
struct Buckets {
    count: AtomicU64,
    sum_ms: AtomicU64,
    le: [AtomicU64; BUCKETS_MS.len()],
}

#[derive(Default)]
pub struct LatencyHistogram {
    series: DashMap<LabelKey, Buckets>,
}

impl LatencyHistogram {
    pub fn observe(&self, labels: &[(&str, &str)], elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let b = self.series.entry(label_key(labels)).or_insert_with(Buckets::default);
        b.count.fetch_add(1, Ordering::Relaxed);
        b.sum_ms.fetch_add(ms, Ordering::Relaxed);
        for (i, &le) in BUCKETS_MS.iter().enumerate() {
            if ms <= le {
                b.le[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} histogram");
        for r in self.series.iter() {
            let labels = render_labels(r.key());
            let prefix = if labels.is_empty() { String::new() } else { format!("{labels},") };
            let b = r.value();
            for (i, le) in BUCKETS_MS.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "{name}_bucket{{{prefix}le=\"{le}\"}} {}",
                    b.le[i].load(Ordering::Relaxed)
                );
            }
            let count = b.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"+Inf\"}} {count}");
            let _ = writeln!(out, "{name}_sum{{{labels}}} {}", b.sum_ms.load(Ordering::Relaxed));
            let _ = writeln!(out, "{name}_count{{{labels}}} {count}");
        }
    }
}

#[derive(Default)]
pub struct ClientMetrics {
    /// labels: type, outcome (ok | timeout | closed | error)
    pub requests: Counter,
    pub request_latency: LatencyHistogram,
    /// labels: type
    pub notifications: Counter,
    /// labels: reason (late_reply | unknown_type | no_correlation | malformed)
    pub dropped: Counter,
    /// labels: outcome (ok | failed | stale)
    pub refills: Counter,
}

impl ClientMetrics {
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.requests.render("kanjiquiz_requests_total", &mut out);
        self.request_latency.render("kanjiquiz_request_latency_ms", &mut out);
        self.notifications.render("kanjiquiz_notifications_total", &mut out);
        self.dropped.render("kanjiquiz_dropped_envelopes_total", &mut out);
        self.refills.render("kanjiquiz_supply_refills_total", &mut out);
        out
    }
}
