//! Capture pipeline metrics.

use metriken::{metric, Counter};

#[metric(
    name = "packets_captured",
    description = "Packets admitted to the ring buffer"
)]
pub static PACKETS_CAPTURED: Counter = Counter::new();

#[metric(
    name = "queue_drops",
    description = "Records dropped because the ring buffer was full"
)]
pub static QUEUE_DROPS: Counter = Counter::new();

#[metric(
    name = "bytes_persisted",
    description = "Record bytes written to capture files"
)]
pub static BYTES_PERSISTED: Counter = Counter::new();

#[metric(
    name = "stats_records",
    description = "Interface statistics snapshots recorded"
)]
pub static STATS_RECORDS: Counter = Counter::new();
