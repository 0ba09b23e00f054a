//! Sharded capture file writer pool.
//!
//! The capture thread frames records into the ring buffer through
//! [`WriterSet::write_packet`] and [`WriterSet::write_stats`]; one worker
//! thread per capture file drains whole records and appends them verbatim.
//! Records land on whichever file's worker claims them, so a single file
//! holds an increasing but gappy ID sequence; the global order is
//! recovered at merge time from the IDs.

use crate::config::{shard_paths, CaptureConfig};
use crate::metrics;
use capfile::meta::SessionMeta;
use capfile::record::{PacketHeader, StatsHeader, PACKET_HEADER_LEN, STATS_HEADER_LEN};
use capfile::MAGIC;
use spmc_ring::{Producer, RingBuffer};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// State shared between the pool and its workers.
struct Shared {
    ring: Arc<RingBuffer>,
    stop: AtomicBool,
}

/// Owns the producer side of the ring, the capture files, and the worker
/// threads draining into them.
pub struct WriterSet {
    producer: Producer,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<io::Result<u64>>>,
    entry_count: u64,
    queue_drops: u64,
}

impl WriterSet {
    /// Create the capture files, persist the session metadata, and start
    /// one worker per file.
    ///
    /// Every file gets the magic up front; the metadata record is written
    /// synchronously to the first file before any worker exists, so it is
    /// always entry 0 at offset 4 there.
    pub fn new(config: &CaptureConfig, meta: &SessionMeta) -> io::Result<WriterSet> {
        let paths = shard_paths(&config.output, config.file_count);
        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            let mut file = File::create(path)?;
            file.write_all(&MAGIC.to_ne_bytes())?;
            files.push(file);
        }
        files[0].write_all(&meta.encode())?;

        let (producer, ring) = RingBuffer::with_capacity(config.buffer_bytes);
        let shared = Arc::new(Shared {
            ring,
            stop: AtomicBool::new(false),
        });

        let workers = files
            .into_iter()
            .enumerate()
            .map(|(i, file)| {
                let shared = shared.clone();
                thread::Builder::new()
                    .name(format!("capwriter-{i}"))
                    .spawn(move || drain(&shared, file))
                    .expect("failed to spawn writer thread")
            })
            .collect();

        Ok(WriterSet {
            producer,
            shared,
            workers,
            entry_count: 1,
            queue_drops: 0,
        })
    }

    /// Frame a packet record into the ring.
    ///
    /// Never blocks: when the ring is full the packet is dropped and
    /// counted. Entry IDs are assigned only to admitted records, keeping
    /// the on-disk ID space contiguous.
    pub fn write_packet(&mut self, secs: u64, frac: u64, orig_len: u32, bytes: &[u8]) {
        if !self.producer.prepare(PACKET_HEADER_LEN + bytes.len()) {
            self.queue_drops += 1;
            metrics::QUEUE_DROPS.increment();
            return;
        }
        let hdr = PacketHeader {
            id: self.entry_count,
            secs,
            frac,
            orig_len,
            cap_len: bytes.len() as u32,
        };
        self.producer.write_some(&hdr.encode());
        self.producer.write_some(bytes);
        self.producer.commit();
        self.entry_count += 1;
        metrics::PACKETS_CAPTURED.increment();
    }

    /// Frame a cumulative statistics record into the ring.
    pub fn write_stats(
        &mut self,
        secs: u64,
        frac: u64,
        received: u64,
        iface_drops: u64,
        os_drops: u64,
    ) {
        if !self.producer.prepare(STATS_HEADER_LEN) {
            self.queue_drops += 1;
            metrics::QUEUE_DROPS.increment();
            return;
        }
        let hdr = StatsHeader {
            id: self.entry_count,
            secs,
            frac,
            received,
            iface_drops,
            os_drops,
        };
        self.producer.write_some(&hdr.encode());
        self.producer.commit();
        self.entry_count += 1;
        metrics::STATS_RECORDS.increment();
        tracing::info!(
            "received: {received}, interface dropped: {iface_drops}, OS dropped: {os_drops}"
        );
    }

    /// Entries admitted so far, the metadata record included.
    pub fn entries(&self) -> u64 {
        self.entry_count
    }

    /// Records dropped because the ring was full.
    pub fn queue_drops(&self) -> u64 {
        self.queue_drops
    }

    /// Stop the workers, let them drain buffered records, and wait until
    /// every file is complete on disk.
    pub fn join(self) -> io::Result<()> {
        self.shared.stop.store(true, Ordering::Relaxed);
        self.shared.ring.notify_all_consumers();

        let mut first_err = None;
        for worker in self.workers {
            match worker.join() {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::error!("capture file write failed: {e}");
                    first_err.get_or_insert(e);
                }
                Err(_) => {
                    first_err.get_or_insert(io::Error::other("writer thread panicked"));
                }
            }
        }
        if self.queue_drops > 0 {
            tracing::warn!(
                "{} records dropped on ring buffer overflow",
                self.queue_drops
            );
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Worker loop: claim whole records and append them to this worker's file.
fn drain(shared: &Shared, file: File) -> io::Result<u64> {
    let mut out = BufWriter::new(file);
    let mut buf = Vec::with_capacity(1600);
    let mut written = 0u64;
    while shared
        .ring
        .read_while(|| !shared.stop.load(Ordering::Relaxed), &mut buf)
    {
        out.write_all(&buf)?;
        written += buf.len() as u64;
        metrics::BYTES_PERSISTED.add(buf.len() as u64);
    }
    // Stop flag observed; persist whatever the ring still holds before
    // exiting so admitted records are never lost to shutdown.
    while shared.ring.try_read(&mut buf) {
        out.write_all(&buf)?;
        written += buf.len() as u64;
        metrics::BYTES_PERSISTED.add(buf.len() as u64);
    }
    out.flush()?;
    Ok(written)
}
