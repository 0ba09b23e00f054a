//! Single-producer multi-consumer byte ring buffer.
//!
//! One producer frames variable-length records into a fixed circular byte
//! array; any number of consumer threads take turns dequeuing whole records.
//! The fast path is lock-free on both sides: the producer publishes with a
//! release store, consumers serialize among themselves with an atomic
//! exchange on the read cursor. A mutex/condvar pair exists only so that
//! idle consumers can sleep.
//!
//! # Layout
//!
//! Three cursors over a capacity-`C` byte array, all wrapping in `[0, C)`:
//!
//! - `end`: the producer's committed write frontier.
//! - `begin`: the consumers' read frontier. A negative value is the claim
//!   sentinel; the consumer that swapped it in holds the sole read lease.
//! - `free_end`: the last byte consumers have handed back to the producer.
//!   The producer may fill up to, but not including, this position, which
//!   keeps one byte in reserve so a full buffer is distinguishable from an
//!   empty one.
//!
//! Each record is a `size_of::<usize>()` length prefix followed by the
//! payload, both placed circularly with no alignment.

use parking_lot::{Condvar, Mutex};
use std::cell::UnsafeCell;
use std::mem::size_of;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

/// Bytes of framing overhead per record.
pub const HEADER_LEN: usize = size_of::<usize>();

/// Shared state of the ring: storage, cursors, and the sleep rendezvous.
///
/// Constructed through [`RingBuffer::with_capacity`], which also hands out
/// the single [`Producer`]. Consumers call [`try_read`](Self::try_read) and
/// [`read_while`](Self::read_while) directly on a shared reference.
pub struct RingBuffer {
    mem: Box<[UnsafeCell<u8>]>,
    cap: usize,
    /// Read frontier; negative while a consumer holds the read lease.
    begin: AtomicIsize,
    /// Committed write frontier, published by the producer.
    end: AtomicUsize,
    /// Last byte released back to the producer.
    free_end: AtomicUsize,
    mutex: Mutex<()>,
    readable: Condvar,
}

// Safety: the byte array is only touched through the cursor protocol. The
// producer writes exclusively inside [end, free_end) before publishing, and
// a consumer reads exclusively inside [begin, end) while holding the read
// lease, so no two threads access the same region concurrently.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

/// Write half of the ring. Not `Clone`: exactly one producer exists.
///
/// A record is admitted with [`prepare`](Self::prepare), filled with one or
/// more [`write_some`](Self::write_some) calls, and published with
/// [`commit`](Self::commit). None of these block; `prepare` returning
/// `false` is the only overflow signal and the caller is expected to drop
/// the record.
pub struct Producer {
    ring: Arc<RingBuffer>,
    write_pos: usize,
    write_end: usize,
}

impl RingBuffer {
    /// Allocate a ring of `capacity` bytes and return the producer handle
    /// together with the shared consumer side.
    ///
    /// The largest admissible record payload is
    /// `capacity - HEADER_LEN - 1` bytes.
    pub fn with_capacity(capacity: usize) -> (Producer, Arc<RingBuffer>) {
        assert!(capacity > HEADER_LEN, "capacity too small for one record");
        let ring = Arc::new(RingBuffer {
            mem: (0..capacity).map(|_| UnsafeCell::new(0)).collect(),
            cap: capacity,
            begin: AtomicIsize::new(0),
            end: AtomicUsize::new(0),
            free_end: AtomicUsize::new(capacity - 1),
            mutex: Mutex::new(()),
            readable: Condvar::new(),
        });
        let producer = Producer {
            ring: ring.clone(),
            write_pos: 0,
            write_end: 0,
        };
        (producer, ring)
    }

    /// Ring capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    #[inline]
    fn offset_add(&self, pos: usize, offset: usize) -> usize {
        let pos = pos + offset;
        if pos >= self.cap { pos - self.cap } else { pos }
    }

    #[inline]
    fn decrement(&self, pos: usize) -> usize {
        if pos == 0 { self.cap - 1 } else { pos - 1 }
    }

    /// Forward distance from `start` to `end` under wrap-around.
    #[inline]
    fn distance(&self, start: usize, end: usize) -> usize {
        if end < start {
            self.cap - start + end
        } else {
            end - start
        }
    }

    /// Base pointer of the byte array. All access goes through raw
    /// pointers; no reference to the storage is ever formed.
    #[inline]
    fn base(&self) -> *mut u8 {
        self.mem.as_ptr() as *mut u8
    }

    /// Copy `src` into the array at `pos`, wrapping past the end.
    ///
    /// Safety: the caller must own `[pos, pos + src.len())` under the cursor
    /// protocol (producer: unpublished write region; consumer: leased read
    /// region).
    unsafe fn copy_in(&self, pos: usize, src: &[u8]) {
        let mem = self.base();
        if pos + src.len() > self.cap {
            let first = self.cap - pos;
            std::ptr::copy_nonoverlapping(src.as_ptr(), mem.add(pos), first);
            std::ptr::copy_nonoverlapping(src.as_ptr().add(first), mem, src.len() - first);
        } else {
            std::ptr::copy_nonoverlapping(src.as_ptr(), mem.add(pos), src.len());
        }
    }

    /// Copy out of the array at `pos` into `dst`, wrapping past the end.
    ///
    /// Safety: same region-ownership requirement as [`copy_in`](Self::copy_in).
    unsafe fn copy_out(&self, pos: usize, dst: &mut [u8]) {
        let mem = self.base() as *const u8;
        if pos + dst.len() > self.cap {
            let first = self.cap - pos;
            std::ptr::copy_nonoverlapping(mem.add(pos), dst.as_mut_ptr(), first);
            std::ptr::copy_nonoverlapping(mem, dst.as_mut_ptr().add(first), dst.len() - first);
        } else {
            std::ptr::copy_nonoverlapping(mem.add(pos), dst.as_mut_ptr(), dst.len());
        }
    }

    /// Wake one sleeping consumer.
    ///
    /// The try-lock keeps the wakeup from racing past a consumer that has
    /// checked the predicate but not yet parked; if the lock is held we are
    /// concurrent with the wait and the notify lands after it.
    fn notify_one_consumer(&self) {
        if let Some(guard) = self.mutex.try_lock() {
            drop(guard);
        }
        self.readable.notify_one();
    }

    /// Wake every sleeping consumer. Used for shutdown broadcast.
    ///
    /// Takes the mutex for real: a consumer between its predicate check
    /// and parking must not miss this notification, or shutdown would
    /// hang. Commits tolerate that window, a broadcast cannot.
    pub fn notify_all_consumers(&self) {
        drop(self.mutex.lock());
        self.readable.notify_all();
    }

    /// Dequeue one record into `buf` without blocking.
    ///
    /// Returns `false` when the ring is empty. `buf` is resized to the
    /// record length on success.
    pub fn try_read(&self, buf: &mut Vec<u8>) -> bool {
        // Claim the read lease: swap the sentinel in, spinning while some
        // other consumer holds it.
        let mut claimed;
        loop {
            claimed = self.begin.swap(-1, Ordering::Acquire);
            if claimed >= 0 {
                break;
            }
            std::hint::spin_loop();
        }
        let begin = claimed as usize;

        if begin == self.end.load(Ordering::Acquire) {
            self.begin.store(claimed, Ordering::Release);
            self.notify_one_consumer();
            return false;
        }

        let mut len_bytes = [0u8; HEADER_LEN];
        // Safety: [begin, end) is committed data and we hold the read lease.
        unsafe { self.copy_out(begin, &mut len_bytes) };
        let len = usize::from_ne_bytes(len_bytes);

        let new_begin = self.offset_add(begin, HEADER_LEN + len);
        self.begin.store(new_begin as isize, Ordering::Release);
        self.notify_one_consumer();

        buf.resize(len, 0);
        // Safety: the record body [begin + HEADER_LEN, new_begin) was claimed
        // above; advancing `begin` hands the lease on but not these bytes.
        unsafe { self.copy_out(self.offset_add(begin, HEADER_LEN), buf) };

        // Hand the bytes back to the producer in record order: the release
        // only succeeds once the consumer of the preceding record has
        // published its own.
        let expected = self.decrement(begin);
        let released = self.decrement(new_begin);
        while self
            .free_end
            .compare_exchange(expected, released, Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
        true
    }

    /// Dequeue one record, sleeping while the ring is empty and `pred()`
    /// holds. Returns `false` once `pred()` is observed false; pending
    /// records may remain and can be drained with [`try_read`](Self::try_read).
    pub fn read_while<P>(&self, mut pred: P, buf: &mut Vec<u8>) -> bool
    where
        P: FnMut() -> bool,
    {
        if !pred() {
            return false;
        }
        while !self.try_read(buf) {
            let mut guard = self.mutex.lock();
            loop {
                if !pred() {
                    return false;
                }
                let begin = self.begin.load(Ordering::Acquire);
                let end = self.end.load(Ordering::Acquire);
                if begin >= 0 && begin as usize != end {
                    break;
                }
                self.readable.wait(&mut guard);
            }
        }
        true
    }
}

impl Producer {
    /// Shared handle to the consumer side of the ring.
    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }

    /// Reserve space for a `len`-byte record.
    ///
    /// Returns `false` without blocking when the record does not fit; the
    /// caller drops it. On success the length prefix is already placed and
    /// the record must be filled and committed before the next `prepare`.
    pub fn prepare(&mut self, len: usize) -> bool {
        let needed = len + HEADER_LEN;
        let end = self.ring.end.load(Ordering::Relaxed);
        let free_end = self.ring.free_end.load(Ordering::Acquire);
        if needed > self.ring.distance(end, free_end) {
            return false;
        }

        // Safety: [end, free_end) is producer-owned free space.
        unsafe { self.ring.copy_in(end, &len.to_ne_bytes()) };
        self.write_pos = self.ring.offset_add(end, HEADER_LEN);
        self.write_end = self.ring.offset_add(self.write_pos, len);
        true
    }

    /// Append bytes to the record reserved by the last successful
    /// [`prepare`](Self::prepare).
    pub fn write_some(&mut self, buf: &[u8]) {
        // Safety: prepare() reserved this region and it is not yet published.
        unsafe { self.ring.copy_in(self.write_pos, buf) };
        self.write_pos = self.ring.offset_add(self.write_pos, buf.len());
    }

    /// Publish the reserved record and wake one consumer.
    pub fn commit(&mut self) {
        self.ring.end.store(self.write_end, Ordering::Release);
        self.ring.notify_one_consumer();
    }
}
