//! PCAPNG output for merged capture sessions.
//!
//! Renders the entry stream of a [`capfile::reader::ReaderSet`] as a
//! little-endian PCAPNG section: one Section Header Block, one Interface
//! Description Block populated from the session metadata, then an Enhanced
//! Packet Block per packet entry and an Interface Statistics Block per
//! statistics entry.
//!
//! Blocks are assembled whole in a scratch buffer before being written, so
//! the output is stream-friendly and block lengths never need patching.

use bytes::{BufMut, BytesMut};
use capfile::meta::SessionMeta;
use capfile::record::{EntryHeader, PacketHeader, StatsHeader};
use capfile::reader::ReaderSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Section Header Block type.
pub const SHB_TYPE: u32 = 0x0A0D_0D0A;
/// Interface Description Block type.
pub const IDB_TYPE: u32 = 0x0000_0001;
/// Interface Statistics Block type.
pub const ISB_TYPE: u32 = 0x0000_0005;
/// Enhanced Packet Block type.
pub const EPB_TYPE: u32 = 0x0000_0006;

const BYTE_ORDER_MAGIC: u32 = 0x1A2B_3C4D;
const VERSION_MAJOR: u16 = 1;
const VERSION_MINOR: u16 = 0;

const SHB_HARDWARE: u16 = 2;
const SHB_OS: u16 = 3;
const SHB_USERAPPL: u16 = 4;

const IF_NAME: u16 = 2;
const IF_IPV4ADDR: u16 = 4;
const IF_IPV6ADDR: u16 = 5;
const IF_MACADDR: u16 = 6;
const IF_SPEED: u16 = 8;
const IF_TSRESOL: u16 = 9;
const IF_FILTER: u16 = 11;
const IF_OS: u16 = 12;
const IF_TSOFFSET: u16 = 14;
const IF_HARDWARE: u16 = 15;

const ISB_IFRECV: u16 = 4;
const ISB_IFDROP: u16 = 5;
const ISB_OSDROP: u16 = 7;

const APPLICATION_NAME: &str = "Fastcap";

#[inline]
fn pad4(len: usize) -> usize {
    (4 - len % 4) % 4
}

fn put_option(body: &mut BytesMut, code: u16, value: &[u8]) {
    body.put_u16_le(code);
    body.put_u16_le(value.len() as u16);
    body.put_slice(value);
    body.put_bytes(0, pad4(value.len()));
}

fn end_options(body: &mut BytesMut) {
    body.put_u16_le(0);
    body.put_u16_le(0);
}

/// Streaming PCAPNG block writer over any byte sink.
pub struct PcapngWriter<W: Write> {
    out: W,
    meta: SessionMeta,
    start_secs: u64,
    scratch: BytesMut,
    packets: u64,
}

impl<W: Write> PcapngWriter<W> {
    /// A writer emitting one section described by `meta`, with packet
    /// timestamps relative to `start_secs` (advertised as `if_tsoffset`).
    pub fn new(out: W, meta: SessionMeta, start_secs: u64) -> Self {
        PcapngWriter {
            out,
            meta,
            start_secs,
            scratch: BytesMut::with_capacity(4096),
            packets: 0,
        }
    }

    /// Packets emitted so far.
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Unwrap the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_block(&mut self, block_type: u32) -> io::Result<()> {
        debug_assert_eq!(self.scratch.len() % 4, 0, "block body must be padded");
        let total = (self.scratch.len() + 12) as u32;
        self.out.write_all(&block_type.to_le_bytes())?;
        self.out.write_all(&total.to_le_bytes())?;
        self.out.write_all(&self.scratch)?;
        self.out.write_all(&total.to_le_bytes())?;
        self.scratch.clear();
        Ok(())
    }

    /// Split a record timestamp into the PCAPNG 64-bit tick pair.
    fn timestamp(&self, secs: u64, frac: u64) -> (u32, u32) {
        let per_sec: u64 = if self.meta.nano { 1_000_000_000 } else { 1_000_000 };
        let ticks = secs.saturating_sub(self.start_secs) * per_sec + frac;
        ((ticks >> 32) as u32, ticks as u32)
    }

    /// Emit the Section Header Block.
    pub fn write_section_header(&mut self) -> io::Result<()> {
        let meta = self.meta.clone();
        let body = &mut self.scratch;
        body.put_u32_le(BYTE_ORDER_MAGIC);
        body.put_u16_le(VERSION_MAJOR);
        body.put_u16_le(VERSION_MINOR);
        body.put_u64_le(u64::MAX); // section length unspecified
        put_option(body, SHB_HARDWARE, meta.cpu_model.as_bytes());
        put_option(body, SHB_OS, meta.os_version.as_bytes());
        put_option(body, SHB_USERAPPL, APPLICATION_NAME.as_bytes());
        end_options(body);
        self.write_block(SHB_TYPE)
    }

    /// Emit the Interface Description Block for interface 0.
    pub fn write_interface_description(&mut self) -> io::Result<()> {
        let meta = self.meta.clone();
        let start_secs = self.start_secs;
        let body = &mut self.scratch;
        body.put_u16_le(meta.link);
        body.put_u16_le(0); // reserved
        body.put_u32_le(meta.snaplen as u32);

        put_option(body, IF_NAME, meta.iface.as_bytes());
        for subnet in &meta.ipv4 {
            let mut value = [0u8; 8];
            value[..4].copy_from_slice(&subnet.addr);
            value[4..].copy_from_slice(&subnet.mask);
            put_option(body, IF_IPV4ADDR, &value);
        }
        for subnet in &meta.ipv6 {
            let mut value = [0u8; 17];
            value[..16].copy_from_slice(&subnet.addr);
            value[16] = subnet.prefix_len;
            put_option(body, IF_IPV6ADDR, &value);
        }
        if let Some(mac) = meta.mac {
            put_option(body, IF_MACADDR, &mac);
        }
        put_option(body, IF_SPEED, &meta.speed.to_le_bytes());
        put_option(body, IF_TSRESOL, &[if meta.nano { 9 } else { 6 }]);
        if !meta.filter.is_empty() {
            // One prefix byte (0 = BPF filter string) before the text.
            let mut value = Vec::with_capacity(meta.filter.len() + 1);
            value.push(0);
            value.extend_from_slice(meta.filter.as_bytes());
            put_option(body, IF_FILTER, &value);
        }
        put_option(body, IF_OS, meta.os_version.as_bytes());
        put_option(body, IF_TSOFFSET, &start_secs.to_le_bytes());
        put_option(body, IF_HARDWARE, meta.hardware.as_bytes());
        end_options(body);
        self.write_block(IDB_TYPE)
    }

    /// Emit one Enhanced Packet Block.
    pub fn write_packet(&mut self, hdr: &PacketHeader, data: &[u8]) -> io::Result<()> {
        let (ts_hi, ts_lo) = self.timestamp(hdr.secs, hdr.frac);
        let body = &mut self.scratch;
        body.put_u32_le(0); // interface id
        body.put_u32_le(ts_hi);
        body.put_u32_le(ts_lo);
        body.put_u32_le(hdr.cap_len);
        body.put_u32_le(hdr.orig_len);
        body.put_slice(data);
        body.put_bytes(0, pad4(data.len()));
        self.write_block(EPB_TYPE)?;
        self.packets += 1;
        Ok(())
    }

    /// Emit one Interface Statistics Block.
    pub fn write_stats(&mut self, hdr: &StatsHeader) -> io::Result<()> {
        let (ts_hi, ts_lo) = self.timestamp(hdr.secs, hdr.frac);
        let body = &mut self.scratch;
        body.put_u32_le(0); // interface id
        body.put_u32_le(ts_hi);
        body.put_u32_le(ts_lo);
        put_option(body, ISB_IFRECV, &hdr.received.to_le_bytes());
        put_option(body, ISB_IFDROP, &hdr.iface_drops.to_le_bytes());
        put_option(body, ISB_OSDROP, &hdr.os_drops.to_le_bytes());
        end_options(body);
        self.write_block(ISB_TYPE)
    }
}

/// Merge an opened capture session into a PCAPNG file.
///
/// Logs a running packet count once per wall-second while the merge is
/// underway, and once more on completion.
pub fn write_file(path: &Path, readers: &mut ReaderSet) -> io::Result<()> {
    let out = BufWriter::new(File::create(path)?);
    let mut writer = PcapngWriter::new(out, readers.meta().clone(), readers.start_seconds());

    writer.write_section_header()?;
    writer.write_interface_description()?;

    let mut payload = Vec::new();
    let mut report_at = Instant::now() + Duration::from_secs(1);
    while let Some(entry) = readers.next(&mut payload) {
        match entry {
            EntryHeader::Packet(hdr) => writer.write_packet(&hdr, &payload)?,
            EntryHeader::Stats(hdr) => writer.write_stats(&hdr)?,
        }
        if Instant::now() >= report_at {
            report_at += Duration::from_secs(1);
            tracing::info!("{} packets written", writer.packets());
        }
    }
    tracing::info!("{} packets written", writer.packets());

    writer.into_inner().into_inner()?.sync_all()?;
    Ok(())
}
