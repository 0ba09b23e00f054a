//! On-disk record headers.
//!
//! Every record starts with a `u64` entry ID. Bit 63 is the kind tag:
//! clear for packet records, set for interface statistics. The in-memory
//! headers keep the plain ID; the tag is applied on encode and stripped on
//! decode.

/// Kind tag in the on-disk entry ID.
pub const KIND_BIT: u64 = 1 << 63;

/// On-disk size of a packet record header, payload excluded.
pub const PACKET_HEADER_LEN: usize = 32;

/// On-disk size of a statistics record.
pub const STATS_HEADER_LEN: usize = 48;

/// Header of a captured packet; `cap_len` payload bytes follow on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Session-wide entry ID.
    pub id: u64,
    /// Whole seconds since the Unix epoch.
    pub secs: u64,
    /// Sub-second ticks; micro- or nanoseconds per the session precision.
    pub frac: u64,
    /// Original wire length of the packet.
    pub orig_len: u32,
    /// Bytes actually captured (`<= orig_len`, `<= snaplen`).
    pub cap_len: u32,
}

/// Cumulative interface statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsHeader {
    /// Session-wide entry ID.
    pub id: u64,
    /// Whole seconds since the Unix epoch.
    pub secs: u64,
    /// Sub-second ticks; micro- or nanoseconds per the session precision.
    pub frac: u64,
    /// Packets the kernel saw on the interface since session start.
    pub received: u64,
    /// Interface-level drops since session start.
    pub iface_drops: u64,
    /// Kernel buffer drops since session start.
    pub os_drops: u64,
}

/// A decoded record header; the merge stream is a sequence of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryHeader {
    /// Packet record; the payload travels alongside.
    Packet(PacketHeader),
    /// Statistics record; self-contained.
    Stats(StatsHeader),
}

impl EntryHeader {
    /// The entry ID, kind tag stripped.
    pub fn id(&self) -> u64 {
        match self {
            EntryHeader::Packet(h) => h.id,
            EntryHeader::Stats(h) => h.id,
        }
    }
}

#[inline]
fn get_u64(tail: &[u8], off: usize, swapped: bool) -> u64 {
    let v = u64::from_ne_bytes(tail[off..off + 8].try_into().unwrap());
    if swapped { v.swap_bytes() } else { v }
}

#[inline]
fn get_u32(tail: &[u8], off: usize, swapped: bool) -> u32 {
    let v = u32::from_ne_bytes(tail[off..off + 4].try_into().unwrap());
    if swapped { v.swap_bytes() } else { v }
}

impl PacketHeader {
    /// Encode in native byte order, entry ID included.
    pub fn encode(&self) -> [u8; PACKET_HEADER_LEN] {
        let mut out = [0u8; PACKET_HEADER_LEN];
        out[0..8].copy_from_slice(&self.id.to_ne_bytes());
        out[8..16].copy_from_slice(&self.secs.to_ne_bytes());
        out[16..24].copy_from_slice(&self.frac.to_ne_bytes());
        out[24..28].copy_from_slice(&self.orig_len.to_ne_bytes());
        out[28..32].copy_from_slice(&self.cap_len.to_ne_bytes());
        out
    }

    /// Decode the header tail that follows an already-read entry ID.
    pub fn decode_tail(id: u64, tail: &[u8; PACKET_HEADER_LEN - 8], swapped: bool) -> Self {
        PacketHeader {
            id,
            secs: get_u64(tail, 0, swapped),
            frac: get_u64(tail, 8, swapped),
            orig_len: get_u32(tail, 16, swapped),
            cap_len: get_u32(tail, 20, swapped),
        }
    }
}

impl StatsHeader {
    /// Encode in native byte order; the kind tag is set on the entry ID.
    pub fn encode(&self) -> [u8; STATS_HEADER_LEN] {
        let mut out = [0u8; STATS_HEADER_LEN];
        out[0..8].copy_from_slice(&(self.id | KIND_BIT).to_ne_bytes());
        out[8..16].copy_from_slice(&self.secs.to_ne_bytes());
        out[16..24].copy_from_slice(&self.frac.to_ne_bytes());
        out[24..32].copy_from_slice(&self.received.to_ne_bytes());
        out[32..40].copy_from_slice(&self.iface_drops.to_ne_bytes());
        out[40..48].copy_from_slice(&self.os_drops.to_ne_bytes());
        out
    }

    /// Decode the tail that follows an already-read, already-untagged ID.
    pub fn decode_tail(id: u64, tail: &[u8; STATS_HEADER_LEN - 8], swapped: bool) -> Self {
        StatsHeader {
            id,
            secs: get_u64(tail, 0, swapped),
            frac: get_u64(tail, 8, swapped),
            received: get_u64(tail, 16, swapped),
            iface_drops: get_u64(tail, 24, swapped),
            os_drops: get_u64(tail, 32, swapped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_header_roundtrip() {
        let hdr = PacketHeader {
            id: 42,
            secs: 1_700_000_000,
            frac: 123_456,
            orig_len: 1514,
            cap_len: 96,
        };
        let bytes = hdr.encode();
        let tail: [u8; 24] = bytes[8..].try_into().unwrap();
        let id = u64::from_ne_bytes(bytes[0..8].try_into().unwrap());
        assert_eq!(id & KIND_BIT, 0);
        assert_eq!(PacketHeader::decode_tail(id, &tail, false), hdr);
    }

    #[test]
    fn stats_header_sets_kind_bit() {
        let hdr = StatsHeader {
            id: 7,
            secs: 10,
            frac: 20,
            received: 1000,
            iface_drops: 1,
            os_drops: 2,
        };
        let bytes = hdr.encode();
        let id = u64::from_ne_bytes(bytes[0..8].try_into().unwrap());
        assert_eq!(id & KIND_BIT, KIND_BIT);
        let tail: [u8; 40] = bytes[8..].try_into().unwrap();
        assert_eq!(StatsHeader::decode_tail(id & !KIND_BIT, &tail, false), hdr);
    }

    #[test]
    fn byte_swapped_decode_matches_native() {
        let hdr = PacketHeader {
            id: 9,
            secs: 0x0102_0304_0506_0708,
            frac: 0x1122_3344_5566_7788,
            orig_len: 0xAABB_CCDD,
            cap_len: 0x0011_2233,
        };
        let native = hdr.encode();
        // A foreign-endian file carries every multi-byte field byte-reversed.
        let mut foreign = [0u8; PACKET_HEADER_LEN];
        for (dst, src) in [(0, 0..8), (8, 8..16), (16, 16..24)] {
            let mut field: Vec<u8> = native[src].to_vec();
            field.reverse();
            foreign[dst..dst + 8].copy_from_slice(&field);
        }
        for (dst, src) in [(24, 24..28), (28, 28..32)] {
            let mut field: Vec<u8> = native[src].to_vec();
            field.reverse();
            foreign[dst..dst + 4].copy_from_slice(&field);
        }
        let raw_id = u64::from_ne_bytes(foreign[0..8].try_into().unwrap());
        let id = raw_id.swap_bytes();
        let tail: [u8; 24] = foreign[8..].try_into().unwrap();
        assert_eq!(PacketHeader::decode_tail(id, &tail, true), hdr);
    }
}
