//! Ordered merge across the files of one capture session.
//!
//! Each file is internally ID-ordered but the session's IDs are spread
//! across the whole set, so [`ReaderSet`] walks all files with a single
//! expected-next-ID cursor. Gaps (a truncated file tail, a record lost to
//! overflow trimming) are reported and skipped rather than treated as
//! fatal.

use crate::meta::SessionMeta;
use crate::record::{
    EntryHeader, PacketHeader, StatsHeader, KIND_BIT, PACKET_HEADER_LEN, STATS_HEADER_LEN,
};
use crate::rw::read_u64;
use crate::{FormatError, MAGIC, MAGIC_SWAPPED};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Sequential reader over a single capture file.
pub struct ShardReader {
    file: BufReader<File>,
    swapped: bool,
    has_meta: bool,
    current: Option<EntryHeader>,
    payload: Vec<u8>,
}

impl ShardReader {
    /// Open a capture file and validate its magic.
    ///
    /// The file position is left just past the magic; call
    /// [`advance`](Self::advance) to load the first record.
    pub fn open(path: &Path) -> Result<Self, FormatError> {
        let file = File::open(path)?;
        let mut file = BufReader::new(file);

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)
            .map_err(|_| FormatError::BadMagic(path.to_owned()))?;
        let swapped = match u32::from_ne_bytes(magic) {
            MAGIC => false,
            MAGIC_SWAPPED => true,
            _ => return Err(FormatError::BadMagic(path.to_owned())),
        };

        let mut reader = ShardReader {
            file,
            swapped,
            has_meta: false,
            current: None,
            payload: Vec::new(),
        };
        // Entry ID 0 right after the magic marks the metadata-bearing file.
        if let Some(id) = reader.peek_u64(0)? {
            reader.has_meta = id == 0;
        }
        Ok(reader)
    }

    /// Whether this file starts with the session metadata record.
    pub fn has_meta(&self) -> bool {
        self.has_meta
    }

    /// Whether this file decodes byte-swapped.
    pub fn swapped(&self) -> bool {
        self.swapped
    }

    /// The record most recently loaded by [`advance`](Self::advance);
    /// `None` once the file is exhausted.
    pub fn current(&self) -> Option<&EntryHeader> {
        self.current.as_ref()
    }

    /// Move the current packet payload into `dst`.
    pub fn take_payload(&mut self, dst: &mut Vec<u8>) {
        std::mem::swap(dst, &mut self.payload);
    }

    /// Read a u64 at `offset` bytes past the current position, then seek
    /// back. `None` when that many bytes are not available.
    fn peek_u64(&mut self, offset: usize) -> io::Result<Option<u64>> {
        let mut buf = [0u8; 16];
        let needed = offset + 8;
        debug_assert!(needed <= buf.len());
        let mut got = 0usize;
        while got < needed {
            let n = self.file.read(&mut buf[got..needed])?;
            if n == 0 {
                break;
            }
            got += n;
        }
        self.file.seek_relative(-(got as i64))?;
        if got < needed {
            return Ok(None);
        }
        let v = u64::from_ne_bytes(buf[offset..offset + 8].try_into().unwrap());
        Ok(Some(if self.swapped { v.swap_bytes() } else { v }))
    }

    /// Parse the session metadata record at the current position.
    ///
    /// Only meaningful right after [`open`](Self::open) on a file where
    /// [`has_meta`](Self::has_meta) is true.
    pub fn read_session_meta(&mut self) -> io::Result<SessionMeta> {
        SessionMeta::read_from(&mut self.file, self.swapped)
    }

    /// Timestamp seconds of the record at the current position, without
    /// consuming it. Zero when the file has no further records.
    pub(crate) fn peek_secs(&mut self) -> io::Result<u64> {
        Ok(self.peek_u64(8)?.unwrap_or(0))
    }

    /// Load the next record, or mark the file exhausted.
    ///
    /// A short read anywhere in a record means a capture was cut off
    /// mid-write; the partial tail is dropped and the file is treated as
    /// cleanly ended.
    pub fn advance(&mut self) {
        self.current = None;

        let raw_id = match read_u64(&mut self.file, self.swapped) {
            Ok(id) => id,
            Err(_) => return,
        };

        if raw_id & KIND_BIT != 0 {
            let mut tail = [0u8; STATS_HEADER_LEN - 8];
            if self.file.read_exact(&mut tail).is_err() {
                return;
            }
            self.current = Some(EntryHeader::Stats(StatsHeader::decode_tail(
                raw_id & !KIND_BIT,
                &tail,
                self.swapped,
            )));
        } else {
            let mut tail = [0u8; PACKET_HEADER_LEN - 8];
            if self.file.read_exact(&mut tail).is_err() {
                return;
            }
            let hdr = PacketHeader::decode_tail(raw_id, &tail, self.swapped);
            self.payload.resize(hdr.cap_len as usize, 0);
            if self.file.read_exact(&mut self.payload).is_err() {
                return;
            }
            self.current = Some(EntryHeader::Packet(hdr));
        }
    }
}

/// The files of one capture session, presented as a single stream ordered
/// by entry ID.
pub struct ReaderSet {
    readers: Vec<ShardReader>,
    meta: SessionMeta,
    start_secs: u64,
    next_id: u64,
}

impl ReaderSet {
    /// Open every file, locate and parse the session metadata, and
    /// position each reader at its first record.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self, FormatError> {
        let mut readers = Vec::with_capacity(paths.len());
        for path in paths {
            readers.push(ShardReader::open(path.as_ref())?);
        }

        let mut meta_index = None;
        for (i, reader) in readers.iter().enumerate() {
            if reader.has_meta() {
                if meta_index.is_some() {
                    return Err(FormatError::DuplicateMetadata);
                }
                meta_index = Some(i);
            }
        }
        let meta_index = meta_index.ok_or(FormatError::MissingMetadata)?;

        let meta = readers[meta_index].read_session_meta()?;
        // The first record after the metadata stamps the session start,
        // which becomes the PCAPNG timestamp offset.
        let start_secs = readers[meta_index].peek_secs()?;

        for reader in &mut readers {
            reader.advance();
        }

        Ok(ReaderSet {
            readers,
            meta,
            start_secs,
            next_id: 1,
        })
    }

    /// Session metadata from the lead record.
    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    /// Timestamp seconds of the session's first record.
    pub fn start_seconds(&self) -> u64 {
        self.start_secs
    }

    /// Pop the next entry in ID order.
    ///
    /// Packet payloads are swapped into `payload`. Missing IDs are logged
    /// and skipped; `None` means every file is exhausted.
    pub fn next(&mut self, payload: &mut Vec<u8>) -> Option<EntryHeader> {
        loop {
            let mut exhausted = 0;
            for reader in &mut self.readers {
                match reader.current() {
                    Some(hdr) if hdr.id() == self.next_id => {
                        let hdr = *hdr;
                        self.next_id += 1;
                        if matches!(hdr, EntryHeader::Packet(_)) {
                            reader.take_payload(payload);
                        }
                        reader.advance();
                        return Some(hdr);
                    }
                    Some(_) => {}
                    None => exhausted += 1,
                }
            }
            if exhausted == self.readers.len() {
                return None;
            }
            tracing::warn!("missing entry {}", self.next_id);
            self.next_id += 1;
        }
    }
}
