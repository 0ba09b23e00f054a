//! The fastcap capture file format.
//!
//! A capture session persists to one or more files, each opening with a
//! 4-byte magic written in the producing host's native byte order. Readers
//! accept both orders and byte-swap on the fly, so a capture taken on one
//! endianness merges fine on the other. After the magic, a file is a
//! forward-only sequence of records, each led by a 64-bit entry ID whose
//! top bit selects the record kind (packet or interface statistics).
//!
//! Entry IDs are assigned by the capture session and are globally
//! contiguous across the whole file set, which lets records land on
//! arbitrary files during capture and still merge back into one ordered
//! stream afterwards ([`reader::ReaderSet`]). The first file additionally
//! carries a one-off session metadata record with entry ID 0
//! ([`meta::SessionMeta`]).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod meta;
pub mod reader;
pub mod record;

mod rw;

/// File magic, written in native byte order.
pub const MAGIC: u32 = 0x4643_4150;

/// [`MAGIC`] as seen by a host of the opposite endianness.
pub const MAGIC_SWAPPED: u32 = 0x5041_4346;

/// Errors surfaced while opening a capture file set.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The file does not start with the capture magic in either byte order.
    #[error("{0} is not a fastcap capture file")]
    BadMagic(PathBuf),

    /// None of the opened files carries the session metadata record.
    #[error("no capture file carries the session metadata record")]
    MissingMetadata,

    /// More than one file carries the session metadata record.
    #[error("multiple capture files carry the session metadata record")]
    DuplicateMetadata,

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}
