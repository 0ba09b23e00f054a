//! Small read helpers shared by the metadata and record decoders.

use std::io::{self, BufRead, Read};

pub(crate) fn read_u8<R: Read>(r: &mut R) -> io::Result<u8> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}

pub(crate) fn read_u16<R: Read>(r: &mut R, swapped: bool) -> io::Result<u16> {
    let mut b = [0u8; 2];
    r.read_exact(&mut b)?;
    let v = u16::from_ne_bytes(b);
    Ok(if swapped { v.swap_bytes() } else { v })
}

pub(crate) fn read_u32<R: Read>(r: &mut R, swapped: bool) -> io::Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    let v = u32::from_ne_bytes(b);
    Ok(if swapped { v.swap_bytes() } else { v })
}

pub(crate) fn read_i32<R: Read>(r: &mut R, swapped: bool) -> io::Result<i32> {
    Ok(read_u32(r, swapped)? as i32)
}

pub(crate) fn read_u64<R: Read>(r: &mut R, swapped: bool) -> io::Result<u64> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    let v = u64::from_ne_bytes(b);
    Ok(if swapped { v.swap_bytes() } else { v })
}

/// Read a NUL-terminated string; the terminator is consumed and dropped.
pub(crate) fn read_cstring<R: BufRead>(r: &mut R) -> io::Result<String> {
    let mut raw = Vec::new();
    r.read_until(0, &mut raw)?;
    if raw.last() == Some(&0) {
        raw.pop();
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}
