//! The once-per-session metadata record.
//!
//! Written at the start of the first capture file, before any packet, with
//! entry ID 0. It describes the capture environment well enough to later
//! populate the PCAPNG section and interface blocks without access to the
//! capturing host.

use crate::rw::{read_cstring, read_i32, read_u16, read_u32, read_u64, read_u8};
use std::io::{self, BufRead};

/// An IPv4 address with its netmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Subnet {
    pub addr: [u8; 4],
    pub mask: [u8; 4],
}

/// An IPv6 address with its prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Subnet {
    pub addr: [u8; 16],
    pub prefix_len: u8,
}

/// Capture session description persisted as entry 0.
///
/// Field order here matches the on-disk order. Strings are NUL-terminated;
/// metadata a host could not provide is the empty string or zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMeta {
    /// CPU model string of the capturing host.
    pub cpu_model: String,
    /// OS distribution and kernel description.
    pub os_version: String,
    /// Name of the captured interface.
    pub iface: String,
    /// Nanosecond (true) or microsecond (false) sub-second precision.
    pub nano: bool,
    /// Capture filter expression; empty when none was applied.
    pub filter: String,
    /// Snapshot length in bytes.
    pub snaplen: i32,
    /// IPv4 subnets configured on the interface.
    pub ipv4: Vec<Ipv4Subnet>,
    /// IPv6 subnets configured on the interface.
    pub ipv6: Vec<Ipv6Subnet>,
    /// Interface MAC address, when it has one.
    pub mac: Option<[u8; 6]>,
    /// Hardware description of the interface's device.
    pub hardware: String,
    /// Link speed in bits per second; 0 when unknown.
    pub speed: u64,
    /// Link-layer type as reported by the capture source.
    pub link: u16,
}

fn put_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

impl SessionMeta {
    /// Encode the whole record, leading entry ID 0 included, in native
    /// byte order.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            128 + self.cpu_model.len()
                + self.os_version.len()
                + self.hardware.len()
                + self.filter.len(),
        );
        out.extend_from_slice(&0u64.to_ne_bytes());
        put_cstr(&mut out, &self.cpu_model);
        put_cstr(&mut out, &self.os_version);
        put_cstr(&mut out, &self.iface);
        out.push(self.nano as u8);
        put_cstr(&mut out, &self.filter);
        out.extend_from_slice(&self.snaplen.to_ne_bytes());
        out.extend_from_slice(&(self.ipv4.len() as u32).to_ne_bytes());
        for subnet in &self.ipv4 {
            out.extend_from_slice(&subnet.addr);
            out.extend_from_slice(&subnet.mask);
        }
        out.extend_from_slice(&(self.ipv6.len() as u32).to_ne_bytes());
        for subnet in &self.ipv6 {
            out.extend_from_slice(&subnet.addr);
            out.push(subnet.prefix_len);
        }
        match self.mac {
            Some(mac) => {
                out.push(1);
                out.extend_from_slice(&mac);
            }
            None => out.push(0),
        }
        put_cstr(&mut out, &self.hardware);
        out.extend_from_slice(&self.speed.to_ne_bytes());
        out.extend_from_slice(&self.link.to_ne_bytes());
        out
    }

    /// Decode the record, consuming the leading entry ID as well.
    pub fn read_from<R: BufRead>(r: &mut R, swapped: bool) -> io::Result<SessionMeta> {
        let _id = read_u64(r, swapped)?;
        let cpu_model = read_cstring(r)?;
        let os_version = read_cstring(r)?;
        let iface = read_cstring(r)?;
        let nano = read_u8(r)? != 0;
        let filter = read_cstring(r)?;
        let snaplen = read_i32(r, swapped)?;

        let ipv4_count = read_u32(r, swapped)?;
        let mut ipv4 = Vec::with_capacity(ipv4_count.min(64) as usize);
        for _ in 0..ipv4_count {
            let mut addr = [0u8; 4];
            let mut mask = [0u8; 4];
            r.read_exact(&mut addr)?;
            r.read_exact(&mut mask)?;
            ipv4.push(Ipv4Subnet { addr, mask });
        }

        let ipv6_count = read_u32(r, swapped)?;
        let mut ipv6 = Vec::with_capacity(ipv6_count.min(64) as usize);
        for _ in 0..ipv6_count {
            let mut addr = [0u8; 16];
            r.read_exact(&mut addr)?;
            let prefix_len = read_u8(r)?;
            ipv6.push(Ipv6Subnet { addr, prefix_len });
        }

        let mac = if read_u8(r)? != 0 {
            let mut mac = [0u8; 6];
            r.read_exact(&mut mac)?;
            Some(mac)
        } else {
            None
        };

        let hardware = read_cstring(r)?;
        let speed = read_u64(r, swapped)?;
        let link = read_u16(r, swapped)?;

        Ok(SessionMeta {
            cpu_model,
            os_version,
            iface,
            nano,
            filter,
            snaplen,
            ipv4,
            ipv6,
            mac,
            hardware,
            speed,
            link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> SessionMeta {
        SessionMeta {
            cpu_model: "Example CPU @ 3.00GHz".into(),
            os_version: "Example Linux 6.1".into(),
            iface: "eth0".into(),
            nano: true,
            filter: "tcp port 443".into(),
            snaplen: 1518,
            ipv4: vec![Ipv4Subnet {
                addr: [192, 168, 1, 10],
                mask: [255, 255, 255, 0],
            }],
            ipv6: vec![Ipv6Subnet {
                addr: [0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
                prefix_len: 64,
            }],
            mac: Some([0x02, 0x42, 0xac, 0x11, 0x00, 0x02]),
            hardware: "Example Ethernet Controller".into(),
            speed: 1_000_000_000,
            link: 1,
        }
    }

    #[test]
    fn roundtrip() {
        let meta = sample();
        let bytes = meta.encode();
        let decoded = SessionMeta::read_from(&mut Cursor::new(bytes), false).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn roundtrip_without_mac_or_filter() {
        let meta = SessionMeta {
            mac: None,
            filter: String::new(),
            ..sample()
        };
        let bytes = meta.encode();
        let decoded = SessionMeta::read_from(&mut Cursor::new(bytes), false).unwrap();
        assert_eq!(decoded, meta);
    }
}
