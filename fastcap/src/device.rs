//! Interface address discovery via `getifaddrs`.

use capfile::meta::{Ipv4Subnet, Ipv6Subnet};
use std::ffi::CStr;

/// Addresses configured on the captured interface.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub ipv4: Vec<Ipv4Subnet>,
    pub ipv6: Vec<Ipv6Subnet>,
    pub mac: Option<[u8; 6]>,
}

/// Collect the addresses of `iface`.
///
/// Best effort: an interface that cannot be inspected simply yields an
/// empty result, never an error.
pub fn probe(iface: &str) -> DeviceInfo {
    let mut info = DeviceInfo::default();

    let mut addrs: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut addrs) } != 0 {
        return info;
    }

    let mut cursor = addrs;
    while !cursor.is_null() {
        // Safety: getifaddrs returned a valid list, freed below; entries
        // are not touched after freeifaddrs.
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;

        if entry.ifa_addr.is_null() {
            continue;
        }
        let name = unsafe { CStr::from_ptr(entry.ifa_name) };
        if name.to_bytes() != iface.as_bytes() {
            continue;
        }

        let family = unsafe { (*entry.ifa_addr).sa_family };
        if family == libc::AF_INET as libc::sa_family_t {
            // Safety: sa_family says this is a sockaddr_in.
            let addr = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
            let mask = if entry.ifa_netmask.is_null() {
                [0u8; 4]
            } else {
                let mask = unsafe { &*(entry.ifa_netmask as *const libc::sockaddr_in) };
                mask.sin_addr.s_addr.to_ne_bytes()
            };
            info.ipv4.push(Ipv4Subnet {
                addr: addr.sin_addr.s_addr.to_ne_bytes(),
                mask,
            });
        } else if family == libc::AF_INET6 as libc::sa_family_t {
            // Safety: sa_family says this is a sockaddr_in6.
            let addr = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in6) };
            let prefix_len = if entry.ifa_netmask.is_null() {
                0
            } else {
                let mask = unsafe { &*(entry.ifa_netmask as *const libc::sockaddr_in6) };
                prefix_len_from_mask(&mask.sin6_addr.s6_addr)
            };
            info.ipv6.push(Ipv6Subnet {
                addr: addr.sin6_addr.s6_addr,
                prefix_len,
            });
        } else {
            #[cfg(target_os = "linux")]
            if family == libc::AF_PACKET as libc::sa_family_t {
                // Safety: sa_family says this is a sockaddr_ll.
                let link = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_ll) };
                if link.sll_halen as usize >= 6 {
                    let mut mac = [0u8; 6];
                    mac.copy_from_slice(&link.sll_addr[..6]);
                    info.mac = Some(mac);
                }
            }
        }
    }

    unsafe { libc::freeifaddrs(addrs) };
    info
}

/// Count the leading one bits of a netmask.
fn prefix_len_from_mask(mask: &[u8; 16]) -> u8 {
    let mut len = 0u8;
    for &byte in mask {
        for bit in (0..8).rev() {
            if byte & (1 << bit) == 0 {
                return len;
            }
            len += 1;
        }
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_length_counts_leading_ones() {
        let mut mask = [0u8; 16];
        assert_eq!(prefix_len_from_mask(&mask), 0);

        mask[..8].fill(0xFF);
        assert_eq!(prefix_len_from_mask(&mask), 64);

        mask[8] = 0b1110_0000;
        assert_eq!(prefix_len_from_mask(&mask), 67);

        mask.fill(0xFF);
        assert_eq!(prefix_len_from_mask(&mask), 128);
    }

    #[test]
    fn noncontiguous_mask_stops_at_first_zero() {
        let mut mask = [0u8; 16];
        mask[0] = 0b1010_0000;
        assert_eq!(prefix_len_from_mask(&mask), 1);
    }

    #[test]
    fn unknown_interface_probes_empty() {
        let info = probe("surely-no-such-interface-0");
        assert!(info.ipv4.is_empty());
        assert!(info.ipv6.is_empty());
        assert!(info.mac.is_none());
    }
}
