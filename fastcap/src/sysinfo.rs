//! Host and NIC descriptions scraped from `/proc`, `/etc`, and `/sys`.
//!
//! Everything here is best effort: a missing file or unparseable value
//! degrades to an empty string or zero, never an error, so capture can run
//! on stripped-down systems.

use std::ffi::CStr;
use std::fs;
use std::path::Path;

/// CPU model string from `/proc/cpuinfo`.
pub fn cpu_model() -> String {
    let Ok(text) = fs::read_to_string("/proc/cpuinfo") else {
        return String::new();
    };
    for line in text.lines() {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim() == "model name" {
                return value.trim().to_string();
            }
        }
    }
    String::new()
}

/// Strip surrounding quotes and resolve backslash escapes.
fn unquote(s: &str) -> String {
    let Some(inner) = s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) else {
        return s.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}

fn os_release() -> String {
    let Ok(text) = fs::read_to_string("/etc/os-release") else {
        return String::new();
    };
    let mut name = String::new();
    let mut version = String::new();
    let mut pretty = String::new();
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "PRETTY_NAME" => pretty = unquote(value.trim()),
            "NAME" => name = unquote(value.trim()),
            "VERSION" => version = unquote(value.trim()),
            _ => {}
        }
    }
    if !pretty.is_empty() {
        pretty
    } else if name.is_empty() {
        String::new()
    } else if version.is_empty() {
        name
    } else {
        format!("{name} {version}")
    }
}

fn lsb_release() -> String {
    let Ok(text) = fs::read_to_string("/etc/lsb-release") else {
        return String::new();
    };
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "DISTRIB_DESCRIPTION" {
                return unquote(value.trim());
            }
        }
    }
    String::new()
}

/// First line of `/etc/issue` with getty escape sequences removed.
fn issue() -> String {
    let Ok(text) = fs::read_to_string("/etc/issue") else {
        return String::new();
    };
    let Some(line) = text.lines().next() else {
        return String::new();
    };
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out.trim().to_string()
}

fn kernel_version() -> String {
    let mut name: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut name) } != 0 {
        return String::new();
    }
    // Safety: uname NUL-terminates both fields.
    let sysname = unsafe { CStr::from_ptr(name.sysname.as_ptr()) }.to_string_lossy();
    let release = unsafe { CStr::from_ptr(name.release.as_ptr()) }.to_string_lossy();
    format!("{sysname} {release}")
}

/// Human-readable OS description: distribution (from `/etc/os-release`,
/// `/etc/lsb-release`, or `/etc/issue`, in that order) plus the kernel.
pub fn os_version() -> String {
    let mut distrib = os_release();
    if distrib.is_empty() {
        distrib = lsb_release();
    }
    if distrib.is_empty() {
        distrib = issue();
    }
    let kernel = kernel_version();
    match (distrib.is_empty(), kernel.is_empty()) {
        (true, true) => String::new(),
        (true, false) => kernel,
        (false, true) => distrib,
        (false, false) => format!("{distrib}, {kernel}"),
    }
}

/// Link speed of `iface` in bits per second; 0 when unknown or down.
pub fn iface_speed(iface: &str) -> u64 {
    fs::read_to_string(format!("/sys/class/net/{iface}/speed"))
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|mbit| mbit * 1_000_000)
        .unwrap_or(0)
}

/// Parse a sysfs id file holding a value like `0x8086`.
fn read_hex_id(path: &str) -> u32 {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| {
            let s = s.trim();
            let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
            u32::from_str_radix(s, 16).ok()
        })
        .unwrap_or(0)
}

const PCI_IDS_PATHS: &[&str] = &[
    "/usr/share/pci.ids",
    "/usr/share/misc/pci.ids",
    "/usr/share/hwdata/pci.ids",
    "/var/lib/pciutils/pci.ids",
];

fn with_revision(name: String, revision: u32) -> String {
    if revision == 0 {
        name
    } else {
        format!("{name} (rev {revision:02X})")
    }
}

/// Resolve a vendor/device pair against one pci.ids database.
///
/// Vendor lines are unindented `VVVV name`; device lines below them are
/// `\tDDDD name`; doubly-indented subsystem lines are skipped. `None` when
/// the vendor does not appear at all.
fn lookup(db: &str, vendor_id: u32, device_id: u32, revision: u32) -> Option<String> {
    let mut lines = db.lines();
    while let Some(line) = lines.next() {
        if line.is_empty() || line.starts_with('#') || line.starts_with('\t') {
            continue;
        }
        let Some(vid) = line.get(..4).and_then(|s| u32::from_str_radix(s, 16).ok()) else {
            continue;
        };
        if vid != vendor_id {
            continue;
        }
        let vendor_name = line[4..].trim().to_string();
        for line in lines.by_ref() {
            if line.len() < 2 || line.starts_with('#') {
                continue;
            }
            if !line.starts_with('\t') {
                // Next vendor block: no matching device under this vendor.
                return Some(with_revision(
                    format!("{vendor_name} Device {device_id:04X}"),
                    revision,
                ));
            }
            if line.starts_with("\t\t") {
                continue;
            }
            let Some(did) = line.get(1..5).and_then(|s| u32::from_str_radix(s, 16).ok()) else {
                continue;
            };
            if did == device_id {
                let device_name = line[5..].trim();
                return Some(with_revision(format!("{vendor_name} {device_name}"), revision));
            }
        }
        return Some(with_revision(
            format!("{vendor_name} Device {device_id:04X}"),
            revision,
        ));
    }
    None
}

/// Hardware description of the PCI device backing `iface`.
///
/// Empty when the interface has no PCI device (virtual interfaces);
/// `"Unknown device"` when no pci.ids database is installed.
pub fn iface_hardware(iface: &str) -> String {
    let base = format!("/sys/class/net/{iface}/device");
    if !Path::new(&format!("{base}/vendor")).exists() {
        return String::new();
    }
    let vendor_id = read_hex_id(&format!("{base}/vendor"));
    let device_id = read_hex_id(&format!("{base}/device"));
    let revision = read_hex_id(&format!("{base}/revision"));

    for db_path in PCI_IDS_PATHS {
        if let Ok(db) = fs::read_to_string(db_path) {
            return lookup(&db, vendor_id, device_id, revision).unwrap_or_else(|| {
                with_revision(
                    format!("Vendor {vendor_id:04X} Device {device_id:04X}"),
                    revision,
                )
            });
        }
    }
    "Unknown device".to_string()
}
