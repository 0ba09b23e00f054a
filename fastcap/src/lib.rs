//! Fastcap: line-rate packet capture with deferred PCAPNG assembly.
//!
//! Live capture writes packets through a lock-free ring buffer into one or
//! more compact capture files (`capfile`); a separate `build` pass merges
//! those files into a standards-compliant PCAPNG trace (`pcapng-writer`).
//! This crate ties the pieces together: capture source, writer pool, host
//! and interface metadata, signal handling, and the CLI.

pub mod capture;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod signal;
pub mod sniffer;
pub mod sysinfo;
pub mod writers;
