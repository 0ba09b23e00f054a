//! Capture session orchestration.

use crate::config::CaptureConfig;
use crate::device;
use crate::error::CaptureError;
use crate::signal::{self, StopHandle};
use crate::sniffer::Sniffer;
use crate::sysinfo;
use crate::writers::WriterSet;
use capfile::meta::SessionMeta;

/// Run one capture session to completion.
///
/// Order matters: the capture handle is opened and activated first so a
/// setup failure produces no files, the SIGINT handler is only installed
/// once there is something to stop, and the writer pool is joined even
/// when the loop errors so already-admitted records reach disk.
pub fn run(config: CaptureConfig) -> Result<(), CaptureError> {
    let stop = StopHandle::new()?;
    let mut sniffer = Sniffer::open(&config, stop.clone())?;
    signal::install(stop)?;

    let meta = session_meta(&config, sniffer.link_type());
    let mut writers = WriterSet::new(&config, &meta)?;

    tracing::info!(
        "capturing on {} into {} file(s)",
        config.iface,
        config.file_count
    );
    let run_result = sniffer.run(&mut writers);
    let join_result = writers.join();
    run_result?;
    join_result?;
    Ok(())
}

/// Describe the capture environment for the metadata record.
fn session_meta(config: &CaptureConfig, link: u16) -> SessionMeta {
    let addrs = device::probe(&config.iface);
    SessionMeta {
        cpu_model: sysinfo::cpu_model(),
        os_version: sysinfo::os_version(),
        iface: config.iface.clone(),
        nano: config.nano,
        filter: config.filter.clone(),
        snaplen: config.snaplen,
        ipv4: addrs.ipv4,
        ipv6: addrs.ipv6,
        mac: addrs.mac,
        hardware: sysinfo::iface_hardware(&config.iface),
        speed: sysinfo::iface_speed(&config.iface),
        link,
    }
}
