//! Live capture loop over libpcap.
//!
//! The handle is fully configured and activated before any capture file is
//! created, so a setup failure leaves nothing on disk. The loop itself
//! polls the capture descriptor next to the shutdown eventfd and hands
//! every delivered packet to the writer pool without copying twice.

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::signal::StopHandle;
use crate::writers::WriterSet;
use pcap::{Active, Capture, Precision, TimestampType};
use std::io;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

pub struct Sniffer {
    cap: Capture<Active>,
    stop: StopHandle,
    stats_interval: Option<Duration>,
    link: u16,
    /// Timestamp of the most recently delivered packet; statistics records
    /// are stamped with it.
    last_ts: (u64, u64),
}

impl Sniffer {
    /// Open, configure, and activate the capture handle.
    ///
    /// Adapter timestamping is requested and quietly degrades to the
    /// platform default where unsupported; an unsupported timestamp
    /// precision, a bad filter, or a device error is fatal.
    pub fn open(config: &CaptureConfig, stop: StopHandle) -> Result<Sniffer, CaptureError> {
        let mut inactive = Capture::from_device(config.iface.as_str())?
            .snaplen(config.snaplen)
            .promisc(config.promisc)
            .immediate_mode(config.immediate)
            .buffer_size(config.buffer_bytes as i32)
            .tstamp_type(TimestampType::Adapter)
            .precision(if config.nano {
                Precision::Nano
            } else {
                Precision::Micro
            });
        if config.rfmon {
            inactive = inactive.rfmon(true);
        }
        if !config.immediate {
            // Packets may buffer arbitrarily long in the kernel; the poll
            // on the selectable descriptor drives delivery instead.
            inactive = inactive.timeout(i32::MAX);
        }

        let cap = inactive.open()?;
        let link = cap.get_datalink().0 as u16;
        let mut cap = cap.setnonblock()?;
        if !config.filter.is_empty() {
            cap.filter(&config.filter, true)?;
        }

        Ok(Sniffer {
            cap,
            stop,
            stats_interval: config.stats_interval.map(Duration::from_secs_f32),
            link,
            last_ts: (0, 0),
        })
    }

    /// Link-layer type of the activated handle.
    pub fn link_type(&self) -> u16 {
        self.link
    }

    /// Pump the capture until shutdown is requested.
    ///
    /// Statistics are recorded every configured interval, measured after
    /// each delivered batch, and once more on the way out unless a batch
    /// just produced one; a session thus always ends with a statistics
    /// snapshot.
    pub fn run(&mut self, writers: &mut WriterSet) -> Result<(), CaptureError> {
        let mut fds = [
            libc::pollfd {
                fd: self.stop.wake_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: self.cap.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        let mut last_stats = Instant::now();
        let mut just_did_stats = false;
        while !self.stop.is_stopped() {
            fds[0].revents = 0;
            fds[1].revents = 0;
            let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    tracing::warn!("interface poll interrupted, retrying");
                    continue;
                }
                return Err(CaptureError::Io(err));
            }
            if fds[0].revents != 0 {
                break;
            }
            if fds[1].revents == 0 {
                continue;
            }

            self.dispatch(writers)?;

            if let Some(interval) = self.stats_interval {
                if last_stats.elapsed() >= interval {
                    last_stats = Instant::now();
                    self.record_stats(writers);
                    just_did_stats = true;
                } else {
                    just_did_stats = false;
                }
            }
        }

        if !just_did_stats {
            self.record_stats(writers);
        }
        Ok(())
    }

    /// Drain every packet the kernel currently has for us.
    fn dispatch(&mut self, writers: &mut WriterSet) -> Result<(), CaptureError> {
        loop {
            match self.cap.next_packet() {
                Ok(packet) => {
                    let secs = packet.header.ts.tv_sec as u64;
                    let frac = packet.header.ts.tv_usec as u64;
                    writers.write_packet(secs, frac, packet.header.len, packet.data);
                    self.last_ts = (secs, frac);
                }
                Err(pcap::Error::TimeoutExpired) | Err(pcap::Error::NoMorePackets) => {
                    return Ok(())
                }
                Err(e) => return Err(CaptureError::Pcap(e)),
            }
        }
    }

    fn record_stats(&mut self, writers: &mut WriterSet) {
        match self.cap.stats() {
            Ok(stats) => {
                let (secs, frac) = self.last_ts;
                writers.write_stats(
                    secs,
                    frac,
                    stats.received as u64,
                    stats.if_dropped as u64,
                    stats.dropped as u64,
                );
            }
            Err(e) => tracing::error!("failed to collect capture statistics: {e}"),
        }
    }
}
