//! Capture-side error type.

use thiserror::Error;

/// Errors that abort a capture session.
///
/// Everything here is fatal: either the capture handle could not be set up,
/// or the session hit an unrecoverable runtime failure.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture error: {0}")]
    Pcap(#[from] pcap::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
