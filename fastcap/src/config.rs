//! Capture session configuration.

use std::path::Path;

/// Runtime options for one capture session, derived from the command line.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Interface to capture from.
    pub iface: String,
    /// Output filename; with more than one file the index is spliced in
    /// before the extension.
    pub output: String,
    /// Capture filter expression; empty applies no filter.
    pub filter: String,
    /// Ring buffer and kernel capture buffer size in bytes.
    pub buffer_bytes: usize,
    /// Snapshot length in bytes.
    pub snaplen: i32,
    /// Number of capture files (and writer threads).
    pub file_count: usize,
    /// Seconds between statistics records; `None` records statistics only
    /// at shutdown.
    pub stats_interval: Option<f32>,
    /// Nanosecond timestamp precision instead of microsecond.
    pub nano: bool,
    /// Put the interface into promiscuous mode.
    pub promisc: bool,
    /// Put the interface into monitor mode.
    pub rfmon: bool,
    /// Deliver packets as they arrive instead of batching.
    pub immediate: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            iface: String::new(),
            output: String::new(),
            filter: String::new(),
            buffer_bytes: 256 << 20,
            snaplen: 65536,
            file_count: 1,
            stats_interval: None,
            nano: false,
            promisc: false,
            rfmon: false,
            immediate: false,
        }
    }
}

/// Name the capture files of a session.
///
/// A single file keeps `output` verbatim; otherwise the file index goes
/// between the stem and the extension: `cap.bin` becomes `cap.0.bin`,
/// `cap.1.bin`, and so on.
pub fn shard_paths(output: &str, count: usize) -> Vec<String> {
    if count <= 1 {
        return vec![output.to_string()];
    }
    let (stem, ext) = match Path::new(output).extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy();
            (&output[..output.len() - ext.len() - 1], format!(".{ext}"))
        }
        None => (output, String::new()),
    };
    (0..count).map(|i| format!("{stem}.{i}{ext}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_keeps_name() {
        assert_eq!(shard_paths("cap.bin", 1), vec!["cap.bin"]);
    }

    #[test]
    fn index_goes_before_extension() {
        assert_eq!(
            shard_paths("cap.bin", 3),
            vec!["cap.0.bin", "cap.1.bin", "cap.2.bin"]
        );
    }

    #[test]
    fn no_extension_appends_index() {
        assert_eq!(shard_paths("capture", 2), vec!["capture.0", "capture.1"]);
    }

    #[test]
    fn only_last_extension_moves() {
        assert_eq!(
            shard_paths("trace.tar.gz", 2),
            vec!["trace.tar.0.gz", "trace.tar.1.gz"]
        );
    }

    #[test]
    fn directories_with_dots_are_untouched() {
        assert_eq!(
            shard_paths("out.d/cap.bin", 2),
            vec!["out.d/cap.0.bin", "out.d/cap.1.bin"]
        );
    }
}
