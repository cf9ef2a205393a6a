//! Linux `hidraw` transport for the spine module.
//!
//! The device node is found by matching `HID_ID` in
//! `/sys/class/hidraw/*/device/uevent` against the vendor and product ids.
//! Reports are written with a leading zero report id. Reads wait at most
//! [`READ_TIMEOUT`] for the reply, so a silent module costs one short
//! transfer instead of stalling the control loop.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use quadruped_core::DeviceError;

use crate::spine::{PACKET_LEN, SpineTransport};

const SYSFS_HIDRAW: &str = "/sys/class/hidraw";

/// Longest wait for an incoming report.
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// An open `/dev/hidrawN` node.
#[derive(Debug)]
pub struct HidrawTransport {
    path: PathBuf,
    file: File,
    timeout: Duration,
}

impl HidrawTransport {
    /// Find and open the device with the given USB ids.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotFound`] if no node matches, or the open error.
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self, DeviceError> {
        let path = find_device(Path::new(SYSFS_HIDRAW), vendor_id, product_id)?;
        Self::open_path(path)
    }

    /// Open a specific device node.
    ///
    /// # Errors
    ///
    /// The open error.
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self, DeviceError> {
        let path = path.into();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        debug!(path = %path.display(), "opened hidraw device");
        Ok(Self {
            path,
            file,
            timeout: READ_TIMEOUT,
        })
    }

    /// Replace the read timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Device node path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SpineTransport for HidrawTransport {
    fn write(&mut self, packet: &[u8; PACKET_LEN]) -> Result<(), DeviceError> {
        let mut report = [0u8; PACKET_LEN + 1];
        report[1..].copy_from_slice(packet);
        let written = self.file.write(&report)?;
        if written == report.len() {
            Ok(())
        } else {
            Err(DeviceError::ShortTransfer {
                expected: report.len(),
                got: written,
            })
        }
    }

    fn read(&mut self) -> Result<[u8; PACKET_LEN], DeviceError> {
        read_report(&mut self.file, self.timeout)
    }
}

/// Read one report, or a zero-length short transfer if none arrives within
/// `timeout`.
fn read_report<R: Read + AsRawFd>(source: &mut R, timeout: Duration) -> Result<[u8; PACKET_LEN], DeviceError> {
    let mut report = [0u8; PACKET_LEN];
    let got = if wait_readable(source.as_raw_fd(), timeout)? {
        source.read(&mut report)?
    } else {
        0
    };
    if got == PACKET_LEN {
        Ok(report)
    } else {
        Err(DeviceError::ShortTransfer {
            expected: PACKET_LEN,
            got,
        })
    }
}

/// Block until `fd` is readable or `timeout` passes. `false` on timeout.
fn wait_readable(fd: RawFd, timeout: Duration) -> std::io::Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    // SAFETY: `pollfd` is a single valid entry that outlives the call.
    let ready = unsafe { libc::poll(&raw mut pollfd, 1, millis) };
    match ready {
        0 => Ok(false),
        n if n > 0 => Ok(true),
        _ => Err(std::io::Error::last_os_error()),
    }
}

/// Scan `sysfs_root` for a hidraw node whose `HID_ID` matches.
fn find_device(sysfs_root: &Path, vendor_id: u16, product_id: u16) -> Result<PathBuf, DeviceError> {
    let not_found = || DeviceError::NotFound(format!("USB HID {vendor_id:04x}:{product_id:04x}"));
    let entries = fs::read_dir(sysfs_root).map_err(|_| not_found())?;
    for entry in entries.flatten() {
        let Ok(uevent) = fs::read_to_string(entry.path().join("device/uevent")) else {
            continue;
        };
        if uevent_matches(&uevent, vendor_id, product_id) {
            return Ok(Path::new("/dev").join(entry.file_name()));
        }
    }
    Err(not_found())
}

/// Match a `HID_ID=bus:vendor:product` line (hex fields).
fn uevent_matches(uevent: &str, vendor_id: u16, product_id: u16) -> bool {
    uevent
        .lines()
        .filter_map(|line| line.strip_prefix("HID_ID="))
        .any(|id| {
            let mut fields = id.split(':').skip(1).map(|f| u32::from_str_radix(f.trim(), 16));
            matches!(
                (fields.next(), fields.next()),
                (Some(Ok(v)), Some(Ok(p))) if v == u32::from(vendor_id) && p == u32::from(product_id)
            )
        })
}
