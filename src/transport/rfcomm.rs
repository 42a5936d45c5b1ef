//! # Bluetooth RFCOMM Link
//!
//! Classic Bluetooth Serial Port Profile (SPP) backend. The printer must be
//! paired and bound to an RFCOMM device node first:
//!
//! ```bash
//! $ bluetoothctl
//! [bluetooth]# pair 00:11:62:XX:XX:XX
//! $ sudo rfcomm bind 0 00:11:62:XX:XX:XX
//! # creates /dev/rfcomm0
//! ```
//!
//! A device id is either a node path (`/dev/rfcomm0`) or the MAC address of
//! a bound printer, which is resolved through `/proc/net/rfcomm`.
//!
//! ## TTY Configuration
//!
//! The node is switched to raw mode so binary data passes untouched:
//!
//! - **No input processing**: IGNBRK, BRKINT, PARMRK, ISTRIP, INLCR, IGNCR, ICRNL cleared
//! - **No software flow control**: IXON, IXOFF, IXANY cleared
//! - **No output processing**: OPOST cleared
//! - **8-bit characters**: CS8, no parity
//! - **Non-canonical, no echo**: ICANON, ECHO, ECHONL, ISIG, IEXTEN cleared

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Link, LinkHandle, Route};
use crate::error::LinkError;

/// Default RFCOMM device path
pub const DEFAULT_DEVICE: &str = "/dev/rfcomm0";

/// Serial Port Profile service class UUID
pub const SPP_UUID: &str = "00001101-0000-1000-8000-00805F9B34FB";

/// Kernel table of bound RFCOMM nodes
const RFCOMM_TABLE: &str = "/proc/net/rfcomm";

struct Connection {
    device_id: String,
    path: PathBuf,
    file: File,
}

/// Link over an RFCOMM tty. Holds at most one open device node.
#[derive(Default)]
pub struct RfcommLink {
    connection: Mutex<Option<Connection>>,
}

impl RfcommLink {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolve a device id to an RFCOMM node path.
async fn resolve_device(device_id: &str) -> Result<PathBuf, LinkError> {
    if device_id.starts_with('/') {
        return Ok(PathBuf::from(device_id));
    }
    if !is_valid_mac(device_id) {
        return Err(LinkError::DeviceNotFound(device_id.to_string()));
    }
    lookup_rfcomm_node(Path::new(RFCOMM_TABLE), device_id)
        .await
        .ok_or_else(|| LinkError::DeviceNotFound(device_id.to_string()))
}

/// Find the bound node for `mac` in an RFCOMM table file. The node must exist.
async fn lookup_rfcomm_node(table: &Path, mac: &str) -> Option<PathBuf> {
    let contents = match tokio::fs::read_to_string(table).await {
        Ok(contents) => contents,
        Err(e) => {
            debug!(table = %table.display(), error = %e, "cannot read rfcomm table");
            return None;
        }
    };
    let path = parse_rfcomm_table(&contents, mac)?;
    match tokio::fs::try_exists(&path).await {
        Ok(true) => Some(path),
        Ok(false) => {
            debug!(path = %path.display(), "rfcomm node is not present");
            None
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cannot stat rfcomm node");
            None
        }
    }
}

fn classify_io(device_id: &str, err: io::Error) -> LinkError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected => {
            LinkError::Disconnected(device_id.to_string())
        }
        _ if err.raw_os_error() == Some(libc::ENODEV) || err.raw_os_error() == Some(libc::EIO) => {
            LinkError::Disconnected(device_id.to_string())
        }
        _ => LinkError::WriteFailed(err.to_string()),
    }
}

#[async_trait]
impl Link for RfcommLink {
    async fn connect(&self, device_id: &str) -> Result<(), LinkError> {
        let path = resolve_device(device_id).await?;
        let std_file = OpenOptions::new().write(true).open(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                LinkError::DeviceNotFound(path.display().to_string())
            } else {
                LinkError::ServiceNotFound(format!("{}: {}", path.display(), e))
            }
        })?;
        configure_tty_raw(&std_file)
            .map_err(|e| LinkError::ServiceNotFound(format!("{}: {}", path.display(), e)))?;

        info!(device = %device_id, path = %path.display(), "rfcomm connected");
        *self.connection.lock().await = Some(Connection {
            device_id: device_id.to_string(),
            path,
            file: File::from_std(std_file),
        });
        Ok(())
    }

    async fn disconnect(&self, device_id: &str) -> Result<(), LinkError> {
        let mut connection = self.connection.lock().await;
        if connection.as_ref().is_some_and(|c| c.device_id == device_id) {
            *connection = None;
            debug!(device = %device_id, "rfcomm closed");
        }
        Ok(())
    }

    async fn is_connected(&self, device_id: &str) -> Result<bool, LinkError> {
        let connection = self.connection.lock().await;
        match connection.as_ref() {
            Some(c) if c.device_id == device_id => {
                Ok(tokio::fs::try_exists(&c.path).await.unwrap_or(false))
            }
            _ => Ok(false),
        }
    }

    async fn discover_write_characteristic(&self, device_id: &str) -> Result<Route, LinkError> {
        let connection = self.connection.lock().await;
        match connection.as_ref() {
            Some(c) if c.device_id == device_id => Ok(Route {
                service: SPP_UUID.to_string(),
                characteristic: c.path.display().to_string(),
            }),
            _ => Err(LinkError::Disconnected(device_id.to_string())),
        }
    }

    async fn write(&self, handle: &LinkHandle, data: &[u8]) -> Result<(), LinkError> {
        let device_id = handle.device_id();
        let mut connection = self.connection.lock().await;
        let conn = match connection.as_mut() {
            Some(c) if c.device_id == device_id => c,
            _ => return Err(LinkError::Disconnected(device_id.to_string())),
        };

        let result = async {
            conn.file.write_all(data).await?;
            conn.file.flush().await
        }
        .await;

        if let Err(e) = result {
            let err = classify_io(device_id, e);
            if err.is_disconnect() {
                *connection = None;
            }
            return Err(err);
        }
        Ok(())
    }
}

/// Configure a file for raw TTY mode.
///
/// IXON/IXOFF/IXANY must be cleared: 0x11 (XON) and 0x13 (XOFF) show up in
/// raster data and would otherwise be swallowed by the line discipline.
#[cfg(unix)]
fn configure_tty_raw(file: &std::fs::File) -> io::Result<()> {
    use std::mem::MaybeUninit;
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let mut termios = MaybeUninit::uninit();
    if unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);
    termios.c_oflag &= !libc::OPOST;
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn configure_tty_raw(_file: &std::fs::File) -> io::Result<()> {
    Ok(())
}

/// Validate a Bluetooth MAC address format (XX:XX:XX:XX:XX:XX).
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Find the node bound to `mac` in `/proc/net/rfcomm` contents.
///
/// Lines look like `rfcomm0: 00:11:62:AA:BB:CC channel 1 clean`.
pub fn parse_rfcomm_table(contents: &str, mac: &str) -> Option<PathBuf> {
    let mac_upper = mac.to_uppercase();
    contents
        .lines()
        .find(|line| line.to_uppercase().contains(&mac_upper))
        .and_then(|line| line.split(':').next())
        .map(|name| Path::new("/dev").join(name.trim()))
}
