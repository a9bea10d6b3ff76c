use crate::error::{AdbError, AdbResult};

// ADB server protocol uses a simple length-prefixed format:
//
// Request:  {4-digit hex length}{payload}
// Response: OKAY{4-digit hex length}{data}
//       or: FAIL{4-digit hex length}{error_message}

/// Largest payload that fits the 4-hex-digit length prefix.
pub const MAX_PAYLOAD: usize = 0xFFFF;

/// Format a request for the ADB server.
///
/// Encodes as `"{:04x}{payload}"` where the hex length is the payload byte
/// length. Payloads larger than [`MAX_PAYLOAD`] cannot be framed.
pub fn encode_request(payload: &str) -> AdbResult<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD {
        return Err(AdbError::Protocol(format!(
            "request payload too long: {} bytes, max {}",
            payload.len(),
            MAX_PAYLOAD
        )));
    }
    Ok(format!("{:04x}{}", payload.len(), payload).into_bytes())
}

/// The two possible response statuses from the ADB server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdbStatus {
    Okay,
    Fail,
}

/// Parse a 4-byte status prefix (`OKAY` or `FAIL`) from a byte slice.
pub fn parse_status(buf: &[u8]) -> AdbResult<AdbStatus> {
    if buf.len() < 4 {
        return Err(AdbError::Protocol(format!(
            "status too short: {} bytes, need 4",
            buf.len()
        )));
    }
    match &buf[..4] {
        b"OKAY" => Ok(AdbStatus::Okay),
        b"FAIL" => Ok(AdbStatus::Fail),
        other => Err(AdbError::Protocol(format!(
            "expected OKAY or FAIL, got {:?}",
            String::from_utf8_lossy(other)
        ))),
    }
}

/// Parse a 4-character ASCII hex length into a `usize`.
pub fn parse_hex_length(buf: &[u8]) -> AdbResult<usize> {
    if buf.len() < 4 {
        return Err(AdbError::Protocol(format!(
            "hex length too short: {} bytes, need 4",
            buf.len()
        )));
    }
    let hex_str = std::str::from_utf8(&buf[..4])
        .map_err(|_| AdbError::Protocol(format!("invalid UTF-8 in hex length: {:?}", &buf[..4])))?;
    usize::from_str_radix(hex_str, 16)
        .map_err(|_| AdbError::Protocol(format!("invalid hex length: {:?}", hex_str)))
}

/// Host service commands, handled by the ADB server itself.
#[derive(Debug, Clone)]
pub enum HostCommand {
    /// Get ADB server protocol version.
    Version,
    /// List connected devices in short format.
    Devices,
    /// List connected devices with extended info.
    DevicesLong,
    /// Stream device connect/disconnect events.
    TrackDevices,
    /// Switch to a specific device by serial number.
    Transport(String),
    /// Switch to any available device.
    TransportAny,
    /// Kill the ADB server.
    Kill,
    /// List active port forwards.
    ListForward,
    /// Establish a port forward, e.g. `tcp:6100` -> `tcp:7100`.
    Forward { local: String, remote: String },
}

impl HostCommand {
    /// Convert the command to its wire format string.
    pub fn to_wire(&self) -> String {
        match self {
            HostCommand::Version => "host:version".to_string(),
            HostCommand::Devices => "host:devices".to_string(),
            HostCommand::DevicesLong => "host:devices-l".to_string(),
            HostCommand::TrackDevices => "host:track-devices".to_string(),
            HostCommand::Transport(serial) => format!("host:transport:{}", serial),
            HostCommand::TransportAny => "host:transport-any".to_string(),
            HostCommand::Kill => "host:kill".to_string(),
            HostCommand::ListForward => "host:list-forward".to_string(),
            HostCommand::Forward { local, remote } => {
                format!("host:forward:{};{}", local, remote)
            }
        }
    }

    /// Encode the command as a full request (with length prefix).
    pub fn encode(&self) -> AdbResult<Vec<u8>> {
        encode_request(&self.to_wire())
    }
}

/// Local service commands, forwarded to the device after transport selection.
#[derive(Debug, Clone)]
pub enum LocalCommand {
    /// Execute a shell command on the device.
    Shell(String),
    /// Enter file sync mode.
    Sync,
    /// Grab the current screen contents.
    Framebuffer,
    /// Open a raw TCP tunnel to a port on the device.
    Tcp { port: u16, host: Option<String> },
    /// Connect to the JDWP pid stream.
    Jdwp,
    /// Open a named log stream (e.g. `main`, `events`, `radio`).
    Log(String),
    /// Remount `/system` read-write.
    Remount,
    /// Reboot the device, optionally into `bootloader` or `recovery`.
    Reboot(Option<String>),
}

impl LocalCommand {
    /// Convert the command to its wire format string.
    pub fn to_wire(&self) -> String {
        match self {
            LocalCommand::Shell(cmd) => format!("shell:{}", cmd),
            LocalCommand::Sync => "sync:".to_string(),
            LocalCommand::Framebuffer => "framebuffer:".to_string(),
            LocalCommand::Tcp { port, host } => match host {
                Some(host) => format!("tcp:{}:{}", port, host),
                None => format!("tcp:{}", port),
            },
            LocalCommand::Jdwp => "jdwp".to_string(),
            LocalCommand::Log(name) => format!("log:{}", name),
            LocalCommand::Remount => "remount:".to_string(),
            LocalCommand::Reboot(mode) => match mode {
                Some(mode) => format!("reboot:{}", mode),
                None => "reboot:".to_string(),
            },
        }
    }

    /// Encode the command as a full request (with length prefix).
    pub fn encode(&self) -> AdbResult<Vec<u8>> {
        encode_request(&self.to_wire())
    }
}
