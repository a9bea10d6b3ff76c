use crate::error::{AdbError, AdbResult};
use std::fmt;

/// State of a device as reported by the ADB server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    /// Fully operational device.
    Device,
    /// Emulator instance.
    Emulator,
    /// Device is offline.
    Offline,
    /// Device requires USB debugging authorization.
    Unauthorized,
    /// Device is in fastboot/bootloader mode.
    Bootloader,
    /// Device is in recovery mode.
    Recovery,
    /// Insufficient permissions to communicate with device.
    NoPermissions,
    /// The host machine itself (network transports).
    Host,
    /// Any state token this client does not know about.
    Unknown(String),
}

impl DeviceState {
    pub fn parse(s: &str) -> Self {
        match s {
            "device" => DeviceState::Device,
            "emulator" => DeviceState::Emulator,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            "bootloader" => DeviceState::Bootloader,
            "recovery" => DeviceState::Recovery,
            "no permissions" => DeviceState::NoPermissions,
            "host" => DeviceState::Host,
            other => DeviceState::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::Device => write!(f, "device"),
            DeviceState::Emulator => write!(f, "emulator"),
            DeviceState::Offline => write!(f, "offline"),
            DeviceState::Unauthorized => write!(f, "unauthorized"),
            DeviceState::Bootloader => write!(f, "bootloader"),
            DeviceState::Recovery => write!(f, "recovery"),
            DeviceState::NoPermissions => write!(f, "no permissions"),
            DeviceState::Host => write!(f, "host"),
            DeviceState::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// One device as known by the ADB server.
///
/// The short listing (`host:devices`) fills `serial` and `state` only; the
/// long listing (`host:devices-l`) may add the USB path and the
/// `product:`/`model:`/`device:`/`transport_id:` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub serial: String,
    pub state: DeviceState,
    pub path: Option<String>,
    pub product: Option<String>,
    pub model: Option<String>,
    pub device: Option<String>,
    pub transport_id: Option<u64>,
}

impl Device {
    fn bare(serial: String, state: DeviceState) -> Self {
        Self {
            serial,
            state,
            path: None,
            product: None,
            model: None,
            device: None,
            transport_id: None,
        }
    }

    /// Parse one line of device-list output. Accepts both the tab-separated
    /// short form and the space-padded long form.
    pub fn parse_line(line: &str) -> AdbResult<Device> {
        let mut tokens = line.split_whitespace();
        let serial = tokens
            .next()
            .ok_or_else(|| AdbError::Parse(format!("empty device line: {:?}", line)))?
            .to_string();
        let state_token = tokens
            .next()
            .ok_or_else(|| AdbError::Parse(format!("device line missing state: {:?}", line)))?;

        // "no permissions" is the one state that spans two tokens.
        let mut rest: Vec<&str> = tokens.collect();
        let state = if state_token == "no" && rest.first() == Some(&"permissions") {
            rest.remove(0);
            DeviceState::NoPermissions
        } else {
            DeviceState::parse(state_token)
        };

        let mut device = Device::bare(serial, state);
        for token in rest {
            match token.split_once(':') {
                Some(("product", v)) => device.product = Some(v.to_string()),
                Some(("model", v)) => device.model = Some(v.to_string()),
                Some(("device", v)) => device.device = Some(v.to_string()),
                Some(("transport_id", v)) => device.transport_id = v.parse().ok(),
                // Anything before the key:value pairs is the USB path.
                _ => device.path = Some(token.to_string()),
            }
        }
        Ok(device)
    }

    /// Parse the full device-list payload of `host:devices`/`host:devices-l`.
    pub fn parse_list(data: &str) -> AdbResult<Vec<Device>> {
        data.lines()
            .filter(|line| !line.trim().is_empty())
            .map(Device::parse_line)
            .collect()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.serial, self.state)
    }
}
