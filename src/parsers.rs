//! Parsers for textual device command output.
//!
//! All functions here are pure over text; none of them touch a socket.

use crate::error::{AdbError, AdbResult};
use std::collections::BTreeMap;

/// Parse `pm list features` output into a feature map.
///
/// A feature without a value (`feature:android.hardware.nfc`) maps to
/// `None`, meaning "present"; `feature:reqGlEsVersion=0x30002` keeps the
/// raw value.
pub fn parse_features(text: &str) -> BTreeMap<String, Option<String>> {
    text.lines()
        .filter_map(|line| line.strip_prefix("feature:"))
        .filter(|rest| !rest.is_empty())
        .map(|rest| match rest.split_once('=') {
            Some((name, value)) => (name.to_string(), Some(value.to_string())),
            None => (rest.to_string(), None),
        })
        .collect()
}

/// Parse `getprop` output (`[key]: [value]` lines) into a property map.
pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let rest = line.strip_prefix('[')?;
            let (key, rest) = rest.split_once("]: [")?;
            let value = rest.strip_suffix(']')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Parse `pm list packages` output into package names.
pub fn parse_packages(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.strip_prefix("package:"))
        .map(|name| name.to_string())
        .collect()
}

/// Interpret `pm path <pkg>` output: installed iff any `package:` line is
/// present. An `Error:` line means the query itself failed on the device.
pub fn parse_is_installed(text: &str) -> AdbResult<bool> {
    for line in text.lines() {
        if line.starts_with("package:") {
            return Ok(true);
        }
        if line.starts_with("Error:") {
            return Err(AdbError::Device(line.to_string()));
        }
    }
    Ok(false)
}

/// Check `am start`/`am broadcast` output for failure lines.
pub fn check_am_output(text: &str) -> AdbResult<()> {
    for line in text.lines() {
        if line.starts_with("Error:") || line.starts_with("Exception:") {
            return Err(AdbError::Device(line.to_string()));
        }
    }
    Ok(())
}

/// Check `pm install` output: a `Success` line means the install took.
pub fn check_install_output(text: &str) -> AdbResult<()> {
    for line in text.lines() {
        if line.starts_with("Success") {
            return Ok(());
        }
        if line.starts_with("Failure") || line.starts_with("Error:") {
            return Err(AdbError::Device(line.to_string()));
        }
    }
    Err(AdbError::Device(format!(
        "pm install produced no verdict: {:?}",
        text.trim()
    )))
}

/// Check `pm uninstall` output. Returns `false` for a reported `Failure`
/// (typically package-not-present), which callers may treat as benign.
pub fn check_uninstall_output(text: &str) -> AdbResult<bool> {
    for line in text.lines() {
        if line.starts_with("Success") {
            return Ok(true);
        }
        if line.starts_with("Failure") {
            return Ok(false);
        }
        if line.starts_with("Error:") {
            return Err(AdbError::Device(line.to_string()));
        }
    }
    Err(AdbError::Device(format!(
        "pm uninstall produced no verdict: {:?}",
        text.trim()
    )))
}

/// One entry of the `host:list-forward` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forward {
    pub serial: String,
    pub local: String,
    pub remote: String,
}

/// Parse `host:list-forward` output (`serial local remote` triples).
pub fn parse_forward_list(text: &str) -> AdbResult<Vec<Forward>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next(), fields.next()) {
                (Some(serial), Some(local), Some(remote)) => Ok(Forward {
                    serial: serial.to_string(),
                    local: local.to_string(),
                    remote: remote.to_string(),
                }),
                _ => Err(AdbError::Parse(format!("malformed forward line: {:?}", line))),
            }
        })
        .collect()
}
