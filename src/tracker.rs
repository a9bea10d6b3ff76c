//! Device tracker: consumes the endless snapshot stream produced by
//! `host:track-devices` and turns it into add/remove/change events.

use crate::device::{Device, DeviceState};
use crate::error::AdbResult;
use crate::transport::Transport;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// The tracked devices, ordered by serial.
pub type DeviceSet = BTreeMap<String, Device>;

/// A device whose state changed between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceChange {
    pub old: Device,
    pub new: Device,
}

/// The difference between two successive snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDiff {
    pub added: Vec<Device>,
    pub removed: Vec<Device>,
    pub changed: Vec<DeviceChange>,
}

impl DeviceDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Compute the diff between two device sets.
///
/// A device counts as changed when the same serial reappears with a
/// different state.
pub fn diff(old: &DeviceSet, new: &DeviceSet) -> DeviceDiff {
    let mut result = DeviceDiff::default();
    for (serial, device) in new {
        match old.get(serial) {
            None => result.added.push(device.clone()),
            Some(previous) if previous.state != device.state => {
                result.changed.push(DeviceChange {
                    old: previous.clone(),
                    new: device.clone(),
                });
            }
            Some(_) => {}
        }
    }
    for (serial, device) in old {
        if !new.contains_key(serial) {
            result.removed.push(device.clone());
        }
    }
    result
}

/// Apply a diff to a device set; `apply_diff(s1, diff(s1, s2))` yields `s2`
/// up to fields the diff does not track.
pub fn apply_diff(set: &mut DeviceSet, diff: &DeviceDiff) {
    for device in &diff.removed {
        set.remove(&device.serial);
    }
    for device in &diff.added {
        set.insert(device.serial.clone(), device.clone());
    }
    for change in &diff.changed {
        set.insert(change.new.serial.clone(), change.new.clone());
    }
}

/// One tracker event.
///
/// Per snapshot, the per-entity events come first (in diff order), then a
/// single [`TrackerEvent::ChangeSet`] aggregating them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    Add(Device),
    Remove(Device),
    Change {
        device: Device,
        previous: DeviceState,
    },
    ChangeSet(DeviceDiff),
}

/// Long-lived consumer of the `host:track-devices` stream.
///
/// The first snapshot is diffed against an empty set, so every device
/// present at start is reported as an add.
pub struct DeviceTracker {
    transport: Transport,
    devices: DeviceSet,
    pending: VecDeque<TrackerEvent>,
    finished: bool,
}

impl DeviceTracker {
    pub(crate) fn new(transport: Transport) -> Self {
        Self {
            transport,
            devices: DeviceSet::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// The devices as of the last consumed snapshot.
    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    /// The next event, or `None` once the server has closed the stream.
    ///
    /// Any read or parse error is returned once; the tracker then stops
    /// producing events.
    pub async fn next_event(&mut self) -> AdbResult<Option<TrackerEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }
            match self.read_snapshot().await {
                Ok(Some(())) => continue,
                Ok(None) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(err) => {
                    self.finished = true;
                    return Err(err);
                }
            }
        }
    }

    /// Stop tracking and close the transport. Pending events are discarded.
    pub fn end(self) {
        debug!("device tracker ended by caller");
    }

    async fn read_snapshot(&mut self) -> AdbResult<Option<()>> {
        let Some(payload) = self.transport.read_hex_string_or_eof().await? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&payload);
        debug!("tracker snapshot: {:?}", text);

        let new: DeviceSet = Device::parse_list(&text)?
            .into_iter()
            .map(|device| (device.serial.clone(), device))
            .collect();

        let snapshot_diff = diff(&self.devices, &new);
        for device in &snapshot_diff.added {
            self.pending.push_back(TrackerEvent::Add(device.clone()));
        }
        for device in &snapshot_diff.removed {
            self.pending.push_back(TrackerEvent::Remove(device.clone()));
        }
        for change in &snapshot_diff.changed {
            self.pending.push_back(TrackerEvent::Change {
                device: change.new.clone(),
                previous: change.old.state.clone(),
            });
        }
        self.pending
            .push_back(TrackerEvent::ChangeSet(snapshot_diff));
        self.devices = new;
        Ok(Some(()))
    }
}
