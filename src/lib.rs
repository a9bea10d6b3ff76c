mod cancel;
mod client;
mod device;
mod error;
mod framebuffer;
mod intent;
mod parsers;
mod protocol;
mod shell;
mod sync;
mod tracker;
mod transport;

pub use cancel::CancelToken;
pub use client::{AdbClient, MonkeyHandle};
pub use device::{Device, DeviceState};
pub use error::{AdbError, AdbResult};
pub use framebuffer::{Framebuffer, FramebufferMeta, PixelFormat};
pub use intent::{ExtraValue, Intent};
pub use parsers::Forward;
pub use protocol::{HostCommand, LocalCommand};
pub use shell::{escape, join};
pub use sync::{
    FileEntry, FileStat, PullTransfer, PushTransfer, SyncConnection, SyncHeader, SyncId,
    SYNC_DATA_MAX,
};
pub use tracker::{
    apply_diff, diff, DeviceChange, DeviceDiff, DeviceSet, DeviceTracker, TrackerEvent,
};
pub use transport::Transport;
