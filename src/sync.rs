//! SYNC sub-protocol: the file-transfer framing layered on a transport
//! that has been switched via `sync:`.
//!
//! Requests and responses carry a 4-byte ASCII id word followed by a
//! 4-byte little-endian u32 whose meaning depends on the id (payload
//! length for most, mode/mtime for STAT and DONE).

use crate::cancel::CancelToken;
use crate::error::{AdbError, AdbResult};
use crate::transport::Transport;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Maximum payload of one DATA frame (ADB limit). Larger writes are split.
pub const SYNC_DATA_MAX: u32 = 64 * 1024;

/// Sync protocol id words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncId {
    Stat,
    List,
    Send,
    Recv,
    Data,
    Done,
    Okay,
    Fail,
    Dent,
    Quit,
}

impl SyncId {
    /// The 4-byte ASCII representation of this id.
    pub fn as_bytes(&self) -> &[u8; 4] {
        match self {
            SyncId::Stat => b"STAT",
            SyncId::List => b"LIST",
            SyncId::Send => b"SEND",
            SyncId::Recv => b"RECV",
            SyncId::Data => b"DATA",
            SyncId::Done => b"DONE",
            SyncId::Okay => b"OKAY",
            SyncId::Fail => b"FAIL",
            SyncId::Dent => b"DENT",
            SyncId::Quit => b"QUIT",
        }
    }

    /// Parse a 4-byte ASCII slice into a `SyncId`.
    pub fn from_bytes(bytes: &[u8]) -> AdbResult<SyncId> {
        if bytes.len() < 4 {
            return Err(AdbError::Protocol(format!(
                "sync id too short: {} bytes, need 4",
                bytes.len()
            )));
        }
        match &bytes[..4] {
            b"STAT" => Ok(SyncId::Stat),
            b"LIST" => Ok(SyncId::List),
            b"SEND" => Ok(SyncId::Send),
            b"RECV" => Ok(SyncId::Recv),
            b"DATA" => Ok(SyncId::Data),
            b"DONE" => Ok(SyncId::Done),
            b"OKAY" => Ok(SyncId::Okay),
            b"FAIL" => Ok(SyncId::Fail),
            b"DENT" => Ok(SyncId::Dent),
            b"QUIT" => Ok(SyncId::Quit),
            other => Err(AdbError::Protocol(format!(
                "unknown sync id: {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

/// The common 8-byte frame head: id word + little-endian u32.
///
/// The u32 is a payload length for SEND/RECV/LIST/STAT requests and
/// DATA/FAIL responses, the mtime for DONE on pushes, and ignored for QUIT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncHeader {
    pub id: SyncId,
    pub arg: u32,
}

impl SyncHeader {
    pub fn new(id: SyncId, arg: u32) -> Self {
        Self { id, arg }
    }

    /// Serialize to exactly 8 bytes.
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..4].copy_from_slice(self.id.as_bytes());
        buf[4..8].copy_from_slice(&self.arg.to_le_bytes());
        buf
    }

    /// Parse from a byte slice (must be at least 8 bytes).
    pub fn from_bytes(buf: &[u8]) -> AdbResult<Self> {
        if buf.len() < 8 {
            return Err(AdbError::Protocol(format!(
                "sync header too short: {} bytes, need 8",
                buf.len()
            )));
        }
        let id = SyncId::from_bytes(&buf[0..4])?;
        let arg = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Ok(Self { id, arg })
    }
}

/// Encode a request or data frame: id word + LE length + payload.
pub fn encode_frame(id: SyncId, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(&SyncHeader::new(id, payload.len() as u32).to_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// File metadata as returned by STAT.
///
/// A mode of zero means the path does not exist; the server reports it
/// that way instead of failing the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Unix file mode (type + permissions).
    pub mode: u32,
    /// File size in bytes.
    pub size: u32,
    /// Last modification time (seconds since epoch).
    pub mtime: u32,
}

impl FileStat {
    /// Parse from the 12 bytes following the STAT id.
    pub fn from_bytes(buf: &[u8]) -> AdbResult<Self> {
        if buf.len() < 12 {
            return Err(AdbError::Protocol(format!(
                "STAT response too short: {} bytes, need 12",
                buf.len()
            )));
        }
        Ok(Self {
            mode: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            mtime: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }

    /// Whether the path exists at all.
    pub fn exists(&self) -> bool {
        self.mode != 0
    }

    /// Whether this is a regular file (S_IFREG).
    pub fn is_file(&self) -> bool {
        (self.mode & 0o170000) == 0o100000
    }

    /// Whether this is a directory (S_IFDIR).
    pub fn is_directory(&self) -> bool {
        (self.mode & 0o170000) == 0o040000
    }

    /// Whether this is a symlink (S_IFLNK).
    pub fn is_symlink(&self) -> bool {
        (self.mode & 0o170000) == 0o120000
    }

    /// The permission bits (lower 12 bits).
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// One directory entry from a LIST response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub mode: u32,
    pub size: u32,
    pub mtime: u32,
}

/// A transport switched into SYNC mode, ready for file operations.
///
/// `stat` and `list` can be issued repeatedly on the same session;
/// `send`/`recv` hand the session over to a transfer handle, and `quit`
/// tears it down.
pub struct SyncConnection {
    transport: Transport,
}

impl SyncConnection {
    pub(crate) fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Stat a remote path. A non-existent path yields a stat whose
    /// [`FileStat::exists`] is false rather than an error.
    pub async fn stat(&mut self, path: &str) -> AdbResult<FileStat> {
        debug!("sync stat {:?}", path);
        self.transport
            .write_all(&encode_frame(SyncId::Stat, path.as_bytes()))
            .await?;

        let mut head = [0u8; 8];
        self.transport.read_exact(&mut head).await?;
        let header = SyncHeader::from_bytes(&head)?;
        match header.id {
            SyncId::Stat => {
                // The u32 already read is the mode; size and mtime follow.
                let mut rest = [0u8; 8];
                self.transport.read_exact(&mut rest).await?;
                Ok(FileStat {
                    mode: header.arg,
                    size: u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]),
                    mtime: u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]),
                })
            }
            SyncId::Fail => Err(self.read_fail(header.arg).await),
            other => Err(AdbError::Protocol(format!(
                "expected STAT response, got {:?}",
                other
            ))),
        }
    }

    /// List a remote directory. `.` and `..` are filtered out.
    pub async fn list(&mut self, path: &str) -> AdbResult<Vec<FileEntry>> {
        debug!("sync list {:?}", path);
        self.transport
            .write_all(&encode_frame(SyncId::List, path.as_bytes()))
            .await?;

        let mut entries = Vec::new();
        loop {
            let mut id_buf = [0u8; 4];
            self.transport.read_exact(&mut id_buf).await?;
            match SyncId::from_bytes(&id_buf)? {
                SyncId::Dent => {
                    // mode, size, mtime, namelen, then the name itself.
                    let mut fields = [0u8; 16];
                    self.transport.read_exact(&mut fields).await?;
                    let mode = u32::from_le_bytes([fields[0], fields[1], fields[2], fields[3]]);
                    let size = u32::from_le_bytes([fields[4], fields[5], fields[6], fields[7]]);
                    let mtime = u32::from_le_bytes([fields[8], fields[9], fields[10], fields[11]]);
                    let namelen =
                        u32::from_le_bytes([fields[12], fields[13], fields[14], fields[15]]);
                    let mut name = vec![0u8; namelen as usize];
                    self.transport.read_exact(&mut name).await?;
                    let name = String::from_utf8_lossy(&name).to_string();
                    if name != "." && name != ".." {
                        entries.push(FileEntry {
                            name,
                            mode,
                            size,
                            mtime,
                        });
                    }
                }
                SyncId::Done => {
                    // DONE carries the same 16-byte field block; drain and
                    // discard so the session stays frame-aligned.
                    let mut fields = [0u8; 16];
                    self.transport.read_exact(&mut fields).await?;
                    break;
                }
                SyncId::Fail => {
                    let mut len_buf = [0u8; 4];
                    self.transport.read_exact(&mut len_buf).await?;
                    let len = u32::from_le_bytes(len_buf);
                    return Err(self.read_fail(len).await);
                }
                other => {
                    return Err(AdbError::Protocol(format!(
                        "unexpected sync id in LIST response: {:?}",
                        other
                    )));
                }
            }
        }
        Ok(entries)
    }

    /// Begin pushing a file to `path` with the given Unix mode. Returns a
    /// transfer handle; the session is consumed until the transfer ends.
    pub async fn send(mut self, path: &str, mode: u32) -> AdbResult<PushTransfer> {
        debug!("sync send {:?} mode {:o}", path, mode);
        let request = format!("{},{}", path, mode);
        self.transport
            .write_all(&encode_frame(SyncId::Send, request.as_bytes()))
            .await?;
        Ok(PushTransfer {
            transport: self.transport,
            cancel: CancelToken::new(),
            bytes_transferred: 0,
        })
    }

    /// Begin pulling the file at `path`. Returns a transfer handle that
    /// surfaces chunks as they arrive; nothing is buffered beyond one frame.
    pub async fn recv(mut self, path: &str) -> AdbResult<PullTransfer> {
        debug!("sync recv {:?}", path);
        self.transport
            .write_all(&encode_frame(SyncId::Recv, path.as_bytes()))
            .await?;
        Ok(PullTransfer {
            transport: self.transport,
            cancel: CancelToken::new(),
            bytes_transferred: 0,
            done: false,
        })
    }

    /// End the session. The connection closes once QUIT is written.
    pub async fn quit(mut self) -> AdbResult<()> {
        self.transport
            .write_all(&SyncHeader::new(SyncId::Quit, 0).to_bytes())
            .await?;
        Ok(())
    }

    async fn read_fail(&mut self, len: u32) -> AdbError {
        let mut msg = vec![0u8; len as usize];
        match self.transport.read_exact(&mut msg).await {
            Ok(()) => AdbError::Remote(String::from_utf8_lossy(&msg).to_string()),
            Err(err) => err,
        }
    }
}

async fn read_header_cancellable(
    transport: &mut Transport,
    cancel: &CancelToken,
) -> AdbResult<SyncHeader> {
    let mut head = [0u8; 8];
    tokio::select! {
        _ = cancel.cancelled() => return Err(AdbError::Cancelled),
        res = transport.read_exact(&mut head) => res?,
    }
    SyncHeader::from_bytes(&head)
}

async fn read_exact_cancellable(
    transport: &mut Transport,
    cancel: &CancelToken,
    buf: &mut [u8],
) -> AdbResult<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(AdbError::Cancelled),
        res = transport.read_exact(buf) => res,
    }
}

/// Progress handle for an outgoing SEND transfer.
///
/// Bytes are counted after each successful DATA write. Cancelling fails
/// any in-flight or subsequent call with `Cancelled`; the session is
/// unusable afterwards and an interrupted push may leave the remote file
/// partially written.
pub struct PushTransfer {
    transport: Transport,
    cancel: CancelToken,
    bytes_transferred: u64,
}

impl PushTransfer {
    /// Write file content. Slices larger than [`SYNC_DATA_MAX`] are split
    /// into multiple DATA frames.
    pub async fn write(&mut self, data: &[u8]) -> AdbResult<()> {
        for chunk in data.chunks(SYNC_DATA_MAX as usize) {
            if self.cancel.is_cancelled() {
                return Err(AdbError::Cancelled);
            }
            let frame = encode_frame(SyncId::Data, chunk);
            let cancel = self.cancel.clone();
            tokio::select! {
                _ = cancel.cancelled() => return Err(AdbError::Cancelled),
                res = self.transport.write_all(&frame) => res?,
            }
            self.bytes_transferred += chunk.len() as u64;
        }
        Ok(())
    }

    /// Drain an async reader into the transfer.
    pub async fn write_from<R: AsyncRead + Unpin>(&mut self, source: &mut R) -> AdbResult<u64> {
        let mut buf = vec![0u8; SYNC_DATA_MAX as usize];
        loop {
            let n = source.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            self.write(&buf[..n]).await?;
        }
        Ok(self.bytes_transferred)
    }

    /// Terminate the transfer: send `DONE` with the mtime the device
    /// should record, then wait for the server's verdict.
    pub async fn finish(mut self, mtime: u32) -> AdbResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AdbError::Cancelled);
        }
        self.transport
            .write_all(&SyncHeader::new(SyncId::Done, mtime).to_bytes())
            .await?;

        let header = read_header_cancellable(&mut self.transport, &self.cancel).await?;
        match header.id {
            SyncId::Okay => Ok(()),
            SyncId::Fail => {
                let mut msg = vec![0u8; header.arg as usize];
                self.transport.read_exact(&mut msg).await?;
                Err(AdbError::Remote(String::from_utf8_lossy(&msg).to_string()))
            }
            other => Err(AdbError::Protocol(format!(
                "expected OKAY after push, got {:?}",
                other
            ))),
        }
    }

    /// DATA payload bytes written so far.
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// A handle for cancelling this transfer from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Progress handle and byte source for an incoming RECV transfer.
///
/// Bytes are counted as each DATA frame arrives, before delivery. Reads
/// from the server happen only inside [`PullTransfer::next_chunk`], so a
/// slow consumer naturally back-pressures the transport.
pub struct PullTransfer {
    transport: Transport,
    cancel: CancelToken,
    bytes_transferred: u64,
    done: bool,
}

impl PullTransfer {
    /// The next DATA payload, or `None` once the server sent DONE.
    pub async fn next_chunk(&mut self) -> AdbResult<Option<Bytes>> {
        if self.done {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            return Err(AdbError::Cancelled);
        }
        let header = read_header_cancellable(&mut self.transport, &self.cancel).await?;
        match header.id {
            SyncId::Data => {
                let mut buf = vec![0u8; header.arg as usize];
                read_exact_cancellable(&mut self.transport, &self.cancel, &mut buf).await?;
                self.bytes_transferred += header.arg as u64;
                Ok(Some(Bytes::from(buf)))
            }
            SyncId::Done => {
                self.done = true;
                Ok(None)
            }
            SyncId::Fail => {
                let mut msg = vec![0u8; header.arg as usize];
                self.transport.read_exact(&mut msg).await?;
                Err(AdbError::Remote(String::from_utf8_lossy(&msg).to_string()))
            }
            other => Err(AdbError::Protocol(format!(
                "expected DATA or DONE in pull, got {:?}",
                other
            ))),
        }
    }

    /// Drain the remaining chunks into an async writer.
    pub async fn write_to<W: AsyncWrite + Unpin>(&mut self, sink: &mut W) -> AdbResult<u64> {
        while let Some(chunk) = self.next_chunk().await? {
            sink.write_all(&chunk).await?;
        }
        Ok(self.bytes_transferred)
    }

    /// DATA payload bytes received so far.
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// A handle for cancelling this transfer from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}
