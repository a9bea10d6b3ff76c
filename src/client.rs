use crate::cancel::CancelToken;
use crate::device::Device;
use crate::error::{AdbError, AdbResult};
use crate::framebuffer::{self, Framebuffer, FramebufferMeta};
use crate::intent::Intent;
use crate::parsers::{self, Forward};
use crate::protocol::{HostCommand, LocalCommand};
use crate::shell;
use crate::sync::{FileEntry, FileStat, SyncConnection};
use crate::tracker::DeviceTracker;
use crate::transport::Transport;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Delay between `sys.boot_completed` probes.
const BOOT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Client for the ADB server's host protocol.
///
/// Each command opens a fresh TCP connection to the server; concurrency
/// between commands comes from independent connections, never from
/// multiplexing one. This matches the server's own model.
pub struct AdbClient {
    host: String,
    port: u16,
    bin: PathBuf,
}

impl AdbClient {
    /// Client for the default ADB server at `127.0.0.1:5037`.
    pub fn new() -> Self {
        Self::with_address("127.0.0.1", 5037)
    }

    /// Client for a server at a specific address.
    pub fn with_address(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            bin: PathBuf::from("adb"),
        }
    }

    /// Override the binary used to spawn a missing server
    /// (`<bin> start-server`).
    pub fn server_binary(mut self, bin: impl Into<PathBuf>) -> Self {
        self.bin = bin.into();
        self
    }

    fn is_local(&self) -> bool {
        self.host == "127.0.0.1" || self.host == "localhost"
    }

    /// Open a new connection to the ADB server.
    ///
    /// If the very first connect is refused and the server is local, spawn
    /// `<bin> start-server` once and retry.
    async fn connect(&self) -> AdbResult<Transport> {
        let addr = format!("{}:{}", self.host, self.port);
        debug!("connecting to adb server at {}", addr);
        match TcpStream::connect(&addr).await {
            Ok(stream) => Ok(Transport::new(stream)),
            Err(err)
                if err.kind() == std::io::ErrorKind::ConnectionRefused && self.is_local() =>
            {
                debug!("connection refused, spawning {:?} start-server", self.bin);
                let spawned = tokio::process::Command::new(&self.bin)
                    .arg("start-server")
                    .status()
                    .await;
                match spawned {
                    Ok(status) if status.success() => {
                        let stream = TcpStream::connect(&addr).await?;
                        Ok(Transport::new(stream))
                    }
                    // Bootstrap did not pan out; surface the original refusal.
                    _ => Err(AdbError::Connection(err)),
                }
            }
            Err(err) => Err(AdbError::Connection(err)),
        }
    }

    /// Issue a host command and leave the transport positioned after OKAY.
    async fn host_request(&self, command: &HostCommand) -> AdbResult<Transport> {
        let mut transport = self.connect().await?;
        transport.send(&command.to_wire()).await?;
        transport.read_status().await?;
        Ok(transport)
    }

    /// Bind a fresh transport to a device, then switch it into a local
    /// service. The returned transport is positioned after the second OKAY.
    async fn device_service(
        &self,
        serial: Option<&str>,
        command: &LocalCommand,
    ) -> AdbResult<Transport> {
        let mut transport = self.connect().await?;
        let transport_cmd = match serial {
            Some(serial) => HostCommand::Transport(serial.to_string()),
            None => HostCommand::TransportAny,
        };
        transport.send(&transport_cmd.to_wire()).await?;
        transport.read_status().await?;
        transport.send(&command.to_wire()).await?;
        transport.read_status().await?;
        Ok(transport)
    }

    async fn shell_text(&self, serial: Option<&str>, command: &str) -> AdbResult<String> {
        let output = self.shell(serial, command).await?;
        Ok(String::from_utf8_lossy(&output).to_string())
    }

    // --- Host services ---

    /// Get the ADB server protocol version.
    pub async fn server_version(&self) -> AdbResult<u32> {
        let mut transport = self.host_request(&HostCommand::Version).await?;
        let data = transport.read_hex_string().await?;
        let hex_str = std::str::from_utf8(&data)
            .map_err(|_| AdbError::Protocol("invalid UTF-8 in version response".into()))?;
        u32::from_str_radix(hex_str, 16)
            .map_err(|_| AdbError::Protocol(format!("invalid version hex: {:?}", hex_str)))
    }

    /// List connected devices.
    pub async fn devices(&self) -> AdbResult<Vec<Device>> {
        let mut transport = self.host_request(&HostCommand::Devices).await?;
        let data = transport.read_hex_string().await?;
        Device::parse_list(&String::from_utf8_lossy(&data))
    }

    /// List connected devices with path/product/model details.
    pub async fn devices_long(&self) -> AdbResult<Vec<Device>> {
        let mut transport = self.host_request(&HostCommand::DevicesLong).await?;
        let data = transport.read_hex_string().await?;
        Device::parse_list(&String::from_utf8_lossy(&data))
    }

    /// Ask the server to exit. The server may close the connection instead
    /// of acknowledging; both count as success.
    pub async fn kill(&self) -> AdbResult<()> {
        let mut transport = self.connect().await?;
        transport.send(&HostCommand::Kill.to_wire()).await?;
        match transport.read_status().await {
            Ok(()) => Ok(()),
            Err(AdbError::Connection(ref err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Start tracking device arrivals and departures.
    pub async fn track_devices(&self) -> AdbResult<DeviceTracker> {
        let transport = self.host_request(&HostCommand::TrackDevices).await?;
        Ok(DeviceTracker::new(transport))
    }

    /// Establish a port forward, e.g. `tcp:6100` -> `tcp:7100`.
    ///
    /// Some server versions acknowledge twice, some once; both are accepted.
    pub async fn forward(&self, local: &str, remote: &str) -> AdbResult<()> {
        let command = HostCommand::Forward {
            local: local.to_string(),
            remote: remote.to_string(),
        };
        let mut transport = self.host_request(&command).await?;
        match transport.read_status().await {
            Ok(()) => Ok(()),
            Err(AdbError::Connection(ref err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// List active port forwards.
    pub async fn list_forwards(&self) -> AdbResult<Vec<Forward>> {
        let mut transport = self.host_request(&HostCommand::ListForward).await?;
        let data = transport.read_hex_string().await?;
        parsers::parse_forward_list(&String::from_utf8_lossy(&data))
    }

    // --- Device services ---

    /// Execute a shell command on the device and collect its entire output.
    /// Stdout and stderr arrive interleaved; the wire does not separate them.
    pub async fn shell(&self, serial: Option<&str>, command: &str) -> AdbResult<Vec<u8>> {
        let mut transport = self
            .device_service(serial, &LocalCommand::Shell(command.to_string()))
            .await?;
        transport.read_to_end().await
    }

    /// Like [`AdbClient::shell`], but builds the command line from an
    /// argument vector with each argument shell-escaped.
    pub async fn shell_args<S: AsRef<str>>(
        &self,
        serial: Option<&str>,
        args: &[S],
    ) -> AdbResult<Vec<u8>> {
        self.shell(serial, &shell::join(args)).await
    }

    /// Execute a shell command and hand back the raw stream for the caller
    /// to consume (e.g. long-running commands, logcat pipelines).
    pub async fn shell_stream(
        &self,
        serial: Option<&str>,
        command: &str,
    ) -> AdbResult<TcpStream> {
        let transport = self
            .device_service(serial, &LocalCommand::Shell(command.to_string()))
            .await?;
        Ok(transport.into_stream())
    }

    /// Open a raw TCP tunnel to a port on the device.
    pub async fn open_tcp(
        &self,
        serial: Option<&str>,
        port: u16,
        host: Option<&str>,
    ) -> AdbResult<TcpStream> {
        let command = LocalCommand::Tcp {
            port,
            host: host.map(str::to_string),
        };
        let transport = self.device_service(serial, &command).await?;
        Ok(transport.into_stream())
    }

    /// Open the JDWP pid stream.
    pub async fn open_jdwp(&self, serial: Option<&str>) -> AdbResult<TcpStream> {
        let transport = self.device_service(serial, &LocalCommand::Jdwp).await?;
        Ok(transport.into_stream())
    }

    /// Open a named log stream (`main`, `events`, `radio`, ...). The caller
    /// owns parsing; this only performs the socket switch.
    pub async fn open_log(&self, serial: Option<&str>, name: &str) -> AdbResult<TcpStream> {
        let transport = self
            .device_service(serial, &LocalCommand::Log(name.to_string()))
            .await?;
        Ok(transport.into_stream())
    }

    /// Start the monkey tool on the device and connect to its control port.
    ///
    /// The shell session that launched monkey is kept open inside the
    /// returned handle; dropping the handle tears both sockets down.
    pub async fn open_monkey(&self, serial: Option<&str>, port: u16) -> AdbResult<MonkeyHandle> {
        let command = format!("monkey --port {} -v", port);
        let shell = self.shell_stream(serial, &command).await?;
        // Monkey takes a moment to bind its control port.
        tokio::time::sleep(Duration::from_secs(1)).await;
        let stream = self.open_tcp(serial, port, None).await?;
        Ok(MonkeyHandle {
            stream,
            _shell: shell,
        })
    }

    /// Remount `/system` read-write. Returns the service's verdict text.
    pub async fn remount(&self, serial: Option<&str>) -> AdbResult<String> {
        let mut transport = self.device_service(serial, &LocalCommand::Remount).await?;
        let output = transport.read_to_end().await?;
        Ok(String::from_utf8_lossy(&output).to_string())
    }

    /// Reboot the device, optionally into `bootloader` or `recovery`.
    pub async fn reboot(&self, serial: Option<&str>, mode: Option<&str>) -> AdbResult<()> {
        let command = LocalCommand::Reboot(mode.map(str::to_string));
        let mut transport = self.device_service(serial, &command).await?;
        transport.read_to_end().await?;
        Ok(())
    }

    /// Grab the current screen contents. Returns parsed metadata plus the
    /// raw pixel stream.
    pub async fn framebuffer(&self, serial: Option<&str>) -> AdbResult<Framebuffer> {
        let mut transport = self
            .device_service(serial, &LocalCommand::Framebuffer)
            .await?;
        let mut version_buf = [0u8; 4];
        transport.read_exact(&mut version_buf).await?;
        let version = u32::from_le_bytes(version_buf);
        let mut header = vec![0u8; framebuffer::header_len(version)?];
        transport.read_exact(&mut header).await?;
        let meta = FramebufferMeta::parse(version, &header)?;
        debug!(
            "framebuffer: v{} {}x{} {} ({} bytes)",
            meta.version, meta.width, meta.height, meta.format, meta.size
        );
        Ok(Framebuffer::new(meta, transport.into_stream()))
    }

    /// Switch a device transport into SYNC mode for file operations.
    pub async fn sync(&self, serial: Option<&str>) -> AdbResult<SyncConnection> {
        let transport = self.device_service(serial, &LocalCommand::Sync).await?;
        Ok(SyncConnection::new(transport))
    }

    /// Stat a remote path.
    pub async fn stat(&self, serial: Option<&str>, remote_path: &str) -> AdbResult<FileStat> {
        let mut sync = self.sync(serial).await?;
        let stat = sync.stat(remote_path).await?;
        sync.quit().await?;
        Ok(stat)
    }

    /// List a remote directory.
    pub async fn list_dir(
        &self,
        serial: Option<&str>,
        remote_path: &str,
    ) -> AdbResult<Vec<FileEntry>> {
        let mut sync = self.sync(serial).await?;
        let entries = sync.list(remote_path).await?;
        sync.quit().await?;
        Ok(entries)
    }

    /// Push a local file to the device, preserving its mode and mtime.
    /// Returns the number of bytes transferred.
    pub async fn push(
        &self,
        serial: Option<&str>,
        local_path: &Path,
        remote_path: &str,
    ) -> AdbResult<u64> {
        let metadata = tokio::fs::metadata(local_path).await?;
        let mode = file_mode(&metadata);
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);

        let mut file = tokio::fs::File::open(local_path).await?;
        let sync = self.sync(serial).await?;
        let mut push = sync.send(remote_path, mode).await?;
        let transferred = push.write_from(&mut file).await?;
        push.finish(mtime).await?;
        Ok(transferred)
    }

    /// Pull a remote file from the device to a local path. Returns the
    /// number of bytes transferred.
    pub async fn pull(
        &self,
        serial: Option<&str>,
        remote_path: &str,
        local_path: &Path,
    ) -> AdbResult<u64> {
        let sync = self.sync(serial).await?;
        let mut pull = sync.recv(remote_path).await?;
        let mut file = tokio::fs::File::create(local_path).await?;
        let transferred = pull.write_to(&mut file).await?;
        Ok(transferred)
    }

    // --- Device queries over shell ---

    /// Read the device's system properties (`getprop`).
    pub async fn properties(
        &self,
        serial: Option<&str>,
    ) -> AdbResult<BTreeMap<String, String>> {
        let output = self.shell_text(serial, "getprop").await?;
        Ok(parsers::parse_properties(&output))
    }

    /// Read the device's feature list (`pm list features`).
    pub async fn features(
        &self,
        serial: Option<&str>,
    ) -> AdbResult<BTreeMap<String, Option<String>>> {
        let output = self.shell_text(serial, "pm list features").await?;
        Ok(parsers::parse_features(&output))
    }

    /// List installed package names (`pm list packages`).
    pub async fn packages(&self, serial: Option<&str>) -> AdbResult<Vec<String>> {
        let output = self.shell_text(serial, "pm list packages").await?;
        Ok(parsers::parse_packages(&output))
    }

    /// Whether a package is installed (`pm path`).
    pub async fn is_installed(&self, serial: Option<&str>, package: &str) -> AdbResult<bool> {
        let output = self
            .shell_args(serial, &["pm", "path", package])
            .await?;
        parsers::parse_is_installed(&String::from_utf8_lossy(&output))
    }

    /// Install an APK: push it to a staging path, `pm install` it, then
    /// clean the staging file up.
    pub async fn install(&self, serial: Option<&str>, local_apk: &Path) -> AdbResult<()> {
        let file_name = local_apk
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                AdbError::Parse(format!("apk path has no file name: {:?}", local_apk))
            })?;
        let staging = format!("/data/local/tmp/{}", file_name);

        self.push(serial, local_apk, &staging).await?;
        let output = self
            .shell_args(serial, &["pm", "install", "-r", staging.as_str()])
            .await?;
        let verdict = parsers::check_install_output(&String::from_utf8_lossy(&output));
        // Best-effort cleanup either way.
        let _ = self.shell_args(serial, &["rm", "-f", staging.as_str()]).await;
        verdict
    }

    /// Uninstall a package. Returns `false` when the device reports a
    /// failure (typically: not installed).
    pub async fn uninstall(&self, serial: Option<&str>, package: &str) -> AdbResult<bool> {
        let output = self
            .shell_args(serial, &["pm", "uninstall", package])
            .await?;
        parsers::check_uninstall_output(&String::from_utf8_lossy(&output))
    }

    /// Clear a package's data (`pm clear`).
    pub async fn clear(&self, serial: Option<&str>, package: &str) -> AdbResult<()> {
        let output = self.shell_args(serial, &["pm", "clear", package]).await?;
        let text = String::from_utf8_lossy(&output);
        if text.trim() == "Success" {
            Ok(())
        } else {
            Err(AdbError::Device(text.trim().to_string()))
        }
    }

    async fn run_am(&self, serial: Option<&str>, verb: &str, intent: &Intent) -> AdbResult<()> {
        let mut args: Vec<String> = vec!["am".into(), verb.into()];
        args.extend(intent.to_args());
        let output = self.shell_args(serial, &args).await?;
        parsers::check_am_output(&String::from_utf8_lossy(&output))
    }

    /// Start an activity described by the intent (`am start`).
    pub async fn start_activity(&self, serial: Option<&str>, intent: &Intent) -> AdbResult<()> {
        self.run_am(serial, "start", intent).await
    }

    /// Start a service described by the intent (`am startservice`).
    pub async fn start_service(&self, serial: Option<&str>, intent: &Intent) -> AdbResult<()> {
        self.run_am(serial, "startservice", intent).await
    }

    /// Send a broadcast described by the intent (`am broadcast`).
    pub async fn broadcast(&self, serial: Option<&str>, intent: &Intent) -> AdbResult<()> {
        self.run_am(serial, "broadcast", intent).await
    }

    /// Poll `sys.boot_completed` until the device reports a finished boot.
    /// Each probe runs on its own transport, ~1 s apart.
    pub async fn wait_boot_complete(
        &self,
        serial: Option<&str>,
        cancel: &CancelToken,
    ) -> AdbResult<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(AdbError::Cancelled);
            }
            let output = self
                .shell_text(serial, "getprop sys.boot_completed")
                .await?;
            if output.trim() == "1" {
                return Ok(());
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(AdbError::Cancelled),
                _ = tokio::time::sleep(BOOT_POLL_INTERVAL) => {}
            }
        }
    }
}

impl Default for AdbClient {
    fn default() -> Self {
        Self::new()
    }
}

/// A running monkey session: the control socket plus the shell session
/// keeping the tool alive on the device.
pub struct MonkeyHandle {
    pub stream: TcpStream,
    _shell: TcpStream,
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceState;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Spawn a mock ADB server driven by an async handler, one connection
    /// per accept. Returns the port it listens on.
    async fn mock_adb_server<F, Fut>(handler: F) -> u16
    where
        F: FnOnce(TcpStream) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            handler(socket).await;
        });
        port
    }

    /// Mock that reads one request then sends a canned byte sequence.
    async fn mock_simple_response(response: Vec<u8>) -> u16 {
        mock_adb_server(move |mut socket| async move {
            let mut buf = [0u8; 256];
            let _ = socket.read(&mut buf).await;
            socket.write_all(&response).await.unwrap();
        })
        .await
    }

    fn hex_frame(payload: &[u8]) -> Vec<u8> {
        let mut frame = format!("{:04x}", payload.len()).into_bytes();
        frame.extend_from_slice(payload);
        frame
    }

    #[tokio::test]
    async fn test_server_version() {
        // OKAY + "0004" + "001f" -> version 31.
        let mut response = b"OKAY".to_vec();
        response.extend_from_slice(&hex_frame(b"001f"));
        let port = mock_simple_response(response).await;

        let client = AdbClient::with_address("127.0.0.1", port);
        assert_eq!(client.server_version().await.unwrap(), 31);
    }

    #[tokio::test]
    async fn test_list_devices_empty() {
        let mut response = b"OKAY".to_vec();
        response.extend_from_slice(b"0000");
        let port = mock_simple_response(response).await;

        let client = AdbClient::with_address("127.0.0.1", port);
        assert!(client.devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_devices_two() {
        let mut response = b"OKAY".to_vec();
        response.extend_from_slice(&hex_frame(b"serial1\tdevice\nserial2\toffline\n"));
        let port = mock_simple_response(response).await;

        let client = AdbClient::with_address("127.0.0.1", port);
        let devices = client.devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].serial, "serial1");
        assert_eq!(devices[0].state, DeviceState::Device);
        assert_eq!(devices[1].serial, "serial2");
        assert_eq!(devices[1].state, DeviceState::Offline);
    }

    #[tokio::test]
    async fn test_server_fail_response() {
        let mut response = b"FAIL".to_vec();
        response.extend_from_slice(&hex_frame(b"device not found"));
        let port = mock_simple_response(response).await;

        let client = AdbClient::with_address("127.0.0.1", port);
        match client.server_version().await {
            Err(AdbError::Remote(msg)) => assert_eq!(msg, "device not found"),
            other => panic!("expected Remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_without_bootstrap() {
        // Reserve a port and close it so nothing listens there, and point
        // the bootstrap binary somewhere that cannot exist.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client =
            AdbClient::with_address("127.0.0.1", port).server_binary("/nonexistent/adb");
        assert!(matches!(
            client.server_version().await,
            Err(AdbError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_shell_echo() {
        let port = mock_adb_server(|mut socket| async move {
            let mut buf = [0u8; 256];
            // host:transport-any
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"OKAY").await.unwrap();
            // shell:echo hi
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"OKAY").await.unwrap();
            socket.write_all(b"hi\n").await.unwrap();
            // EOF ends the output.
        })
        .await;

        let client = AdbClient::with_address("127.0.0.1", port);
        let output = client.shell(None, "echo hi").await.unwrap();
        assert_eq!(output, b"hi\n");
    }

    #[tokio::test]
    async fn test_shell_args_escaped_on_wire() {
        let port = mock_adb_server(|mut socket| async move {
            let mut buf = [0u8; 256];
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"OKAY").await.unwrap();

            let mut len_buf = [0u8; 4];
            socket.read_exact(&mut len_buf).await.unwrap();
            let len =
                usize::from_str_radix(std::str::from_utf8(&len_buf).unwrap(), 16).unwrap();
            let mut request = vec![0u8; len];
            socket.read_exact(&mut request).await.unwrap();
            assert_eq!(request, b"shell:echo 'hello world'");
            socket.write_all(b"OKAY").await.unwrap();
            socket.write_all(b"hello world\n").await.unwrap();
        })
        .await;

        let client = AdbClient::with_address("127.0.0.1", port);
        let output = client.shell_args(None, &["echo", "hello world"]).await.unwrap();
        assert_eq!(output, b"hello world\n");
    }

    #[tokio::test]
    async fn test_forward_two_okays() {
        let port = mock_adb_server(|mut socket| async move {
            let mut buf = [0u8; 256];
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"OKAYOKAY").await.unwrap();
        })
        .await;

        let client = AdbClient::with_address("127.0.0.1", port);
        client.forward("tcp:6100", "tcp:7100").await.unwrap();
    }

    #[tokio::test]
    async fn test_forward_single_okay() {
        let port = mock_adb_server(|mut socket| async move {
            let mut buf = [0u8; 256];
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"OKAY").await.unwrap();
            // Close without the second acknowledgement.
        })
        .await;

        let client = AdbClient::with_address("127.0.0.1", port);
        client.forward("tcp:6100", "tcp:7100").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_forwards() {
        let port = mock_adb_server(|mut socket| async move {
            let mut buf = [0u8; 256];
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"OKAY").await.unwrap();
            let table = b"serial1 tcp:6100 tcp:7100\n";
            let frame = format!("{:04x}", table.len());
            socket.write_all(frame.as_bytes()).await.unwrap();
            socket.write_all(table).await.unwrap();
        })
        .await;

        let client = AdbClient::with_address("127.0.0.1", port);
        let forwards = client.list_forwards().await.unwrap();
        assert_eq!(forwards.len(), 1);
        assert_eq!(forwards[0].local, "tcp:6100");
    }

    #[tokio::test]
    async fn test_kill_tolerates_immediate_close() {
        let port = mock_adb_server(|mut socket| async move {
            let mut buf = [0u8; 256];
            let _ = socket.read(&mut buf).await;
            // Server exits without replying.
        })
        .await;

        let client = AdbClient::with_address("127.0.0.1", port);
        client.kill().await.unwrap();
    }

    #[tokio::test]
    async fn test_stat_via_client() {
        let port = mock_adb_server(|mut socket| async move {
            let mut buf = [0u8; 256];
            // transport + sync: switches
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"OKAY").await.unwrap();
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"OKAY").await.unwrap();
            // STAT request
            let _ = socket.read(&mut buf).await;
            let mut resp = b"STAT".to_vec();
            resp.extend_from_slice(&0x000081A4u32.to_le_bytes());
            resp.extend_from_slice(&1024u32.to_le_bytes());
            resp.extend_from_slice(&1_700_000_000u32.to_le_bytes());
            socket.write_all(&resp).await.unwrap();
            // QUIT
            let _ = socket.read(&mut buf).await;
        })
        .await;

        let client = AdbClient::with_address("127.0.0.1", port);
        let stat = client.stat(None, "/sdcard/test.txt").await.unwrap();
        assert_eq!(stat.size, 1024);
        assert!(stat.is_file());
        assert_eq!(stat.permissions(), 0o644);
    }

    #[tokio::test]
    async fn test_properties() {
        let port = mock_adb_server(|mut socket| async move {
            let mut buf = [0u8; 256];
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"OKAY").await.unwrap();
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"OKAY").await.unwrap();
            socket
                .write_all(b"[ro.product.model]: [Pixel 6]\n")
                .await
                .unwrap();
        })
        .await;

        let client = AdbClient::with_address("127.0.0.1", port);
        let props = client.properties(None).await.unwrap();
        assert_eq!(props.get("ro.product.model").unwrap(), "Pixel 6");
    }

    #[tokio::test]
    async fn test_start_activity_error_line() {
        let port = mock_adb_server(|mut socket| async move {
            let mut buf = [0u8; 512];
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"OKAY").await.unwrap();
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"OKAY").await.unwrap();
            socket
                .write_all(b"Error: Activity not started, unable to resolve Intent\n")
                .await
                .unwrap();
        })
        .await;

        let client = AdbClient::with_address("127.0.0.1", port);
        let intent = Intent::new().action("android.intent.action.VIEW");
        match client.start_activity(None, &intent).await {
            Err(AdbError::Device(line)) => assert!(line.starts_with("Error:")),
            other => panic!("expected Device error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_boot_complete_retries() {
        // Two connections: first probe answers "0", second "1".
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            for answer in [&b"0\n"[..], &b"1\n"[..]] {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 256];
                let _ = socket.read(&mut buf).await;
                socket.write_all(b"OKAY").await.unwrap();
                let _ = socket.read(&mut buf).await;
                socket.write_all(b"OKAY").await.unwrap();
                socket.write_all(answer).await.unwrap();
            }
        });

        let client = AdbClient::with_address("127.0.0.1", port);
        let cancel = CancelToken::new();
        client.wait_boot_complete(None, &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_boot_complete_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 256];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(b"OKAY").await;
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(b"OKAY").await;
                let _ = socket.write_all(b"0\n").await;
            }
        });

        let client = AdbClient::with_address("127.0.0.1", port);
        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        assert!(matches!(
            client.wait_boot_complete(None, &cancel).await,
            Err(AdbError::Cancelled)
        ));
    }
}
