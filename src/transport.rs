use crate::error::{AdbError, AdbResult};
use crate::protocol::{self, AdbStatus};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// One TCP connection to the ADB server.
///
/// A transport carries exactly one command: it is either drained to a value
/// and dropped, or its stream is handed off to a streaming consumer via
/// [`Transport::into_stream`]. Transports are never reused across commands.
pub struct Transport {
    stream: TcpStream,
}

impl Transport {
    pub(crate) fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Frame a request payload and write it out.
    pub async fn send(&mut self, payload: &str) -> AdbResult<()> {
        debug!("sending request: {:?}", payload);
        let frame = protocol::encode_request(payload)?;
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    /// Read the 4-byte OKAY/FAIL status word.
    ///
    /// On FAIL the server's hex-length-prefixed message follows; it is read
    /// and surfaced as [`AdbError::Remote`], or [`AdbError::Unauthorized`]
    /// when the message points at a missing debugging authorization.
    pub async fn read_status(&mut self) -> AdbResult<()> {
        let mut status_buf = [0u8; 4];
        self.stream.read_exact(&mut status_buf).await?;
        match protocol::parse_status(&status_buf)? {
            AdbStatus::Okay => Ok(()),
            AdbStatus::Fail => {
                let message = self.read_hex_string().await?;
                let message = String::from_utf8_lossy(&message).to_string();
                debug!("server replied FAIL: {}", message);
                if message.contains("unauthorized") || message.contains("authorization") {
                    Err(AdbError::Unauthorized(message))
                } else {
                    Err(AdbError::Remote(message))
                }
            }
        }
    }

    /// Read a hex-length-prefixed block (4 ASCII hex digits + that many bytes).
    pub async fn read_hex_string(&mut self) -> AdbResult<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf).await?;
        let len = protocol::parse_hex_length(&len_buf)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let mut data = vec![0u8; len];
        self.stream.read_exact(&mut data).await?;
        Ok(data)
    }

    /// Read a hex-length-prefixed block, or `None` on a clean end-of-stream
    /// at a frame boundary. EOF in the middle of a frame is still an error.
    pub async fn read_hex_string_or_eof(&mut self) -> AdbResult<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        let mut filled = 0;
        while filled < len_buf.len() {
            let n = self.stream.read(&mut len_buf[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(AdbError::Protocol(
                    "stream ended inside a length prefix".into(),
                ));
            }
            filled += n;
        }
        let len = protocol::parse_hex_length(&len_buf)?;
        let mut data = vec![0u8; len];
        self.stream.read_exact(&mut data).await?;
        Ok(Some(data))
    }

    /// Read all remaining data until the server closes the stream.
    pub async fn read_to_end(&mut self) -> AdbResult<Vec<u8>> {
        let mut data = Vec::new();
        self.stream.read_to_end(&mut data).await?;
        Ok(data)
    }

    /// Read exactly `buf.len()` bytes.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> AdbResult<()> {
        self.stream.read_exact(buf).await?;
        Ok(())
    }

    /// Write raw bytes, bypassing the host-protocol framing. Used by the
    /// SYNC sub-protocol, which frames its own requests.
    pub async fn write_all(&mut self, buf: &[u8]) -> AdbResult<()> {
        self.stream.write_all(buf).await?;
        Ok(())
    }

    /// Relinquish ownership of the underlying byte stream.
    ///
    /// After the socket-mode switch (`shell:`, `tcp:`, `log:`, ...) the
    /// connection is no longer an ADB control channel; the caller owns
    /// whatever protocol flows next.
    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair_with(server_bytes: &'static [u8]) -> Transport {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(server_bytes).await.unwrap();
        });
        Transport::new(TcpStream::connect(addr).await.unwrap())
    }

    #[tokio::test]
    async fn test_read_status_okay() {
        let mut transport = pair_with(b"OKAY").await;
        transport.read_status().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_status_fail_with_message() {
        let mut transport = pair_with(b"FAIL0010device not found").await;
        match transport.read_status().await {
            Err(AdbError::Remote(msg)) => assert_eq!(msg, "device not found"),
            other => panic!("expected Remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_status_fail_unauthorized() {
        let mut transport = pair_with(b"FAIL0013device unauthorized").await;
        assert!(matches!(
            transport.read_status().await,
            Err(AdbError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_read_status_garbage() {
        let mut transport = pair_with(b"WHAT").await;
        assert!(matches!(
            transport.read_status().await,
            Err(AdbError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_read_hex_string() {
        let mut transport = pair_with(b"0005hello").await;
        assert_eq!(transport.read_hex_string().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_read_hex_string_or_eof_clean_end() {
        let mut transport = pair_with(b"").await;
        assert_eq!(transport.read_hex_string_or_eof().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_hex_string_or_eof_partial_prefix() {
        let mut transport = pair_with(b"00").await;
        assert!(matches!(
            transport.read_hex_string_or_eof().await,
            Err(AdbError::Protocol(_))
        ));
    }
}
