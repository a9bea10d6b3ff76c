//! Framebuffer header parsing and pixel stream delivery.
//!
//! After the `framebuffer:` switch the device sends a version word, a
//! version-dependent header describing the pixel layout, and then exactly
//! `size` bytes of raw pixel data.

use crate::error::{AdbError, AdbResult};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Pixel channel ordering derived from the header's offsets and lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb,
    Rgba,
    Bgr,
    Bgra,
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::Rgb => write!(f, "rgb"),
            PixelFormat::Rgba => write!(f, "rgba"),
            PixelFormat::Bgr => write!(f, "bgr"),
            PixelFormat::Bgra => write!(f, "bgra"),
        }
    }
}

/// Parsed framebuffer header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferMeta {
    /// Header version (1 or 2).
    pub version: u32,
    /// Raw pixel format word, present in version 2 headers only
    /// (1 = RGBA_8888). Passed through as-is.
    pub raw_format: Option<u32>,
    /// Bits per pixel.
    pub bpp: u32,
    /// Total pixel data size in bytes.
    pub size: u32,
    pub width: u32,
    pub height: u32,
    pub red_offset: u32,
    pub red_length: u32,
    pub blue_offset: u32,
    pub blue_length: u32,
    pub green_offset: u32,
    pub green_length: u32,
    pub alpha_offset: u32,
    pub alpha_length: u32,
    /// Channel ordering derived from the layout fields.
    pub format: PixelFormat,
}

/// Number of header bytes following the version word, per version.
pub fn header_len(version: u32) -> AdbResult<usize> {
    match version {
        1 => Ok(48),
        2 => Ok(52),
        other => Err(AdbError::Protocol(format!(
            "unsupported framebuffer version: {}",
            other
        ))),
    }
}

impl FramebufferMeta {
    /// Parse the header fields that follow the version word.
    ///
    /// Version 1 carries 12 u32s (`bpp, size, width, height` and the four
    /// channel offset/length pairs); version 2 prepends a raw `format` u32.
    pub fn parse(version: u32, body: &[u8]) -> AdbResult<FramebufferMeta> {
        let expected = header_len(version)?;
        if body.len() < expected {
            return Err(AdbError::Protocol(format!(
                "framebuffer v{} header too short: {} bytes, need {}",
                version,
                body.len(),
                expected
            )));
        }

        let words: Vec<u32> = body[..expected]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let (raw_format, fields) = if version == 2 {
            (Some(words[0]), &words[1..])
        } else {
            (None, &words[..])
        };

        let [bpp, size, width, height, red_offset, red_length, blue_offset, blue_length, green_offset, green_length, alpha_offset, alpha_length] =
            *fields
        else {
            return Err(AdbError::Protocol(format!(
                "framebuffer v{} header field count mismatch",
                version
            )));
        };

        let has_alpha = alpha_length > 0;
        let format = if blue_offset == 0 {
            if has_alpha {
                PixelFormat::Bgra
            } else {
                PixelFormat::Bgr
            }
        } else if has_alpha {
            PixelFormat::Rgba
        } else {
            PixelFormat::Rgb
        };

        Ok(FramebufferMeta {
            version,
            raw_format,
            bpp,
            size,
            width,
            height,
            red_offset,
            red_length,
            blue_offset,
            blue_length,
            green_offset,
            green_length,
            alpha_offset,
            alpha_length,
            format,
        })
    }
}

/// A framebuffer grab in progress: parsed metadata plus the raw pixel
/// stream, delivered chunk by chunk without buffering the whole image.
pub struct Framebuffer {
    pub meta: FramebufferMeta,
    stream: TcpStream,
    remaining: u64,
}

const FRAMEBUFFER_CHUNK: usize = 64 * 1024;

impl Framebuffer {
    pub(crate) fn new(meta: FramebufferMeta, stream: TcpStream) -> Self {
        let remaining = meta.size as u64;
        Self {
            meta,
            stream,
            remaining,
        }
    }

    /// Pixel bytes not yet delivered.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// The next slab of pixel data, or `None` once `size` bytes have been
    /// delivered. An early socket close is a protocol error.
    pub async fn next_chunk(&mut self) -> AdbResult<Option<Bytes>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let want = FRAMEBUFFER_CHUNK.min(self.remaining as usize);
        let mut buf = vec![0u8; want];
        let n = self.stream.read(&mut buf).await?;
        if n == 0 {
            return Err(AdbError::Protocol(format!(
                "framebuffer stream ended {} bytes early",
                self.remaining
            )));
        }
        buf.truncate(n);
        self.remaining -= n as u64;
        Ok(Some(Bytes::from(buf)))
    }

    /// Drain the remaining pixel data into an async writer.
    pub async fn write_to<W: AsyncWrite + Unpin>(&mut self, sink: &mut W) -> AdbResult<u64> {
        let total = self.remaining;
        while let Some(chunk) = self.next_chunk().await? {
            sink.write_all(&chunk).await?;
        }
        Ok(total)
    }
}
