//! Screenshot payload decoding.
//!
//! A screenshot response line declares which of two payload representations
//! follows on the wire. The protocol originally shipped pre-encoded images
//! and later moved to raw framebuffer dumps for performance; both remain
//! decodable:
//!
//! - `screenshot_raw`: a packed row-major pixel buffer of `width * height`
//!   pixels in the declared [`PixelFormat`], re-encoded here into PNG.
//! - `screenshot` (legacy): bytes that are already a fully encoded image,
//!   returned unchanged.
//!
//! The representation is modeled as the tagged [`ScreenshotPayload`] variant
//! so that a third wire format is a new variant, not another string check.
//!
//! Decoding is split into two pure steps around the socket read:
//! [`ScreenshotPayload::from_response`] validates the header without
//! consuming any socket bytes, the caller drains exactly
//! [`byte_len`](ScreenshotPayload::byte_len) bytes, and [`decode`] turns
//! them into portable PNG bytes. Validation failures after the read (a
//! declared `len` that disagrees with the pixel geometry) are only raised
//! once the payload has been drained, so the stream stays framed for the
//! next exchange.

use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, Rgb, Rgba};
use thiserror::Error;

use crate::protocol::Response;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Screenshot-specific payload validation failures.
#[derive(Error, Debug)]
pub enum ScreenshotError {
    /// The response header is not a usable screenshot description
    /// (unknown payload type, or non-positive dimensions/length).
    #[error("invalid screenshot response: {0}")]
    InvalidPayload(String),

    /// The transport delivered fewer bytes than the header declared.
    #[error("incomplete screenshot data: {received}/{expected} bytes")]
    IncompleteData { received: usize, expected: usize },

    /// The declared pixel format is not one this decoder understands.
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// The declared byte length disagrees with `width * height * bpp`.
    #[error("declared payload length {len} does not match {expected} pixel bytes")]
    SizeMismatch { len: usize, expected: usize },

    /// Re-encoding the pixel buffer as PNG failed.
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

// ---------------------------------------------------------------------------
// Pixel format
// ---------------------------------------------------------------------------

/// Packed pixel layout of a raw framebuffer payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 3 bytes per pixel, R G B.
    Rgb,
    /// 4 bytes per pixel, R G B A.
    Rgba,
}

impl PixelFormat {
    /// Parse the wire `format` field.
    pub fn from_wire(format: &str) -> Result<Self, ScreenshotError> {
        match format {
            "RGB" => Ok(PixelFormat::Rgb),
            "RGBA" => Ok(PixelFormat::Rgba),
            other => Err(ScreenshotError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Bytes occupied by one pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

// ---------------------------------------------------------------------------
// ScreenshotPayload
// ---------------------------------------------------------------------------

/// The validated payload description declared by a screenshot response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotPayload {
    /// Legacy pre-encoded image bytes, passed through unchanged.
    Encoded { len: usize },
    /// Raw framebuffer dump requiring format-aware decoding.
    Raw {
        width: u32,
        height: u32,
        format: PixelFormat,
        len: usize,
    },
}

impl ScreenshotPayload {
    /// Validate a screenshot response header.
    ///
    /// Pure: consumes no socket bytes, so a failure here leaves the stream
    /// untouched and safe for the caller to abandon.
    pub fn from_response(response: &Response) -> Result<Self, ScreenshotError> {
        match response.payload_type.as_deref() {
            Some("screenshot_raw") => {
                let width = response.width.unwrap_or(0);
                let height = response.height.unwrap_or(0);
                let len = response.len.unwrap_or(0);
                if width == 0 || height == 0 || len == 0 {
                    return Err(ScreenshotError::InvalidPayload(format!(
                        "invalid raw screenshot parameters: {width}x{height}, {len} bytes"
                    )));
                }
                let format = PixelFormat::from_wire(response.format.as_deref().unwrap_or(""))?;
                Ok(ScreenshotPayload::Raw {
                    width,
                    height,
                    format,
                    len: len as usize,
                })
            }
            Some("screenshot") => {
                // The legacy header also carries width/height/format fields;
                // the payload is already encoded so only len matters.
                let len = response.len.unwrap_or(0);
                if len == 0 {
                    return Err(ScreenshotError::InvalidPayload(
                        "invalid encoded screenshot length".to_string(),
                    ));
                }
                Ok(ScreenshotPayload::Encoded { len: len as usize })
            }
            other => Err(ScreenshotError::InvalidPayload(format!(
                "unexpected response type: {}",
                other.unwrap_or("<missing>")
            ))),
        }
    }

    /// Number of raw bytes that follow the response line on the wire.
    pub fn byte_len(&self) -> usize {
        match *self {
            ScreenshotPayload::Encoded { len } => len,
            ScreenshotPayload::Raw { len, .. } => len,
        }
    }
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decode a fully drained payload into portable PNG bytes.
///
/// The caller owns the returned buffer; nothing is cached.
pub fn decode(payload: &ScreenshotPayload, bytes: Vec<u8>) -> Result<Vec<u8>, ScreenshotError> {
    match *payload {
        ScreenshotPayload::Encoded { len } => {
            if bytes.len() != len {
                return Err(ScreenshotError::IncompleteData {
                    received: bytes.len(),
                    expected: len,
                });
            }
            Ok(bytes)
        }
        ScreenshotPayload::Raw {
            width,
            height,
            format,
            len,
        } => {
            if bytes.len() != len {
                return Err(ScreenshotError::IncompleteData {
                    received: bytes.len(),
                    expected: len,
                });
            }
            let expected = width as usize * height as usize * format.bytes_per_pixel();
            if len != expected {
                return Err(ScreenshotError::SizeMismatch { len, expected });
            }
            encode_png(width, height, format, bytes)
        }
    }
}

fn encode_png(
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
) -> Result<Vec<u8>, ScreenshotError> {
    let mut png = Vec::new();
    let mut cursor = Cursor::new(&mut png);

    match format {
        PixelFormat::Rgb => {
            let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, pixels).ok_or_else(|| {
                    ScreenshotError::InvalidPayload(
                        "pixel buffer does not match declared dimensions".to_string(),
                    )
                })?;
            img.write_to(&mut cursor, ImageFormat::Png)?;
        }
        PixelFormat::Rgba => {
            let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, pixels).ok_or_else(|| {
                    ScreenshotError::InvalidPayload(
                        "pixel buffer does not match declared dimensions".to_string(),
                    )
                })?;
            img.write_to(&mut cursor, ImageFormat::Png)?;
        }
    }

    Ok(png)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
