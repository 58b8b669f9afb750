//! Remote image size probing.
//!
//! AMP needs explicit `width`/`height` on every `amp-img`, so the pipeline
//! probes each media URL before rendering. Only the leading bytes of the
//! image are downloaded; dimensions are read straight from the container
//! header.
//!
//! Supported formats: PNG, GIF, JPEG (baseline and progressive SOF
//! markers), and WebP (lossy `VP8 `, lossless `VP8L`, extended `VP8X`).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use thiserror::Error;

use informant_core::models::MediaSize;

/// Upper bound on bytes read from one image before giving up.
const MAX_PROBE_BYTES: usize = 512 * 1024;

/// Resolves the pixel dimensions of a media URL.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<MediaSize>;
}

/// [`ImageProbe`] that downloads image headers over HTTP.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build probe HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<MediaSize> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error status", url))?;

        let mut buf = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            buf.extend_from_slice(&chunk);
            match image_dimensions(&buf) {
                Ok(size) => return Ok(size),
                Err(ProbeError::Truncated) if buf.len() < MAX_PROBE_BYTES => continue,
                Err(e) => bail!("{}: {}", url, e),
            }
        }
        match image_dimensions(&buf) {
            Ok(size) => Ok(size),
            Err(e) => bail!("{}: {}", url, e),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("image header is truncated")]
    Truncated,
    #[error("unrecognized image format")]
    Unsupported,
    #[error("corrupt {0} header")]
    Corrupt(&'static str),
}

/// Read the pixel dimensions from the start of an encoded image.
pub fn image_dimensions(data: &[u8]) -> Result<MediaSize, ProbeError> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        png(data)
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        gif(data)
    } else if data.starts_with(&[0xFF, 0xD8]) {
        jpeg(data)
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        webp(data)
    } else if data.len() < 12 {
        Err(ProbeError::Truncated)
    } else {
        Err(ProbeError::Unsupported)
    }
}

fn size(width: u32, height: u32, format: &'static str) -> Result<MediaSize, ProbeError> {
    if width == 0 || height == 0 {
        return Err(ProbeError::Corrupt(format));
    }
    Ok(MediaSize { width, height })
}

fn be16(b: &[u8], at: usize) -> u32 {
    u32::from(b[at]) << 8 | u32::from(b[at + 1])
}

fn le16(b: &[u8], at: usize) -> u32 {
    u32::from(b[at]) | u32::from(b[at + 1]) << 8
}

fn le24(b: &[u8], at: usize) -> u32 {
    le16(b, at) | u32::from(b[at + 2]) << 16
}

fn png(data: &[u8]) -> Result<MediaSize, ProbeError> {
    if data.len() < 24 {
        return Err(ProbeError::Truncated);
    }
    if &data[12..16] != b"IHDR" {
        return Err(ProbeError::Corrupt("PNG"));
    }
    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
    size(width, height, "PNG")
}

fn gif(data: &[u8]) -> Result<MediaSize, ProbeError> {
    if data.len() < 10 {
        return Err(ProbeError::Truncated);
    }
    size(le16(data, 6), le16(data, 8), "GIF")
}

fn jpeg(data: &[u8]) -> Result<MediaSize, ProbeError> {
    let mut i = 2;
    loop {
        // Marker: one or more 0xFF fill bytes, then the code.
        while i < data.len() && data[i] == 0xFF {
            i += 1;
        }
        if i >= data.len() {
            return Err(ProbeError::Truncated);
        }
        if data[i - 1] != 0xFF {
            return Err(ProbeError::Corrupt("JPEG"));
        }
        let marker = data[i];
        i += 1;

        match marker {
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD8 => continue,
            0xD9 | 0xDA => return Err(ProbeError::Corrupt("JPEG")),
            _ => {}
        }

        if i + 2 > data.len() {
            return Err(ProbeError::Truncated);
        }
        let len = be16(data, i) as usize;
        if len < 2 {
            return Err(ProbeError::Corrupt("JPEG"));
        }

        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            // length(2) precision(1) height(2) width(2)
            if i + 7 > data.len() {
                return Err(ProbeError::Truncated);
            }
            return size(be16(data, i + 5), be16(data, i + 3), "JPEG");
        }
        i += len;
    }
}

fn webp(data: &[u8]) -> Result<MediaSize, ProbeError> {
    if data.len() < 30 {
        return Err(ProbeError::Truncated);
    }
    match &data[12..16] {
        b"VP8 " => {
            if data[23..26] != [0x9Du8, 0x01, 0x2A] {
                return Err(ProbeError::Corrupt("WebP"));
            }
            size(le16(data, 26) & 0x3FFF, le16(data, 28) & 0x3FFF, "WebP")
        }
        b"VP8L" => {
            if data[20] != 0x2F {
                return Err(ProbeError::Corrupt("WebP"));
            }
            let b = &data[21..25];
            let width = 1 + (u32::from(b[0]) | (u32::from(b[1]) & 0x3F) << 8);
            let height = 1
                + (u32::from(b[1]) >> 6 | u32::from(b[2]) << 2 | (u32::from(b[3]) & 0x0F) << 10);
            size(width, height, "WebP")
        }
        b"VP8X" => size(1 + le24(data, 24), 1 + le24(data, 27), "WebP"),
        _ => Err(ProbeError::Unsupported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut v = b"\x89PNG\r\n\x1a\n".to_vec();
        v.extend_from_slice(&13u32.to_be_bytes());
        v.extend_from_slice(b"IHDR");
        v.extend_from_slice(&width.to_be_bytes());
        v.extend_from_slice(&height.to_be_bytes());
        v.extend_from_slice(&[8, 6, 0, 0, 0]);
        v
    }

    #[test]
    fn test_png() {
        assert_eq!(
            image_dimensions(&png_header(1280, 720)).unwrap(),
            MediaSize {
                width: 1280,
                height: 720
            }
        );
    }

    #[test]
    fn test_gif() {
        let mut v = b"GIF89a".to_vec();
        v.extend_from_slice(&[0x40, 0x01, 0xF0, 0x00]);
        assert_eq!(
            image_dimensions(&v).unwrap(),
            MediaSize {
                width: 320,
                height: 240
            }
        );
    }

    #[test]
    fn test_jpeg_skips_segments_before_sof() {
        let mut v = vec![0xFF, 0xD8];
        // APP0 with a 16-byte payload
        v.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        v.extend_from_slice(&[0u8; 14]);
        // DHT, which shares the SOF range but is not one
        v.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x04, 0x00, 0x00]);
        // SOF2 (progressive): precision 8, height 600, width 800
        v.extend_from_slice(&[0xFF, 0xC2, 0x00, 0x11, 0x08, 0x02, 0x58, 0x03, 0x20]);
        assert_eq!(
            image_dimensions(&v).unwrap(),
            MediaSize {
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn test_jpeg_truncated_before_sof() {
        let v = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x00];
        assert_eq!(image_dimensions(&v), Err(ProbeError::Truncated));
    }

    fn riff(chunk: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut v = b"RIFF".to_vec();
        v.extend_from_slice(&0u32.to_le_bytes());
        v.extend_from_slice(b"WEBP");
        v.extend_from_slice(chunk);
        v.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        v.extend_from_slice(payload);
        v
    }

    #[test]
    fn test_webp_lossy() {
        let mut payload = vec![0x00, 0x00, 0x00, 0x9D, 0x01, 0x2A];
        payload.extend_from_slice(&640u16.to_le_bytes());
        payload.extend_from_slice(&480u16.to_le_bytes());
        assert_eq!(
            image_dimensions(&riff(b"VP8 ", &payload)).unwrap(),
            MediaSize {
                width: 640,
                height: 480
            }
        );
    }

    #[test]
    fn test_webp_lossless() {
        // width-1 = 99, height-1 = 49, packed as 14-bit fields
        let bits: u32 = 99 | 49 << 14;
        let mut payload = vec![0x2F];
        payload.extend_from_slice(&bits.to_le_bytes());
        payload.extend_from_slice(&[0u8; 8]);
        assert_eq!(
            image_dimensions(&riff(b"VP8L", &payload)).unwrap(),
            MediaSize {
                width: 100,
                height: 50
            }
        );
    }

    #[test]
    fn test_webp_extended() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&[0x7F, 0x07, 0x00]); // 1920 - 1
        payload.extend_from_slice(&[0x37, 0x04, 0x00]); // 1080 - 1
        assert_eq!(
            image_dimensions(&riff(b"VP8X", &payload)).unwrap(),
            MediaSize {
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn test_unknown_format() {
        assert_eq!(
            image_dimensions(b"<!doctype html><html>"),
            Err(ProbeError::Unsupported)
        );
        assert_eq!(image_dimensions(b"GIF"), Err(ProbeError::Truncated));
    }
}
