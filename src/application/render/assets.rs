//! Static assets drawn on every page, fetched once per process.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use super::RenderError;
use super::fonts::{EmbeddedFont, FontSet};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset `{name}` not found")]
    NotFound { name: String },
    #[error("asset `{name}` could not be fetched: {reason}")]
    Fetch { name: String, reason: String },
}

/// Where asset bytes come from: a local directory or a remote base URL.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Bytes, AssetError>;
}

/// Memoizes asset bytes for its own lifetime; construct one per process.
pub struct AssetCache {
    source: Arc<dyn AssetSource>,
    entries: DashMap<String, Bytes>,
}

impl AssetCache {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            entries: DashMap::new(),
        }
    }

    pub async fn get(&self, name: &str) -> Result<Bytes, AssetError> {
        if let Some(hit) = self.entries.get(name) {
            return Ok(hit.value().clone());
        }

        let bytes = self.source.fetch(name).await?;
        debug!(
            target = "application::render::assets",
            asset = name,
            size = bytes.len(),
            "Asset fetched"
        );
        self.entries.insert(name.to_string(), bytes.clone());
        Ok(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct AssetNames {
    pub logo: String,
    pub watermark: String,
    pub stamp: String,
    pub arabic_font: String,
    pub latin_font: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorSpace {
    pub fn pdf_name(self) -> &'static str {
        match self {
            ColorSpace::Gray => "DeviceGray",
            ColorSpace::Rgb => "DeviceRGB",
            ColorSpace::Cmyk => "DeviceCMYK",
        }
    }
}

/// A JPEG passed through to the PDF untouched (DCTDecode).
#[derive(Debug, Clone)]
pub struct JpegImage {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
}

impl JpegImage {
    pub fn parse(name: &str, data: Bytes) -> Result<Self, RenderError> {
        let invalid = || RenderError::Image {
            name: name.to_string(),
        };

        match imagesize::image_type(&data) {
            Ok(imagesize::ImageType::Jpeg) => {}
            _ => return Err(invalid()),
        }
        let size = imagesize::blob_size(&data).map_err(|_| invalid())?;
        let color_space = jpeg_color_space(&data).ok_or_else(invalid)?;
        let width = u32::try_from(size.width).map_err(|_| invalid())?;
        let height = u32::try_from(size.height).map_err(|_| invalid())?;

        Ok(Self {
            data,
            width,
            height,
            color_space,
        })
    }

    /// Height over width.
    pub fn aspect(&self) -> f32 {
        if self.width == 0 {
            1.0
        } else {
            self.height as f32 / self.width as f32
        }
    }
}

/// Component count from the first start-of-frame segment.
fn jpeg_color_space(data: &[u8]) -> Option<ColorSpace> {
    let mut offset = 2;
    while offset + 4 <= data.len() {
        if data[offset] != 0xFF {
            return None;
        }
        let marker = data[offset + 1];
        let length = usize::from(u16::from_be_bytes([data[offset + 2], data[offset + 3]]));
        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            let components = *data.get(offset + 9)?;
            return match components {
                1 => Some(ColorSpace::Gray),
                3 => Some(ColorSpace::Rgb),
                4 => Some(ColorSpace::Cmyk),
                _ => None,
            };
        }
        offset += 2 + length;
    }
    None
}

/// Parsed assets shared by every render.
#[derive(Debug)]
pub struct RenderAssets {
    pub fonts: FontSet<Arc<EmbeddedFont>>,
    pub logo: JpegImage,
    pub watermark: JpegImage,
    pub stamp: JpegImage,
}

impl RenderAssets {
    pub async fn load(cache: &AssetCache, names: &AssetNames) -> Result<Self, RenderError> {
        let arabic = EmbeddedFont::parse(
            &names.arabic_font,
            cache.get(&names.arabic_font).await?.to_vec(),
        )?;
        let latin = EmbeddedFont::parse(
            &names.latin_font,
            cache.get(&names.latin_font).await?.to_vec(),
        )?;

        Ok(Self {
            fonts: FontSet::new(Arc::new(arabic), Arc::new(latin)),
            logo: JpegImage::parse(&names.logo, cache.get(&names.logo).await?)?,
            watermark: JpegImage::parse(&names.watermark, cache.get(&names.watermark).await?)?,
            stamp: JpegImage::parse(&names.stamp, cache.get(&names.stamp).await?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AssetSource for CountingSource {
        async fn fetch(&self, name: &str) -> Result<Bytes, AssetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if name == "missing.jpg" {
                return Err(AssetError::NotFound {
                    name: name.to_string(),
                });
            }
            Ok(Bytes::from(name.as_bytes().to_vec()))
        }
    }

    #[tokio::test]
    async fn fetches_each_asset_once() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = AssetCache::new(source.clone());

        let first = cache.get("logo.jpg").await.expect("fetched");
        let second = cache.get("logo.jpg").await.expect("cached");
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_memoized() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = AssetCache::new(source.clone());

        assert!(cache.get("missing.jpg").await.is_err());
        assert!(cache.get("missing.jpg").await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn jpeg_header_gives_size_and_components() {
        // SOI, SOF0 (8 bit, 16x8, 3 components), EOI
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x08, 0x00, 0x10, 0x03];
        data.extend_from_slice(&[0x01, 0x11, 0x00, 0x02, 0x11, 0x00, 0x03, 0x11, 0x00]);
        data.extend_from_slice(&[0xFF, 0xD9]);

        let image = JpegImage::parse("logo.jpg", Bytes::from(data)).expect("parses");
        assert_eq!((image.width, image.height), (16, 8));
        assert_eq!(image.color_space, ColorSpace::Rgb);
        assert_eq!(image.aspect(), 0.5);
    }

    #[test]
    fn non_jpeg_images_are_rejected() {
        let png = Bytes::from_static(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR");
        let err = JpegImage::parse("logo.png", png).expect_err("rejected");
        assert!(matches!(err, RenderError::Image { .. }));
    }
}
