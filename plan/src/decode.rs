//! Image decode service used for plan sizing and export rendering.

#[cfg(test)]
#[path = "decode_test.rs"]
mod decode_test;

use std::io::Cursor;

use image::{ImageReader, RgbaImage};

use crate::doc::ImageSize;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("image data is empty")]
    Empty,
    #[error("unrecognised image format")]
    UnknownFormat,
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Turns stored image bytes into pixels.
pub trait ImageDecoder {
    /// Pixel size without decoding the full image where the format allows it.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the bytes are not a supported image.
    fn dimensions(&self, bytes: &[u8]) -> Result<ImageSize, DecodeError>;

    /// Full-resolution RGBA pixels.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the bytes are not a supported image.
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, DecodeError>;
}

/// PNG and JPEG decoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDecoder;

impl RasterDecoder {
    fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format().map_err(|_| DecodeError::UnknownFormat)?;
        if reader.format().is_none() {
            return Err(DecodeError::UnknownFormat);
        }
        Ok(reader)
    }
}

impl ImageDecoder for RasterDecoder {
    fn dimensions(&self, bytes: &[u8]) -> Result<ImageSize, DecodeError> {
        let (width, height) = Self::reader(bytes)?.into_dimensions()?;
        Ok(ImageSize::new(width, height))
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, DecodeError> {
        Ok(Self::reader(bytes)?.decode()?.to_rgba8())
    }
}
