//! Grayscale plate rasters on top of the `image` crate.

use std::path::Path;

use image::{imageops, DynamicImage, GrayImage, ImageBuffer, ImageResult, Luma};

use super::geometry::{canonical_orientation, Orientation, PixelRect};

pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

/// A plate scan: 8- or 16-bit single channel. Anything else is converted to
/// 16-bit luma on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlateRaster {
    Gray8(GrayImage),
    Gray16(Gray16Image),
}

impl PlateRaster {
    pub fn open(path: &Path) -> ImageResult<Self> {
        Ok(Self::from_dynamic(image::open(path)?))
    }

    pub fn from_dynamic(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(gray) => Self::Gray8(gray),
            DynamicImage::ImageLuma16(gray) => Self::Gray16(gray),
            other => Self::Gray16(other.to_luma16()),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Gray8(img) => img.dimensions(),
            Self::Gray16(img) => img.dimensions(),
        }
    }

    pub const fn bit_depth(&self) -> u8 {
        match self {
            Self::Gray8(_) => 8,
            Self::Gray16(_) => 16,
        }
    }

    /// Rotate into the landscape frame when needed.
    #[must_use]
    pub fn into_canonical(self) -> (Self, Orientation) {
        let (w, h) = self.dimensions();
        let orientation = canonical_orientation(w, h);
        let raster = match (orientation, self) {
            (Orientation::Landscape, raster) => raster,
            (Orientation::RotateClockwise, Self::Gray8(img)) => Self::Gray8(imageops::rotate90(&img)),
            (Orientation::RotateClockwise, Self::Gray16(img)) => Self::Gray16(imageops::rotate90(&img)),
        };
        (raster, orientation)
    }

    /// Copy out a rectangle. `rect` must already be clipped to the frame.
    #[must_use]
    pub fn crop(&self, rect: PixelRect) -> Self {
        match self {
            Self::Gray8(img) => {
                Self::Gray8(imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image())
            }
            Self::Gray16(img) => {
                Self::Gray16(imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image())
            }
        }
    }

    /// Negative of the raster (max - value).
    pub fn invert(&mut self) {
        match self {
            Self::Gray8(img) => imageops::invert(img),
            Self::Gray16(img) => imageops::invert(img),
        }
    }

    /// Write as PNG, keeping the bit depth.
    pub fn save_png(&self, path: &Path) -> ImageResult<()> {
        match self {
            Self::Gray8(img) => img.save_with_format(path, image::ImageFormat::Png),
            Self::Gray16(img) => img.save_with_format(path, image::ImageFormat::Png),
        }
    }
}
