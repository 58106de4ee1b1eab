//! Loading 16-bit grayscale frames via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::image::OwnedImage;
use crate::util::{FocusError, FocusResult};
use std::path::Path;

/// Creates an owned 16-bit image from a dynamic image.
///
/// 8-bit inputs are widened by the `image` crate (`v * 257`).
pub fn owned_from_dynamic_image(img: &image::DynamicImage) -> FocusResult<OwnedImage<u16>> {
    let gray = img.to_luma16();
    let width = gray.width() as usize;
    let height = gray.height() as usize;
    OwnedImage::new(gray.into_raw(), width, height)
}

/// Loads an image from disk and converts it to 16-bit grayscale.
pub fn load_gray16_image<P: AsRef<Path>>(path: P) -> FocusResult<OwnedImage<u16>> {
    let img = image::open(path).map_err(|err| FocusError::ImageIo {
        reason: err.to_string(),
    })?;
    owned_from_dynamic_image(&img)
}
