use image::{DynamicImage, GrayImage, RgbImage};
use kornia::{
    image::{Image, ImageError, ImageSize, allocator::CpuAllocator},
    imgproc,
};

type CpuImage<T, const C: usize> = Image<T, C, CpuAllocator>;

/// Errors raised while moving pixels between `image` buffers and kornia.
#[derive(Debug, thiserror::Error)]
pub enum ImagingError {
    #[error("kornia image error: {0}")]
    Kornia(#[from] ImageError),

    #[error("pixel buffer does not match {width}x{height}")]
    BufferSize { width: u32, height: u32 },
}

fn kornia_size(width: u32, height: u32) -> ImageSize {
    ImageSize {
        width: width as usize,
        height: height as usize,
    }
}

/// Converts an RGB buffer to 8-bit luminance.
pub fn rgb_to_gray(rgb: &RgbImage) -> Result<GrayImage, ImagingError> {
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Ok(GrayImage::new(width, height));
    }

    let image = CpuImage::<u8, 3>::new(
        kornia_size(width, height),
        rgb.as_raw().clone(),
        CpuAllocator,
    )?;
    let mut gray = CpuImage::<u8, 1>::from_size_val(image.size(), 0u8, CpuAllocator)?;
    imgproc::color::gray_from_rgb_u8(&image, &mut gray)?;

    GrayImage::from_raw(width, height, gray.as_slice().to_vec())
        .ok_or(ImagingError::BufferSize { width, height })
}

/// Grayscale view of any decoded image. Luma sources are passed through untouched.
pub fn to_gray(source: &DynamicImage) -> Result<GrayImage, ImagingError> {
    match source {
        DynamicImage::ImageLuma8(gray) => Ok(gray.clone()),
        other => rgb_to_gray(&other.to_rgb8()),
    }
}

/// Binarizes `gray` at `level` with ink as foreground: pixels at or below the
/// level become 255, brighter paper becomes 0.
pub fn threshold_ink(gray: &GrayImage, level: u8) -> Result<GrayImage, ImagingError> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Ok(GrayImage::new(width, height));
    }

    let source = CpuImage::<u8, 1>::new(
        kornia_size(width, height),
        gray.as_raw().clone(),
        CpuAllocator,
    )?;
    let mut binary = CpuImage::<u8, 1>::from_size_val(source.size(), 0u8, CpuAllocator)?;
    imgproc::threshold::threshold_binary(&source, &mut binary, level, 255)?;

    let mask: Vec<u8> = binary
        .as_slice()
        .iter()
        .map(|&px| if px == 0 { 255 } else { 0 })
        .collect();

    GrayImage::from_raw(width, height, mask).ok_or(ImagingError::BufferSize { width, height })
}
