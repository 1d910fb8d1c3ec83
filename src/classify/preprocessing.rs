use image::DynamicImage;
use image::imageops::FilterType;

use crate::classify::error::PreprocessError;
use crate::models::InputTensor;

/// Resize an image to the model's input size and serialize it as RGB floats.
///
/// The image is stretched to `target_width x target_height` with a bilinear
/// filter (aspect ratio is not preserved). Every pixel is read in row-major
/// order and each channel is divided by 255.
pub fn prepare(
    img: &DynamicImage,
    target_width: u32,
    target_height: u32,
) -> Result<InputTensor, PreprocessError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(PreprocessError::DegenerateImage {
            width: img.width(),
            height: img.height(),
        });
    }
    if target_width == 0 || target_height == 0 {
        return Err(PreprocessError::DegenerateTarget {
            width: target_width,
            height: target_height,
        });
    }

    let resized = if img.width() == target_width && img.height() == target_height {
        img.to_rgb8()
    } else {
        img.resize_exact(target_width, target_height, FilterType::Triangle)
            .to_rgb8()
    };

    let mut data =
        Vec::with_capacity(target_width as usize * target_height as usize * InputTensor::CHANNELS);
    for pixel in resized.pixels() {
        let [r, g, b] = pixel.0;
        data.push(r as f32 / 255.0);
        data.push(g as f32 / 255.0);
        data.push(b as f32 / 255.0);
    }

    Ok(InputTensor {
        width: target_width,
        height: target_height,
        data,
    })
}
