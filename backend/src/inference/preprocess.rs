use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

/// Side length of the square input the classifier was trained on.
pub const IMAGE_SIZE: u32 = 128;
pub const CHANNELS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Normalized RGB input of shape `(1, IMAGE_SIZE, IMAGE_SIZE, 3)`, channels last,
/// values in `[0, 1]`. Only [`preprocess`] builds one, so the shape always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor(Array4<f32>);

impl ImageTensor {
    fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let array = Array4::from_shape_fn(
            (1, height as usize, width as usize, CHANNELS),
            |(_, y, x, c)| f32::from(image.get_pixel(x as u32, y as u32)[c]) / 255.0,
        );
        Self(array)
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.0
    }

    /// Values in row-major NHWC order.
    pub fn to_vec(&self) -> Vec<f32> {
        self.0.iter().copied().collect()
    }
}

pub struct Preprocessed {
    pub tensor: ImageTensor,
    /// The resized image before normalization, kept for display.
    pub resized: RgbImage,
}

pub fn preprocess(image_bytes: &[u8]) -> Result<Preprocessed, PreprocessError> {
    let decoded = image::load_from_memory(image_bytes)?;
    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(&rgb, IMAGE_SIZE, IMAGE_SIZE, FilterType::CatmullRom);
    let tensor = ImageTensor::from_rgb(&resized);
    Ok(Preprocessed { tensor, resized })
}
