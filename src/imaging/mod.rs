//! Low-level grayscale helpers shared by the detector and the region thresholder.

pub mod clahe;
pub mod greyscale;
pub mod otsu;

pub use clahe::clahe;
pub use greyscale::{ImagingError, rgb_to_gray, threshold_ink, to_gray};
pub use otsu::otsu_threshold;
