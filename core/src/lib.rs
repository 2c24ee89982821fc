#![no_std]

pub mod container;
pub mod fs;
pub mod image;
pub mod io;

extern crate alloc;

pub use container::bmp::{Bitmap, FormatError};
pub use container::source::ImageSourceFile;
pub use image::PackedBitImage;
