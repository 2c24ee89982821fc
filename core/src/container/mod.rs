pub mod bmp;
pub mod source;
