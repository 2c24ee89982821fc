use alloc::{
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};
use core::convert::Infallible;

use embedded_graphics::{
    Pixel,
    draw_target::DrawTargetExt,
    image::ImageDrawable,
    pixelcolor::BinaryColor,
    prelude::{DrawTarget, OriginDimensions, Point, Size},
    primitives::Rectangle,
};
use log::{info, warn};

use crate::{
    container::bmp::{self, Bitmap, FormatError},
    fs::{Filesystem, Mode},
    io,
};

/// A pixel is set (black) when the mean of its channels is below this value.
pub const LUMINANCE_THRESHOLD: usize = 128;
/// Channel bytes per pixel used when exporting to BMP (24-bit RGB).
pub const EXPORT_COLOR_DEPTH: usize = 3;
/// Hex literals per data line in the PROGMEM source form.
pub const BYTES_PER_LINE: usize = 16;

const BLACK: [u8; EXPORT_COLOR_DEPTH] = [0x00; EXPORT_COLOR_DEPTH];
const WHITE: [u8; EXPORT_COLOR_DEPTH] = [0xFF; EXPORT_COLOR_DEPTH];

/// Monochrome raster packed one bit per pixel, MSB first, rows unpadded.
///
/// A set bit is a black (`BinaryColor::On`) pixel. `width == 0` means the
/// dimensions are unknown until [`PackedBitImage::infer_dimensions`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBitImage {
    name: String,
    width: u32,
    height: u32,
    bits: Vec<u8>,
    modified: bool,
}

fn buffer_len(width: u32, height: u32) -> usize {
    (width as usize * height as usize).div_ceil(8)
}

impl PackedBitImage {
    /// An image whose bytes arrive later through [`PackedBitImage::add_data`].
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            bits: Vec::new(),
            modified: false,
        }
    }

    /// A zero-filled (all white) image, flagged as unsaved.
    pub fn new_empty(name: &str, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            bits: vec![0u8; buffer_len(width, height)],
            modified: true,
        }
    }

    pub fn with_bits(name: &str, width: u32, height: u32, bits: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            bits,
            modified: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn clear_modified(&mut self) {
        self.modified = false;
    }

    pub fn rename(&mut self, name: &str) {
        if self.name != name {
            self.name = name.to_string();
            self.modified = true;
        }
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name.clear();
        self.name.push_str(name);
    }

    pub fn add_data(&mut self, data: impl IntoIterator<Item = u8>) {
        self.bits.extend(data);
    }

    /// Row width as implied by the buffer length, which may disagree with a
    /// stale `width` while the image is being edited.
    fn row_width(&self) -> Option<usize> {
        if self.height == 0 {
            return None;
        }
        Some(self.bits.len() * 8 / self.height as usize)
    }

    fn locate(&self, x: u32, y: u32) -> Option<(usize, u8)> {
        let position = (y as usize)
            .checked_mul(self.row_width()?)?
            .checked_add(x as usize)?;
        let byte_index = position / 8;
        if byte_index >= self.bits.len() {
            return None;
        }
        Some((byte_index, 1 << (7 - position % 8)))
    }

    /// Out of range reads are white.
    pub fn get_pixel(&self, x: u32, y: u32) -> bool {
        self.locate(x, y)
            .is_some_and(|(byte_index, mask)| self.bits[byte_index] & mask != 0)
    }

    /// Out of range writes are dropped. Only an actual change marks the image
    /// as modified.
    pub fn set_pixel(&mut self, x: u32, y: u32, value: bool) {
        let Some((byte_index, mask)) = self.locate(x, y) else {
            return;
        };
        let byte = &mut self.bits[byte_index];
        if (*byte & mask != 0) == value {
            return;
        }
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
        self.modified = true;
    }

    /// Resolves unknown dimensions (`width == 0`) from the buffer length: the
    /// largest divisor of the pixel count not above its square root.
    pub fn infer_dimensions(&mut self) {
        if self.width != 0 {
            return;
        }
        let pixels = self.bits.len() * 8;
        let mut width = pixels.isqrt();
        while width > 1 && pixels % width != 0 {
            width -= 1;
        }
        self.width = width as u32;
        self.height = if width == 0 { 0 } else { (pixels / width) as u32 };
    }

    /// Reallocates to `width`x`height`, keeping the overlapping top-left area.
    pub fn resize(&mut self, width: u32, height: u32) {
        let mut resized = Self::new_empty(&self.name, width, height);
        for y in 0..height.min(self.height) {
            for x in 0..width.min(self.width) {
                if self.get_pixel(x, y) {
                    resized.set_pixel(x, y, true);
                }
            }
        }
        *self = resized;
    }

    /// Expands every pixel to an RGB triple, rows top to bottom.
    pub fn to_color_bytes(&self) -> Vec<u8> {
        if self.width == 0 {
            return Vec::new();
        }
        let mut output =
            Vec::with_capacity(self.width as usize * self.height as usize * EXPORT_COLOR_DEPTH);
        for y in 0..self.height {
            for x in 0..self.width {
                output.extend_from_slice(if self.get_pixel(x, y) { &BLACK } else { &WHITE });
            }
        }
        output
    }

    /// Replaces dimensions and pixels with a thresholded copy of `data`, which
    /// holds `color_depth` channel bytes per pixel in row-major order.
    pub fn from_color_bytes(&mut self, width: u32, height: u32, color_depth: usize, data: &[u8]) {
        self.width = width;
        self.height = height;
        self.bits = vec![0u8; buffer_len(width, height)];
        self.modified = true;
        if color_depth == 0 || width == 0 || height == 0 {
            return;
        }

        for y in 0..height {
            for x in 0..width {
                let position = (y as usize * width as usize + x as usize) * color_depth;
                let Some(channels) = data.get(position..position + color_depth) else {
                    continue;
                };
                let sum: usize = channels.iter().map(|&c| c as usize).sum();
                if sum < LUMINANCE_THRESHOLD * color_depth {
                    self.set_pixel(x, y, true);
                }
            }
        }
    }

    pub fn to_bitmap(&self) -> Bitmap {
        Bitmap {
            width: self.width,
            height: self.height,
            color_depth: EXPORT_COLOR_DEPTH,
            data: self.to_color_bytes(),
        }
    }

    pub fn import_bitmap(&mut self, bitmap: &Bitmap) {
        self.from_color_bytes(bitmap.width, bitmap.height, bitmap.color_depth, &bitmap.data);
    }

    pub fn encode_bmp(&self) -> Vec<u8> {
        bmp::encode(self.width, EXPORT_COLOR_DEPTH, &self.to_color_bytes())
    }

    pub fn decode_bmp(&mut self, bytes: &[u8]) -> Result<(), FormatError> {
        let bitmap = bmp::decode(bytes)?;
        self.import_bitmap(&bitmap);
        Ok(())
    }

    pub fn import_bmp<F: Filesystem>(&mut self, fs: &F, path: &str) -> Result<(), bmp::Error> {
        let mut file = fs.open_file(path, Mode::Read).map_err(bmp::Error::from_io)?;
        let bytes = io::read_to_end(&mut file).map_err(bmp::Error::from_io)?;
        self.decode_bmp(&bytes)?;
        info!(
            "Imported {} into '{}' ({}x{})",
            path, self.name, self.width, self.height
        );
        Ok(())
    }

    pub fn export_bmp<F: Filesystem>(&self, fs: &F, path: &str) -> Result<(), bmp::Error> {
        let bytes = self.encode_bmp();
        let mut file = fs.open_file(path, Mode::Write).map_err(bmp::Error::from_io)?;
        io::write_all(&mut file, &bytes).map_err(bmp::Error::from_io)?;
        info!("Exported '{}' to {} ({} bytes)", self.name, path, bytes.len());
        Ok(())
    }

    /// Default file name for a BMP export of this image.
    pub fn bmp_file_name(&self) -> String {
        format!("{}.bmp", self.name)
    }

    /// Renders the PROGMEM block for this image, one entry per text line and
    /// ending with an empty separator line.
    pub fn to_source_lines(&self) -> Vec<String> {
        let expected = buffer_len(self.width, self.height);
        if self.bits.len() != expected {
            warn!(
                "'{}' holds {} bytes but {}x{} needs {}",
                self.name,
                self.bits.len(),
                self.width,
                self.height,
                expected
            );
        }

        let mut lines = Vec::with_capacity(self.bits.len() / BYTES_PER_LINE + 5);
        lines.push(format!(
            "// '{}', {}x{}px",
            self.name, self.width, self.height
        ));
        lines.push(format!("const unsigned char {} [] PROGMEM = {{", self.name));

        // every line but the last keeps a trailing comma, the last may hold a
        // full 16 bytes (or none at all)
        let split = self.bits.len().saturating_sub(1) / BYTES_PER_LINE * BYTES_PER_LINE;
        let (body, tail) = self.bits.split_at(split);
        for chunk in body.chunks(BYTES_PER_LINE) {
            lines.push(format!("\t{},", hex_line(chunk)));
        }
        lines.push(format!("\t{}", hex_line(tail)));

        lines.push("};".to_string());
        lines.push(String::new());
        lines
    }

    pub fn pixels(&self) -> impl Iterator<Item = Pixel<BinaryColor>> + '_ {
        let rows = if self.width == 0 { 0 } else { self.height };
        (0..rows).flat_map(move |y| {
            (0..self.width).map(move |x| {
                let color = if self.get_pixel(x, y) {
                    BinaryColor::On
                } else {
                    BinaryColor::Off
                };
                Pixel(Point::new(x as i32, y as i32), color)
            })
        })
    }
}

fn hex_line(bytes: &[u8]) -> String {
    let mut line = String::with_capacity(bytes.len() * 6);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            line.push_str(", ");
        }
        line.push_str(&format!("0x{byte:02x}"));
    }
    line
}

impl OriginDimensions for PackedBitImage {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for PackedBitImage {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            if coord.x < 0 || coord.y < 0 {
                continue;
            }
            let (x, y) = (coord.x as u32, coord.y as u32);
            if x >= self.width || y >= self.height {
                continue;
            }
            self.set_pixel(x, y, color.is_on());
        }
        Ok(())
    }
}

impl ImageDrawable for PackedBitImage {
    type Color = BinaryColor;

    fn draw<D>(&self, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        target.draw_iter(self.pixels())
    }

    fn draw_sub_image<D>(&self, target: &mut D, area: &Rectangle) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Self::Color>,
    {
        self.draw(&mut target.translated(-area.top_left).clipped(area))
    }
}
