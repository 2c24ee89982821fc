//! Minimal Windows Bitmap codec: uncompressed, single plane, whole bytes per
//! pixel. Pixel data goes in and out as unpadded rows, top to bottom.

use alloc::vec::Vec;

use log::{trace, warn};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::little_endian::{U16, U32},
};

const BMP_MAGIC: &[u8; 2] = b"BM";

pub const HEADER_SIZE: usize = 54;
pub const DIB_HEADER_SIZE: u32 = 40;
/// 72 DPI.
pub const PIXELS_PER_METER: u32 = 2835;
const COMPRESSION_NONE: u32 = 0;

/// BITMAPFILEHEADER followed by BITMAPINFOHEADER.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
struct Header {
    magic: [u8; 2],
    file_size: U32,
    reserved: [u8; 4],
    data_offset: U32,
    dib_size: U32,
    width: U32,
    height: U32,
    planes: U16,
    bits_per_pixel: U16,
    compression: U32,
    data_size: U32,
    x_pixels_per_meter: U32,
    y_pixels_per_meter: U32,
    palette_colors: U32,
    important_colors: U32,
}

const _: () = assert!(core::mem::size_of::<Header>() == HEADER_SIZE);

/// Decoded pixel data, `color_depth` bytes per pixel, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub color_depth: usize,
    pub data: Vec<u8>,
}

/// Reasons a byte buffer is not a BMP this codec reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    InvalidSignature,
    TruncatedHeader,
    UnsupportedCompression(u32),
    UnsupportedPlanes(u16),
    UnsupportedDepth(u16),
    TruncatedData { expected: usize, found: usize },
    DimensionsOverflow,
}

impl FormatError {
    pub fn message(&self) -> &'static str {
        match self {
            FormatError::InvalidSignature => "Not a Bitmap Image",
            FormatError::TruncatedHeader => "Cannot read Bitmap: header is truncated",
            FormatError::UnsupportedCompression(_) => "Cannot read Bitmap: need no compression",
            FormatError::UnsupportedPlanes(_) => "Cannot read Bitmap: need 1 color plane",
            FormatError::UnsupportedDepth(_) => "Cannot read Bitmap: bits per pixel is < 8",
            FormatError::TruncatedData { .. } => "Cannot read Bitmap: pixel data is truncated",
            FormatError::DimensionsOverflow => "Cannot read Bitmap: dimensions are too large",
        }
    }
}

impl core::fmt::Display for FormatError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())?;
        match self {
            FormatError::UnsupportedCompression(method) => write!(f, " (method {method})"),
            FormatError::UnsupportedPlanes(planes) => write!(f, " ({planes} planes)"),
            FormatError::UnsupportedDepth(bits) => write!(f, " ({bits} bits)"),
            FormatError::TruncatedData { expected, found } => {
                write!(f, " (expected {expected} bytes, found {found})")
            }
            _ => Ok(()),
        }
    }
}

impl core::error::Error for FormatError {}

/// Error for BMP import and export through a [`crate::fs::Filesystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Format(FormatError),
    Io(embedded_io::ErrorKind),
}

impl Error {
    pub fn from_io(error: impl embedded_io::Error) -> Self {
        Error::Io(error.kind())
    }
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Self {
        Error::Format(err)
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Error::Format(_) => embedded_io::ErrorKind::InvalidData,
            Error::Io(kind) => *kind,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Format(err) => write!(f, "{err}"),
            Error::Io(kind) => write!(f, "i/o error: {kind:?}"),
        }
    }
}

impl core::error::Error for Error {}

fn stride(row_len: usize) -> usize {
    row_len.next_multiple_of(4)
}

fn saturate_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Encodes `data` (`color_depth` bytes per pixel, rows top to bottom) as a
/// BMP file. The height is however many whole rows `data` holds.
///
/// Header fields too large for their width saturate at the field's maximum.
pub fn encode(width: u32, color_depth: usize, data: &[u8]) -> Vec<u8> {
    let row_len = width as usize * color_depth;
    let height = if row_len == 0 { 0 } else { data.len() / row_len };
    let stride = stride(row_len);
    let data_size = stride * height;
    let bits_per_pixel = u16::try_from(color_depth.saturating_mul(8)).unwrap_or(u16::MAX);

    let header = Header {
        magic: *BMP_MAGIC,
        file_size: U32::new(saturate_u32(HEADER_SIZE.saturating_add(data_size))),
        reserved: [0u8; 4],
        data_offset: U32::new(HEADER_SIZE as u32),
        dib_size: U32::new(DIB_HEADER_SIZE),
        width: U32::new(width),
        height: U32::new(saturate_u32(height)),
        planes: U16::new(1),
        bits_per_pixel: U16::new(bits_per_pixel),
        compression: U32::new(COMPRESSION_NONE),
        data_size: U32::new(saturate_u32(data_size)),
        x_pixels_per_meter: U32::new(PIXELS_PER_METER),
        y_pixels_per_meter: U32::new(PIXELS_PER_METER),
        palette_colors: U32::new(0),
        important_colors: U32::new(0),
    };

    let mut output = Vec::with_capacity(HEADER_SIZE + data_size);
    output.extend_from_slice(header.as_bytes());
    // bottom row first; `chunks_exact` drops a trailing partial row
    for row in data.chunks_exact(row_len.max(1)).take(height).rev() {
        output.extend_from_slice(row);
        output.resize(output.len() + stride - row_len, 0);
    }
    trace!(
        "Encoded {}x{} BMP at {} bits per pixel, {} bytes",
        width,
        height,
        bits_per_pixel,
        output.len()
    );
    output
}

/// Decodes a BMP file into unpadded rows, top to bottom.
pub fn decode(bytes: &[u8]) -> Result<Bitmap, FormatError> {
    if bytes.get(..BMP_MAGIC.len()) != Some(&BMP_MAGIC[..]) {
        return Err(FormatError::InvalidSignature);
    }
    let (header, _) = Header::read_from_prefix(bytes).map_err(|_| FormatError::TruncatedHeader)?;

    let compression = header.compression.get();
    if compression != COMPRESSION_NONE {
        return Err(FormatError::UnsupportedCompression(compression));
    }
    let planes = header.planes.get();
    if planes != 1 {
        return Err(FormatError::UnsupportedPlanes(planes));
    }
    let bits_per_pixel = header.bits_per_pixel.get();
    let color_depth = (bits_per_pixel / 8) as usize;
    if color_depth < 1 {
        return Err(FormatError::UnsupportedDepth(bits_per_pixel));
    }

    let width = header.width.get();
    let height = header.height.get();
    let mut payload = bytes.get(header.data_offset.get() as usize..).unwrap_or(&[]);
    let data_size = header.data_size.get() as usize;
    if data_size > 0 && data_size < payload.len() {
        payload = &payload[..data_size];
    }

    let row_len = (width as usize)
        .checked_mul(color_depth)
        .ok_or(FormatError::DimensionsOverflow)?;
    let total = row_len
        .checked_mul(height as usize)
        .ok_or(FormatError::DimensionsOverflow)?;
    let stride = stride(row_len);
    if height > 0 {
        let expected = stride
            .checked_mul(height as usize - 1)
            .and_then(|padded| padded.checked_add(row_len))
            .ok_or(FormatError::DimensionsOverflow)?;
        if payload.len() < expected {
            warn!(
                "BMP payload holds {} bytes, {}x{} needs {}",
                payload.len(),
                width,
                height,
                expected
            );
            return Err(FormatError::TruncatedData {
                expected,
                found: payload.len(),
            });
        }
    }

    let mut data = Vec::with_capacity(total);
    // zero-width rows carry no bytes however many the header claims
    if row_len > 0 {
        for y in 0..height as usize {
            let start = (height as usize - y - 1) * stride;
            data.extend_from_slice(&payload[start..start + row_len]);
        }
    }
    trace!(
        "Decoded {}x{} BMP at {} bits per pixel",
        width, height, bits_per_pixel
    );

    Ok(Bitmap {
        width,
        height,
        color_depth,
        data,
    })
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use alloc::vec;

    fn field_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn field_u16(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn header_fields() {
        let data = vec![0x7Fu8; 4 * 2 * 3];
        let bmp = encode(4, 3, &data);
        assert_eq!(&bmp[0..2], b"BM");
        assert_eq!(field_u32(&bmp, 2), bmp.len() as u32);
        assert_eq!(field_u32(&bmp, 6), 0);
        assert_eq!(field_u32(&bmp, 10), 54);
        assert_eq!(field_u32(&bmp, 14), 40);
        assert_eq!(field_u32(&bmp, 18), 4);
        assert_eq!(field_u32(&bmp, 22), 2);
        assert_eq!(field_u16(&bmp, 26), 1);
        assert_eq!(field_u16(&bmp, 28), 24);
        assert_eq!(field_u32(&bmp, 30), 0);
        assert_eq!(field_u32(&bmp, 34), 24);
        assert_eq!(field_u32(&bmp, 38), 2835);
        assert_eq!(field_u32(&bmp, 42), 2835);
        assert_eq!(field_u32(&bmp, 46), 0);
        assert_eq!(field_u32(&bmp, 50), 0);
        assert_eq!(bmp.len(), 54 + 24);
    }

    #[test]
    fn rows_are_padded_and_flipped() {
        // 5 pixels * 3 bytes = 15, padded to 16
        let top = [1u8; 15];
        let bottom = [2u8; 15];
        let data = [&top[..], &bottom[..]].concat();
        let bmp = encode(5, 3, &data);
        assert_eq!(bmp.len(), 54 + 32);
        assert_eq!(field_u32(&bmp, 34), 32);
        assert_eq!(&bmp[54..69], &bottom);
        assert_eq!(bmp[69], 0);
        assert_eq!(&bmp[70..85], &top);
        assert_eq!(bmp[85], 0);

        let bitmap = decode(&bmp).unwrap();
        assert_eq!((bitmap.width, bitmap.height, bitmap.color_depth), (5, 2, 3));
        assert_eq!(bitmap.data, data);
    }

    #[test]
    fn aligned_rows_have_no_padding() {
        let data: Vec<u8> = (0..24).collect();
        let bmp = encode(2, 4, &data);
        assert_eq!(bmp.len(), 54 + 24);
        assert_eq!(&bmp[54..62], &data[16..24]);
        assert_eq!(decode(&bmp).unwrap().data, data);
    }

    #[test]
    fn trailing_partial_row_is_dropped() {
        let data = vec![9u8; 2 * 3 * 2 + 4];
        let bmp = encode(2, 3, &data);
        let bitmap = decode(&bmp).unwrap();
        assert_eq!(bitmap.height, 2);
        assert_eq!(bitmap.data.len(), 12);
    }

    #[test]
    fn zero_width_encodes_header_only() {
        let bmp = encode(0, 3, &[1, 2, 3]);
        assert_eq!(bmp.len(), HEADER_SIZE);
        let bitmap = decode(&bmp).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (0, 0));
        assert!(bitmap.data.is_empty());
    }

    #[test]
    fn rejects_bad_signature() {
        assert_eq!(decode(b"PK\x03\x04"), Err(FormatError::InvalidSignature));
        assert_eq!(decode(b""), Err(FormatError::InvalidSignature));
        assert_eq!(decode(b"BM\x00"), Err(FormatError::TruncatedHeader));
    }

    #[test]
    fn rejects_unsupported_features() {
        let mut bmp = encode(1, 3, &[0, 0, 0]);
        bmp[30] = 1;
        let err = decode(&bmp).unwrap_err();
        assert_eq!(err, FormatError::UnsupportedCompression(1));
        assert_eq!(err.message(), "Cannot read Bitmap: need no compression");
        assert_ne!(err.message(), FormatError::InvalidSignature.message());

        let mut bmp = encode(1, 3, &[0, 0, 0]);
        bmp[26] = 2;
        assert_eq!(decode(&bmp), Err(FormatError::UnsupportedPlanes(2)));

        let mut bmp = encode(1, 3, &[0, 0, 0]);
        bmp[28] = 4;
        bmp[29] = 0;
        assert_eq!(decode(&bmp), Err(FormatError::UnsupportedDepth(4)));
    }

    #[test]
    fn compression_is_checked_before_planes() {
        let mut bmp = encode(1, 3, &[0, 0, 0]);
        bmp[26] = 3;
        bmp[30] = 2;
        assert_eq!(decode(&bmp), Err(FormatError::UnsupportedCompression(2)));
    }

    #[test]
    fn zero_data_size_means_rest_of_file() {
        let data: Vec<u8> = (0..18).collect();
        let mut bmp = encode(3, 3, &data);
        bmp[34..38].copy_from_slice(&[0; 4]);
        assert_eq!(decode(&bmp).unwrap().data, data);
    }

    #[test]
    fn data_size_clips_trailing_bytes() {
        let data: Vec<u8> = (0..8).collect();
        let mut bmp = encode(2, 4, &data);
        bmp.extend_from_slice(&[0xEE; 16]);
        let bitmap = decode(&bmp).unwrap();
        assert_eq!(bitmap.data, data);
        assert_eq!(bitmap.height, 1);
    }

    #[test]
    fn honours_data_offset() {
        let data: Vec<u8> = (0..12).collect();
        let bmp = encode(4, 3, &data);
        let mut shifted = bmp[..HEADER_SIZE].to_vec();
        shifted.extend_from_slice(&[0xAA; 10]);
        shifted.extend_from_slice(&bmp[HEADER_SIZE..]);
        shifted[10..14].copy_from_slice(&64u32.to_le_bytes());
        assert_eq!(decode(&shifted).unwrap().data, data);
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let data = vec![0u8; 5 * 3 * 4];
        let bmp = encode(5, 3, &data);
        let cut = &bmp[..bmp.len() - 20];
        assert_eq!(
            decode(cut),
            Err(FormatError::TruncatedData {
                expected: 16 * 3 + 15,
                found: 64 - 20,
            })
        );

        let mut huge = encode(1, 3, &[0, 0, 0]);
        huge[18..22].copy_from_slice(&u32::MAX.to_le_bytes());
        huge[22..26].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(decode(&huge).is_err());
    }

    #[test]
    fn zero_width_with_huge_height_decodes_empty() {
        let mut bmp = encode(0, 3, &[]);
        bmp[22..26].copy_from_slice(&u32::MAX.to_le_bytes());
        let bitmap = decode(&bmp).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (0, u32::MAX));
        assert!(bitmap.data.is_empty());
    }

    #[test]
    fn oversized_depth_saturates_bits_per_pixel() {
        // 8192 bytes per pixel is 65536 bits, one past u16::MAX
        let bmp = encode(1, 8192, &vec![0u8; 8192]);
        assert_eq!(field_u16(&bmp, 28), u16::MAX);
        assert_eq!(field_u32(&bmp, 22), 1);
        assert_eq!(field_u32(&bmp, 34), 8192);
        assert_eq!(field_u32(&bmp, 2), 54 + 8192);
    }

    #[test]
    fn display_carries_details() {
        use alloc::string::ToString;
        assert_eq!(
            FormatError::UnsupportedCompression(3).to_string(),
            "Cannot read Bitmap: need no compression (method 3)"
        );
        assert_eq!(
            Error::from(FormatError::InvalidSignature).to_string(),
            "Not a Bitmap Image"
        );
    }
}
