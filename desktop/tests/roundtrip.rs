use std::{io::Cursor, path::PathBuf};

use image::{ImageBuffer, ImageFormat, Rgb};
use progmem_core::{
    FormatError, ImageSourceFile, PackedBitImage,
    container::bmp,
    fs::{self, Filesystem},
};
use progmem_desktop::std_fs::StdFilesystem;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("progmem-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn checkerboard(name: &str, width: u32, height: u32) -> PackedBitImage {
    let mut image = PackedBitImage::new_empty(name, width, height);
    for y in 0..height {
        for x in 0..width {
            image.set_pixel(x, y, (x + y) % 2 == 0 || x == 0);
        }
    }
    image
}

const HEADER: &str = "\
#include <pgmspace.h>

// 'arrow', 8x4px
const unsigned char arrow [] PROGMEM = {
\t0x10, 0x30, 0x7f, 0x30
};

const unsigned char dots [] PROGMEM = {
\t0xaa, 0x55, 0xaa, 0x55, 0xaa, 0x55, 0xaa, 0x55
};
";

#[test]
fn encoded_bmp_reads_back_with_image_crate() {
    // 10 pixels * 3 bytes = 30 byte rows, padded to 32
    let image = checkerboard("board", 10, 4);
    let decoded = image::load_from_memory_with_format(&image.encode_bmp(), ImageFormat::Bmp)
        .unwrap()
        .to_rgb8();
    assert_eq!(decoded.dimensions(), (10, 4));
    for (x, y, pixel) in decoded.enumerate_pixels() {
        let expected = if image.get_pixel(x, y) {
            [0, 0, 0]
        } else {
            [255, 255, 255]
        };
        assert_eq!(pixel.0, expected, "pixel {x},{y}");
    }
}

#[test]
fn imports_bmp_written_by_image_crate() {
    let source = ImageBuffer::from_fn(6, 4, |x, y| match (x + y) % 3 {
        0 => Rgb([100u8, 100, 100]),
        1 => Rgb([200, 200, 200]),
        _ => Rgb([255, 0, 0]),
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(source)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Bmp)
        .unwrap();

    let bitmap = bmp::decode(&bytes).unwrap();
    assert_eq!((bitmap.width, bitmap.height, bitmap.color_depth), (6, 4, 3));

    let mut image = PackedBitImage::new("sprite", 0, 0);
    image.import_bitmap(&bitmap);
    assert_eq!((image.width(), image.height()), (6, 4));
    for y in 0..4 {
        for x in 0..6 {
            // 100 and 85 average below the threshold, 200 does not
            assert_eq!(image.get_pixel(x, y), (x + y) % 3 != 1, "pixel {x},{y}");
        }
    }
}

#[test]
fn monochrome_survives_bmp_round_trip() {
    for (width, height) in [(8, 1), (5, 8), (16, 16), (80, 68), (200, 200)] {
        let image = checkerboard("board", width, height);
        let mut copy = PackedBitImage::new("board", 0, 0);
        copy.decode_bmp(&image.encode_bmp()).unwrap();
        assert_eq!(copy.bits(), image.bits(), "{width}x{height}");
        assert_eq!((copy.width(), copy.height()), (width, height));
    }
}

#[test]
fn header_file_round_trip_on_disk() {
    let dir = scratch_dir("header");
    let fs = StdFilesystem::new_with_base_path(dir.clone());
    std::fs::write(dir.join("images.h"), HEADER).unwrap();

    let mut file = ImageSourceFile::open(&fs, Some("images.h")).unwrap();
    assert_eq!(file.filename(), Some("images.h"));
    assert_eq!(file.len(), 2);
    let dots = file.search("dots").unwrap();
    assert_eq!((dots.width(), dots.height()), (8, 8));
    assert!(!file.is_modified());

    file.search_mut("arrow").unwrap().set_pixel(0, 0, true);
    assert!(file.is_modified());
    file.save(&fs, "saved.h").unwrap();
    assert!(!file.is_modified());
    assert_eq!(file.path(), Some("saved.h"));

    let reopened = ImageSourceFile::open(&fs, Some("saved.h")).unwrap();
    assert_eq!(reopened.images()[0].bits(), &[0x90, 0x30, 0x7f, 0x30]);
    assert_eq!(reopened.images()[1].bits(), file.images()[1].bits());
    assert_eq!(
        std::fs::read_to_string(dir.join("saved.h")).unwrap(),
        file.to_source()
    );

    // saving again replaces, never appends
    file.save(&fs, "saved.h").unwrap();
    assert_eq!(ImageSourceFile::open(&fs, Some("saved.h")).unwrap().len(), 2);
}

#[test]
fn bulk_bmp_export_and_import() {
    let dir = scratch_dir("bulk");
    let fs = StdFilesystem::new_with_base_path(dir.clone());
    let original = ImageSourceFile::from_source(HEADER);

    assert_eq!(original.export_all_bmp(&fs, "out").unwrap(), 2);
    assert!(fs.exists("out/arrow.bmp").unwrap());
    assert!(fs.exists("out/dots.bmp").unwrap());

    let mut file = ImageSourceFile::open(&fs, None).unwrap();
    assert!(file.path().is_none());
    file.push(PackedBitImage::new_empty("dots", 2, 4));
    let added = file
        .import_bmp_files(&fs, &["out/arrow.bmp", "out/dots.bmp"])
        .unwrap();
    assert_eq!(added, 1);

    // existing image replaced in place, new one appended
    let names: Vec<_> = file.images().iter().map(PackedBitImage::name).collect();
    assert_eq!(names, ["dots", "arrow"]);
    for name in ["arrow", "dots"] {
        let imported = file.search(name).unwrap();
        let expected = original.search(name).unwrap();
        assert_eq!(imported.bits(), expected.bits(), "{name}");
        assert_eq!(imported.width(), expected.width());
        assert!(imported.is_modified());
    }
}

#[test]
fn io_and_format_failures_are_typed() {
    let dir = scratch_dir("errors");
    let fs = StdFilesystem::new_with_base_path(dir.clone());

    assert_eq!(
        ImageSourceFile::open(&fs, Some("missing.h")),
        Err(fs::Error::NotFound)
    );

    std::fs::write(dir.join("fake.bmp"), b"PK\x03\x04 definitely not a bitmap").unwrap();
    let mut image = PackedBitImage::new_empty("fake", 8, 8);
    image.clear_modified();
    let err = image.import_bmp(&fs, "fake.bmp").unwrap_err();
    assert_eq!(err, bmp::Error::Format(FormatError::InvalidSignature));
    assert_eq!(err.to_string(), "Not a Bitmap Image");
    // a failed import leaves the image untouched
    assert!(!image.is_modified());
    assert_eq!(image.bits(), &[0u8; 8]);

    assert!(matches!(
        image.import_bmp(&fs, "nope.bmp"),
        Err(bmp::Error::Io(embedded_io::ErrorKind::NotFound))
    ));
}
