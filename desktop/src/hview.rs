use std::process::ExitCode;

use argh::FromArgs;
use log::error;
use progmem_core::{ImageSourceFile, PackedBitImage};
use progmem_desktop::std_fs::StdFilesystem;

#[derive(FromArgs)]
/// List the images in a PROGMEM header
struct Args {
    /// input header file
    #[argh(option, short = 'i')]
    input: String,

    /// only show this image
    #[argh(option, short = 'n')]
    name: Option<String>,

    /// print each image as ASCII art
    #[argh(switch, short = 'a')]
    ascii: bool,
}

fn print_ascii(image: &PackedBitImage) {
    for y in 0..image.height() {
        let row: String = (0..image.width())
            .map(|x| if image.get_pixel(x, y) { '#' } else { '.' })
            .collect();
        println!("{row}");
    }
}

fn main() -> ExitCode {
    progmem_desktop::init_logging();
    let args: Args = argh::from_env();
    let fs = StdFilesystem::default();

    let file = match ImageSourceFile::open(&fs, Some(args.input.as_str())) {
        Ok(file) => file,
        Err(err) => {
            error!("Failed to open {}: {}", args.input, err);
            return ExitCode::FAILURE;
        }
    };

    let images: Vec<&PackedBitImage> = match &args.name {
        Some(name) => match file.search(name) {
            Some(image) => vec![image],
            None => {
                error!("No image named '{}' in {}", name, args.input);
                return ExitCode::FAILURE;
            }
        },
        None => file.images().iter().collect(),
    };

    for image in images {
        println!(
            "{}\t{}x{}\t{} bytes",
            image.name(),
            image.width(),
            image.height(),
            image.bits().len()
        );
        if args.ascii {
            print_ascii(image);
            println!();
        }
    }
    ExitCode::SUCCESS
}
