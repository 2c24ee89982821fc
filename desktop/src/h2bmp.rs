use std::process::ExitCode;

use argh::FromArgs;
use log::{error, info};
use progmem_core::{ImageSourceFile, fs::Filesystem};
use progmem_desktop::std_fs::StdFilesystem;

#[derive(FromArgs)]
/// Export images from a PROGMEM header to 24-bit BMP files
struct Args {
    /// input header file
    #[argh(option, short = 'i')]
    input: String,

    /// output directory
    #[argh(option, short = 'o', default = "String::from(\".\")")]
    output: String,

    /// only export this image, may be repeated
    #[argh(option, short = 'n')]
    name: Vec<String>,
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

    if args.name.is_empty() {
        return match file.export_all_bmp(&fs, &args.output) {
            Ok(count) => {
                info!("Exported {} images to {}", count, args.output);
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!("Export failed: {}", err);
                ExitCode::FAILURE
            }
        };
    }

    if let Err(kind) = fs.create_dir_all(&args.output) {
        error!("Failed to create {}: {:?}", args.output, kind);
        return ExitCode::FAILURE;
    }
    let mut status = ExitCode::SUCCESS;
    for name in &args.name {
        let Some(image) = file.search(name) else {
            error!("No image named '{}' in {}", name, args.input);
            status = ExitCode::FAILURE;
            continue;
        };
        let path = format!("{}/{}", args.output.trim_end_matches('/'), image.bmp_file_name());
        if let Err(err) = image.export_bmp(&fs, &path) {
            error!("Failed to export '{}': {}", name, err);
            status = ExitCode::FAILURE;
        }
    }
    status
}
