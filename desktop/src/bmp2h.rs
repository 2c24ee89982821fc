use std::process::ExitCode;

use argh::FromArgs;
use log::{error, info};
use progmem_core::{ImageSourceFile, fs::Filesystem};
use progmem_desktop::std_fs::StdFilesystem;

#[derive(FromArgs)]
/// Import BMP files into a PROGMEM header. Each file replaces the image named
/// after its file stem, or is appended as a new image.
struct Args {
    /// output header file
    #[argh(option, short = 'o')]
    output: String,

    /// header to merge into, defaults to the output file if it exists
    #[argh(option, short = 'i')]
    input: Option<String>,

    /// BMP files to import
    #[argh(positional)]
    bmp: Vec<String>,
}

fn main() -> ExitCode {
    progmem_desktop::init_logging();
    let args: Args = argh::from_env();
    let fs = StdFilesystem::default();

    let source = match &args.input {
        Some(input) => Some(input.as_str()),
        None if fs.exists(&args.output).unwrap_or(false) => Some(args.output.as_str()),
        None => None,
    };
    let mut file = match ImageSourceFile::open(&fs, source) {
        Ok(file) => file,
        Err(err) => {
            error!("Failed to open {}: {}", source.unwrap_or_default(), err);
            return ExitCode::FAILURE;
        }
    };

    let paths: Vec<&str> = args.bmp.iter().map(String::as_str).collect();
    let added = match file.import_bmp_files(&fs, &paths) {
        Ok(added) => added,
        Err(err) => {
            error!("Import failed: {}", err);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Imported {} files ({} new images, {} total)",
        paths.len(),
        added,
        file.len()
    );

    if let Err(err) = file.save(&fs, &args.output) {
        error!("Failed to write {}: {}", args.output, err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
