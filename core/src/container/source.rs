//! PROGMEM C source files: an ordered list of named 1-bit images, each written
//! as
//!
//! ```text
//! // 'NAME', WIDTHxHEIGHTpx
//! const unsigned char NAME [] PROGMEM = {
//! 	0x00, 0x01, ... 16 per line,
//! 	0x10, 0x11
//! };
//!
//! ```

use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};

use log::{debug, info, trace, warn};

use crate::{
    container::bmp,
    fs::{self, Filesystem, Mode},
    image::PackedBitImage,
    io,
};


const COMMENT_PREFIX: &str = "// '";
const DECLARATION_PREFIX: &str = "const unsigned char ";
const DECLARATION_SUFFIX: &str = " [] PROGMEM = {";

/// One source line as seen by the parser.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    /// `// 'NAME', WxHpx`
    Comment { name: &'a str, width: u32, height: u32 },
    /// `const unsigned char NAME [] PROGMEM = {`
    Declaration { name: &'a str },
    /// A run of `0xHH` literals, trimmed.
    Data(&'a str),
    Empty,
    Other,
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Splits a leading identifier off `s`.
fn split_identifier(s: &str) -> Option<(&str, &str)> {
    let end = s.find(|c: char| !is_identifier_char(c)).unwrap_or(s.len());
    (end > 0).then(|| s.split_at(end))
}

fn split_number(s: &str) -> Option<(u32, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

fn match_comment(line: &str) -> Option<Line<'_>> {
    let rest = line.strip_prefix(COMMENT_PREFIX)?;
    let (name, rest) = split_identifier(rest)?;
    let rest = rest.strip_prefix("', ")?;
    let (width, rest) = split_number(rest)?;
    let rest = rest.strip_prefix('x')?;
    let (height, rest) = split_number(rest)?;
    rest.starts_with("px").then_some(Line::Comment {
        name,
        width,
        height,
    })
}

fn match_declaration(line: &str) -> Option<Line<'_>> {
    let rest = line.strip_prefix(DECLARATION_PREFIX)?;
    let (name, rest) = split_identifier(rest)?;
    rest.starts_with(DECLARATION_SUFFIX)
        .then_some(Line::Declaration { name })
}

fn parse_hex_token(token: &str) -> Option<u8> {
    let digits = token.trim().strip_prefix("0x")?;
    if digits.is_empty() || digits.len() > 2 {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

/// Leading `0xHH` literals of a data line. Parsing stops at the first token
/// that is not one.
fn data_bytes(line: &str) -> impl Iterator<Item = u8> + '_ {
    line.split(',').map_while(parse_hex_token)
}

fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Empty;
    }
    if let Some(comment) = match_comment(line) {
        return comment;
    }
    if let Some(declaration) = match_declaration(line) {
        return declaration;
    }
    if data_bytes(trimmed).next().is_some() {
        return Line::Data(trimmed);
    }
    Line::Other
}

enum State {
    Idle,
    /// Saw a header comment, the declaration may still follow.
    AccumulatingName(PackedBitImage),
    /// Collecting bytes until a non-data line.
    AccumulatingData(PackedBitImage),
}

struct Parser {
    state: State,
    images: Vec<PackedBitImage>,
}

impl Parser {
    fn new() -> Self {
        Self {
            state: State::Idle,
            images: Vec::new(),
        }
    }

    fn close(&mut self, mut image: PackedBitImage) {
        image.infer_dimensions();
        debug!(
            "Parsed '{}' {}x{} ({} bytes)",
            image.name(),
            image.width(),
            image.height(),
            image.bits().len()
        );
        self.images.push(image);
    }

    fn feed(&mut self, number: usize, line: &str) {
        let line = classify(line);
        let state = core::mem::replace(&mut self.state, State::Idle);
        self.state = match (state, line) {
            (state, Line::Comment { name, width, height }) => {
                if let State::AccumulatingName(image) | State::AccumulatingData(image) = state {
                    self.close(image);
                }
                trace!("line {number}: header for '{name}' {width}x{height}");
                State::AccumulatingName(PackedBitImage::new(name, width, height))
            }
            (State::Idle, Line::Declaration { name }) => {
                trace!("line {number}: declaration of '{name}' without header");
                State::AccumulatingData(PackedBitImage::new(name, 0, 0))
            }
            (
                State::AccumulatingName(mut image) | State::AccumulatingData(mut image),
                Line::Declaration { name },
            ) => {
                trace!("line {number}: declaration of '{name}'");
                image.set_name(name);
                State::AccumulatingData(image)
            }
            (
                State::AccumulatingName(mut image) | State::AccumulatingData(mut image),
                Line::Data(data),
            ) => {
                image.add_data(data_bytes(data));
                State::AccumulatingData(image)
            }
            (State::AccumulatingName(image) | State::AccumulatingData(image), Line::Other) => {
                self.close(image);
                State::Idle
            }
            (state, _) => state,
        };
    }

    fn finish(self) -> Vec<PackedBitImage> {
        if let State::AccumulatingName(image) | State::AccumulatingData(image) = self.state {
            warn!("Unterminated image '{}' dropped", image.name());
        }
        self.images
    }
}

/// Reads every image block in `text`, in file order.
///
/// A header comment or a declaration opens an image. Data lines append to it
/// and the next line that is neither data nor blank closes it. Images without
/// a header comment get their dimensions inferred from the byte count. Lines
/// outside an image are skipped, and an image still open at the end of the
/// text is dropped.
pub fn parse(text: &str) -> Vec<PackedBitImage> {
    let mut parser = Parser::new();
    for (number, line) in text.lines().enumerate() {
        parser.feed(number + 1, line);
    }
    parser.finish()
}

pub fn serialize(images: &[PackedBitImage]) -> String {
    let mut output = String::new();
    for image in images {
        for line in image.to_source_lines() {
            output.push_str(&line);
            output.push('\n');
        }
    }
    output
}

/// Maps an arbitrary file stem to a C identifier.
pub fn sanitize_identifier(stem: &str) -> String {
    let mut name: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.chars().next().is_none_or(|c| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// An ordered, exclusively owned collection of images backed by an optional
/// source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSourceFile {
    path: Option<String>,
    images: Vec<PackedBitImage>,
}

impl ImageSourceFile {
    /// An unsaved file with no images.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_source(text: &str) -> Self {
        Self {
            path: None,
            images: parse(text),
        }
    }

    /// Loads `path`, or starts an unsaved file when `path` is `None`.
    pub fn open<F: Filesystem>(fs: &F, path: Option<&str>) -> Result<Self, fs::Error> {
        let Some(path) = path else {
            return Ok(Self::new());
        };
        let mut file = fs.open_file(path, Mode::Read).map_err(fs::Error::from_io)?;
        let bytes = io::read_to_end(&mut file).map_err(fs::Error::from_io)?;
        let text = String::from_utf8_lossy(&bytes);
        let images = parse(&text);
        info!("Opened {} with {} images", path, images.len());
        Ok(Self {
            path: Some(path.to_string()),
            images,
        })
    }

    /// Writes every image to `path`, replacing its contents, and makes `path`
    /// the backing file.
    pub fn save<F: Filesystem>(&mut self, fs: &F, path: &str) -> Result<(), fs::Error> {
        let text = self.to_source();
        let mut file = fs.open_file(path, Mode::Write).map_err(fs::Error::from_io)?;
        io::write_all(&mut file, text.as_bytes()).map_err(fs::Error::from_io)?;
        info!("Saved {} images to {}", self.images.len(), path);
        self.path = Some(path.to_string());
        self.mark_saved();
        Ok(())
    }

    pub fn to_source(&self) -> String {
        serialize(&self.images)
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.path.as_deref().map(fs::file_name)
    }

    pub fn images(&self) -> &[PackedBitImage] {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut [PackedBitImage] {
        &mut self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.images.iter().any(PackedBitImage::is_modified)
    }

    pub fn mark_saved(&mut self) {
        self.images.iter_mut().for_each(PackedBitImage::clear_modified);
    }

    /// First image called `name`.
    pub fn search(&self, name: &str) -> Option<&PackedBitImage> {
        self.images.iter().find(|image| image.name() == name)
    }

    pub fn search_mut(&mut self, name: &str) -> Option<&mut PackedBitImage> {
        self.images.iter_mut().find(|image| image.name() == name)
    }

    pub fn push(&mut self, image: PackedBitImage) {
        self.images.push(image);
    }

    pub fn remove(&mut self, index: usize) -> Option<PackedBitImage> {
        (index < self.images.len()).then(|| self.images.remove(index))
    }

    /// Swaps the image at `index` with its predecessor. Returns the image's
    /// new index.
    pub fn move_up(&mut self, index: usize) -> usize {
        if index == 0 || index >= self.images.len() {
            return index;
        }
        self.images.swap(index, index - 1);
        index - 1
    }

    pub fn move_down(&mut self, index: usize) -> usize {
        if index + 1 >= self.images.len() {
            return index;
        }
        self.images.swap(index, index + 1);
        index + 1
    }

    /// Writes each image to `<dir>/<name>.bmp`. Returns the number written.
    pub fn export_all_bmp<F: Filesystem>(&self, fs: &F, dir: &str) -> Result<usize, bmp::Error> {
        fs.create_dir_all(dir).map_err(bmp::Error::from_io)?;
        for image in &self.images {
            let path = format!("{}/{}", dir.trim_end_matches('/'), image.bmp_file_name());
            image.export_bmp(fs, &path)?;
        }
        Ok(self.images.len())
    }

    /// Imports each BMP into the image named after its file stem, appending a
    /// new image when there is none. Returns the number of images added.
    pub fn import_bmp_files<F: Filesystem>(
        &mut self,
        fs: &F,
        paths: &[&str],
    ) -> Result<usize, bmp::Error> {
        let mut added = 0;
        for path in paths {
            let name = sanitize_identifier(fs::file_stem(path));
            if let Some(image) = self.search_mut(&name) {
                image.import_bmp(fs, path)?;
                continue;
            }
            let mut image = PackedBitImage::new(&name, 0, 0);
            image.import_bmp(fs, path)?;
            self.images.push(image);
            added += 1;
        }
        Ok(added)
    }
}
