use embedded_io::{ErrorKind, ErrorType, Read, Seek, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    /// Create or truncate.
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    NotFound,
    Io(ErrorKind),
}

impl Error {
    pub fn from_io(error: impl embedded_io::Error) -> Self {
        match error.kind() {
            ErrorKind::NotFound => Error::NotFound,
            kind => Error::Io(kind),
        }
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound => ErrorKind::NotFound,
            Error::Io(kind) => *kind,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotFound => write!(f, "file not found"),
            Error::Io(kind) => write!(f, "i/o error: {kind:?}"),
        }
    }
}

impl core::error::Error for Error {}

pub trait File: Read + Write + Seek {
    fn size(&self) -> usize;
}

pub trait Filesystem: ErrorType {
    type File: File;

    fn open_file(&self, path: &str, mode: Mode) -> Result<Self::File, Self::Error>;
    fn exists(&self, path: &str) -> Result<bool, Self::Error>;
    fn create_dir_all(&self, path: &str) -> Result<(), Self::Error>;
}

/// Last component of a `/` or `\` separated path.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// File name without its final extension.
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}
