use std::io;

/// All errors that can occur while reading, editing or repacking a save.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Format error: {0}")]
    Format(String),

    #[error("Decompression failed: {0}")]
    Decompression(#[source] io::Error),

    #[error("Field not found: {0}")]
    FieldNotFound(&'static str),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("No save container in archive")]
    NoSaveContainer,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}

// binrw only fails on short or malformed header bytes, which is a format problem
impl From<binrw::Error> for Error {
    fn from(e: binrw::Error) -> Self {
        Self::Format(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
