mod data_uri;

pub use data_uri::{encode_file, DataUri, DataUriError};

/// Errors reading user files for a request.
#[derive(thiserror::Error, Debug)]
pub enum SakshamError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{file_name} ({size} bytes) was too large to keep")]
    UploadTooLarge { file_name: String, size: u64 },
}

pub type Result<T> = std::result::Result<T, SakshamError>;
