use saksham_common::{encode_file, DataUri, SakshamError};
use std::path::{Path, PathBuf};

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone)]
enum Source {
    Memory(Vec<u8>),
    Disk(PathBuf),
    /// Contents were not kept because the file was too large to hold.
    Dropped,
}

/// A user-selected file. Name, type and size are known up front so the file
/// can be validated before its contents are read.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    source: Source,
}

impl Upload {
    pub fn from_bytes(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size: bytes.len() as u64,
            source: Source::Memory(bytes),
        }
    }

    /// A file whose contents were discarded while receiving it. The size is
    /// still the full size, so size rules reject it as usual.
    pub fn dropped(file_name: impl Into<String>, content_type: impl Into<String>, size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size,
            source: Source::Dropped,
        }
    }

    /// Describe a file on disk without reading it. The content type is guessed
    /// from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(Self {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            content_type: guess_content_type(path).to_string(),
            size: metadata.len(),
            source: Source::Disk(path.to_path_buf()),
        })
    }

    fn mime_type(&self) -> &str {
        if self.content_type.trim().is_empty() {
            OCTET_STREAM
        } else {
            self.content_type.trim()
        }
    }

    /// Read the contents and encode them as `data:<mime>;base64,<payload>`.
    pub async fn read_as_data_uri(&self) -> Result<String, SakshamError> {
        match &self.source {
            Source::Memory(bytes) => Ok(DataUri::new(self.mime_type(), bytes.clone()).encode()),
            Source::Disk(path) => encode_file(path, self.mime_type()).await,
            Source::Dropped => Err(SakshamError::UploadTooLarge {
                file_name: self.file_name.clone(),
                size: self.size,
            }),
        }
    }
}

/// Content type for common farm uploads, by file extension.
pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("leaf.JPG")), "image/jpeg");
        assert_eq!(guess_content_type(Path::new("rain.csv")), "text/csv");
        assert_eq!(guess_content_type(Path::new("README")), OCTET_STREAM);
    }

    #[tokio::test]
    async fn test_blank_content_type_falls_back_to_octet_stream() {
        let upload = Upload::from_bytes("data.bin", "", vec![1, 2]);
        let uri = upload.read_as_data_uri().await.unwrap();
        assert_eq!(uri, "data:application/octet-stream;base64,AQI=");
    }

    #[tokio::test]
    async fn test_dropped_upload_keeps_size_but_cannot_be_read() {
        let upload = Upload::dropped("leaf.jpg", "image/jpeg", 40_000_000);
        assert_eq!(upload.size, 40_000_000);
        assert!(matches!(
            upload.read_as_data_uri().await,
            Err(SakshamError::UploadTooLarge { size: 40_000_000, .. })
        ));
    }

    #[tokio::test]
    async fn test_from_path_reads_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.png");
        std::fs::write(&path, [137u8, 80, 78, 71]).unwrap();

        let upload = Upload::from_path(&path).await.unwrap();
        assert_eq!(upload.file_name, "leaf.png");
        assert_eq!(upload.content_type, "image/png");
        assert_eq!(upload.size, 4);

        let decoded = DataUri::parse(&upload.read_as_data_uri().await.unwrap()).unwrap();
        assert_eq!(decoded.data, vec![137u8, 80, 78, 71]);

        std::fs::remove_file(&path).unwrap();
        assert!(upload.read_as_data_uri().await.is_err());
    }
}
