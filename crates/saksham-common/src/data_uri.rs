//! Self-describing text form for binary uploads: `data:<mime>;base64,<payload>`.

use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DataUriError {
    #[error("data URI must start with 'data:'")]
    MissingScheme,

    #[error("data URI is missing the ',' payload separator")]
    MissingPayload,

    #[error("data URI must declare a MIME type")]
    MissingMimeType,

    #[error("data URI payload must be base64 encoded")]
    NotBase64,

    #[error("invalid base64 payload: {0}")]
    InvalidPayload(String),
}

/// A decoded data URI: MIME type plus raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUri {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl DataUri {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// The base64 payload without the `data:` header.
    pub fn base64_payload(&self) -> String {
        BASE64_STANDARD.encode(&self.data)
    }

    /// Encode as `data:<mime>;base64,<payload>`.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse a data URI string.
    ///
    /// Only base64 payloads are accepted. Extra media-type parameters such as
    /// `;charset=utf-8` are tolerated and dropped.
    pub fn parse(input: &str) -> Result<Self, DataUriError> {
        let rest = input
            .trim()
            .strip_prefix("data:")
            .ok_or(DataUriError::MissingScheme)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingPayload)?;

        let mut params = header.split(';');
        let mime_type = params.next().unwrap_or_default().trim();
        if mime_type.is_empty() {
            return Err(DataUriError::MissingMimeType);
        }
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(DataUriError::NotBase64);
        }

        let data = BASE64_STANDARD
            .decode(payload.trim())
            .map_err(|e| DataUriError::InvalidPayload(e.to_string()))?;

        Ok(Self {
            mime_type: mime_type.to_ascii_lowercase(),
            data,
        })
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.base64_payload())
    }
}

impl FromStr for DataUri {
    type Err = DataUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Read a file and encode it as a data URI with the given content type.
///
/// A read failure is terminal for the submission that asked for it.
pub async fn encode_file(path: &Path, mime_type: &str) -> crate::Result<String> {
    let data = tokio::fs::read(path).await?;
    debug!("Encoded {} ({} bytes, {})", path.display(), data.len(), mime_type);
    Ok(DataUri::new(mime_type, data).encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SakshamError;

    #[test]
    fn test_round_trip_preserves_mime_and_bytes() {
        let bytes: Vec<u8> = (0u8..=255).collect();
        let encoded = DataUri::new("image/png", bytes.clone()).encode();
        assert!(encoded.starts_with("data:image/png;base64,"));

        let decoded = DataUri::parse(&encoded).unwrap();
        assert_eq!(decoded.mime_type, "image/png");
        assert_eq!(decoded.data, bytes);
    }

    #[test]
    fn test_round_trip_empty_payload() {
        let encoded = DataUri::new("text/csv", Vec::new()).encode();
        assert_eq!(encoded, "data:text/csv;base64,");
        assert!(DataUri::parse(&encoded).unwrap().data.is_empty());
    }

    #[test]
    fn test_parse_tolerates_parameters() {
        let uri = DataUri::parse("data:text/plain;charset=utf-8;base64,aGk=").unwrap();
        assert_eq!(uri.mime_type, "text/plain");
        assert_eq!(uri.data, b"hi");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(
            DataUri::parse("image/png;base64,aGk="),
            Err(DataUriError::MissingScheme)
        );
        assert_eq!(
            DataUri::parse("data:image/png;base64"),
            Err(DataUriError::MissingPayload)
        );
        assert_eq!(
            DataUri::parse("data:;base64,aGk="),
            Err(DataUriError::MissingMimeType)
        );
        assert_eq!(
            DataUri::parse("data:text/plain,hello"),
            Err(DataUriError::NotBase64)
        );
        assert!(matches!(
            DataUri::parse("data:image/png;base64,@@@"),
            Err(DataUriError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_encode_file_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soil.csv");
        std::fs::write(&path, b"ph,moisture\n6.5,0.31\n").unwrap();

        let encoded = encode_file(&path, "text/csv").await.unwrap();
        let decoded: DataUri = encoded.parse().unwrap();
        assert_eq!(decoded.mime_type, "text/csv");
        assert_eq!(decoded.data, b"ph,moisture\n6.5,0.31\n");
    }

    #[tokio::test]
    async fn test_encode_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = encode_file(&dir.path().join("missing.jpg"), "image/jpeg").await;
        assert!(matches!(result, Err(SakshamError::Io(_))));
    }
}
