// src/assets.rs
//! Loading and validating the placeholder video that stands in for real
//! generated output.

use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::AppError;

/// Smallest payload accepted as a real MP4 file.
pub const MIN_PLACEHOLDER_BYTES: usize = 1024;
/// `ftyp` box type expected at byte offset 4 of an MP4 container.
pub const MP4_SIGNATURE: [u8; 4] = [0x66, 0x74, 0x79, 0x70];

/// Checks size and container signature. `source` names the asset in messages.
pub fn validate_placeholder(bytes: &[u8], source: &str) -> Result<(), AppError> {
    if bytes.len() < MIN_PLACEHOLDER_BYTES {
        return Err(AppError::InvalidAsset(format!(
            "Placeholder video asset is invalid (only {} bytes). A valid MP4 file must be at least {} bytes. Please replace {} with a real MP4 video file.",
            bytes.len(),
            MIN_PLACEHOLDER_BYTES,
            source
        )));
    }
    if bytes[4..8] != MP4_SIGNATURE {
        return Err(AppError::InvalidAsset(format!(
            "Placeholder video asset does not appear to be a valid MP4 file (missing ftyp signature). Please replace {} with a real MP4 video file.",
            source
        )));
    }
    Ok(())
}

#[async_trait]
pub trait AssetLoader: Send + Sync {
    /// Human-readable location of the asset.
    fn source(&self) -> String;

    /// Raw bytes, unvalidated.
    async fn fetch(&self) -> Result<Vec<u8>, AppError>;

    /// Fetches and validates the placeholder, failing fast with `InvalidAsset`.
    async fn load_placeholder(&self) -> Result<Vec<u8>, AppError> {
        let bytes = self.fetch().await?;
        validate_placeholder(&bytes, &self.source())?;
        tracing::info!("✓ Loaded valid placeholder video: {} bytes", bytes.len());
        Ok(bytes)
    }
}

pub type SharedAssetLoader = Arc<dyn AssetLoader>;

/// Placeholder served over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAssetLoader {
    client: Client,
    url: String,
}

impl HttpAssetLoader {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl AssetLoader for HttpAssetLoader {
    fn source(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Vec<u8>, AppError> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            AppError::InvalidAsset(format!(
                "Failed to load placeholder video asset. {} is missing or could not be loaded: {}",
                self.url, e
            ))
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::InvalidAsset(format!(
                "Placeholder video asset not found or could not be loaded (HTTP {}). Please ensure {} exists and is accessible.",
                status.as_u16(),
                self.url
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Placeholder read from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileAssetLoader {
    path: PathBuf,
}

impl FileAssetLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AssetLoader for FileAssetLoader {
    fn source(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<u8>, AppError> {
        tokio::fs::read(&self.path).await.map_err(|e| {
            AppError::InvalidAsset(format!(
                "Failed to load placeholder video asset. The file {} is missing or could not be loaded: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Placeholder held in memory.
#[derive(Debug, Clone)]
pub struct StaticAssetLoader {
    name: String,
    bytes: Vec<u8>,
}

impl StaticAssetLoader {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[async_trait]
impl AssetLoader for StaticAssetLoader {
    fn source(&self) -> String {
        self.name.clone()
    }

    async fn fetch(&self) -> Result<Vec<u8>, AppError> {
        Ok(self.bytes.clone())
    }
}

/// Picks the loader for a configured location: URLs go over HTTP, anything
/// else is a path.
pub fn loader_for(location: &str) -> SharedAssetLoader {
    if location.starts_with("http://") || location.starts_with("https://") {
        Arc::new(HttpAssetLoader::new(location))
    } else {
        Arc::new(FileAssetLoader::new(location))
    }
}

/// Smallest payload that passes validation: an `ftyp` box followed by a
/// `free` box padding the file out to `len` bytes.
#[cfg(test)]
pub fn minimal_mp4(len: usize) -> Vec<u8> {
    let len = len.max(MIN_PLACEHOLDER_BYTES);
    let mut bytes = Vec::with_capacity(len);
    bytes.extend_from_slice(&24u32.to_be_bytes());
    bytes.extend_from_slice(b"ftypisom");
    bytes.extend_from_slice(&512u32.to_be_bytes());
    bytes.extend_from_slice(b"isommp41");
    let free_len = (len - bytes.len()) as u32;
    bytes.extend_from_slice(&free_len.to_be_bytes());
    bytes.extend_from_slice(b"free");
    bytes.resize(len, 0);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_payload_rejected() {
        let err = validate_placeholder(&[0u8; 500], "placeholder.mp4").unwrap_err();
        match err {
            AppError::InvalidAsset(msg) => {
                assert!(msg.contains("Placeholder video asset is invalid"));
                assert!(msg.contains("only 500 bytes"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_signature_rejected() {
        let mut bytes = minimal_mp4(2048);
        bytes[4..8].copy_from_slice(b"moov");
        let err = validate_placeholder(&bytes, "placeholder.mp4").unwrap_err();
        assert!(err.to_string().contains("missing ftyp signature"));
    }

    #[test]
    fn test_minimal_mp4_is_valid() {
        let bytes = minimal_mp4(10);
        assert_eq!(bytes.len(), MIN_PLACEHOLDER_BYTES);
        assert_eq!(&bytes[4..8], &MP4_SIGNATURE);
        assert!(validate_placeholder(&bytes, "generated").is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_is_invalid_asset() {
        let loader = FileAssetLoader::new("/definitely/not/here.mp4");
        let err = loader.load_placeholder().await.unwrap_err();
        assert!(matches!(err, AppError::InvalidAsset(_)));
        assert!(err.to_string().contains("placeholder"));
    }

    #[test]
    fn test_loader_selection() {
        assert_eq!(loader_for("https://cdn.example/p.mp4").source(), "https://cdn.example/p.mp4");
        assert_eq!(loader_for("assets/p.mp4").source(), "assets/p.mp4");
    }
}
