//! Temporary URLs for binary buffers.
//!
//! Analog of an object URL: write the buffer to a temporary file and hand
//! back a dereferenceable `file://` URL. Pure and synchronous; no
//! correlation involved.

use std::io::Write;

use tempfile::NamedTempFile;
use thiserror::Error;

use ::url::Url;

/// Error type for [`buffer_url`].
#[derive(Debug, Error)]
pub enum BufferUrlError {
    #[error("failed to write buffer to temporary file: {0}")]
    Io(#[from] std::io::Error),

    #[error("temporary path is not representable as a file URL")]
    Unrepresentable,
}

/// A dereferenceable `file://` URL backed by a temporary file.
///
/// The backing file is removed when the value is dropped, which revokes the
/// URL. Keep the `BufferUrl` alive for as long as the URL is handed out.
#[derive(Debug)]
pub struct BufferUrl {
    url: Url,
    _file: tempfile::TempPath,
}

impl BufferUrl {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// Write `buffer` to a temporary file and return a URL addressing it.
pub fn buffer_url(buffer: &[u8]) -> Result<BufferUrl, BufferUrlError> {
    let mut file = NamedTempFile::new()?;
    file.write_all(buffer)?;
    file.flush()?;

    let path = file.into_temp_path();
    let url = Url::from_file_path(&path).map_err(|_| BufferUrlError::Unrepresentable)?;
    Ok(BufferUrl { url, _file: path })
}
