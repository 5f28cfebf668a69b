use std::fmt::{self, Debug, Display};
use std::io::Write;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::errors::CompressionError;

/// Decides whether a request payload gets compressed, compresses it, and
/// declares the matching header values.
pub trait CompressionManager: Debug + Send + Sync {
    /// Whether `data` should be compressed before sending.
    fn needs_compression(&self, data: &[u8]) -> bool;

    /// Compresses `data` with the scheme named by [`CompressionManager::content_encoding`].
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError>;

    /// Value of the `Content-Encoding` header for compressed payloads.
    /// Must name the scheme used by [`CompressionManager::compress`].
    fn content_encoding(&self) -> &str;

    /// Value of the `Accept-Encoding` header, if responses may be compressed.
    fn accept_encoding(&self) -> Option<&str>;
}

/// Encodings the server may use for responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptEncoding {
    /// zlib-wrapped deflate.
    Deflate,
    /// gzip.
    Gzip,
    /// No compression.
    Identity,
}

impl AcceptEncoding {
    /// Header value of the encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptEncoding::Deflate => "deflate",
            AcceptEncoding::Gzip => "gzip",
            AcceptEncoding::Identity => "identity",
        }
    }
}

impl Display for AcceptEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DISABLED: usize = usize::MAX;

/// Compresses requests with deflate (zlib stream).
///
/// Threshold and level can be changed while the manager is in use; requests
/// already being prepared may still see the previous values.
#[derive(Debug)]
pub struct DefaultCompressionManager {
    threshold: AtomicUsize,
    level: AtomicU32,
    accept: Option<AcceptEncoding>,
}

impl DefaultCompressionManager {
    /// Creates a manager compressing payloads of at least `threshold` bytes
    /// (`None` disables request compression) at `level` (0-9, clamped).
    pub fn new(threshold: Option<usize>, level: u32, accept: Option<AcceptEncoding>) -> Self {
        DefaultCompressionManager {
            threshold: AtomicUsize::new(threshold.unwrap_or(DISABLED)),
            level: AtomicU32::new(level.min(9)),
            accept,
        }
    }

    /// Minimum payload size that gets compressed, `None` if compression is off.
    pub fn threshold(&self) -> Option<usize> {
        match self.threshold.load(Ordering::Relaxed) {
            DISABLED => None,
            threshold => Some(threshold),
        }
    }

    /// Changes the threshold. Requests already being prepared may use the old value.
    pub fn set_threshold(&self, threshold: Option<usize>) {
        self.threshold
            .store(threshold.unwrap_or(DISABLED), Ordering::Relaxed);
    }

    /// Compression level, from 0 to 9.
    pub fn level(&self) -> u32 {
        self.level.load(Ordering::Relaxed)
    }

    /// Changes the compression level. Values above 9 are clamped.
    pub fn set_level(&self, level: u32) {
        self.level.store(level.min(9), Ordering::Relaxed);
    }
}

impl Default for DefaultCompressionManager {
    /// Request compression disabled, level 6, no compressed responses.
    fn default() -> Self {
        DefaultCompressionManager::new(None, 6, None)
    }
}

impl CompressionManager for DefaultCompressionManager {
    fn needs_compression(&self, data: &[u8]) -> bool {
        match self.threshold() {
            Some(threshold) => data.len() >= threshold,
            None => false,
        }
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level()));
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn content_encoding(&self) -> &str {
        "deflate"
    }

    fn accept_encoding(&self) -> Option<&str> {
        self.accept.as_ref().map(AcceptEncoding::as_str)
    }
}

#[cfg(test)]
pub(crate) fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    use std::io::Read;

    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}
