use std::io;

/// Boxed error produced by a wrapped response body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the compression middleware.
///
/// Configuration variants are returned while building options, before any
/// request is served. `Body` and `Codec` surface while the compressed body
/// is being consumed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Brotli quality outside `0..=11`.
    #[error("invalid compression quality {0}, expected 0..=11")]
    InvalidQuality(u32),

    /// Brotli window size outside `10..=24`.
    #[error("invalid window size {0}, expected 10..=24")]
    InvalidWindowSize(u32),

    /// Brotli block size outside `16..=24`.
    #[error("invalid block size {0}, expected 16..=24")]
    InvalidBlockSize(u32),

    /// The wrapped body failed while it was being drained.
    #[error("response body error: {0}")]
    Body(#[source] BoxError),

    /// The codec failed to compress the buffered body.
    #[error("compression failed: {0}")]
    Codec(#[source] io::Error),
}
