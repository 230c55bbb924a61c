use crate::error::Error;
use serde::Deserialize;

/// Default Brotli quality.
pub const DEFAULT_QUALITY: u32 = 5;

const MAX_QUALITY: u32 = 11;
const WINDOW_SIZE_RANGE: std::ops::RangeInclusive<u32> = 10..=24;
const BLOCK_SIZE_RANGE: std::ops::RangeInclusive<u32> = 16..=24;

/// Options handed to the codec on every compression.
///
/// Values are validated when built, so any `DeflaterOptions` in hand is
/// usable as-is. Deserializing goes through the same validation.
///
/// ```
/// use http_brotli_compression::DeflaterOptions;
///
/// let options = DeflaterOptions::builder().quality(9).window_size(22).build()?;
/// assert_eq!(options.quality(), 9);
/// # Ok::<(), http_brotli_compression::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDeflaterOptions")]
pub struct DeflaterOptions {
    quality: u32,
    window_size: Option<u32>,
    block_size: Option<u32>,
    text_mode: bool,
}

impl DeflaterOptions {
    /// Starts building options from the defaults.
    pub fn builder() -> DeflaterOptionsBuilder {
        DeflaterOptionsBuilder::default()
    }

    /// Compression quality, `0..=11`.
    pub fn quality(&self) -> u32 {
        self.quality
    }

    /// Base-2 logarithm of the sliding window size, if overridden.
    pub fn window_size(&self) -> Option<u32> {
        self.window_size
    }

    /// Base-2 logarithm of the input block size, if overridden.
    pub fn block_size(&self) -> Option<u32> {
        self.block_size
    }

    /// Whether the encoder is tuned for UTF-8 text input.
    pub fn text_mode(&self) -> bool {
        self.text_mode
    }
}

impl Default for DeflaterOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            window_size: None,
            block_size: None,
            text_mode: false,
        }
    }
}

/// Builder for [`DeflaterOptions`].
#[derive(Debug, Clone, Default)]
pub struct DeflaterOptionsBuilder {
    raw: RawDeflaterOptions,
}

impl DeflaterOptionsBuilder {
    /// Sets the compression quality.
    pub fn quality(mut self, quality: u32) -> Self {
        self.raw.quality = Some(quality);
        self
    }

    /// Sets the base-2 logarithm of the sliding window size.
    pub fn window_size(mut self, lgwin: u32) -> Self {
        self.raw.window_size = Some(lgwin);
        self
    }

    /// Sets the base-2 logarithm of the input block size.
    pub fn block_size(mut self, lgblock: u32) -> Self {
        self.raw.block_size = Some(lgblock);
        self
    }

    /// Tunes the encoder for UTF-8 text.
    pub fn text_mode(mut self, enabled: bool) -> Self {
        self.raw.text_mode = enabled;
        self
    }

    /// Validates and returns the options.
    pub fn build(self) -> Result<DeflaterOptions, Error> {
        DeflaterOptions::try_from(self.raw)
    }
}

/// Unvalidated options as they appear in configuration files.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDeflaterOptions {
    #[serde(default)]
    quality: Option<u32>,
    #[serde(default)]
    window_size: Option<u32>,
    #[serde(default)]
    block_size: Option<u32>,
    #[serde(default)]
    text_mode: bool,
}

impl TryFrom<RawDeflaterOptions> for DeflaterOptions {
    type Error = Error;

    fn try_from(raw: RawDeflaterOptions) -> Result<Self, Self::Error> {
        let quality = raw.quality.unwrap_or(DEFAULT_QUALITY);
        if quality > MAX_QUALITY {
            return Err(Error::InvalidQuality(quality));
        }
        if let Some(lgwin) = raw.window_size.filter(|w| !WINDOW_SIZE_RANGE.contains(w)) {
            return Err(Error::InvalidWindowSize(lgwin));
        }
        if let Some(lgblock) = raw.block_size.filter(|b| !BLOCK_SIZE_RANGE.contains(b)) {
            return Err(Error::InvalidBlockSize(lgblock));
        }

        Ok(Self {
            quality,
            window_size: raw.window_size,
            block_size: raw.block_size,
            text_mode: raw.text_mode,
        })
    }
}
