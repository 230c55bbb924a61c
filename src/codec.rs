use crate::options::DeflaterOptions;
use bytes::{Bytes, BytesMut};
use compression_codecs::{
    EncodeV2,
    brotli::{BrotliEncoder, params::EncoderParams as BrotliParams},
};
use compression_core::Level;
use compression_core::util::{PartialBuffer, WriteBuffer};
use std::fmt;
use std::io;

const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB scratch buffer

/// A whole-buffer compressor.
///
/// The middleware offers exactly one content coding, the one named by
/// [`Codec::content_encoding`].
pub trait Codec: Send + Sync + 'static {
    /// Returns the Content-Encoding token produced by this codec.
    fn content_encoding(&self) -> &'static str;

    /// Compresses `input` in one go.
    fn compress(&self, input: &[u8], options: &DeflaterOptions) -> io::Result<Bytes>;
}

impl fmt::Debug for dyn Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Codec").field(&self.content_encoding()).finish()
    }
}

/// Brotli compression.
#[derive(Debug, Clone, Copy, Default)]
pub struct Brotli;

impl Brotli {
    fn params(options: &DeflaterOptions) -> BrotliParams {
        let mut params = BrotliParams::default().quality(Level::Precise(options.quality() as i32));
        if let Some(lgwin) = options.window_size() {
            params = params.window_size(lgwin as i32);
        }
        if let Some(lgblock) = options.block_size() {
            params = params.block_size(lgblock as i32);
        }
        if options.text_mode() {
            params = params.text_mode();
        }
        params
    }
}

impl Codec for Brotli {
    fn content_encoding(&self) -> &'static str {
        "br"
    }

    fn compress(&self, input: &[u8], options: &DeflaterOptions) -> io::Result<Bytes> {
        let mut encoder = BrotliEncoder::new(Self::params(options));
        let mut scratch = vec![0u8; OUTPUT_BUFFER_SIZE];
        let mut input_buf = PartialBuffer::new(input);
        let mut compressed = BytesMut::new();

        while input_buf.written_len() < input.len() {
            let consumed = input_buf.written_len();
            let mut output = WriteBuffer::new_initialized(scratch.as_mut_slice());
            encoder.encode(&mut input_buf, &mut output)?;

            let written = output.written_len();
            compressed.extend_from_slice(&scratch[..written]);

            // Encoder made no progress at all
            if written == 0 && input_buf.written_len() == consumed {
                return Err(io::Error::other("brotli encoder stalled"));
            }
        }

        loop {
            let mut output = WriteBuffer::new_initialized(scratch.as_mut_slice());
            let done = encoder.finish(&mut output)?;

            let written = output.written_len();
            compressed.extend_from_slice(&scratch[..written]);
            if done {
                break;
            }
        }

        Ok(compressed.freeze())
    }
}
