use crate::codec::Codec;
use crate::error::Error;
use crate::options::DeflaterOptions;
use bytes::{Buf, Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};
use http_body_util::Full;
use pin_project_lite::pin_project;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

pin_project! {
    /// A response body produced by the compression middleware.
    ///
    /// Dropping this body drops the wrapped body, which is how the wrapped
    /// body is released on every path, including early termination.
    #[project = CompressionBodyProj]
    #[allow(missing_docs)]
    pub enum CompressionBody<B> {
        /// Body buffered in full, then compressed into a single chunk.
        Compressed {
            #[pin]
            inner: B,
            state: CompressedBody,
        },
        /// Body passed through unchanged.
        Passthrough {
            #[pin]
            inner: B,
        },
        /// Fixed message replacing a body that could not be encoded acceptably.
        NotAcceptable {
            #[pin]
            message: Full<Bytes>,
        },
    }
}

/// State and buffer for a body being compressed.
pub(crate) struct CompressedBody {
    codec: Arc<dyn Codec>,
    options: DeflaterOptions,
    buffer: BytesMut,
    state: CompressState,
    pending_trailers: Option<http::HeaderMap>,
}

/// State machine for compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompressState {
    /// Draining the inner body into the buffer.
    Buffering,
    /// Emitting trailers held back until after the compressed chunk.
    Trailers,
    /// Compression is complete, or failed.
    Done,
}

impl CompressedBody {
    fn new(codec: Arc<dyn Codec>, options: DeflaterOptions) -> Self {
        Self {
            codec,
            options,
            buffer: BytesMut::new(),
            state: CompressState::Buffering,
            pending_trailers: None,
        }
    }

    /// Returns the current compression state.
    pub(crate) fn state(&self) -> CompressState {
        self.state
    }

    /// Polls the inner body until it is drained, then compresses it.
    fn poll_compressed<B>(
        &mut self,
        cx: &mut Context<'_>,
        mut inner: Pin<&mut B>,
    ) -> Poll<Option<Result<Frame<Bytes>, Error>>>
    where
        B: Body,
        B::Error: Into<crate::BoxError>,
    {
        loop {
            match self.state {
                CompressState::Done => return Poll::Ready(None),

                CompressState::Trailers => {
                    self.state = CompressState::Done;
                    return Poll::Ready(self.pending_trailers.take().map(|t| Ok(Frame::trailers(t))));
                }

                CompressState::Buffering => match inner.as_mut().poll_frame(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Some(Err(e))) => {
                        self.state = CompressState::Done;
                        return Poll::Ready(Some(Err(Error::Body(e.into()))));
                    }
                    Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                        Ok(mut data) => {
                            while data.has_remaining() {
                                let chunk = data.chunk();
                                let len = chunk.len();
                                self.buffer.extend_from_slice(chunk);
                                data.advance(len);
                            }
                        }
                        Err(frame) => {
                            if let Ok(trailers) = frame.into_trailers() {
                                self.pending_trailers = Some(trailers);
                                return Poll::Ready(Some(self.compress()));
                            }
                        }
                    },
                    Poll::Ready(None) => return Poll::Ready(Some(self.compress())),
                },
            }
        }
    }

    /// Compresses the buffered body into the single data frame.
    fn compress(&mut self) -> Result<Frame<Bytes>, Error> {
        let input = std::mem::take(&mut self.buffer).freeze();

        match self.codec.compress(&input, &self.options) {
            Ok(compressed) => {
                tracing::debug!(
                    encoding = self.codec.content_encoding(),
                    original = input.len(),
                    compressed = compressed.len(),
                    "response body compressed"
                );
                self.state = if self.pending_trailers.is_some() {
                    CompressState::Trailers
                } else {
                    CompressState::Done
                };
                Ok(Frame::data(compressed))
            }
            Err(e) => {
                self.state = CompressState::Done;
                self.pending_trailers = None;
                Err(Error::Codec(e))
            }
        }
    }
}

impl<B> CompressionBody<B> {
    /// Creates a body that compresses `inner` with `codec` once it is drained.
    pub fn compressed(inner: B, codec: Arc<dyn Codec>, options: DeflaterOptions) -> Self {
        Self::Compressed {
            inner,
            state: CompressedBody::new(codec, options),
        }
    }

    /// Creates a passthrough body without compression.
    pub fn passthrough(inner: B) -> Self {
        Self::Passthrough { inner }
    }

    /// Creates a body yielding `message` as its only chunk.
    pub fn not_acceptable(message: impl Into<Bytes>) -> Self {
        Self::NotAcceptable {
            message: Full::new(message.into()),
        }
    }
}

impl<B: fmt::Debug> fmt::Debug for CompressionBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionBody::Compressed { inner, state } => f
                .debug_struct("Compressed")
                .field("inner", inner)
                .field("encoding", &state.codec.content_encoding())
                .field("state", &state.state)
                .finish(),
            CompressionBody::Passthrough { inner } => {
                f.debug_struct("Passthrough").field("inner", inner).finish()
            }
            CompressionBody::NotAcceptable { message } => f
                .debug_struct("NotAcceptable")
                .field("message", message)
                .finish(),
        }
    }
}

impl<B> Body for CompressionBody<B>
where
    B: Body,
    B::Error: Into<crate::BoxError>,
{
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            CompressionBodyProj::Passthrough { inner } => match inner.poll_frame(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Ready(Some(Ok(frame))) => {
                    let frame = frame.map_data(|mut data| data.copy_to_bytes(data.remaining()));
                    Poll::Ready(Some(Ok(frame)))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(Error::Body(e.into())))),
            },
            CompressionBodyProj::Compressed { inner, state } => state.poll_compressed(cx, inner),
            CompressionBodyProj::NotAcceptable { message } => match message.poll_frame(cx) {
                Poll::Ready(Some(Err(never))) => match never {},
                Poll::Ready(Some(Ok(frame))) => Poll::Ready(Some(Ok(frame))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            CompressionBody::Passthrough { inner } => inner.is_end_stream(),
            CompressionBody::Compressed { state, .. } => state.state() == CompressState::Done,
            CompressionBody::NotAcceptable { message } => message.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            CompressionBody::Passthrough { inner } => inner.size_hint(),
            // Compressed size is unknown
            CompressionBody::Compressed { .. } => SizeHint::default(),
            CompressionBody::NotAcceptable { message } => message.size_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Brotli;
    use http::HeaderMap;
    use std::collections::VecDeque;
    use std::io::{self, Read};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A test body that yields predefined frames.
    struct TestBody {
        frames: VecDeque<Result<Frame<Bytes>, io::Error>>,
        dropped: Arc<AtomicBool>,
    }

    impl TestBody {
        fn new(frames: Vec<Frame<Bytes>>) -> Self {
            Self {
                frames: frames.into_iter().map(Ok).collect(),
                dropped: Arc::default(),
            }
        }
    }

    impl Drop for TestBody {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    impl Body for TestBody {
        type Data = Bytes;
        type Error = io::Error;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
            Poll::Ready(self.frames.pop_front())
        }
    }

    struct FailingCodec;

    impl Codec for FailingCodec {
        fn content_encoding(&self) -> &'static str {
            "br"
        }

        fn compress(&self, _input: &[u8], _options: &DeflaterOptions) -> io::Result<Bytes> {
            Err(io::Error::other("codec exploded"))
        }
    }

    fn poll_body<B: Body + Unpin>(body: &mut B) -> Option<Result<Frame<B::Data>, B::Error>> {
        let waker = std::task::Waker::noop();
        let mut cx = Context::from_waker(waker);
        match Pin::new(body).poll_frame(&mut cx) {
            Poll::Ready(result) => result,
            Poll::Pending => None,
        }
    }

    fn brotli(inner: TestBody) -> CompressionBody<TestBody> {
        CompressionBody::compressed(inner, Arc::new(Brotli), DeflaterOptions::default())
    }

    fn decompress(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        brotli::Decompressor::new(data, 4096)
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_passthrough_data() {
        let inner = TestBody::new(vec![Frame::data(Bytes::from("hello world"))]);
        let mut body = CompressionBody::passthrough(inner);

        let frame = poll_body(&mut body).unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from("hello world"));

        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_passthrough_trailers() {
        let mut trailers = HeaderMap::new();
        trailers.insert("x-checksum", "abc123".parse().unwrap());

        let inner = TestBody::new(vec![
            Frame::data(Bytes::from("data")),
            Frame::trailers(trailers),
        ]);
        let mut body = CompressionBody::passthrough(inner);

        assert!(poll_body(&mut body).unwrap().unwrap().is_data());

        let frame = poll_body(&mut body).unwrap().unwrap();
        let received = frame.into_trailers().unwrap();
        assert_eq!(received.get("x-checksum").unwrap(), "abc123");

        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_compressed_yields_single_chunk() {
        let inner = TestBody::new(vec![
            Frame::data(Bytes::from("hello ")),
            Frame::data(Bytes::from("brotli ")),
            Frame::data(Bytes::from("world")),
        ]);
        let mut body = brotli(inner);
        assert!(!body.is_end_stream());

        let data = poll_body(&mut body).unwrap().unwrap().into_data().unwrap();
        assert_eq!(decompress(&data), b"hello brotli world");

        assert!(body.is_end_stream());
        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_compressed_empty_body() {
        let mut body = brotli(TestBody::new(vec![]));

        let data = poll_body(&mut body).unwrap().unwrap().into_data().unwrap();
        assert!(decompress(&data).is_empty());
        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_compressed_with_trailers() {
        let mut trailers = HeaderMap::new();
        trailers.insert("x-checksum", "abc123".parse().unwrap());

        let inner = TestBody::new(vec![
            Frame::data(Bytes::from("hello world")),
            Frame::trailers(trailers),
        ]);
        let mut body = brotli(inner);

        let data = poll_body(&mut body).unwrap().unwrap().into_data().unwrap();
        assert_eq!(decompress(&data), b"hello world");

        let received = poll_body(&mut body)
            .unwrap()
            .unwrap()
            .into_trailers()
            .unwrap();
        assert_eq!(received.get("x-checksum").unwrap(), "abc123");

        assert!(body.is_end_stream());
        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_codec_failure_propagates() {
        let inner = TestBody::new(vec![Frame::data(Bytes::from("hello world"))]);
        let mut body =
            CompressionBody::compressed(inner, Arc::new(FailingCodec), DeflaterOptions::default());

        let err = poll_body(&mut body).unwrap().unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_inner_error_propagates_without_output() {
        let mut inner = TestBody::new(vec![Frame::data(Bytes::from("partial"))]);
        inner.frames.push_back(Err(io::Error::other("upstream broke")));
        let mut body = brotli(inner);

        let err = poll_body(&mut body).unwrap().unwrap_err();
        assert!(matches!(err, Error::Body(_)));
        assert!(body.is_end_stream());
        assert!(poll_body(&mut body).is_none());
    }

    #[test]
    fn test_drop_releases_inner() {
        let inner = TestBody::new(vec![Frame::data(Bytes::from("unread"))]);
        let dropped = inner.dropped.clone();
        let body = brotli(inner);

        assert!(!dropped.load(Ordering::SeqCst));
        drop(body);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_not_acceptable_message() {
        let mut body = CompressionBody::<TestBody>::not_acceptable("nope");
        assert_eq!(body.size_hint().exact(), Some(4));

        let data = poll_body(&mut body).unwrap().unwrap().into_data().unwrap();
        assert_eq!(data, Bytes::from("nope"));
        assert!(poll_body(&mut body).is_none());
    }
}
