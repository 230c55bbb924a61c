//! Brotli response compression middleware for Tower.
//!
//! This crate provides a Tower layer that buffers eligible HTTP response
//! bodies and compresses them with Brotli when the client's `Accept-Encoding`
//! header allows it.
//!
//! # Example
//!
//! ```ignore
//! use http_brotli_compression::{CompressionLayer, DeflaterOptions};
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(
//!         CompressionLayer::new()
//!             .include(["text/html", "application/json"])
//!             .deflater(DeflaterOptions::builder().quality(9).build()?),
//!     )
//!     .service(my_service);
//! ```
//!
//! # Compression Rules
//!
//! Checked in order. The response passes through untouched when:
//! - The status is 1xx, 204 or 304
//! - `Cache-Control` contains `no-transform`
//! - `Content-Encoding` is set to anything but `identity`
//! - An include list is configured and the media type is not on it
//! - The configured predicate returns `false`
//! - `Content-Length` is `0`
//!
//! Otherwise, when the client accepts `br` the body is compressed. When it
//! does not, including when `Accept-Encoding` is missing, the response is
//! replaced by a `406 Not Acceptable` with a `text/plain` message.
//!
//! # Response Modifications
//!
//! When compression is applied:
//! - `Content-Encoding` header is set to `br`
//! - `Content-Length` header is removed (compressed size is unknown)
//! - `Vary` header includes `Accept-Encoding`
//! - The body is drained in full and emitted as one compressed chunk

#![deny(missing_docs)]

mod body;
mod codec;
mod context;
mod eligibility;
mod error;
mod future;
mod layer;
mod negotiate;
mod notify;
mod options;
mod service;

pub use body::CompressionBody;
pub use codec::{Brotli, Codec};
pub use context::RequestContext;
pub use eligibility::{DEFAULT_MIN_SIZE, MinSize, Predicate};
pub use error::{BoxError, Error};
pub use future::ResponseFuture;
pub use layer::CompressionLayer;
pub use negotiate::select_encoding;
pub use notify::{EVENT_NAME, Event, NoopNotifier, Notifier, TracingNotifier};
pub use options::{DEFAULT_QUALITY, DeflaterOptions, DeflaterOptionsBuilder};
pub use service::CompressionService;
