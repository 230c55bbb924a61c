use crate::codec::{Brotli, Codec};
use crate::eligibility::Predicate;
use crate::notify::{NoopNotifier, Notifier};
use crate::options::DeflaterOptions;
use crate::service::CompressionService;
use std::sync::Arc;
use tower::Layer;

/// Configuration shared by every service and response produced by a layer.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) include: Option<Vec<String>>,
    pub(crate) predicate: Option<Arc<dyn Predicate>>,
    pub(crate) deflater: DeflaterOptions,
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include: None,
            predicate: None,
            deflater: DeflaterOptions::default(),
            codec: Arc::new(Brotli),
            notifier: Arc::new(NoopNotifier),
        }
    }
}

/// A Tower layer that compresses HTTP response bodies.
///
/// Configuration is fixed once the layer is built. Services created from it
/// share the configuration without locking.
#[derive(Debug, Clone, Default)]
pub struct CompressionLayer {
    config: Arc<Config>,
}

impl CompressionLayer {
    /// Creates a new compression layer with default settings.
    ///
    /// Every content type is eligible, there is no predicate, Brotli runs at
    /// quality 5, and instrumentation is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts compression to responses whose media type is in `content_types`.
    ///
    /// Responses without a `Content-Type` are then never compressed.
    pub fn include<I, T>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.config_mut().include = Some(content_types.into_iter().map(Into::into).collect());
        self
    }

    /// Sets an extra condition a response must satisfy to be compressed.
    pub fn predicate<P: Predicate>(mut self, predicate: P) -> Self {
        self.config_mut().predicate = Some(Arc::new(predicate));
        self
    }

    /// Sets a closure as the extra compression condition.
    ///
    /// Same as [`CompressionLayer::predicate`], with closure signatures
    /// inferred.
    pub fn compress_if<F>(self, f: F) -> Self
    where
        F: Fn(
                &crate::RequestContext,
                http::StatusCode,
                &http::HeaderMap,
                &http_body::SizeHint,
            ) -> bool
            + Send
            + Sync
            + 'static,
    {
        self.predicate(f)
    }

    /// Sets the options passed to the codec.
    pub fn deflater(mut self, options: DeflaterOptions) -> Self {
        self.config_mut().deflater = options;
        self
    }

    /// Sets the instrumentation backend.
    pub fn notifier<N: Notifier>(mut self, notifier: N) -> Self {
        self.config_mut().notifier = Arc::new(notifier);
        self
    }

    /// Replaces the Brotli codec.
    pub fn codec<C: Codec>(mut self, codec: C) -> Self {
        self.config_mut().codec = Arc::new(codec);
        self
    }

    #[cfg(test)]
    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Config {
        Arc::make_mut(&mut self.config)
    }
}

impl<S> Layer<S> for CompressionLayer {
    type Service = CompressionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CompressionService::new(inner, self.config.clone())
    }
}
