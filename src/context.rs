use http::{Method, Request, Uri, header};

/// The parts of a request the middleware needs once the response arrives.
///
/// Captured when the request enters the service, before the inner service
/// takes ownership of it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    accept_encoding: String,
}

impl RequestContext {
    /// Captures the context of `req`.
    ///
    /// Multiple `Accept-Encoding` headers are joined with `", "`. Values that
    /// are not valid UTF-8 are ignored.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let accept_encoding = req
            .headers()
            .get_all(header::ACCEPT_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            accept_encoding,
        }
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request path.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// The client's `Accept-Encoding` declaration, empty when absent.
    pub fn accept_encoding(&self) -> &str {
        &self.accept_encoding
    }
}
