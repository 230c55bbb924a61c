use crate::body::CompressionBody;
use crate::context::RequestContext;
use crate::eligibility::{self, Eligibility};
use crate::layer::Config;
use crate::negotiate;
use crate::notify;
use http::{HeaderMap, HeaderValue, Response, StatusCode, header};
use http_body::Body;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

const VARY_ACCEPT_ENCODING: &str = "Accept-Encoding";

pin_project! {
    /// Future for compression service responses.
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        context: RequestContext,
        config: Arc<Config>,
    }
}

impl<F> ResponseFuture<F> {
    pub(crate) fn new(inner: F, context: RequestContext, config: Arc<Config>) -> Self {
        Self {
            inner,
            context,
            config,
        }
    }
}

impl<F, B, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
    B: Body,
{
    type Output = Result<Response<CompressionBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.inner.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Ready(Ok(response)) => {
                let response = wrap_response(response, this.context, this.config);
                Poll::Ready(Ok(response))
            }
        }
    }
}

/// Compresses, rejects, or passes through the response.
fn wrap_response<B: Body>(
    response: Response<B>,
    context: &RequestContext,
    config: &Config,
) -> Response<CompressionBody<B>> {
    let (mut parts, body) = response.into_parts();

    let policy = Eligibility {
        include: config.include.as_deref(),
        predicate: config.predicate.as_deref(),
    };
    if !eligibility::should_compress(
        context,
        parts.status,
        &parts.headers,
        &body.size_hint(),
        &policy,
    ) {
        return Response::from_parts(parts, CompressionBody::passthrough(body));
    }

    let encoding =
        negotiate::select_encoding(&[config.codec.content_encoding()], context.accept_encoding());

    match encoding {
        Some(encoding) => notify::instrument(config.notifier.as_ref(), context, move || {
            add_vary_accept_encoding(&mut parts.headers);

            parts.headers.insert(
                header::CONTENT_ENCODING,
                HeaderValue::from_static(encoding),
            );

            // Remove Content-Length since compressed size is unknown
            parts.headers.remove(header::CONTENT_LENGTH);

            let body = CompressionBody::compressed(body, config.codec.clone(), config.deflater);
            Response::from_parts(parts, body)
        }),
        None => {
            drop(body);
            not_acceptable(context)
        }
    }
}

/// Builds the 406 response sent when no offered encoding is acceptable.
fn not_acceptable<B>(context: &RequestContext) -> Response<CompressionBody<B>> {
    let message = format!(
        "An acceptable encoding for the requested resource {} could not be found.",
        context.path()
    );
    tracing::debug!(
        path = context.path(),
        accept_encoding = context.accept_encoding(),
        "no acceptable encoding, responding 406"
    );

    let content_length = HeaderValue::from(message.len());
    let mut response = Response::new(CompressionBody::not_acceptable(message));
    *response.status_mut() = StatusCode::NOT_ACCEPTABLE;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, content_length);
    response
}

/// Adds Accept-Encoding to the Vary header unless it, or `*`, is present.
///
/// All existing Vary values are merged into one comma-joined value.
fn add_vary_accept_encoding(headers: &mut HeaderMap) {
    let mut vary = Vec::new();
    let mut opaque = false;
    for value in headers.get_all(header::VARY) {
        match value.to_str() {
            Ok(value) => vary.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_owned),
            ),
            Err(_) => opaque = true,
        }
    }

    let covered = vary
        .iter()
        .any(|v| v == "*" || v.eq_ignore_ascii_case(VARY_ACCEPT_ENCODING));
    if covered {
        return;
    }

    vary.push(VARY_ACCEPT_ENCODING.to_owned());
    match HeaderValue::try_from(vary.join(",")) {
        Ok(value) if !opaque => {
            headers.insert(header::VARY, value);
        }
        // Keep values we can't parse and add ours alongside them
        _ => {
            headers.append(
                header::VARY,
                HeaderValue::from_static(VARY_ACCEPT_ENCODING),
            );
        }
    }
}
