//! Instrumentation of the compression transform.

use crate::context::RequestContext;
use std::fmt;

/// Name of the event emitted around each compression transform.
pub const EVENT_NAME: &str = "rack.brotli";

/// An instrumented event and its payload.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    name: &'a str,
    request: &'a RequestContext,
}

impl<'a> Event<'a> {
    /// Event name, [`EVENT_NAME`] for events raised by this crate.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The request being answered.
    pub fn request(&self) -> &'a RequestContext {
        self.request
    }
}

/// A backend notified around every compressed response.
///
/// Implementations call `block` exactly once and let panics propagate.
/// Calling it again does nothing. A notifier that never calls it is tolerated:
/// the block then runs after `instrument` returns.
pub trait Notifier: Send + Sync + 'static {
    /// Runs `block` on behalf of `event`.
    fn instrument(&self, event: &Event<'_>, block: &mut dyn FnMut());
}

impl fmt::Debug for dyn Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Notifier")
    }
}

/// Runs the block and reports nothing. Used when no notifier is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn instrument(&self, _event: &Event<'_>, block: &mut dyn FnMut()) {
        block();
    }
}

/// Runs the block inside a `tracing` span.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn instrument(&self, event: &Event<'_>, block: &mut dyn FnMut()) {
        let span = tracing::debug_span!(
            "instrument",
            event = event.name(),
            method = %event.request().method(),
            path = event.request().path(),
        );
        let _guard = span.enter();
        block();
    }
}

/// Runs `f` through `notifier` under [`EVENT_NAME`], exactly once.
pub(crate) fn instrument<T>(
    notifier: &dyn Notifier,
    request: &RequestContext,
    f: impl FnOnce() -> T,
) -> T {
    let event = Event {
        name: EVENT_NAME,
        request,
    };
    let mut f = Some(f);
    let mut output = None;

    notifier.instrument(&event, &mut || {
        if let Some(f) = f.take() {
            output = Some(f());
        }
    });

    match (output, f) {
        (Some(output), _) => output,
        (None, Some(f)) => {
            tracing::warn!(event = EVENT_NAME, "notifier did not run the instrumented block");
            f()
        }
        (None, None) => unreachable!("instrumented block consumed without output"),
    }
}
