#[cfg(feature = "otlp")]
use opentelemetry::global;
#[cfg(feature = "otlp")]
use opentelemetry_http::HeaderExtractor;
#[cfg(feature = "otlp")]
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Attach the current span to the W3C trace context carried by the request
/// headers, so spans of a publish show up under the caller's trace.
///
/// Meant to be used with `tower::ServiceBuilder::map_request` inside the
/// span created by `tower_http::trace::TraceLayer`. Without the `otlp`
/// feature the request is passed through untouched.
pub fn accept_trace<B>(request: http::Request<B>) -> http::Request<B> {
    #[cfg(feature = "otlp")]
    {
        let parent_context = global::get_text_map_propagator(|propagator| {
            propagator.extract(&HeaderExtractor(request.headers()))
        });
        tracing::Span::current().set_parent(parent_context);
    }
    request
}
