use reqwest_tracing::{SpanBackendWithUrl, TracingMiddleware};

/// Middleware for [reqwest_middleware] clients talking to IPFS nodes,
/// pinning services and gateways.
///
/// Every outgoing request gets its own span with the (full) url recorded in
/// `http.url`. With the `otlp` feature enabled, a `traceparent` header is
/// injected as well.
pub fn tracing_middleware() -> TracingMiddleware<SpanBackendWithUrl> {
    TracingMiddleware::<SpanBackendWithUrl>::new()
}
