use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use ::http::{HeaderMap, Request, Response};
use opentelemetry::{global, propagation::Extractor, trace::TraceContextExt as _};
use tower::{Layer, Service};
use tracing::{field, info_span, Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::{IgnoredPaths, REQUEST_ID_HEADER};

/// Tower layer opening one OpenTelemetry-linked span per HTTP request
#[derive(Clone, Debug, Default)]
pub struct HttpTracingLayer {
    ignored_paths: IgnoredPaths,
}

impl HttpTracingLayer {
    pub fn new(ignored_paths: IgnoredPaths) -> Self {
        Self { ignored_paths }
    }
}

impl<S> Layer<S> for HttpTracingLayer {
    type Service = HttpTracingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        HttpTracingService {
            inner: service,
            ignored_paths: self.ignored_paths.clone(),
        }
    }
}

#[derive(Clone)]
pub struct HttpTracingService<S> {
    inner: S,
    ignored_paths: IgnoredPaths,
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for HttpTracingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Error: std::fmt::Display,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let path = req.uri().path().to_string();

        if self.ignored_paths.matches(&path) {
            return Box::pin(self.inner.call(req));
        }

        let parent_context = global::get_text_map_propagator(|propagator| {
            propagator.extract(&HeaderExtractor(req.headers()))
        });

        let method = req.method().to_string();
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let span = info_span!(
            target: "http",
            "http_request",
            otel.name = %format!("{} {}", method, path),
            http.method = %method,
            http.route = %path,
            http.status_code = field::Empty,
            otel.status_code = field::Empty,
            request_id = %request_id,
            trace_id = field::Empty,
            span_id = field::Empty,
        );
        span.set_parent(parent_context);

        // The inner service may not be ready; use the clone that was polled
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let current_span = Span::current();
                let otel_context = current_span.context();
                let otel_span = otel_context.span();
                let span_context = otel_span.span_context();
                if span_context.is_valid() {
                    current_span.record("trace_id", span_context.trace_id().to_string());
                    current_span.record("span_id", span_context.span_id().to_string());
                }

                let result = inner.call(req).await;

                match &result {
                    Ok(response) => {
                        let status = response.status();
                        current_span.record("http.status_code", status.as_u16());
                        if status.is_server_error() {
                            current_span.record("otel.status_code", "ERROR");
                        }
                    }
                    Err(_) => {
                        current_span.record("otel.status_code", "ERROR");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
