use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use ::http::{Request, Response};
use tower::{Layer, Service};
use tracing::{error, info, warn, Instrument, Span};

use super::{IgnoredPaths, REQUEST_ID_HEADER};

/// Tower layer that writes one access log line per HTTP request
#[derive(Clone, Debug, Default)]
pub struct HttpLoggingLayer {
    ignored_paths: IgnoredPaths,
}

impl HttpLoggingLayer {
    pub fn new(ignored_paths: IgnoredPaths) -> Self {
        Self { ignored_paths }
    }
}

impl<S> Layer<S> for HttpLoggingLayer {
    type Service = HttpLoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        HttpLoggingService {
            inner: service,
            ignored_paths: self.ignored_paths.clone(),
        }
    }
}

#[derive(Clone)]
pub struct HttpLoggingService<S> {
    inner: S,
    ignored_paths: IgnoredPaths,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for HttpLoggingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: std::fmt::Display,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let path = req.uri().path().to_string();
        let method = req.method().to_string();
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let should_ignore = self.ignored_paths.matches(&path);
        let start = Instant::now();
        let future = self.inner.call(req);

        // Keep log lines correlated with the request span
        let span = Span::current();

        Box::pin(
            async move {
                let result = future.await;

                if should_ignore {
                    return result;
                }

                let duration_ms = start.elapsed().as_millis();
                match &result {
                    Ok(response) if response.status().is_server_error() => {
                        warn!(
                            method = %method,
                            path = %path,
                            status = response.status().as_u16(),
                            duration_ms = %duration_ms,
                            request_id = %request_id,
                            "{} {} - {} - {}ms",
                            method,
                            path,
                            response.status().as_u16(),
                            duration_ms
                        );
                    }
                    Ok(response) => {
                        info!(
                            method = %method,
                            path = %path,
                            status = response.status().as_u16(),
                            duration_ms = %duration_ms,
                            request_id = %request_id,
                            "{} {} - {} - {}ms",
                            method,
                            path,
                            response.status().as_u16(),
                            duration_ms
                        );
                    }
                    Err(e) => {
                        error!(
                            method = %method,
                            path = %path,
                            duration_ms = %duration_ms,
                            request_id = %request_id,
                            error = %e,
                            "{} {} - {}ms - ERROR: {}",
                            method,
                            path,
                            duration_ms,
                            e
                        );
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
