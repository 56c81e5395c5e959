//! Request instrumentation middleware.
//!
//! # Responsibilities
//! - Time each request from arrival to the handler's final response
//! - Record latency with `{method, route, status_code}` labels
//! - Count the request as an error when the status is 5xx
//!
//! # Design Decisions
//! - Applied per route so the route label is the declared route, not the path
//! - Purely observational: the response passes through untouched
//! - A panic-catching layer sits inside it, so handler panics become
//!   recorded 500s instead of unwinding past the timer

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::handler::Handler;
use axum::http::{Request, Response};
use axum::routing::{get, MethodRouter};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};
use tower_http::catch_panic::CatchPanicLayer;

use crate::observability::{RecorderPtr, RequestLabels, RequestRecorder};

/// Wrap `handler` as a GET route instrumented under `route`.
pub fn instrument_route<H, T, S>(route: &'static str, handler: H, recorder: &RecorderPtr) -> MethodRouter<S>
where
    H: Handler<T, S>,
    T: 'static,
    S: Clone + Send + Sync + 'static,
{
    get(handler)
        .layer::<_, Infallible>(CatchPanicLayer::new())
        .layer(MetricsLayer::new(route, Arc::clone(recorder)))
}

/// Record the measurements for one finished request.
pub fn record_request(recorder: &dyn RequestRecorder, labels: &RequestLabels, elapsed: Duration) {
    recorder.record_latency(labels, elapsed.as_millis() as f64);
    if labels.is_server_error() {
        recorder.record_error(labels);
    }
}

/// Layer that instruments the wrapped service under a fixed route name.
#[derive(Clone)]
pub struct MetricsLayer {
    route: Arc<str>,
    recorder: RecorderPtr,
}

impl MetricsLayer {
    pub fn new(route: impl Into<Arc<str>>, recorder: RecorderPtr) -> Self {
        Self {
            route: route.into(),
            recorder,
        }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            route: Arc::clone(&self.route),
            recorder: Arc::clone(&self.recorder),
        }
    }
}

/// Service produced by [`MetricsLayer`].
#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    route: Arc<str>,
    recorder: RecorderPtr,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let start = Instant::now();
        let method = request.method().as_str().to_owned();
        let route = Arc::clone(&self.route);
        let recorder = Arc::clone(&self.recorder);
        let response = self.inner.call(request);

        Box::pin(async move {
            let response = response.await?;
            let labels = RequestLabels {
                method,
                route,
                status_code: response.status().as_u16(),
            };
            let elapsed = start.elapsed();
            record_request(recorder.as_ref(), &labels, elapsed);

            tracing::debug!(
                method = %labels.method,
                route = %labels.route,
                status = labels.status_code,
                elapsed_ms = elapsed.as_millis() as u64,
                "Request recorded"
            );
            Ok(response)
        })
    }
}
