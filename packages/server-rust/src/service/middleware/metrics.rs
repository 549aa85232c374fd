//! Call instrumentation via `tracing` spans.

use std::task::{Context, Poll};
use std::time::Instant;

use serde_json::Value;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::{BoxedFuture, OperationError, RpcCall};

/// Tower layer that wraps each call in an `operation` span recording its
/// duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<RpcCall> for MetricsService<S>
where
    S: Service<RpcCall, Response = Value, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = OperationError;
    type Future = BoxedFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: RpcCall) -> Self::Future {
        let call_id = call.ctx.call_id;
        let span = info_span!(
            "operation",
            method = %call.method,
            call_id = call_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        let method = call.method.clone();

        let fut = self.inner.call(call);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                let outcome = if result.is_ok() { "ok" } else { "error" };

                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                match &result {
                    Ok(_) => tracing::info!(method = %method, call_id, duration_ms, "operation complete"),
                    Err(err) => tracing::warn!(method = %method, call_id, duration_ms, error = %err, "operation failed"),
                }

                result
            }
            .instrument(span),
        )
    }
}
