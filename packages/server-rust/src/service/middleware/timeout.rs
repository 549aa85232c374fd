//! Per-call timeout middleware.

use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::Value;
use tower::{Layer, Service};

use crate::service::operation::{BoxedFuture, OperationError, RpcCall};

/// Tower layer that fails calls exceeding their `ctx.call_timeout_ms`
/// with `OperationError::Timeout`.
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S> Service<RpcCall> for TimeoutService<S>
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
        let timeout_ms = call.ctx.call_timeout_ms;
        let fut = self.inner.call(call);
        Box::pin(async move {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(OperationError::Timeout { timeout_ms }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;

    struct SlowService {
        delay_ms: u64,
    }

    impl Service<RpcCall> for SlowService {
        type Response = Value;
        type Error = OperationError;
        type Future = BoxedFuture;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _call: RpcCall) -> Self::Future {
            let delay = self.delay_ms;
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(Value::Bool(true))
            })
        }
    }

    #[tokio::test]
    async fn completes_within_timeout() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 10 });
        let out = svc.oneshot(RpcCall::new(1, "slow", Value::Null, 1000)).await.unwrap();
        assert_eq!(out, Value::Bool(true));
    }

    #[tokio::test]
    async fn exceeds_timeout_returns_error() {
        let svc = TimeoutLayer.layer(SlowService { delay_ms: 200 });
        let err = svc
            .oneshot(RpcCall::new(1, "slow", Value::Null, 50))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Timeout { timeout_ms: 50 }));
    }
}
